//! Target schema bootstrap for `contract-migrate init`.
//!
//! Creates the three tables the service uses, with their indexes and
//! foreign keys. Every statement is `IF NOT EXISTS`, so running it against
//! a database that already went through the service's own forward
//! migrations is a no-op. The `migrate` run itself never creates tables.

use anyhow::{Context, Result};
use sqlx::PgPool;
use tracing::info;

const CREATE_STATEMENTS: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS documents (
        id VARCHAR NOT NULL PRIMARY KEY,
        filename VARCHAR NOT NULL,
        file_size INTEGER,
        uploaded_at TIMESTAMPTZ DEFAULT now(),
        status VARCHAR DEFAULT 'uploaded',
        extracted_text TEXT,
        document_metadata JSON
    )
    "#,
    "CREATE INDEX IF NOT EXISTS ix_documents_filename ON documents (filename)",
    "CREATE INDEX IF NOT EXISTS ix_documents_status ON documents (status)",
    r#"
    CREATE TABLE IF NOT EXISTS extraction_results (
        id VARCHAR NOT NULL PRIMARY KEY,
        document_id VARCHAR NOT NULL REFERENCES documents (id) ON DELETE CASCADE,
        parties JSON,
        effective_date VARCHAR,
        term VARCHAR,
        governing_law VARCHAR,
        payment_terms TEXT,
        termination TEXT,
        auto_renewal BOOLEAN,
        confidentiality TEXT,
        indemnity TEXT,
        liability_cap JSON,
        signatories JSON,
        confidence_score DOUBLE PRECISION,
        created_at TIMESTAMPTZ DEFAULT now()
    )
    "#,
    "CREATE INDEX IF NOT EXISTS ix_extraction_results_document_id ON extraction_results (document_id)",
    r#"
    CREATE TABLE IF NOT EXISTS document_chunks (
        id VARCHAR NOT NULL PRIMARY KEY,
        document_id VARCHAR NOT NULL REFERENCES documents (id) ON DELETE CASCADE,
        chunk_text TEXT NOT NULL,
        chunk_index INTEGER NOT NULL,
        page_number INTEGER,
        char_start INTEGER,
        char_end INTEGER,
        embedding JSON,
        created_at TIMESTAMPTZ DEFAULT now()
    )
    "#,
    "CREATE INDEX IF NOT EXISTS ix_document_chunks_document_id ON document_chunks (document_id)",
];

/// Create any missing target tables and indexes in one transaction.
pub async fn create_schema(pool: &PgPool) -> Result<()> {
    let mut tx = pool
        .begin()
        .await
        .context("Failed to open a transaction on the target database")?;

    for statement in CREATE_STATEMENTS {
        sqlx::query(statement)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("Failed to apply schema statement: {}", statement.trim()))?;
    }

    tx.commit().await?;
    info!(statements = CREATE_STATEMENTS.len(), "target schema ready");
    Ok(())
}
