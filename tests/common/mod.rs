//! SQLite fixtures shaped like the contract service's embedded database.
#![allow(dead_code)]

use std::path::Path;

use contract_migrate::config::Config;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};

const DOCUMENTS_DDL: &str = r#"
CREATE TABLE documents (
    id VARCHAR NOT NULL,
    filename VARCHAR NOT NULL,
    file_size INTEGER,
    uploaded_at DATETIME DEFAULT (CURRENT_TIMESTAMP),
    status VARCHAR,
    extracted_text TEXT,
    document_metadata JSON,
    PRIMARY KEY (id)
)
"#;

const EXTRACTION_RESULTS_DDL: &str = r#"
CREATE TABLE extraction_results (
    id VARCHAR NOT NULL,
    document_id VARCHAR NOT NULL,
    parties JSON,
    effective_date VARCHAR,
    term VARCHAR,
    governing_law VARCHAR,
    payment_terms VARCHAR,
    termination VARCHAR,
    auto_renewal VARCHAR,
    confidentiality VARCHAR,
    indemnity VARCHAR,
    liability_cap JSON,
    signatories JSON,
    confidence_score FLOAT,
    created_at DATETIME DEFAULT (CURRENT_TIMESTAMP),
    PRIMARY KEY (id),
    FOREIGN KEY(document_id) REFERENCES documents (id)
)
"#;

const DOCUMENT_CHUNKS_DDL: &str = r#"
CREATE TABLE document_chunks (
    id VARCHAR NOT NULL,
    document_id VARCHAR NOT NULL,
    chunk_text TEXT NOT NULL,
    chunk_index INTEGER NOT NULL,
    page_number INTEGER,
    char_start INTEGER,
    char_end INTEGER,
    embedding JSON,
    created_at DATETIME DEFAULT (CURRENT_TIMESTAMP),
    PRIMARY KEY (id)
)
"#;

/// Writable pool over a fresh database at `path` with the documents and
/// extraction_results tables. document_chunks is left out, like databases
/// created before chunking existed.
pub async fn create_source(path: &Path) -> SqlitePool {
    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true)
        .foreign_keys(false);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await
        .unwrap();
    for ddl in [DOCUMENTS_DDL, EXTRACTION_RESULTS_DDL] {
        sqlx::query(ddl).execute(&pool).await.unwrap();
    }
    pool
}

pub async fn add_chunks_table(pool: &SqlitePool) {
    sqlx::query(DOCUMENT_CHUNKS_DDL).execute(pool).await.unwrap();
}

pub async fn insert_document(pool: &SqlitePool, id: &str, uploaded_at: &str) {
    sqlx::query(
        "INSERT INTO documents (id, filename, file_size, uploaded_at, status, extracted_text, document_metadata) \
         VALUES (?, ?, ?, ?, 'completed', 'This Agreement is made between...', '{\"pages\": 3}')",
    )
    .bind(id)
    .bind(format!("{}.pdf", id))
    .bind(48_213_i64)
    .bind(uploaded_at)
    .execute(pool)
    .await
    .unwrap();
}

pub async fn insert_result(pool: &SqlitePool, id: &str, document_id: &str, auto_renewal: &str) {
    sqlx::query(
        "INSERT INTO extraction_results \
         (id, document_id, parties, effective_date, term, governing_law, auto_renewal, liability_cap, confidence_score, created_at) \
         VALUES (?, ?, '[\"Acme Corp\", \"Globex Inc\"]', '2024-01-01', '24 months', 'Delaware', ?, \
                 '{\"amount\": 100000, \"currency\": \"USD\"}', 0.87, '2025-10-30 13:05:00')",
    )
    .bind(id)
    .bind(document_id)
    .bind(auto_renewal)
    .execute(pool)
    .await
    .unwrap();
}

pub async fn insert_chunk(pool: &SqlitePool, id: &str, document_id: &str, index: i64) {
    sqlx::query(
        "INSERT INTO document_chunks (id, document_id, chunk_text, chunk_index, page_number, char_start, char_end, embedding) \
         VALUES (?, ?, 'The term of this Agreement...', ?, 1, 0, 29, '[0.12, -0.5, 0.33]')",
    )
    .bind(id)
    .bind(document_id)
    .bind(index)
    .execute(pool)
    .await
    .unwrap();
}

/// Insert `documents` documents and `results` extraction results spread
/// across them. Returns the document ids in insertion order.
pub async fn seed(pool: &SqlitePool, documents: usize, results: usize) -> Vec<String> {
    let ids: Vec<String> = (0..documents)
        .map(|_| uuid::Uuid::new_v4().to_string())
        .collect();
    for id in &ids {
        insert_document(pool, id, "2025-10-30 12:00:00").await;
    }
    for i in 0..results {
        let document_id = &ids[i % ids.len()];
        let auto_renewal = if i % 2 == 0 { "true" } else { "false" };
        insert_result(pool, &uuid::Uuid::new_v4().to_string(), document_id, auto_renewal).await;
    }
    ids
}

pub fn config_for(path: &Path) -> Config {
    let mut cfg = Config::default();
    cfg.source.path = path.to_path_buf();
    cfg
}
