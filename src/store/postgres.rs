//! PostgreSQL-backed [`TargetStore`].
//!
//! Each batch runs in one transaction. Primary-key conflicts are absorbed
//! with `ON CONFLICT (id) DO NOTHING` and counted from `rows_affected`, so a
//! re-run skips rows instead of failing. JSON values are bound as text and
//! cast server-side, which works for both `json` and `jsonb` columns.

use std::collections::HashSet;

use async_trait::async_trait;
use sqlx::postgres::{PgPool, Postgres};
use sqlx::Transaction;

use crate::error::{MigrateError, MigrateResult, StoreSide};
use crate::models::{Document, DocumentChunk, ExtractionResult, Record, TableName};

use super::{BatchOutcome, TargetStore};

const INSERT_DOCUMENT: &str = r#"
    INSERT INTO documents (id, filename, file_size, uploaded_at, status, extracted_text, document_metadata)
    VALUES ($1, $2, $3, $4, $5, $6, $7::json)
    ON CONFLICT (id) DO NOTHING
"#;

const INSERT_EXTRACTION_RESULT: &str = r#"
    INSERT INTO extraction_results (id, document_id, parties, effective_date, term, governing_law,
                                    payment_terms, termination, auto_renewal, confidentiality,
                                    indemnity, liability_cap, signatories, confidence_score, created_at)
    VALUES ($1, $2, $3::json, $4, $5, $6, $7, $8, $9, $10, $11, $12::json, $13::json, $14, $15)
    ON CONFLICT (id) DO NOTHING
"#;

const INSERT_DOCUMENT_CHUNK: &str = r#"
    INSERT INTO document_chunks (id, document_id, chunk_text, chunk_index, page_number,
                                 char_start, char_end, embedding, created_at)
    VALUES ($1, $2, $3, $4, $5, $6, $7, $8::json, $9)
    ON CONFLICT (id) DO NOTHING
"#;

/// PostgreSQL implementation of the [`TargetStore`] trait.
pub struct PostgresTarget {
    pool: PgPool,
}

impl PostgresTarget {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn json_text(v: &Option<serde_json::Value>) -> Option<String> {
    v.as_ref().map(|v| v.to_string())
}

async fn insert_document(tx: &mut Transaction<'_, Postgres>, d: &Document) -> sqlx::Result<u64> {
    let done = sqlx::query(INSERT_DOCUMENT)
        .bind(&d.id)
        .bind(&d.filename)
        .bind(d.file_size)
        .bind(d.uploaded_at)
        .bind(&d.status)
        .bind(&d.extracted_text)
        .bind(json_text(&d.document_metadata))
        .execute(&mut **tx)
        .await?;
    Ok(done.rows_affected())
}

async fn insert_extraction_result(
    tx: &mut Transaction<'_, Postgres>,
    r: &ExtractionResult,
) -> sqlx::Result<u64> {
    let done = sqlx::query(INSERT_EXTRACTION_RESULT)
        .bind(&r.id)
        .bind(&r.document_id)
        .bind(json_text(&r.parties))
        .bind(&r.effective_date)
        .bind(&r.term)
        .bind(&r.governing_law)
        .bind(&r.payment_terms)
        .bind(&r.termination)
        .bind(r.auto_renewal)
        .bind(&r.confidentiality)
        .bind(&r.indemnity)
        .bind(json_text(&r.liability_cap))
        .bind(json_text(&r.signatories))
        .bind(r.confidence_score)
        .bind(r.created_at)
        .execute(&mut **tx)
        .await?;
    Ok(done.rows_affected())
}

async fn insert_document_chunk(
    tx: &mut Transaction<'_, Postgres>,
    c: &DocumentChunk,
) -> sqlx::Result<u64> {
    let done = sqlx::query(INSERT_DOCUMENT_CHUNK)
        .bind(&c.id)
        .bind(&c.document_id)
        .bind(&c.chunk_text)
        .bind(c.chunk_index)
        .bind(c.page_number)
        .bind(c.char_start)
        .bind(c.char_end)
        .bind(json_text(&c.embedding))
        .bind(c.created_at)
        .execute(&mut **tx)
        .await?;
    Ok(done.rows_affected())
}

#[async_trait]
impl TargetStore for PostgresTarget {
    async fn ping(&self) -> MigrateResult<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| MigrateError::connection(StoreSide::Target, e))?;
        Ok(())
    }

    async fn check_schema(&self, table: TableName) -> MigrateResult<()> {
        let present: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT column_name::text
            FROM information_schema.columns
            WHERE table_schema = current_schema() AND table_name = $1
            "#,
        )
        .bind(table.as_str())
        .fetch_all(&self.pool)
        .await?;

        if present.is_empty() {
            return Err(MigrateError::SchemaMismatch {
                table,
                detail: "table does not exist (run `contract-migrate init` or the schema migrations first)"
                    .to_string(),
            });
        }

        let missing: Vec<&str> = table
            .columns()
            .iter()
            .copied()
            .filter(|c| !present.iter().any(|p| p == c))
            .collect();
        if !missing.is_empty() {
            return Err(MigrateError::SchemaMismatch {
                table,
                detail: format!("missing columns: {}", missing.join(", ")),
            });
        }
        Ok(())
    }

    async fn existing_ids(
        &self,
        table: TableName,
        ids: &[String],
    ) -> MigrateResult<HashSet<String>> {
        if ids.is_empty() {
            return Ok(HashSet::new());
        }
        let found: Vec<String> =
            sqlx::query_scalar(&format!("SELECT id FROM {} WHERE id = ANY($1)", table))
                .bind(ids)
                .fetch_all(&self.pool)
                .await?;
        Ok(found.into_iter().collect())
    }

    async fn insert_batch(
        &self,
        table: TableName,
        records: &[Record],
    ) -> MigrateResult<BatchOutcome> {
        let mut outcome = BatchOutcome::default();
        if records.is_empty() {
            return Ok(outcome);
        }

        // Dropping the transaction on any early return rolls it back.
        let mut tx = self.pool.begin().await?;

        for record in records {
            if record.table() != table {
                return Err(MigrateError::store(format!(
                    "record {} belongs to {}, not {}",
                    record.id(),
                    record.table(),
                    table
                )));
            }
            let affected = match record {
                Record::Document(d) => insert_document(&mut tx, d).await?,
                Record::ExtractionResult(r) => insert_extraction_result(&mut tx, r).await?,
                Record::DocumentChunk(c) => insert_document_chunk(&mut tx, c).await?,
            };
            if affected == 0 {
                outcome.skipped += 1;
            } else {
                outcome.inserted += affected;
            }
        }

        tx.commit().await?;
        Ok(outcome)
    }

    async fn count(&self, table: TableName) -> MigrateResult<u64> {
        let n: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", table))
            .fetch_one(&self.pool)
            .await?;
        Ok(n.max(0) as u64)
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}
