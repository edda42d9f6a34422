//! SQLite-backed [`SourceStore`].
//!
//! Rows are paged by `rowid` so every batch is a bounded index range scan,
//! and each value is captured with its runtime storage class rather than
//! the column's declared type, which SQLite does not enforce.

use std::path::PathBuf;

use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::{Column, Row, SqlitePool, TypeInfo, ValueRef};

use crate::error::{MigrateError, MigrateResult, StoreSide};
use crate::models::{RawRow, SourceValue, TableName};

use super::SourceStore;

const ROWID_ALIAS: &str = "__migrate_rowid";

/// SQLite implementation of the [`SourceStore`] trait.
pub struct SqliteSource {
    pool: SqlitePool,
    path: PathBuf,
}

impl SqliteSource {
    pub fn new(pool: SqlitePool, path: impl Into<PathBuf>) -> Self {
        Self {
            pool,
            path: path.into(),
        }
    }
}

#[async_trait]
impl SourceStore for SqliteSource {
    async fn ping(&self) -> MigrateResult<()> {
        if !self.path.is_file() {
            return Err(MigrateError::connection(
                StoreSide::Source,
                format!("database file not found at {}", self.path.display()),
            ));
        }
        // Reading sqlite_master forces the header check that SELECT 1 skips.
        sqlx::query("SELECT COUNT(*) FROM sqlite_master")
            .execute(&self.pool)
            .await
            .map_err(|e| MigrateError::connection(StoreSide::Source, e))?;
        Ok(())
    }

    async fn has_table(&self, table: TableName) -> MigrateResult<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type = 'table' AND name = ?",
        )
        .bind(table.as_str())
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    async fn count(&self, table: TableName) -> MigrateResult<u64> {
        let n: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", table))
            .fetch_one(&self.pool)
            .await?;
        Ok(n.max(0) as u64)
    }

    async fn fetch_batch(
        &self,
        table: TableName,
        after_rowid: i64,
        limit: usize,
    ) -> MigrateResult<Vec<RawRow>> {
        let sql = format!(
            "SELECT rowid AS {alias}, * FROM {table} WHERE rowid > ? ORDER BY rowid LIMIT ?",
            alias = ROWID_ALIAS,
            table = table
        );
        let rows = sqlx::query(&sql)
            .bind(after_rowid)
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(to_raw_row).collect()
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

fn to_raw_row(row: &SqliteRow) -> MigrateResult<RawRow> {
    let rowid: i64 = row.try_get(ROWID_ALIAS)?;
    let mut raw = RawRow::new(rowid);

    for (i, column) in row.columns().iter().enumerate() {
        if column.name() == ROWID_ALIAS {
            continue;
        }
        raw.columns
            .insert(column.name().to_string(), read_value(row, i)?);
    }
    Ok(raw)
}

fn read_value(row: &SqliteRow, i: usize) -> MigrateResult<SourceValue> {
    let storage_class = {
        let value = row.try_get_raw(i)?;
        if value.is_null() {
            return Ok(SourceValue::Null);
        }
        value.type_info().name().to_string()
    };

    let value = match storage_class.as_str() {
        "INTEGER" | "BOOLEAN" => SourceValue::Integer(row.try_get_unchecked::<i64, _>(i)?),
        "REAL" => SourceValue::Real(row.try_get_unchecked::<f64, _>(i)?),
        "BLOB" => SourceValue::Blob(row.try_get_unchecked::<Vec<u8>, _>(i)?),
        _ => {
            // Invalid UTF-8 in a TEXT cell is kept as bytes so the row, not
            // the whole batch, is rejected during transformation.
            let bytes = row.try_get_unchecked::<Vec<u8>, _>(i)?;
            match String::from_utf8(bytes) {
                Ok(s) => SourceValue::Text(s),
                Err(e) => SourceValue::Blob(e.into_bytes()),
            }
        }
    };
    Ok(value)
}
