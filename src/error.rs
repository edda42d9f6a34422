//! Migration error taxonomy.
//!
//! The variants map onto how far a failure propagates:
//!
//! | Variant | Scope |
//! |---------|-------|
//! | [`MigrateError::Connection`] | aborts the whole run before any write |
//! | [`MigrateError::SchemaMismatch`] | fails one table, others proceed |
//! | [`MigrateError::BatchInsert`] | fails one table after a retry |
//! | [`MigrateError::RowTransform`] | skips one row |
//! | [`MigrateError::Interrupted`] | stops the run between batches |
//! | [`MigrateError::Store`] | fails the operation that raised it |
//!
//! Duplicate keys are not errors; they are counted as skipped rows.

use crate::models::TableName;

/// Which side of the migration a connection error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreSide {
    Source,
    Target,
}

impl std::fmt::Display for StoreSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreSide::Source => f.write_str("source"),
            StoreSide::Target => f.write_str("target"),
        }
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum MigrateError {
    #[error("{store} store unreachable: {message}")]
    Connection { store: StoreSide, message: String },

    #[error("schema mismatch in target table {table}: {detail}")]
    SchemaMismatch { table: TableName, detail: String },

    #[error("row {row} in {table}: column {column}: {reason}")]
    RowTransform {
        table: TableName,
        row: String,
        column: String,
        reason: String,
    },

    #[error("batch {batch} insert into {table} failed: {message}")]
    BatchInsert {
        table: TableName,
        batch: u64,
        message: String,
    },

    #[error("migration interrupted")]
    Interrupted,

    #[error("store error: {message}")]
    Store { message: String },
}

impl MigrateError {
    pub fn connection(store: StoreSide, err: impl std::fmt::Display) -> Self {
        MigrateError::Connection {
            store,
            message: err.to_string(),
        }
    }

    pub fn store(err: impl std::fmt::Display) -> Self {
        MigrateError::Store {
            message: err.to_string(),
        }
    }
}

impl From<sqlx::Error> for MigrateError {
    fn from(err: sqlx::Error) -> Self {
        MigrateError::store(err)
    }
}

pub type MigrateResult<T> = std::result::Result<T, MigrateError>;
