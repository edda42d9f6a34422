//! Storage abstraction for the two sides of a migration.
//!
//! The migrator only talks to a [`SourceStore`] and a [`TargetStore`], so
//! the transfer logic runs unchanged against SQLite/PostgreSQL in
//! production and the in-memory stores in tests.
//!
//! | Implementation | Side |
//! |----------------|------|
//! | [`sqlite::SqliteSource`] | source |
//! | [`postgres::PostgresTarget`] | target |
//! | [`memory::InMemorySource`] | source (tests) |
//! | [`memory::InMemoryTarget`] | target (tests) |
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;
pub mod postgres;
pub mod sqlite;

use std::collections::HashSet;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::MigrateResult;
use crate::models::{RawRow, Record, TableName};

/// Rows written and rows skipped as duplicates by one insert batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchOutcome {
    pub inserted: u64,
    pub skipped: u64,
}

/// The embedded store rows are read from.
#[async_trait]
pub trait SourceStore: Send + Sync {
    /// Verify the store exists and answers a trivial query.
    ///
    /// Fails with [`MigrateError::Connection`](crate::error::MigrateError::Connection).
    async fn ping(&self) -> MigrateResult<()>;

    /// Whether `table` exists in the source at all.
    async fn has_table(&self, table: TableName) -> MigrateResult<bool>;

    async fn count(&self, table: TableName) -> MigrateResult<u64>;

    /// Up to `limit` rows with `rowid > after_rowid`, in rowid order.
    async fn fetch_batch(
        &self,
        table: TableName,
        after_rowid: i64,
        limit: usize,
    ) -> MigrateResult<Vec<RawRow>>;

    /// Release the underlying connection.
    async fn close(&self);
}

/// The server store rows are written to.
#[async_trait]
pub trait TargetStore: Send + Sync {
    /// Verify the store is reachable.
    ///
    /// Fails with [`MigrateError::Connection`](crate::error::MigrateError::Connection).
    async fn ping(&self) -> MigrateResult<()>;

    /// Verify `table` and all of its expected columns exist.
    ///
    /// Fails with [`MigrateError::SchemaMismatch`](crate::error::MigrateError::SchemaMismatch).
    async fn check_schema(&self, table: TableName) -> MigrateResult<()>;

    /// The subset of `ids` already present in `table`.
    async fn existing_ids(&self, table: TableName, ids: &[String])
        -> MigrateResult<HashSet<String>>;

    /// Insert `records` into `table` inside a single transaction.
    ///
    /// Rows whose primary key already exists are skipped and counted, not
    /// treated as failures. Any other failure rolls the whole batch back.
    async fn insert_batch(&self, table: TableName, records: &[Record])
        -> MigrateResult<BatchOutcome>;

    async fn count(&self, table: TableName) -> MigrateResult<u64>;

    /// Release the underlying connection.
    async fn close(&self);
}
