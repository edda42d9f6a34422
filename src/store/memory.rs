//! In-memory [`SourceStore`] and [`TargetStore`] implementations.
//!
//! Used by tests to drive the migrator without database servers. The
//! target mirrors the PostgreSQL behaviour that matters to the migrator:
//! primary-key conflicts are skipped, foreign keys into the parent table
//! are enforced, and a failing batch leaves no rows behind. Failures can be
//! injected per table.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Mutex, RwLock};

use async_trait::async_trait;

use crate::error::{MigrateError, MigrateResult, StoreSide};
use crate::models::{RawRow, Record, TableName};

use super::{BatchOutcome, SourceStore, TargetStore};

/// In-memory source. Tables never inserted are reported as absent.
pub struct InMemorySource {
    tables: RwLock<HashMap<TableName, Vec<RawRow>>>,
    reachable: bool,
}

impl InMemorySource {
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(HashMap::new()),
            reachable: true,
        }
    }

    /// A source whose connectivity check fails.
    pub fn unreachable() -> Self {
        Self {
            reachable: false,
            ..Self::new()
        }
    }

    /// Register `table` (possibly empty) and append `rows` to it.
    pub fn with_rows(self, table: TableName, rows: Vec<RawRow>) -> Self {
        self.tables
            .write()
            .unwrap()
            .entry(table)
            .or_default()
            .extend(rows);
        self
    }
}

impl Default for InMemorySource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SourceStore for InMemorySource {
    async fn ping(&self) -> MigrateResult<()> {
        if self.reachable {
            Ok(())
        } else {
            Err(MigrateError::connection(
                StoreSide::Source,
                "in-memory source marked unreachable",
            ))
        }
    }

    async fn has_table(&self, table: TableName) -> MigrateResult<bool> {
        Ok(self.tables.read().unwrap().contains_key(&table))
    }

    async fn count(&self, table: TableName) -> MigrateResult<u64> {
        Ok(self
            .tables
            .read()
            .unwrap()
            .get(&table)
            .map(|rows| rows.len() as u64)
            .unwrap_or(0))
    }

    async fn fetch_batch(
        &self,
        table: TableName,
        after_rowid: i64,
        limit: usize,
    ) -> MigrateResult<Vec<RawRow>> {
        let tables = self.tables.read().unwrap();
        let Some(rows) = tables.get(&table) else {
            return Err(MigrateError::store(format!("no such table: {}", table)));
        };
        let mut page: Vec<RawRow> = rows
            .iter()
            .filter(|r| r.rowid > after_rowid)
            .cloned()
            .collect();
        page.sort_by_key(|r| r.rowid);
        page.truncate(limit);
        Ok(page)
    }

    async fn close(&self) {}
}

/// In-memory target. Every known table exists unless marked missing.
pub struct InMemoryTarget {
    tables: RwLock<HashMap<TableName, BTreeMap<String, Record>>>,
    missing: HashSet<TableName>,
    reachable: bool,
    injected_failures: Mutex<HashMap<TableName, u32>>,
    batch_calls: Mutex<HashMap<TableName, u64>>,
    committed_batches: Mutex<HashMap<TableName, u64>>,
}

impl InMemoryTarget {
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(HashMap::new()),
            missing: HashSet::new(),
            reachable: true,
            injected_failures: Mutex::new(HashMap::new()),
            batch_calls: Mutex::new(HashMap::new()),
            committed_batches: Mutex::new(HashMap::new()),
        }
    }

    /// A target whose connectivity check fails.
    pub fn unreachable() -> Self {
        Self {
            reachable: false,
            ..Self::new()
        }
    }

    /// Pretend `table` was never created.
    pub fn without_table(mut self, table: TableName) -> Self {
        self.missing.insert(table);
        self
    }

    /// Make the next `n` insert batches into `table` fail.
    pub fn fail_next_batches(&self, table: TableName, n: u32) {
        self.injected_failures.lock().unwrap().insert(table, n);
    }

    /// Seed a row directly, bypassing batch accounting.
    pub fn seed(&self, record: Record) {
        self.tables
            .write()
            .unwrap()
            .entry(record.table())
            .or_default()
            .insert(record.id().to_string(), record);
    }

    pub fn rows(&self, table: TableName) -> Vec<Record> {
        self.tables
            .read()
            .unwrap()
            .get(&table)
            .map(|t| t.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Number of `insert_batch` calls for `table`, including failed ones.
    pub fn batch_calls(&self, table: TableName) -> u64 {
        self.batch_calls
            .lock()
            .unwrap()
            .get(&table)
            .copied()
            .unwrap_or(0)
    }

    pub fn committed_batches(&self, table: TableName) -> u64 {
        self.committed_batches
            .lock()
            .unwrap()
            .get(&table)
            .copied()
            .unwrap_or(0)
    }

    /// Total `insert_batch` calls across all tables.
    pub fn total_batch_calls(&self) -> u64 {
        self.batch_calls.lock().unwrap().values().sum()
    }
}

impl Default for InMemoryTarget {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TargetStore for InMemoryTarget {
    async fn ping(&self) -> MigrateResult<()> {
        if self.reachable {
            Ok(())
        } else {
            Err(MigrateError::connection(
                StoreSide::Target,
                "in-memory target marked unreachable",
            ))
        }
    }

    async fn check_schema(&self, table: TableName) -> MigrateResult<()> {
        if self.missing.contains(&table) {
            return Err(MigrateError::SchemaMismatch {
                table,
                detail: "table does not exist".to_string(),
            });
        }
        Ok(())
    }

    async fn existing_ids(
        &self,
        table: TableName,
        ids: &[String],
    ) -> MigrateResult<HashSet<String>> {
        let tables = self.tables.read().unwrap();
        Ok(match tables.get(&table) {
            Some(rows) => ids.iter().filter(|id| rows.contains_key(*id)).cloned().collect(),
            None => HashSet::new(),
        })
    }

    async fn insert_batch(
        &self,
        table: TableName,
        records: &[Record],
    ) -> MigrateResult<BatchOutcome> {
        *self.batch_calls.lock().unwrap().entry(table).or_default() += 1;

        {
            let mut failures = self.injected_failures.lock().unwrap();
            if let Some(remaining) = failures.get_mut(&table) {
                if *remaining > 0 {
                    *remaining -= 1;
                    return Err(MigrateError::store("injected batch failure"));
                }
            }
        }

        if self.missing.contains(&table) {
            return Err(MigrateError::store(format!(
                "relation \"{}\" does not exist",
                table
            )));
        }

        let mut tables = self.tables.write().unwrap();
        let parent_ids: HashSet<String> = match table.parent() {
            Some(parent) => tables
                .get(&parent)
                .map(|rows| rows.keys().cloned().collect())
                .unwrap_or_default(),
            None => HashSet::new(),
        };

        // Work on a copy so a failing batch leaves the table untouched.
        let mut staged = tables.get(&table).cloned().unwrap_or_default();
        let mut outcome = BatchOutcome::default();
        for record in records {
            if let Some(parent_id) = record.parent_id() {
                if !parent_ids.contains(parent_id) {
                    return Err(MigrateError::store(format!(
                        "foreign key violation: {} {} references missing document {}",
                        table,
                        record.id(),
                        parent_id
                    )));
                }
            }
            if staged.contains_key(record.id()) {
                outcome.skipped += 1;
            } else {
                staged.insert(record.id().to_string(), record.clone());
                outcome.inserted += 1;
            }
        }
        tables.insert(table, staged);
        *self.committed_batches.lock().unwrap().entry(table).or_default() += 1;
        Ok(outcome)
    }

    async fn count(&self, table: TableName) -> MigrateResult<u64> {
        Ok(self
            .tables
            .read()
            .unwrap()
            .get(&table)
            .map(|t| t.len() as u64)
            .unwrap_or(0))
    }

    async fn close(&self) {}
}
