//! Migration summary report.
//!
//! Collects per-table counters while the migrator runs and renders them as
//! a table for humans or as JSON for scripts.

use std::fmt::Write as _;

use serde::Serialize;

use crate::migrator::MigrationState;
use crate::models::TableName;
use crate::progress::format_number;

/// Row failures kept per table for display; counters stay exact.
pub const MAX_RECORDED_FAILURES: usize = 50;

/// Exit code when the run aborted on a connection failure.
pub const EXIT_CONNECTION_FAILURE: u8 = 2;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TableStatus {
    Pending,
    Succeeded,
    /// The table does not exist in the source; nothing to move.
    Absent,
    Failed {
        reason: String,
    },
}

impl TableStatus {
    pub fn is_failed(&self) -> bool {
        matches!(self, TableStatus::Failed { .. })
    }

    fn label(&self) -> &'static str {
        match self {
            TableStatus::Pending => "pending",
            TableStatus::Succeeded => "ok",
            TableStatus::Absent => "absent",
            TableStatus::Failed { .. } => "FAILED",
        }
    }
}

/// Why a single row was left behind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectKind {
    Transform,
    Orphan,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RowFailure {
    pub kind: RejectKind,
    pub row: String,
    pub column: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableReport {
    pub table: TableName,
    #[serde(flatten)]
    pub status: TableStatus,
    /// Row count in the source when the table transfer started.
    pub source_rows: u64,
    pub rows_read: u64,
    pub inserted: u64,
    pub skipped_duplicates: u64,
    pub transform_failures: u64,
    pub orphaned: u64,
    pub batches: u64,
    /// Row count in the target after verification.
    pub target_rows: Option<u64>,
    pub failures: Vec<RowFailure>,
}

impl TableReport {
    pub fn new(table: TableName) -> Self {
        Self {
            table,
            status: TableStatus::Pending,
            source_rows: 0,
            rows_read: 0,
            inserted: 0,
            skipped_duplicates: 0,
            transform_failures: 0,
            orphaned: 0,
            batches: 0,
            target_rows: None,
            failures: Vec::new(),
        }
    }

    pub fn record_failure(&mut self, failure: RowFailure) {
        match failure.kind {
            RejectKind::Transform => self.transform_failures += 1,
            RejectKind::Orphan => self.orphaned += 1,
        }
        if self.failures.len() < MAX_RECORDED_FAILURES {
            self.failures.push(failure);
        }
    }
}

/// Non-fatal findings surfaced in the summary.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Warning {
    /// Source and target row counts differ after transfer.
    CountMismatch {
        table: TableName,
        source: u64,
        target: u64,
    },
    /// Counts could not be compared.
    Unverified { table: TableName, reason: String },
}

impl std::fmt::Display for Warning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Warning::CountMismatch {
                table,
                source,
                target,
            } => write!(
                f,
                "{}: row count mismatch (source {}, target {})",
                table, source, target
            ),
            Warning::Unverified { table, reason } => {
                write!(f, "{}: could not verify counts: {}", table, reason)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MigrationReport {
    pub state: MigrationState,
    pub history: Vec<MigrationState>,
    pub tables: Vec<TableReport>,
    pub warnings: Vec<Warning>,
    /// Set when the run aborted as a whole.
    pub fatal: Option<String>,
    pub connection_failure: bool,
    pub duration_ms: u64,
}

impl MigrationReport {
    pub fn table(&self, table: TableName) -> Option<&TableReport> {
        self.tables.iter().find(|t| t.table == table)
    }

    /// Tables that need a manual re-run.
    pub fn failed_tables(&self) -> Vec<TableName> {
        self.tables
            .iter()
            .filter(|t| t.status.is_failed())
            .map(|t| t.table)
            .collect()
    }

    pub fn total_inserted(&self) -> u64 {
        self.tables.iter().map(|t| t.inserted).sum()
    }

    pub fn exit_code(&self) -> u8 {
        if self.connection_failure {
            return EXIT_CONNECTION_FAILURE;
        }
        match self.state {
            MigrationState::Completed => 0,
            _ => 1,
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Render the human-readable summary table.
    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Migration summary");
        let _ = writeln!(out, "=================");
        let _ = writeln!(out);

        if let Some(fatal) = &self.fatal {
            let _ = writeln!(out, "  Aborted: {}", fatal);
            let _ = writeln!(out);
        }

        if !self.tables.is_empty() {
            let _ = writeln!(
                out,
                "  {:<20} {:<8} {:>8} {:>15} {:>8} {:>7} {:>9} {:>8}",
                "TABLE", "STATUS", "READ", "INSERTED", "SKIPPED", "FAILED", "ORPHANED", "BATCHES"
            );
            let _ = writeln!(out, "  {}", "-".repeat(92));
            for t in &self.tables {
                let inserted = format!(
                    "{}/{}",
                    format_number(t.inserted),
                    format_number(t.source_rows)
                );
                let _ = writeln!(
                    out,
                    "  {:<20} {:<8} {:>8} {:>15} {:>8} {:>7} {:>9} {:>8}",
                    t.table.as_str(),
                    t.status.label(),
                    format_number(t.rows_read),
                    inserted,
                    format_number(t.skipped_duplicates),
                    format_number(t.transform_failures),
                    format_number(t.orphaned),
                    t.batches
                );
            }
        }

        for t in &self.tables {
            if let TableStatus::Failed { reason } = &t.status {
                let _ = writeln!(out);
                let _ = writeln!(out, "  {} failed: {}", t.table, reason);
            }
        }

        let rejected: Vec<&TableReport> =
            self.tables.iter().filter(|t| !t.failures.is_empty()).collect();
        if !rejected.is_empty() {
            let _ = writeln!(out);
            let _ = writeln!(out, "  Skipped rows:");
            for t in rejected {
                for f in &t.failures {
                    let _ = writeln!(
                        out,
                        "    {} row {}: {}: {}",
                        t.table, f.row, f.column, f.reason
                    );
                }
                let total = t.transform_failures + t.orphaned;
                if total > t.failures.len() as u64 {
                    let _ = writeln!(
                        out,
                        "    {} ... and {} more",
                        t.table,
                        total - t.failures.len() as u64
                    );
                }
            }
        }

        if !self.warnings.is_empty() {
            let _ = writeln!(out);
            let _ = writeln!(out, "  Warnings:");
            for w in &self.warnings {
                let _ = writeln!(out, "    - {}", w);
            }
        }

        let failed = self.failed_tables();
        if !failed.is_empty() {
            let names: Vec<&str> = failed.iter().map(|t| t.as_str()).collect();
            let _ = writeln!(out);
            let _ = writeln!(out, "  Needs manual re-run: {}", names.join(", "));
        }

        let _ = writeln!(out);
        let _ = writeln!(
            out,
            "  Result: {} ({} rows inserted in {:.2}s)",
            self.state,
            format_number(self.total_inserted()),
            self.duration_ms as f64 / 1000.0
        );
        out
    }
}
