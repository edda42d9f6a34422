//! The migration state machine.
//!
//! ```text
//! NotStarted → Connecting → TableTransfer(documents)
//!                         → TableTransfer(extraction_results)
//!                         → TableTransfer(document_chunks)
//!                         → Verifying → Completed | PartiallyCompleted | Failed
//! ```
//!
//! Tables move one at a time, parents first, and each table moves in
//! rowid-ordered batches of `batch_size` rows, one transaction per batch.
//! Failures are contained at the narrowest scope that can absorb them:
//!
//! - a row that fails to transform is logged and skipped;
//! - a child row whose parent document is not in the target is skipped as
//!   an orphan;
//! - a batch that fails to insert is retried, then the table is abandoned
//!   and the next table starts;
//! - only a connection failure aborts the run, before any write.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::config::MigrateConfig;
use crate::error::{MigrateError, MigrateResult};
use crate::models::{Record, TableName};
use crate::progress::{NoProgress, ProgressEvent, ProgressReporter};
use crate::report::{
    MigrationReport, RejectKind, RowFailure, TableReport, TableStatus, Warning,
};
use crate::store::{BatchOutcome, SourceStore, TargetStore};
use crate::transform::transform_row;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "table", rename_all = "snake_case")]
pub enum MigrationState {
    NotStarted,
    Connecting,
    TableTransfer(TableName),
    Verifying,
    Completed,
    PartiallyCompleted,
    Failed,
}

impl MigrationState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            MigrationState::Completed | MigrationState::PartiallyCompleted | MigrationState::Failed
        )
    }
}

impl std::fmt::Display for MigrationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MigrationState::NotStarted => f.write_str("not started"),
            MigrationState::Connecting => f.write_str("connecting"),
            MigrationState::TableTransfer(table) => write!(f, "transferring {}", table),
            MigrationState::Verifying => f.write_str("verifying"),
            MigrationState::Completed => f.write_str("completed"),
            MigrationState::PartiallyCompleted => f.write_str("partially completed"),
            MigrationState::Failed => f.write_str("failed"),
        }
    }
}

/// Tuning knobs for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MigrateSettings {
    pub batch_size: usize,
    /// Extra attempts for a failed insert batch before the table is abandoned.
    pub max_retries: u32,
}

impl Default for MigrateSettings {
    fn default() -> Self {
        Self {
            batch_size: 100,
            max_retries: 1,
        }
    }
}

impl From<&MigrateConfig> for MigrateSettings {
    fn from(cfg: &MigrateConfig) -> Self {
        Self {
            batch_size: cfg.batch_size.max(1),
            max_retries: cfg.max_retries,
        }
    }
}

/// Both store handles plus settings, created once per process.
pub struct MigrationContext<S, T> {
    pub source: S,
    pub target: T,
    pub settings: MigrateSettings,
}

impl<S: SourceStore, T: TargetStore> MigrationContext<S, T> {
    pub fn new(source: S, target: T, settings: MigrateSettings) -> Self {
        Self {
            source,
            target,
            settings,
        }
    }

    /// Release both connections.
    pub async fn close(&self) {
        self.source.close().await;
        self.target.close().await;
    }
}

/// Cooperative stop request, checked between batches.
#[derive(Debug, Clone, Default)]
pub struct Shutdown(Arc<AtomicBool>);

impl Shutdown {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_triggered(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

pub struct Migrator<'a, S, T> {
    ctx: &'a MigrationContext<S, T>,
    progress: Box<dyn ProgressReporter>,
    shutdown: Shutdown,
    state: MigrationState,
    history: Vec<MigrationState>,
}

impl<'a, S: SourceStore, T: TargetStore> Migrator<'a, S, T> {
    pub fn new(ctx: &'a MigrationContext<S, T>) -> Self {
        Self {
            ctx,
            progress: Box::new(NoProgress),
            shutdown: Shutdown::new(),
            state: MigrationState::NotStarted,
            history: vec![MigrationState::NotStarted],
        }
    }

    pub fn with_progress(mut self, progress: Box<dyn ProgressReporter>) -> Self {
        self.progress = progress;
        self
    }

    pub fn with_shutdown(mut self, shutdown: Shutdown) -> Self {
        self.shutdown = shutdown;
        self
    }

    pub fn state(&self) -> MigrationState {
        self.state
    }

    fn transition(&mut self, next: MigrationState) {
        debug!(from = %self.state, to = %next, "state transition");
        self.state = next;
        self.history.push(next);
        self.progress.report(ProgressEvent::State(next));
    }

    /// Run the migration to a terminal state and return the summary.
    pub async fn run(mut self) -> MigrationReport {
        let started = Instant::now();

        self.transition(MigrationState::Connecting);
        if let Err(e) = self.connect().await {
            error!(error = %e, "aborting before any write");
            self.transition(MigrationState::Failed);
            return MigrationReport {
                state: self.state,
                history: self.history,
                tables: Vec::new(),
                warnings: Vec::new(),
                fatal: Some(e.to_string()),
                connection_failure: matches!(e, MigrateError::Connection { .. }),
                duration_ms: started.elapsed().as_millis() as u64,
            };
        }

        let mut tables = Vec::with_capacity(TableName::ALL.len());
        for table in TableName::ALL {
            if self.shutdown.is_triggered() {
                let mut report = TableReport::new(table);
                report.status = TableStatus::Failed {
                    reason: MigrateError::Interrupted.to_string(),
                };
                tables.push(report);
                continue;
            }
            self.transition(MigrationState::TableTransfer(table));
            tables.push(self.transfer_table(table).await);
        }

        self.transition(MigrationState::Verifying);
        let warnings = if self.shutdown.is_triggered() {
            Vec::new()
        } else {
            self.verify(&mut tables).await
        };

        let fatal = self
            .shutdown
            .is_triggered()
            .then(|| MigrateError::Interrupted.to_string());
        let terminal = final_state(&tables);
        self.transition(terminal);

        let report = MigrationReport {
            state: self.state,
            history: self.history,
            tables,
            warnings,
            fatal,
            connection_failure: false,
            duration_ms: started.elapsed().as_millis() as u64,
        };
        info!(
            state = %report.state,
            inserted = report.total_inserted(),
            warnings = report.warnings.len(),
            "migration finished"
        );
        report
    }

    async fn connect(&self) -> MigrateResult<()> {
        self.ctx.source.ping().await?;
        info!("source store reachable");
        self.ctx.target.ping().await?;
        info!("target store reachable");
        Ok(())
    }

    async fn transfer_table(&mut self, table: TableName) -> TableReport {
        let mut report = TableReport::new(table);
        if let Err(e) = self.copy_rows(table, &mut report).await {
            error!(table = %table, error = %e, "table transfer failed");
            report.status = TableStatus::Failed {
                reason: e.to_string(),
            };
        } else if report.status == TableStatus::Pending {
            report.status = TableStatus::Succeeded;
            info!(
                table = %table,
                inserted = report.inserted,
                skipped = report.skipped_duplicates,
                "table transferred"
            );
        }
        report
    }

    async fn copy_rows(&self, table: TableName, report: &mut TableReport) -> MigrateResult<()> {
        let source = &self.ctx.source;
        let batch_size = self.ctx.settings.batch_size.max(1);

        if !source.has_table(table).await? {
            info!(table = %table, "table absent from source, nothing to move");
            report.status = TableStatus::Absent;
            return Ok(());
        }
        self.ctx.target.check_schema(table).await?;

        report.source_rows = source.count(table).await?;
        info!(table = %table, rows = report.source_rows, "transferring table");

        let mut after_rowid = i64::MIN;
        loop {
            if self.shutdown.is_triggered() {
                return Err(MigrateError::Interrupted);
            }

            let page = source.fetch_batch(table, after_rowid, batch_size).await?;
            let Some(last) = page.last() else {
                break;
            };
            after_rowid = last.rowid;
            let batch = report.batches + 1;
            report.rows_read += page.len() as u64;

            let mut records = Vec::with_capacity(page.len());
            for row in &page {
                match transform_row(table, row) {
                    Ok(record) => records.push(record),
                    Err(MigrateError::RowTransform {
                        row, column, reason, ..
                    }) => {
                        warn!(table = %table, row = %row, column = %column, reason = %reason, "skipping row");
                        report.record_failure(RowFailure {
                            kind: RejectKind::Transform,
                            row,
                            column,
                            reason,
                        });
                    }
                    Err(other) => return Err(other),
                }
            }

            if let Some(parent) = table.parent() {
                records = self.drop_orphans(table, parent, records, report).await?;
            }

            let outcome = self.insert_with_retry(table, batch, &records).await?;
            report.batches = batch;
            report.inserted += outcome.inserted;
            report.skipped_duplicates += outcome.skipped;
            debug!(
                table = %table,
                batch,
                inserted = outcome.inserted,
                skipped = outcome.skipped,
                "batch committed"
            );
            self.progress.report(ProgressEvent::Transferring {
                table,
                batch,
                n: report.rows_read,
                total: report.source_rows,
            });

            if page.len() < batch_size {
                break;
            }
        }
        Ok(())
    }

    /// Remove child records whose parent row is not in the target.
    async fn drop_orphans(
        &self,
        table: TableName,
        parent: TableName,
        records: Vec<Record>,
        report: &mut TableReport,
    ) -> MigrateResult<Vec<Record>> {
        let wanted: Vec<String> = records
            .iter()
            .filter_map(|r| r.parent_id())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .map(str::to_string)
            .collect();
        let present = self.ctx.target.existing_ids(parent, &wanted).await?;

        let mut kept = Vec::with_capacity(records.len());
        for record in records {
            match record.parent_id() {
                Some(parent_id) if !present.contains(parent_id) => {
                    warn!(
                        table = %table,
                        row = %record.id(),
                        document_id = %parent_id,
                        "skipping orphan row"
                    );
                    report.record_failure(RowFailure {
                        kind: RejectKind::Orphan,
                        row: record.id().to_string(),
                        column: "document_id".to_string(),
                        reason: format!("references document {} which is not in the target", parent_id),
                    });
                }
                _ => kept.push(record),
            }
        }
        Ok(kept)
    }

    async fn insert_with_retry(
        &self,
        table: TableName,
        batch: u64,
        records: &[Record],
    ) -> MigrateResult<BatchOutcome> {
        let attempts = self.ctx.settings.max_retries + 1;
        let mut last_error = String::new();
        for attempt in 1..=attempts {
            if attempt > 1 && self.shutdown.is_triggered() {
                return Err(MigrateError::Interrupted);
            }
            match self.ctx.target.insert_batch(table, records).await {
                Ok(outcome) => return Ok(outcome),
                Err(e) => {
                    warn!(table = %table, batch, attempt, error = %e, "batch insert failed");
                    last_error = e.to_string();
                }
            }
        }
        Err(MigrateError::BatchInsert {
            table,
            batch,
            message: last_error,
        })
    }

    async fn verify(&self, tables: &mut [TableReport]) -> Vec<Warning> {
        let mut warnings = Vec::new();
        for report in tables.iter_mut() {
            if report.status == TableStatus::Absent {
                continue;
            }
            let table = report.table;
            let counts = async {
                let source = self.ctx.source.count(table).await?;
                let target = self.ctx.target.count(table).await?;
                Ok::<_, MigrateError>((source, target))
            }
            .await;
            match counts {
                Ok((source, target)) => {
                    report.target_rows = Some(target);
                    if source != target {
                        warn!(table = %table, source, target, "row count mismatch");
                        warnings.push(Warning::CountMismatch {
                            table,
                            source,
                            target,
                        });
                    }
                }
                Err(e) => {
                    warn!(table = %table, error = %e, "could not verify row counts");
                    warnings.push(Warning::Unverified {
                        table,
                        reason: e.to_string(),
                    });
                }
            }
        }
        warnings
    }
}

fn final_state(tables: &[TableReport]) -> MigrationState {
    let failed = tables.iter().filter(|t| t.status.is_failed()).count();
    let succeeded = tables
        .iter()
        .filter(|t| t.status == TableStatus::Succeeded)
        .count();
    match (failed, succeeded) {
        (0, _) => MigrationState::Completed,
        (_, 0) => MigrationState::Failed,
        _ => MigrationState::PartiallyCompleted,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Document, RawRow};
    use crate::store::memory::{InMemorySource, InMemoryTarget};

    fn doc_row(i: i64) -> RawRow {
        RawRow::new(i)
            .with("id", format!("doc-{}", i))
            .with("filename", format!("contract-{}.pdf", i))
            .with("file_size", 1024 + i)
            .with("uploaded_at", "2025-10-30 13:00:00")
            .with("status", "uploaded")
    }

    fn result_row(i: i64, doc: i64) -> RawRow {
        RawRow::new(i)
            .with("id", format!("res-{}", i))
            .with("document_id", format!("doc-{}", doc))
            .with("governing_law", "Delaware")
            .with("confidence_score", 0.9)
            .with("created_at", "2025-10-31 09:30:00.250000")
    }

    fn source(docs: i64, results: i64) -> InMemorySource {
        InMemorySource::new()
            .with_rows(TableName::Documents, (1..=docs).map(doc_row).collect())
            .with_rows(
                TableName::ExtractionResults,
                (1..=results).map(|i| result_row(i, (i - 1) % docs + 1)).collect(),
            )
    }

    fn settings(batch_size: usize) -> MigrateSettings {
        MigrateSettings {
            batch_size,
            max_retries: 1,
        }
    }

    #[tokio::test]
    async fn scenario_fresh_then_rerun() {
        let ctx = MigrationContext::new(source(100, 250), InMemoryTarget::new(), settings(100));

        let first = Migrator::new(&ctx).run().await;
        assert_eq!(first.state, MigrationState::Completed);
        assert_eq!(first.exit_code(), 0);
        assert!(first.warnings.is_empty(), "{:?}", first.warnings);
        let docs = first.table(TableName::Documents).unwrap();
        assert_eq!((docs.inserted, docs.source_rows, docs.skipped_duplicates), (100, 100, 0));
        let results = first.table(TableName::ExtractionResults).unwrap();
        assert_eq!(
            (results.inserted, results.source_rows, results.skipped_duplicates),
            (250, 250, 0)
        );
        assert_eq!(
            first.table(TableName::DocumentChunks).unwrap().status,
            TableStatus::Absent
        );

        let second = Migrator::new(&ctx).run().await;
        assert_eq!(second.state, MigrationState::Completed);
        assert_eq!(second.exit_code(), 0);
        assert!(second.warnings.is_empty());
        let docs = second.table(TableName::Documents).unwrap();
        assert_eq!((docs.inserted, docs.skipped_duplicates), (0, 100));
        let results = second.table(TableName::ExtractionResults).unwrap();
        assert_eq!((results.inserted, results.skipped_duplicates), (0, 250));

        assert_eq!(ctx.target.rows(TableName::Documents).len(), 100);
        assert_eq!(ctx.target.rows(TableName::ExtractionResults).len(), 250);
    }

    #[tokio::test]
    async fn issues_ceil_n_over_b_batches() {
        for (n, b) in [(0i64, 10usize), (1, 10), (10, 10), (11, 10), (95, 7)] {
            let src = InMemorySource::new()
                .with_rows(TableName::Documents, (1..=n).map(doc_row).collect());
            let ctx = MigrationContext::new(src, InMemoryTarget::new(), settings(b));
            let report = Migrator::new(&ctx).run().await;

            let expected = (n as u64).div_ceil(b as u64);
            assert_eq!(
                ctx.target.batch_calls(TableName::Documents),
                expected,
                "n={n} b={b}"
            );
            assert_eq!(report.table(TableName::Documents).unwrap().batches, expected);
        }
    }

    #[tokio::test]
    async fn malformed_row_is_skipped_and_reported() {
        let mut rows: Vec<RawRow> = (1..=5).map(doc_row).collect();
        rows[2] = doc_row(3).with("uploaded_at", "not-a-date");
        let src = InMemorySource::new().with_rows(TableName::Documents, rows);
        let ctx = MigrationContext::new(src, InMemoryTarget::new(), settings(2));

        let report = Migrator::new(&ctx).run().await;
        let docs = report.table(TableName::Documents).unwrap();
        assert_eq!(docs.status, TableStatus::Succeeded);
        assert_eq!(docs.inserted, 4);
        assert_eq!(docs.transform_failures, 1);
        assert_eq!(docs.failures[0].row, "doc-3");
        assert_eq!(docs.failures[0].column, "uploaded_at");
        // Source still holds 5 rows, target 4.
        assert_eq!(
            report.warnings,
            vec![Warning::CountMismatch {
                table: TableName::Documents,
                source: 5,
                target: 4
            }]
        );
        assert_eq!(report.state, MigrationState::Completed);
    }

    #[tokio::test]
    async fn unreachable_target_performs_no_writes() {
        let ctx = MigrationContext::new(source(3, 3), InMemoryTarget::unreachable(), settings(10));
        let report = Migrator::new(&ctx).run().await;

        assert_eq!(report.state, MigrationState::Failed);
        assert!(report.connection_failure);
        assert_eq!(report.exit_code(), crate::report::EXIT_CONNECTION_FAILURE);
        assert_eq!(ctx.target.total_batch_calls(), 0);
        assert!(report.tables.is_empty());
        assert_eq!(
            report.history,
            vec![
                MigrationState::NotStarted,
                MigrationState::Connecting,
                MigrationState::Failed
            ]
        );
    }

    #[tokio::test]
    async fn unreachable_source_is_fatal() {
        let ctx = MigrationContext::new(
            InMemorySource::unreachable(),
            InMemoryTarget::new(),
            settings(10),
        );
        let report = Migrator::new(&ctx).run().await;
        assert!(report.connection_failure);
        assert!(report.fatal.unwrap().contains("source"));
    }

    #[tokio::test]
    async fn batch_failure_is_retried_once() {
        let ctx = MigrationContext::new(source(4, 4), InMemoryTarget::new(), settings(2));
        ctx.target.fail_next_batches(TableName::Documents, 1);

        let report = Migrator::new(&ctx).run().await;
        assert_eq!(report.state, MigrationState::Completed);
        assert_eq!(ctx.target.batch_calls(TableName::Documents), 3);
        assert_eq!(ctx.target.committed_batches(TableName::Documents), 2);
        assert_eq!(report.table(TableName::Documents).unwrap().inserted, 4);
    }

    #[tokio::test]
    async fn repeated_batch_failure_fails_only_that_table() {
        let ctx = MigrationContext::new(source(4, 6), InMemoryTarget::new(), settings(2));
        ctx.target.fail_next_batches(TableName::ExtractionResults, 2);

        let report = Migrator::new(&ctx).run().await;
        assert_eq!(report.state, MigrationState::PartiallyCompleted);
        assert_eq!(report.exit_code(), 1);
        assert_eq!(report.failed_tables(), vec![TableName::ExtractionResults]);
        assert_eq!(report.table(TableName::Documents).unwrap().inserted, 4);
        // Abandoned after the first batch's two attempts.
        assert_eq!(ctx.target.batch_calls(TableName::ExtractionResults), 2);
        assert!(report
            .warnings
            .contains(&Warning::CountMismatch {
                table: TableName::ExtractionResults,
                source: 6,
                target: 0
            }));
        assert!(report.render().contains("Needs manual re-run: extraction_results"));
    }

    #[tokio::test]
    async fn schema_mismatch_skips_table_and_continues() {
        let target = InMemoryTarget::new().without_table(TableName::ExtractionResults);
        let ctx = MigrationContext::new(source(2, 2), target, settings(10));

        let report = Migrator::new(&ctx).run().await;
        let results = report.table(TableName::ExtractionResults).unwrap();
        match &results.status {
            TableStatus::Failed { reason } => assert!(reason.contains("schema mismatch")),
            other => panic!("unexpected status {other:?}"),
        }
        assert_eq!(ctx.target.batch_calls(TableName::ExtractionResults), 0);
        assert_eq!(report.table(TableName::Documents).unwrap().inserted, 2);
        assert_eq!(report.state, MigrationState::PartiallyCompleted);
    }

    #[tokio::test]
    async fn all_tables_failing_is_failed() {
        let ctx = MigrationContext::new(source(2, 2), InMemoryTarget::new(), settings(10));
        ctx.target.fail_next_batches(TableName::Documents, 2);
        ctx.target.fail_next_batches(TableName::ExtractionResults, 2);

        let report = Migrator::new(&ctx).run().await;
        assert_eq!(report.state, MigrationState::Failed);
        assert!(!report.connection_failure);
        assert_eq!(report.exit_code(), 1);
    }

    #[tokio::test]
    async fn orphans_are_skipped_not_inserted() {
        let src = InMemorySource::new()
            .with_rows(TableName::Documents, vec![doc_row(1)])
            .with_rows(
                TableName::ExtractionResults,
                vec![result_row(1, 1), result_row(2, 99)],
            );
        let ctx = MigrationContext::new(src, InMemoryTarget::new(), settings(10));

        let report = Migrator::new(&ctx).run().await;
        let results = report.table(TableName::ExtractionResults).unwrap();
        assert_eq!(results.status, TableStatus::Succeeded);
        assert_eq!(results.inserted, 1);
        assert_eq!(results.orphaned, 1);
        assert_eq!(results.failures[0].kind, RejectKind::Orphan);

        let doc_ids: Vec<String> = ctx
            .target
            .rows(TableName::Documents)
            .iter()
            .map(|r| r.id().to_string())
            .collect();
        for record in ctx.target.rows(TableName::ExtractionResults) {
            assert!(doc_ids.iter().any(|d| Some(d.as_str()) == record.parent_id()));
        }
    }

    #[tokio::test]
    async fn children_of_previously_migrated_documents_are_kept() {
        let src = InMemorySource::new()
            .with_rows(TableName::Documents, vec![])
            .with_rows(TableName::ExtractionResults, vec![result_row(1, 7)]);
        let target = InMemoryTarget::new();
        target.seed(Record::Document(Document {
            id: "doc-7".to_string(),
            filename: "old.pdf".to_string(),
            file_size: None,
            uploaded_at: None,
            status: None,
            extracted_text: None,
            document_metadata: None,
        }));
        let ctx = MigrationContext::new(src, target, settings(10));

        let report = Migrator::new(&ctx).run().await;
        assert_eq!(
            report.table(TableName::ExtractionResults).unwrap().inserted,
            1
        );
    }

    #[tokio::test]
    async fn shutdown_before_start_fails_every_table() {
        let ctx = MigrationContext::new(source(3, 3), InMemoryTarget::new(), settings(1));
        let shutdown = Shutdown::new();
        shutdown.trigger();

        let report = Migrator::new(&ctx).with_shutdown(shutdown).run().await;
        assert_eq!(report.state, MigrationState::Failed);
        assert_eq!(ctx.target.total_batch_calls(), 0);
        assert_eq!(report.fatal.as_deref(), Some("migration interrupted"));
    }

    /// Requests a stop as soon as the first batch of any table is committed.
    struct StopAfterFirstBatch(Shutdown);

    impl ProgressReporter for StopAfterFirstBatch {
        fn report(&self, event: ProgressEvent) {
            if let ProgressEvent::Transferring { .. } = event {
                self.0.trigger();
            }
        }
    }

    #[tokio::test]
    async fn interrupt_between_batches_keeps_committed_rows() {
        let ctx = MigrationContext::new(source(5, 3), InMemoryTarget::new(), settings(2));
        let shutdown = Shutdown::new();

        let report = Migrator::new(&ctx)
            .with_progress(Box::new(StopAfterFirstBatch(shutdown.clone())))
            .with_shutdown(shutdown)
            .run()
            .await;

        assert_eq!(ctx.target.rows(TableName::Documents).len(), 2);
        assert_eq!(ctx.target.committed_batches(TableName::Documents), 1);
        assert_eq!(ctx.target.total_batch_calls(), 1);

        let docs = report.table(TableName::Documents).unwrap();
        assert_eq!(docs.inserted, 2);
        assert_eq!(
            docs.status,
            TableStatus::Failed {
                reason: "migration interrupted".to_string()
            }
        );
        assert!(report.tables.iter().all(|t| t.status.is_failed()));
        assert!(report.tables.iter().all(|t| t.target_rows.is_none()));
        assert!(report.warnings.is_empty(), "verification should be skipped");
        assert_eq!(report.state, MigrationState::Failed);
        assert_eq!(report.fatal.as_deref(), Some("migration interrupted"));
        assert_eq!(report.exit_code(), 1);
    }

    #[tokio::test]
    async fn history_walks_the_state_machine() {
        let ctx = MigrationContext::new(source(1, 1), InMemoryTarget::new(), settings(10));
        let report = Migrator::new(&ctx).run().await;
        assert_eq!(
            report.history,
            vec![
                MigrationState::NotStarted,
                MigrationState::Connecting,
                MigrationState::TableTransfer(TableName::Documents),
                MigrationState::TableTransfer(TableName::ExtractionResults),
                MigrationState::TableTransfer(TableName::DocumentChunks),
                MigrationState::Verifying,
                MigrationState::Completed,
            ]
        );
        assert!(report.state.is_terminal());
    }
}
