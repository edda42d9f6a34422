//! Migration progress reporting.
//!
//! Reports observable progress while a migration runs so users see which
//! table is being copied and how far along it is. Progress is emitted on
//! **stderr** so stdout stays reserved for the summary report.

use std::io::Write;

use crate::migrator::MigrationState;
use crate::models::TableName;

/// A single progress event.
#[derive(Clone, Debug)]
pub enum ProgressEvent {
    /// The migrator entered a new state.
    State(MigrationState),
    /// Rows of `table` processed so far, out of the source count.
    Transferring {
        table: TableName,
        batch: u64,
        n: u64,
        total: u64,
    },
}

/// Reports migration progress. Implementations write to stderr (human or JSON).
pub trait ProgressReporter: Send + Sync {
    fn report(&self, event: ProgressEvent);
}

/// Human-friendly progress on stderr: "migrate documents  batch 3  300 / 1,250 rows".
pub struct StderrProgress;

impl ProgressReporter for StderrProgress {
    fn report(&self, event: ProgressEvent) {
        let line = match &event {
            ProgressEvent::State(state) => format!("migrate  {}\n", state),
            ProgressEvent::Transferring {
                table,
                batch,
                n,
                total,
            } => format!(
                "migrate {}  batch {}  {} / {} rows\n",
                table,
                batch,
                format_number(*n),
                format_number(*total)
            ),
        };
        let mut err = std::io::stderr().lock();
        let _ = err.write_all(line.as_bytes());
        let _ = err.flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl ProgressReporter for JsonProgress {
    fn report(&self, event: ProgressEvent) {
        let obj = match &event {
            ProgressEvent::State(state) => serde_json::json!({
                "event": "state",
                "state": state.to_string(),
            }),
            ProgressEvent::Transferring {
                table,
                batch,
                n,
                total,
            } => serde_json::json!({
                "event": "progress",
                "table": table,
                "batch": batch,
                "n": n,
                "total": total
            }),
        };
        if let Ok(line) = serde_json::to_string(&obj) {
            let mut err = std::io::stderr().lock();
            let _ = writeln!(err, "{}", line);
            let _ = err.flush();
        }
    }
}

/// No-op reporter when progress is disabled.
pub struct NoProgress;

impl ProgressReporter for NoProgress {
    fn report(&self, _event: ProgressEvent) {}
}

/// `1234567` → `"1,234,567"`.
pub(crate) fn format_number(n: u64) -> String {
    let digits = n.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, digit) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }
    grouped
}

/// Progress mode for the CLI: off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq, clap::ValueEnum)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Default: human progress when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    pub fn reporter(&self) -> Box<dyn ProgressReporter> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}
