//! Per-table row counts for both stores.
//!
//! Used by `contract-migrate status` to show what a run would move and what
//! the target already holds. Either store being unreachable is reported
//! inline rather than aborting, so the command doubles as a connectivity
//! check.

use anyhow::Result;

use crate::config::Config;
use crate::models::TableName;
use crate::progress::format_number;
use crate::store::{SourceStore, TargetStore};

/// What one store reported for one table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableCount {
    Rows(u64),
    /// The table does not exist in this store.
    Missing,
    Error(String),
}

impl std::fmt::Display for TableCount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TableCount::Rows(n) => f.write_str(&format_number(*n)),
            TableCount::Missing => f.write_str("missing"),
            TableCount::Error(_) => f.write_str("error"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct StoreStatus {
    pub reachable: Result<(), String>,
    pub counts: Vec<(TableName, TableCount)>,
}

pub async fn source_status<S: SourceStore>(source: &S) -> StoreStatus {
    if let Err(e) = source.ping().await {
        return StoreStatus {
            reachable: Err(e.to_string()),
            counts: Vec::new(),
        };
    }
    let mut counts = Vec::new();
    for table in TableName::ALL {
        let count = match source.has_table(table).await {
            Ok(false) => TableCount::Missing,
            Ok(true) => match source.count(table).await {
                Ok(n) => TableCount::Rows(n),
                Err(e) => TableCount::Error(e.to_string()),
            },
            Err(e) => TableCount::Error(e.to_string()),
        };
        counts.push((table, count));
    }
    StoreStatus {
        reachable: Ok(()),
        counts,
    }
}

pub async fn target_status<T: TargetStore>(target: &T) -> StoreStatus {
    if let Err(e) = target.ping().await {
        return StoreStatus {
            reachable: Err(e.to_string()),
            counts: Vec::new(),
        };
    }
    let mut counts = Vec::new();
    for table in TableName::ALL {
        let count = match target.check_schema(table).await {
            Err(crate::error::MigrateError::SchemaMismatch { .. }) => TableCount::Missing,
            Err(e) => TableCount::Error(e.to_string()),
            Ok(()) => match target.count(table).await {
                Ok(n) => TableCount::Rows(n),
                Err(e) => TableCount::Error(e.to_string()),
            },
        };
        counts.push((table, count));
    }
    StoreStatus {
        reachable: Ok(()),
        counts,
    }
}

/// Run the status command: query both stores and print a summary.
pub async fn run_status<S: SourceStore, T: TargetStore>(
    config: &Config,
    source: &S,
    target: &T,
) -> Result<()> {
    let src = source_status(source).await;
    let dst = target_status(target).await;

    let db_size = std::fs::metadata(&config.source.path)
        .map(|m| m.len())
        .unwrap_or(0);

    println!("Contract Migrate — Store Status");
    println!("===============================");
    println!();
    println!("  Source:      {}", config.source.path.display());
    println!("  Size:        {}", format_bytes(db_size));
    if let Err(e) = &src.reachable {
        println!("  Unreachable: {}", e);
    }
    println!("  Target:      {}", config.target.describe());
    if let Err(e) = &dst.reachable {
        println!("  Unreachable: {}", e);
    }
    println!();

    print!("{}", render_counts(&src, &dst));
    println!();
    Ok(())
}

fn render_counts(src: &StoreStatus, dst: &StoreStatus) -> String {
    let lookup = |status: &StoreStatus, table: TableName| -> String {
        if status.reachable.is_err() {
            return "-".to_string();
        }
        status
            .counts
            .iter()
            .find(|(t, _)| *t == table)
            .map(|(_, c)| c.to_string())
            .unwrap_or_else(|| "-".to_string())
    };

    let mut out = String::new();
    out.push_str(&format!(
        "  {:<24} {:>10} {:>10}\n",
        "TABLE", "SOURCE", "TARGET"
    ));
    out.push_str(&format!("  {}\n", "-".repeat(46)));
    for table in TableName::ALL {
        out.push_str(&format!(
            "  {:<24} {:>10} {:>10}\n",
            table.as_str(),
            lookup(src, table),
            lookup(dst, table)
        ));
    }

    for status in [src, dst] {
        for (table, count) in &status.counts {
            if let TableCount::Error(e) = count {
                out.push_str(&format!("  {}: {}\n", table, e));
            }
        }
    }
    out
}

/// Format a byte count as a human-readable string.
fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}
