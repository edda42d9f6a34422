//! Tracing setup.
//!
//! Logs go to stderr so the summary on stdout stays parseable. The filter
//! comes from `--log-level`, then `CONTRACT_MIGRATE_LOG` (process env or
//! `.env`, resolved by [`crate::config`]), then `info`.

use tracing_subscriber::EnvFilter;

pub const LOG_ENV: &str = "CONTRACT_MIGRATE_LOG";

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

pub fn init_tracing(filter: Option<&str>, format: LogFormat) {
    let filter = EnvFilter::new(filter.unwrap_or("info"));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    // A second init (e.g. from tests) keeps the first subscriber.
    let _ = match format {
        LogFormat::Text => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
}
