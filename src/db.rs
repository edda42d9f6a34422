//! Connection pools for the two stores.
//!
//! Both pools are created lazily so that construction never blocks; the
//! first real round-trip happens in the migrator's connectivity check,
//! which is bounded by the configured acquire timeout.

use anyhow::Result;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};

use crate::config::Config;

/// Read-only pool over the embedded source database.
///
/// The file is never created; a missing file surfaces as a connection
/// error on first use.
pub fn source_pool(config: &Config) -> SqlitePool {
    let options = SqliteConnectOptions::new()
        .filename(&config.source.path)
        .read_only(true)
        .create_if_missing(false);

    SqlitePoolOptions::new()
        .max_connections(1)
        .acquire_timeout(config.target.connect_timeout())
        .connect_lazy_with(options)
}

/// Pool over the PostgreSQL target.
pub fn target_pool(config: &Config) -> Result<PgPool> {
    let options = config.target.connect_options()?;

    let pool = PgPoolOptions::new()
        .max_connections(1)
        .acquire_timeout(config.target.connect_timeout())
        .connect_lazy_with(options);

    Ok(pool)
}
