//! # Contract Migrate CLI (`contract-migrate`)
//!
//! Moves the contract intelligence service's data from its embedded SQLite
//! database to PostgreSQL.
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `contract-migrate` / `contract-migrate run` | Run the migration |
//! | `contract-migrate init` | Create the target tables if missing |
//! | `contract-migrate status` | Per-table row counts on both sides |
//!
//! ## Exit codes
//!
//! | Code | Meaning |
//! |------|---------|
//! | 0 | every table migrated |
//! | 1 | at least one table failed, or a configuration error |
//! | 2 | a store was unreachable; nothing was written |
//!
//! ## Examples
//!
//! ```bash
//! # Everything from .env / the environment
//! contract-migrate
//!
//! # Explicit source and target, small batches, JSON summary
//! contract-migrate --source ./contracts.db \
//!     --target-url postgresql://contract_user:pw@localhost:5432/contract_intelligence \
//!     --batch-size 50 --json
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use contract_migrate::config::{self, Config, Overrides};
use contract_migrate::db;
use contract_migrate::logging::{self, LogFormat};
use contract_migrate::migrator::{MigrateSettings, MigrationContext, Migrator, Shutdown};
use contract_migrate::progress::ProgressMode;
use contract_migrate::report::EXIT_CONNECTION_FAILURE;
use contract_migrate::schema;
use contract_migrate::stats;
use contract_migrate::store::postgres::PostgresTarget;
use contract_migrate::store::sqlite::SqliteSource;
use contract_migrate::store::TargetStore;

type StoreContext = MigrationContext<SqliteSource, PostgresTarget>;

/// Copy the contract service's SQLite data into PostgreSQL.
///
/// Connection settings come from `DATABASE_URL` / `POSTGRES_*` in the
/// environment or a `.env` file; no flags are required.
#[derive(Parser)]
#[command(
    name = "contract-migrate",
    about = "Contract Migrate — copy the contract service's SQLite data into PostgreSQL",
    version
)]
struct Cli {
    /// Optional TOML configuration file. Ignored when it does not exist.
    #[arg(long, global = true, default_value = "./config/migrate.toml")]
    config: PathBuf,

    /// Dotenv file with `DATABASE_URL`, `POSTGRES_*` and friends.
    /// Ignored when it does not exist.
    #[arg(long, global = true, default_value = ".env")]
    env_file: PathBuf,

    /// Path to the SQLite source database.
    #[arg(long, global = true)]
    source: Option<PathBuf>,

    /// PostgreSQL URL of the target database.
    #[arg(long, global = true)]
    target_url: Option<String>,

    /// Rows per insert batch (and per transaction).
    #[arg(long, global = true)]
    batch_size: Option<usize>,

    /// Progress output on stderr. Defaults to `human` on a TTY, else `off`.
    #[arg(long, global = true, value_enum)]
    progress: Option<ProgressMode>,

    /// Print the summary as JSON instead of a table.
    #[arg(long, global = true)]
    json: bool,

    /// Log filter, e.g. `debug` or `contract_migrate=trace`.
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[arg(long, global = true, value_enum, default_value = "text")]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Clone, Copy)]
enum Commands {
    /// Copy all rows from the source into the target (default).
    ///
    /// Safe to re-run: rows already in the target are skipped.
    Run,

    /// Create the target tables and indexes if they do not exist.
    Init,

    /// Show per-table row counts in the source and the target.
    Status,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let overrides = Overrides {
        source: cli.source.clone(),
        target_url: cli.target_url.clone(),
        batch_size: cli.batch_size,
    };
    let cfg = match config::load_config(&cli.config, &cli.env_file, &overrides) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            return ExitCode::FAILURE;
        }
    };
    let filter = cli.log_level.as_deref().or(cfg.log_filter.as_deref());
    logging::init_tracing(filter, cli.log_format);

    match run(cli, cfg).await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli, cfg: Config) -> Result<u8> {
    let ctx = MigrationContext::new(
        SqliteSource::new(db::source_pool(&cfg), &cfg.source.path),
        PostgresTarget::new(db::target_pool(&cfg)?),
        MigrateSettings::from(&cfg.migrate),
    );

    let result = match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run_migration(&cfg, &ctx, &cli).await,
        Commands::Init => run_init(&ctx).await,
        Commands::Status => stats::run_status(&cfg, &ctx.source, &ctx.target)
            .await
            .map(|_| 0),
    };

    ctx.close().await;
    result
}

async fn run_migration(cfg: &Config, ctx: &StoreContext, cli: &Cli) -> Result<u8> {
    info!(
        source = %cfg.source.path.display(),
        target = %cfg.target.describe(),
        batch_size = cfg.migrate.batch_size,
        "starting migration"
    );

    let shutdown = Shutdown::new();
    let on_signal = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, stopping after the current batch");
            on_signal.trigger();
        }
    });

    let progress = cli.progress.unwrap_or_else(ProgressMode::default_for_tty);
    let report = Migrator::new(ctx)
        .with_progress(progress.reporter())
        .with_shutdown(shutdown)
        .run()
        .await;

    if cli.json {
        println!("{}", report.to_json()?);
    } else {
        print!("{}", report.render());
    }
    Ok(report.exit_code())
}

async fn run_init(ctx: &StoreContext) -> Result<u8> {
    if let Err(e) = ctx.target.ping().await {
        eprintln!("Error: {}", e);
        return Ok(EXIT_CONNECTION_FAILURE);
    }
    schema::create_schema(ctx.target.pool())
        .await
        .context("Failed to create target schema")?;
    println!("Target schema initialized.");
    Ok(0)
}
