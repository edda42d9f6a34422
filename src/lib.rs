//! # Contract Migrate
//!
//! One-shot data migration for the contract intelligence service: copies
//! documents, extraction results and document chunks from the embedded
//! SQLite database into PostgreSQL.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────────────┐   ┌──────────────┐
//! │ SqliteSource │──▶│       Migrator        │──▶│PostgresTarget│
//! │  (rowid      │   │ transform → orphans → │   │ (batch tx,   │
//! │   batches)   │   │ insert → verify       │   │  ON CONFLICT)│
//! └──────────────┘   └──────────┬───────────┘   └──────────────┘
//!                               ▼
//!                        MigrationReport
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! contract-migrate init      # create target tables if missing
//! contract-migrate status    # row counts on both sides
//! contract-migrate           # run the migration
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | Layered configuration (TOML, `.env`, environment) |
//! | [`db`] | Connection pools |
//! | [`error`] | Migration error taxonomy |
//! | [`models`] | Tables, raw rows, typed records |
//! | [`transform`] | Raw row → typed record validation |
//! | [`store`] | Source/target store traits and implementations |
//! | [`migrator`] | The migration state machine |
//! | [`report`] | Summary report |
//! | [`progress`] | Progress reporting |
//! | [`schema`] | Target schema bootstrap |
//! | [`stats`] | Per-table status |
//! | [`logging`] | Tracing setup |

pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod migrator;
pub mod models;
pub mod progress;
pub mod report;
pub mod schema;
pub mod stats;
pub mod store;
pub mod transform;
