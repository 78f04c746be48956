//! # keel-migrate
//!
//! Migration engine for Keel.
//!
//! This crate provides functionality for:
//! - Schema diffing between two Keel schema documents
//! - SQLite DDL synthesis from models
//! - Migration file generation and management on the filesystem
//! - Migration history tracking in a checksummed ledger table
//! - Transactional, ordered migration application and database reset
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐     ┌────────────────┐     ┌─────────────┐
//! │ Keel Schema  │────▶│ Schema Differ  │────▶│ DDL Synth   │
//! └──────────────┘     └────────────────┘     └─────────────┘
//!                                                    │
//!                                                    ▼
//!                      ┌────────────────┐     ┌─────────────┐
//!                      │ Migration Mgr  │◀────│ Files       │
//!                      └────────────────┘     └─────────────┘
//!                              │
//!                              ▼
//!                      ┌────────────────┐
//!                      │ Ledger Table   │
//!                      └────────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use keel_migrate::{ApplyOptions, MigrationConfig, MigrationGenerator, MigrationManager};
//! use keel_migrate::sqlite::SqliteExecutor;
//!
//! async fn run() -> Result<(), Box<dyn std::error::Error>> {
//!     let generator = MigrationGenerator::new("./migrations");
//!     generator.generate_next("schema.keel", "add posts").await?;
//!
//!     let executor = SqliteExecutor::open("app.db")?;
//!     let manager = MigrationManager::new(executor, MigrationConfig::new());
//!     manager.initialize().await?;
//!
//!     let report = manager.apply_pending_migrations(ApplyOptions::new()).await?;
//!     println!("{}", report.summary());
//!
//!     manager.close().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Migration Files
//!
//! Migrations are single SQL files named `<timestamp>_<slug>.sql`, where the
//! timestamp is `YYYYMMDDHHMMSS` in UTC:
//!
//! ```text
//! migrations/
//! ├── 20240101120000_create_users.sql
//! ├── 20240102090000_add_posts.sql
//! └── schema.snapshot.keel
//! ```

pub mod diff;
pub mod engine;
pub mod error;
pub mod executor;
pub mod file;
pub mod generator;
pub mod history;
pub mod naming;
pub mod registry;
pub mod sql;
#[cfg(feature = "sqlite")]
pub mod sqlite;

// Re-exports
pub use diff::{SchemaChange, diff, summary};
pub use engine::{
    ApplyOptions, ApplyReport, ManagerState, MigrationConfig, MigrationManager,
    MigrationOutcome, MigrationStatusEntry, OutcomeStatus, ResetReport,
};
pub use error::{MigrateResult, MigrationError};
pub use executor::{ExecutionError, ExecutionResult, Row, SqlExecutor, SqlValue, Transaction};
pub use file::{MigrationFile, MigrationFileManager, compute_checksum};
pub use generator::MigrationGenerator;
pub use history::{MigrationHistory, MigrationRecord};
pub use registry::{ConnectionOptions, ExecutorRegistry};
pub use sql::{CreateTableSql, DdlSynthesizer, IndexDef};
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteExecutor;
