//! # Keel
//!
//! Schema-driven relational database tooling.
//!
//! Keel provides:
//! - A schema definition language for data models, enums, views and composite types
//! - A differ that turns two schema versions into an ordered list of changes
//! - SQLite DDL synthesis for those changes
//! - Timestamped migration files, applied transactionally and tracked in a
//!   checksummed ledger table
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use keel::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     keel::logging::init();
//!
//!     let config = KeelConfig::from_file("keel.toml")?;
//!     let generator = MigrationGenerator::new(&config.migrations.directory);
//!     generator.generate_next(&config.schema.path, "init").await?;
//!
//!     let executor = SqliteExecutor::open("app.db")?;
//!     let manager = MigrationManager::new(executor, MigrationConfig::from_keel_config(&config));
//!     manager.initialize().await?;
//!     manager.apply_pending_migrations(ApplyOptions::new()).await?;
//!     Ok(())
//! }
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod logging;

/// Schema parsing, AST types and validation.
pub mod schema {
    pub use keel_schema::*;
}

/// Diffing, DDL synthesis and migrations.
pub mod migrate {
    pub use keel_migrate::*;
}

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::migrate::{
        ApplyOptions, MigrationConfig, MigrationGenerator, MigrationManager, SchemaChange,
        SqlExecutor, diff,
    };
    #[cfg(feature = "sqlite")]
    pub use crate::migrate::SqliteExecutor;
    pub use crate::schema::{KeelConfig, SchemaDocument, parse_schema, validate_schema};
}

// Re-export key types at the crate root
pub use migrate::MigrationError;
pub use schema::{KeelConfig, SchemaDocument, SchemaError};
