//! # keel-schema
//!
//! Schema parser and AST for Keel.
//!
//! This crate provides:
//! - A parser for `.keel` schema files
//! - Configuration parsing for `keel.toml` files
//! - Abstract Syntax Tree (AST) types for schema representation
//! - Semantic validation
//!
//! ## Example
//!
//! ```rust
//! use keel_schema::validate_schema;
//!
//! let schema = validate_schema(r#"
//!     model User {
//!         id    Int    @id @default(autoincrement())
//!         email String @unique
//!         name  String?
//!     }
//! "#).unwrap();
//!
//! assert_eq!(schema.model_names().collect::<Vec<_>>(), ["User"]);
//! ```

pub mod ast;
pub mod config;
pub mod error;
pub mod parser;
pub mod validator;

pub use ast::*;
pub use config::KeelConfig;
pub use error::{SchemaError, SchemaResult};
pub use parser::{parse_schema, parse_schema_file};
pub use validator::{Validator, validate_document, validate_schema};
