//! Abstract Syntax Tree (AST) types for Keel schemas.
//!
//! This module contains all the types that represent a parsed Keel schema.

mod attribute;
mod datasource;
mod field;
mod model;
mod relation;
mod schema;
mod types;

pub use attribute::*;
pub use datasource::*;
pub use field::*;
pub use model::*;
pub use relation::*;
pub use schema::*;
pub use types::*;
