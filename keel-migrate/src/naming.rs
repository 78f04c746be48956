//! Table, column and index naming shared by the synthesizer and the differ.

use convert_case::{Case, Casing};
use keel_schema::{Field, Model};

/// Table name for a model: the `@@map` value, or the model name in snake_case.
pub fn table_name(model: &Model) -> String {
    model
        .mapped_name()
        .map(str::to_string)
        .unwrap_or_else(|| model.name().to_case(Case::Snake))
}

/// Column name for a field: the `@map` value, or the field name in snake_case.
pub fn column_name(field: &Field) -> String {
    field
        .mapped_name()
        .map(str::to_string)
        .unwrap_or_else(|| field.name().to_case(Case::Snake))
}

/// Column name for a field referenced by name, falling back to snake_case
/// when the model has no such field.
pub fn column_for(model: &Model, field: &str) -> String {
    model
        .get_field(field)
        .map(column_name)
        .unwrap_or_else(|| field.to_case(Case::Snake))
}

/// Default index name: `idx_<table>_<columns joined by _>`.
pub fn default_index_name(table: &str, columns: &[String]) -> String {
    format!("idx_{}_{}", table, columns.join("_"))
}

/// Default unique index name: `uq_<table>_<columns joined by _>`.
pub fn default_unique_name(table: &str, columns: &[String]) -> String {
    format!("uq_{}_{}", table, columns.join("_"))
}

/// Double-quote an identifier, doubling embedded quotes.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Quote and comma-join a list of identifiers.
pub fn quote_list(names: &[String]) -> String {
    names
        .iter()
        .map(|n| quote_ident(n))
        .collect::<Vec<_>>()
        .join(", ")
}
