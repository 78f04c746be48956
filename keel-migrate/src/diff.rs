//! Schema diffing for generating migrations.
//!
//! [`diff`] compares two parsed schemas and produces an ordered list of
//! [`SchemaChange`]s, each carrying the SQL that performs it. Only additive
//! changes plus table and index drops are representable; removing or altering
//! a column is reported as [`SchemaError::UnsupportedChange`]. Columns added to
//! an existing table carry no primary or foreign key clause.

use indexmap::IndexMap;
use keel_schema::{Field, Model, SchemaDocument, SchemaError, SchemaResult, validate_document};
use tracing::{debug, warn};

use crate::naming::{column_name, table_name};
use crate::sql::{DdlSynthesizer, IndexDef, drop_table_sql};

/// Model-level attributes that shape the table definition itself.
const TABLE_ATTRIBUTES: [&str; 4] = ["map", "id", "unique", "check"];

/// A single schema change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaChange {
    /// Create a table for a new model.
    CreateTable {
        /// Model name.
        model: String,
        /// Table name.
        table: String,
        /// `CREATE TABLE` statement.
        sql: String,
    },
    /// Drop the table of a removed model.
    DropTable {
        /// Model name.
        model: String,
        /// Table name.
        table: String,
        /// `DROP TABLE` statement.
        sql: String,
    },
    /// Add a column for a new field.
    AddColumn {
        /// Table name.
        table: String,
        /// Column name.
        column: String,
        /// `ALTER TABLE ... ADD COLUMN` statement.
        sql: String,
    },
    /// Create an index.
    CreateIndex {
        /// Table name.
        table: String,
        /// Index name.
        name: String,
        /// `CREATE INDEX` statement.
        sql: String,
    },
    /// Drop an index.
    DropIndex {
        /// Table name.
        table: String,
        /// Index name.
        name: String,
        /// `DROP INDEX` statement.
        sql: String,
    },
}

impl SchemaChange {
    /// The SQL statement performing this change.
    pub fn sql(&self) -> &str {
        match self {
            Self::CreateTable { sql, .. }
            | Self::DropTable { sql, .. }
            | Self::AddColumn { sql, .. }
            | Self::CreateIndex { sql, .. }
            | Self::DropIndex { sql, .. } => sql,
        }
    }

    /// The table this change touches.
    pub fn table(&self) -> &str {
        match self {
            Self::CreateTable { table, .. }
            | Self::DropTable { table, .. }
            | Self::AddColumn { table, .. }
            | Self::CreateIndex { table, .. }
            | Self::DropIndex { table, .. } => table,
        }
    }

    /// One-line description.
    pub fn describe(&self) -> String {
        match self {
            Self::CreateTable { model, table, .. } => format!("Create table {table} (model {model})"),
            Self::DropTable { model, table, .. } => format!("Drop table {table} (model {model})"),
            Self::AddColumn { table, column, .. } => format!("Add column {table}.{column}"),
            Self::CreateIndex { table, name, .. } => format!("Create index {name} on {table}"),
            Self::DropIndex { table, name, .. } => format!("Drop index {name} on {table}"),
        }
    }

    fn kind_index(&self) -> usize {
        match self {
            Self::CreateTable { .. } => 0,
            Self::DropTable { .. } => 1,
            Self::AddColumn { .. } => 2,
            Self::CreateIndex { .. } => 3,
            Self::DropIndex { .. } => 4,
        }
    }
}

/// Get a human-readable summary of a batch of changes.
pub fn summary(changes: &[SchemaChange]) -> String {
    const LABELS: [(&str, &str); 5] = [
        ("Create", "tables"),
        ("Drop", "tables"),
        ("Add", "columns"),
        ("Create", "indexes"),
        ("Drop", "indexes"),
    ];

    let mut counts = [0usize; 5];
    for change in changes {
        counts[change.kind_index()] += 1;
    }

    let parts: Vec<String> = LABELS
        .iter()
        .zip(counts)
        .filter(|(_, count)| *count > 0)
        .map(|((verb, noun), count)| format!("{verb} {count} {noun}"))
        .collect();

    if parts.is_empty() {
        "No changes".to_string()
    } else {
        parts.join(", ")
    }
}

/// Compute the ordered changes that turn `old` into `new`.
///
/// `new` is validated first. Models of `new` are visited in declaration
/// order, then models of `old` that no longer exist are dropped in their
/// declaration order.
pub fn diff(old: &SchemaDocument, new: &SchemaDocument) -> SchemaResult<Vec<SchemaChange>> {
    validate_document(new)?;

    let old_models: IndexMap<&str, &Model> = old.models().map(|m| (m.name(), m)).collect();
    let new_models: IndexMap<&str, &Model> = new.models().map(|m| (m.name(), m)).collect();

    let differ = ModelDiffer {
        old: DdlSynthesizer::new(old),
        new: DdlSynthesizer::new(new),
    };
    let mut changes = Vec::new();

    for (name, model) in &new_models {
        match old_models.get(name) {
            None => differ.create_model(model, &mut changes)?,
            Some(previous) => differ.alter_model(previous, model, &mut changes)?,
        }
    }

    for (name, model) in &old_models {
        if !new_models.contains_key(name) {
            let table = table_name(model);
            changes.push(SchemaChange::DropTable {
                model: name.to_string(),
                sql: drop_table_sql(&table),
                table,
            });
        }
    }

    debug!(changes = changes.len(), summary = %summary(&changes), "diffed schemas");
    Ok(changes)
}

struct ModelDiffer<'a> {
    old: DdlSynthesizer<'a>,
    new: DdlSynthesizer<'a>,
}

impl ModelDiffer<'_> {
    fn create_model(&self, model: &Model, changes: &mut Vec<SchemaChange>) -> SchemaResult<()> {
        let created = self.new.create_table(model)?;
        changes.push(SchemaChange::CreateTable {
            model: model.name().to_string(),
            table: created.table_name,
            sql: created.table_sql,
        });
        changes.extend(self.new.indexes(model).into_iter().map(create_index));
        Ok(())
    }

    fn alter_model(
        &self,
        old: &Model,
        new: &Model,
        changes: &mut Vec<SchemaChange>,
    ) -> SchemaResult<()> {
        for attr in TABLE_ATTRIBUTES {
            if !same_model_attributes(old, new, attr) {
                return Err(SchemaError::unsupported_change(
                    new.name(),
                    format!("@@{attr}"),
                    "table-level constraints cannot be changed in place",
                ));
            }
        }

        for field in &old.fields {
            let kept = new.get_field(field.name());
            let removed = match kept {
                None => self.old.is_column(field) || has_foreign_key(field),
                Some(kept) => self.old.is_column(field) && !self.new.is_column(kept),
            };
            if removed {
                return Err(SchemaError::unsupported_change(
                    new.name(),
                    field.name(),
                    "removing a column or foreign key is not supported",
                ));
            }
        }

        let table = table_name(new);
        for field in &new.fields {
            match old.get_field(field.name()) {
                Some(previous) if !same_field(previous, field) => {
                    return Err(SchemaError::unsupported_change(
                        new.name(),
                        field.name(),
                        "changing a field's type or attributes is not supported",
                    ));
                }
                Some(_) => {}
                None if has_foreign_key(field) => {
                    // The scalar columns arrive as their own AddColumn changes.
                    warn!(
                        model = new.name(),
                        field = field.name(),
                        "foreign key constraint not added to existing table"
                    );
                }
                None if self.new.is_column(field) => {
                    changes.push(SchemaChange::AddColumn {
                        table: table.clone(),
                        column: column_name(field),
                        sql: self.new.add_column(new, field)?,
                    });
                    if let Some(index) = self.new.unique_index(new, field) {
                        changes.push(create_index(index));
                    }
                }
                None => {}
            }
        }

        self.diff_indexes(old, new, changes);
        Ok(())
    }

    fn diff_indexes(&self, old: &Model, new: &Model, changes: &mut Vec<SchemaChange>) {
        let old_indexes: IndexMap<String, IndexDef> = self
            .old
            .indexes(old)
            .into_iter()
            .map(|i| (i.name.clone(), i))
            .collect();
        let new_indexes: IndexMap<String, IndexDef> = self
            .new
            .indexes(new)
            .into_iter()
            .map(|i| (i.name.clone(), i))
            .collect();

        for (name, index) in &new_indexes {
            match old_indexes.get(name) {
                None => changes.push(create_index(index.clone())),
                Some(previous) if previous.columns != index.columns => {
                    changes.push(drop_index(previous.clone()));
                    changes.push(create_index(index.clone()));
                }
                Some(_) => {}
            }
        }

        for (name, index) in &old_indexes {
            if !new_indexes.contains_key(name) {
                changes.push(drop_index(index.clone()));
            }
        }
    }
}

fn create_index(index: IndexDef) -> SchemaChange {
    SchemaChange::CreateIndex {
        sql: index.create_sql(),
        table: index.table,
        name: index.name,
    }
}

fn drop_index(index: IndexDef) -> SchemaChange {
    SchemaChange::DropIndex {
        sql: index.drop_sql(),
        table: index.table,
        name: index.name,
    }
}

fn has_foreign_key(field: &Field) -> bool {
    field.relation().is_some_and(|r| r.has_foreign_key())
}

/// Compare type and attributes, ignoring source spans and `@index`.
fn same_field(old: &Field, new: &Field) -> bool {
    let attrs = |field: &Field| {
        field
            .attributes
            .iter()
            .filter(|a| !a.is("index"))
            .map(|a| (a.name().to_string(), a.args.clone()))
            .collect::<Vec<_>>()
    };
    old.field_type == new.field_type && attrs(old) == attrs(new)
}

fn same_model_attributes(old: &Model, new: &Model, name: &str) -> bool {
    let args = |model: &Model| {
        model
            .attributes_named(name)
            .map(|a| a.args.clone())
            .collect::<Vec<_>>()
    };
    args(old) == args(new)
}
