//! SQL DDL synthesis for SQLite-compatible databases.
//!
//! [`DdlSynthesizer`] turns a model of a [`SchemaDocument`] into a
//! `CREATE TABLE` statement plus its `CREATE INDEX` statements. The clause
//! order inside `CREATE TABLE` is fixed: columns, a separate primary key,
//! unique constraints, checks, then foreign keys.

use keel_schema::{
    AttributeArgs, DefaultFunction, Field, Literal, Model, ReferentialAction, ScalarType,
    SchemaDocument, SchemaError, SchemaResult,
};
use tracing::{debug, warn};

use crate::naming::{
    column_for, column_name, default_index_name, default_unique_name, quote_ident, quote_list,
    table_name,
};

/// Expression generating a random RFC 4122 version 4 UUID.
const UUID_EXPR: &str = "(lower(hex(randomblob(4)) || '-' || hex(randomblob(2)) || '-4' || \
     substr(hex(randomblob(2)), 2) || '-' || substr('89ab', 1 + (abs(random()) % 4), 1) || \
     substr(hex(randomblob(2)), 2) || '-' || hex(randomblob(6))))";

/// Expression generating a collision-resistant id with a `c` prefix.
const CUID_EXPR: &str = "('c' || lower(hex(randomblob(12))))";

/// Expression generating a random 22 character id.
const NANOID_EXPR: &str = "(lower(hex(randomblob(11))))";

/// SQL for one new table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateTableSql {
    /// Resolved table name.
    pub table_name: String,
    /// The `CREATE TABLE` statement.
    pub table_sql: String,
    /// `CREATE INDEX` statements for the table.
    pub index_sqls: Vec<String>,
}

/// A standalone index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexDef {
    /// Index name.
    pub name: String,
    /// Indexed table.
    pub table: String,
    /// Indexed columns, in order.
    pub columns: Vec<String>,
    /// Whether this is a `UNIQUE` index.
    pub unique: bool,
}

impl IndexDef {
    /// The `CREATE [UNIQUE] INDEX` statement.
    pub fn create_sql(&self) -> String {
        format!(
            "CREATE {}INDEX {} ON {} ({});",
            if self.unique { "UNIQUE " } else { "" },
            quote_ident(&self.name),
            quote_ident(&self.table),
            quote_list(&self.columns)
        )
    }

    /// The `DROP INDEX` statement.
    pub fn drop_sql(&self) -> String {
        drop_index_sql(&self.name)
    }
}

/// `DROP TABLE IF EXISTS` for a table.
pub fn drop_table_sql(table: &str) -> String {
    format!("DROP TABLE IF EXISTS {};", quote_ident(table))
}

/// `DROP INDEX IF EXISTS` for an index.
pub fn drop_index_sql(name: &str) -> String {
    format!("DROP INDEX IF EXISTS {};", quote_ident(name))
}

/// Quote a string literal, doubling embedded single quotes.
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Map a field type to its column type.
///
/// Enum and other non-scalar types are stored as integers.
pub fn column_type(field: &Field) -> &'static str {
    match field.field_type.scalar() {
        Some(ScalarType::String) | Some(ScalarType::Json) => "TEXT",
        Some(ScalarType::Int) | Some(ScalarType::Boolean) => "INTEGER",
        Some(ScalarType::Float) => "REAL",
        Some(ScalarType::DateTime) => "TIMESTAMP",
        Some(ScalarType::Bytes) => "BLOB",
        None => "INTEGER",
    }
}

/// DDL synthesizer bound to one schema document.
#[derive(Debug, Clone, Copy)]
pub struct DdlSynthesizer<'a> {
    document: &'a SchemaDocument,
}

impl<'a> DdlSynthesizer<'a> {
    /// Create a synthesizer for a document.
    pub fn new(document: &'a SchemaDocument) -> Self {
        Self { document }
    }

    /// Whether a field becomes a column.
    ///
    /// Lists, `@relation` fields and fields typed as another model are
    /// navigation only.
    pub fn is_column(&self, field: &Field) -> bool {
        !field.is_list()
            && field.relation().is_none()
            && !self.document.is_model(field.field_type.base_name())
    }

    /// Column fields of a model, in declaration order.
    pub fn columns<'m>(&self, model: &'m Model) -> impl Iterator<Item = &'m Field> + use<'m, 'a> {
        let this = *self;
        model.fields.iter().filter(move |f| this.is_column(f))
    }

    /// Synthesize `CREATE TABLE` and its indexes for a model.
    pub fn create_table(&self, model: &Model) -> SchemaResult<CreateTableSql> {
        let table = table_name(model);
        let mut clauses = Vec::new();

        let ids = model.id_fields();
        let inline_pk = match ids.as_slice() {
            [only] if only.is_identity() => Some(only.name()),
            _ => None,
        };

        for field in self.columns(model) {
            clauses.push(self.column_definition(model, field, inline_pk == Some(field.name()), true)?);
        }

        if clauses.is_empty() {
            return Err(SchemaError::invalid_model(model.name(), "model has no columns"));
        }

        if let Some(pk) = self.primary_key(model, inline_pk.is_some()) {
            clauses.push(format!("PRIMARY KEY ({})", quote_list(&pk)));
        }

        for attr in model.attributes_named("unique") {
            let Some(list) = attr.field_list() else {
                continue;
            };
            let columns: Vec<String> = list.fields.iter().map(|f| column_for(model, f)).collect();
            clauses.push(format!(
                "{}UNIQUE ({})",
                constraint_prefix(list.name.as_deref()),
                quote_list(&columns)
            ));
        }

        for attr in model.attributes_named("check") {
            let Some(check) = attr.check() else {
                return Err(SchemaError::invalid_model(
                    model.name(),
                    "@@check requires an expression",
                ));
            };
            clauses.push(format!(
                "{}CHECK ({})",
                constraint_prefix(check.name.as_deref()),
                check.expression
            ));
        }

        for field in &model.fields {
            if let Some(fk) = self.foreign_key(model, field)? {
                clauses.push(fk);
            }
        }

        let table_sql = format!(
            "CREATE TABLE {} (\n    {}\n);",
            quote_ident(&table),
            clauses.join(",\n    ")
        );
        let index_sqls = self
            .indexes(model)
            .iter()
            .map(IndexDef::create_sql)
            .collect();

        debug!(model = model.name(), table = %table, "synthesized table");

        Ok(CreateTableSql {
            table_name: table,
            table_sql,
            index_sqls,
        })
    }

    /// Synthesize `ALTER TABLE ... ADD COLUMN` for a new field of an existing model.
    ///
    /// Only the column definition is emitted: an `@id` field gets no primary
    /// key and `@unique` is left to [`unique_index`](Self::unique_index),
    /// since SQLite cannot add either constraint to an existing table.
    pub fn add_column(&self, model: &Model, field: &Field) -> SchemaResult<String> {
        if field.is_id() {
            warn!(
                model = model.name(),
                field = field.name(),
                "primary key not added; existing tables keep their key"
            );
        }
        Ok(format!(
            "ALTER TABLE {} ADD COLUMN {};",
            quote_ident(&table_name(model)),
            self.column_definition(model, field, false, false)?
        ))
    }

    /// The `UNIQUE` index backing a field-level `@unique` on an added column.
    pub fn unique_index(&self, model: &Model, field: &Field) -> Option<IndexDef> {
        let attr = field.get_attribute("unique")?;
        let table = table_name(model);
        let columns = vec![column_name(field)];
        let name = attr
            .field_list()
            .and_then(|l| l.name.clone())
            .unwrap_or_else(|| default_unique_name(&table, &columns));
        Some(IndexDef {
            name,
            table,
            columns,
            unique: true,
        })
    }

    /// Standalone indexes of a model: field-level `@index` in field order,
    /// then `@@index` in declaration order.
    pub fn indexes(&self, model: &Model) -> Vec<IndexDef> {
        let table = table_name(model);
        let mut indexes = Vec::new();

        for field in self.columns(model) {
            if let Some(attr) = field.get_attribute("index") {
                let columns = vec![column_name(field)];
                let name = attr.field_list().and_then(|l| l.name.clone());
                indexes.push(index_def(&table, name, columns));
            }
        }

        for attr in model.attributes_named("index") {
            if let Some(list) = attr.field_list() {
                let columns = list.fields.iter().map(|f| column_for(model, f)).collect();
                indexes.push(index_def(&table, list.name.clone(), columns));
            }
        }

        indexes
    }

    /// Columns of a table-level primary key, if one is emitted.
    fn primary_key(&self, model: &Model, inline: bool) -> Option<Vec<String>> {
        if let Some(list) = model.get_attribute("id").and_then(|a| a.field_list()) {
            return Some(list.fields.iter().map(|f| column_for(model, f)).collect());
        }
        if inline {
            return None;
        }
        let ids: Vec<String> = model.id_fields().into_iter().map(column_name).collect();
        (!ids.is_empty()).then_some(ids)
    }

    fn column_definition(
        &self,
        model: &Model,
        field: &Field,
        inline_pk: bool,
        inline_unique: bool,
    ) -> SchemaResult<String> {
        let mut parts = vec![quote_ident(&column_name(field)), column_type(field).to_string()];

        if field.is_identity() {
            if !field.is_id() {
                return Err(SchemaError::invalid_field(
                    model.name(),
                    field.name(),
                    "identity defaults are only allowed on the @id field",
                ));
            }
            if field.field_type.scalar() != Some(ScalarType::Int) {
                return Err(SchemaError::invalid_field(
                    model.name(),
                    field.name(),
                    "identity defaults require an Int field",
                ));
            }
        }

        if inline_pk {
            parts.push("PRIMARY KEY AUTOINCREMENT".to_string());
        }

        if !field.is_optional() {
            parts.push("NOT NULL".to_string());
        }

        if let Some(attr) = field.get_attribute("unique").filter(|_| inline_unique) {
            let name = attr.field_list().and_then(|l| l.name.as_deref());
            parts.push(format!("{}UNIQUE", constraint_prefix(name)));
        }

        if let Some(default) = self.default_expression(model, field)? {
            parts.push(format!("DEFAULT {default}"));
        }

        Ok(parts.join(" "))
    }

    /// Render a non-identity `@default`.
    fn default_expression(&self, model: &Model, field: &Field) -> SchemaResult<Option<String>> {
        let Some(attr) = field.get_attribute("default") else {
            return Ok(None);
        };
        let invalid = |message: String| SchemaError::invalid_field(model.name(), field.name(), message);

        let expr = match &attr.args {
            AttributeArgs::Function(call) => match call.function {
                DefaultFunction::Now => "CURRENT_TIMESTAMP".to_string(),
                DefaultFunction::Uuid => UUID_EXPR.to_string(),
                DefaultFunction::Cuid => CUID_EXPR.to_string(),
                DefaultFunction::Nanoid => NANOID_EXPR.to_string(),
                DefaultFunction::DbGenerated => match call.literal_arg(0) {
                    Some(Literal::String(expr)) => format!("({expr})"),
                    _ => {
                        return Err(invalid(
                            "dbgenerated() requires a string expression".to_string(),
                        ));
                    }
                },
                DefaultFunction::Autoincrement | DefaultFunction::Sequence | DefaultFunction::Auto => {
                    return Ok(None);
                }
            },
            AttributeArgs::Literal(literal) => self.render_literal(field, literal).map_err(invalid)?,
            other => return Err(invalid(format!("unsupported default value {other:?}"))),
        };

        Ok(Some(expr))
    }

    fn render_literal(&self, field: &Field, literal: &Literal) -> Result<String, String> {
        Ok(match literal {
            Literal::String(s) => quote_literal(s),
            Literal::Int(i) => i.to_string(),
            Literal::Float(f) => f.to_string(),
            Literal::Boolean(b) => (if *b { "1" } else { "0" }).to_string(),
            Literal::Ident(value) => {
                // Enum values are stored by ordinal.
                let enum_name = field.field_type.base_name();
                let Some(e) = self.document.get_enum(enum_name) else {
                    return Err(format!("`{value}` is not a valid default for `{enum_name}`"));
                };
                let ordinal = e
                    .values
                    .iter()
                    .position(|v| v.name() == value.as_str())
                    .ok_or_else(|| format!("enum `{enum_name}` has no value `{value}`"))?;
                ordinal.to_string()
            }
        })
    }

    fn foreign_key(&self, model: &Model, field: &Field) -> SchemaResult<Option<String>> {
        let Some(relation) = field.relation().filter(|r| r.has_foreign_key()) else {
            return Ok(None);
        };
        let invalid = |message: String| SchemaError::invalid_relation(model.name(), field.name(), message);

        let target_name = field.field_type.base_name();
        let target = self
            .document
            .get_model(target_name)
            .ok_or_else(|| invalid(format!("`{target_name}` is not a model")))?;

        let locals: Vec<String> = relation.fields.iter().map(|f| column_for(model, f)).collect();
        let references: Vec<String> = relation
            .references
            .iter()
            .map(|f| column_for(target, f))
            .collect();

        let mut sql = format!(
            "{}FOREIGN KEY ({}) REFERENCES {}({})",
            constraint_prefix(relation.name.as_deref()),
            quote_list(&locals),
            quote_ident(&table_name(target)),
            quote_list(&references)
        );

        for (clause, keyword) in [("ON DELETE", &relation.on_delete), ("ON UPDATE", &relation.on_update)] {
            if let Some(keyword) = keyword {
                let action = ReferentialAction::from_keyword(keyword)
                    .ok_or_else(|| invalid(format!("unknown referential action `{keyword}`")))?;
                sql.push_str(&format!(" {clause} {}", action.as_sql()));
            }
        }

        Ok(Some(sql))
    }
}

fn constraint_prefix(name: Option<&str>) -> String {
    name.map(|n| format!("CONSTRAINT {} ", quote_ident(n)))
        .unwrap_or_default()
}

fn index_def(table: &str, name: Option<String>, columns: Vec<String>) -> IndexDef {
    IndexDef {
        name: name.unwrap_or_else(|| default_index_name(table, &columns)),
        table: table.to_string(),
        columns,
        unique: false,
    }
}
