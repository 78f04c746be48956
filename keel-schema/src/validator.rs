//! Schema validation and semantic analysis.
//!
//! This module checks a parsed [`SchemaDocument`] for semantic correctness:
//! - No duplicate declarations, fields or enum values
//! - Relations name existing fields on both sides and valid referential actions
//! - Primary keys are declared at most once per model
//! - Index, unique and id lists reference existing fields

use std::collections::HashSet;

use tracing::debug;

use crate::ast::*;
use crate::error::{SchemaError, SchemaResult};
use crate::parser::parse_schema;

/// Schema validator for semantic analysis.
#[derive(Debug, Default)]
pub struct Validator {
    /// Collected validation errors.
    errors: Vec<SchemaError>,
}

impl Validator {
    /// Create a new validator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate a document.
    ///
    /// A single problem is returned as-is; several are wrapped in
    /// [`SchemaError::ValidationFailed`].
    pub fn validate(&mut self, document: &SchemaDocument) -> SchemaResult<()> {
        self.errors.clear();

        self.check_duplicates(document);

        for declaration in &document.declarations {
            match declaration {
                Declaration::Model(model) => self.validate_model(model, document),
                Declaration::Enum(e) => self.validate_enum(e),
                Declaration::CompositeType(t) => self.check_duplicate_fields(t.name(), &t.fields),
                Declaration::View(v) => self.check_duplicate_fields(v.name(), &v.fields),
                Declaration::Datasource(_) | Declaration::Generator(_) => {}
            }
        }

        debug!(errors = self.errors.len(), "validated schema");

        match self.errors.len() {
            0 => Ok(()),
            1 => Err(self.errors.remove(0)),
            count => Err(SchemaError::ValidationFailed {
                count,
                errors: std::mem::take(&mut self.errors),
            }),
        }
    }

    /// Models, enums, types and views share one namespace; config blocks are
    /// unique per kind.
    fn check_duplicates(&mut self, document: &SchemaDocument) {
        let mut types = HashSet::new();
        let mut blocks = HashSet::new();

        for declaration in &document.declarations {
            let fresh = match declaration {
                Declaration::Datasource(_) | Declaration::Generator(_) => {
                    blocks.insert((declaration.kind(), declaration.name()))
                }
                _ => types.insert(declaration.name()),
            };
            if !fresh {
                self.errors
                    .push(SchemaError::duplicate(declaration.kind(), declaration.name()));
            }
        }
    }

    fn check_duplicate_fields(&mut self, owner: &str, fields: &[Field]) {
        let mut seen = HashSet::new();
        for field in fields {
            if !seen.insert(field.name()) {
                self.errors.push(SchemaError::duplicate(
                    "field",
                    format!("{owner}.{}", field.name()),
                ));
            }
        }
    }

    fn validate_model(&mut self, model: &Model, document: &SchemaDocument) {
        self.check_duplicate_fields(model.name(), &model.fields);

        let id_fields = model.id_fields();
        if id_fields.len() > 1 {
            self.errors.push(SchemaError::invalid_model(
                model.name(),
                "multiple fields marked @id; use @@id([...]) for a composite key",
            ));
        }
        if !id_fields.is_empty() && model.has_attribute("id") {
            self.errors.push(SchemaError::invalid_model(
                model.name(),
                "cannot combine a field-level @id with @@id",
            ));
        }

        for field in &model.fields {
            if let Some(relation) = field.relation() {
                self.validate_relation(model, field, relation, document);
            }
        }

        for attr in &model.attributes {
            self.validate_model_attribute(model, attr);
        }
    }

    fn validate_relation(
        &mut self,
        model: &Model,
        field: &Field,
        relation: &RelationArgs,
        document: &SchemaDocument,
    ) {
        let invalid = |message: String| {
            SchemaError::invalid_relation(model.name(), field.name(), message)
        };

        for local in &relation.fields {
            if model.get_field(local).is_none() {
                self.errors.push(invalid(format!(
                    "field `{local}` does not exist on model `{}`",
                    model.name()
                )));
            }
        }

        if relation.fields.len() != relation.references.len() {
            self.errors.push(invalid(format!(
                "`fields` lists {} field(s) but `references` lists {}",
                relation.fields.len(),
                relation.references.len()
            )));
        }

        let target_name = field.field_type.base_name();
        match document.get_model(target_name) {
            Some(target) => {
                for referenced in &relation.references {
                    if target.get_field(referenced).is_none() {
                        self.errors.push(invalid(format!(
                            "referenced field `{referenced}` does not exist on model `{target_name}`"
                        )));
                    }
                }
            }
            None => self
                .errors
                .push(invalid(format!("`{target_name}` is not a model"))),
        }

        for keyword in [&relation.on_delete, &relation.on_update].into_iter().flatten() {
            if ReferentialAction::from_keyword(keyword).is_none() {
                self.errors
                    .push(invalid(format!("unknown referential action `{keyword}`")));
            }
        }
    }

    fn validate_model_attribute(&mut self, model: &Model, attr: &Attribute) {
        if !matches!(attr.name(), "index" | "unique" | "id") {
            return;
        }

        let fields = attr
            .field_list()
            .map(|list| list.fields.as_slice())
            .unwrap_or_default();

        if fields.is_empty() {
            self.errors.push(SchemaError::invalid_model(
                model.name(),
                format!("@@{} requires a non-empty field list", attr.name()),
            ));
        }

        for name in fields {
            if model.get_field(name).is_none() {
                self.errors.push(SchemaError::invalid_field(
                    model.name(),
                    name.as_str(),
                    format!("referenced by @@{} but not declared", attr.name()),
                ));
            }
        }
    }

    fn validate_enum(&mut self, e: &Enum) {
        let mut seen = HashSet::new();
        for value in &e.values {
            if !seen.insert(value.name()) {
                self.errors.push(SchemaError::duplicate(
                    "enum value",
                    format!("{}.{}", e.name(), value.name()),
                ));
            }
        }
    }
}

/// Validate a parsed document.
pub fn validate_document(document: &SchemaDocument) -> SchemaResult<()> {
    Validator::new().validate(document)
}

/// Parse and validate a schema from a string.
pub fn validate_schema(input: &str) -> SchemaResult<SchemaDocument> {
    let document = parse_schema(input)?;
    validate_document(&document)?;
    Ok(document)
}
