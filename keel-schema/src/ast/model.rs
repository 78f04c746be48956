//! Model, enum, composite type and view definitions for the Keel schema AST.

use serde::{Deserialize, Serialize};

use super::{Attribute, Field, Ident, Span};

/// A model definition (maps to a database table).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Model {
    /// Model name.
    pub name: Ident,
    /// Fields in declaration order.
    pub fields: Vec<Field>,
    /// Model-level attributes (prefixed with `@@`).
    pub attributes: Vec<Attribute>,
    /// Source location.
    pub span: Span,
}

impl Model {
    /// Create a new model.
    pub fn new(name: Ident, span: Span) -> Self {
        Self {
            name,
            fields: vec![],
            attributes: vec![],
            span,
        }
    }

    /// Get the model name as a string.
    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    /// Add a field to the model.
    pub fn add_field(&mut self, field: Field) {
        self.fields.push(field);
    }

    /// Get a field by name.
    pub fn get_field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name() == name)
    }

    /// Get the field-level primary key field(s).
    pub fn id_fields(&self) -> Vec<&Field> {
        self.fields.iter().filter(|f| f.is_id()).collect()
    }

    /// Check if the model has a model-level attribute.
    pub fn has_attribute(&self, name: &str) -> bool {
        self.attributes.iter().any(|a| a.is(name))
    }

    /// Get the first model-level attribute with this name.
    pub fn get_attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.is(name))
    }

    /// All model-level attributes with this name, in order.
    pub fn attributes_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Attribute> {
        self.attributes.iter().filter(move |a| a.is(name))
    }

    /// The `@@map("...")` value, if present.
    pub fn mapped_name(&self) -> Option<&str> {
        self.get_attribute("map").and_then(Attribute::string_value)
    }
}

/// An enum definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Enum {
    /// Enum name.
    pub name: Ident,
    /// Values in declaration order.
    pub values: Vec<EnumValue>,
    /// Enum-level attributes.
    pub attributes: Vec<Attribute>,
    /// Source location.
    pub span: Span,
}

impl Enum {
    /// Create a new enum.
    pub fn new(name: Ident, span: Span) -> Self {
        Self {
            name,
            values: vec![],
            attributes: vec![],
            span,
        }
    }

    /// Get the enum name as a string.
    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    /// Get a value by name.
    pub fn get_value(&self, name: &str) -> Option<&EnumValue> {
        self.values.iter().find(|v| v.name() == name)
    }
}

/// An enum value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnumValue {
    /// Value name.
    pub name: Ident,
    /// Value-level attributes.
    pub attributes: Vec<Attribute>,
    /// Source location.
    pub span: Span,
}

impl EnumValue {
    /// Create a new enum value.
    pub fn new(name: Ident, span: Span) -> Self {
        Self {
            name,
            attributes: vec![],
            span,
        }
    }

    /// Get the value name as a string.
    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    /// Get the database value (from `@map` or the value name).
    pub fn db_value(&self) -> &str {
        self.attributes
            .iter()
            .find(|a| a.is("map"))
            .and_then(Attribute::string_value)
            .unwrap_or_else(|| self.name())
    }
}

/// A composite type definition (`type Address { ... }`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositeType {
    /// Type name.
    pub name: Ident,
    /// Fields in declaration order.
    pub fields: Vec<Field>,
    /// Source location.
    pub span: Span,
}

impl CompositeType {
    /// Create a new composite type.
    pub fn new(name: Ident, span: Span) -> Self {
        Self {
            name,
            fields: vec![],
            span,
        }
    }

    /// Get the type name as a string.
    pub fn name(&self) -> &str {
        self.name.as_str()
    }
}

/// A view definition. Views are parsed and validated but produce no DDL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct View {
    /// View name.
    pub name: Ident,
    /// Fields in declaration order.
    pub fields: Vec<Field>,
    /// View-level attributes.
    pub attributes: Vec<Attribute>,
    /// Source location.
    pub span: Span,
}

impl View {
    /// Create a new view.
    pub fn new(name: Ident, span: Span) -> Self {
        Self {
            name,
            fields: vec![],
            attributes: vec![],
            span,
        }
    }

    /// Get the view name as a string.
    pub fn name(&self) -> &str {
        self.name.as_str()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{AttributeArgs, FieldType, Literal, TypeModifier};

    fn ident(name: &str) -> Ident {
        Ident::new(name, Span::new(0, 0))
    }

    fn map_attr(value: &str) -> Attribute {
        Attribute::new(
            ident("map"),
            AttributeArgs::Literal(Literal::String(value.into())),
            Span::new(0, 0),
        )
    }

    #[test]
    fn test_model_fields_keep_order() {
        let mut model = Model::new(ident("User"), Span::new(0, 0));
        for name in ["id", "email", "name"] {
            model.add_field(Field::new(
                ident(name),
                FieldType::new("String", TypeModifier::Required),
                vec![],
                Span::new(0, 0),
            ));
        }
        let names: Vec<_> = model.fields.iter().map(Field::name).collect();
        assert_eq!(names, ["id", "email", "name"]);
        assert!(model.get_field("email").is_some());
        assert!(model.get_field("missing").is_none());
    }

    #[test]
    fn test_model_mapped_name() {
        let mut model = Model::new(ident("User"), Span::new(0, 0));
        assert_eq!(model.mapped_name(), None);
        model.attributes.push(map_attr("accounts"));
        assert_eq!(model.mapped_name(), Some("accounts"));
    }

    #[test]
    fn test_enum_value_db_value() {
        let mut value = EnumValue::new(ident("Admin"), Span::new(0, 0));
        assert_eq!(value.db_value(), "Admin");
        value.attributes.push(map_attr("admin"));
        assert_eq!(value.db_value(), "admin");
    }
}
