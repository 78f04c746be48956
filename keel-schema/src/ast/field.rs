//! Field definitions for the Keel schema AST.

use serde::{Deserialize, Serialize};

use super::{Attribute, FieldType, FunctionCall, Ident, Literal, RelationArgs, Span};

/// A field in a model, view or composite type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    /// Field name.
    pub name: Ident,
    /// Field type, including list and optional markers.
    pub field_type: FieldType,
    /// Attributes in source order.
    pub attributes: Vec<Attribute>,
    /// Source location.
    pub span: Span,
}

impl Field {
    /// Create a new field.
    pub fn new(name: Ident, field_type: FieldType, attributes: Vec<Attribute>, span: Span) -> Self {
        Self {
            name,
            field_type,
            attributes,
            span,
        }
    }

    /// Get the field name as a string.
    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    /// Check if the field is optional.
    pub fn is_optional(&self) -> bool {
        self.field_type.is_optional()
    }

    /// Check if the field is a list.
    pub fn is_list(&self) -> bool {
        self.field_type.is_list()
    }

    /// Check if this field has a specific attribute.
    pub fn has_attribute(&self, name: &str) -> bool {
        self.attributes.iter().any(|a| a.is(name))
    }

    /// Get an attribute by name.
    pub fn get_attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.is(name))
    }

    /// Check if this is a primary key field.
    pub fn is_id(&self) -> bool {
        self.has_attribute("id")
    }

    /// Check if this field has a unique constraint.
    pub fn is_unique(&self) -> bool {
        self.has_attribute("unique")
    }

    /// The `@relation(...)` arguments, if present.
    pub fn relation(&self) -> Option<&RelationArgs> {
        self.get_attribute("relation").and_then(Attribute::relation)
    }

    /// The `@default` function call, if the default is a function.
    pub fn default_function(&self) -> Option<&FunctionCall> {
        self.get_attribute("default").and_then(Attribute::function)
    }

    /// The `@default` literal, if the default is a literal.
    pub fn default_literal(&self) -> Option<&Literal> {
        self.get_attribute("default").and_then(Attribute::literal)
    }

    /// Whether the field defaults to an identity function (`autoincrement()` and friends).
    pub fn is_identity(&self) -> bool {
        self.default_function()
            .is_some_and(|call| call.function.is_identity())
    }

    /// The `@map("...")` value, if present.
    pub fn mapped_name(&self) -> Option<&str> {
        self.get_attribute("map").and_then(Attribute::string_value)
    }
}
