//! Type definitions for the Keel schema AST.

use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

/// A span in the source code for error reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    /// Start offset in bytes.
    pub start: usize,
    /// End offset in bytes.
    pub end: usize,
}

impl Span {
    /// Create a new span.
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Get the length of the span.
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    /// Check if the span is empty.
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

impl From<pest::Span<'_>> for Span {
    fn from(span: pest::Span<'_>) -> Self {
        Self::new(span.start(), span.end())
    }
}

/// An identifier with source location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ident {
    /// The identifier name.
    pub name: SmolStr,
    /// Source location.
    pub span: Span,
}

impl Ident {
    /// Create a new identifier.
    pub fn new(name: impl Into<SmolStr>, span: Span) -> Self {
        Self {
            name: name.into(),
            span,
        }
    }

    /// Get the name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.name
    }
}

impl std::fmt::Display for Ident {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// Built-in scalar types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScalarType {
    /// Text.
    String,
    /// 64-bit integer.
    Int,
    /// Floating point.
    Float,
    /// Boolean, stored as 0/1.
    Boolean,
    /// Date and time.
    DateTime,
    /// JSON document stored as text.
    Json,
    /// Raw bytes.
    Bytes,
}

impl ScalarType {
    /// Parse a scalar type from its schema name.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "String" => Some(Self::String),
            "Int" => Some(Self::Int),
            "Float" => Some(Self::Float),
            "Boolean" => Some(Self::Boolean),
            "DateTime" => Some(Self::DateTime),
            "Json" => Some(Self::Json),
            "Bytes" => Some(Self::Bytes),
            _ => None,
        }
    }

    /// Get the type name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "String",
            Self::Int => "Int",
            Self::Float => "Float",
            Self::Boolean => "Boolean",
            Self::DateTime => "DateTime",
            Self::Json => "Json",
            Self::Bytes => "Bytes",
        }
    }
}

impl std::fmt::Display for ScalarType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Modifier for field types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TypeModifier {
    /// Required field (no modifier).
    Required,
    /// Optional field (`?` suffix).
    Optional,
    /// List field (`[]` suffix).
    List,
    /// Optional list field (`[]?` suffix).
    OptionalList,
}

impl TypeModifier {
    /// Build a modifier from the list and optional markers.
    pub fn from_flags(is_list: bool, optional: bool) -> Self {
        match (is_list, optional) {
            (false, false) => Self::Required,
            (false, true) => Self::Optional,
            (true, false) => Self::List,
            (true, true) => Self::OptionalList,
        }
    }

    /// Check if the field is optional.
    pub fn is_optional(&self) -> bool {
        matches!(self, Self::Optional | Self::OptionalList)
    }

    /// Check if the field is a list.
    pub fn is_list(&self) -> bool {
        matches!(self, Self::List | Self::OptionalList)
    }
}

/// The declared type of a field: `Identifier '[]'? '?'?`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldType {
    /// Base type name as written (`String`, `User`, `Role`).
    pub name: SmolStr,
    /// List / optional markers.
    pub modifier: TypeModifier,
}

impl FieldType {
    /// Create a new field type.
    pub fn new(name: impl Into<SmolStr>, modifier: TypeModifier) -> Self {
        Self {
            name: name.into(),
            modifier,
        }
    }

    /// The base type name.
    pub fn base_name(&self) -> &str {
        &self.name
    }

    /// The scalar type, if the base name is a built-in scalar.
    pub fn scalar(&self) -> Option<ScalarType> {
        ScalarType::from_str(&self.name)
    }

    /// Check if the type is optional.
    pub fn is_optional(&self) -> bool {
        self.modifier.is_optional()
    }

    /// Check if the type is a list.
    pub fn is_list(&self) -> bool {
        self.modifier.is_list()
    }
}

impl std::fmt::Display for FieldType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.modifier {
            TypeModifier::Required => write!(f, "{}", self.name),
            TypeModifier::Optional => write!(f, "{}?", self.name),
            TypeModifier::List => write!(f, "{}[]", self.name),
            TypeModifier::OptionalList => write!(f, "{}[]?", self.name),
        }
    }
}
