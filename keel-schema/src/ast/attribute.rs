//! Attribute definitions for the Keel schema AST.

use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

use super::{Ident, RelationArgs, Span};

/// A literal attribute value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Literal {
    /// A string literal, unescaped.
    String(String),
    /// An integer literal.
    Int(i64),
    /// A float literal.
    Float(f64),
    /// A boolean literal.
    Boolean(bool),
    /// A bare identifier (e.g. an enum value).
    Ident(SmolStr),
}

impl Literal {
    /// Try to get the value as a string.
    pub fn as_string(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Try to get the value as an integer.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Try to get the value as a boolean.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Try to get the value as an identifier.
    pub fn as_ident(&self) -> Option<&str> {
        match self {
            Self::Ident(s) => Some(s),
            _ => None,
        }
    }
}

/// Functions accepted inside `@default(...)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DefaultFunction {
    /// `autoincrement()`
    Autoincrement,
    /// `now()`
    Now,
    /// `uuid()`
    Uuid,
    /// `cuid()`
    Cuid,
    /// `dbgenerated("expr")`
    DbGenerated,
    /// `sequence()`
    Sequence,
    /// `auto()`
    Auto,
    /// `nanoid()`
    Nanoid,
}

impl DefaultFunction {
    /// Look up a default function by name.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(name: &str) -> Option<Self> {
        match name {
            "autoincrement" => Some(Self::Autoincrement),
            "now" => Some(Self::Now),
            "uuid" => Some(Self::Uuid),
            "cuid" => Some(Self::Cuid),
            "dbgenerated" => Some(Self::DbGenerated),
            "sequence" => Some(Self::Sequence),
            "auto" => Some(Self::Auto),
            "nanoid" => Some(Self::Nanoid),
            _ => None,
        }
    }

    /// The function name as written in a schema.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Autoincrement => "autoincrement",
            Self::Now => "now",
            Self::Uuid => "uuid",
            Self::Cuid => "cuid",
            Self::DbGenerated => "dbgenerated",
            Self::Sequence => "sequence",
            Self::Auto => "auto",
            Self::Nanoid => "nanoid",
        }
    }

    /// Whether the database assigns the value as an identity column.
    pub fn is_identity(&self) -> bool {
        matches!(self, Self::Autoincrement | Self::Sequence | Self::Auto)
    }
}

/// A default function call such as `now()` or `dbgenerated("random()")`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionCall {
    /// The called function.
    pub function: DefaultFunction,
    /// Raw argument texts, in order.
    pub args: Vec<String>,
}

impl FunctionCall {
    /// Create a call with no arguments.
    pub fn new(function: DefaultFunction) -> Self {
        Self {
            function,
            args: Vec::new(),
        }
    }

    /// The argument at `index` read as a literal, e.g. the string in `dbgenerated("...")`.
    pub fn literal_arg(&self, index: usize) -> Option<Literal> {
        self.args
            .get(index)
            .and_then(|raw| crate::parser::args::parse_literal(raw))
    }
}

/// Arguments of `@@index`, `@@unique`, `@@id` and their field-level forms.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldListArgs {
    /// Referenced field names, in order.
    pub fields: Vec<SmolStr>,
    /// Explicit constraint or index name.
    pub name: Option<String>,
}

/// Arguments of `@@check(expr, name: "...")`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckArgs {
    /// The SQL expression, verbatim.
    pub expression: String,
    /// Explicit constraint name.
    pub name: Option<String>,
}

/// The interpreted argument of an attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AttributeArgs {
    /// Bare attribute (`@id`, `@unique`).
    None,
    /// A default function call.
    Function(FunctionCall),
    /// A single literal (`@map("users")`, `@default(0)`).
    Literal(Literal),
    /// Relation arguments.
    Relation(RelationArgs),
    /// A field list with optional name.
    FieldList(FieldListArgs),
    /// A check constraint.
    Check(CheckArgs),
    /// Anything else, kept verbatim.
    Raw(String),
}

/// An attribute applied to a field, model, or enum.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    /// Attribute name (without `@` prefix). May be dotted, e.g. `db.Text`.
    pub name: Ident,
    /// Interpreted argument.
    pub args: AttributeArgs,
    /// Source location (including `@`).
    pub span: Span,
}

impl Attribute {
    /// Create a new attribute.
    pub fn new(name: Ident, args: AttributeArgs, span: Span) -> Self {
        Self { name, args, span }
    }

    /// Create an attribute with no arguments.
    pub fn simple(name: Ident, span: Span) -> Self {
        Self::new(name, AttributeArgs::None, span)
    }

    /// Get the attribute name as a string.
    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    /// Check if this attribute has the given name.
    pub fn is(&self, name: &str) -> bool {
        self.name.as_str() == name
    }

    /// The literal argument, if any.
    pub fn literal(&self) -> Option<&Literal> {
        match &self.args {
            AttributeArgs::Literal(lit) => Some(lit),
            _ => None,
        }
    }

    /// The string argument, as used by `@map` / `@@map`.
    pub fn string_value(&self) -> Option<&str> {
        self.literal().and_then(Literal::as_string)
    }

    /// The default function call, if any.
    pub fn function(&self) -> Option<&FunctionCall> {
        match &self.args {
            AttributeArgs::Function(call) => Some(call),
            _ => None,
        }
    }

    /// The relation arguments, if any.
    pub fn relation(&self) -> Option<&RelationArgs> {
        match &self.args {
            AttributeArgs::Relation(rel) => Some(rel),
            _ => None,
        }
    }

    /// The field list arguments, if any.
    pub fn field_list(&self) -> Option<&FieldListArgs> {
        match &self.args {
            AttributeArgs::FieldList(list) => Some(list),
            _ => None,
        }
    }

    /// The check arguments, if any.
    pub fn check(&self) -> Option<&CheckArgs> {
        match &self.args {
            AttributeArgs::Check(check) => Some(check),
            _ => None,
        }
    }
}
