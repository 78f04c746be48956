//! Top-level schema document.

use serde::{Deserialize, Serialize};

use super::{CompositeType, Datasource, Enum, Generator, Model, View};

/// A top-level declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Declaration {
    /// `datasource name { ... }`
    Datasource(Datasource),
    /// `generator name { ... }`
    Generator(Generator),
    /// `model Name { ... }`
    Model(Model),
    /// `enum Name { ... }`
    Enum(Enum),
    /// `type Name { ... }`
    CompositeType(CompositeType),
    /// `view Name { ... }`
    View(View),
}

impl Declaration {
    /// The declared name.
    pub fn name(&self) -> &str {
        match self {
            Self::Datasource(d) | Self::Generator(d) => d.name(),
            Self::Model(m) => m.name(),
            Self::Enum(e) => e.name(),
            Self::CompositeType(t) => t.name(),
            Self::View(v) => v.name(),
        }
    }

    /// The declaration keyword, used in diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Datasource(_) => "datasource",
            Self::Generator(_) => "generator",
            Self::Model(_) => "model",
            Self::Enum(_) => "enum",
            Self::CompositeType(_) => "type",
            Self::View(_) => "view",
        }
    }
}

/// A parsed schema: declarations in source order. Immutable after parsing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchemaDocument {
    /// All declarations in source order.
    pub declarations: Vec<Declaration>,
}

impl SchemaDocument {
    /// Create an empty document.
    pub fn new() -> Self {
        Self::default()
    }

    /// Models in declaration order.
    pub fn models(&self) -> impl Iterator<Item = &Model> {
        self.declarations.iter().filter_map(|d| match d {
            Declaration::Model(m) => Some(m),
            _ => None,
        })
    }

    /// Enums in declaration order.
    pub fn enums(&self) -> impl Iterator<Item = &Enum> {
        self.declarations.iter().filter_map(|d| match d {
            Declaration::Enum(e) => Some(e),
            _ => None,
        })
    }

    /// Views in declaration order.
    pub fn views(&self) -> impl Iterator<Item = &View> {
        self.declarations.iter().filter_map(|d| match d {
            Declaration::View(v) => Some(v),
            _ => None,
        })
    }

    /// Composite types in declaration order.
    pub fn types(&self) -> impl Iterator<Item = &CompositeType> {
        self.declarations.iter().filter_map(|d| match d {
            Declaration::CompositeType(t) => Some(t),
            _ => None,
        })
    }

    /// The first datasource block.
    pub fn datasource(&self) -> Option<&Datasource> {
        self.declarations.iter().find_map(|d| match d {
            Declaration::Datasource(ds) => Some(ds),
            _ => None,
        })
    }

    /// Generator blocks in declaration order.
    pub fn generators(&self) -> impl Iterator<Item = &Generator> {
        self.declarations.iter().filter_map(|d| match d {
            Declaration::Generator(g) => Some(g),
            _ => None,
        })
    }

    /// Get a model by name.
    pub fn get_model(&self, name: &str) -> Option<&Model> {
        self.models().find(|m| m.name() == name)
    }

    /// Get an enum by name.
    pub fn get_enum(&self, name: &str) -> Option<&Enum> {
        self.enums().find(|e| e.name() == name)
    }

    /// Whether `name` is a model in this document.
    pub fn is_model(&self, name: &str) -> bool {
        self.get_model(name).is_some()
    }

    /// Model names in declaration order.
    pub fn model_names(&self) -> impl Iterator<Item = &str> {
        self.models().map(Model::name)
    }

    /// Check if the document has no declarations.
    pub fn is_empty(&self) -> bool {
        self.declarations.is_empty()
    }
}
