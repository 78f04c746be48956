//! Datasource and generator blocks.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

use super::{Ident, Span};

/// The right-hand side of a `key = value` assignment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ConfigValue {
    /// A string literal, unescaped.
    String(String),
    /// A numeric literal, as written.
    Number(SmolStr),
    /// A boolean literal.
    Boolean(bool),
    /// A bare identifier.
    Ident(SmolStr),
    /// An array of values.
    Array(Vec<ConfigValue>),
    /// A function call such as `env("DATABASE_URL")`.
    Function(SmolStr, Vec<ConfigValue>),
}

impl ConfigValue {
    /// Try to get the value as a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// The variable name of an `env("NAME")` call.
    pub fn env_var(&self) -> Option<&str> {
        match self {
            Self::Function(name, args) if name == "env" => args.first().and_then(Self::as_str),
            _ => None,
        }
    }
}

/// A `datasource` or `generator` block: a name plus ordered properties.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigBlock {
    /// Block name.
    pub name: Ident,
    /// Properties in declaration order.
    pub properties: IndexMap<SmolStr, ConfigValue>,
    /// Source location.
    pub span: Span,
}

impl ConfigBlock {
    /// Create an empty block.
    pub fn new(name: Ident, span: Span) -> Self {
        Self {
            name,
            properties: IndexMap::new(),
            span,
        }
    }

    /// Get the block name as a string.
    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    /// Get a property by key.
    pub fn get(&self, key: &str) -> Option<&ConfigValue> {
        self.properties.get(key)
    }

    /// The `provider` property, when it is a string.
    pub fn provider(&self) -> Option<&str> {
        self.get("provider").and_then(ConfigValue::as_str)
    }

    /// Resolve the `url` property, reading `env("...")` from the environment.
    pub fn resolve_url(&self) -> Option<String> {
        match self.get("url")? {
            ConfigValue::String(url) => Some(url.clone()),
            value => value.env_var().and_then(|var| std::env::var(var).ok()),
        }
    }
}

/// Datasource block (`datasource db { ... }`).
pub type Datasource = ConfigBlock;

/// Generator block (`generator client { ... }`).
pub type Generator = ConfigBlock;

#[cfg(test)]
mod tests {
    use super::*;

    fn block() -> ConfigBlock {
        let mut block = ConfigBlock::new(Ident::new("db", Span::new(0, 2)), Span::new(0, 10));
        block
            .properties
            .insert("provider".into(), ConfigValue::String("sqlite".into()));
        block
    }

    #[test]
    fn test_provider() {
        assert_eq!(block().provider(), Some("sqlite"));
    }

    #[test]
    fn test_literal_url() {
        let mut block = block();
        block
            .properties
            .insert("url".into(), ConfigValue::String("file:dev.db".into()));
        assert_eq!(block.resolve_url().as_deref(), Some("file:dev.db"));
    }

    #[test]
    fn test_env_url_unset() {
        let mut block = block();
        block.properties.insert(
            "url".into(),
            ConfigValue::Function(
                "env".into(),
                vec![ConfigValue::String("KEEL_TEST_SURELY_UNSET_URL".into())],
            ),
        );
        assert_eq!(
            block.get("url").and_then(ConfigValue::env_var),
            Some("KEEL_TEST_SURELY_UNSET_URL")
        );
        assert_eq!(block.resolve_url(), None);
    }
}
