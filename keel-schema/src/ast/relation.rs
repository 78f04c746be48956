//! Relation arguments and referential actions.

use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

/// Referential action for `onDelete` / `onUpdate`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReferentialAction {
    /// Propagate the change.
    Cascade,
    /// Refuse the change.
    Restrict,
    /// Null out the referencing columns.
    SetNull,
    /// Reset the referencing columns to their defaults.
    SetDefault,
    /// Defer to the database's default behaviour.
    NoAction,
}

impl ReferentialAction {
    /// Parse a schema keyword (`Cascade`, `SetNull`, ...).
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword {
            "Cascade" => Some(Self::Cascade),
            "Restrict" => Some(Self::Restrict),
            "SetNull" => Some(Self::SetNull),
            "SetDefault" => Some(Self::SetDefault),
            "NoAction" => Some(Self::NoAction),
            _ => None,
        }
    }

    /// The SQL rendering of this action.
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::Cascade => "CASCADE",
            Self::Restrict => "RESTRICT",
            Self::SetNull => "SET NULL",
            Self::SetDefault => "SET DEFAULT",
            Self::NoAction => "NO ACTION",
        }
    }
}

impl std::fmt::Display for ReferentialAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_sql())
    }
}

/// Arguments of `@relation(...)`.
///
/// Referential actions are kept as written; they are resolved with
/// [`ReferentialAction::from_keyword`] during validation and DDL synthesis.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationArgs {
    /// Local foreign key fields.
    pub fields: Vec<SmolStr>,
    /// Referenced fields on the target model.
    pub references: Vec<SmolStr>,
    /// Relation (constraint) name.
    pub name: Option<String>,
    /// `onDelete` keyword.
    pub on_delete: Option<SmolStr>,
    /// `onUpdate` keyword.
    pub on_update: Option<SmolStr>,
}

impl RelationArgs {
    /// Whether this relation owns a foreign key.
    pub fn has_foreign_key(&self) -> bool {
        !self.fields.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_referential_action_mapping() {
        let cases = [
            ("Cascade", "CASCADE"),
            ("Restrict", "RESTRICT"),
            ("SetNull", "SET NULL"),
            ("SetDefault", "SET DEFAULT"),
            ("NoAction", "NO ACTION"),
        ];
        for (keyword, sql) in cases {
            let action = ReferentialAction::from_keyword(keyword).unwrap();
            assert_eq!(action.as_sql(), sql);
        }
    }

    #[test]
    fn test_unknown_referential_action() {
        assert_eq!(ReferentialAction::from_keyword("Delete"), None);
        assert_eq!(ReferentialAction::from_keyword("cascade"), None);
    }

    #[test]
    fn test_has_foreign_key() {
        assert!(!RelationArgs::default().has_foreign_key());
        let args = RelationArgs {
            fields: vec!["author_id".into()],
            references: vec!["id".into()],
            ..Default::default()
        };
        assert!(args.has_foreign_key());
    }
}
