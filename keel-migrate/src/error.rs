//! Error types for the migration engine.

use keel_schema::SchemaError;
use thiserror::Error;

use crate::executor::ExecutionError;

/// Result type alias for migration operations.
pub type MigrateResult<T> = Result<T, MigrationError>;

/// Errors that can occur during migration operations.
#[derive(Debug, Error)]
pub enum MigrationError {
    /// File system error.
    #[error("I/O error on {path}: {source}")]
    Io {
        /// Path being read or written.
        path: String,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// Schema parsing, validation or diffing error.
    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    /// SQL execution error outside a single migration file.
    #[error("Execution error: {0}")]
    Execution(#[from] ExecutionError),

    /// Invalid migration file or format.
    #[error("Invalid migration: {0}")]
    InvalidMigration(String),

    /// An applied migration file was edited after it was applied.
    #[error("Checksum mismatch for migration '{name}': expected {expected}, got {actual}")]
    ChecksumMismatch {
        /// Migration name.
        name: String,
        /// Checksum stored in the ledger.
        expected: String,
        /// Checksum of the file on disk.
        actual: String,
    },

    /// Operation not allowed in the manager's current state.
    #[error("Invalid state: expected {expected}, but manager is {actual}")]
    InvalidState {
        /// Required state.
        expected: &'static str,
        /// Current state.
        actual: &'static str,
    },

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl MigrationError {
    /// Create an I/O error for a path.
    pub fn io(path: impl AsRef<std::path::Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().display().to_string(),
            source,
        }
    }

    /// Create a migration file error.
    pub fn migration_file(msg: impl Into<String>) -> Self {
        Self::InvalidMigration(msg.into())
    }

    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Check if this error came from the schema (syntax or semantics).
    pub fn is_schema_error(&self) -> bool {
        matches!(self, Self::Schema(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checksum_mismatch_display() {
        let err = MigrationError::ChecksumMismatch {
            name: "20240101000000_init".to_string(),
            expected: "abc".to_string(),
            actual: "xyz".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("20240101000000_init"));
        assert!(msg.contains("abc"));
        assert!(msg.contains("xyz"));
    }

    #[test]
    fn test_invalid_state_display() {
        let err = MigrationError::InvalidState {
            expected: "ready",
            actual: "closed",
        };
        assert_eq!(
            err.to_string(),
            "Invalid state: expected ready, but manager is closed"
        );
    }

    #[test]
    fn test_schema_error_conversion() {
        let err: MigrationError = SchemaError::duplicate("model", "User").into();
        assert!(err.is_schema_error());
        assert!(err.to_string().contains("duplicate model `User`"));
    }

    #[test]
    fn test_io_error_carries_path() {
        let err = MigrationError::io(
            "migrations/x.sql",
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        );
        assert!(err.to_string().contains("migrations/x.sql"));
    }
}
