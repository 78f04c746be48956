//! SQL execution capability.
//!
//! The migration engine never talks to a driver directly. It runs SQL through
//! [`SqlExecutor`], and runs each migration file inside a [`Transaction`].

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A value bound as a parameter or read from a row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SqlValue {
    /// SQL NULL.
    Null,
    /// 64-bit integer.
    Integer(i64),
    /// Floating point.
    Real(f64),
    /// UTF-8 text.
    Text(String),
    /// Raw bytes.
    Blob(Vec<u8>),
}

impl SqlValue {
    /// Try to get the value as text.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Try to get the value as an integer.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Check if the value is NULL.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

impl From<i64> for SqlValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<f64> for SqlValue {
    fn from(value: f64) -> Self {
        Self::Real(value)
    }
}

impl From<&str> for SqlValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<Vec<u8>> for SqlValue {
    fn from(value: Vec<u8>) -> Self {
        Self::Blob(value)
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

/// A result row: column names paired with values.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Row {
    /// Column names, in select order.
    pub columns: Vec<String>,
    /// Values, parallel to `columns`.
    pub values: Vec<SqlValue>,
}

impl Row {
    /// Create a row.
    pub fn new(columns: Vec<String>, values: Vec<SqlValue>) -> Self {
        Self { columns, values }
    }

    /// Get a value by column name.
    pub fn get(&self, column: &str) -> Option<&SqlValue> {
        self.columns
            .iter()
            .position(|c| c == column)
            .and_then(|i| self.values.get(i))
    }

    /// Get a text column.
    pub fn get_str(&self, column: &str) -> Option<&str> {
        self.get(column).and_then(SqlValue::as_str)
    }

    /// Get an integer column.
    pub fn get_i64(&self, column: &str) -> Option<i64> {
        self.get(column).and_then(SqlValue::as_i64)
    }
}

/// Errors raised while executing SQL.
#[derive(Debug, Error)]
pub enum ExecutionError {
    /// A statement failed.
    #[error("failed to execute `{sql}`: {message}")]
    Statement {
        /// The failing SQL.
        sql: String,
        /// Driver message.
        message: String,
    },

    /// Connecting failed.
    #[error("connection failed: {0}")]
    Connection(String),

    /// Transaction control failed.
    #[error("transaction error: {0}")]
    Transaction(String),

    /// The executor was closed.
    #[error("executor is closed")]
    Closed,
}

impl ExecutionError {
    /// Create a statement error.
    pub fn statement(sql: impl Into<String>, message: impl ToString) -> Self {
        Self::Statement {
            sql: sql.into(),
            message: message.to_string(),
        }
    }
}

/// Result type for execution.
pub type ExecutionResult<T> = Result<T, ExecutionError>;

/// Something that can run SQL against a database.
#[async_trait]
pub trait SqlExecutor: Send + Sync {
    /// Execute one statement with positional parameters and return its rows.
    async fn execute(&self, sql: &str, params: &[SqlValue]) -> ExecutionResult<Vec<Row>>;

    /// Begin a transaction.
    async fn begin<'a>(&'a self) -> ExecutionResult<Box<dyn Transaction + 'a>>;

    /// Release the underlying connection. Later calls fail.
    async fn close(&self) -> ExecutionResult<()> {
        Ok(())
    }
}

/// An open transaction. Dropping it without committing rolls it back.
#[async_trait]
pub trait Transaction: Send {
    /// Execute one statement inside the transaction.
    async fn execute(&mut self, sql: &str, params: &[SqlValue]) -> ExecutionResult<Vec<Row>>;

    /// Commit the transaction.
    async fn commit(self: Box<Self>) -> ExecutionResult<()>;

    /// Roll the transaction back.
    async fn rollback(self: Box<Self>) -> ExecutionResult<()>;
}

#[async_trait]
impl<E: SqlExecutor + ?Sized> SqlExecutor for Arc<E> {
    async fn execute(&self, sql: &str, params: &[SqlValue]) -> ExecutionResult<Vec<Row>> {
        (**self).execute(sql, params).await
    }

    async fn begin<'a>(&'a self) -> ExecutionResult<Box<dyn Transaction + 'a>> {
        (**self).begin().await
    }

    async fn close(&self) -> ExecutionResult<()> {
        (**self).close().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_lookup() {
        let row = Row::new(
            vec!["name".into(), "timestamp".into(), "note".into()],
            vec![
                SqlValue::from("20240101000000_init"),
                SqlValue::from(20240101000000_i64),
                SqlValue::from(None::<String>),
            ],
        );
        assert_eq!(row.get_str("name"), Some("20240101000000_init"));
        assert_eq!(row.get_i64("timestamp"), Some(20240101000000));
        assert!(row.get("note").unwrap().is_null());
        assert_eq!(row.get("missing"), None);
        assert_eq!(row.get_i64("name"), None);
    }

    #[test]
    fn test_sql_value_conversions() {
        assert_eq!(SqlValue::from(Some(3_i64)), SqlValue::Integer(3));
        assert_eq!(SqlValue::from(1.5), SqlValue::Real(1.5));
        assert_eq!(SqlValue::from(vec![1_u8, 2]), SqlValue::Blob(vec![1, 2]));
        assert_eq!(SqlValue::from(String::from("x")).as_str(), Some("x"));
    }

    #[test]
    fn test_statement_error_display() {
        let err = ExecutionError::statement("CREATE TABLE", "near \"TABLE\": syntax error");
        assert_eq!(
            err.to_string(),
            "failed to execute `CREATE TABLE`: near \"TABLE\": syntax error"
        );
    }
}
