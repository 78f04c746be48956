//! SQLite executor backed by `rusqlite`.

use async_trait::async_trait;
use parking_lot::Mutex;
use rusqlite::types::{ToSqlOutput, ValueRef};
use rusqlite::{Connection, ToSql, params_from_iter};
use tracing::{debug, trace};

use crate::executor::{ExecutionError, ExecutionResult, Row, SqlExecutor, SqlValue, Transaction};
use crate::registry::ConnectionOptions;

impl ToSql for SqlValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        let value = match self {
            Self::Null => ValueRef::Null,
            Self::Integer(i) => ValueRef::Integer(*i),
            Self::Real(f) => ValueRef::Real(*f),
            Self::Text(s) => ValueRef::Text(s.as_bytes()),
            Self::Blob(b) => ValueRef::Blob(b),
        };
        Ok(ToSqlOutput::Borrowed(value))
    }
}

fn from_value_ref(value: ValueRef<'_>) -> SqlValue {
    match value {
        ValueRef::Null => SqlValue::Null,
        ValueRef::Integer(i) => SqlValue::Integer(i),
        ValueRef::Real(f) => SqlValue::Real(f),
        ValueRef::Text(bytes) => SqlValue::Text(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => SqlValue::Blob(bytes.to_vec()),
    }
}

/// Run one statement and collect its rows.
fn run(conn: &Connection, sql: &str, params: &[SqlValue]) -> ExecutionResult<Vec<Row>> {
    trace!(sql = %sql, params = params.len(), "executing statement");

    let err = |e: rusqlite::Error| ExecutionError::statement(sql, e);
    let mut stmt = conn.prepare(sql).map_err(err)?;
    let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();

    let mut rows = stmt.query(params_from_iter(params.iter())).map_err(err)?;
    let mut out = Vec::new();
    while let Some(row) = rows.next().map_err(err)? {
        let mut values = Vec::with_capacity(columns.len());
        for i in 0..columns.len() {
            values.push(from_value_ref(row.get_ref(i).map_err(err)?));
        }
        out.push(Row::new(columns.clone(), values));
    }
    Ok(out)
}

/// A single SQLite connection implementing [`SqlExecutor`].
///
/// Calls run on the caller's task; statements against a local file are short.
pub struct SqliteExecutor {
    conn: Mutex<Option<Connection>>,
}

impl std::fmt::Debug for SqliteExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteExecutor")
            .field("open", &self.conn.lock().is_some())
            .finish()
    }
}

impl SqliteExecutor {
    /// Open a database file.
    pub fn open(path: impl AsRef<std::path::Path>) -> ExecutionResult<Self> {
        let conn = Connection::open(path.as_ref())
            .map_err(|e| ExecutionError::Connection(e.to_string()))?;
        Ok(Self::from_connection(conn))
    }

    /// Open a private in-memory database.
    pub fn open_in_memory() -> ExecutionResult<Self> {
        let conn =
            Connection::open_in_memory().map_err(|e| ExecutionError::Connection(e.to_string()))?;
        Ok(Self::from_connection(conn))
    }

    /// Open the database named by `options` and apply its pragmas.
    pub fn connect(options: &ConnectionOptions) -> ExecutionResult<Self> {
        let executor = if options.is_in_memory() {
            Self::open_in_memory()?
        } else {
            Self::open(options.path())?
        };

        {
            let guard = executor.conn.lock();
            if let Some(conn) = guard.as_ref() {
                for pragma in options.to_pragmas() {
                    run(conn, &pragma, &[])?;
                }
            }
        }

        debug!(path = options.path(), "connected to sqlite");
        Ok(executor)
    }

    /// Wrap an existing connection.
    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(Some(conn)),
        }
    }

    fn with_conn<T>(
        &self,
        f: impl FnOnce(&Connection) -> ExecutionResult<T>,
    ) -> ExecutionResult<T> {
        let guard = self.conn.lock();
        let conn = guard.as_ref().ok_or(ExecutionError::Closed)?;
        f(conn)
    }

    fn control(&self, sql: &str) -> ExecutionResult<()> {
        self.with_conn(|conn| {
            conn.execute_batch(sql)
                .map_err(|e| ExecutionError::Transaction(format!("{sql}: {e}")))
        })
    }
}

#[async_trait]
impl SqlExecutor for SqliteExecutor {
    async fn execute(&self, sql: &str, params: &[SqlValue]) -> ExecutionResult<Vec<Row>> {
        self.with_conn(|conn| run(conn, sql, params))
    }

    async fn begin<'a>(&'a self) -> ExecutionResult<Box<dyn Transaction + 'a>> {
        self.control("BEGIN")?;
        Ok(Box::new(SqliteTransaction {
            executor: self,
            finished: false,
        }))
    }

    async fn close(&self) -> ExecutionResult<()> {
        let Some(conn) = self.conn.lock().take() else {
            return Ok(());
        };
        conn.close()
            .map_err(|(_, e)| ExecutionError::Connection(e.to_string()))
    }
}

/// An open `BEGIN ... COMMIT` block.
struct SqliteTransaction<'a> {
    executor: &'a SqliteExecutor,
    finished: bool,
}

#[async_trait]
impl Transaction for SqliteTransaction<'_> {
    async fn execute(&mut self, sql: &str, params: &[SqlValue]) -> ExecutionResult<Vec<Row>> {
        self.executor.with_conn(|conn| run(conn, sql, params))
    }

    async fn commit(mut self: Box<Self>) -> ExecutionResult<()> {
        self.finished = true;
        self.executor.control("COMMIT")
    }

    async fn rollback(mut self: Box<Self>) -> ExecutionResult<()> {
        self.finished = true;
        self.executor.control("ROLLBACK")
    }
}

impl Drop for SqliteTransaction<'_> {
    fn drop(&mut self) {
        if !self.finished {
            if let Err(e) = self.executor.control("ROLLBACK") {
                debug!(error = %e, "rollback on drop failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_execute_and_read_rows() {
        let db = SqliteExecutor::open_in_memory().unwrap();
        db.execute("CREATE TABLE t (id INTEGER, name TEXT, data BLOB)", &[])
            .await
            .unwrap();
        db.execute(
            "INSERT INTO t VALUES (?1, ?2, ?3)",
            &[1_i64.into(), "a".into(), SqlValue::Null],
        )
        .await
        .unwrap();

        let rows = db.execute("SELECT id, name, data FROM t", &[]).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get_i64("id"), Some(1));
        assert_eq!(rows[0].get_str("name"), Some("a"));
        assert!(rows[0].get("data").unwrap().is_null());
    }

    #[tokio::test]
    async fn test_statement_error() {
        let db = SqliteExecutor::open_in_memory().unwrap();
        let err = db.execute("SELEC 1", &[]).await.unwrap_err();
        assert!(matches!(err, ExecutionError::Statement { ref sql, .. } if sql == "SELEC 1"));
    }

    #[tokio::test]
    async fn test_transaction_commit_and_rollback() {
        let db = SqliteExecutor::open_in_memory().unwrap();
        db.execute("CREATE TABLE t (id INTEGER)", &[]).await.unwrap();

        let mut tx = db.begin().await.unwrap();
        tx.execute("INSERT INTO t VALUES (1)", &[]).await.unwrap();
        tx.commit().await.unwrap();

        let mut tx = db.begin().await.unwrap();
        tx.execute("INSERT INTO t VALUES (2)", &[]).await.unwrap();
        tx.rollback().await.unwrap();

        {
            let mut tx = db.begin().await.unwrap();
            tx.execute("INSERT INTO t VALUES (3)", &[]).await.unwrap();
        }

        let rows = db.execute("SELECT id FROM t", &[]).await.unwrap();
        let ids: Vec<_> = rows.iter().filter_map(|r| r.get_i64("id")).collect();
        assert_eq!(ids, vec![1]);
    }

    #[tokio::test]
    async fn test_connect_applies_pragmas() {
        let db = SqliteExecutor::connect(&ConnectionOptions::in_memory()).unwrap();
        let rows = db.execute("PRAGMA foreign_keys", &[]).await.unwrap();
        assert_eq!(rows[0].get_i64("foreign_keys"), Some(1));
    }

    #[tokio::test]
    async fn test_closed_executor() {
        let db = SqliteExecutor::open_in_memory().unwrap();
        db.close().await.unwrap();
        let err = db.execute("SELECT 1", &[]).await.unwrap_err();
        assert!(matches!(err, ExecutionError::Closed));
    }
}
