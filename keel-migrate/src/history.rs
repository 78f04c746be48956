//! Migration history tracking.
//!
//! Applied migrations are recorded in a ledger table inside the target
//! database, one row per file, together with the checksum of the content that
//! was executed.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{MigrateResult, MigrationError};
use crate::executor::{ExecutionResult, Row, SqlExecutor, SqlValue, Transaction};
use crate::naming::quote_ident;
use crate::sql::drop_table_sql;

/// Default ledger table name.
pub const DEFAULT_TABLE: &str = "_keel_migrations";

/// A record of an applied migration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationRecord {
    /// Migration name (`<timestamp>_<slug>`).
    pub name: String,
    /// Migration timestamp.
    pub timestamp: i64,
    /// Checksum of the migration content.
    pub checksum: String,
    /// When the migration was applied.
    pub applied_at: DateTime<Utc>,
}

impl MigrationRecord {
    /// Create a record applied now.
    pub fn new(name: impl Into<String>, timestamp: i64, checksum: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            timestamp,
            checksum: checksum.into(),
            applied_at: Utc::now(),
        }
    }

    fn from_row(row: &Row) -> MigrateResult<Self> {
        let invalid = |column: &str| {
            MigrationError::migration_file(format!("ledger row has an invalid `{column}` value"))
        };

        let name = row.get_str("name").ok_or_else(|| invalid("name"))?;
        let applied_at = row
            .get_str("applied_at")
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .ok_or_else(|| invalid("applied_at"))?;

        Ok(Self {
            name: name.to_string(),
            timestamp: row.get_i64("timestamp").ok_or_else(|| invalid("timestamp"))?,
            checksum: row
                .get_str("checksum")
                .ok_or_else(|| invalid("checksum"))?
                .to_string(),
            applied_at: applied_at.with_timezone(&Utc),
        })
    }
}

/// The ledger table of applied migrations.
#[derive(Debug, Clone)]
pub struct MigrationHistory {
    table: String,
}

impl Default for MigrationHistory {
    fn default() -> Self {
        Self::new(DEFAULT_TABLE)
    }
}

impl MigrationHistory {
    /// Create a ledger stored in `table`.
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
        }
    }

    /// The ledger table name.
    pub fn table(&self) -> &str {
        &self.table
    }

    /// `CREATE TABLE IF NOT EXISTS` for the ledger.
    pub fn create_table_sql(&self) -> String {
        format!(
            "CREATE TABLE IF NOT EXISTS {} (\n    \
             \"name\" TEXT NOT NULL UNIQUE,\n    \
             \"timestamp\" INTEGER NOT NULL,\n    \
             \"checksum\" TEXT NOT NULL,\n    \
             \"applied_at\" TIMESTAMP NOT NULL\n\
             );",
            quote_ident(&self.table)
        )
    }

    /// `DROP TABLE IF EXISTS` for the ledger.
    pub fn drop_table_sql(&self) -> String {
        drop_table_sql(&self.table)
    }

    /// Create the ledger table if it does not exist.
    pub async fn ensure_table<E: SqlExecutor + ?Sized>(&self, executor: &E) -> MigrateResult<()> {
        executor.execute(&self.create_table_sql(), &[]).await?;
        debug!(table = %self.table, "ensured migration ledger");
        Ok(())
    }

    /// All records, ordered by `applied_at` then `timestamp`.
    pub async fn list<E: SqlExecutor + ?Sized>(
        &self,
        executor: &E,
    ) -> MigrateResult<Vec<MigrationRecord>> {
        let sql = format!(
            "SELECT \"name\", \"timestamp\", \"checksum\", \"applied_at\" FROM {} \
             ORDER BY \"applied_at\", \"timestamp\"",
            quote_ident(&self.table)
        );
        let rows = executor.execute(&sql, &[]).await?;
        rows.iter().map(MigrationRecord::from_row).collect()
    }

    /// Insert a record inside the transaction applying its file.
    pub async fn insert(
        &self,
        tx: &mut (dyn Transaction + '_),
        record: &MigrationRecord,
    ) -> ExecutionResult<()> {
        let sql = format!(
            "INSERT INTO {} (\"name\", \"timestamp\", \"checksum\", \"applied_at\") \
             VALUES (?1, ?2, ?3, ?4)",
            quote_ident(&self.table)
        );
        let params = [
            SqlValue::from(record.name.as_str()),
            SqlValue::from(record.timestamp),
            SqlValue::from(record.checksum.as_str()),
            SqlValue::from(
                record
                    .applied_at
                    .to_rfc3339_opts(SecondsFormat::Micros, true),
            ),
        ];
        tx.execute(&sql, &params).await?;
        Ok(())
    }

    /// Drop the ledger table.
    pub async fn drop_table<E: SqlExecutor + ?Sized>(&self, executor: &E) -> MigrateResult<()> {
        executor.execute(&self.drop_table_sql(), &[]).await?;
        debug!(table = %self.table, "dropped migration ledger");
        Ok(())
    }
}
