//! Migration manager: applies migration files and tracks them in the ledger.
//!
//! The manager is a small state machine. It starts `Uninitialized`, becomes
//! `Ready` once [`MigrationManager::initialize`] has ensured the ledger table,
//! and ends `Closed` after [`MigrationManager::close`]. Every other operation
//! requires `Ready`.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::LazyLock;
use std::time::Instant;

use chrono::{DateTime, Utc};
use keel_schema::KeelConfig;
use parking_lot::RwLock;
use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::error::{MigrateResult, MigrationError};
use crate::executor::{ExecutionResult, SqlExecutor, Transaction};
use crate::file::{MigrationFile, MigrationFileManager};
use crate::history::{DEFAULT_TABLE, MigrationHistory, MigrationRecord};
use crate::sql::drop_table_sql;

static CREATE_TABLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?im)^\s*CREATE\s+TABLE\s+(?:IF\s+NOT\s+EXISTS\s+)?("(?:[^"]|"")+"|[A-Za-z_][A-Za-z0-9_]*)"#)
        .expect("valid regex")
});

/// Configuration for the migration manager.
#[derive(Debug, Clone)]
pub struct MigrationConfig {
    /// Path to the migrations directory.
    pub migrations_dir: PathBuf,
    /// Name of the ledger table.
    pub table: String,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            migrations_dir: PathBuf::from("./migrations"),
            table: DEFAULT_TABLE.to_string(),
        }
    }
}

impl MigrationConfig {
    /// Create a new configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from the `[migrations]` section of `keel.toml`.
    pub fn from_keel_config(config: &KeelConfig) -> Self {
        Self::new()
            .migrations_dir(&config.migrations.directory)
            .table(&config.migrations.table)
    }

    /// Set the migrations directory.
    pub fn migrations_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.migrations_dir = dir.into();
        self
    }

    /// Set the ledger table name.
    pub fn table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }
}

/// Options for applying migrations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplyOptions {
    /// Report what would run without executing anything.
    pub dry_run: bool,
    /// Continue past checksum mismatches instead of failing.
    pub force: bool,
}

impl ApplyOptions {
    /// Create default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable dry-run mode.
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Continue past checksum mismatches.
    pub fn force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }
}

/// Lifecycle state of a [`MigrationManager`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ManagerState {
    /// Created, ledger not yet ensured.
    Uninitialized,
    /// Ledger ensured; operations allowed.
    Ready,
    /// Executor released.
    Closed,
}

impl ManagerState {
    /// The state name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::Ready => "ready",
            Self::Closed => "closed",
        }
    }
}

/// What happened to one migration file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OutcomeStatus {
    /// Executed and recorded.
    Applied,
    /// Would be executed (dry run).
    DryRun,
    /// Already applied, but the file changed since.
    ChecksumMismatch,
    /// Execution failed and was rolled back.
    Failed,
}

/// Outcome of one migration file in an apply run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationOutcome {
    /// Migration name.
    pub name: String,
    /// Result.
    pub status: OutcomeStatus,
    /// Statements of the file (reported for dry runs).
    pub statements: Vec<String>,
    /// Execution time in milliseconds.
    pub duration_ms: u64,
    /// Error or mismatch details.
    pub error: Option<String>,
}

impl MigrationOutcome {
    fn new(name: &str, status: OutcomeStatus) -> Self {
        Self {
            name: name.to_string(),
            status,
            statements: Vec::new(),
            duration_ms: 0,
            error: None,
        }
    }
}

/// Result of [`MigrationManager::apply_pending_migrations`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplyReport {
    /// Per-file outcomes, in processing order.
    pub outcomes: Vec<MigrationOutcome>,
    /// Whether this was a dry run.
    pub dry_run: bool,
    /// Total duration in milliseconds.
    pub duration_ms: u64,
}

impl ApplyReport {
    /// Names of the files applied in this run.
    pub fn applied(&self) -> Vec<&str> {
        self.with_status(OutcomeStatus::Applied)
    }

    /// Names of applied files whose content changed.
    pub fn mismatches(&self) -> Vec<&str> {
        self.with_status(OutcomeStatus::ChecksumMismatch)
    }

    /// The failed file, if the run halted.
    pub fn failure(&self) -> Option<&MigrationOutcome> {
        self.outcomes
            .iter()
            .find(|o| o.status == OutcomeStatus::Failed)
    }

    /// Check if no file failed.
    pub fn is_success(&self) -> bool {
        self.failure().is_none()
    }

    /// Get a summary of the result.
    pub fn summary(&self) -> String {
        let mut parts = Vec::new();

        let applied = self.applied().len();
        if applied > 0 {
            parts.push(format!("{applied} applied"));
        }
        let pending = self.with_status(OutcomeStatus::DryRun).len();
        if pending > 0 {
            parts.push(format!("{pending} pending (dry run)"));
        }
        let mismatched = self.mismatches().len();
        if mismatched > 0 {
            parts.push(format!("{mismatched} checksum mismatches"));
        }
        if let Some(failed) = self.failure() {
            parts.push(format!("failed at {}", failed.name));
        }

        if parts.is_empty() {
            "No migrations applied".to_string()
        } else {
            format!("{} in {}ms", parts.join(", "), self.duration_ms)
        }
    }

    fn with_status(&self, status: OutcomeStatus) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|o| o.status == status)
            .map(|o| o.name.as_str())
            .collect()
    }
}

/// Result of [`MigrationManager::reset_database`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResetReport {
    /// Tables dropped, in drop order.
    pub dropped_tables: Vec<String>,
    /// The drop statements, ledger last.
    pub drop_statements: Vec<String>,
    /// Re-application of every migration file.
    pub apply: ApplyReport,
}

/// Status of one migration, from files and ledger combined.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationStatusEntry {
    /// Migration name.
    pub name: String,
    /// Migration timestamp.
    pub timestamp: i64,
    /// Whether the ledger records it.
    pub applied: bool,
    /// When it was applied.
    pub applied_at: Option<DateTime<Utc>>,
    /// Whether the file changed after it was applied.
    pub checksum_mismatch: bool,
    /// Whether the ledger records it but the file is gone.
    pub missing_file: bool,
}

/// Applies migration files through an [`SqlExecutor`].
pub struct MigrationManager<E: SqlExecutor> {
    executor: E,
    config: MigrationConfig,
    files: MigrationFileManager,
    history: MigrationHistory,
    state: RwLock<ManagerState>,
}

impl<E: SqlExecutor> std::fmt::Debug for MigrationManager<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MigrationManager")
            .field("config", &self.config)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl<E: SqlExecutor> MigrationManager<E> {
    /// Create a manager. Call [`initialize`](Self::initialize) before use.
    pub fn new(executor: E, config: MigrationConfig) -> Self {
        Self {
            files: MigrationFileManager::new(&config.migrations_dir),
            history: MigrationHistory::new(&config.table),
            executor,
            config,
            state: RwLock::new(ManagerState::Uninitialized),
        }
    }

    /// The current state.
    pub fn state(&self) -> ManagerState {
        *self.state.read()
    }

    /// The configuration.
    pub fn config(&self) -> &MigrationConfig {
        &self.config
    }

    /// The execution capability.
    pub fn executor(&self) -> &E {
        &self.executor
    }

    /// Ensure the ledger table exists and move to `Ready`.
    pub async fn initialize(&self) -> MigrateResult<()> {
        let state = self.state();
        if state == ManagerState::Closed {
            return Err(invalid_state(ManagerState::Uninitialized, state));
        }

        self.history.ensure_table(&self.executor).await?;
        *self.state.write() = ManagerState::Ready;
        debug!(table = self.history.table(), "migration manager ready");
        Ok(())
    }

    /// Release the executor. Later operations fail.
    pub async fn close(&self) -> MigrateResult<()> {
        let state = self.state();
        if state == ManagerState::Closed {
            return Err(invalid_state(ManagerState::Ready, state));
        }

        *self.state.write() = ManagerState::Closed;
        self.executor.close().await?;
        debug!("migration manager closed");
        Ok(())
    }

    /// Apply every migration file not yet recorded in the ledger.
    ///
    /// Applied files whose checksum changed fail the call before anything
    /// runs, unless `force` is set, in which case they are reported and
    /// skipped. A failing file is rolled back and halts the run.
    pub async fn apply_pending_migrations(&self, options: ApplyOptions) -> MigrateResult<ApplyReport> {
        self.require_ready()?;
        let start = Instant::now();

        let files = self.files.list_migrations().await?;
        let records = self.history.list(&self.executor).await?;
        let recorded: HashMap<&str, &MigrationRecord> =
            records.iter().map(|r| (r.name.as_str(), r)).collect();

        let mut report = ApplyReport {
            dry_run: options.dry_run,
            ..Default::default()
        };

        for file in &files {
            let Some(record) = recorded.get(file.name.as_str()) else {
                continue;
            };
            if record.checksum == file.checksum {
                continue;
            }
            if !options.force {
                return Err(MigrationError::ChecksumMismatch {
                    name: file.name.clone(),
                    expected: record.checksum.clone(),
                    actual: file.checksum.clone(),
                });
            }
            warn!(
                migration = %file.name,
                expected = %record.checksum,
                actual = %file.checksum,
                "checksum mismatch on applied migration"
            );
            let mut outcome = MigrationOutcome::new(&file.name, OutcomeStatus::ChecksumMismatch);
            outcome.error = Some(format!(
                "expected {}, got {}",
                record.checksum, file.checksum
            ));
            report.outcomes.push(outcome);
        }

        let pending = files
            .iter()
            .filter(|f| !recorded.contains_key(f.name.as_str()));
        for file in pending {
            if options.dry_run {
                let mut outcome = MigrationOutcome::new(&file.name, OutcomeStatus::DryRun);
                outcome.statements = file.statements();
                report.outcomes.push(outcome);
                continue;
            }

            info!(name = %file.name, "Applying migration");
            let started = Instant::now();
            let result = self.apply_file(file).await;
            let duration_ms = started.elapsed().as_millis() as u64;

            match result {
                Ok(()) => {
                    let mut outcome = MigrationOutcome::new(&file.name, OutcomeStatus::Applied);
                    outcome.duration_ms = duration_ms;
                    report.outcomes.push(outcome);
                }
                Err(e) => {
                    error!(name = %file.name, error = %e, "migration failed");
                    let mut outcome = MigrationOutcome::new(&file.name, OutcomeStatus::Failed);
                    outcome.duration_ms = duration_ms;
                    outcome.error = Some(e.to_string());
                    report.outcomes.push(outcome);
                    break;
                }
            }
        }

        report.duration_ms = start.elapsed().as_millis() as u64;
        info!(summary = %report.summary(), "migration run finished");
        Ok(report)
    }

    /// Drop every table the migration files create plus the ledger, then
    /// apply all files again.
    pub async fn reset_database(&self, options: ApplyOptions) -> MigrateResult<ResetReport> {
        self.require_ready()?;

        let files = self.files.list_migrations().await?;
        let mut dropped_tables = created_tables(&files);
        dropped_tables.reverse();

        let mut drop_statements: Vec<String> =
            dropped_tables.iter().map(|t| drop_table_sql(t)).collect();
        drop_statements.push(self.history.drop_table_sql());

        if options.dry_run {
            let outcomes = files
                .iter()
                .map(|file| {
                    let mut outcome = MigrationOutcome::new(&file.name, OutcomeStatus::DryRun);
                    outcome.statements = file.statements();
                    outcome
                })
                .collect();
            return Ok(ResetReport {
                dropped_tables,
                drop_statements,
                apply: ApplyReport {
                    outcomes,
                    dry_run: true,
                    duration_ms: 0,
                },
            });
        }

        warn!(tables = dropped_tables.len(), "resetting database");
        for statement in &drop_statements {
            self.executor.execute(statement, &[]).await?;
        }
        self.history.ensure_table(&self.executor).await?;

        let apply = self.apply_pending_migrations(options).await?;
        Ok(ResetReport {
            dropped_tables,
            drop_statements,
            apply,
        })
    }

    /// Status of every migration file, followed by ledger records whose
    /// file no longer exists.
    pub async fn get_migration_status(&self) -> MigrateResult<Vec<MigrationStatusEntry>> {
        self.require_ready()?;

        let files = self.files.list_migrations().await?;
        let records = self.history.list(&self.executor).await?;
        let recorded: HashMap<&str, &MigrationRecord> =
            records.iter().map(|r| (r.name.as_str(), r)).collect();

        let mut entries: Vec<MigrationStatusEntry> = files
            .iter()
            .map(|file| {
                let record = recorded.get(file.name.as_str());
                MigrationStatusEntry {
                    name: file.name.clone(),
                    timestamp: file.timestamp,
                    applied: record.is_some(),
                    applied_at: record.map(|r| r.applied_at),
                    checksum_mismatch: record.is_some_and(|r| r.checksum != file.checksum),
                    missing_file: false,
                }
            })
            .collect();

        for record in &records {
            if !files.iter().any(|f| f.name == record.name) {
                entries.push(MigrationStatusEntry {
                    name: record.name.clone(),
                    timestamp: record.timestamp,
                    applied: true,
                    applied_at: Some(record.applied_at),
                    checksum_mismatch: false,
                    missing_file: true,
                });
            }
        }

        Ok(entries)
    }

    fn require_ready(&self) -> MigrateResult<()> {
        match self.state() {
            ManagerState::Ready => Ok(()),
            other => Err(invalid_state(ManagerState::Ready, other)),
        }
    }

    /// Run one file and its ledger insert in a single transaction.
    async fn apply_file(&self, file: &MigrationFile) -> ExecutionResult<()> {
        let mut tx = self.executor.begin().await?;

        if let Err(e) = self.run_file(tx.as_mut(), file).await {
            if let Err(rollback) = tx.rollback().await {
                warn!(name = %file.name, error = %rollback, "rollback failed");
            }
            return Err(e);
        }

        tx.commit().await
    }

    async fn run_file(
        &self,
        tx: &mut (dyn Transaction + '_),
        file: &MigrationFile,
    ) -> ExecutionResult<()> {
        for statement in file.statements() {
            tx.execute(&statement, &[]).await?;
        }
        let record = MigrationRecord::new(&file.name, file.timestamp, &file.checksum);
        self.history.insert(tx, &record).await
    }
}

fn invalid_state(expected: ManagerState, actual: ManagerState) -> MigrationError {
    MigrationError::InvalidState {
        expected: expected.as_str(),
        actual: actual.as_str(),
    }
}

/// Tables created by the files, in creation order, without duplicates.
fn created_tables(files: &[MigrationFile]) -> Vec<String> {
    let mut tables: Vec<String> = Vec::new();
    for file in files {
        for caps in CREATE_TABLE_RE.captures_iter(&file.sql) {
            let raw = &caps[1];
            let name = raw
                .strip_prefix('"')
                .and_then(|n| n.strip_suffix('"'))
                .map(|n| n.replace("\"\"", "\""))
                .unwrap_or_else(|| raw.to_string());
            if !tables.contains(&name) {
                tables.push(name);
            }
        }
    }
    tables
}
