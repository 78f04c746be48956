//! Migration file management.
//!
//! Migrations are single `<timestamp>_<slug>.sql` files in one directory.
//! Timestamps are `YYYYMMDDHHMMSS` integers and order the files.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::error::{MigrateResult, MigrationError};

/// A migration file on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationFile {
    /// Full migration name, `<timestamp>_<slug>`.
    pub name: String,
    /// Ordering timestamp (`YYYYMMDDHHMMSS`).
    pub timestamp: i64,
    /// Path to the migration file.
    pub path: PathBuf,
    /// SQL content, verbatim.
    pub sql: String,
    /// Hex SHA-256 of `sql`.
    pub checksum: String,
}

impl MigrationFile {
    /// Create a migration from its timestamp, slug and content.
    pub fn new(timestamp: i64, slug: &str, sql: impl Into<String>) -> Self {
        let sql = sql.into();
        let checksum = compute_checksum(&sql);

        Self {
            name: format!("{timestamp}_{slug}"),
            timestamp,
            path: PathBuf::new(),
            sql,
            checksum,
        }
    }

    /// Set the path for this migration file.
    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = path.into();
        self
    }

    /// The file name this migration is stored under.
    pub fn file_name(&self) -> String {
        format!("{}.sql", self.name)
    }

    /// Verify the checksum matches the content.
    pub fn verify_checksum(&self) -> bool {
        compute_checksum(&self.sql) == self.checksum
    }

    /// The executable statements of this migration.
    pub fn statements(&self) -> Vec<String> {
        split_statements(&self.sql)
    }
}

/// Compute the hex SHA-256 checksum of migration content.
pub fn compute_checksum(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}

/// Turn a free-form migration name into a file-name slug.
///
/// Lowercase ASCII alphanumerics are kept; every other run of characters
/// becomes a single `_`. An empty result becomes `migration`.
pub fn sanitize_name(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_sep = false;

    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_sep && !slug.is_empty() {
                slug.push('_');
            }
            pending_sep = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_sep = true;
        }
    }

    if slug.is_empty() {
        "migration".to_string()
    } else {
        slug
    }
}

/// Format a point in time as a migration timestamp.
pub fn timestamp_from(time: DateTime<Utc>) -> i64 {
    time.format("%Y%m%d%H%M%S")
        .to_string()
        .parse()
        .unwrap_or_default()
}

/// The timestamp for a new migration: now, or one past the latest existing one.
pub fn next_timestamp(now: DateTime<Utc>, latest: Option<i64>) -> i64 {
    let now = timestamp_from(now);
    match latest {
        Some(latest) if latest >= now => latest + 1,
        _ => now,
    }
}

/// Parse a migration file stem into (timestamp, slug).
pub fn parse_migration_name(stem: &str) -> MigrateResult<(i64, String)> {
    let Some((digits, slug)) = stem.split_once('_') else {
        return Err(MigrationError::migration_file(format!(
            "invalid migration name format: {stem}. Expected: TIMESTAMP_NAME"
        )));
    };

    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) || slug.is_empty() {
        return Err(MigrationError::migration_file(format!(
            "invalid migration name format: {stem}. Expected: TIMESTAMP_NAME"
        )));
    }

    let timestamp = digits.parse().map_err(|_| {
        MigrationError::migration_file(format!("migration timestamp out of range: {digits}"))
    })?;

    Ok((timestamp, slug.to_string()))
}

/// Split a SQL script into statements.
///
/// Splits on `;` outside string literals, quoted identifiers and comments.
/// Fragments that hold only whitespace and comments are dropped.
pub fn split_statements(sql: &str) -> Vec<String> {
    #[derive(Clone, Copy, PartialEq)]
    enum State {
        Code,
        Quoted(char),
        LineComment,
        BlockComment,
    }

    let mut statements = Vec::new();
    let mut current = String::new();
    let mut has_code = false;
    let mut state = State::Code;
    let mut chars = sql.chars().peekable();

    while let Some(c) = chars.next() {
        match state {
            State::Code => match c {
                ';' => {
                    if has_code {
                        statements.push(current.trim().to_string());
                    }
                    current.clear();
                    has_code = false;
                    continue;
                }
                '\'' | '"' | '`' => {
                    state = State::Quoted(c);
                    has_code = true;
                }
                '-' if chars.peek() == Some(&'-') => state = State::LineComment,
                '/' if chars.peek() == Some(&'*') => {
                    current.push(c);
                    if let Some(star) = chars.next() {
                        current.push(star);
                    }
                    state = State::BlockComment;
                    continue;
                }
                c if !c.is_whitespace() => has_code = true,
                _ => {}
            },
            State::Quoted(q) if c == q => state = State::Code,
            State::Quoted(_) => {}
            State::LineComment if c == '\n' => state = State::Code,
            State::LineComment => {}
            State::BlockComment if c == '*' && chars.peek() == Some(&'/') => {
                current.push(c);
                if let Some(slash) = chars.next() {
                    current.push(slash);
                }
                state = State::Code;
                continue;
            }
            State::BlockComment => {}
        }
        current.push(c);
    }

    if has_code {
        statements.push(current.trim().to_string());
    }

    statements
}

/// Migration file reader/writer.
#[derive(Debug, Clone)]
pub struct MigrationFileManager {
    /// Directory where migrations are stored.
    migrations_dir: PathBuf,
}

impl MigrationFileManager {
    /// Create a new file manager.
    pub fn new(migrations_dir: impl Into<PathBuf>) -> Self {
        Self {
            migrations_dir: migrations_dir.into(),
        }
    }

    /// Get the migrations directory.
    pub fn migrations_dir(&self) -> &Path {
        &self.migrations_dir
    }

    /// Ensure the migrations directory exists.
    pub async fn ensure_dir(&self) -> MigrateResult<()> {
        tokio::fs::create_dir_all(&self.migrations_dir)
            .await
            .map_err(|e| MigrationError::io(&self.migrations_dir, e))
    }

    /// List all migration files, ordered by timestamp then name.
    ///
    /// Files without a `.sql` extension are ignored; a `.sql` file whose name
    /// is not `<digits>_<slug>` is an error.
    pub async fn list_migrations(&self) -> MigrateResult<Vec<MigrationFile>> {
        let mut migrations = Vec::new();

        if !tokio::fs::try_exists(&self.migrations_dir)
            .await
            .map_err(|e| MigrationError::io(&self.migrations_dir, e))?
        {
            return Ok(migrations);
        }

        let mut entries = tokio::fs::read_dir(&self.migrations_dir)
            .await
            .map_err(|e| MigrationError::io(&self.migrations_dir, e))?;

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| MigrationError::io(&self.migrations_dir, e))?
        {
            let path = entry.path();
            let is_file = entry
                .file_type()
                .await
                .map_err(|e| MigrationError::io(&path, e))?
                .is_file();
            if is_file && path.extension().is_some_and(|ext| ext == "sql") {
                migrations.push(self.read_migration(&path).await?);
            }
        }

        migrations.sort_by(|a, b| (a.timestamp, &a.name).cmp(&(b.timestamp, &b.name)));
        debug!(count = migrations.len(), dir = %self.migrations_dir.display(), "listed migrations");
        Ok(migrations)
    }

    /// Read a single migration file.
    pub async fn read_migration(&self, path: &Path) -> MigrateResult<MigrationFile> {
        let stem = path
            .file_stem()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                MigrationError::migration_file(format!("invalid file name: {}", path.display()))
            })?;

        let (timestamp, slug) = parse_migration_name(stem)?;
        let sql = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| MigrationError::io(path, e))?;

        Ok(MigrationFile::new(timestamp, &slug, sql).with_path(path))
    }

    /// Write a migration to disk, creating the directory when missing.
    pub async fn write_migration(&self, migration: &MigrationFile) -> MigrateResult<PathBuf> {
        self.ensure_dir().await?;

        let path = self.migrations_dir.join(migration.file_name());
        tokio::fs::write(&path, &migration.sql)
            .await
            .map_err(|e| MigrationError::io(&path, e))?;

        Ok(path)
    }

    /// The timestamp to use for the next migration written to this directory.
    pub async fn next_timestamp(&self) -> MigrateResult<i64> {
        let latest = self
            .list_migrations()
            .await?
            .iter()
            .map(|m| m.timestamp)
            .max();
        Ok(next_timestamp(Utc::now(), latest))
    }
}
