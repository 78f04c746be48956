//! Migration file generation.

use std::path::{Path, PathBuf};

use keel_schema::{SchemaDocument, parse_schema};
use tracing::{debug, info};

use crate::diff::{SchemaChange, diff, summary};
use crate::error::{MigrateResult, MigrationError};
use crate::file::{MigrationFile, MigrationFileManager, sanitize_name};

/// File holding the schema text the latest migration was generated from.
pub const SNAPSHOT_FILE: &str = "schema.snapshot.keel";

/// Render changes as one migration script.
///
/// Control characters in `name` become spaces so the header stays a single
/// comment line.
pub fn render_script(name: &str, changes: &[SchemaChange]) -> String {
    let header: String = name
        .chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect();
    let statements: Vec<&str> = changes.iter().map(SchemaChange::sql).collect();
    format!("-- Migration: {header}\n\n{}\n", statements.join("\n\n"))
}

/// Writes migration files for schema changes.
#[derive(Debug, Clone)]
pub struct MigrationGenerator {
    files: MigrationFileManager,
}

impl MigrationGenerator {
    /// Create a generator writing into `migrations_dir`.
    pub fn new(migrations_dir: impl Into<PathBuf>) -> Self {
        Self {
            files: MigrationFileManager::new(migrations_dir),
        }
    }

    /// The underlying file store.
    pub fn files(&self) -> &MigrationFileManager {
        &self.files
    }

    /// Path of the schema snapshot.
    pub fn snapshot_path(&self) -> PathBuf {
        self.files.migrations_dir().join(SNAPSHOT_FILE)
    }

    /// The schema the latest migration was generated from, or an empty
    /// document when nothing has been generated yet.
    pub async fn previous_state(&self) -> MigrateResult<SchemaDocument> {
        let path = self.snapshot_path();
        let exists = tokio::fs::try_exists(&path)
            .await
            .map_err(|e| MigrationError::io(&path, e))?;
        if !exists {
            return Ok(SchemaDocument::default());
        }

        let text = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| MigrationError::io(&path, e))?;
        Ok(parse_schema(&text)?)
    }

    /// Diff the schema at `schema_path` against `previous` and write a
    /// migration for the changes.
    ///
    /// Returns `None` and writes nothing when there are no changes.
    pub async fn generate(
        &self,
        schema_path: impl AsRef<Path>,
        previous: &SchemaDocument,
        name: &str,
    ) -> MigrateResult<Option<MigrationFile>> {
        let schema_path = schema_path.as_ref();
        let text = tokio::fs::read_to_string(schema_path)
            .await
            .map_err(|e| MigrationError::io(schema_path, e))?;
        let current = parse_schema(&text)?;

        let changes = diff(previous, &current)?;
        if changes.is_empty() {
            debug!(schema = %schema_path.display(), "no schema changes");
            return Ok(None);
        }

        let timestamp = self.files.next_timestamp().await?;
        let migration = MigrationFile::new(timestamp, &sanitize_name(name), render_script(name, &changes));
        let path = self.files.write_migration(&migration).await?;

        let snapshot = self.snapshot_path();
        tokio::fs::write(&snapshot, &text)
            .await
            .map_err(|e| MigrationError::io(&snapshot, e))?;

        info!(
            migration = %migration.name,
            summary = %summary(&changes),
            "generated migration"
        );
        Ok(Some(migration.with_path(path)))
    }

    /// Generate against the stored snapshot.
    pub async fn generate_next(
        &self,
        schema_path: impl AsRef<Path>,
        name: &str,
    ) -> MigrateResult<Option<MigrationFile>> {
        let previous = self.previous_state().await?;
        self.generate(schema_path, &previous, name).await
    }
}
