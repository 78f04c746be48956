//! End-to-end migration tests against a real SQLite database.

use std::sync::Arc;

use keel::migrate::{
    ApplyOptions, ConnectionOptions, ExecutorRegistry, MigrationConfig, MigrationError,
    MigrationGenerator, MigrationManager, SqlExecutor, SqliteExecutor,
};
use pretty_assertions::assert_eq;
use tempfile::TempDir;

const V1: &str = r#"
model User {
  id    Int    @id @default(autoincrement())
  email String @unique
}
"#;

const V2: &str = r#"
model User {
  id    Int     @id @default(autoincrement())
  email String  @unique
  bio   String?
  posts Post[]
}

model Post {
  id       Int    @id @default(autoincrement())
  authorId Int
  author   User   @relation(fields: [authorId], references: [id], onDelete: Cascade)
}
"#;

struct Project {
    dir: TempDir,
    generator: MigrationGenerator,
}

impl Project {
    async fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let generator = MigrationGenerator::new(dir.path().join("migrations"));
        Self { dir, generator }
    }

    async fn generate(&self, schema: &str, name: &str) -> Option<keel::migrate::MigrationFile> {
        let path = self.dir.path().join("schema.keel");
        tokio::fs::write(&path, schema).await.unwrap();
        self.generator.generate_next(&path, name).await.unwrap()
    }

    async fn manager(&self) -> MigrationManager<SqliteExecutor> {
        let executor = SqliteExecutor::connect(&ConnectionOptions::new(
            self.dir.path().join("app.db").display().to_string(),
        ))
        .unwrap();
        let manager = MigrationManager::new(
            executor,
            MigrationConfig::new().migrations_dir(self.generator.files().migrations_dir()),
        );
        manager.initialize().await.unwrap();
        manager
    }
}

#[tokio::test]
async fn test_generate_apply_and_track() {
    let project = Project::new().await;
    let first = project.generate(V1, "init").await.unwrap();
    let second = project.generate(V2, "posts").await.unwrap();
    assert!(project.generate(V2, "noop").await.is_none());
    assert!(second.sql.contains("ALTER TABLE \"user\" ADD COLUMN \"bio\" TEXT;"));

    let manager = project.manager().await;
    let report = manager
        .apply_pending_migrations(ApplyOptions::new())
        .await
        .unwrap();
    assert_eq!(report.applied(), vec![first.name.as_str(), second.name.as_str()]);

    let status = manager.get_migration_status().await.unwrap();
    assert_eq!(
        status.iter().map(|s| s.name.as_str()).collect::<Vec<_>>(),
        vec![first.name.as_str(), second.name.as_str()]
    );
    assert!(status.iter().all(|s| s.applied && !s.checksum_mismatch));

    tokio::fs::write(&first.path, format!("{}\n-- tweaked\n", first.sql))
        .await
        .unwrap();
    let status = manager.get_migration_status().await.unwrap();
    assert_eq!(
        status.iter().map(|s| s.checksum_mismatch).collect::<Vec<_>>(),
        vec![true, false]
    );

    let err = manager
        .apply_pending_migrations(ApplyOptions::new())
        .await
        .unwrap_err();
    assert!(matches!(err, MigrationError::ChecksumMismatch { .. }));

    manager.close().await.unwrap();
}

#[tokio::test]
async fn test_foreign_key_cascade_is_enforced() {
    let project = Project::new().await;
    project.generate(V2, "init").await.unwrap();

    let manager = project.manager().await;
    manager
        .apply_pending_migrations(ApplyOptions::new())
        .await
        .unwrap();

    let db = manager.executor();
    db.execute("INSERT INTO \"user\" (\"email\") VALUES ('a@example.com')", &[])
        .await
        .unwrap();
    db.execute("INSERT INTO \"post\" (\"author_id\") VALUES (1)", &[])
        .await
        .unwrap();
    assert!(
        db.execute("INSERT INTO \"post\" (\"author_id\") VALUES (99)", &[])
            .await
            .is_err()
    );

    db.execute("DELETE FROM \"user\"", &[]).await.unwrap();
    let rows = db
        .execute("SELECT COUNT(*) AS n FROM \"post\"", &[])
        .await
        .unwrap();
    assert_eq!(rows[0].get_i64("n"), Some(0));
}

#[tokio::test]
async fn test_reset_reapplies_everything() {
    let project = Project::new().await;
    project.generate(V1, "init").await.unwrap();
    project.generate(V2, "posts").await.unwrap();

    let manager = project.manager().await;
    manager
        .apply_pending_migrations(ApplyOptions::new())
        .await
        .unwrap();

    let report = manager.reset_database(ApplyOptions::new()).await.unwrap();
    assert_eq!(report.dropped_tables, vec!["post", "user"]);
    assert_eq!(report.apply.applied().len(), 2);
    assert_eq!(manager.get_migration_status().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_registry_shares_executors() {
    let registry: ExecutorRegistry<SqliteExecutor> = ExecutorRegistry::new();
    let options = ConnectionOptions::in_memory();

    let first = registry
        .get_or_connect(&options, |o| async move { SqliteExecutor::connect(&o) })
        .await
        .unwrap();
    let second = registry
        .get_or_connect(&options, |o| async move { SqliteExecutor::connect(&o) })
        .await
        .unwrap();
    assert!(Arc::ptr_eq(&first, &second));

    let manager = MigrationManager::new(first, MigrationConfig::new());
    manager.initialize().await.unwrap();
    let rows = second
        .execute(
            "SELECT name FROM sqlite_master WHERE name = '_keel_migrations'",
            &[],
        )
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);

    registry.close_all().await.unwrap();
    assert!(registry.is_empty().await);
}
