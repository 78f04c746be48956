//! Integration tests for `keel.toml` handling.

use keel::KeelConfig;
use keel::migrate::{ConnectionOptions, MigrationConfig};
use pretty_assertions::assert_eq;
use std::path::PathBuf;
use tempfile::TempDir;

#[test]
fn test_config_file_feeds_migration_config() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("keel.toml");
    std::fs::write(
        &path,
        r#"
        [database]
        provider = "sqlite"
        url = "sqlite://data/app.db"

        [schema]
        path = "db/schema.keel"

        [migrations]
        directory = "db/migrations"
        table = "keel_history"
    "#,
    )
    .unwrap();

    let config = KeelConfig::from_file(&path).unwrap();
    assert_eq!(config.schema.path, "db/schema.keel");

    let migrations = MigrationConfig::from_keel_config(&config);
    assert_eq!(migrations.migrations_dir, PathBuf::from("db/migrations"));
    assert_eq!(migrations.table, "keel_history");

    let options = ConnectionOptions::new(config.database_url().unwrap());
    assert_eq!(options.path(), "data/app.db");
    assert!(!options.is_in_memory());
}

#[test]
fn test_defaults_without_file_sections() {
    let config = KeelConfig::from_str("").unwrap();
    let migrations = MigrationConfig::from_keel_config(&config);
    assert_eq!(migrations.migrations_dir, PathBuf::from("./migrations"));
    assert_eq!(migrations.table, "_keel_migrations");
    assert_eq!(config.database_url(), None);
}

#[test]
fn test_environment_override_reaches_migrations() {
    let config = KeelConfig::from_str(
        r#"
        [migrations]
        table = "history"

        [environments.ci.migrations]
        directory = "/tmp/ci-migrations"
    "#,
    )
    .unwrap()
    .with_environment("ci")
    .unwrap();

    let migrations = MigrationConfig::from_keel_config(&config);
    assert_eq!(migrations.migrations_dir, PathBuf::from("/tmp/ci-migrations"));
    assert_eq!(migrations.table, "history");
}

#[test]
fn test_missing_config_file() {
    let dir = TempDir::new().unwrap();
    let err = KeelConfig::from_file(dir.path().join("keel.toml")).unwrap_err();
    assert!(err.to_string().contains("keel.toml"));
}
