//! Tests for database initialization
//!
//! Covers automatic creation on first run, reopening an existing file,
//! and that the schema survives repeated initialization.

use placeli_common::db::{init_database, PlaceStore, SqlitePlaceStore};
use placeli_common::{Coordinates, Place};
use tempfile::TempDir;

#[tokio::test]
async fn test_database_creation_when_missing() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("nested").join("places.db");

    let result = init_database(&db_path).await;
    assert!(result.is_ok(), "Database initialization failed: {:?}", result.err());

    assert!(db_path.exists(), "Database file was not created");
}

#[tokio::test]
async fn test_database_opens_existing_and_keeps_rows() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("places.db");

    let pool = init_database(&db_path).await.unwrap();
    let store = SqlitePlaceStore::new(pool.clone());
    let mut place = Place::new("ChIJ1", "Joe's Pizza", "", Coordinates::new(40.7128, -74.006));
    store.save(&mut place).await.unwrap();
    pool.close().await;

    // Second initialization must be idempotent
    let pool = init_database(&db_path).await.unwrap();
    let store = SqlitePlaceStore::new(pool);
    assert_eq!(store.count().await.unwrap(), 1);
    let loaded = store.get_by_id(&place.id).await.unwrap().unwrap();
    assert_eq!(loaded.name, "Joe's Pizza");
}

#[tokio::test]
async fn test_schema_has_expected_tables() {
    let temp_dir = TempDir::new().unwrap();
    let pool = init_database(&temp_dir.path().join("places.db")).await.unwrap();

    let tables: Vec<String> = sqlx::query_scalar(
        "SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name",
    )
    .fetch_all(&pool)
    .await
    .unwrap();

    assert!(tables.contains(&"places".to_string()));
    assert!(tables.contains(&"user_data".to_string()));
}
