//! Database Test Utilities

use anyhow::Result;
use placeli_common::db::{create_schema, init_database, PlaceStore, SqlitePlaceStore};
use placeli_common::Place;
use sqlx::sqlite::SqlitePoolOptions;
use tempfile::TempDir;

/// In-memory store with the real schema
pub async fn create_test_store() -> Result<SqlitePlaceStore> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await?;
    create_schema(&pool).await?;
    Ok(SqlitePlaceStore::new(pool))
}

/// File-backed store
///
/// Returns (TempDir, store) - TempDir must be kept alive for duration of test
pub async fn create_file_store() -> Result<(TempDir, SqlitePlaceStore)> {
    let temp_dir = TempDir::new()?;
    let pool = init_database(&temp_dir.path().join("places.db")).await?;
    Ok((temp_dir, SqlitePlaceStore::new(pool)))
}

/// Every stored place, ordered by id, for before/after comparisons
pub async fn snapshot(store: &dyn PlaceStore) -> Vec<Place> {
    let mut places = store.all().await.unwrap();
    places.sort_by(|a, b| a.id.cmp(&b.id));
    places
}
