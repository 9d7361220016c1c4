//! Database initialization
//!
//! Opens (or creates) the SQLite file and runs idempotent
//! `CREATE TABLE IF NOT EXISTS` migrations. Safe to call on every start.

use crate::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// Initialize database connection and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    // Create parent directory if it doesn't exist
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_millis(5000));

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    create_schema(&pool).await?;

    Ok(pool)
}

/// Create every table and index (idempotent)
pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    create_places_table(pool).await?;
    create_user_data_table(pool).await?;
    create_place_indexes(pool).await?;
    Ok(())
}

/// Provider-owned data; categories and provider scalars are JSON text
pub async fn create_places_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS places (
            id TEXT PRIMARY KEY,
            provider_id TEXT NOT NULL DEFAULT '',
            name TEXT NOT NULL DEFAULT '',
            address TEXT NOT NULL DEFAULT '',
            lat REAL NOT NULL DEFAULT 0,
            lng REAL NOT NULL DEFAULT 0,
            categories TEXT NOT NULL DEFAULT '[]',
            data TEXT NOT NULL DEFAULT '{}',
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            imported_at TEXT,
            source_hash TEXT NOT NULL DEFAULT ''
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// User-owned data, one row per place
pub async fn create_user_data_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS user_data (
            place_id TEXT PRIMARY KEY REFERENCES places(id) ON DELETE CASCADE,
            notes TEXT NOT NULL DEFAULT '',
            tags TEXT NOT NULL DEFAULT '[]',
            custom_fields TEXT NOT NULL DEFAULT '{}'
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_place_indexes(pool: &SqlitePool) -> Result<()> {
    for statement in [
        "CREATE INDEX IF NOT EXISTS idx_places_name ON places(name)",
        "CREATE INDEX IF NOT EXISTS idx_places_coordinates ON places(lat, lng)",
        "CREATE INDEX IF NOT EXISTS idx_places_provider_id ON places(provider_id)",
        "CREATE INDEX IF NOT EXISTS idx_places_source_hash ON places(source_hash)",
        "CREATE INDEX IF NOT EXISTS idx_places_updated_at ON places(updated_at)",
    ] {
        sqlx::query(statement).execute(pool).await?;
    }

    Ok(())
}
