//! Place persistence
//!
//! [`PlaceStore`] is the storage seam used by importers, the merge
//! pipeline and the CLI. [`SqlitePlaceStore`] keeps provider data in
//! `places` and user data in `user_data`, written together in one
//! transaction per save.

use crate::fields::FieldValue;
use crate::place::{Coordinates, Photo, Place, Review, PROXIMITY_TOLERANCE_DEGREES};
use crate::Result;
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use std::collections::BTreeMap;

/// Storage operations needed by import, merge and editing
#[async_trait]
pub trait PlaceStore: Send + Sync {
    async fn get_by_id(&self, id: &str) -> Result<Option<Place>>;

    /// Most recently updated first
    async fn list(&self, limit: usize, offset: usize) -> Result<Vec<Place>>;

    /// Every stored place, most recently updated first
    async fn all(&self) -> Result<Vec<Place>>;

    /// Case-insensitive substring match over name, address and notes
    async fn search(&self, query: &str) -> Result<Vec<Place>>;

    /// Upsert. Assigns `created_at` when unset (and never replaces a stored
    /// one), always refreshes `updated_at`. Timestamps are written back
    /// into `place`.
    async fn save(&self, place: &mut Place) -> Result<()>;

    /// Returns whether a place was removed
    async fn delete(&self, id: &str) -> Result<bool>;

    async fn find_by_source_hash(&self, hash: &str) -> Result<Option<Place>>;

    /// Places sharing a non-empty provider id with `place`, or lying within
    /// [`PROXIMITY_TOLERANCE_DEGREES`] of it on both axes. `(0, 0)` on
    /// either side never matches by proximity.
    async fn find_candidates(&self, place: &Place) -> Result<Vec<Place>>;

    async fn count(&self) -> Result<usize>;
}

/// Provider scalars and sub-records, stored as JSON in `places.data`
#[derive(Debug, Default, Serialize, Deserialize)]
struct ProviderData {
    #[serde(default)]
    photos: Vec<Photo>,
    #[serde(default)]
    reviews: Vec<Review>,
    #[serde(default)]
    rating: f32,
    #[serde(default)]
    rating_count: u32,
    #[serde(default)]
    price_level: u8,
    #[serde(default)]
    hours: String,
    #[serde(default)]
    phone: String,
    #[serde(default)]
    website: String,
}

impl ProviderData {
    fn from_place(place: &Place) -> Self {
        Self {
            photos: place.photos.clone(),
            reviews: place.reviews.clone(),
            rating: place.rating,
            rating_count: place.rating_count,
            price_level: place.price_level,
            hours: place.hours.clone(),
            phone: place.phone.clone(),
            website: place.website.clone(),
        }
    }
}

const SELECT_PLACE: &str = r#"
    SELECT p.id, p.provider_id, p.name, p.address, p.lat, p.lng, p.categories, p.data,
           p.created_at, p.updated_at, p.imported_at, p.source_hash,
           u.notes, u.tags, u.custom_fields
    FROM places p
    LEFT JOIN user_data u ON u.place_id = p.id
"#;

/// SQLite-backed [`PlaceStore`]
#[derive(Clone)]
pub struct SqlitePlaceStore {
    db: SqlitePool,
}

impl SqlitePlaceStore {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.db
    }
}

/// Fixed-width UTC timestamp so text ordering matches time ordering
fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(value: Option<String>) -> Option<DateTime<Utc>> {
    let raw = value?;
    match DateTime::parse_from_rfc3339(&raw) {
        Ok(ts) => Some(ts.with_timezone(&Utc)),
        Err(e) => {
            tracing::warn!(value = %raw, error = %e, "Invalid stored timestamp");
            None
        }
    }
}

/// Malformed JSON degrades to an empty value rather than failing the read
fn decode_json<T: DeserializeOwned + Default>(raw: Option<String>, column: &str, id: &str) -> T {
    match raw {
        None => T::default(),
        Some(text) if text.is_empty() => T::default(),
        Some(text) => serde_json::from_str(&text).unwrap_or_else(|e| {
            tracing::warn!(place_id = %id, column, error = %e, "Malformed JSON column, using empty value");
            T::default()
        }),
    }
}

fn row_to_place(row: &SqliteRow) -> Place {
    let id: String = row.get("id");
    let data: ProviderData = decode_json(row.get("data"), "data", &id);
    let categories: Vec<String> = decode_json(row.get("categories"), "categories", &id);
    let user_tags: Vec<String> = decode_json(row.get("tags"), "tags", &id);
    let custom_fields: BTreeMap<String, FieldValue> =
        decode_json(row.get("custom_fields"), "custom_fields", &id);
    let notes: Option<String> = row.get("notes");

    Place {
        provider_id: row.get("provider_id"),
        name: row.get("name"),
        address: row.get("address"),
        coordinates: Coordinates::new(row.get("lat"), row.get("lng")),
        categories,
        photos: data.photos,
        reviews: data.reviews,
        rating: data.rating,
        rating_count: data.rating_count,
        price_level: data.price_level,
        hours: data.hours,
        phone: data.phone,
        website: data.website,
        user_notes: notes.unwrap_or_default(),
        user_tags,
        custom_fields,
        created_at: parse_timestamp(row.get("created_at")),
        updated_at: parse_timestamp(row.get("updated_at")),
        imported_at: parse_timestamp(row.get("imported_at")),
        source_hash: row.get("source_hash"),
        id,
    }
}

fn like_pattern(query: &str) -> String {
    let escaped = query
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

#[async_trait]
impl PlaceStore for SqlitePlaceStore {
    async fn get_by_id(&self, id: &str) -> Result<Option<Place>> {
        let sql = format!("{} WHERE p.id = ?", SELECT_PLACE);
        let row = sqlx::query(&sql).bind(id).fetch_optional(&self.db).await?;
        Ok(row.as_ref().map(row_to_place))
    }

    async fn list(&self, limit: usize, offset: usize) -> Result<Vec<Place>> {
        let sql = format!("{} ORDER BY p.updated_at DESC, p.id LIMIT ? OFFSET ?", SELECT_PLACE);
        let rows = sqlx::query(&sql)
            .bind(limit.min(i64::MAX as usize) as i64)
            .bind(offset.min(i64::MAX as usize) as i64)
            .fetch_all(&self.db)
            .await?;
        Ok(rows.iter().map(row_to_place).collect())
    }

    async fn all(&self) -> Result<Vec<Place>> {
        let sql = format!("{} ORDER BY p.updated_at DESC, p.id", SELECT_PLACE);
        let rows = sqlx::query(&sql).fetch_all(&self.db).await?;
        Ok(rows.iter().map(row_to_place).collect())
    }

    async fn search(&self, query: &str) -> Result<Vec<Place>> {
        let pattern = like_pattern(query);
        let sql = format!(
            "{} WHERE p.name LIKE ? ESCAPE '\\' OR p.address LIKE ? ESCAPE '\\' OR u.notes LIKE ? ESCAPE '\\' \
             ORDER BY p.updated_at DESC, p.id",
            SELECT_PLACE
        );
        let rows = sqlx::query(&sql)
            .bind(&pattern)
            .bind(&pattern)
            .bind(&pattern)
            .fetch_all(&self.db)
            .await?;
        Ok(rows.iter().map(row_to_place).collect())
    }

    async fn save(&self, place: &mut Place) -> Result<()> {
        let now = Utc::now();
        let created_at = place.created_at.unwrap_or(now);
        place.updated_at = Some(now);

        let categories = serde_json::to_string(&place.categories)?;
        let data = serde_json::to_string(&ProviderData::from_place(place))?;
        let tags = serde_json::to_string(&place.user_tags)?;
        let custom_fields = serde_json::to_string(&place.custom_fields)?;

        let mut tx = self.db.begin().await?;

        let stored_created_at: String = sqlx::query_scalar(
            r#"
            INSERT INTO places (id, provider_id, name, address, lat, lng, categories, data,
                                created_at, updated_at, imported_at, source_hash)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                provider_id = excluded.provider_id,
                name = excluded.name,
                address = excluded.address,
                lat = excluded.lat,
                lng = excluded.lng,
                categories = excluded.categories,
                data = excluded.data,
                updated_at = excluded.updated_at,
                imported_at = excluded.imported_at,
                source_hash = excluded.source_hash
            RETURNING created_at
            "#,
        )
        .bind(&place.id)
        .bind(&place.provider_id)
        .bind(&place.name)
        .bind(&place.address)
        .bind(place.coordinates.lat)
        .bind(place.coordinates.lng)
        .bind(&categories)
        .bind(&data)
        .bind(format_timestamp(&created_at))
        .bind(format_timestamp(&now))
        .bind(place.imported_at.as_ref().map(format_timestamp))
        .bind(&place.source_hash)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO user_data (place_id, notes, tags, custom_fields)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(place_id) DO UPDATE SET
                notes = excluded.notes,
                tags = excluded.tags,
                custom_fields = excluded.custom_fields
            "#,
        )
        .bind(&place.id)
        .bind(&place.user_notes)
        .bind(&tags)
        .bind(&custom_fields)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        place.created_at = parse_timestamp(Some(stored_created_at)).or(Some(created_at));

        tracing::debug!(place_id = %place.id, name = %place.name, "Saved place");

        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        let mut tx = self.db.begin().await?;

        sqlx::query("DELETE FROM user_data WHERE place_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("DELETE FROM places WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        let removed = result.rows_affected() > 0;
        if removed {
            tracing::debug!(place_id = %id, "Deleted place");
        }
        Ok(removed)
    }

    async fn find_by_source_hash(&self, hash: &str) -> Result<Option<Place>> {
        if hash.is_empty() {
            return Ok(None);
        }
        let sql = format!("{} WHERE p.source_hash = ? ORDER BY p.updated_at DESC LIMIT 1", SELECT_PLACE);
        let row = sqlx::query(&sql).bind(hash).fetch_optional(&self.db).await?;
        Ok(row.as_ref().map(row_to_place))
    }

    async fn find_candidates(&self, place: &Place) -> Result<Vec<Place>> {
        let use_proximity = !place.coordinates.is_unset();
        let sql = format!(
            r#"{}
            WHERE (p.provider_id != '' AND p.provider_id = ?)
               OR (? = 1
                   AND NOT (p.lat = 0 AND p.lng = 0)
                   AND ABS(p.lat - ?) < ?
                   AND ABS(p.lng - ?) < ?)
            ORDER BY p.updated_at DESC, p.id
            "#,
            SELECT_PLACE
        );
        let rows = sqlx::query(&sql)
            .bind(&place.provider_id)
            .bind(use_proximity as i64)
            .bind(place.coordinates.lat)
            .bind(PROXIMITY_TOLERANCE_DEGREES)
            .bind(place.coordinates.lng)
            .bind(PROXIMITY_TOLERANCE_DEGREES)
            .fetch_all(&self.db)
            .await?;
        Ok(rows.iter().map(row_to_place).collect())
    }

    async fn count(&self) -> Result<usize> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM places")
            .fetch_one(&self.db)
            .await?;
        Ok(count.max(0) as usize)
    }
}
