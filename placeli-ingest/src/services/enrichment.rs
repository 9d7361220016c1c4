//! Enrichment driver
//!
//! Looks up stored places with a details provider one at a time, pacing
//! the calls, and applies results through the enrichment merge path.

use super::place_merger::{EnrichmentOptions, PlaceMerger};
use crate::error::EnrichmentError;
use crate::models::ProviderDetails;
use async_trait::async_trait;
use placeli_common::db::PlaceStore;
use placeli_common::{Place, SystemFieldRules};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

/// Source of provider details for a provider id
#[async_trait]
pub trait PlaceDetailsProvider: Send + Sync {
    async fn fetch_details(&self, provider_id: &str) -> Result<ProviderDetails, EnrichmentError>;
}

/// Details read from a JSON file of `provider_id -> details`
///
/// Lets saved provider responses be applied without network access.
#[derive(Debug, Default)]
pub struct FileDetailsProvider {
    details: HashMap<String, ProviderDetails>,
}

impl FileDetailsProvider {
    pub fn new(details: HashMap<String, ProviderDetails>) -> Self {
        Self { details }
    }

    pub fn load(path: &Path) -> Result<Self, EnrichmentError> {
        let data = std::fs::read(path)
            .map_err(|e| EnrichmentError::Provider(format!("Cannot read {}: {}", path.display(), e)))?;
        let details = serde_json::from_slice(&data)
            .map_err(|e| EnrichmentError::Provider(format!("Invalid details file {}: {}", path.display(), e)))?;
        Ok(Self { details })
    }
}

#[async_trait]
impl PlaceDetailsProvider for FileDetailsProvider {
    async fn fetch_details(&self, provider_id: &str) -> Result<ProviderDetails, EnrichmentError> {
        if provider_id.is_empty() {
            return Err(EnrichmentError::MissingProviderId);
        }
        self.details
            .get(provider_id)
            .cloned()
            .ok_or_else(|| EnrichmentError::Provider(format!("no details for {}", provider_id)))
    }
}

/// Enrich-all result
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EnrichmentSummary {
    pub enriched: usize,
    /// No provider id
    pub skipped: usize,
    pub failed: usize,
}

/// Enrichment service
pub struct EnrichmentService<'a> {
    store: &'a dyn PlaceStore,
    provider: &'a dyn PlaceDetailsProvider,
    merger: PlaceMerger,
    delay: Duration,
}

impl<'a> EnrichmentService<'a> {
    pub fn new(store: &'a dyn PlaceStore, provider: &'a dyn PlaceDetailsProvider, rules: SystemFieldRules) -> Self {
        Self {
            store,
            provider,
            merger: PlaceMerger::new(rules),
            delay: Duration::from_millis(100),
        }
    }

    /// Pause between consecutive provider calls
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Fetch, merge and save one place; returns the saved place
    pub async fn enrich_place(&self, place: &Place, options: &EnrichmentOptions) -> Result<Place, EnrichmentError> {
        if place.provider_id.is_empty() {
            return Err(EnrichmentError::MissingProviderId);
        }

        let details = self.provider.fetch_details(&place.provider_id).await?;
        let mut merged = self.merger.merge_enrichment(place, &details, options);
        self.store.save(&mut merged).await?;

        info!(place_id = %merged.id, name = %merged.name, "Enriched place");
        Ok(merged)
    }

    /// Enrich every stored place, sequentially
    ///
    /// Places without a provider id are skipped; a failing place is counted
    /// and the run continues.
    pub async fn enrich_all(&self, options: &EnrichmentOptions) -> Result<EnrichmentSummary, EnrichmentError> {
        let places = self.store.all().await?;
        let mut summary = EnrichmentSummary::default();
        let mut called = false;

        for place in &places {
            if place.provider_id.is_empty() {
                summary.skipped += 1;
                continue;
            }

            if called && !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            called = true;

            match self.enrich_place(place, options).await {
                Ok(_) => summary.enriched += 1,
                Err(e) => {
                    warn!(place_id = %place.id, name = %place.name, error = %e, "Failed to enrich place");
                    summary.failed += 1;
                }
            }
        }

        info!(
            enriched = summary.enriched,
            skipped = summary.skipped,
            failed = summary.failed,
            "Enrichment complete"
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use placeli_common::db::{create_schema, SqlitePlaceStore};
    use placeli_common::Coordinates;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn setup_store() -> SqlitePlaceStore {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        create_schema(&pool).await.unwrap();
        SqlitePlaceStore::new(pool)
    }

    fn provider() -> FileDetailsProvider {
        let mut details = HashMap::new();
        details.insert(
            "p1".to_string(),
            ProviderDetails {
                rating: 4.8,
                website: "https://cafe.example".into(),
                categories: vec!["cafe".into()],
                ..Default::default()
            },
        );
        FileDetailsProvider::new(details)
    }

    #[tokio::test]
    async fn test_enrich_place_merges_and_saves() {
        let store = setup_store().await;
        let mut place = Place::new("p1", "Cafe", "", Coordinates::new(1.0, 1.0));
        place.user_notes = "quiet".into();
        place.categories = vec!["Coffee".into()];
        store.save(&mut place).await.unwrap();

        let provider = provider();
        let service = EnrichmentService::new(&store, &provider, SystemFieldRules::default());
        let enriched = service.enrich_place(&place, &EnrichmentOptions::default()).await.unwrap();

        assert_eq!(enriched.rating, 4.8);
        assert_eq!(enriched.categories, vec!["Coffee", "cafe"]);
        let stored = store.get_by_id(&place.id).await.unwrap().unwrap();
        assert_eq!(stored.website, "https://cafe.example");
        assert_eq!(stored.user_notes, "quiet");
        assert!(stored.field("last_sync").is_some());
    }

    #[tokio::test]
    async fn test_enrich_place_without_provider_id() {
        let store = setup_store().await;
        let provider = provider();
        let service = EnrichmentService::new(&store, &provider, SystemFieldRules::default());

        let mut place = Place::default();
        place.name = "Anonymous".into();
        let err = service.enrich_place(&place, &EnrichmentOptions::default()).await.unwrap_err();
        assert!(matches!(err, EnrichmentError::MissingProviderId));
        assert_eq!(err.to_string(), "no provider id");
    }

    #[tokio::test]
    async fn test_enrich_all_counts() {
        let store = setup_store().await;
        for (provider_id, name) in [("p1", "Known"), ("p2", "Unknown"), ("", "No Id")] {
            let mut place = Place::default();
            place.provider_id = provider_id.into();
            place.name = name.into();
            place.coordinates = Coordinates::new(1.0, name.len() as f64);
            place.refresh_identity();
            if provider_id.is_empty() {
                place.id = "noid00000000".into();
            }
            store.save(&mut place).await.unwrap();
        }

        let provider = provider();
        let service =
            EnrichmentService::new(&store, &provider, SystemFieldRules::default()).with_delay(Duration::ZERO);
        let summary = service.enrich_all(&EnrichmentOptions::default()).await.unwrap();

        assert_eq!(
            summary,
            EnrichmentSummary {
                enriched: 1,
                skipped: 1,
                failed: 1
            }
        );
    }
}
