//! Import orchestration
//!
//! Drives a batch of parsed places through duplicate resolution, merge and
//! save, strictly one record at a time in input order. A failing record
//! is reported in the summary and the batch moves on.

use super::dry_run_store::DryRunStore;
use super::duplicate_resolver::DuplicateResolver;
use super::place_merger::PlaceMerger;
use crate::models::{ImportAction, ImportSummary, RecordOutcome};
use placeli_common::db::PlaceStore;
use placeli_common::{Place, Result, SystemFieldRules};
use tracing::{debug, info, warn};

/// Duplicate handling strategy
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ImportMode {
    /// No duplicate checks; every record is saved (upserted by id,
    /// keeping the stored record's user data)
    Simple,
    /// Resolve duplicates, then skip or merge
    #[default]
    Smart,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportOptions {
    pub mode: ImportMode,
    /// Run resolution and merge but write nothing
    pub dry_run: bool,
    /// Merge into duplicates instead of skipping them
    pub force: bool,
}

/// Import orchestrator
pub struct ImportOrchestrator<'a> {
    store: &'a dyn PlaceStore,
    merger: PlaceMerger,
}

impl<'a> ImportOrchestrator<'a> {
    pub fn new(store: &'a dyn PlaceStore, rules: SystemFieldRules) -> Self {
        Self {
            store,
            merger: PlaceMerger::new(rules),
        }
    }

    /// Import a batch
    ///
    /// Dry runs go through a [`DryRunStore`] so that records "saved" earlier
    /// in the batch are seen by later duplicate checks, exactly as in a
    /// real run.
    pub async fn import(&self, places: Vec<Place>, options: &ImportOptions) -> ImportSummary {
        info!(
            records = places.len(),
            mode = ?options.mode,
            dry_run = options.dry_run,
            force = options.force,
            "Starting import"
        );

        let summary = if options.dry_run {
            let staging = DryRunStore::new(self.store);
            self.run(&staging, places, options).await
        } else {
            self.run(self.store, places, options).await
        };

        info!(
            added = summary.added,
            updated = summary.updated,
            skipped = summary.skipped,
            failed = summary.failures.len(),
            dry_run = summary.dry_run,
            "Import complete"
        );
        summary
    }

    async fn run(&self, store: &dyn PlaceStore, places: Vec<Place>, options: &ImportOptions) -> ImportSummary {
        let mut summary = ImportSummary::new(options.dry_run);

        for (i, place) in places.into_iter().enumerate() {
            let place_id = place.id.clone();
            let name = place.name.clone();

            let (action, detail) = match self.process(store, place, options).await {
                Ok(result) => result,
                Err(e) => {
                    warn!(place_id = %place_id, name = %name, error = %e, "Failed to import place");
                    (ImportAction::Failed, Some(e.to_string()))
                }
            };
            debug!(index = i + 1, place_id = %place_id, action = action.as_str(), "Processed place");

            summary.record(RecordOutcome {
                index: i + 1,
                place_id,
                name,
                action,
                detail,
            });
        }

        summary
    }

    async fn process(
        &self,
        store: &dyn PlaceStore,
        mut place: Place,
        options: &ImportOptions,
    ) -> Result<(ImportAction, Option<String>)> {
        if options.mode == ImportMode::Simple {
            if let Some(existing) = store.get_by_id(&place.id).await? {
                self.merger.carry_user_data(&existing, &mut place);
            }
            store.save(&mut place).await?;
            return Ok((ImportAction::Added, None));
        }

        let Some(found) = DuplicateResolver::new(store).find_existing(&place).await? else {
            store.save(&mut place).await?;
            return Ok((ImportAction::Added, None));
        };

        if !options.force {
            return Ok((
                ImportAction::Skipped,
                Some(format!("already exists as {} (matched by {})", found.place.id, found.reason.as_str())),
            ));
        }

        let mut merged = self.merger.merge_import(&found.place, &place);
        store.save(&mut merged).await?;
        Ok((ImportAction::Updated, Some(format!("merged into {}", merged.id))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use placeli_common::db::{create_schema, SqlitePlaceStore};
    use placeli_common::{Coordinates, Error};
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

    fn place(provider_id: &str, name: &str, lat: f64, lng: f64) -> Place {
        Place::new(provider_id, name, "", Coordinates::new(lat, lng))
    }

    fn smart(force: bool, dry_run: bool) -> ImportOptions {
        ImportOptions {
            mode: ImportMode::Smart,
            dry_run,
            force,
        }
    }

    #[tokio::test]
    async fn test_duplicates_within_batch() {
        let store = setup_store().await;
        let orchestrator = ImportOrchestrator::new(&store, SystemFieldRules::default());
        let batch = vec![place("a", "A", 1.0, 1.0), place("a", "A", 1.0, 1.0), place("b", "B", 2.0, 2.0)];

        let real = orchestrator.import(batch, &smart(false, false)).await;
        assert_eq!(real.counts(), (2, 0, 1));
        assert_eq!(real.outcomes[1].action, ImportAction::Skipped);
    }

    #[tokio::test]
    async fn test_dry_run_matches_real_run_counts() {
        let store = setup_store().await;
        let orchestrator = ImportOrchestrator::new(&store, SystemFieldRules::default());
        let batch = vec![place("a", "A", 1.0, 1.0), place("a", "A", 1.0, 1.0), place("b", "B", 2.0, 2.0)];

        let dry = orchestrator.import(batch.clone(), &smart(false, true)).await;
        assert!(dry.dry_run);
        assert_eq!(store.count().await.unwrap(), 0);

        let real = orchestrator.import(batch, &smart(false, false)).await;
        assert_eq!(dry.counts(), real.counts());
    }

    #[tokio::test]
    async fn test_simple_mode_saves_everything() {
        let store = setup_store().await;
        let orchestrator = ImportOrchestrator::new(&store, SystemFieldRules::default());
        let options = ImportOptions {
            mode: ImportMode::Simple,
            ..Default::default()
        };

        let first = orchestrator.import(vec![place("a", "A", 1.0, 1.0)], &options).await;
        let second = orchestrator.import(vec![place("a", "A", 1.0, 1.0)], &options).await;
        assert_eq!(first.counts(), (1, 0, 0));
        assert_eq!(second.counts(), (1, 0, 0));
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_simple_mode_keeps_user_data() {
        let store = setup_store().await;
        let orchestrator = ImportOrchestrator::new(&store, SystemFieldRules::default());
        let options = ImportOptions {
            mode: ImportMode::Simple,
            ..Default::default()
        };

        orchestrator.import(vec![place("takeout_x", "X", 1.0, 1.0)], &options).await;
        let mut stored = store.all().await.unwrap().remove(0);
        stored.user_notes = "Cash only".into();
        stored.add_tag("favorites");
        stored.set_field("visited_with", "Sam");
        store.save(&mut stored).await.unwrap();

        let summary = orchestrator.import(vec![place("takeout_x", "X Renamed", 1.0, 1.0)], &options).await;
        assert_eq!(summary.counts(), (1, 0, 0));

        let reloaded = store.get_by_id(&stored.id).await.unwrap().unwrap();
        assert_eq!(reloaded.name, "X Renamed");
        assert_eq!(reloaded.user_notes, "Cash only");
        assert_eq!(reloaded.user_tags, vec!["favorites"]);
        assert_eq!(reloaded.field("visited_with").and_then(|v| v.as_text()), Some("Sam"));
        assert_eq!(reloaded.created_at, stored.created_at);
    }

    /// Store whose writes fail for one provider id
    struct FailingStore {
        inner: SqlitePlaceStore,
        poison: String,
    }

    #[async_trait]
    impl PlaceStore for FailingStore {
        async fn get_by_id(&self, id: &str) -> Result<Option<Place>> {
            self.inner.get_by_id(id).await
        }
        async fn list(&self, limit: usize, offset: usize) -> Result<Vec<Place>> {
            self.inner.list(limit, offset).await
        }
        async fn all(&self) -> Result<Vec<Place>> {
            self.inner.all().await
        }
        async fn search(&self, query: &str) -> Result<Vec<Place>> {
            self.inner.search(query).await
        }
        async fn save(&self, place: &mut Place) -> Result<()> {
            if place.provider_id == self.poison {
                return Err(Error::Internal("disk full".into()));
            }
            self.inner.save(place).await
        }
        async fn delete(&self, id: &str) -> Result<bool> {
            self.inner.delete(id).await
        }
        async fn find_by_source_hash(&self, hash: &str) -> Result<Option<Place>> {
            self.inner.find_by_source_hash(hash).await
        }
        async fn find_candidates(&self, place: &Place) -> Result<Vec<Place>> {
            self.inner.find_candidates(place).await
        }
        async fn count(&self) -> Result<usize> {
            self.inner.count().await
        }
    }

    #[tokio::test]
    async fn test_failed_record_does_not_abort_batch() {
        let store = FailingStore {
            inner: setup_store().await,
            poison: "bad".into(),
        };
        let orchestrator = ImportOrchestrator::new(&store, SystemFieldRules::default());
        let batch = vec![place("a", "A", 1.0, 1.0), place("bad", "Bad", 2.0, 2.0), place("c", "C", 3.0, 3.0)];

        let summary = orchestrator.import(batch, &smart(false, false)).await;
        assert_eq!(summary.counts(), (2, 0, 0));
        assert_eq!(summary.failures.len(), 1);
        assert_eq!(summary.failures[0].name, "Bad");
        assert_eq!(summary.outcomes[2].action, ImportAction::Added);
        assert_eq!(store.count().await.unwrap(), 2);
    }
}
