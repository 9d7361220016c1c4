//! placeli-ingest library interface
//!
//! Source adapters, duplicate resolution, merge, import orchestration,
//! enrichment and collection editing. The `placeli` binary is a thin
//! command-line layer over these.

pub mod error;
pub mod models;
pub mod services;
pub mod sources;
pub mod types;

pub use crate::error::{EnrichmentError, SourceError, SourceResult};
pub use crate::types::{ImportSource, SourceFormat};

use placeli_common::config::TomlConfig;
use placeli_common::db::{init_database, PlaceStore, SqlitePlaceStore};
use placeli_common::SystemFieldRules;
use sources::SourceRegistry;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Everything an operation needs, built once at startup
#[derive(Clone)]
pub struct IngestContext {
    /// Place storage
    pub store: Arc<dyn PlaceStore>,
    /// Registered source adapters
    pub registry: Arc<SourceRegistry>,
    /// Which custom fields are provider-written
    pub rules: SystemFieldRules,
    /// Pause between enrichment provider calls
    pub enrichment_delay: Duration,
}

impl IngestContext {
    pub fn new(store: Arc<dyn PlaceStore>, registry: SourceRegistry, rules: SystemFieldRules) -> Self {
        Self {
            store,
            registry: Arc::new(registry),
            rules,
            enrichment_delay: Duration::from_millis(100),
        }
    }

    /// Open (or create) the database and apply configured import settings
    pub async fn open(db_path: &Path, config: &TomlConfig) -> placeli_common::Result<Self> {
        let pool = init_database(db_path).await?;
        let mut context = Self::new(
            Arc::new(SqlitePlaceStore::new(pool)),
            SourceRegistry::with_default_sources(),
            config.import.system_field_rules(),
        );
        context.enrichment_delay = config.import.enrichment_delay();
        Ok(context)
    }

    pub fn store(&self) -> &dyn PlaceStore {
        self.store.as_ref()
    }
}
