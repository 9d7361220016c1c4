//! Import, merge, enrichment and editing services

pub mod collection_editor;
pub mod dry_run_store;
pub mod duplicate_resolver;
pub mod enrichment;
pub mod import_orchestrator;
pub mod place_merger;

pub use collection_editor::{template_fields, CollectionEditor, TEMPLATE_NAMES};
pub use dry_run_store::DryRunStore;
pub use duplicate_resolver::{DuplicateMatch, DuplicateResolver, MatchReason};
pub use enrichment::{EnrichmentService, EnrichmentSummary, FileDetailsProvider, PlaceDetailsProvider};
pub use import_orchestrator::{ImportMode, ImportOptions, ImportOrchestrator};
pub use place_merger::{union_categories, EnrichmentOptions, PlaceMerger};
