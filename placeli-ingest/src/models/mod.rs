//! Data models for placeli-ingest

pub mod import_result;
pub mod provider_details;

pub use import_result::{ImportAction, ImportFailure, ImportSummary, RecordOutcome};
pub use provider_details::ProviderDetails;
