//! Import batch results

use serde::{Deserialize, Serialize};

/// What happened to one record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportAction {
    /// No duplicate found, saved as a new place
    Added,
    /// Duplicate found and merged (force)
    Updated,
    /// Duplicate found, left untouched
    Skipped,
    /// Resolution or save failed; batch continued
    Failed,
}

impl ImportAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImportAction::Added => "added",
            ImportAction::Updated => "updated",
            ImportAction::Skipped => "skipped",
            ImportAction::Failed => "failed",
        }
    }
}

/// Per-record progress entry, in input order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordOutcome {
    /// 1-based position in the batch
    pub index: usize,

    pub place_id: String,

    pub name: String,

    pub action: ImportAction,

    /// Why a record was skipped or failed
    pub detail: Option<String>,
}

/// A record that could not be processed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportFailure {
    pub place_id: String,
    pub name: String,
    pub error_message: String,
}

/// Import completion result
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImportSummary {
    pub added: usize,
    pub updated: usize,
    pub skipped: usize,

    /// Failed records are counted in none of the three totals
    pub failures: Vec<ImportFailure>,

    pub outcomes: Vec<RecordOutcome>,

    /// Nothing was written
    pub dry_run: bool,
}

impl ImportSummary {
    pub fn new(dry_run: bool) -> Self {
        Self {
            dry_run,
            ..Default::default()
        }
    }

    /// `(added, updated, skipped)`
    pub fn counts(&self) -> (usize, usize, usize) {
        (self.added, self.updated, self.skipped)
    }

    pub fn total(&self) -> usize {
        self.outcomes.len()
    }

    pub(crate) fn record(&mut self, outcome: RecordOutcome) {
        match outcome.action {
            ImportAction::Added => self.added += 1,
            ImportAction::Updated => self.updated += 1,
            ImportAction::Skipped => self.skipped += 1,
            ImportAction::Failed => self.failures.push(ImportFailure {
                place_id: outcome.place_id.clone(),
                name: outcome.name.clone(),
                error_message: outcome.detail.clone().unwrap_or_default(),
            }),
        }
        self.outcomes.push(outcome);
    }
}
