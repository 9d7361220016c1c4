//! Place details returned by an enrichment provider

use placeli_common::{Photo, Review};
use serde::{Deserialize, Serialize};

/// Provider-side view of one place
///
/// Zero and empty values mean "not reported" and never blank an existing
/// value when merged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProviderDetails {
    #[serde(default)]
    pub rating: f32,
    #[serde(default)]
    pub rating_count: u32,
    #[serde(default)]
    pub price_level: u8,
    #[serde(default)]
    pub website: String,
    #[serde(default)]
    pub phone: String,
    /// One line per weekday, e.g. `Monday: 9:00 AM – 5:00 PM`
    #[serde(default)]
    pub weekday_hours: Vec<String>,
    /// Provider place types, merged into categories
    #[serde(default, alias = "types")]
    pub categories: Vec<String>,
    #[serde(default)]
    pub photos: Vec<Photo>,
    #[serde(default)]
    pub reviews: Vec<Review>,
}

impl ProviderDetails {
    /// Weekday lines joined the way they are stored on a place
    pub fn hours_text(&self) -> String {
        self.weekday_hours
            .iter()
            .map(|line| line.trim())
            .filter(|line| !line.is_empty())
            .collect::<Vec<_>>()
            .join(", ")
    }
}
