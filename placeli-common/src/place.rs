//! Canonical place record
//!
//! Every importer normalizes into [`Place`]; storage, duplicate resolution
//! and merging only ever see this shape.

use crate::fields::FieldValue;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Maximum per-axis distance (degrees) for two places to be proximity duplicates
pub const PROXIMITY_TOLERANCE_DEGREES: f64 = 0.0001;

/// Latitude/longitude pair; `(0, 0)` means "no coordinates"
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinates {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// True for the `(0, 0)` sentinel
    pub fn is_unset(&self) -> bool {
        self.lat == 0.0 && self.lng == 0.0
    }

    /// Both axes within `tolerance` degrees, and neither side is the sentinel
    pub fn is_near(&self, other: &Coordinates, tolerance: f64) -> bool {
        if self.is_unset() || other.is_unset() {
            return false;
        }
        (self.lat - other.lat).abs() < tolerance && (self.lng - other.lng).abs() < tolerance
    }

    /// Squared planar distance in degrees, only used for ordering candidates
    pub fn distance_sq(&self, other: &Coordinates) -> f64 {
        let dlat = self.lat - other.lat;
        let dlng = self.lng - other.lng;
        dlat * dlat + dlng * dlng
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Photo {
    #[serde(default)]
    pub reference: String,
    #[serde(default)]
    pub local_path: String,
    #[serde(default)]
    pub width: u32,
    #[serde(default)]
    pub height: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Review {
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub rating: u8,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub avatar_url: String,
}

/// A saved place
///
/// Provider data (`categories` through `website`) is refreshed by imports
/// and enrichment. `user_notes`, `user_tags` and non-system
/// `custom_fields` are only ever changed by explicit user edits.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Place {
    pub id: String,
    #[serde(default)]
    pub provider_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub coordinates: Coordinates,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub photos: Vec<Photo>,
    #[serde(default)]
    pub reviews: Vec<Review>,
    #[serde(default)]
    pub rating: f32,
    #[serde(default)]
    pub rating_count: u32,
    #[serde(default)]
    pub price_level: u8,
    #[serde(default)]
    pub hours: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub website: String,
    #[serde(default)]
    pub user_notes: String,
    #[serde(default)]
    pub user_tags: Vec<String>,
    #[serde(default)]
    pub custom_fields: BTreeMap<String, FieldValue>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub imported_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub source_hash: String,
}

impl Place {
    /// New record with identity fields set and `id`/`source_hash` derived
    pub fn new(
        provider_id: impl Into<String>,
        name: impl Into<String>,
        address: impl Into<String>,
        coordinates: Coordinates,
    ) -> Self {
        let mut place = Place {
            provider_id: provider_id.into(),
            name: name.into(),
            address: address.into(),
            coordinates,
            ..Default::default()
        };
        place.refresh_identity();
        place
    }

    /// Recompute `id` and `source_hash` from the identity-bearing fields
    pub fn refresh_identity(&mut self) {
        self.id = crate::identity::generate_id(&self.provider_id);
        self.source_hash = crate::identity::source_hash(
            &self.name,
            &self.address,
            &self.coordinates,
            &self.provider_id,
        );
    }

    /// Empty name, empty address and no coordinates
    pub fn lacks_identity(&self) -> bool {
        self.name.trim().is_empty() && self.address.trim().is_empty() && self.coordinates.is_unset()
    }

    /// Same non-empty provider id, or proximity match on real coordinates
    pub fn is_duplicate_candidate_of(&self, other: &Place) -> bool {
        let same_provider = !self.provider_id.is_empty() && self.provider_id == other.provider_id;
        same_provider
            || self
                .coordinates
                .is_near(&other.coordinates, PROXIMITY_TOLERANCE_DEGREES)
    }

    /// Append a category unless an identical one is already present
    pub fn add_category(&mut self, category: impl Into<String>) -> bool {
        let category = category.into();
        if category.trim().is_empty() || self.categories.contains(&category) {
            return false;
        }
        self.categories.push(category);
        true
    }

    /// Drop repeated categories, keeping the first occurrence
    pub fn dedup_categories(&mut self) {
        let mut seen = Vec::with_capacity(self.categories.len());
        for c in self.categories.drain(..) {
            if !seen.contains(&c) {
                seen.push(c);
            }
        }
        self.categories = seen;
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.user_tags.iter().any(|t| t == tag)
    }

    /// Returns false when the tag is empty or already present
    pub fn add_tag(&mut self, tag: impl Into<String>) -> bool {
        let tag = tag.into();
        if tag.trim().is_empty() || self.has_tag(&tag) {
            return false;
        }
        self.user_tags.push(tag);
        true
    }

    pub fn remove_tag(&mut self, tag: &str) -> bool {
        let before = self.user_tags.len();
        self.user_tags.retain(|t| t != tag);
        self.user_tags.len() != before
    }

    /// Rename in place; if `to` is already present the old tag is just removed
    pub fn rename_tag(&mut self, from: &str, to: &str) -> bool {
        let Some(pos) = self.user_tags.iter().position(|t| t == from) else {
            return false;
        };
        if self.has_tag(to) {
            self.user_tags.remove(pos);
        } else {
            self.user_tags[pos] = to.to_string();
        }
        true
    }

    pub fn set_field(&mut self, name: impl Into<String>, value: impl Into<FieldValue>) {
        self.custom_fields.insert(name.into(), value.into());
    }

    pub fn field(&self, name: &str) -> Option<&FieldValue> {
        self.custom_fields.get(name)
    }

    pub fn remove_field(&mut self, name: &str) -> Option<FieldValue> {
        self.custom_fields.remove(name)
    }
}
