//! Merging an incoming record into a stored place
//!
//! Two deliberately separate paths:
//! - [`PlaceMerger::merge_import`]: a fresh import wins outright, except
//!   for identity, history and user data
//! - [`PlaceMerger::merge_enrichment`]: provider details only fill in or
//!   change values; an empty or zero value never blanks a stored one

use crate::models::ProviderDetails;
use chrono::{DateTime, SecondsFormat, Utc};
use placeli_common::{Place, SystemFieldRules};

/// What an enrichment pass may replace wholesale
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EnrichmentOptions {
    pub refresh_reviews: bool,
    pub refresh_photos: bool,
}

/// Place merger
#[derive(Debug, Clone, Default)]
pub struct PlaceMerger {
    rules: SystemFieldRules,
}

impl PlaceMerger {
    pub fn new(rules: SystemFieldRules) -> Self {
        Self { rules }
    }

    /// Merge a re-imported record into the stored one
    ///
    /// **Algorithm:**
    /// 1. Start from `incoming` (provider data and system fields)
    /// 2. Restore `id` and `created_at` from `existing`; `updated_at` = now
    /// 3. Restore `user_notes` and `user_tags` from `existing`
    /// 4. Copy every user (non-system) custom field of `existing` over
    /// 5. Stamp `last_import`
    pub fn merge_import(&self, existing: &Place, incoming: &Place) -> Place {
        let now = Utc::now();
        let mut merged = incoming.clone();

        self.carry_user_data(existing, &mut merged);
        merged.updated_at = Some(now);
        stamp(&mut merged, "last_import", now);
        merged
    }

    /// Copy identity, history and user data of `existing` onto `place`
    ///
    /// Used on its own when a record overwrites the stored row with the
    /// same id without a merge.
    pub fn carry_user_data(&self, existing: &Place, place: &mut Place) {
        place.id = existing.id.clone();
        place.created_at = existing.created_at;
        place.user_notes = existing.user_notes.clone();
        place.user_tags = existing.user_tags.clone();
        self.keep_user_fields(existing, place);
    }

    /// Apply provider details to a stored place
    ///
    /// Scalars change only when the provider reports a non-empty value that
    /// differs. Categories become the union (stored order first). Reviews
    /// and photos are replaced only when requested and non-empty.
    pub fn merge_enrichment(&self, existing: &Place, details: &ProviderDetails, options: &EnrichmentOptions) -> Place {
        let now = Utc::now();
        let mut merged = existing.clone();

        if details.rating > 0.0 && details.rating != merged.rating {
            merged.rating = details.rating;
        }
        if details.rating_count > 0 && details.rating_count != merged.rating_count {
            merged.rating_count = details.rating_count;
        }
        if details.price_level > 0 && details.price_level != merged.price_level {
            merged.price_level = details.price_level;
        }
        replace_if_reported(&mut merged.website, &details.website);
        replace_if_reported(&mut merged.phone, &details.phone);
        replace_if_reported(&mut merged.hours, &details.hours_text());

        merged.categories = union_categories(&existing.categories, &details.categories);

        if options.refresh_reviews && !details.reviews.is_empty() {
            merged.reviews = details.reviews.clone();
        }
        if options.refresh_photos && !details.photos.is_empty() {
            merged.photos = details.photos.clone();
        }

        merged.updated_at = Some(now);
        stamp(&mut merged, "last_sync", now);
        merged
    }

    fn keep_user_fields(&self, existing: &Place, merged: &mut Place) {
        for (name, value) in &existing.custom_fields {
            if self.rules.is_user(name) {
                merged.custom_fields.insert(name.clone(), value.clone());
            }
        }
    }
}

/// Existing categories in order, then new incoming ones in theirs
pub fn union_categories(existing: &[String], incoming: &[String]) -> Vec<String> {
    let mut merged: Vec<String> = Vec::with_capacity(existing.len() + incoming.len());
    for category in existing.iter().chain(incoming) {
        if !category.trim().is_empty() && !merged.contains(category) {
            merged.push(category.clone());
        }
    }
    merged
}

fn replace_if_reported(current: &mut String, reported: &str) {
    if !reported.is_empty() && reported != current.as_str() {
        *current = reported.to_string();
    }
}

fn stamp(place: &mut Place, marker: &str, now: DateTime<Utc>) {
    place.set_field(marker, now.to_rfc3339_opts(SecondsFormat::Secs, true));
}
