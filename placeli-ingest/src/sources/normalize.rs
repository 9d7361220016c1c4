//! Shared normalization steps for all adapters

use crate::error::{SourceError, SourceResult};
use chrono::{DateTime, SecondsFormat, Utc};
use once_cell::sync::Lazy;
use placeli_common::{Coordinates, Place};
use regex::Regex;
use std::collections::HashMap;
use std::path::Path;

static COORDINATE_QUERY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(-?\d+\.?\d*),(-?\d+\.?\d*)$").expect("coordinate query regex must compile")
});

/// Final step for every emitted record
///
/// **Algorithm:**
/// 1. Drop the entry if it has no name, no address and no coordinates
/// 2. Collapse repeated categories
/// 3. Derive `id` and `source_hash` from the identity fields
/// 4. Stamp `imported_from`, `import_date` and `imported_at`
pub(crate) fn finalize(mut place: Place, origin: &str, imported_at: DateTime<Utc>) -> Option<Place> {
    if place.lacks_identity() {
        tracing::debug!(origin, "Dropping entry without name, address or coordinates");
        return None;
    }

    place.dedup_categories();
    place.refresh_identity();
    place.set_field("imported_from", origin);
    place.set_field(
        "import_date",
        imported_at.to_rfc3339_opts(SecondsFormat::Secs, true),
    );
    place.imported_at = Some(imported_at);
    Some(place)
}

/// What a Google Maps `?q=` parameter tells us about a place
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum MapsUrlHint {
    Coordinates(Coordinates),
    Name(String),
}

/// Pull coordinates or a place name out of a Google Maps URL
///
/// `q=40.7,-74.0` yields coordinates; any other `q` is taken as a name,
/// cut at the first `&` left over after decoding.
pub(crate) fn parse_maps_url(raw: &str) -> Option<MapsUrlHint> {
    if raw.trim().is_empty() {
        return None;
    }
    let parsed = url::Url::parse(raw.trim()).ok()?;
    let q = parsed
        .query_pairs()
        .find(|(key, _)| key == "q")
        .map(|(_, value)| value.into_owned())?;
    if q.is_empty() {
        return None;
    }

    if let Some(caps) = COORDINATE_QUERY.captures(&q) {
        let lat = caps[1].parse::<f64>().ok()?;
        let lng = caps[2].parse::<f64>().ok()?;
        // A zero on either axis is a placeholder, not a location
        return (lat != 0.0 && lng != 0.0).then(|| MapsUrlHint::Coordinates(Coordinates::new(lat, lng)));
    }

    let name = match q.find('&') {
        Some(idx) if idx > 0 => q[..idx].to_string(),
        _ => q,
    };
    let name = name.trim().to_string();
    (!name.is_empty()).then_some(MapsUrlHint::Name(name))
}

/// `fast_food` → `Fast Food`
pub(crate) fn title_case(raw: &str) -> String {
    raw.replace('_', " ")
        .split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

pub(crate) fn read_path(path: &Path) -> SourceResult<Vec<u8>> {
    std::fs::read(path).map_err(|e| SourceError::io(path, e))
}

/// Header-driven CSV column lookup with alias names
///
/// Header names are matched case-insensitively after trimming.
pub(crate) struct CsvColumns {
    index: HashMap<String, usize>,
}

impl CsvColumns {
    pub(crate) fn new(headers: &csv::StringRecord) -> Self {
        let mut index = HashMap::new();
        for (i, h) in headers.iter().enumerate() {
            index
                .entry(h.trim().trim_start_matches('\u{feff}').to_ascii_lowercase())
                .or_insert(i);
        }
        Self { index }
    }

    pub(crate) fn has_any(&self, aliases: &[&str]) -> bool {
        aliases.iter().any(|a| self.index.contains_key(&a.to_ascii_lowercase()))
    }

    /// First non-empty value among the aliases
    pub(crate) fn text(&self, record: &csv::StringRecord, aliases: &[&str]) -> String {
        aliases
            .iter()
            .filter_map(|a| self.index.get(&a.to_ascii_lowercase()))
            .filter_map(|&i| record.get(i))
            .map(str::trim)
            .find(|v| !v.is_empty())
            .unwrap_or_default()
            .to_string()
    }

    /// First value among the aliases that parses as a float
    pub(crate) fn float(&self, record: &csv::StringRecord, aliases: &[&str]) -> Option<f64> {
        aliases
            .iter()
            .filter_map(|a| self.index.get(&a.to_ascii_lowercase()))
            .filter_map(|&i| record.get(i))
            .find_map(|v| v.trim().parse::<f64>().ok())
    }
}

pub(crate) fn csv_reader(data: &[u8]) -> csv::Reader<&[u8]> {
    csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(data)
}
