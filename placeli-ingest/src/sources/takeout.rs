//! Google Takeout adapter
//!
//! Reads the three shapes Takeout has produced over time:
//! - "Maps (your places)" GeoJSON feature collections (nested `location`
//!   object or legacy flat properties)
//! - "Saved" lists JSON, either `{lists: [...]}` or a single list
//! - "Saved" lists CSV
//!
//! plus whole exports as a ZIP archive or an extracted directory.

use super::normalize::{self, csv_reader, parse_maps_url, CsvColumns, MapsUrlHint};
use crate::error::{SourceError, SourceResult};
use crate::types::{ImportSource, SourceFormat};
use chrono::{DateTime, Utc};
use placeli_common::identity::synthesize_provider_id;
use placeli_common::{Coordinates, FieldValue, Place};
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::io::{Read, Seek};
use std::path::Path;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

const ORIGIN_FEATURES: &str = "takeout";
const ORIGIN_SAVED_LIST: &str = "takeout_saved";
const ORIGIN_SAVED_CSV: &str = "takeout_saved_csv";

/// `null` reads as the type's default
pub(crate) fn null_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Default, Deserialize)]
struct TakeoutFeature {
    #[serde(default, deserialize_with = "null_default")]
    geometry: TakeoutGeometry,
    #[serde(default, deserialize_with = "null_default")]
    properties: TakeoutProperties,
}

#[derive(Debug, Default, Deserialize)]
struct TakeoutGeometry {
    #[serde(default, deserialize_with = "null_default")]
    coordinates: Vec<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct TakeoutLocation {
    #[serde(default, alias = "Business Name", deserialize_with = "null_default")]
    name: String,
    #[serde(default, alias = "Address", deserialize_with = "null_default")]
    address: String,
    #[serde(default, alias = "Country Code", deserialize_with = "null_default")]
    country_code: String,
}

#[derive(Debug, Default, Deserialize)]
struct TakeoutProperties {
    #[serde(default, deserialize_with = "null_default")]
    date: String,
    #[serde(default, alias = "Google Maps URL", deserialize_with = "null_default")]
    google_maps_url: String,
    #[serde(default, alias = "Location")]
    location: Option<TakeoutLocation>,
    #[serde(default, rename = "Comment", deserialize_with = "null_default")]
    comment: String,
    // Legacy flat fields
    #[serde(default, alias = "Title", deserialize_with = "null_default")]
    name: String,
    #[serde(default, deserialize_with = "null_default")]
    address: String,
    #[serde(default, deserialize_with = "null_default")]
    categories: Vec<String>,
    #[serde(default, deserialize_with = "null_default")]
    rating: f32,
    #[serde(default, deserialize_with = "null_default")]
    review_count: u32,
    #[serde(default, deserialize_with = "null_default")]
    price_level: u8,
    #[serde(default, deserialize_with = "null_default")]
    phone: String,
    #[serde(default, deserialize_with = "null_default")]
    website: String,
    #[serde(default)]
    hours: Option<Value>,
    #[serde(default, deserialize_with = "null_default")]
    description: String,
    #[serde(default, deserialize_with = "null_default")]
    place_id: String,
}

#[derive(Debug, Default, Deserialize)]
struct SavedList {
    #[serde(default, deserialize_with = "null_default")]
    name: String,
    #[serde(default, deserialize_with = "null_default")]
    places: Vec<Value>,
}

#[derive(Debug, Default, Deserialize)]
struct SavedCoordinates {
    #[serde(default, deserialize_with = "null_default")]
    latitude: f64,
    #[serde(default, deserialize_with = "null_default")]
    longitude: f64,
}

#[derive(Debug, Default, Deserialize)]
struct SavedPlace {
    #[serde(default, deserialize_with = "null_default")]
    name: String,
    #[serde(default, deserialize_with = "null_default")]
    address: String,
    #[serde(default, deserialize_with = "null_default")]
    place_id: String,
    #[serde(default, deserialize_with = "null_default")]
    google_maps_url: String,
    #[serde(default, deserialize_with = "null_default")]
    coordinates: SavedCoordinates,
    #[serde(default, deserialize_with = "null_default")]
    categories: Vec<String>,
    #[serde(default, deserialize_with = "null_default")]
    note: String,
    #[serde(default, deserialize_with = "null_default")]
    added_at: String,
}

/// Google Takeout importer
#[derive(Debug, Default)]
pub struct TakeoutSource;

impl TakeoutSource {
    pub fn new() -> Self {
        Self
    }

    /// Dispatch on the top-level JSON shape
    fn import_json(&self, data: &[u8], now: DateTime<Utc>) -> SourceResult<Vec<Place>> {
        let root: Value = serde_json::from_slice(data)?;

        if let Some(features) = root.get("features").and_then(Value::as_array) {
            return Ok(features
                .iter()
                .enumerate()
                .filter_map(|(i, raw)| match TakeoutFeature::deserialize(raw) {
                    Ok(feature) => convert_feature(feature, now),
                    Err(e) => {
                        warn!(entry = i, error = %e, "Skipping malformed Takeout feature");
                        None
                    }
                })
                .collect());
        }

        if let Some(lists) = root.get("lists").and_then(Value::as_array) {
            let mut places = Vec::new();
            for (i, raw) in lists.iter().enumerate() {
                match SavedList::deserialize(raw) {
                    Ok(list) => places.extend(convert_saved_list(&list, now)),
                    Err(e) => warn!(entry = i, error = %e, "Skipping malformed saved list"),
                }
            }
            return Ok(places);
        }

        if root.get("places").map(Value::is_array).unwrap_or(false) {
            let list = SavedList::deserialize(&root)?;
            return Ok(convert_saved_list(&list, now));
        }

        Err(SourceError::Unrecognized("Google Takeout JSON format".to_string()))
    }

    fn import_csv(&self, data: &[u8], now: DateTime<Utc>) -> SourceResult<Vec<Place>> {
        let mut reader = csv_reader(data);
        let columns = CsvColumns::new(reader.headers()?);

        let mut places = Vec::new();
        for (row, record) in reader.records().enumerate() {
            match record {
                Ok(record) => {
                    if let Some(place) = convert_csv_row(&columns, &record, now) {
                        places.push(place);
                    }
                }
                Err(e) => warn!(row = row + 1, error = %e, "Skipping unreadable CSV row"),
            }
        }
        Ok(places)
    }

    /// `.json` entries whose name mentions Maps or Saved; bad entries are skipped
    fn import_archive<R: Read + Seek>(&self, reader: R, now: DateTime<Utc>) -> SourceResult<Vec<Place>> {
        let mut archive = zip::ZipArchive::new(reader)?;
        let mut places = Vec::new();

        for i in 0..archive.len() {
            let mut entry = match archive.by_index(i) {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(entry = i, error = %e, "Skipping unreadable archive entry");
                    continue;
                }
            };
            let name = entry.name().to_string();
            if !name.to_ascii_lowercase().ends_with(".json") {
                continue;
            }
            if !(name.contains("Maps") || name.contains("Saved")) {
                continue;
            }

            let mut buf = Vec::new();
            if let Err(e) = entry.read_to_end(&mut buf) {
                warn!(entry = %name, error = %e, "Skipping unreadable archive entry");
                continue;
            }
            match self.import_json(&buf, now) {
                Ok(found) => {
                    debug!(entry = %name, count = found.len(), "Parsed archive entry");
                    places.extend(found);
                }
                Err(e) => warn!(entry = %name, error = %e, "Skipping archive entry"),
            }
        }

        Ok(places)
    }

    /// Extracted export: every `.json`/`.csv` under a path mentioning "Saved"
    fn import_directory(&self, root: &Path, now: DateTime<Utc>) -> SourceResult<Vec<Place>> {
        let mut places = Vec::new();

        for entry in WalkDir::new(root).follow_links(false) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(error = %e, "Skipping unreadable directory entry");
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            if !path.to_string_lossy().contains("Saved") {
                continue;
            }
            let parsed = match SourceFormat::from_path(path) {
                Some(SourceFormat::Json) => normalize::read_path(path).and_then(|d| self.import_json(&d, now)),
                Some(SourceFormat::Csv) => normalize::read_path(path).and_then(|d| self.import_csv(&d, now)),
                _ => continue,
            };
            match parsed {
                Ok(found) => {
                    debug!(path = %path.display(), count = found.len(), "Parsed Takeout file");
                    places.extend(found);
                }
                Err(e) => warn!(path = %path.display(), error = %e, "Could not parse Takeout file"),
            }
        }

        Ok(places)
    }
}

impl ImportSource for TakeoutSource {
    fn tag(&self) -> &'static str {
        "takeout"
    }

    fn name(&self) -> &'static str {
        "Google Takeout"
    }

    fn supported_formats(&self) -> &'static [SourceFormat] {
        &[SourceFormat::Zip, SourceFormat::Json, SourceFormat::Csv, SourceFormat::Directory]
    }

    fn import_from_data(&self, data: &[u8], format: SourceFormat) -> SourceResult<Vec<Place>> {
        let now = Utc::now();
        match format {
            SourceFormat::Json => self.import_json(data, now),
            SourceFormat::Csv => self.import_csv(data, now),
            SourceFormat::Zip => self.import_archive(std::io::Cursor::new(data), now),
            other => Err(SourceError::UnsupportedFormat {
                adapter: self.name(),
                format: other,
            }),
        }
    }

    fn import_from_file(&self, path: &Path) -> SourceResult<Vec<Place>> {
        let now = Utc::now();
        let places = match SourceFormat::from_path(path) {
            Some(SourceFormat::Directory) => self.import_directory(path, now)?,
            Some(SourceFormat::Zip) => {
                let file = std::fs::File::open(path).map_err(|e| SourceError::io(path, e))?;
                self.import_archive(std::io::BufReader::new(file), now)?
            }
            Some(format) if self.supports(format) => {
                let data = normalize::read_path(path)?;
                self.import_from_data(&data, format)?
            }
            Some(format) => {
                return Err(SourceError::UnsupportedFormat {
                    adapter: self.name(),
                    format,
                })
            }
            None => return Err(SourceError::Unrecognized(format!("file type: {}", path.display()))),
        };
        info!(path = %path.display(), count = places.len(), "Read Google Takeout export");
        Ok(places)
    }
}

fn convert_feature(feature: TakeoutFeature, now: DateTime<Utc>) -> Option<Place> {
    let props = feature.properties;

    // GeoJSON order is [lng, lat]
    let mut coordinates = match feature.geometry.coordinates.as_slice() {
        [lng, lat, ..] => Coordinates::new(*lat, *lng),
        _ => Coordinates::default(),
    };

    let (mut name, address) = match &props.location {
        Some(location) => (location.name.clone(), location.address.clone()),
        None => (props.name.clone(), props.address.clone()),
    };

    if name.is_empty() && address.is_empty() {
        match parse_maps_url(&props.google_maps_url) {
            Some(MapsUrlHint::Coordinates(c)) => {
                coordinates = c;
                name = format!("Saved Place ({:.6}, {:.6})", c.lat, c.lng);
            }
            Some(MapsUrlHint::Name(n)) => name = n,
            None => {}
        }
    }

    let provider_id = if props.place_id.is_empty() {
        synthesize_provider_id("takeout_", &[&name, &address])
    } else {
        props.place_id.clone()
    };

    let mut place = Place::new(provider_id, name, address, coordinates);
    place.categories = props.categories;
    place.rating = props.rating;
    place.rating_count = props.review_count;
    place.price_level = props.price_level;
    place.phone = props.phone;
    place.website = props.website;
    place.hours = match props.hours {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s,
        Some(other) => other.to_string(),
    };
    place.user_notes = if props.description.is_empty() {
        props.comment
    } else {
        props.description
    };

    if !props.google_maps_url.is_empty() {
        place.set_field("google_maps_url", props.google_maps_url);
    }
    if let Some(location) = &props.location {
        if !location.country_code.is_empty() {
            place.set_field("country_code", location.country_code.clone());
        }
    }
    if !props.date.is_empty() {
        place.set_field("saved_date", props.date);
    }

    normalize::finalize(place, ORIGIN_FEATURES, now)
}

fn convert_saved_list(list: &SavedList, now: DateTime<Utc>) -> Vec<Place> {
    list.places
        .iter()
        .enumerate()
        .filter_map(|(i, raw)| match SavedPlace::deserialize(raw) {
            Ok(saved) => convert_saved_place(saved, &list.name, now),
            Err(e) => {
                warn!(list = %list.name, entry = i, error = %e, "Skipping malformed saved place");
                None
            }
        })
        .collect()
}

fn convert_saved_place(saved: SavedPlace, list_name: &str, now: DateTime<Utc>) -> Option<Place> {
    let provider_id = if saved.place_id.is_empty() {
        synthesize_provider_id("saved_", &[&saved.name, &saved.address])
    } else {
        saved.place_id
    };
    let coordinates = Coordinates::new(saved.coordinates.latitude, saved.coordinates.longitude);

    let mut place = Place::new(provider_id, saved.name, saved.address, coordinates);
    place.categories = saved.categories;
    place.user_notes = saved.note;
    if !list_name.is_empty() {
        place.add_tag(list_name);
        place.set_field("original_list", list_name);
    }
    if !saved.google_maps_url.is_empty() {
        place.set_field("google_maps_url", saved.google_maps_url);
    }
    if !saved.added_at.is_empty() {
        place.set_field("added_at", saved.added_at);
    }

    normalize::finalize(place, ORIGIN_SAVED_LIST, now)
}

fn convert_csv_row(columns: &CsvColumns, record: &csv::StringRecord, now: DateTime<Utc>) -> Option<Place> {
    let mut name = columns.text(record, &["Title", "Name", "Place Name"]);
    let address = columns.text(record, &["Address", "Location"]);
    let url = columns.text(record, &["URL", "Link", "Google Maps URL"]);
    let note = columns.text(record, &["Comment", "Note", "Description"]);
    let list_name = columns.text(record, &["List", "Collection", "Folder"]);

    if name.is_empty() && address.is_empty() && url.is_empty() {
        return None;
    }

    let mut coordinates = Coordinates::new(
        columns.float(record, &["Latitude", "Lat"]).unwrap_or_default(),
        columns.float(record, &["Longitude", "Lng", "Long"]).unwrap_or_default(),
    );

    if coordinates.is_unset() {
        match parse_maps_url(&url) {
            Some(MapsUrlHint::Coordinates(c)) => coordinates = c,
            Some(MapsUrlHint::Name(n)) if name.is_empty() => name = n,
            _ => {}
        }
    }

    let provider_id = synthesize_provider_id("saved_", &[&name, &address, &url]);
    let mut place = Place::new(provider_id, name, address, coordinates);
    place.user_notes = note;
    if !url.is_empty() {
        place.set_field("google_maps_url", url);
    }
    if !list_name.is_empty() {
        place.add_tag(list_name.clone());
        place.custom_fields.insert("original_list".into(), FieldValue::Text(list_name));
    }

    normalize::finalize(place, ORIGIN_SAVED_CSV, now)
}
