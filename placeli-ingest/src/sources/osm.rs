//! OpenStreetMap adapter
//!
//! Reads Overpass-style JSON (`{"elements": [...]}`) and simple
//! `name,lat,lon[,type][,description]` CSV exports of points of interest.

use super::normalize::{self, csv_reader, title_case, CsvColumns};
use super::takeout::null_default;
use crate::error::{SourceError, SourceResult};
use crate::types::{ImportSource, SourceFormat};
use chrono::{DateTime, Utc};
use placeli_common::identity::synthesize_provider_id;
use placeli_common::{Coordinates, FieldValue, Place};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::warn;

const ORIGIN: &str = "openstreetmap";

/// Tags mapped to display categories, in priority order
const CATEGORY_TAGS: &[&str] = &["amenity", "shop", "tourism", "leisure", "craft", "office"];

/// Address parts, in display order
const ADDRESS_TAGS: &[&str] = &[
    "addr:housenumber",
    "addr:street",
    "addr:city",
    "addr:postcode",
    "addr:country",
];

#[derive(Debug, Default, Deserialize)]
struct OsmCenter {
    #[serde(default)]
    lat: f64,
    #[serde(default)]
    lon: f64,
}

#[derive(Debug, Default, Deserialize)]
struct OsmElement {
    #[serde(default, rename = "type", deserialize_with = "null_default")]
    kind: String,
    #[serde(default)]
    id: Option<i64>,
    #[serde(default)]
    lat: Option<f64>,
    #[serde(default)]
    lon: Option<f64>,
    #[serde(default)]
    center: Option<OsmCenter>,
    #[serde(default, deserialize_with = "null_default")]
    tags: BTreeMap<String, String>,
}

impl OsmElement {
    /// Nodes carry lat/lon; ways and relations only a `center`
    fn coordinates(&self) -> Coordinates {
        match (self.lat, self.lon, &self.center) {
            (Some(lat), Some(lon), _) => Coordinates::new(lat, lon),
            (_, _, Some(center)) => Coordinates::new(center.lat, center.lon),
            _ => Coordinates::default(),
        }
    }

    fn provider_id(&self) -> Option<String> {
        let id = self.id?;
        Some(match self.kind.as_str() {
            "" | "node" => format!("osm_{}", id),
            kind => format!("osm_{}_{}", kind, id),
        })
    }
}

/// OpenStreetMap importer
#[derive(Debug, Default)]
pub struct OsmSource;

impl OsmSource {
    pub fn new() -> Self {
        Self
    }

    fn import_json(&self, data: &[u8], now: DateTime<Utc>) -> SourceResult<Vec<Place>> {
        let root: Value = serde_json::from_slice(data)?;
        let elements = match &root {
            Value::Array(items) => items,
            Value::Object(_) => root
                .get("elements")
                .and_then(Value::as_array)
                .ok_or_else(|| SourceError::Unrecognized("OpenStreetMap JSON format".to_string()))?,
            _ => return Err(SourceError::Unrecognized("OpenStreetMap JSON format".to_string())),
        };

        Ok(elements
            .iter()
            .enumerate()
            .filter_map(|(i, raw)| match OsmElement::deserialize(raw) {
                Ok(element) => convert_element(element, "osm_anon_", now),
                Err(e) => {
                    warn!(entry = i, error = %e, "Skipping malformed OSM element");
                    None
                }
            })
            .collect())
    }

    fn import_csv(&self, data: &[u8], now: DateTime<Utc>) -> SourceResult<Vec<Place>> {
        const NAME: &[&str] = &["name", "title"];
        const LAT: &[&str] = &["lat", "latitude"];
        const LON: &[&str] = &["lon", "lng", "longitude"];

        let mut reader = csv_reader(data);
        let columns = CsvColumns::new(reader.headers()?);
        if !(columns.has_any(NAME) && columns.has_any(LAT) && columns.has_any(LON)) {
            return Err(SourceError::Unrecognized(
                "OpenStreetMap CSV: name, lat and lon columns are required".to_string(),
            ));
        }

        let mut places = Vec::new();
        for (row, record) in reader.records().enumerate() {
            let record = match record {
                Ok(record) => record,
                Err(e) => {
                    warn!(row = row + 1, error = %e, "Skipping unreadable CSV row");
                    continue;
                }
            };

            let name = columns.text(&record, NAME);
            if name.is_empty() {
                continue;
            }
            let (Some(lat), Some(lon)) = (columns.float(&record, LAT), columns.float(&record, LON)) else {
                warn!(row = row + 1, name = %name, "Skipping row with invalid coordinates");
                continue;
            };

            let mut tags = BTreeMap::new();
            tags.insert("name".to_string(), name.clone());
            let kind = columns.text(&record, &["type", "category"]);
            if !kind.is_empty() {
                tags.insert("amenity".to_string(), kind);
            }
            let description = columns.text(&record, &["description", "desc", "notes"]);
            if !description.is_empty() {
                tags.insert("description".to_string(), description);
            }

            let element = OsmElement {
                kind: "node".to_string(),
                id: columns.text(&record, &["id", "osm_id"]).parse::<i64>().ok(),
                lat: Some(lat),
                lon: Some(lon),
                center: None,
                tags,
            };
            if let Some(place) = convert_element(element, "osm_csv_", now) {
                places.push(place);
            }
        }

        Ok(places)
    }
}

impl ImportSource for OsmSource {
    fn tag(&self) -> &'static str {
        "osm"
    }

    fn name(&self) -> &'static str {
        "OpenStreetMap"
    }

    fn supported_formats(&self) -> &'static [SourceFormat] {
        &[SourceFormat::Json, SourceFormat::Csv]
    }

    fn import_from_data(&self, data: &[u8], format: SourceFormat) -> SourceResult<Vec<Place>> {
        let now = Utc::now();
        match format {
            SourceFormat::Json => self.import_json(data, now),
            SourceFormat::Csv => self.import_csv(data, now),
            other => Err(SourceError::UnsupportedFormat {
                adapter: self.name(),
                format: other,
            }),
        }
    }
}

/// `amenity=cafe` → `Cafe`, `shop=books` → `Shopping - Books`
pub(crate) fn humanize_category(tag: &str, value: &str) -> String {
    match tag {
        "amenity" => match value {
            "restaurant" => "Restaurant".to_string(),
            "cafe" => "Cafe".to_string(),
            "bar" | "pub" => "Bar".to_string(),
            "bank" => "Bank".to_string(),
            "hospital" => "Hospital".to_string(),
            "school" => "School".to_string(),
            other => title_case(other),
        },
        "shop" => format!("Shopping - {}", title_case(value)),
        "tourism" => format!("Tourism - {}", title_case(value)),
        "leisure" => format!("Leisure - {}", title_case(value)),
        _ => title_case(value),
    }
}

fn build_address(tags: &BTreeMap<String, String>) -> String {
    ADDRESS_TAGS
        .iter()
        .filter_map(|key| tags.get(*key))
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .collect::<Vec<_>>()
        .join(", ")
}

fn is_mapped_tag(key: &str) -> bool {
    matches!(key, "name" | "phone" | "website" | "description") || key.starts_with("addr:")
}

/// Elements without a `name` tag are dropped. Elements without a native
/// id get one synthesized from name and coordinates under `fallback_prefix`.
fn convert_element(element: OsmElement, fallback_prefix: &str, now: DateTime<Utc>) -> Option<Place> {
    let name = element.tags.get("name").map(|n| n.trim().to_string()).unwrap_or_default();
    if name.is_empty() {
        return None;
    }

    let coordinates = element.coordinates();
    let provider_id = element.provider_id().unwrap_or_else(|| {
        let coords_key = format!("{:.6},{:.6}", coordinates.lat, coordinates.lng);
        synthesize_provider_id(fallback_prefix, &[&name, &coords_key])
    });

    let mut place = Place::new(provider_id, name, build_address(&element.tags), coordinates);
    for tag in CATEGORY_TAGS {
        if let Some(value) = element.tags.get(*tag).filter(|v| !v.trim().is_empty()) {
            place.add_category(humanize_category(tag, value.trim()));
        }
    }
    place.phone = element.tags.get("phone").cloned().unwrap_or_default();
    place.website = element.tags.get("website").cloned().unwrap_or_default();
    place.user_notes = element.tags.get("description").cloned().unwrap_or_default();

    if let Some(id) = element.id {
        place.set_field("osm_id", FieldValue::Number(id as f64));
    }
    for (key, value) in &element.tags {
        if !is_mapped_tag(key) {
            place.set_field(format!("osm_{}", key), value.clone());
        }
    }

    normalize::finalize(place, ORIGIN, now)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_osm_node_cafe_category() {
        let json = r#"{"version":0.6,"elements":[
            {"type":"node","id":123,"lat":52.52,"lon":13.405,
             "tags":{"name":"Central Cafe","amenity":"cafe"}}
        ]}"#;
        let places = OsmSource::new()
            .import_from_data(json.as_bytes(), SourceFormat::Json)
            .unwrap();

        assert_eq!(places.len(), 1);
        assert!(places[0].categories.contains(&"Cafe".to_string()));
        assert_eq!(places[0].provider_id, "osm_123");
        assert_eq!(places[0].field("osm_id"), Some(&FieldValue::Number(123.0)));
        assert_eq!(places[0].field("osm_amenity").and_then(|v| v.as_text()), Some("cafe"));
    }

    #[test]
    fn test_osm_tags_address_and_custom_fields() {
        let json = r#"{"elements":[
            {"type":"node","id":7,"lat":48.1,"lon":11.5,"tags":{
                "name":"Buchhandlung","shop":"books","tourism":"attraction",
                "addr:housenumber":"12","addr:street":"Hauptstr.","addr:city":"Munich",
                "addr:postcode":"80331","phone":"+49 89","website":"https://books.example",
                "description":"Old books","opening_hours":"Mo-Fr 09:00-18:00"}},
            {"type":"node","id":8,"lat":1,"lon":1,"tags":{"amenity":"bench"}},
            {"type":"way","id":9,"center":{"lat":40.0,"lon":-3.7},"tags":{"name":"Parque","leisure":"park"}}
        ]}"#;
        let places = OsmSource::new()
            .import_from_data(json.as_bytes(), SourceFormat::Json)
            .unwrap();

        assert_eq!(places.len(), 2);
        let shop = &places[0];
        assert_eq!(shop.address, "12, Hauptstr., Munich, 80331");
        assert_eq!(shop.categories, vec!["Shopping - Books", "Tourism - Attraction"]);
        assert_eq!(shop.phone, "+49 89");
        assert_eq!(shop.website, "https://books.example");
        assert_eq!(shop.user_notes, "Old books");
        assert!(shop.field("osm_opening_hours").is_some());
        assert!(shop.field("osm_addr:street").is_none());
        assert!(shop.field("osm_phone").is_none());
        assert_eq!(shop.field("imported_from").and_then(|v| v.as_text()), Some("openstreetmap"));

        let park = &places[1];
        assert_eq!(park.provider_id, "osm_way_9");
        assert_eq!(park.coordinates, Coordinates::new(40.0, -3.7));
        assert_eq!(park.categories, vec!["Leisure - Park"]);
    }

    #[test]
    fn test_osm_elements_without_id_stay_distinct() {
        let json = r#"[
            {"type":"node","lat":1.0,"lon":1.0,"tags":{"name":"Kiosk"}},
            {"type":"node","lat":2.0,"lon":2.0,"tags":{"name":"Fountain"}}
        ]"#;
        let places = OsmSource::new()
            .import_from_data(json.as_bytes(), SourceFormat::Json)
            .unwrap();

        assert_eq!(places.len(), 2);
        assert!(places.iter().all(|p| p.provider_id.starts_with("osm_anon_")));
        assert_ne!(places[0].provider_id, places[1].provider_id);
        assert_ne!(places[0].id, places[1].id);
        assert!(places[0].field("osm_id").is_none());
    }

    #[test]
    fn test_humanize_category() {
        assert_eq!(humanize_category("amenity", "pub"), "Bar");
        assert_eq!(humanize_category("amenity", "fast_food"), "Fast Food");
        assert_eq!(humanize_category("craft", "brewery"), "Brewery");
        assert_eq!(humanize_category("office", "coworking"), "Coworking");
    }

    #[test]
    fn test_osm_json_without_elements_is_fatal() {
        let result = OsmSource::new().import_from_data(br#"{"nodes":[]}"#, SourceFormat::Json);
        assert!(matches!(result, Err(SourceError::Unrecognized(_))));
    }

    #[test]
    fn test_osm_csv() {
        let csv = "Name,Latitude,Longitude,Type,Notes\n\
                   Corner Cafe,51.5,-0.12,cafe,Good flat white\n\
                   ,51.6,-0.13,bar,\n\
                   Bad Row,abc,-0.14,bar,\n";
        let places = OsmSource::new()
            .import_from_data(csv.as_bytes(), SourceFormat::Csv)
            .unwrap();

        assert_eq!(places.len(), 1);
        let cafe = &places[0];
        assert_eq!(cafe.categories, vec!["Cafe"]);
        assert_eq!(cafe.user_notes, "Good flat white");
        assert!(cafe.provider_id.starts_with("osm_csv_"));
        assert!(cafe.field("osm_id").is_none());
    }

    #[test]
    fn test_osm_csv_requires_columns() {
        let result = OsmSource::new().import_from_data(b"title,address\nA,B\n", SourceFormat::Csv);
        assert!(matches!(result, Err(SourceError::Unrecognized(_))));
    }
}
