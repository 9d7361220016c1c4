//! Apple Maps adapter (KML and GPX)
//!
//! Apple Maps guides and most "export to file" tools produce KML; GPS
//! apps produce GPX waypoints. Both are read with a streaming XML reader,
//! tracking only the element path needed to attribute text to fields.

use super::normalize;
use crate::error::{SourceError, SourceResult};
use crate::types::{ImportSource, SourceFormat};
use chrono::{DateTime, Utc};
use placeli_common::identity::synthesize_provider_id;
use placeli_common::{Coordinates, Place};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::path::Path;
use tracing::{debug, info};

const ORIGIN_KML: &str = "apple_maps";
const ORIGIN_GPX: &str = "gpx";

#[derive(Debug, Default)]
struct KmlPlacemark {
    name: String,
    description: String,
    address: String,
    phone: String,
    coordinates: String,
    data: Vec<(String, String)>,
}

#[derive(Debug, Default)]
struct GpxWaypoint {
    lat: f64,
    lon: f64,
    name: String,
    desc: String,
    kind: String,
    time: String,
}

/// Apple Maps importer
#[derive(Debug, Default)]
pub struct AppleSource;

impl AppleSource {
    pub fn new() -> Self {
        Self
    }
}

impl ImportSource for AppleSource {
    fn tag(&self) -> &'static str {
        "apple"
    }

    fn name(&self) -> &'static str {
        "Apple Maps"
    }

    fn supported_formats(&self) -> &'static [SourceFormat] {
        &[SourceFormat::Kml, SourceFormat::Kmz, SourceFormat::Gpx]
    }

    fn import_from_data(&self, data: &[u8], format: SourceFormat) -> SourceResult<Vec<Place>> {
        let now = Utc::now();
        match format {
            SourceFormat::Kml => Ok(parse_kml(data)?
                .into_iter()
                .filter_map(|pm| convert_placemark(pm, now))
                .collect()),
            SourceFormat::Gpx => Ok(parse_gpx(data)?
                .into_iter()
                .filter_map(|wpt| convert_waypoint(wpt, now))
                .collect()),
            SourceFormat::Kmz => Err(SourceError::KmzUnsupported("the archive".to_string())),
            other => Err(SourceError::UnsupportedFormat {
                adapter: self.name(),
                format: other,
            }),
        }
    }

    fn import_from_file(&self, path: &Path) -> SourceResult<Vec<Place>> {
        let format = SourceFormat::from_path(path)
            .ok_or_else(|| SourceError::Unrecognized(format!("file type: {}", path.display())))?;
        match format {
            SourceFormat::Kmz => Err(SourceError::KmzUnsupported(path.display().to_string())),
            SourceFormat::Kml | SourceFormat::Gpx => {
                let data = normalize::read_path(path)?;
                let places = self.import_from_data(&data, format)?;
                info!(path = %path.display(), count = places.len(), "Read {} file", format);
                Ok(places)
            }
            other => Err(SourceError::UnsupportedFormat {
                adapter: self.name(),
                format: other,
            }),
        }
    }
}

fn local_name(e: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(e.local_name().as_ref()).into_owned()
}

fn attribute(e: &BytesStart<'_>, key: &[u8]) -> SourceResult<Option<String>> {
    for attr in e.attributes() {
        let attr = attr.map_err(SourceError::xml)?;
        if attr.key.local_name().as_ref() == key {
            return Ok(Some(attr.unescape_value().map_err(SourceError::xml)?.into_owned()));
        }
    }
    Ok(None)
}

/// Collect placemarks at any depth (root, Document, nested Folders)
fn parse_kml(data: &[u8]) -> SourceResult<Vec<KmlPlacemark>> {
    let mut reader = Reader::from_reader(data);
    reader.trim_text(true);

    let mut placemarks = Vec::new();
    let mut path: Vec<String> = Vec::new();
    let mut current: Option<KmlPlacemark> = None;
    let mut data_name: Option<String> = None;
    let mut text = String::new();
    let mut saw_root = false;

    loop {
        match reader.read_event().map_err(SourceError::xml)? {
            Event::Start(e) => {
                let name = local_name(&e);
                if !saw_root {
                    if name != "kml" {
                        return Err(SourceError::Unrecognized("KML document".to_string()));
                    }
                    saw_root = true;
                }
                match name.as_str() {
                    "Placemark" => current = Some(KmlPlacemark::default()),
                    "Data" | "SimpleData" => data_name = attribute(&e, b"name")?,
                    _ => {}
                }
                path.push(name);
                text.clear();
            }
            Event::Text(e) => text.push_str(&e.unescape().map_err(SourceError::xml)?),
            Event::CData(e) => text.push_str(&String::from_utf8_lossy(&e.into_inner())),
            Event::End(_) => {
                let name = path.pop().unwrap_or_default();
                let parent = path.last().map(String::as_str);
                let value = text.trim().to_string();
                text.clear();

                let Some(pm) = current.as_mut() else {
                    continue;
                };
                match (name.as_str(), parent) {
                    ("name", Some("Placemark")) => pm.name = value,
                    ("description", Some("Placemark")) => pm.description = value,
                    ("address", _) => pm.address = value,
                    ("phoneNumber", _) => pm.phone = value,
                    ("coordinates", Some("Point")) => pm.coordinates = value,
                    ("value", Some("Data")) => {
                        if let Some(key) = data_name.clone() {
                            pm.data.push((key, value));
                        }
                    }
                    ("SimpleData", _) => {
                        if let Some(key) = data_name.take() {
                            pm.data.push((key, value));
                        }
                    }
                    ("Data", _) => data_name = None,
                    ("Placemark", _) => {
                        if let Some(done) = current.take() {
                            placemarks.push(done);
                        }
                    }
                    _ => {}
                }
            }
            Event::Empty(e) => {
                if !saw_root {
                    return Err(SourceError::Unrecognized("KML document".to_string()));
                }
                debug!(element = %local_name(&e), "Ignoring empty KML element");
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !saw_root {
        return Err(SourceError::Unrecognized("KML document".to_string()));
    }
    Ok(placemarks)
}

fn parse_gpx(data: &[u8]) -> SourceResult<Vec<GpxWaypoint>> {
    let mut reader = Reader::from_reader(data);
    reader.trim_text(true);

    let mut waypoints = Vec::new();
    let mut path: Vec<String> = Vec::new();
    let mut current: Option<GpxWaypoint> = None;
    let mut text = String::new();
    let mut saw_root = false;

    let start_waypoint = |e: &BytesStart<'_>| -> SourceResult<GpxWaypoint> {
        // Unparseable lat/lon become the (0,0) sentinel
        let coord = |key: &[u8]| -> SourceResult<f64> {
            Ok(attribute(e, key)?
                .and_then(|v| v.trim().parse::<f64>().ok())
                .unwrap_or_default())
        };
        Ok(GpxWaypoint {
            lat: coord(b"lat")?,
            lon: coord(b"lon")?,
            ..Default::default()
        })
    };

    loop {
        match reader.read_event().map_err(SourceError::xml)? {
            Event::Start(e) => {
                let name = local_name(&e);
                if !saw_root {
                    if name != "gpx" {
                        return Err(SourceError::Unrecognized("GPX document".to_string()));
                    }
                    saw_root = true;
                }
                if name == "wpt" {
                    current = Some(start_waypoint(&e)?);
                }
                path.push(name);
                text.clear();
            }
            Event::Empty(e) => {
                if !saw_root {
                    return Err(SourceError::Unrecognized("GPX document".to_string()));
                }
                if local_name(&e) == "wpt" {
                    waypoints.push(start_waypoint(&e)?);
                }
            }
            Event::Text(e) => text.push_str(&e.unescape().map_err(SourceError::xml)?),
            Event::CData(e) => text.push_str(&String::from_utf8_lossy(&e.into_inner())),
            Event::End(_) => {
                let name = path.pop().unwrap_or_default();
                let parent = path.last().map(String::as_str);
                let value = text.trim().to_string();
                text.clear();

                let Some(wpt) = current.as_mut() else {
                    continue;
                };
                match (name.as_str(), parent) {
                    ("name", Some("wpt")) => wpt.name = value,
                    ("desc", Some("wpt")) => wpt.desc = value,
                    ("type", Some("wpt")) => wpt.kind = value,
                    ("time", Some("wpt")) => wpt.time = value,
                    ("wpt", _) => {
                        if let Some(done) = current.take() {
                            waypoints.push(done);
                        }
                    }
                    _ => {}
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !saw_root {
        return Err(SourceError::Unrecognized("GPX document".to_string()));
    }
    Ok(waypoints)
}

/// `lng,lat[,alt]`, longitude first
fn parse_kml_coordinates(raw: &str) -> Coordinates {
    let mut parts = raw.trim().split(',').map(str::trim);
    let lng = parts.next().and_then(|v| v.parse::<f64>().ok());
    let lat = parts.next().and_then(|v| v.parse::<f64>().ok());
    match (lat, lng) {
        (Some(lat), Some(lng)) => Coordinates::new(lat, lng),
        _ => Coordinates::default(),
    }
}

fn convert_placemark(pm: KmlPlacemark, now: DateTime<Utc>) -> Option<Place> {
    if pm.name.is_empty() {
        return None;
    }
    let coordinates = parse_kml_coordinates(&pm.coordinates);
    if coordinates.is_unset() {
        debug!(name = %pm.name, "Skipping placemark without coordinates");
        return None;
    }

    let coords_key = format!("{:.6},{:.6}", coordinates.lat, coordinates.lng);
    let provider_id = synthesize_provider_id("apple_", &[&pm.name, &pm.address, &coords_key]);

    let mut place = Place::new(provider_id, pm.name, pm.address, coordinates);
    place.phone = pm.phone;

    for (key, value) in &pm.data {
        let lower = key.to_ascii_lowercase();
        if (lower == "category" || lower == "type") && !value.is_empty() {
            place.add_category(value.clone());
        }
    }
    if place.categories.is_empty()
        && (place.name.to_lowercase().contains("restaurant")
            || pm.description.to_lowercase().contains("restaurant"))
    {
        place.add_category("Restaurant");
    }

    for (key, value) in pm.data {
        if !key.is_empty() && !value.is_empty() {
            place.set_field(format!("apple_{}", key), value);
        }
    }
    place.user_notes = pm.description;

    normalize::finalize(place, ORIGIN_KML, now)
}

fn convert_waypoint(wpt: GpxWaypoint, now: DateTime<Utc>) -> Option<Place> {
    if wpt.name.is_empty() {
        return None;
    }

    let coordinates = Coordinates::new(wpt.lat, wpt.lon);
    let coords_key = format!("{:.6},{:.6}", coordinates.lat, coordinates.lng);
    let provider_id = synthesize_provider_id("gpx_", &[&wpt.name, &wpt.desc, &coords_key]);

    let mut place = Place::new(provider_id, wpt.name, "", coordinates);
    place.user_notes = wpt.desc;
    if !wpt.kind.is_empty() {
        place.add_category(wpt.kind.clone());
        place.set_field("gpx_type", wpt.kind);
    }
    if !wpt.time.is_empty() {
        place.set_field("gpx_time", wpt.time);
    }

    normalize::finalize(place, ORIGIN_GPX, now)
}
