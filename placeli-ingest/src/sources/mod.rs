//! Source adapters and the registry that picks one for a path

pub mod apple;
pub mod foursquare;
pub(crate) mod normalize;
pub mod osm;
pub mod takeout;

pub use apple::AppleSource;
pub use foursquare::FoursquareSource;
pub use osm::OsmSource;
pub use takeout::TakeoutSource;

use crate::error::{SourceError, SourceResult};
use crate::types::{ImportSource, SourceFormat};
use normalize::{csv_reader, CsvColumns};
use placeli_common::Place;
use serde_json::Value;
use std::path::Path;
use tracing::{debug, info};

/// Registered adapters, in registration order
///
/// Built once at startup and shared through the ingest context.
pub struct SourceRegistry {
    sources: Vec<Box<dyn ImportSource>>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self { sources: Vec::new() }
    }

    /// Takeout, Apple Maps, OpenStreetMap and Foursquare
    pub fn with_default_sources() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(TakeoutSource::new()));
        registry.register(Box::new(AppleSource::new()));
        registry.register(Box::new(OsmSource::new()));
        registry.register(Box::new(FoursquareSource::new()));
        registry
    }

    /// Adds an adapter, replacing any registered under the same tag
    pub fn register(&mut self, source: Box<dyn ImportSource>) {
        self.sources.retain(|s| s.tag() != source.tag());
        self.sources.push(source);
    }

    pub fn get(&self, tag: &str) -> Option<&dyn ImportSource> {
        self.sources
            .iter()
            .find(|s| s.tag().eq_ignore_ascii_case(tag))
            .map(|s| s.as_ref())
    }

    pub fn list(&self) -> impl Iterator<Item = &dyn ImportSource> {
        self.sources.iter().map(|s| s.as_ref())
    }

    /// Pick an adapter from the path's extension and, for JSON and CSV,
    /// from a look at the content
    ///
    /// **Rules:**
    /// - directory or `.zip` → takeout
    /// - `.kml` / `.kmz` / `.gpx` → apple
    /// - `.json`: top-level `features`, `lists` or `places` → takeout,
    ///   `elements` → osm, `checkins` → foursquare
    /// - `.csv`: latitude and longitude columns without a URL column → osm,
    ///   otherwise takeout
    pub fn detect(&self, path: &Path) -> Option<&dyn ImportSource> {
        let format = SourceFormat::from_path(path)?;
        let tag = match format {
            SourceFormat::Directory | SourceFormat::Zip => Some("takeout"),
            SourceFormat::Kml | SourceFormat::Kmz | SourceFormat::Gpx => Some("apple"),
            SourceFormat::Json => sniff_json(path),
            SourceFormat::Csv => sniff_csv(path),
        }?;
        debug!(path = %path.display(), source = tag, "Detected source");
        self.get(tag)
    }

    /// Parse a file or directory with an explicit or detected adapter
    ///
    /// `source` of `None` or `"auto"` means detect. When detection finds
    /// nothing, every adapter that reads the format is tried in turn and the
    /// first non-empty result wins. Returns the tag of the adapter used.
    pub fn import_path(&self, path: &Path, source: Option<&str>) -> SourceResult<(&'static str, Vec<Place>)> {
        if !path.exists() {
            return Err(SourceError::io(
                path,
                std::io::Error::new(std::io::ErrorKind::NotFound, "no such file or directory"),
            ));
        }

        if let Some(tag) = source.filter(|t| !t.eq_ignore_ascii_case("auto")) {
            let adapter = self
                .get(tag)
                .ok_or_else(|| SourceError::UnknownSource(tag.to_string()))?;
            let places = adapter.import_from_file(path)?;
            return Ok((adapter.tag(), places));
        }

        if let Some(adapter) = self.detect(path) {
            info!(path = %path.display(), source = adapter.name(), "Importing");
            let places = adapter.import_from_file(path)?;
            return Ok((adapter.tag(), places));
        }

        let format = SourceFormat::from_path(path).ok_or_else(|| SourceError::NoSourceDetected(path.to_path_buf()))?;
        for adapter in self.sources.iter().filter(|s| s.supports(format)) {
            match adapter.import_from_file(path) {
                Ok(places) if !places.is_empty() => {
                    info!(path = %path.display(), source = adapter.name(), "Importing (fallback)");
                    return Ok((adapter.tag(), places));
                }
                Ok(_) => debug!(source = adapter.tag(), "Adapter found no places"),
                Err(e) => debug!(source = adapter.tag(), error = %e, "Adapter rejected input"),
            }
        }

        Err(SourceError::NoSourceDetected(path.to_path_buf()))
    }
}

impl Default for SourceRegistry {
    fn default() -> Self {
        Self::with_default_sources()
    }
}

fn sniff_json(path: &Path) -> Option<&'static str> {
    let data = std::fs::read(path).ok()?;
    let root: Value = serde_json::from_slice(&data).ok()?;
    let object = root.as_object()?;
    if ["features", "lists", "places"].iter().any(|k| object.contains_key(*k)) {
        Some("takeout")
    } else if object.contains_key("elements") {
        Some("osm")
    } else if object.contains_key("checkins") {
        Some("foursquare")
    } else {
        None
    }
}

fn sniff_csv(path: &Path) -> Option<&'static str> {
    let data = std::fs::read(path).ok()?;
    let mut reader = csv_reader(&data);
    let columns = CsvColumns::new(reader.headers().ok()?);
    let has_coordinates =
        columns.has_any(&["lat", "latitude"]) && columns.has_any(&["lon", "lng", "longitude"]);
    let has_url = columns.has_any(&["url", "link", "google maps url"]);
    if has_coordinates && !has_url {
        Some("osm")
    } else {
        Some("takeout")
    }
}
