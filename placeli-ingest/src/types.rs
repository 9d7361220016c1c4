//! Base types for source adapters
//!
//! Every export format is read by an [`ImportSource`] that turns raw
//! bytes into canonical [`Place`] records. Adapters are synchronous: they
//! only do file and archive I/O, and the orchestrator processes records
//! one at a time afterwards.

use crate::error::{SourceError, SourceResult};
use placeli_common::Place;
use std::fmt;
use std::path::Path;

/// Input format understood by at least one adapter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceFormat {
    Json,
    Csv,
    Zip,
    Directory,
    Kml,
    Kmz,
    Gpx,
}

impl SourceFormat {
    /// Format implied by a path: directories, then the lower-cased extension
    pub fn from_path(path: &Path) -> Option<Self> {
        if path.is_dir() {
            return Some(SourceFormat::Directory);
        }
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "json" | "geojson" => Some(SourceFormat::Json),
            "csv" => Some(SourceFormat::Csv),
            "zip" => Some(SourceFormat::Zip),
            "kml" => Some(SourceFormat::Kml),
            "kmz" => Some(SourceFormat::Kmz),
            "gpx" => Some(SourceFormat::Gpx),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceFormat::Json => "json",
            SourceFormat::Csv => "csv",
            SourceFormat::Zip => "zip",
            SourceFormat::Directory => "directory",
            SourceFormat::Kml => "kml",
            SourceFormat::Kmz => "kmz",
            SourceFormat::Gpx => "gpx",
        }
    }
}

impl fmt::Display for SourceFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An export format reader
///
/// # Example
/// ```ignore
/// struct GeoJsonSource;
///
/// impl ImportSource for GeoJsonSource {
///     fn tag(&self) -> &'static str { "geojson" }
///     fn name(&self) -> &'static str { "GeoJSON" }
///     fn supported_formats(&self) -> &'static [SourceFormat] { &[SourceFormat::Json] }
///
///     fn import_from_data(&self, data: &[u8], format: SourceFormat) -> SourceResult<Vec<Place>> {
///         // parse features, build places, finalize each
///     }
/// }
/// ```
pub trait ImportSource: Send + Sync {
    /// Registry key, as accepted by `--source`
    fn tag(&self) -> &'static str;

    /// Human-readable name
    fn name(&self) -> &'static str;

    fn supported_formats(&self) -> &'static [SourceFormat];

    fn supports(&self, format: SourceFormat) -> bool {
        self.supported_formats().contains(&format)
    }

    /// Parse in-memory data of a known format
    ///
    /// Entries without a name, an address or coordinates are dropped.
    /// Returns `SourceError` only when the payload as a whole is unusable.
    fn import_from_data(&self, data: &[u8], format: SourceFormat) -> SourceResult<Vec<Place>>;

    /// Read and parse a file (or directory, for adapters that support it)
    fn import_from_file(&self, path: &Path) -> SourceResult<Vec<Place>> {
        let format = SourceFormat::from_path(path)
            .ok_or_else(|| SourceError::Unrecognized(format!("file type: {}", path.display())))?;
        if !self.supports(format) {
            return Err(SourceError::UnsupportedFormat {
                adapter: self.name(),
                format,
            });
        }
        let data = std::fs::read(path).map_err(|e| SourceError::io(path, e))?;
        self.import_from_data(&data, format)
    }
}
