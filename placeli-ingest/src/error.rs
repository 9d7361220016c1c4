//! Error types for placeli-ingest
//!
//! Source errors are fatal for one invocation of an adapter (unreadable
//! file, corrupt archive, unrecognized top-level shape). Problems with a
//! single entry inside a file are logged and skipped instead.

use crate::types::SourceFormat;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for source adapters
pub type SourceResult<T> = std::result::Result<T, SourceError>;

/// Source adapter error
#[derive(Debug, Error)]
pub enum SourceError {
    /// Input path could not be read
    #[error("Cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Top-level JSON could not be parsed
    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV header or body could not be read
    #[error("Invalid CSV: {0}")]
    Csv(#[from] csv::Error),

    /// KML/GPX document is not well-formed
    #[error("Invalid XML: {0}")]
    Xml(String),

    /// ZIP archive could not be opened
    #[error("Cannot read archive: {0}")]
    Archive(#[from] zip::result::ZipError),

    /// Adapter was handed a format it does not read
    #[error("{adapter} does not support {format} input")]
    UnsupportedFormat {
        adapter: &'static str,
        format: SourceFormat,
    },

    /// Parsed, but not in any shape the adapter knows
    #[error("Unrecognized {0}")]
    Unrecognized(String),

    /// Compressed KML
    #[error("KMZ files are not supported; extract the .kml file from {0} and import that instead")]
    KmzUnsupported(String),

    /// `--source` named no registered adapter
    #[error("Unknown source '{0}'")]
    UnknownSource(String),

    /// Auto-detection and the try-each fallback both failed
    #[error("Could not determine the source format of {0}")]
    NoSourceDetected(PathBuf),
}

impl SourceError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        SourceError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn xml(err: impl std::fmt::Display) -> Self {
        SourceError::Xml(err.to_string())
    }
}

/// Enrichment error
#[derive(Debug, Error)]
pub enum EnrichmentError {
    /// Place has no provider id to look up
    #[error("no provider id")]
    MissingProviderId,

    /// Provider lookup failed
    #[error("Provider error: {0}")]
    Provider(String),

    /// Reading or saving the place failed
    #[error("Storage error: {0}")]
    Storage(#[from] placeli_common::Error),
}
