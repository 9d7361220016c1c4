//! # Placeli Common Library
//!
//! Shared code for the placeli tools including:
//! - The canonical place record and its typed custom fields
//! - Identity and source-hash generation
//! - System-field rules
//! - Configuration loading
//! - SQLite-backed place storage

pub mod config;
#[cfg(feature = "sqlx")]
pub mod db;
pub mod error;
pub mod fields;
pub mod identity;
pub mod place;

pub use error::{Error, Result};
pub use fields::{FieldType, FieldValue, SystemFieldRules};
pub use place::{Coordinates, Photo, Place, Review};
