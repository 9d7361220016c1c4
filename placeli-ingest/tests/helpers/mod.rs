//! Test Helper Utilities
//!
//! Shared utilities for testing placeli-ingest

pub mod db_utils;
pub mod fixtures;

// Re-export commonly used items
pub use db_utils::{create_file_store, create_test_store, snapshot};
pub use fixtures::{takeout_feature_json, write_fixture, write_zip};
