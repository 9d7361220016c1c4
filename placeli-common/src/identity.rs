//! Deterministic identity for places
//!
//! - `id` derives from the provider id only, so it stays stable when a
//!   provider renames or moves a place.
//! - `source_hash` covers name, address, coordinates and provider id, so
//!   any change to how the source describes the place changes it.

use crate::place::Coordinates;
use sha2::{Digest, Sha256};

/// Length of a local place id in hex characters
pub const ID_LENGTH: usize = 12;

/// Length of the hash part of a synthesized provider id
pub const SYNTHETIC_ID_HASH_LENGTH: usize = 16;

fn sha256_hex(input: &str) -> String {
    format!("{:x}", Sha256::digest(input.as_bytes()))
}

/// First 12 hex characters of SHA-256(provider_id)
pub fn generate_id(provider_id: &str) -> String {
    let mut hex = sha256_hex(provider_id);
    hex.truncate(ID_LENGTH);
    hex
}

/// Full hex SHA-256 of `name|address|lat,lng|provider_id`
///
/// Coordinates are rendered with six decimals so the hash does not depend
/// on how a source happened to print its floats.
pub fn source_hash(name: &str, address: &str, coordinates: &Coordinates, provider_id: &str) -> String {
    sha256_hex(&format!(
        "{}|{}|{:.6},{:.6}|{}",
        name, address, coordinates.lat, coordinates.lng, provider_id
    ))
}

/// Provider id for sources without a native one: `prefix` + 16 hex chars
/// of SHA-256 over the `|`-joined parts
pub fn synthesize_provider_id(prefix: &str, parts: &[&str]) -> String {
    let mut hex = sha256_hex(&parts.join("|"));
    hex.truncate(SYNTHETIC_ID_HASH_LENGTH);
    format!("{}{}", prefix, hex)
}
