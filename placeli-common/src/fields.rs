//! Typed custom fields and the system-field partition
//!
//! Custom fields are an open `name -> value` map on every place. Entries
//! written by an importer or a merge are *system* fields and may be
//! refreshed by later imports; everything else belongs to the user.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Prefixes that mark a custom field as provider-written
pub const DEFAULT_SYSTEM_PREFIXES: &[&str] = &["google_", "osm_", "apple_", "foursquare_", "gpx_"];

/// Exact names that mark a custom field as provider-written
pub const DEFAULT_SYSTEM_NAMES: &[&str] = &[
    "google_maps_url",
    "imported_from",
    "import_date",
    "last_sync",
    "last_import",
];

/// Custom field value
///
/// Stored with its type alongside (`{"type":"date","value":"2024-05-01"}`)
/// so a text value that happens to look like a date stays text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum FieldValue {
    Boolean(bool),
    Number(f64),
    List(Vec<String>),
    Date(NaiveDate),
    Text(String),
}

/// Declared type of a custom field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Text,
    Number,
    Date,
    Boolean,
    List,
}

impl FieldType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::Text => "text",
            FieldType::Number => "number",
            FieldType::Date => "date",
            FieldType::Boolean => "boolean",
            FieldType::List => "list",
        }
    }
}

impl std::str::FromStr for FieldType {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "text" | "string" => Ok(FieldType::Text),
            "number" | "numeric" => Ok(FieldType::Number),
            "date" => Ok(FieldType::Date),
            "boolean" | "bool" => Ok(FieldType::Boolean),
            "list" => Ok(FieldType::List),
            other => Err(crate::Error::InvalidInput(format!("Unknown field type: {}", other))),
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

const DATE_FORMAT: &str = "%Y-%m-%d";

impl FieldValue {
    pub fn text(value: impl Into<String>) -> Self {
        FieldValue::Text(value.into())
    }

    pub fn field_type(&self) -> FieldType {
        match self {
            FieldValue::Boolean(_) => FieldType::Boolean,
            FieldValue::Number(_) => FieldType::Number,
            FieldValue::List(_) => FieldType::List,
            FieldValue::Date(_) => FieldType::Date,
            FieldValue::Text(_) => FieldType::Text,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Empty value of the given type, used when a field is added without a value
    pub fn default_for(field_type: FieldType) -> Self {
        match field_type {
            FieldType::Text => FieldValue::Text(String::new()),
            FieldType::Number => FieldValue::Number(0.0),
            FieldType::Date => FieldValue::Date(chrono::Utc::now().date_naive()),
            FieldType::Boolean => FieldValue::Boolean(false),
            FieldType::List => FieldValue::List(Vec::new()),
        }
    }

    /// Guess the type of a raw user string
    ///
    /// **Algorithm:**
    /// 1. Parses as a number → `Number`
    /// 2. `true`/`false` (any case) → `Boolean`
    /// 3. `YYYY-MM-DD` → `Date`
    /// 4. Anything else → `Text`
    pub fn infer(raw: &str) -> Self {
        let trimmed = raw.trim();
        if let Ok(n) = trimmed.parse::<f64>() {
            if n.is_finite() {
                return FieldValue::Number(n);
            }
        }
        match trimmed.to_ascii_lowercase().as_str() {
            "true" => return FieldValue::Boolean(true),
            "false" => return FieldValue::Boolean(false),
            _ => {}
        }
        if let Ok(d) = NaiveDate::parse_from_str(trimmed, DATE_FORMAT) {
            return FieldValue::Date(d);
        }
        FieldValue::Text(raw.to_string())
    }

    /// Parse a raw user string as a specific type
    pub fn parse_as(raw: &str, field_type: FieldType) -> crate::Result<Self> {
        let trimmed = raw.trim();
        match field_type {
            FieldType::Text => Ok(FieldValue::Text(raw.to_string())),
            FieldType::Number => trimmed
                .parse::<f64>()
                .map(FieldValue::Number)
                .map_err(|_| crate::Error::InvalidInput(format!("'{}' is not a number", raw))),
            FieldType::Date => NaiveDate::parse_from_str(trimmed, DATE_FORMAT)
                .map(FieldValue::Date)
                .map_err(|_| {
                    crate::Error::InvalidInput(format!("'{}' is not a date (YYYY-MM-DD)", raw))
                }),
            FieldType::Boolean => match trimmed.to_ascii_lowercase().as_str() {
                "true" | "yes" | "y" | "1" => Ok(FieldValue::Boolean(true)),
                "false" | "no" | "n" | "0" => Ok(FieldValue::Boolean(false)),
                _ => Err(crate::Error::InvalidInput(format!("'{}' is not a boolean", raw))),
            },
            FieldType::List => Ok(FieldValue::List(
                trimmed
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect(),
            )),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Boolean(b) => write!(f, "{}", b),
            FieldValue::Number(n) => write!(f, "{}", n),
            FieldValue::List(items) => write!(f, "{}", items.join(", ")),
            FieldValue::Date(d) => write!(f, "{}", d.format(DATE_FORMAT)),
            FieldValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::Text(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::Text(s)
    }
}

impl From<f64> for FieldValue {
    fn from(n: f64) -> Self {
        FieldValue::Number(n)
    }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        FieldValue::Boolean(b)
    }
}

impl From<Vec<String>> for FieldValue {
    fn from(items: Vec<String>) -> Self {
        FieldValue::List(items)
    }
}

/// Rules deciding which custom fields are provider-written
///
/// Built once from configuration and handed to whatever needs to tell
/// system fields from user fields (the import merge, field listings).
#[derive(Debug, Clone, PartialEq)]
pub struct SystemFieldRules {
    prefixes: Vec<String>,
    names: Vec<String>,
}

impl SystemFieldRules {
    pub fn new(prefixes: Vec<String>, names: Vec<String>) -> Self {
        Self { prefixes, names }
    }

    pub fn is_system(&self, key: &str) -> bool {
        self.names.iter().any(|n| n == key) || self.prefixes.iter().any(|p| key.starts_with(p.as_str()))
    }

    pub fn is_user(&self, key: &str) -> bool {
        !self.is_system(key)
    }

    pub fn prefixes(&self) -> &[String] {
        &self.prefixes
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }
}

impl Default for SystemFieldRules {
    fn default() -> Self {
        Self::new(
            DEFAULT_SYSTEM_PREFIXES.iter().map(|s| s.to_string()).collect(),
            DEFAULT_SYSTEM_NAMES.iter().map(|s| s.to_string()).collect(),
        )
    }
}
