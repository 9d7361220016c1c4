//! Foursquare / Swarm check-in exports
//!
//! An export is a list of check-ins. Repeated visits to one venue collapse
//! into a single place carrying the aggregated check-in history.

use super::normalize;
use super::takeout::null_default;
use crate::error::{SourceError, SourceResult};
use crate::types::{ImportSource, SourceFormat};
use chrono::{DateTime, NaiveDate, Utc};
use placeli_common::{Coordinates, FieldValue, Photo, Place};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use tracing::warn;

const ORIGIN: &str = "foursquare";

#[derive(Debug, Default, Deserialize)]
struct Checkin {
    #[serde(default, rename = "createdAt")]
    created_at: i64,
    #[serde(default, deserialize_with = "null_default")]
    venue: Venue,
    #[serde(default, deserialize_with = "null_default")]
    photos: Vec<CheckinPhoto>,
    #[serde(default, deserialize_with = "null_default")]
    comments: String,
}

#[derive(Debug, Default, Deserialize)]
struct Venue {
    #[serde(default, deserialize_with = "null_default")]
    id: String,
    #[serde(default, deserialize_with = "null_default")]
    name: String,
    #[serde(default, deserialize_with = "null_default")]
    contact: Contact,
    #[serde(default, deserialize_with = "null_default")]
    location: VenueLocation,
    #[serde(default, deserialize_with = "null_default")]
    categories: Vec<VenueCategory>,
    #[serde(default, deserialize_with = "null_default")]
    url: String,
    #[serde(default, deserialize_with = "null_default")]
    stats: Stats,
    #[serde(default)]
    rating: f32,
    #[serde(default, deserialize_with = "null_default")]
    price: Price,
}

#[derive(Debug, Default, Deserialize)]
struct Contact {
    #[serde(default, deserialize_with = "null_default")]
    phone: String,
    #[serde(default, rename = "formattedPhone", deserialize_with = "null_default")]
    formatted_phone: String,
    #[serde(default, deserialize_with = "null_default")]
    twitter: String,
    #[serde(default, deserialize_with = "null_default")]
    instagram: String,
    #[serde(default, deserialize_with = "null_default")]
    facebook: String,
}

#[derive(Debug, Default, Deserialize)]
struct VenueLocation {
    #[serde(default, deserialize_with = "null_default")]
    address: String,
    #[serde(default)]
    lat: f64,
    #[serde(default)]
    lng: f64,
    #[serde(default, rename = "postalCode", deserialize_with = "null_default")]
    postal_code: String,
    #[serde(default, deserialize_with = "null_default")]
    city: String,
    #[serde(default, deserialize_with = "null_default")]
    state: String,
    #[serde(default, deserialize_with = "null_default")]
    country: String,
    #[serde(default, rename = "formattedAddress", deserialize_with = "null_default")]
    formatted_address: Vec<String>,
}

impl VenueLocation {
    fn display_address(&self) -> String {
        let parts: Vec<&str> = if self.formatted_address.is_empty() {
            vec![&self.address, &self.city, &self.state, &self.postal_code, &self.country]
                .into_iter()
                .map(String::as_str)
                .collect()
        } else {
            self.formatted_address.iter().map(String::as_str).collect()
        };
        parts
            .into_iter()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

#[derive(Debug, Default, Deserialize)]
struct VenueCategory {
    #[serde(default, deserialize_with = "null_default")]
    name: String,
}

#[derive(Debug, Default, Deserialize)]
struct Stats {
    #[serde(default, rename = "checkinsCount")]
    checkins_count: u32,
    #[serde(default, rename = "usersCount")]
    users_count: u32,
    #[serde(default, rename = "tipCount")]
    tip_count: u32,
}

#[derive(Debug, Default, Deserialize)]
struct Price {
    #[serde(default)]
    tier: u8,
    #[serde(default, deserialize_with = "null_default")]
    message: String,
    #[serde(default, deserialize_with = "null_default")]
    currency: String,
}

#[derive(Debug, Default, Deserialize)]
struct CheckinPhoto {
    #[serde(default, deserialize_with = "null_default")]
    id: String,
    #[serde(default)]
    width: u32,
    #[serde(default)]
    height: u32,
}

/// Check-ins of one venue, first one kept for venue details
struct VenueVisits {
    first: Checkin,
    timestamps: Vec<i64>,
    comments: Vec<String>,
}

/// Foursquare/Swarm importer
#[derive(Debug, Default)]
pub struct FoursquareSource;

impl FoursquareSource {
    pub fn new() -> Self {
        Self
    }

    fn import_json(&self, data: &[u8], now: DateTime<Utc>) -> SourceResult<Vec<Place>> {
        let root: Value = serde_json::from_slice(data)?;
        let checkins = match &root {
            Value::Array(items) => items,
            _ => root
                .get("checkins")
                .and_then(|c| c.get("items").or(Some(c)))
                .and_then(Value::as_array)
                .ok_or_else(|| SourceError::Unrecognized("Foursquare JSON format".to_string()))?,
        };

        // venue id -> visits, with first-seen order kept separately
        let mut order: Vec<String> = Vec::new();
        let mut visits: HashMap<String, VenueVisits> = HashMap::new();

        for (i, raw) in checkins.iter().enumerate() {
            let checkin = match Checkin::deserialize(raw) {
                Ok(checkin) => checkin,
                Err(e) => {
                    warn!(entry = i, error = %e, "Skipping malformed check-in");
                    continue;
                }
            };
            let venue_id = checkin.venue.id.trim().to_string();
            if venue_id.is_empty() {
                continue;
            }

            let comment = checkin.comments.trim().to_string();
            let created_at = checkin.created_at;
            let entry = visits.entry(venue_id.clone()).or_insert_with(|| {
                order.push(venue_id);
                VenueVisits {
                    first: checkin,
                    timestamps: Vec::new(),
                    comments: Vec::new(),
                }
            });
            entry.timestamps.push(created_at);
            if !comment.is_empty() {
                entry.comments.push(comment);
            }
        }

        Ok(order
            .iter()
            .filter_map(|venue_id| visits.remove(venue_id))
            .filter_map(|v| convert_venue(v, now))
            .collect())
    }
}

impl ImportSource for FoursquareSource {
    fn tag(&self) -> &'static str {
        "foursquare"
    }

    fn name(&self) -> &'static str {
        "Foursquare/Swarm"
    }

    fn supported_formats(&self) -> &'static [SourceFormat] {
        &[SourceFormat::Json]
    }

    fn import_from_data(&self, data: &[u8], format: SourceFormat) -> SourceResult<Vec<Place>> {
        match format {
            SourceFormat::Json => self.import_json(data, Utc::now()),
            other => Err(SourceError::UnsupportedFormat {
                adapter: self.name(),
                format: other,
            }),
        }
    }
}

/// UTC calendar day of a unix timestamp
fn visit_date(timestamp: i64) -> Option<NaiveDate> {
    DateTime::<Utc>::from_timestamp(timestamp, 0).map(|t| t.date_naive())
}

fn convert_venue(visits: VenueVisits, now: DateTime<Utc>) -> Option<Place> {
    let VenueVisits {
        first,
        timestamps,
        comments,
    } = visits;
    let venue = &first.venue;

    let coordinates = Coordinates::new(venue.location.lat, venue.location.lng);
    let mut place = Place::new(
        format!("4sq_{}", venue.id.trim()),
        venue.name.trim(),
        venue.location.display_address(),
        coordinates,
    );

    for category in &venue.categories {
        if !category.name.trim().is_empty() {
            place.add_category(category.name.trim());
        }
    }
    place.rating = venue.rating;
    place.rating_count = venue.stats.checkins_count;
    place.price_level = venue.price.tier;
    place.phone = if venue.contact.formatted_phone.is_empty() {
        venue.contact.phone.clone()
    } else {
        venue.contact.formatted_phone.clone()
    };
    place.website = venue.url.clone();
    place.user_notes = first.comments.trim().to_string();
    place.photos = first
        .photos
        .iter()
        .filter(|p| !p.id.is_empty())
        .map(|p| Photo {
            reference: p.id.clone(),
            width: p.width,
            height: p.height,
            ..Default::default()
        })
        .collect();

    place.set_field("foursquare_id", venue.id.trim());
    place.set_field("foursquare_users_count", venue.stats.users_count as f64);
    place.set_field("foursquare_tips_count", venue.stats.tip_count as f64);
    for (key, value) in [
        ("foursquare_twitter", &venue.contact.twitter),
        ("foursquare_instagram", &venue.contact.instagram),
        ("foursquare_facebook", &venue.contact.facebook),
        ("foursquare_price_message", &venue.price.message),
        ("foursquare_currency", &venue.price.currency),
    ] {
        if !value.trim().is_empty() {
            place.set_field(key, value.trim());
        }
    }

    place.set_field("my_checkins_count", timestamps.len() as f64);
    // createdAt of 0 means the export left it out
    let dated = || timestamps.iter().copied().filter(|t| *t > 0);
    if let Some(first_visit) = dated().min().and_then(visit_date) {
        place.set_field("first_visit", FieldValue::Date(first_visit));
    }
    if let Some(last_visit) = dated().max().and_then(visit_date) {
        place.set_field("last_visit", FieldValue::Date(last_visit));
    }
    if !comments.is_empty() {
        place.set_field("checkin_comments", comments);
    }

    normalize::finalize(place, ORIGIN, now)
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXPORT: &str = r#"{"checkins": [
        {"id":"c1","createdAt":1700000000,"comments":"First time",
         "photos":[{"id":"ph1","width":800,"height":600}],
         "venue":{"id":"v1","name":"Blue Bottle",
            "location":{"lat":37.77,"lng":-122.42,"formattedAddress":["66 Mint St","San Francisco, CA"]},
            "categories":[{"name":"Coffee Shop"},{"name":""}],
            "contact":{"phone":"4155551234","formattedPhone":"(415) 555-1234","twitter":"bluebottle"},
            "url":"https://bluebottle.example","rating":8.9,
            "stats":{"checkinsCount":5000,"usersCount":1200,"tipCount":80},
            "price":{"tier":2,"message":"Moderate","currency":"$"}}},
        {"id":"c2","createdAt":1600000000,"comments":"",
         "venue":{"id":"v2","name":"Dolores Park",
            "location":{"lat":37.76,"lng":-122.43,"address":"Dolores St","city":"San Francisco","country":"US"}}},
        {"id":"c3","createdAt":1710000000,"comments":"Back again",
         "venue":{"id":"v1","name":"Blue Bottle","location":{"lat":37.77,"lng":-122.42}}},
        {"id":"c4","createdAt":1710000001,"venue":{"name":"No Id Venue"}}
    ]}"#;

    #[test]
    fn test_checkins_grouped_by_venue() {
        let places = FoursquareSource::new()
            .import_from_data(EXPORT.as_bytes(), SourceFormat::Json)
            .unwrap();

        assert_eq!(places.len(), 2);
        assert_eq!(places[0].provider_id, "4sq_v1");
        assert_eq!(places[1].provider_id, "4sq_v2");

        let cafe = &places[0];
        assert_eq!(cafe.field("my_checkins_count"), Some(&FieldValue::Number(2.0)));
        assert_eq!(
            cafe.field("first_visit").map(|v| v.to_string()),
            Some("2023-11-14".to_string())
        );
        assert_eq!(
            cafe.field("last_visit").map(|v| v.to_string()),
            Some("2024-03-09".to_string())
        );
        assert_eq!(
            cafe.field("checkin_comments"),
            Some(&FieldValue::List(vec!["First time".into(), "Back again".into()]))
        );
    }

    #[test]
    fn test_venue_details() {
        let places = FoursquareSource::new()
            .import_from_data(EXPORT.as_bytes(), SourceFormat::Json)
            .unwrap();
        let cafe = &places[0];

        assert_eq!(cafe.name, "Blue Bottle");
        assert_eq!(cafe.address, "66 Mint St, San Francisco, CA");
        assert_eq!(cafe.categories, vec!["Coffee Shop"]);
        assert_eq!(cafe.phone, "(415) 555-1234");
        assert_eq!(cafe.website, "https://bluebottle.example");
        assert_eq!(cafe.rating_count, 5000);
        assert_eq!(cafe.price_level, 2);
        assert_eq!(cafe.photos.len(), 1);
        assert_eq!(cafe.user_notes, "First time");
        assert_eq!(cafe.field("foursquare_twitter").and_then(|v| v.as_text()), Some("bluebottle"));
        assert_eq!(cafe.field("foursquare_price_message").and_then(|v| v.as_text()), Some("Moderate"));
        assert!(cafe.field("foursquare_instagram").is_none());
        assert_eq!(cafe.field("imported_from").and_then(|v| v.as_text()), Some("foursquare"));

        let park = &places[1];
        assert_eq!(park.address, "Dolores St, San Francisco, US");
        assert!(park.field("checkin_comments").is_none());
    }

    #[test]
    fn test_checkins_without_timestamp_are_not_visit_dates() {
        let json = r#"{"checkins": [
            {"createdAt": 1700000000, "venue": {"id": "v1", "name": "Cafe", "location": {"lat": 1.0, "lng": 1.0}}},
            {"venue": {"id": "v1", "name": "Cafe", "location": {"lat": 1.0, "lng": 1.0}}},
            {"venue": {"id": "v2", "name": "Bar", "location": {"lat": 2.0, "lng": 2.0}}}
        ]}"#;
        let places = FoursquareSource::new()
            .import_from_data(json.as_bytes(), SourceFormat::Json)
            .unwrap();

        let cafe = &places[0];
        assert_eq!(cafe.field("my_checkins_count"), Some(&FieldValue::Number(2.0)));
        assert_eq!(cafe.field("first_visit").map(|v| v.to_string()), Some("2023-11-14".to_string()));
        assert_eq!(cafe.field("last_visit").map(|v| v.to_string()), Some("2023-11-14".to_string()));

        let bar = &places[1];
        assert!(bar.field("first_visit").is_none());
        assert!(bar.field("last_visit").is_none());
    }

    #[test]
    fn test_missing_checkins_is_unrecognized() {
        let result = FoursquareSource::new().import_from_data(br#"{"venues": []}"#, SourceFormat::Json);
        assert!(matches!(result, Err(SourceError::Unrecognized(_))));
    }

    #[test]
    fn test_csv_not_supported() {
        let result = FoursquareSource::new().import_from_data(b"a,b", SourceFormat::Csv);
        assert!(matches!(result, Err(SourceError::UnsupportedFormat { .. })));
    }
}
