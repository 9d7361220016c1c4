//! Duplicate resolution for incoming places
//!
//! Finds the stored place an incoming record refers to, if any.

use placeli_common::db::PlaceStore;
use placeli_common::{Place, Result};
use std::cmp::Ordering;
use std::collections::HashSet;

/// Why a stored place was taken as a duplicate, strongest first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum MatchReason {
    /// Identical name, address, coordinates and provider id
    SourceHash,
    /// Same non-empty provider id
    ProviderId,
    /// Within the proximity tolerance on both axes
    Proximity,
}

impl MatchReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchReason::SourceHash => "source hash",
            MatchReason::ProviderId => "provider id",
            MatchReason::Proximity => "proximity",
        }
    }
}

/// Stored place matched by an incoming record
#[derive(Debug, Clone, PartialEq)]
pub struct DuplicateMatch {
    pub place: Place,
    pub reason: MatchReason,
}

/// Duplicate resolver
pub struct DuplicateResolver<'a> {
    store: &'a dyn PlaceStore,
}

impl<'a> DuplicateResolver<'a> {
    pub fn new(store: &'a dyn PlaceStore) -> Self {
        Self { store }
    }

    /// Best match for `place`
    ///
    /// **Algorithm:**
    /// 1. Exact `source_hash` hit → returned immediately
    /// 2. Otherwise the first of the ranked candidates (see [`Self::find_candidates`])
    pub async fn find_existing(&self, place: &Place) -> Result<Option<DuplicateMatch>> {
        if let Some(hit) = self.find_by_hash(place).await? {
            tracing::debug!(place_id = %hit.id, "Exact source hash match");
            return Ok(Some(DuplicateMatch {
                place: hit,
                reason: MatchReason::SourceHash,
            }));
        }

        Ok(self.ranked_candidates(place, HashSet::new()).await?.into_iter().next())
    }

    /// Every stored place that may be the same as `place`, best first
    ///
    /// Ranking: source hash, then provider id, then proximity (nearest
    /// first). Ties keep storage order (most recently updated first). Each
    /// stored place appears once, under its strongest reason.
    pub async fn find_candidates(&self, place: &Place) -> Result<Vec<DuplicateMatch>> {
        let mut matches = Vec::new();
        let mut seen = HashSet::new();
        if let Some(hit) = self.find_by_hash(place).await? {
            seen.insert(hit.id.clone());
            matches.push(DuplicateMatch {
                place: hit,
                reason: MatchReason::SourceHash,
            });
        }
        matches.extend(self.ranked_candidates(place, seen).await?);
        Ok(matches)
    }

    async fn find_by_hash(&self, place: &Place) -> Result<Option<Place>> {
        if place.source_hash.is_empty() {
            return Ok(None);
        }
        self.store.find_by_source_hash(&place.source_hash).await
    }

    /// Provider-id and proximity candidates, excluding `seen` ids
    async fn ranked_candidates(&self, place: &Place, mut seen: HashSet<String>) -> Result<Vec<DuplicateMatch>> {
        let mut matches: Vec<DuplicateMatch> = self
            .store
            .find_candidates(place)
            .await?
            .into_iter()
            .filter(|candidate| place.is_duplicate_candidate_of(candidate))
            .filter(|candidate| seen.insert(candidate.id.clone()))
            .map(|candidate| {
                let reason = if !place.provider_id.is_empty() && candidate.provider_id == place.provider_id {
                    MatchReason::ProviderId
                } else {
                    MatchReason::Proximity
                };
                DuplicateMatch {
                    place: candidate,
                    reason,
                }
            })
            .collect();

        // Stable sort keeps storage order among equals
        matches.sort_by(|a, b| {
            a.reason.cmp(&b.reason).then_with(|| match a.reason {
                MatchReason::Proximity => {
                    let da = a.place.coordinates.distance_sq(&place.coordinates);
                    let db = b.place.coordinates.distance_sq(&place.coordinates);
                    da.partial_cmp(&db).unwrap_or(Ordering::Equal)
                }
                _ => Ordering::Equal,
            })
        });

        if let Some(best) = matches.first() {
            tracing::debug!(
                place_id = %best.place.id,
                reason = best.reason.as_str(),
                candidates = matches.len(),
                "Duplicate candidate found"
            );
        }
        Ok(matches)
    }
}
