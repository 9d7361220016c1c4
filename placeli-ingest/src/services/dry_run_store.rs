//! Staging view of storage for dry runs
//!
//! Writes land in memory and are visible to later reads through the same
//! view; the wrapped store is only ever read.

use async_trait::async_trait;
use chrono::Utc;
use placeli_common::db::PlaceStore;
use placeli_common::{Place, Result};
use std::collections::HashSet;
use tokio::sync::Mutex;

#[derive(Default)]
struct Staged {
    /// Saved during the dry run, in save order
    places: Vec<Place>,
    /// Deleted during the dry run
    removed: HashSet<String>,
}

impl Staged {
    fn get(&self, id: &str) -> Option<&Place> {
        self.places.iter().find(|p| p.id == id)
    }

    /// Whether a stored row is hidden by a staged write or delete
    fn shadows(&self, id: &str) -> bool {
        self.removed.contains(id) || self.get(id).is_some()
    }
}

/// Read-through, write-nowhere [`PlaceStore`]
pub struct DryRunStore<'a> {
    inner: &'a dyn PlaceStore,
    staged: Mutex<Staged>,
}

impl<'a> DryRunStore<'a> {
    pub fn new(inner: &'a dyn PlaceStore) -> Self {
        Self {
            inner,
            staged: Mutex::new(Staged::default()),
        }
    }

    /// Number of places that would have been written
    pub async fn staged_count(&self) -> usize {
        self.staged.lock().await.places.len()
    }

    /// Staged places first (newest first), then visible stored rows
    async fn overlay(&self, stored: Vec<Place>, keep: impl Fn(&Place) -> bool) -> Vec<Place> {
        let staged = self.staged.lock().await;
        let mut places: Vec<Place> = staged.places.iter().rev().filter(|p| keep(p)).cloned().collect();
        places.extend(stored.into_iter().filter(|p| !staged.shadows(&p.id)));
        places
    }
}

#[async_trait]
impl PlaceStore for DryRunStore<'_> {
    async fn get_by_id(&self, id: &str) -> Result<Option<Place>> {
        {
            let staged = self.staged.lock().await;
            if staged.removed.contains(id) {
                return Ok(None);
            }
            if let Some(place) = staged.get(id) {
                return Ok(Some(place.clone()));
            }
        }
        self.inner.get_by_id(id).await
    }

    async fn list(&self, limit: usize, offset: usize) -> Result<Vec<Place>> {
        let all = self.all().await?;
        Ok(all.into_iter().skip(offset).take(limit).collect())
    }

    async fn all(&self) -> Result<Vec<Place>> {
        let stored = self.inner.all().await?;
        Ok(self.overlay(stored, |_| true).await)
    }

    async fn search(&self, query: &str) -> Result<Vec<Place>> {
        let stored = self.inner.search(query).await?;
        let needle = query.to_lowercase();
        Ok(self
            .overlay(stored, |p| {
                [&p.name, &p.address, &p.user_notes]
                    .iter()
                    .any(|field| field.to_lowercase().contains(&needle))
            })
            .await)
    }

    async fn save(&self, place: &mut Place) -> Result<()> {
        let now = Utc::now();
        if place.created_at.is_none() {
            place.created_at = match self.get_by_id(&place.id).await? {
                Some(existing) => existing.created_at.or(Some(now)),
                None => Some(now),
            };
        }
        place.updated_at = Some(now);

        let mut staged = self.staged.lock().await;
        staged.removed.remove(&place.id);
        staged.places.retain(|p| p.id != place.id);
        staged.places.push(place.clone());
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        let existed = self.get_by_id(id).await?.is_some();
        let mut staged = self.staged.lock().await;
        staged.places.retain(|p| p.id != id);
        staged.removed.insert(id.to_string());
        Ok(existed)
    }

    async fn find_by_source_hash(&self, hash: &str) -> Result<Option<Place>> {
        {
            let staged = self.staged.lock().await;
            if let Some(place) = staged.places.iter().rev().find(|p| p.source_hash == hash) {
                return Ok(Some(place.clone()));
            }
        }
        let stored = self.inner.find_by_source_hash(hash).await?;
        let staged = self.staged.lock().await;
        Ok(stored.filter(|p| !staged.shadows(&p.id)))
    }

    async fn find_candidates(&self, place: &Place) -> Result<Vec<Place>> {
        let stored = self.inner.find_candidates(place).await?;
        Ok(self.overlay(stored, |p| place.is_duplicate_candidate_of(p)).await)
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.all().await?.len())
    }
}
