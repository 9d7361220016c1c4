//! Editing user-authored data across the collection
//!
//! Tags and custom fields belong to the user; imports never change them.
//! Every change here goes through the store, one place at a time.

use placeli_common::db::PlaceStore;
use placeli_common::{Error, FieldType, FieldValue, Place, Result, SystemFieldRules};
use std::collections::BTreeMap;
use tracing::info;

/// Field templates that can be applied to every place
pub const TEMPLATE_NAMES: &[&str] = &["travel", "business", "personal"];

/// Fields added by a template, with their empty values
pub fn template_fields(template: &str) -> Option<Vec<(&'static str, FieldValue)>> {
    let fields = match template {
        "travel" => vec![
            ("visit_date", FieldValue::text("")),
            ("rating_personal", FieldValue::Number(0.0)),
            ("notes_private", FieldValue::text("")),
            ("planned_visit", FieldValue::Boolean(false)),
        ],
        "business" => vec![
            ("last_visited", FieldValue::text("")),
            ("expense_category", FieldValue::text("")),
            ("client_rating", FieldValue::Number(0.0)),
            ("meeting_notes", FieldValue::text("")),
        ],
        "personal" => vec![
            ("favorite", FieldValue::Boolean(false)),
            ("last_meal", FieldValue::text("")),
            ("companion", FieldValue::text("")),
            ("mood_rating", FieldValue::Number(0.0)),
        ],
        _ => return None,
    };
    Some(fields)
}

/// Collection editor
pub struct CollectionEditor<'a> {
    store: &'a dyn PlaceStore,
    rules: &'a SystemFieldRules,
}

impl<'a> CollectionEditor<'a> {
    pub fn new(store: &'a dyn PlaceStore, rules: &'a SystemFieldRules) -> Self {
        Self { store, rules }
    }

    async fn require(&self, id: &str) -> Result<Place> {
        self.store
            .get_by_id(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("place {}", id)))
    }

    /// Save every place for which `edit` reports a change; returns how many
    async fn edit_each(&self, places: Vec<Place>, mut edit: impl FnMut(&mut Place) -> bool) -> Result<usize> {
        let mut changed = 0;
        for mut place in places {
            if edit(&mut place) {
                self.store.save(&mut place).await?;
                changed += 1;
            }
        }
        Ok(changed)
    }

    // ---- Tags ----

    /// Tag name → number of places carrying it
    pub async fn tag_counts(&self) -> Result<BTreeMap<String, usize>> {
        let mut counts = BTreeMap::new();
        for place in self.store.all().await? {
            for tag in place.user_tags {
                *counts.entry(tag).or_insert(0) += 1;
            }
        }
        Ok(counts)
    }

    pub async fn add_tag(&self, id: &str, tag: &str) -> Result<bool> {
        let tag = tag.trim();
        if tag.is_empty() {
            return Err(Error::InvalidInput("tag must not be empty".into()));
        }
        let mut place = self.require(id).await?;
        if !place.add_tag(tag) {
            return Ok(false);
        }
        self.store.save(&mut place).await?;
        Ok(true)
    }

    pub async fn remove_tag(&self, id: &str, tag: &str) -> Result<bool> {
        let mut place = self.require(id).await?;
        if !place.remove_tag(tag) {
            return Ok(false);
        }
        self.store.save(&mut place).await?;
        Ok(true)
    }

    /// Rename a tag on every place; returns the number of places changed
    pub async fn rename_tag(&self, from: &str, to: &str) -> Result<usize> {
        let to = to.trim();
        if to.is_empty() {
            return Err(Error::InvalidInput("new tag name must not be empty".into()));
        }
        let changed = self
            .edit_each(self.store.all().await?, |place| place.rename_tag(from, to))
            .await?;
        info!(from, to, places = changed, "Renamed tag");
        Ok(changed)
    }

    pub async fn delete_tag(&self, tag: &str) -> Result<usize> {
        let changed = self
            .edit_each(self.store.all().await?, |place| place.remove_tag(tag))
            .await?;
        info!(tag, places = changed, "Deleted tag");
        Ok(changed)
    }

    /// Tag every place matching `filter` (all places when `None`)
    pub async fn apply_tag(&self, tag: &str, filter: Option<&str>) -> Result<usize> {
        let tag = tag.trim();
        if tag.is_empty() {
            return Err(Error::InvalidInput("tag must not be empty".into()));
        }
        let places = match filter.map(str::trim).filter(|f| !f.is_empty()) {
            Some(query) => self.store.search(query).await?,
            None => self.store.all().await?,
        };
        let changed = self.edit_each(places, |place| place.add_tag(tag)).await?;
        info!(tag, places = changed, "Applied tag");
        Ok(changed)
    }

    // ---- Custom fields ----

    /// Set a user field from a raw string
    ///
    /// An existing field keeps its type and the value must parse as that
    /// type; a new field's type is inferred. System fields are read-only.
    pub async fn set_field(&self, id: &str, name: &str, raw: &str) -> Result<FieldValue> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::InvalidInput("field name must not be empty".into()));
        }
        if self.rules.is_system(name) {
            return Err(Error::InvalidInput(format!("'{}' is managed by imports", name)));
        }

        let mut place = self.require(id).await?;
        let value = match place.field(name) {
            Some(existing) => FieldValue::parse_as(raw, existing.field_type())?,
            None => FieldValue::infer(raw),
        };
        place.set_field(name, value.clone());
        self.store.save(&mut place).await?;
        Ok(value)
    }

    /// Add an empty field of the given type unless it exists
    pub async fn add_field(&self, id: &str, name: &str, field_type: FieldType) -> Result<bool> {
        let name = name.trim();
        if name.is_empty() || self.rules.is_system(name) {
            return Err(Error::InvalidInput(format!("'{}' cannot be added as a user field", name)));
        }
        let mut place = self.require(id).await?;
        if place.field(name).is_some() {
            return Ok(false);
        }
        place.set_field(name, FieldValue::default_for(field_type));
        self.store.save(&mut place).await?;
        Ok(true)
    }

    pub async fn remove_field(&self, id: &str, name: &str) -> Result<bool> {
        let mut place = self.require(id).await?;
        if place.remove_field(name).is_none() {
            return Ok(false);
        }
        self.store.save(&mut place).await?;
        Ok(true)
    }

    /// User field name → number of places carrying it
    pub async fn field_usage(&self) -> Result<BTreeMap<String, usize>> {
        let mut usage = BTreeMap::new();
        for place in self.store.all().await? {
            for name in place.custom_fields.into_keys() {
                if self.rules.is_user(&name) {
                    *usage.entry(name).or_insert(0) += 1;
                }
            }
        }
        Ok(usage)
    }

    /// Add a template's missing fields to every place; returns places changed
    pub async fn apply_template(&self, template: &str) -> Result<usize> {
        let fields = template_fields(template).ok_or_else(|| {
            Error::InvalidInput(format!(
                "unknown template '{}' (available: {})",
                template,
                TEMPLATE_NAMES.join(", ")
            ))
        })?;

        let changed = self
            .edit_each(self.store.all().await?, |place| {
                let mut added = false;
                for (name, value) in &fields {
                    if place.field(name).is_none() {
                        place.set_field(*name, value.clone());
                        added = true;
                    }
                }
                added
            })
            .await?;
        info!(template, places = changed, "Applied field template");
        Ok(changed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use placeli_common::db::{create_schema, SqlitePlaceStore};
    use placeli_common::Coordinates;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn setup_store() -> SqlitePlaceStore {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        create_schema(&pool).await.unwrap();
        SqlitePlaceStore::new(pool)
    }

    async fn add_place(store: &SqlitePlaceStore, provider_id: &str, name: &str, tags: &[&str]) -> Place {
        let mut place = Place::new(provider_id, name, "", Coordinates::new(1.0, provider_id.len() as f64));
        place.user_tags = tags.iter().map(|t| t.to_string()).collect();
        store.save(&mut place).await.unwrap();
        place
    }

    #[tokio::test]
    async fn test_tag_operations() {
        let store = setup_store().await;
        let rules = SystemFieldRules::default();
        let editor = CollectionEditor::new(&store, &rules);
        let a = add_place(&store, "a", "Pizza Place", &["food", "nyc"]).await;
        add_place(&store, "bb", "Bakery", &["food"]).await;
        add_place(&store, "ccc", "Museum", &[]).await;

        let counts = editor.tag_counts().await.unwrap();
        assert_eq!(counts.get("food"), Some(&2));
        assert_eq!(counts.get("nyc"), Some(&1));

        assert_eq!(editor.rename_tag("food", "eats").await.unwrap(), 2);
        assert_eq!(editor.delete_tag("nyc").await.unwrap(), 1);
        assert_eq!(editor.apply_tag("visited", Some("pizza")).await.unwrap(), 1);
        assert_eq!(editor.apply_tag("all", None).await.unwrap(), 3);

        let a = store.get_by_id(&a.id).await.unwrap().unwrap();
        assert_eq!(a.user_tags, vec!["eats", "visited", "all"]);

        assert!(!editor.add_tag(&a.id, "eats").await.unwrap());
        assert!(editor.remove_tag(&a.id, "eats").await.unwrap());
        assert!(matches!(editor.add_tag("missing", "x").await, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn test_set_field_types() {
        let store = setup_store().await;
        let rules = SystemFieldRules::default();
        let editor = CollectionEditor::new(&store, &rules);
        let place = add_place(&store, "a", "Cafe", &[]).await;

        assert_eq!(editor.set_field(&place.id, "visits", "3").await.unwrap(), FieldValue::Number(3.0));
        // Existing numeric field rejects text
        assert!(editor.set_field(&place.id, "visits", "often").await.is_err());
        assert_eq!(editor.set_field(&place.id, "visits", "4").await.unwrap(), FieldValue::Number(4.0));
        assert_eq!(editor.set_field(&place.id, "wifi", "TRUE").await.unwrap(), FieldValue::Boolean(true));
        assert!(editor.set_field(&place.id, "osm_cuisine", "x").await.is_err());

        assert!(editor.add_field(&place.id, "companions", FieldType::List).await.unwrap());
        assert!(!editor.add_field(&place.id, "visits", FieldType::Text).await.unwrap());

        let stored = store.get_by_id(&place.id).await.unwrap().unwrap();
        assert_eq!(stored.field("visits"), Some(&FieldValue::Number(4.0)));
        assert_eq!(stored.field("companions"), Some(&FieldValue::List(vec![])));

        assert!(editor.remove_field(&place.id, "wifi").await.unwrap());
        assert!(!editor.remove_field(&place.id, "wifi").await.unwrap());
    }

    #[tokio::test]
    async fn test_field_usage_ignores_system_fields() {
        let store = setup_store().await;
        let rules = SystemFieldRules::default();
        let editor = CollectionEditor::new(&store, &rules);

        let mut place = Place::new("a", "Cafe", "", Coordinates::new(1.0, 1.0));
        place.set_field("imported_from", "takeout");
        place.set_field("google_maps_url", "https://maps.google.com/?cid=1");
        place.set_field("visited", true);
        store.save(&mut place).await.unwrap();

        let usage = editor.field_usage().await.unwrap();
        assert_eq!(usage.len(), 1);
        assert_eq!(usage.get("visited"), Some(&1));
    }

    #[tokio::test]
    async fn test_apply_template() {
        let store = setup_store().await;
        let rules = SystemFieldRules::default();
        let editor = CollectionEditor::new(&store, &rules);
        let mut place = Place::new("a", "Cafe", "", Coordinates::new(1.0, 1.0));
        place.set_field("favorite", true);
        store.save(&mut place).await.unwrap();

        assert_eq!(editor.apply_template("personal").await.unwrap(), 1);
        // Second application has nothing left to add
        assert_eq!(editor.apply_template("personal").await.unwrap(), 0);

        let stored = store.get_by_id(&place.id).await.unwrap().unwrap();
        assert_eq!(stored.field("favorite"), Some(&FieldValue::Boolean(true)));
        assert_eq!(stored.field("mood_rating"), Some(&FieldValue::Number(0.0)));

        assert!(matches!(editor.apply_template("holiday").await, Err(Error::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_business_template_leaves_checkin_dates_alone() {
        let store = setup_store().await;
        let rules = SystemFieldRules::default();
        let editor = CollectionEditor::new(&store, &rules);
        let visited = FieldValue::parse_as("2024-03-09", FieldType::Date).unwrap();
        let mut place = Place::new("4sq_v1", "Cafe", "", Coordinates::new(1.0, 1.0));
        place.set_field("last_visit", visited.clone());
        store.save(&mut place).await.unwrap();

        assert_eq!(editor.apply_template("business").await.unwrap(), 1);

        let stored = store.get_by_id(&place.id).await.unwrap().unwrap();
        assert_eq!(stored.field("last_visit"), Some(&visited));
        assert_eq!(stored.field("last_visited"), Some(&FieldValue::text("")));
        for (name, _) in template_fields("business").unwrap() {
            assert_ne!(name, "last_visit");
        }
    }
}
