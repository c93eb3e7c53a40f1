// JSON boundary for the host UI.
//
// Records come in as JSON strings and lists go back out as JSON arrays. Input is
// fully decoded before any file is opened, so a malformed record never leaves a
// half-applied change behind.

use crate::models::{CacheEntry, Category};
use crate::{AvatarStore, Error, Result};
use serde::Serialize;

/// String-in, string-out wrapper over an `AvatarStore`
pub struct Bridge {
    store: AvatarStore,
}

impl Bridge {
    pub fn new(store: AvatarStore) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &AvatarStore {
        &self.store
    }

    /// `item_json` is a CacheEntry record
    pub fn add_favorite(&self, item_json: &str, category: &str) -> Result<()> {
        let item: CacheEntry = serde_json::from_str(item_json)?;
        self.store.favorites().add_favorite(&item, category)?;
        Ok(())
    }

    pub fn remove_favorite(&self, item_id: &str, category: &str) -> Result<bool> {
        self.store.favorites().remove_favorite(item_id, category)
    }

    /// JSON array of the removed FavoriteMembership records
    pub fn remove_all_favorites(&self, item_id: &str) -> Result<String> {
        let removed = self.store.favorites().remove_all_favorites(item_id)?;
        encode(&removed)
    }

    /// `item_json` is a CacheEntry record; true if the item was already cached
    pub fn refresh_cache_entry(&self, item_json: &str) -> Result<bool> {
        let item: CacheEntry = serde_json::from_str(item_json)?;
        self.store.favorites().refresh_cache_entry(&item)
    }

    pub fn list_favorites(&self, game_running: bool) -> Result<String> {
        let favorites = self.store.favorites().list_favorites(game_running)?;
        encode(&favorites)
    }

    pub fn list_cached_items(&self, game_running: bool) -> Result<String> {
        let items = self.store.favorites().list_all_cached_items(game_running)?;
        encode(&items)
    }

    /// `category_json` is a Category record
    pub fn upsert_category(&self, category_json: &str) -> Result<()> {
        let category: Category = serde_json::from_str(category_json)?;
        self.store.categories().upsert_category(&category)?;
        Ok(())
    }

    pub fn remove_category(&self, name: &str) -> Result<bool> {
        self.store.categories().remove_category(name)
    }

    pub fn list_categories(&self, game_running: bool) -> Result<String> {
        let categories = self.store.categories().list_categories(game_running)?;
        encode(&categories)
    }
}

/// Output side of the boundary. Failures here are ours, not the caller's input.
fn encode<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    serde_json::to_string(value).map_err(Error::Encoding)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoreConfig;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn bridge() -> (TempDir, Bridge) {
        let dir = TempDir::new().unwrap();
        let store = AvatarStore::open(StoreConfig::in_dir(dir.path())).unwrap();
        (dir, Bridge::new(store))
    }

    #[test]
    fn test_red_hat_round_trip() {
        let (_dir, bridge) = bridge();

        bridge
            .add_favorite(r#"{"_id":"av_1","Name":"Red Hat"}"#, "Hats")
            .unwrap();

        let listed: serde_json::Value =
            serde_json::from_str(&bridge.list_favorites(false).unwrap()).unwrap();
        assert_eq!(listed.as_array().unwrap().len(), 1);
        assert_eq!(listed[0]["Name"], "Red Hat");
        assert_eq!(listed[0]["Category"], "Hats");
        assert!(listed[0]["AddedOn"].is_string());

        assert!(bridge.remove_favorite("av_1", "Hats").unwrap());
        assert_eq!(bridge.list_favorites(false).unwrap(), "[]");

        let cached: serde_json::Value =
            serde_json::from_str(&bridge.list_cached_items(false).unwrap()).unwrap();
        assert_eq!(cached[0]["Name"], "Red Hat");
        assert!(cached[0].get("Category").is_none());
    }

    #[test]
    fn test_malformed_record_changes_nothing() {
        let (_dir, bridge) = bridge();

        let err = bridge.add_favorite(r#"{"Name":"No Id"}"#, "Hats").unwrap_err();
        assert!(matches!(err, Error::MalformedInput(_)));

        let err = bridge.upsert_category("not json").unwrap_err();
        assert!(matches!(err, Error::MalformedInput(_)));

        assert_eq!(bridge.list_cached_items(false).unwrap(), "[]");
        assert_eq!(bridge.list_categories(false).unwrap(), "[]");
    }

    #[test]
    fn test_remove_all_returns_membership_records() {
        let (_dir, bridge) = bridge();
        bridge
            .add_favorite(r#"{"_id":"av_1","Name":"Red Hat"}"#, "Hats")
            .unwrap();
        bridge
            .add_favorite(r#"{"_id":"av_1","Name":"Red Hat"}"#, "Red")
            .unwrap();

        let removed: serde_json::Value =
            serde_json::from_str(&bridge.remove_all_favorites("av_1").unwrap()).unwrap();
        let removed = removed.as_array().unwrap();
        assert_eq!(removed.len(), 2);
        assert_eq!(removed[0]["ObjectId"], "av_1");
        assert_eq!(removed[1]["Category"], "Red");
    }

    #[test]
    fn test_category_calls() {
        let (_dir, bridge) = bridge();
        bridge
            .upsert_category(r#"{"_id":"Hats","SortType":"name","VisibleRows":3}"#)
            .unwrap();

        let listed: serde_json::Value =
            serde_json::from_str(&bridge.list_categories(true).unwrap()).unwrap();
        assert_eq!(listed[0]["_id"], "Hats");
        assert_eq!(listed[0]["VisibleRows"], 3);

        assert!(bridge.remove_category("Hats").unwrap());
        assert!(!bridge.remove_category("Hats").unwrap());
    }

    #[test]
    fn test_refresh_through_bridge() {
        let (_dir, bridge) = bridge();
        assert!(!bridge
            .refresh_cache_entry(r#"{"_id":"av_1","Name":"Red Hat"}"#)
            .unwrap());
    }

    #[test]
    fn test_encode_failure_is_not_malformed_input() {
        // JSON object keys must be strings, so tuple keys can't be encoded
        let mut bad = HashMap::new();
        bad.insert((1, 2), "x");

        let err = encode(&bad).unwrap_err();
        assert!(matches!(err, Error::Encoding(_)));
        assert_eq!(encode(&vec!["ok"]).unwrap(), r#"["ok"]"#);
    }
}
