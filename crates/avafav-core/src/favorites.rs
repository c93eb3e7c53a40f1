use crate::config::StoreConfig;
use crate::models::{CacheEntry, FavoriteMembership};
use crate::snapshot;
use crate::Result;
use avafav_store::{DocId, Filter, StoreFile, Upserted};
use std::path::PathBuf;
use tracing::{debug, info};

/// Favorites + metadata cache
///
/// Memberships live in the favorites file, cached metadata in the store file.
/// The two are written one after the other, never in a shared transaction: if
/// the favorites file is locked after the cache write went through, the cache
/// row stays and the caller gets the error.
///
/// Mutations always hit the live files. Only listings go through snapshots.
#[derive(Debug, Clone)]
pub struct FavoritesRepository {
    favorites_path: PathBuf,
    store_path: PathBuf,
}

impl FavoritesRepository {
    pub fn new(config: &StoreConfig) -> Self {
        Self {
            favorites_path: config.favorites_path(),
            store_path: config.store_path(),
        }
    }

    /// Cache the item's metadata (last write wins) and put it in `category`.
    ///
    /// Returns true if a new membership was created, false if the item was
    /// already in that category.
    pub fn add_favorite(&self, item: &CacheEntry, category: &str) -> Result<bool> {
        self.write_cache_entry(item)?;

        let favorites = StoreFile::open(&self.favorites_path)?;
        let created = favorites.atomically(|f| {
            let memberships = f.collection::<FavoriteMembership>()?;
            let existing = memberships.find_one(&pair_filter(&item.id, category))?;
            if existing.is_some() {
                return Ok(false);
            }

            memberships.insert(&mut FavoriteMembership::new(item.id.as_str(), category))?;
            Ok(true)
        })?;
        favorites.close()?;

        if created {
            info!("Added {} to '{}'", item.id, category);
        } else {
            debug!("{} already in '{}'", item.id, category);
        }
        Ok(created)
    }

    /// Take the item out of one category. The cached metadata stays.
    pub fn remove_favorite(&self, item_id: &str, category: &str) -> Result<bool> {
        let favorites = StoreFile::open(&self.favorites_path)?;
        let removed = favorites
            .collection::<FavoriteMembership>()?
            .delete_where(&pair_filter(item_id, category))?;
        favorites.close()?;

        if !removed.is_empty() {
            info!("Removed {} from '{}'", item_id, category);
        }
        Ok(!removed.is_empty())
    }

    /// Take the item out of every category; returns the memberships that went away
    pub fn remove_all_favorites(&self, item_id: &str) -> Result<Vec<FavoriteMembership>> {
        let favorites = StoreFile::open(&self.favorites_path)?;
        let removed = favorites
            .collection::<FavoriteMembership>()?
            .delete_where(&Filter::eq(FavoriteMembership::OBJECT_ID, item_id))?;
        favorites.close()?;

        info!("Removed {} from {} categories", item_id, removed.len());
        Ok(removed)
    }

    /// Every membership joined with its cached metadata.
    ///
    /// Memberships whose item has no cache row are skipped. Results come back
    /// in membership insertion order.
    pub fn list_favorites(&self, externally_locked: bool) -> Result<Vec<CacheEntry>> {
        let favorites = snapshot::open_for_read(&self.favorites_path, externally_locked)?;
        let memberships = favorites.collection::<FavoriteMembership>()?.all()?;
        drop(favorites);

        let store = snapshot::open_for_read(&self.store_path, externally_locked)?;
        let cache = store.collection::<CacheEntry>()?;

        let mut joined = Vec::with_capacity(memberships.len());
        for membership in &memberships {
            match cache.get(&DocId::Key(membership.object_id.clone()))? {
                Some(entry) => joined.push(entry.joined_with(membership)),
                None => debug!("No cached metadata for {}, skipping", membership.object_id),
            }
        }

        debug!(
            "Listed {} favorites ({} memberships)",
            joined.len(),
            memberships.len()
        );
        Ok(joined)
    }

    /// Every cached item, favorited or not
    pub fn list_all_cached_items(&self, externally_locked: bool) -> Result<Vec<CacheEntry>> {
        let store = snapshot::open_for_read(&self.store_path, externally_locked)?;
        let items = store.collection::<CacheEntry>()?.all()?;
        Ok(items)
    }

    pub fn get_cached_item(
        &self,
        item_id: &str,
        externally_locked: bool,
    ) -> Result<Option<CacheEntry>> {
        let store = snapshot::open_for_read(&self.store_path, externally_locked)?;
        let item = store
            .collection::<CacheEntry>()?
            .get(&DocId::Key(item_id.to_string()))?;
        Ok(item)
    }

    /// Overwrite cached metadata, but only for items we already know about.
    /// Returns false (and writes nothing) for unknown items.
    pub fn refresh_cache_entry(&self, item: &CacheEntry) -> Result<bool> {
        let store = StoreFile::open(&self.store_path)?;
        let updated = store
            .collection::<CacheEntry>()?
            .update(&item.cached_fields())?;
        store.close()?;

        if updated {
            debug!("Refreshed cached metadata for {}", item.id);
        }
        Ok(updated)
    }

    /// Names of the categories an item is in
    pub fn categories_of(&self, item_id: &str, externally_locked: bool) -> Result<Vec<String>> {
        let favorites = snapshot::open_for_read(&self.favorites_path, externally_locked)?;
        let memberships = favorites
            .collection::<FavoriteMembership>()?
            .find(&Filter::eq(FavoriteMembership::OBJECT_ID, item_id))?;
        Ok(memberships.into_iter().map(|m| m.category).collect())
    }

    fn write_cache_entry(&self, item: &CacheEntry) -> Result<()> {
        let store = StoreFile::open(&self.store_path)?;
        let outcome = store
            .collection::<CacheEntry>()?
            .upsert(&mut item.cached_fields())?;
        store.close()?;

        match outcome {
            Upserted::Inserted => debug!("Cached metadata for {}", item.id),
            Upserted::Updated => debug!("Overwrote cached metadata for {}", item.id),
        }
        Ok(())
    }
}

fn pair_filter(item_id: &str, category: &str) -> Filter {
    Filter::eq(FavoriteMembership::OBJECT_ID, item_id).and(FavoriteMembership::CATEGORY, category)
}
