use crate::config::StoreConfig;
use crate::models::{Category, FavoriteMembership};
use crate::snapshot;
use crate::Result;
use avafav_store::{DocId, Filter, StoreFile, Upserted};
use std::path::PathBuf;
use tracing::info;

/// Category definitions, stored next to the memberships in the favorites file
#[derive(Debug, Clone)]
pub struct CategoryRepository {
    favorites_path: PathBuf,
}

impl CategoryRepository {
    pub fn new(config: &StoreConfig) -> Self {
        Self {
            favorites_path: config.favorites_path(),
        }
    }

    /// Insert, or fully overwrite the category with the same name
    pub fn upsert_category(&self, category: &Category) -> Result<Upserted> {
        let favorites = StoreFile::open(&self.favorites_path)?;
        let outcome = favorites
            .collection::<Category>()?
            .upsert(&mut category.clone())?;
        favorites.close()?;

        info!("Saved category '{}' ({:?})", category.name, outcome);
        Ok(outcome)
    }

    /// Delete a category and every membership pointing at it.
    ///
    /// Both collections share the favorites file, so the cascade runs in one
    /// transaction: either the category and its memberships all go, or nothing
    /// does. Returns false if there was no such category (memberships are left
    /// alone in that case).
    pub fn remove_category(&self, name: &str) -> Result<bool> {
        let favorites = StoreFile::open(&self.favorites_path)?;
        let cascaded = favorites.atomically(|f| {
            if !f.collection::<Category>()?.delete(&DocId::Key(name.to_string()))? {
                return Ok(None);
            }

            let removed = f
                .collection::<FavoriteMembership>()?
                .delete_where(&Filter::eq(FavoriteMembership::CATEGORY, name))?;
            Ok(Some(removed.len()))
        })?;
        favorites.close()?;

        match cascaded {
            Some(count) => {
                info!("Removed category '{}' and {} memberships", name, count);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn list_categories(&self, externally_locked: bool) -> Result<Vec<Category>> {
        let favorites = snapshot::open_for_read(&self.favorites_path, externally_locked)?;
        let categories = favorites.collection::<Category>()?.all()?;
        Ok(categories)
    }

    pub fn get_category(&self, name: &str, externally_locked: bool) -> Result<Option<Category>> {
        let favorites = snapshot::open_for_read(&self.favorites_path, externally_locked)?;
        let category = favorites
            .collection::<Category>()?
            .get(&DocId::Key(name.to_string()))?;
        Ok(category)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::favorites::FavoritesRepository;
    use crate::models::CacheEntry;
    use tempfile::TempDir;

    fn setup() -> (TempDir, CategoryRepository, FavoritesRepository) {
        let dir = TempDir::new().unwrap();
        let config = StoreConfig::in_dir(dir.path());
        (
            dir,
            CategoryRepository::new(&config),
            FavoritesRepository::new(&config),
        )
    }

    #[test]
    fn test_upsert_overwrites() {
        let (_dir, categories, _) = setup();

        assert_eq!(
            categories
                .upsert_category(&Category::new("Hats", "name", 2))
                .unwrap(),
            Upserted::Inserted
        );
        assert_eq!(
            categories
                .upsert_category(&Category::new("Hats", "date", 4))
                .unwrap(),
            Upserted::Updated
        );

        assert_eq!(
            categories.list_categories(false).unwrap(),
            vec![Category::new("Hats", "date", 4)]
        );
    }

    #[test]
    fn test_remove_category_cascades() {
        let (_dir, categories, favorites) = setup();
        categories
            .upsert_category(&Category::new("X", "name", 1))
            .unwrap();
        categories
            .upsert_category(&Category::new("Y", "name", 1))
            .unwrap();
        for (id, cat) in [("A", "X"), ("B", "X"), ("C", "Y")] {
            favorites
                .add_favorite(&CacheEntry::new(id, id), cat)
                .unwrap();
        }

        assert!(categories.remove_category("X").unwrap());

        let left = favorites.list_favorites(false).unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].id, "C");
        assert_eq!(left[0].category.as_deref(), Some("Y"));
        assert!(categories.get_category("X", false).unwrap().is_none());
    }

    #[test]
    fn test_remove_missing_category_leaves_memberships() {
        let (_dir, categories, favorites) = setup();
        favorites
            .add_favorite(&CacheEntry::new("A", "A"), "Loose")
            .unwrap();

        assert!(!categories.remove_category("Loose").unwrap());
        assert_eq!(favorites.list_favorites(false).unwrap().len(), 1);
    }

    #[test]
    fn test_get_category_through_snapshot() {
        let (_dir, categories, _) = setup();
        categories
            .upsert_category(&Category::new("Hats", "name", 2))
            .unwrap();

        assert_eq!(
            categories.get_category("Hats", true).unwrap(),
            Some(Category::new("Hats", "name", 2))
        );
        assert!(categories.get_category("Shoes", true).unwrap().is_none());
    }

    #[test]
    fn test_failed_cascade_keeps_category() {
        let (dir, categories, favorites) = setup();
        categories
            .upsert_category(&Category::new("X", "name", 1))
            .unwrap();
        favorites
            .add_favorite(&CacheEntry::new("A", "A"), "X")
            .unwrap();

        // A membership row that can't be scanned makes the cascade step fail
        let raw = rusqlite::Connection::open(dir.path().join("favorites.db")).unwrap();
        raw.execute(
            "INSERT INTO favorites (key, data) VALUES (NULL, '{\"Category\":\"X\",')",
            [],
        )
        .unwrap();
        drop(raw);

        assert!(categories.remove_category("X").is_err());
        assert_eq!(
            categories.get_category("X", false).unwrap(),
            Some(Category::new("X", "name", 1))
        );
    }
}
