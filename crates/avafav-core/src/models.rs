use avafav_store::{DocId, Document};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Cached metadata for one favoritable avatar
///
/// The JSON field names are what the host UI already speaks, so don't rename them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct CacheEntry {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub author_id: String,
    #[serde(default)]
    pub author_name: String,
    #[serde(default)]
    pub image_url: String,
    #[serde(default)]
    pub thumbnail_image_url: String,
    #[serde(default)]
    pub release_status: String,
    #[serde(default)]
    pub platform: String,
    #[serde(default)]
    pub supported_platforms: String,
    #[serde(default)]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: DateTime<Utc>,

    // Join fields - only filled in when this comes back from a favorites listing
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub added_on: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub favorite_id: Option<i64>,
}

impl CacheEntry {
    /// Bare entry with just an id - handy for tests and placeholders
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            author_id: String::new(),
            author_name: String::new(),
            image_url: String::new(),
            thumbnail_image_url: String::new(),
            release_status: String::new(),
            platform: String::new(),
            supported_platforms: String::new(),
            created_at: DateTime::<Utc>::default(),
            updated_at: DateTime::<Utc>::default(),
            category: None,
            added_on: None,
            favorite_id: None,
        }
    }

    /// Copy of this entry with the join fields stripped, i.e. what gets persisted
    pub fn cached_fields(&self) -> Self {
        Self {
            category: None,
            added_on: None,
            favorite_id: None,
            ..self.clone()
        }
    }

    /// Merge a membership's category/timestamp onto this entry
    pub fn joined_with(mut self, membership: &FavoriteMembership) -> Self {
        self.category = Some(membership.category.clone());
        self.added_on = Some(membership.added_on);
        self.favorite_id = Some(membership.id);
        self
    }
}

impl Document for CacheEntry {
    const COLLECTION: &'static str = "avatar_cache";

    fn id(&self) -> DocId {
        DocId::Key(self.id.clone())
    }
}

/// "Item X is in category Y" - one row per (item, category) pair
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct FavoriteMembership {
    /// Assigned by the store on insert; zero until then
    #[serde(rename = "_id", default)]
    pub id: i64,
    pub object_id: String,
    pub category: String,
    pub added_on: DateTime<Utc>,
}

impl FavoriteMembership {
    pub(crate) const OBJECT_ID: &'static str = "ObjectId";
    pub(crate) const CATEGORY: &'static str = "Category";

    /// Fresh membership stamped with the current time
    pub fn new(object_id: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            id: 0,
            object_id: object_id.into(),
            category: category.into(),
            added_on: Utc::now(),
        }
    }
}

impl Document for FavoriteMembership {
    const COLLECTION: &'static str = "favorites";

    fn id(&self) -> DocId {
        if self.id > 0 {
            DocId::Seq(self.id)
        } else {
            DocId::Unassigned
        }
    }

    fn assign_seq(&mut self, seq: i64) {
        self.id = seq;
    }
}

/// A user-defined group of favorites plus how the UI should lay it out
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct Category {
    #[serde(rename = "_id")]
    pub name: String,
    /// Opaque to us - the UI decides what "name" or "date" ordering means
    #[serde(default)]
    pub sort_type: String,
    #[serde(default)]
    pub visible_rows: u32,
}

impl Category {
    pub fn new(name: impl Into<String>, sort_type: impl Into<String>, visible_rows: u32) -> Self {
        Self {
            name: name.into(),
            sort_type: sort_type.into(),
            visible_rows,
        }
    }
}

impl Document for Category {
    const COLLECTION: &'static str = "categories";

    fn id(&self) -> DocId {
        DocId::Key(self.name.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_entry_wire_names() {
        let entry = CacheEntry::new("av_1", "Red Hat");
        let json = serde_json::to_value(&entry).unwrap();

        assert_eq!(json["_id"], "av_1");
        assert_eq!(json["Name"], "Red Hat");
        assert!(json.get("ThumbnailImageUrl").is_some());
        assert!(json.get("CreatedAt").is_some());
        // Join fields stay off the wire until a listing fills them
        assert!(json.get("Category").is_none());
        assert!(json.get("AddedOn").is_none());
    }

    #[test]
    fn test_cache_entry_decodes_sparse_record() {
        let entry: CacheEntry =
            serde_json::from_str(r#"{"_id":"av_1","Name":"Red Hat","Extra":42}"#).unwrap();
        assert_eq!(entry.id, "av_1");
        assert_eq!(entry.name, "Red Hat");
        assert!(entry.description.is_empty());
    }

    #[test]
    fn test_cache_entry_requires_id() {
        assert!(serde_json::from_str::<CacheEntry>(r#"{"Name":"Red Hat"}"#).is_err());
    }

    #[test]
    fn test_join_and_strip() {
        let mut membership = FavoriteMembership::new("av_1", "Hats");
        membership.id = 7;

        let joined = CacheEntry::new("av_1", "Red Hat").joined_with(&membership);
        assert_eq!(joined.category.as_deref(), Some("Hats"));
        assert_eq!(joined.favorite_id, Some(7));
        assert_eq!(joined.added_on, Some(membership.added_on));

        let json = serde_json::to_value(&joined).unwrap();
        assert_eq!(json["Category"], "Hats");
        assert_eq!(json["FavoriteId"], 7);

        let stripped = joined.cached_fields();
        assert!(stripped.category.is_none());
        assert!(stripped.added_on.is_none());
        assert!(stripped.favorite_id.is_none());
    }

    #[test]
    fn test_membership_wire_names() {
        let json = serde_json::to_value(FavoriteMembership::new("av_1", "Hats")).unwrap();
        assert_eq!(json["ObjectId"], "av_1");
        assert_eq!(json["Category"], "Hats");
        assert_eq!(json["_id"], 0);
        assert!(json["AddedOn"].is_string());
        assert_eq!(FavoriteMembership::OBJECT_ID, "ObjectId");
        assert_eq!(FavoriteMembership::CATEGORY, "Category");
    }

    #[test]
    fn test_membership_id_states() {
        let mut membership = FavoriteMembership::new("av_1", "Hats");
        assert_eq!(membership.id(), DocId::Unassigned);
        membership.assign_seq(3);
        assert_eq!(membership.id(), DocId::Seq(3));
    }

    #[test]
    fn test_category_wire_names() {
        let category: Category =
            serde_json::from_str(r#"{"_id":"Hats","SortType":"name","VisibleRows":2}"#).unwrap();
        assert_eq!(category, Category::new("Hats", "name", 2));
        assert_eq!(category.id(), DocId::Key("Hats".to_string()));
    }
}
