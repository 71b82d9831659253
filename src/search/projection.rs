//! Search projections
//!
//! Maps raw store documents to the flat records kept in the search index.
//! Every field is always present: missing or mistyped source fields take
//! their default (empty string, empty array, 0, false) and timestamps are
//! flattened to epoch seconds.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value as JsonValue;

use crate::db::schemas::{
    Timestamp, COLLECTION_COLLECTION, COMPONENT_COLLECTION, USER_COLLECTION,
};

/// The three mirrored entity types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexKind {
    Components,
    Users,
    Collections,
}

impl IndexKind {
    pub const ALL: [IndexKind; 3] = [Self::Components, Self::Users, Self::Collections];

    /// Source collection in the document store
    pub fn collection(&self) -> &'static str {
        match self {
            Self::Components => COMPONENT_COLLECTION,
            Self::Users => USER_COLLECTION,
            Self::Collections => COLLECTION_COLLECTION,
        }
    }

    /// Index name in the search service
    pub fn index_name(&self) -> &'static str {
        match self {
            Self::Components => "components",
            Self::Users => "users",
            Self::Collections => "collections",
        }
    }

    pub fn from_collection(collection: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.collection() == collection)
    }

    /// Project a source document into its search record
    pub fn project(&self, id: &str, data: &JsonValue, now: DateTime<Utc>) -> JsonValue {
        let record = match self {
            Self::Components => serde_json::to_value(ComponentRecord::project(id, data, now)),
            Self::Users => serde_json::to_value(UserRecord::project(id, data, now)),
            Self::Collections => serde_json::to_value(CollectionRecord::project(id, data, now)),
        };
        // Records are plain structs of strings and numbers
        record.unwrap_or(JsonValue::Null)
    }
}

// =============================================================================
// Field readers with defaults
// =============================================================================

fn text(data: &JsonValue, key: &str) -> String {
    data.get(key)
        .and_then(JsonValue::as_str)
        .unwrap_or_default()
        .to_string()
}

fn strings(data: &JsonValue, key: &str) -> Vec<String> {
    data.get(key)
        .and_then(JsonValue::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

fn int(data: &JsonValue, key: &str) -> Option<i64> {
    let value = data.get(key)?;
    value
        .as_i64()
        .or_else(|| value.as_f64().map(|f| f.round() as i64))
}

fn float(data: &JsonValue, key: &str) -> f64 {
    data.get(key).and_then(JsonValue::as_f64).unwrap_or(0.0)
}

fn flag(data: &JsonValue, key: &str) -> bool {
    data.get(key).and_then(JsonValue::as_bool).unwrap_or(false)
}

/// Flatten a stored timestamp to epoch seconds, using `now` when absent
pub fn flatten_timestamp(value: Option<&JsonValue>, now: DateTime<Utc>) -> i64 {
    value
        .and_then(Timestamp::from_json)
        .map(|ts| ts.seconds)
        .unwrap_or_else(|| now.timestamp())
}

fn epoch(data: &JsonValue, key: &str, now: DateTime<Utc>) -> i64 {
    flatten_timestamp(data.get(key), now)
}

// =============================================================================
// Records
// =============================================================================

/// Search record for a component
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentRecord {
    pub id: String,
    pub title: String,
    pub description: String,
    pub category: String,
    pub framework: String,
    pub language: String,
    pub styling: String,
    pub source_type: String,
    pub tags: Vec<String>,
    pub author_id: String,
    pub author_name: String,
    pub preview_image: String,
    pub views: i64,
    pub downloads: i64,
    pub likes: i64,
    pub rating: f64,
    pub is_public: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

impl ComponentRecord {
    pub fn project(id: &str, data: &JsonValue, now: DateTime<Utc>) -> Self {
        Self {
            id: id.to_string(),
            title: text(data, "title"),
            description: text(data, "description"),
            category: text(data, "category"),
            framework: text(data, "framework"),
            language: text(data, "language"),
            styling: text(data, "styling"),
            source_type: text(data, "sourceType"),
            tags: strings(data, "tags"),
            author_id: text(data, "authorId"),
            author_name: text(data, "authorName"),
            preview_image: text(data, "previewImage"),
            views: int(data, "views").unwrap_or(0),
            downloads: int(data, "downloads")
                .or_else(|| int(data, "copies"))
                .unwrap_or(0),
            likes: int(data, "likes").unwrap_or(0),
            rating: float(data, "rating"),
            is_public: flag(data, "isPublic"),
            created_at: epoch(data, "createdAt", now),
            updated_at: epoch(data, "updatedAt", now),
        }
    }
}

/// Search record for a user
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    pub id: String,
    pub display_name: String,
    pub username: String,
    pub bio: String,
    pub avatar: String,
    pub followers: i64,
    pub following: i64,
    pub total_components: i64,
    pub total_likes: i64,
    pub created_at: i64,
}

impl UserRecord {
    pub fn project(id: &str, data: &JsonValue, now: DateTime<Utc>) -> Self {
        Self {
            id: id.to_string(),
            display_name: text(data, "displayName"),
            username: text(data, "username"),
            bio: text(data, "bio"),
            avatar: text(data, "avatar"),
            followers: int(data, "followers").unwrap_or(0),
            following: int(data, "following").unwrap_or(0),
            total_components: int(data, "totalComponents").unwrap_or(0),
            total_likes: int(data, "totalLikes").unwrap_or(0),
            created_at: epoch(data, "createdAt", now),
        }
    }
}

/// Search record for a collection
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionRecord {
    pub id: String,
    pub name: String,
    pub description: String,
    pub user_id: String,
    pub component_count: usize,
    pub is_public: bool,
    pub likes: i64,
    pub created_at: i64,
    pub updated_at: i64,
}

impl CollectionRecord {
    pub fn project(id: &str, data: &JsonValue, now: DateTime<Utc>) -> Self {
        Self {
            id: id.to_string(),
            name: text(data, "name"),
            description: text(data, "description"),
            user_id: text(data, "userId"),
            component_count: data
                .get("componentIds")
                .and_then(JsonValue::as_array)
                .map(Vec::len)
                .unwrap_or(0),
            is_public: flag(data, "isPublic"),
            likes: int(data, "likes").unwrap_or(0),
            created_at: epoch(data, "createdAt", now),
            updated_at: epoch(data, "updatedAt", now),
        }
    }
}
