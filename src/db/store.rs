//! Document store abstraction
//!
//! Handlers and services talk to `dyn DocumentStore`, never to a concrete
//! client. `MongoStore` backs production; `MemoryStore` backs dev mode and
//! tests. Documents are schemaless JSON objects keyed by a string ID per
//! collection. Every successful write is published as a [`ChangeEvent`].

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value as JsonValue;
use std::cmp::Ordering;
use tokio::sync::broadcast;

use crate::types::VaultError;

/// Capacity of the change event broadcast channel
pub const CHANGE_CHANNEL_CAPACITY: usize = 1024;

/// A document read from the store
#[derive(Debug, Clone, PartialEq)]
pub struct StoredDoc {
    pub id: String,
    pub data: JsonValue,
}

impl StoredDoc {
    pub fn new(id: impl Into<String>, data: JsonValue) -> Self {
        Self {
            id: id.into(),
            data,
        }
    }

    /// Decode into a typed schema, injecting the document ID as `id`
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, VaultError> {
        let mut data = self.data.clone();
        if let Some(obj) = data.as_object_mut() {
            obj.insert("id".to_string(), JsonValue::String(self.id.clone()));
        }
        serde_json::from_value(data)
            .map_err(|e| VaultError::Database(format!("Malformed document {}: {}", self.id, e)))
    }
}

/// Encode a typed schema for storage. The `id` key is dropped since the
/// document ID lives outside the body.
pub fn encode<T: Serialize>(value: &T) -> Result<JsonValue, VaultError> {
    let mut data = serde_json::to_value(value)
        .map_err(|e| VaultError::Internal(format!("Failed to encode document: {}", e)))?;
    if let Some(obj) = data.as_object_mut() {
        obj.remove("id");
    }
    Ok(data)
}

/// Kind of change applied to a document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Created,
    Updated,
    Deleted,
}

/// Change notification published after each successful write
#[derive(Debug, Clone)]
pub struct ChangeEvent {
    pub collection: String,
    pub id: String,
    pub kind: ChangeKind,
    /// Full document after the change (None for deletes)
    pub data: Option<JsonValue>,
}

/// A single field mutation. Field names may be dotted paths.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldUpdate {
    /// Overwrite the field
    Set(String, JsonValue),
    /// Atomic increment (negative values decrement, without clamping)
    Increment(String, i64),
    /// Add values to an array field, skipping ones already present
    ArrayUnion(String, Vec<JsonValue>),
    /// Remove every occurrence of the values from an array field
    ArrayRemove(String, Vec<JsonValue>),
}

impl FieldUpdate {
    pub fn set(field: &str, value: impl Into<JsonValue>) -> Self {
        Self::Set(field.to_string(), value.into())
    }

    pub fn increment(field: &str, by: i64) -> Self {
        Self::Increment(field.to_string(), by)
    }
}

/// Query filter on one field
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Eq(String, JsonValue),
    In(String, Vec<JsonValue>),
}

impl Filter {
    pub fn eq(field: &str, value: impl Into<JsonValue>) -> Self {
        Self::Eq(field.to_string(), value.into())
    }

    /// Whether a document satisfies this filter
    pub fn matches(&self, data: &JsonValue) -> bool {
        match self {
            Self::Eq(field, expected) => field_value(data, field)
                .map(|actual| values_equal(actual, expected))
                .unwrap_or(false),
            Self::In(field, options) => field_value(data, field)
                .map(|actual| options.iter().any(|o| values_equal(actual, o)))
                .unwrap_or(false),
        }
    }
}

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

/// Filtered, ordered, limited collection query
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub filters: Vec<Filter>,
    pub order_by: Option<(String, SortDirection)>,
    pub limit: Option<usize>,
}

impl Query {
    /// Query matching every document
    pub fn all() -> Self {
        Self::default()
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn where_eq(self, field: &str, value: impl Into<JsonValue>) -> Self {
        self.filter(Filter::eq(field, value))
    }

    pub fn order_by(mut self, field: &str, direction: SortDirection) -> Self {
        self.order_by = Some((field.to_string(), direction));
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Whether a document satisfies every filter
    pub fn matches(&self, data: &JsonValue) -> bool {
        self.filters.iter().all(|f| f.matches(data))
    }
}

/// Document store operations used by the data access layer
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Backend name for health reporting
    fn backend(&self) -> &'static str;

    /// Subscribe to change events
    fn subscribe(&self) -> broadcast::Receiver<ChangeEvent>;

    /// Fetch one document
    async fn get(&self, collection: &str, id: &str) -> Result<Option<StoredDoc>, VaultError>;

    /// Insert a document under a caller-chosen ID.
    /// Fails with `AlreadyExists` when the ID is taken; the check and the
    /// insert are a single atomic step.
    async fn create(&self, collection: &str, id: &str, data: JsonValue) -> Result<(), VaultError>;

    /// Full replace (upsert) of a document
    async fn set(&self, collection: &str, id: &str, data: JsonValue) -> Result<(), VaultError>;

    /// Apply field updates atomically. Fails with `NotFound` if the
    /// document does not exist.
    async fn update(
        &self,
        collection: &str,
        id: &str,
        updates: Vec<FieldUpdate>,
    ) -> Result<(), VaultError>;

    /// Delete a document, returning whether it existed
    async fn delete(&self, collection: &str, id: &str) -> Result<bool, VaultError>;

    /// Run a query
    async fn query(&self, collection: &str, query: &Query) -> Result<Vec<StoredDoc>, VaultError>;

    /// Count matching documents without fetching them
    async fn count(&self, collection: &str, filters: &[Filter]) -> Result<u64, VaultError>;

    /// Decrement a counter by one, never below zero, as one atomic
    /// read-compute-write. Returns the new value.
    async fn decrement_clamped(
        &self,
        collection: &str,
        id: &str,
        field: &str,
    ) -> Result<i64, VaultError>;

    /// Insert a document under a generated ID
    async fn add(&self, collection: &str, data: JsonValue) -> Result<String, VaultError> {
        let id = uuid::Uuid::new_v4().to_string();
        self.create(collection, &id, data).await?;
        Ok(id)
    }
}

// =============================================================================
// JSON helpers shared by store implementations
// =============================================================================

/// Resolve a dotted field path inside a JSON document
pub fn field_value<'a>(data: &'a JsonValue, path: &str) -> Option<&'a JsonValue> {
    path.split('.').try_fold(data, |current, key| current.get(key))
}

/// Equality that treats `1` and `1.0` as the same number
pub fn values_equal(a: &JsonValue, b: &JsonValue) -> bool {
    match (a, b) {
        (JsonValue::Number(x), JsonValue::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

/// Total order over JSON values used for sorting.
/// Missing/null sort first, then booleans, numbers, strings.
pub fn compare_values(a: Option<&JsonValue>, b: Option<&JsonValue>) -> Ordering {
    fn rank(v: Option<&JsonValue>) -> u8 {
        match v {
            None | Some(JsonValue::Null) => 0,
            Some(JsonValue::Bool(_)) => 1,
            Some(JsonValue::Number(_)) => 2,
            Some(JsonValue::String(_)) => 3,
            Some(_) => 4,
        }
    }

    match (a, b) {
        (Some(JsonValue::Bool(x)), Some(JsonValue::Bool(y))) => x.cmp(y),
        (Some(JsonValue::Number(x)), Some(JsonValue::Number(y))) => {
            let x = x.as_f64().unwrap_or(0.0);
            let y = y.as_f64().unwrap_or(0.0);
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Some(JsonValue::String(x)), Some(JsonValue::String(y))) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_field_value_dotted_path() {
        let doc = json!({ "createdAt": { "seconds": 42 }, "title": "Button" });
        assert_eq!(field_value(&doc, "createdAt.seconds"), Some(&json!(42)));
        assert_eq!(field_value(&doc, "title"), Some(&json!("Button")));
        assert_eq!(field_value(&doc, "createdAt.nanos"), None);
    }

    #[test]
    fn test_filter_numeric_equality() {
        let doc = json!({ "rating": 4.0, "isPublic": true });
        assert!(Filter::eq("rating", 4).matches(&doc));
        assert!(Filter::eq("isPublic", true).matches(&doc));
        assert!(!Filter::eq("missing", true).matches(&doc));
        assert!(Filter::In("rating".into(), vec![json!(3), json!(4)]).matches(&doc));
    }

    #[test]
    fn test_compare_values_missing_first() {
        assert_eq!(compare_values(None, Some(&json!(1))), Ordering::Less);
        assert_eq!(compare_values(Some(&json!(2)), Some(&json!(10))), Ordering::Less);
        assert_eq!(compare_values(Some(&json!("b")), Some(&json!("a"))), Ordering::Greater);
    }

    #[test]
    fn test_decode_injects_id() {
        #[derive(serde::Deserialize)]
        struct Named {
            id: String,
            name: String,
        }

        let doc = StoredDoc::new("abc", json!({ "name": "Cards" }));
        let named: Named = doc.decode().unwrap();
        assert_eq!(named.id, "abc");
        assert_eq!(named.name, "Cards");
    }

    #[test]
    fn test_encode_strips_id() {
        let value = encode(&json!({ "id": "abc", "name": "Cards" })).unwrap();
        assert_eq!(value, json!({ "name": "Cards" }));
    }
}
