//! In-process document store
//!
//! Used in dev mode when MongoDB is unreachable and as the test double.
//! A single tokio `RwLock` guards all collections; every mutation holds the
//! write lock for its whole read-compute-write, which makes increments,
//! clamped decrements and create-if-absent atomic.

use async_trait::async_trait;
use serde_json::{Map, Value as JsonValue};
use std::collections::HashMap;
use tokio::sync::{broadcast, RwLock};
use tracing::debug;

use super::store::{
    compare_values, field_value, values_equal, ChangeEvent, ChangeKind, DocumentStore,
    FieldUpdate, Filter, Query, SortDirection, StoredDoc, CHANGE_CHANNEL_CAPACITY,
};
use crate::types::VaultError;

type Collection = HashMap<String, JsonValue>;

/// In-memory `DocumentStore`
pub struct MemoryStore {
    collections: RwLock<HashMap<String, Collection>>,
    update_tx: broadcast::Sender<ChangeEvent>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        let (update_tx, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            collections: RwLock::new(HashMap::new()),
            update_tx,
        }
    }

    fn publish(&self, collection: &str, id: &str, kind: ChangeKind, data: Option<JsonValue>) {
        // No receivers is fine (sync disabled)
        let _ = self.update_tx.send(ChangeEvent {
            collection: collection.to_string(),
            id: id.to_string(),
            kind,
            data,
        });
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.update_tx.subscribe()
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<StoredDoc>, VaultError> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .and_then(|c| c.get(id))
            .map(|data| StoredDoc::new(id, data.clone())))
    }

    async fn create(&self, collection: &str, id: &str, data: JsonValue) -> Result<(), VaultError> {
        ensure_object(&data)?;
        {
            let mut collections = self.collections.write().await;
            let docs = collections.entry(collection.to_string()).or_default();
            if docs.contains_key(id) {
                return Err(VaultError::AlreadyExists(format!("{}/{}", collection, id)));
            }
            docs.insert(id.to_string(), data.clone());
        }
        debug!(collection, id, "Created document");
        self.publish(collection, id, ChangeKind::Created, Some(data));
        Ok(())
    }

    async fn set(&self, collection: &str, id: &str, data: JsonValue) -> Result<(), VaultError> {
        ensure_object(&data)?;
        let existed = {
            let mut collections = self.collections.write().await;
            collections
                .entry(collection.to_string())
                .or_default()
                .insert(id.to_string(), data.clone())
                .is_some()
        };
        let kind = if existed {
            ChangeKind::Updated
        } else {
            ChangeKind::Created
        };
        self.publish(collection, id, kind, Some(data));
        Ok(())
    }

    async fn update(
        &self,
        collection: &str,
        id: &str,
        updates: Vec<FieldUpdate>,
    ) -> Result<(), VaultError> {
        let data = {
            let mut collections = self.collections.write().await;
            let doc = collections
                .get_mut(collection)
                .and_then(|c| c.get_mut(id))
                .ok_or_else(|| VaultError::NotFound(format!("{}/{}", collection, id)))?;
            // Apply to a copy so a failing update leaves the document untouched
            let mut next = doc.clone();
            for update in &updates {
                apply_update(&mut next, update)?;
            }
            *doc = next.clone();
            next
        };
        self.publish(collection, id, ChangeKind::Updated, Some(data));
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<bool, VaultError> {
        let removed = {
            let mut collections = self.collections.write().await;
            collections
                .get_mut(collection)
                .and_then(|c| c.remove(id))
                .is_some()
        };
        if removed {
            self.publish(collection, id, ChangeKind::Deleted, None);
        }
        Ok(removed)
    }

    async fn query(&self, collection: &str, query: &Query) -> Result<Vec<StoredDoc>, VaultError> {
        let collections = self.collections.read().await;
        let Some(docs) = collections.get(collection) else {
            return Ok(Vec::new());
        };

        // Sort by ID first so results are deterministic before ordering
        let mut matched: Vec<StoredDoc> = docs
            .iter()
            .filter(|(_, data)| query.matches(data))
            .map(|(id, data)| StoredDoc::new(id.clone(), data.clone()))
            .collect();
        matched.sort_by(|a, b| a.id.cmp(&b.id));

        if let Some((ref field, direction)) = query.order_by {
            matched.sort_by(|a, b| {
                let ord = compare_values(field_value(&a.data, field), field_value(&b.data, field));
                match direction {
                    SortDirection::Asc => ord,
                    SortDirection::Desc => ord.reverse(),
                }
            });
        }

        if let Some(limit) = query.limit {
            matched.truncate(limit);
        }
        Ok(matched)
    }

    async fn count(&self, collection: &str, filters: &[Filter]) -> Result<u64, VaultError> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .map(|docs| {
                docs.values()
                    .filter(|data| filters.iter().all(|f| f.matches(data)))
                    .count() as u64
            })
            .unwrap_or(0))
    }

    async fn decrement_clamped(
        &self,
        collection: &str,
        id: &str,
        field: &str,
    ) -> Result<i64, VaultError> {
        let (value, data) = {
            let mut collections = self.collections.write().await;
            let doc = collections
                .get_mut(collection)
                .and_then(|c| c.get_mut(id))
                .ok_or_else(|| VaultError::NotFound(format!("{}/{}", collection, id)))?;
            let current = field_value(doc, field).and_then(as_i64).unwrap_or(0);
            let next = (current - 1).max(0);
            set_path(doc, field, JsonValue::from(next))?;
            (next, doc.clone())
        };
        self.publish(collection, id, ChangeKind::Updated, Some(data));
        Ok(value)
    }
}

// =============================================================================
// Update application
// =============================================================================

fn ensure_object(data: &JsonValue) -> Result<(), VaultError> {
    if data.is_object() {
        Ok(())
    } else {
        Err(VaultError::Internal("Documents must be JSON objects".into()))
    }
}

fn as_i64(value: &JsonValue) -> Option<i64> {
    value
        .as_i64()
        .or_else(|| value.as_f64().map(|f| f.round() as i64))
}

/// Mutable slot for a dotted path, creating intermediate objects
fn slot_mut<'a>(doc: &'a mut JsonValue, path: &str) -> Result<&'a mut JsonValue, VaultError> {
    let mut current = doc;
    for key in path.split('.') {
        if !current.is_object() {
            if current.is_null() {
                *current = JsonValue::Object(Map::new());
            } else {
                return Err(VaultError::Database(format!(
                    "Cannot descend into non-object at '{}'",
                    path
                )));
            }
        }
        current = current
            .as_object_mut()
            .map(|obj| obj.entry(key.to_string()).or_insert(JsonValue::Null))
            .ok_or_else(|| VaultError::Database(format!("Invalid path '{}'", path)))?;
    }
    Ok(current)
}

fn set_path(doc: &mut JsonValue, path: &str, value: JsonValue) -> Result<(), VaultError> {
    *slot_mut(doc, path)? = value;
    Ok(())
}

fn apply_update(doc: &mut JsonValue, update: &FieldUpdate) -> Result<(), VaultError> {
    match update {
        FieldUpdate::Set(field, value) => set_path(doc, field, value.clone()),
        FieldUpdate::Increment(field, by) => {
            let slot = slot_mut(doc, field)?;
            let current = as_i64(slot).unwrap_or(0);
            *slot = JsonValue::from(current + by);
            Ok(())
        }
        FieldUpdate::ArrayUnion(field, values) => {
            let slot = slot_mut(doc, field)?;
            if !slot.is_array() {
                *slot = JsonValue::Array(Vec::new());
            }
            if let Some(items) = slot.as_array_mut() {
                for value in values {
                    if !items.iter().any(|existing| values_equal(existing, value)) {
                        items.push(value.clone());
                    }
                }
            }
            Ok(())
        }
        FieldUpdate::ArrayRemove(field, values) => {
            let slot = slot_mut(doc, field)?;
            if let Some(items) = slot.as_array_mut() {
                items.retain(|existing| !values.iter().any(|v| values_equal(existing, v)));
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_create_if_absent() {
        let store = MemoryStore::new();
        store.create("favorites", "u1_c1", json!({ "userId": "u1" })).await.unwrap();

        let err = store
            .create("favorites", "u1_c1", json!({ "userId": "u1" }))
            .await
            .unwrap_err();
        assert!(matches!(err, VaultError::AlreadyExists(_)));
    }

    #[tokio::test]
    async fn test_update_operations() {
        let store = MemoryStore::new();
        store
            .create("collections", "col1", json!({ "componentIds": ["a"], "likes": 1 }))
            .await
            .unwrap();

        store
            .update(
                "collections",
                "col1",
                vec![
                    FieldUpdate::ArrayUnion("componentIds".into(), vec![json!("a"), json!("b")]),
                    FieldUpdate::increment("likes", 2),
                    FieldUpdate::set("stats.views", 7),
                ],
            )
            .await
            .unwrap();

        let doc = store.get("collections", "col1").await.unwrap().unwrap();
        assert_eq!(doc.data["componentIds"], json!(["a", "b"]));
        assert_eq!(doc.data["likes"], json!(3));
        assert_eq!(doc.data["stats"]["views"], json!(7));

        store
            .update(
                "collections",
                "col1",
                vec![FieldUpdate::ArrayRemove("componentIds".into(), vec![json!("a")])],
            )
            .await
            .unwrap();
        let doc = store.get("collections", "col1").await.unwrap().unwrap();
        assert_eq!(doc.data["componentIds"], json!(["b"]));
    }

    #[tokio::test]
    async fn test_update_missing_document() {
        let store = MemoryStore::new();
        let err = store
            .update("components", "nope", vec![FieldUpdate::increment("views", 1)])
            .await
            .unwrap_err();
        assert!(matches!(err, VaultError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_decrement_clamped_stays_at_zero() {
        let store = MemoryStore::new();
        store.create("components", "c1", json!({ "likes": 1 })).await.unwrap();

        assert_eq!(store.decrement_clamped("components", "c1", "likes").await.unwrap(), 0);
        assert_eq!(store.decrement_clamped("components", "c1", "likes").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_concurrent_decrements_never_negative() {
        let store = Arc::new(MemoryStore::new());
        store.create("components", "c1", json!({ "likes": 3 })).await.unwrap();

        let handles: Vec<_> = (0..20)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move {
                    store.decrement_clamped("components", "c1", "likes").await
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let doc = store.get("components", "c1").await.unwrap().unwrap();
        assert_eq!(doc.data["likes"], json!(0));
    }

    #[tokio::test]
    async fn test_query_filter_order_limit() {
        let store = MemoryStore::new();
        for (id, likes, public) in [("a", 5, true), ("b", 20, true), ("c", 50, false), ("d", 1, true)] {
            store
                .create("components", id, json!({ "likes": likes, "isPublic": public }))
                .await
                .unwrap();
        }

        let query = Query::all()
            .where_eq("isPublic", true)
            .order_by("likes", SortDirection::Desc)
            .limit(2);
        let docs = store.query("components", &query).await.unwrap();
        let ids: Vec<_> = docs.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a"]);

        let count = store
            .count("components", &[Filter::eq("isPublic", true)])
            .await
            .unwrap();
        assert_eq!(count, 3);
        assert_eq!(store.count("missing", &[]).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_writes_publish_change_events() {
        let store = MemoryStore::new();
        let mut rx = store.subscribe();

        store.create("users", "u1", json!({ "followers": 0 })).await.unwrap();
        store.update("users", "u1", vec![FieldUpdate::increment("followers", 1)]).await.unwrap();
        store.delete("users", "u1").await.unwrap();

        let created = rx.recv().await.unwrap();
        assert_eq!(created.kind, ChangeKind::Created);
        let updated = rx.recv().await.unwrap();
        assert_eq!(updated.kind, ChangeKind::Updated);
        assert_eq!(updated.data.unwrap()["followers"], json!(1));
        let deleted = rx.recv().await.unwrap();
        assert_eq!(deleted.kind, ChangeKind::Deleted);
        assert!(deleted.data.is_none());
    }

    #[tokio::test]
    async fn test_delete_missing_returns_false() {
        let store = MemoryStore::new();
        assert!(!store.delete("components", "nope").await.unwrap());
    }
}
