//! MongoDB document store
//!
//! Documents are stored as BSON with the string document ID in `_id`.
//! Reads convert back to relaxed extended JSON so callers only ever see
//! `serde_json::Value`.

use async_trait::async_trait;
use bson::{doc, Bson, Document};
use futures_util::TryStreamExt;
use mongodb::{
    error::{ErrorKind, WriteFailure},
    options::{IndexOptions, ReturnDocument},
    Client, Collection, Database, IndexModel,
};
use serde_json::Value as JsonValue;
use tokio::sync::broadcast;
use tracing::{debug, info};

use super::store::{
    ChangeEvent, ChangeKind, DocumentStore, FieldUpdate, Filter, Query, SortDirection, StoredDoc,
    CHANGE_CHANNEL_CAPACITY,
};
use crate::types::VaultError;

/// Duplicate key error code
const DUPLICATE_KEY: i32 = 11000;

/// Trait for schemas that provide index definitions
pub trait IntoIndexes {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)>;
}

/// MongoDB-backed `DocumentStore`
#[derive(Clone)]
pub struct MongoStore {
    db: Database,
    update_tx: broadcast::Sender<ChangeEvent>,
}

impl MongoStore {
    /// Connect and verify the connection with a ping
    pub async fn connect(uri: &str, db_name: &str) -> Result<Self, VaultError> {
        info!("Connecting to MongoDB at {}", uri);

        // Use serverSelectionTimeoutMS to avoid hanging on unreachable MongoDB
        let timeout_uri = if uri.contains('?') {
            format!("{}&serverSelectionTimeoutMS=3000&connectTimeoutMS=3000", uri)
        } else {
            format!("{}?serverSelectionTimeoutMS=3000&connectTimeoutMS=3000", uri)
        };

        let client = Client::with_uri_str(&timeout_uri)
            .await
            .map_err(|e| VaultError::Database(format!("Failed to connect to MongoDB: {}", e)))?;

        let db = client.database(db_name);
        db.run_command(doc! { "ping": 1 })
            .await
            .map_err(|e| VaultError::Database(format!("MongoDB ping failed: {}", e)))?;

        info!("Connected to MongoDB database '{}'", db_name);

        let (update_tx, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Ok(Self {
            db,
            update_tx,
        })
    }

    /// Apply schema-defined indexes for one collection
    pub async fn apply_indexes<T: IntoIndexes>(&self, collection: &str) -> Result<(), VaultError> {
        let schema_indices = T::into_indices();
        if schema_indices.is_empty() {
            return Ok(());
        }

        let indices: Vec<IndexModel> = schema_indices
            .into_iter()
            .map(|(keys, opts)| IndexModel::builder().keys(keys).options(opts).build())
            .collect();

        self.collection(collection)
            .create_indexes(indices)
            .await
            .map_err(|e| VaultError::Database(format!("Failed to create indexes: {}", e)))?;

        debug!(collection, "Indexes applied");
        Ok(())
    }

    fn collection(&self, name: &str) -> Collection<Document> {
        self.db.collection::<Document>(name)
    }

    fn publish(&self, collection: &str, id: &str, kind: ChangeKind, data: Option<JsonValue>) {
        let _ = self.update_tx.send(ChangeEvent {
            collection: collection.to_string(),
            id: id.to_string(),
            kind,
            data,
        });
    }
}

#[async_trait]
impl DocumentStore for MongoStore {
    fn backend(&self) -> &'static str {
        "mongodb"
    }

    fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.update_tx.subscribe()
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<StoredDoc>, VaultError> {
        let found = self
            .collection(collection)
            .find_one(doc! { "_id": id })
            .await
            .map_err(|e| VaultError::Database(format!("Find failed: {}", e)))?;
        Ok(found.map(into_stored))
    }

    async fn create(&self, collection: &str, id: &str, data: JsonValue) -> Result<(), VaultError> {
        let mut document = to_document(&data)?;
        document.insert("_id", id);

        match self.collection(collection).insert_one(document).await {
            Ok(_) => {
                self.publish(collection, id, ChangeKind::Created, Some(data));
                Ok(())
            }
            Err(e) if is_duplicate_key(&e) => {
                Err(VaultError::AlreadyExists(format!("{}/{}", collection, id)))
            }
            Err(e) => Err(VaultError::Database(format!("Insert failed: {}", e))),
        }
    }

    async fn set(&self, collection: &str, id: &str, data: JsonValue) -> Result<(), VaultError> {
        let document = to_document(&data)?;
        let result = self
            .collection(collection)
            .replace_one(doc! { "_id": id }, document)
            .upsert(true)
            .await
            .map_err(|e| VaultError::Database(format!("Replace failed: {}", e)))?;

        let kind = if result.upserted_id.is_some() {
            ChangeKind::Created
        } else {
            ChangeKind::Updated
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
        let modifications = to_update_document(&updates)?;
        let updated = self
            .collection(collection)
            .find_one_and_update(doc! { "_id": id }, modifications)
            .return_document(ReturnDocument::After)
            .await
            .map_err(|e| VaultError::Database(format!("Update failed: {}", e)))?
            .ok_or_else(|| VaultError::NotFound(format!("{}/{}", collection, id)))?;

        let stored = into_stored(updated);
        self.publish(collection, id, ChangeKind::Updated, Some(stored.data));
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<bool, VaultError> {
        let result = self
            .collection(collection)
            .delete_one(doc! { "_id": id })
            .await
            .map_err(|e| VaultError::Database(format!("Delete failed: {}", e)))?;

        let removed = result.deleted_count > 0;
        if removed {
            self.publish(collection, id, ChangeKind::Deleted, None);
        }
        Ok(removed)
    }

    async fn query(&self, collection: &str, query: &Query) -> Result<Vec<StoredDoc>, VaultError> {
        let filter = to_filter_document(&query.filters)?;
        let coll = self.collection(collection);
        let mut find = coll.find(filter);

        if let Some((ref field, direction)) = query.order_by {
            let order = match direction {
                SortDirection::Asc => 1,
                SortDirection::Desc => -1,
            };
            find = find.sort(doc! { field.as_str(): order, "_id": 1 });
        }
        if let Some(limit) = query.limit {
            find = find.limit(limit as i64);
        }

        let cursor = find
            .await
            .map_err(|e| VaultError::Database(format!("Find failed: {}", e)))?;
        let documents: Vec<Document> = cursor
            .try_collect()
            .await
            .map_err(|e| VaultError::Database(format!("Cursor failed: {}", e)))?;

        Ok(documents.into_iter().map(into_stored).collect())
    }

    async fn count(&self, collection: &str, filters: &[Filter]) -> Result<u64, VaultError> {
        let filter = to_filter_document(filters)?;
        self.collection(collection)
            .count_documents(filter)
            .await
            .map_err(|e| VaultError::Database(format!("Count failed: {}", e)))
    }

    async fn decrement_clamped(
        &self,
        collection: &str,
        id: &str,
        field: &str,
    ) -> Result<i64, VaultError> {
        // Single pipeline update: field = max(0, ifNull(field, 0) - 1)
        let current = format!("${}", field);
        let pipeline = vec![doc! {
            "$set": {
                field: {
                    "$max": [0, { "$subtract": [{ "$ifNull": [current, 0] }, 1] }]
                }
            }
        }];

        let updated = self
            .collection(collection)
            .find_one_and_update(doc! { "_id": id }, pipeline)
            .return_document(ReturnDocument::After)
            .await
            .map_err(|e| VaultError::Database(format!("Decrement failed: {}", e)))?
            .ok_or_else(|| VaultError::NotFound(format!("{}/{}", collection, id)))?;

        let stored = into_stored(updated);
        let value = super::store::field_value(&stored.data, field)
            .and_then(JsonValue::as_i64)
            .unwrap_or(0);
        self.publish(collection, id, ChangeKind::Updated, Some(stored.data));
        Ok(value)
    }
}

// =============================================================================
// BSON conversion
// =============================================================================

fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    matches!(
        *err.kind,
        ErrorKind::Write(WriteFailure::WriteError(ref we)) if we.code == DUPLICATE_KEY
    )
}

fn to_bson(value: &JsonValue) -> Result<Bson, VaultError> {
    Ok(bson::to_bson(value)?)
}

fn to_document(value: &JsonValue) -> Result<Document, VaultError> {
    let mut document = bson::to_document(value)?;
    document.remove("id");
    Ok(document)
}

/// Convert a stored BSON document into a `StoredDoc`, lifting `_id` out
fn into_stored(mut document: Document) -> StoredDoc {
    let id = match document.remove("_id") {
        Some(Bson::String(s)) => s,
        Some(other) => other.to_string(),
        None => String::new(),
    };
    StoredDoc::new(id, Bson::Document(document).into_relaxed_extjson())
}

fn to_filter_document(filters: &[Filter]) -> Result<Document, VaultError> {
    let mut filter = Document::new();
    for f in filters {
        match f {
            Filter::Eq(field, value) => {
                filter.insert(field.as_str(), to_bson(value)?);
            }
            Filter::In(field, values) => {
                let values = values.iter().map(to_bson).collect::<Result<Vec<_>, _>>()?;
                filter.insert(field.as_str(), doc! { "$in": values });
            }
        }
    }
    Ok(filter)
}

fn to_update_document(updates: &[FieldUpdate]) -> Result<Document, VaultError> {
    let mut set = Document::new();
    let mut inc = Document::new();
    let mut add_to_set = Document::new();
    let mut pull = Document::new();

    for update in updates {
        match update {
            FieldUpdate::Set(field, value) => {
                set.insert(field.as_str(), to_bson(value)?);
            }
            FieldUpdate::Increment(field, by) => {
                inc.insert(field.as_str(), *by);
            }
            FieldUpdate::ArrayUnion(field, values) => {
                let values = values.iter().map(to_bson).collect::<Result<Vec<_>, _>>()?;
                add_to_set.insert(field.as_str(), doc! { "$each": values });
            }
            FieldUpdate::ArrayRemove(field, values) => {
                let values = values.iter().map(to_bson).collect::<Result<Vec<_>, _>>()?;
                pull.insert(field.as_str(), doc! { "$in": values });
            }
        }
    }

    let mut modifications = Document::new();
    for (op, body) in [("$set", set), ("$inc", inc), ("$addToSet", add_to_set), ("$pull", pull)] {
        if !body.is_empty() {
            modifications.insert(op, body);
        }
    }
    if modifications.is_empty() {
        return Err(VaultError::Internal("Update with no field changes".into()));
    }
    Ok(modifications)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    // Live store tests would require a running MongoDB instance

    #[test]
    fn test_update_document_groups_operators() {
        let update = to_update_document(&[
            FieldUpdate::set("title", "Card"),
            FieldUpdate::increment("views", 1),
            FieldUpdate::ArrayUnion("componentIds".into(), vec![json!("c1")]),
            FieldUpdate::ArrayRemove("tags".into(), vec![json!("old")]),
        ])
        .unwrap();

        assert_eq!(update.get_document("$set").unwrap().get_str("title").unwrap(), "Card");
        assert_eq!(update.get_document("$inc").unwrap().get_i64("views").unwrap(), 1);
        assert!(update.get_document("$addToSet").unwrap().contains_key("componentIds"));
        assert!(update.get_document("$pull").unwrap().contains_key("tags"));
    }

    #[test]
    fn test_empty_update_rejected() {
        assert!(to_update_document(&[]).is_err());
    }

    #[test]
    fn test_into_stored_lifts_id() {
        let stored = into_stored(doc! { "_id": "c1", "likes": 3_i64, "isPublic": true });
        assert_eq!(stored.id, "c1");
        assert_eq!(stored.data, json!({ "likes": 3, "isPublic": true }));
    }

    #[test]
    fn test_filter_document() {
        let filter = to_filter_document(&[
            Filter::eq("isPublic", true),
            Filter::In("authorId".into(), vec![json!("u1"), json!("u2")]),
        ])
        .unwrap();
        assert!(filter.get_bool("isPublic").unwrap());
        assert!(filter.get_document("authorId").unwrap().contains_key("$in"));
    }
}
