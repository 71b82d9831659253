//! Data access layer
//!
//! - `store`: the `DocumentStore` trait, queries, field updates, change events
//! - `mongo`: MongoDB implementation
//! - `memory`: in-process implementation (dev mode, tests)
//! - `schemas`: typed documents and collection names

pub mod memory;
pub mod mongo;
pub mod schemas;
pub mod store;

pub use memory::MemoryStore;
pub use mongo::MongoStore;
pub use store::{
    encode, ChangeEvent, ChangeKind, DocumentStore, FieldUpdate, Filter, Query, SortDirection,
    StoredDoc,
};

use serde::de::DeserializeOwned;
use tracing::warn;

use crate::types::VaultError;

/// Fetch and decode one document
pub async fn fetch<T: DeserializeOwned>(
    store: &dyn DocumentStore,
    collection: &str,
    id: &str,
) -> Result<Option<T>, VaultError> {
    match store.get(collection, id).await? {
        Some(doc) => Ok(Some(doc.decode()?)),
        None => Ok(None),
    }
}

/// Fetch and decode one document, failing with 404 when absent
pub async fn fetch_required<T: DeserializeOwned>(
    store: &dyn DocumentStore,
    collection: &str,
    id: &str,
    what: &str,
) -> Result<T, VaultError> {
    fetch(store, collection, id)
        .await?
        .ok_or_else(|| VaultError::NotFound(format!("{} not found", what)))
}

/// Run a query and decode the results, skipping malformed documents
pub async fn fetch_all<T: DeserializeOwned>(
    store: &dyn DocumentStore,
    collection: &str,
    query: &Query,
) -> Result<Vec<T>, VaultError> {
    let docs = store.query(collection, query).await?;
    Ok(docs
        .iter()
        .filter_map(|doc| match doc.decode() {
            Ok(decoded) => Some(decoded),
            Err(e) => {
                warn!(collection, id = %doc.id, error = %e, "Skipping malformed document");
                None
            }
        })
        .collect())
}

/// Create indexes for every collection
pub async fn apply_all_indexes(store: &MongoStore) -> Result<(), VaultError> {
    use schemas::*;

    store.apply_indexes::<UserDoc>(USER_COLLECTION).await?;
    store.apply_indexes::<ComponentDoc>(COMPONENT_COLLECTION).await?;
    store.apply_indexes::<CollectionDoc>(COLLECTION_COLLECTION).await?;
    store.apply_indexes::<FavoriteDoc>(FAVORITE_COLLECTION).await?;
    store.apply_indexes::<FollowDoc>(FOLLOW_COLLECTION).await?;
    store.apply_indexes::<ReviewDoc>(REVIEW_COLLECTION).await?;
    store.apply_indexes::<ReviewVoteDoc>(REVIEW_VOTE_COLLECTION).await?;
    store.apply_indexes::<CommentDoc>(COMMENT_COLLECTION).await?;
    store.apply_indexes::<ActivityDoc>(ACTIVITY_COLLECTION).await?;
    Ok(())
}
