//! Per-user activity log
//!
//! Appends are best effort: a failed write is logged and the triggering
//! request still succeeds.

use tracing::warn;

use crate::db::schemas::{ActivityDoc, Timestamp, ACTIVITY_COLLECTION};
use crate::db::{encode, fetch_all, DocumentStore, Query, SortDirection};
use crate::types::VaultError;

/// Append an activity entry, swallowing failures
pub async fn record(
    store: &dyn DocumentStore,
    user_id: &str,
    kind: &str,
    target_id: &str,
    target_type: &str,
    description: impl Into<String>,
) {
    let entry = ActivityDoc {
        id: String::new(),
        user_id: user_id.to_string(),
        kind: kind.to_string(),
        target_id: target_id.to_string(),
        target_type: target_type.to_string(),
        description: description.into(),
        created_at: Some(Timestamp::now()),
    };

    let result = match encode(&entry) {
        Ok(data) => store.add(ACTIVITY_COLLECTION, data).await.map(|_| ()),
        Err(e) => Err(e),
    };
    if let Err(e) = result {
        warn!(user_id, kind, error = %e, "Failed to record activity");
    }
}

/// A user's most recent activity, newest first
pub async fn recent(
    store: &dyn DocumentStore,
    user_id: &str,
    limit: usize,
) -> Result<Vec<ActivityDoc>, VaultError> {
    fetch_all(
        store,
        ACTIVITY_COLLECTION,
        &Query::all()
            .where_eq("userId", user_id)
            .order_by("createdAt.seconds", SortDirection::Desc)
            .limit(limit),
    )
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;

    #[tokio::test]
    async fn test_record_and_read_back() {
        let store = MemoryStore::new();
        record(&store, "u1", "upload", "c1", "component", "Uploaded Button").await;
        record(&store, "u2", "upload", "c2", "component", "Uploaded Card").await;

        let entries = recent(&store, "u1", 20).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].kind, "upload");
        assert_eq!(entries[0].target_id, "c1");
        assert!(!entries[0].id.is_empty());
    }
}
