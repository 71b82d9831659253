//! Search index backends
//!
//! `MeiliSearchIndex` talks to a hosted Meilisearch instance;
//! `MemorySearchIndex` keeps records in process for dev mode and tests.

use async_trait::async_trait;
use dashmap::DashMap;
use meilisearch_sdk::{client::Client, settings::Settings};
use serde_json::Value as JsonValue;
use std::time::Duration;
use tracing::{debug, info};

use super::projection::IndexKind;
use crate::types::VaultError;

/// Primary key of every index
pub const PRIMARY_KEY: &str = "id";

/// How long to wait for a Meilisearch task (bulk resyncs can be slow)
const TASK_TIMEOUT: Duration = Duration::from_secs(60);

/// Write side of the hosted search index
#[async_trait]
pub trait SearchIndex: Send + Sync {
    /// Backend name for health reporting
    fn backend(&self) -> &'static str;

    /// Insert or fully replace records keyed by `id`
    async fn upsert(&self, index: &str, records: Vec<JsonValue>) -> Result<(), VaultError>;

    /// Remove one record; removing an absent record succeeds
    async fn delete(&self, index: &str, id: &str) -> Result<(), VaultError>;

    /// Apply index settings (filterable/sortable attributes)
    async fn configure(&self) -> Result<(), VaultError> {
        Ok(())
    }
}

// =============================================================================
// In-memory index
// =============================================================================

/// In-process `SearchIndex`
#[derive(Default)]
pub struct MemorySearchIndex {
    indexes: DashMap<String, DashMap<String, JsonValue>>,
}

impl MemorySearchIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a record
    pub fn get(&self, index: &str, id: &str) -> Option<JsonValue> {
        self.indexes
            .get(index)
            .and_then(|records| records.get(id).map(|r| r.value().clone()))
    }

    /// Number of records in an index
    pub fn len(&self, index: &str) -> usize {
        self.indexes.get(index).map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self, index: &str) -> bool {
        self.len(index) == 0
    }
}

fn record_id(record: &JsonValue) -> Result<String, VaultError> {
    record
        .get(PRIMARY_KEY)
        .and_then(JsonValue::as_str)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .ok_or_else(|| VaultError::Search("Search record without id".into()))
}

#[async_trait]
impl SearchIndex for MemorySearchIndex {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn upsert(&self, index: &str, records: Vec<JsonValue>) -> Result<(), VaultError> {
        let entries = self.indexes.entry(index.to_string()).or_default();
        for record in records {
            let id = record_id(&record)?;
            entries.insert(id, record);
        }
        Ok(())
    }

    async fn delete(&self, index: &str, id: &str) -> Result<(), VaultError> {
        if let Some(records) = self.indexes.get(index) {
            records.remove(id);
        }
        Ok(())
    }
}

// =============================================================================
// Meilisearch
// =============================================================================

/// Hosted Meilisearch index
pub struct MeiliSearchIndex {
    client: Client,
}

impl MeiliSearchIndex {
    pub fn new(url: &str, api_key: Option<&str>) -> Result<Self, VaultError> {
        let client = Client::new(url, api_key)?;
        info!("Using Meilisearch at {}", url);
        Ok(Self { client })
    }

    /// Wait for a task and turn a failed task into an error
    async fn finish(&self, task: meilisearch_sdk::task_info::TaskInfo) -> Result<(), VaultError> {
        let task = task
            .wait_for_completion(&self.client, None, Some(TASK_TIMEOUT))
            .await?;
        if task.is_failure() {
            return Err(VaultError::Search(format!("Search task failed: {:?}", task)));
        }
        Ok(())
    }

    fn settings(kind: IndexKind) -> Settings {
        let settings = Settings::new();
        match kind {
            IndexKind::Components => settings
                .with_searchable_attributes(["title", "description", "tags", "authorName"])
                .with_filterable_attributes([
                    "category",
                    "framework",
                    "language",
                    "styling",
                    "authorId",
                    "isPublic",
                ])
                .with_sortable_attributes(["createdAt", "likes", "downloads", "views", "rating"]),
            IndexKind::Users => settings
                .with_searchable_attributes(["displayName", "username", "bio"])
                .with_sortable_attributes(["followers", "totalComponents", "createdAt"]),
            IndexKind::Collections => settings
                .with_searchable_attributes(["name", "description"])
                .with_filterable_attributes(["userId", "isPublic"])
                .with_sortable_attributes(["createdAt", "likes"]),
        }
    }
}

#[async_trait]
impl SearchIndex for MeiliSearchIndex {
    fn backend(&self) -> &'static str {
        "meilisearch"
    }

    async fn upsert(&self, index: &str, records: Vec<JsonValue>) -> Result<(), VaultError> {
        if records.is_empty() {
            return Ok(());
        }
        let task = self
            .client
            .index(index)
            .add_or_replace(&records, Some(PRIMARY_KEY))
            .await?;
        self.finish(task).await?;
        debug!(index, count = records.len(), "Upserted search records");
        Ok(())
    }

    async fn delete(&self, index: &str, id: &str) -> Result<(), VaultError> {
        let task = self.client.index(index).delete_document(id).await?;
        self.finish(task).await?;
        debug!(index, id, "Deleted search record");
        Ok(())
    }

    async fn configure(&self) -> Result<(), VaultError> {
        for kind in IndexKind::ALL {
            let task = self
                .client
                .index(kind.index_name())
                .set_settings(&Self::settings(kind))
                .await?;
            self.finish(task).await?;
        }
        info!("Search index settings applied");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_memory_index_upsert_replaces() {
        let index = MemorySearchIndex::new();
        index
            .upsert("components", vec![json!({ "id": "c1", "title": "Old", "likes": 1 })])
            .await
            .unwrap();
        index
            .upsert("components", vec![json!({ "id": "c1", "title": "New" })])
            .await
            .unwrap();

        assert_eq!(index.len("components"), 1);
        let record = index.get("components", "c1").unwrap();
        assert_eq!(record["title"], "New");
        assert!(record.get("likes").is_none());
    }

    #[tokio::test]
    async fn test_memory_index_delete_is_idempotent() {
        let index = MemorySearchIndex::new();
        index.upsert("users", vec![json!({ "id": "u1" })]).await.unwrap();
        index.delete("users", "u1").await.unwrap();
        index.delete("users", "u1").await.unwrap();
        index.delete("never", "x").await.unwrap();
        assert!(index.is_empty("users"));
    }

    #[tokio::test]
    async fn test_memory_index_rejects_missing_id() {
        let index = MemorySearchIndex::new();
        assert!(index.upsert("users", vec![json!({ "name": "x" })]).await.is_err());
    }
}
