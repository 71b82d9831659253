//! Search index synchronizer
//!
//! A background task subscribes to the store's change events and mirrors
//! components, users and collections into the search index: created and
//! updated documents are projected and fully replaced, deleted documents are
//! removed by ID. `full_resync` rebuilds every index from a full scan.
//!
//! Events that still fail after their retries are kept in a backlog and
//! repaired from the current store state on the next repair tick. A lagged
//! subscription schedules a full resync the same way.

use chrono::Utc;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use super::index::SearchIndex;
use super::projection::IndexKind;
use crate::db::{ChangeEvent, ChangeKind, DocumentStore, Query};
use crate::types::VaultError;

/// Retry policy for single-event sync
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Delay before the first retry, doubled for each further retry
    pub base_delay: Duration,
    /// Interval between repair passes over the backlog
    pub repair_interval: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(200),
            repair_interval: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    pub fn with_max_retries(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Default::default()
        }
    }

    pub fn repair_every(mut self, interval: Duration) -> Self {
        self.repair_interval = interval;
        self
    }

    /// Backoff before retry number `retry` (1-based)
    pub fn delay(&self, retry: u32) -> Duration {
        self.base_delay * 2u32.saturating_pow(retry.saturating_sub(1))
    }
}

/// Per-type record counts of a full resync
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResyncReport {
    pub components: usize,
    pub users: usize,
    pub collections: usize,
}

/// Mirrors store changes into a `SearchIndex`
pub struct SearchSync {
    index: Arc<dyn SearchIndex>,
    retry: RetryPolicy,
    shutdown_tx: broadcast::Sender<()>,
}

impl SearchSync {
    pub fn new(index: Arc<dyn SearchIndex>, retry: RetryPolicy) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            index,
            retry,
            shutdown_tx,
        }
    }

    pub fn shutdown_receiver(&self) -> broadcast::Receiver<()> {
        self.shutdown_tx.subscribe()
    }

    /// Stop the background task
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }

    /// Apply one change event. Events for unindexed collections are ignored.
    /// Failures are logged and returned.
    pub async fn handle_event(&self, event: &ChangeEvent) -> Result<(), VaultError> {
        let Some(kind) = IndexKind::from_collection(&event.collection) else {
            return Ok(());
        };
        let index_name = kind.index_name();

        let result = match (event.kind, &event.data) {
            (ChangeKind::Deleted, _) => self.index.delete(index_name, &event.id).await,
            (_, Some(data)) => {
                let record = kind.project(&event.id, data, Utc::now());
                self.index.upsert(index_name, vec![record]).await
            }
            (_, None) => {
                debug!(collection = %event.collection, id = %event.id, "Change without document, skipping");
                Ok(())
            }
        };

        match &result {
            Ok(()) => debug!(index = index_name, id = %event.id, kind = ?event.kind, "Search record synced"),
            Err(e) => error!(index = index_name, id = %event.id, error = %e, "Search sync failed"),
        }
        result
    }

    /// Apply one event, retrying with exponential backoff
    pub async fn handle_with_retry(&self, event: &ChangeEvent) -> Result<(), VaultError> {
        let mut attempt = 0;
        loop {
            match self.handle_event(event).await {
                Ok(()) => return Ok(()),
                Err(e) if attempt >= self.retry.max_retries => {
                    error!(
                        id = %event.id,
                        attempts = attempt + 1,
                        "Giving up on search sync event"
                    );
                    return Err(e);
                }
                Err(_) => {
                    attempt += 1;
                    let delay = self.retry.delay(attempt);
                    warn!(id = %event.id, attempt, delay_ms = delay.as_millis() as u64, "Retrying search sync");
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    /// Bring one record in line with the store: upsert the current document,
    /// or remove the record when the document is gone
    pub async fn repair(
        &self,
        store: &dyn DocumentStore,
        collection: &str,
        id: &str,
    ) -> Result<(), VaultError> {
        let Some(kind) = IndexKind::from_collection(collection) else {
            return Ok(());
        };
        match store.get(collection, id).await? {
            Some(doc) => {
                let record = kind.project(&doc.id, &doc.data, Utc::now());
                self.index.upsert(kind.index_name(), vec![record]).await
            }
            None => self.index.delete(kind.index_name(), id).await,
        }
    }

    /// Rebuild every index from a full scan of its source collection.
    /// Any failure aborts the whole resync.
    pub async fn full_resync(&self, store: &dyn DocumentStore) -> Result<ResyncReport, VaultError> {
        let now = Utc::now();
        let mut report = ResyncReport::default();

        for kind in IndexKind::ALL {
            let docs = store.query(kind.collection(), &Query::all()).await?;
            let records: Vec<_> = docs
                .iter()
                .map(|doc| kind.project(&doc.id, &doc.data, now))
                .collect();
            let count = records.len();
            self.index.upsert(kind.index_name(), records).await?;

            match kind {
                IndexKind::Components => report.components = count,
                IndexKind::Users => report.users = count,
                IndexKind::Collections => report.collections = count,
            }
        }

        info!(
            components = report.components,
            users = report.users,
            collections = report.collections,
            "Full search resync complete"
        );
        Ok(report)
    }
}

/// Sync work the event task still owes the index
#[derive(Debug, Default)]
struct Backlog {
    /// (collection, document ID) pairs whose events failed
    records: HashSet<(String, String)>,
    /// Events were lost to lag; only a full scan can recover
    full_resync: bool,
}

impl Backlog {
    fn is_empty(&self) -> bool {
        self.records.is_empty() && !self.full_resync
    }

    /// Retry everything owed. Whatever fails again stays for the next pass.
    async fn repair(&mut self, sync: &SearchSync, store: &dyn DocumentStore) {
        if self.full_resync {
            match sync.full_resync(store).await {
                Ok(_) => self.full_resync = false,
                Err(e) => warn!(error = %e, "Scheduled full resync failed"),
            }
        }

        let pending: Vec<_> = self.records.iter().cloned().collect();
        for (collection, id) in pending {
            match sync.repair(store, &collection, &id).await {
                Ok(()) => {
                    self.records.remove(&(collection, id));
                }
                Err(e) => debug!(%collection, %id, error = %e, "Search repair still failing"),
            }
        }

        if self.is_empty() {
            info!("Search sync backlog cleared");
        } else {
            warn!(pending = self.records.len(), "Search sync backlog remains");
        }
    }
}

/// Spawn the background sync task
pub fn spawn_sync_task(
    sync: Arc<SearchSync>,
    store: Arc<dyn DocumentStore>,
) -> tokio::task::JoinHandle<()> {
    let mut events = store.subscribe();
    let mut shutdown_rx = sync.shutdown_receiver();

    tokio::spawn(async move {
        let mut backlog = Backlog::default();
        let mut repair_tick = tokio::time::interval(sync.retry.repair_interval);
        repair_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!("Search sync started");

        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    info!("Search sync shutting down");
                    break;
                }
                event = events.recv() => {
                    match event {
                        Ok(event) => {
                            let key = (event.collection.clone(), event.id.clone());
                            match sync.handle_with_retry(&event).await {
                                Ok(()) => {
                                    backlog.records.remove(&key);
                                }
                                Err(_) => {
                                    backlog.records.insert(key);
                                }
                            }
                        }
                        Err(broadcast::error::RecvError::Lagged(n)) => {
                            warn!("Search sync lagged {} events, scheduling a full resync", n);
                            backlog.full_resync = true;
                        }
                        Err(broadcast::error::RecvError::Closed) => {
                            info!("Change channel closed, search sync stopping");
                            break;
                        }
                    }
                }
                _ = repair_tick.tick(), if !backlog.is_empty() => {
                    backlog.repair(&sync, store.as_ref()).await;
                }
            }
        }

        info!("Search sync stopped");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;
    use crate::search::MemorySearchIndex;
    use async_trait::async_trait;
    use serde_json::{json, Value as JsonValue};
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

    fn event(collection: &str, id: &str, kind: ChangeKind, data: Option<JsonValue>) -> ChangeEvent {
        ChangeEvent {
            collection: collection.into(),
            id: id.into(),
            kind,
            data,
        }
    }

    fn fast_retry(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            base_delay: Duration::from_millis(1),
            repair_interval: Duration::from_millis(20),
        }
    }

    async fn eventually(check: impl Fn() -> bool) -> bool {
        for _ in 0..100 {
            if check() {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        false
    }

    /// Index that fails a fixed number of times before succeeding
    struct FlakyIndex {
        failures_left: AtomicU32,
        calls: AtomicU32,
        inner: MemorySearchIndex,
    }

    #[async_trait]
    impl SearchIndex for FlakyIndex {
        fn backend(&self) -> &'static str {
            "flaky"
        }

        async fn upsert(&self, index: &str, records: Vec<JsonValue>) -> Result<(), VaultError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.failures_left.load(Ordering::SeqCst) > 0 {
                self.failures_left.fetch_sub(1, Ordering::SeqCst);
                return Err(VaultError::Search("unavailable".into()));
            }
            self.inner.upsert(index, records).await
        }

        async fn delete(&self, index: &str, id: &str) -> Result<(), VaultError> {
            self.inner.delete(index, id).await
        }
    }

    #[test]
    fn test_retry_delay_doubles() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay(1), Duration::from_millis(200));
        assert_eq!(policy.delay(2), Duration::from_millis(400));
        assert_eq!(policy.delay(3), Duration::from_millis(800));
    }

    #[tokio::test]
    async fn test_upsert_and_delete_events() {
        let index = Arc::new(MemorySearchIndex::new());
        let sync = SearchSync::new(index.clone(), fast_retry(0));

        sync.handle_event(&event(
            "components",
            "c1",
            ChangeKind::Created,
            Some(json!({ "title": "Button", "isPublic": true })),
        ))
        .await
        .unwrap();
        let record = index.get("components", "c1").unwrap();
        assert_eq!(record["title"], "Button");
        assert_eq!(record["views"], 0);

        sync.handle_event(&event("components", "c1", ChangeKind::Deleted, None))
            .await
            .unwrap();
        assert!(index.get("components", "c1").is_none());
    }

    #[tokio::test]
    async fn test_unindexed_collections_ignored() {
        let index = Arc::new(MemorySearchIndex::new());
        let sync = SearchSync::new(index.clone(), fast_retry(0));
        sync.handle_event(&event(
            "favorites",
            "u1_c1",
            ChangeKind::Created,
            Some(json!({ "userId": "u1" })),
        ))
        .await
        .unwrap();
        assert!(index.is_empty("favorites"));
    }

    #[tokio::test]
    async fn test_retry_recovers_from_transient_failure() {
        let index = Arc::new(FlakyIndex {
            failures_left: AtomicU32::new(2),
            calls: AtomicU32::new(0),
            inner: MemorySearchIndex::new(),
        });
        let sync = SearchSync::new(index.clone(), fast_retry(3));

        let ev = event("users", "u1", ChangeKind::Updated, Some(json!({ "displayName": "Ada" })));
        sync.handle_with_retry(&ev).await.unwrap();
        assert_eq!(index.calls.load(Ordering::SeqCst), 3);
        assert_eq!(index.inner.get("users", "u1").unwrap()["displayName"], "Ada");
    }

    #[tokio::test]
    async fn test_retry_gives_up_and_propagates() {
        let index = Arc::new(FlakyIndex {
            failures_left: AtomicU32::new(10),
            calls: AtomicU32::new(0),
            inner: MemorySearchIndex::new(),
        });
        let sync = SearchSync::new(index.clone(), fast_retry(2));

        let ev = event("users", "u1", ChangeKind::Updated, Some(json!({})));
        assert!(sync.handle_with_retry(&ev).await.is_err());
        assert_eq!(index.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_full_resync_counts() {
        let store = MemoryStore::new();
        store.create("components", "c1", json!({ "title": "A" })).await.unwrap();
        store.create("components", "c2", json!({ "title": "B" })).await.unwrap();
        store.create("users", "u1", json!({ "displayName": "Ada" })).await.unwrap();

        let index = Arc::new(MemorySearchIndex::new());
        let sync = SearchSync::new(index.clone(), fast_retry(0));
        let report = sync.full_resync(&store).await.unwrap();

        assert_eq!(
            report,
            ResyncReport {
                components: 2,
                users: 1,
                collections: 0
            }
        );
        assert_eq!(index.len("components"), 2);
    }

    #[tokio::test]
    async fn test_deleted_source_not_resurrected_by_resync() {
        let store = MemoryStore::new();
        let index = Arc::new(MemorySearchIndex::new());
        let sync = SearchSync::new(index.clone(), fast_retry(0));
        let mut events = store.subscribe();

        store.create("components", "c1", json!({ "title": "A" })).await.unwrap();
        store.create("components", "c2", json!({ "title": "B" })).await.unwrap();
        store.delete("components", "c1").await.unwrap();
        for _ in 0..3 {
            let ev = events.recv().await.unwrap();
            sync.handle_event(&ev).await.unwrap();
        }
        assert!(index.get("components", "c1").is_none());

        sync.full_resync(&store).await.unwrap();
        assert!(index.get("components", "c1").is_none());
        assert!(index.get("components", "c2").is_some());
    }

    #[tokio::test]
    async fn test_spawned_task_follows_store() {
        let store = Arc::new(MemoryStore::new());
        let index = Arc::new(MemorySearchIndex::new());
        let sync = Arc::new(SearchSync::new(index.clone(), fast_retry(0)));
        let handle = spawn_sync_task(sync.clone(), store.clone());

        store
            .create("collections", "col1", json!({ "name": "Forms", "componentIds": ["a"] }))
            .await
            .unwrap();

        assert!(eventually(|| index.get("collections", "col1").is_some()).await);
        assert_eq!(index.get("collections", "col1").unwrap()["componentCount"], 1);

        sync.shutdown();
        handle.await.unwrap();
    }

    /// Index that rejects every write while `down` is set
    struct OutageIndex {
        down: AtomicBool,
        inner: MemorySearchIndex,
    }

    impl OutageIndex {
        fn check(&self) -> Result<(), VaultError> {
            if self.down.load(Ordering::SeqCst) {
                return Err(VaultError::Search("index offline".into()));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl SearchIndex for OutageIndex {
        fn backend(&self) -> &'static str {
            "outage"
        }

        async fn upsert(&self, index: &str, records: Vec<JsonValue>) -> Result<(), VaultError> {
            self.check()?;
            self.inner.upsert(index, records).await
        }

        async fn delete(&self, index: &str, id: &str) -> Result<(), VaultError> {
            self.check()?;
            self.inner.delete(index, id).await
        }
    }

    #[tokio::test]
    async fn test_backlog_repaired_after_outage() {
        let store = Arc::new(MemoryStore::new());
        let index = Arc::new(OutageIndex {
            down: AtomicBool::new(false),
            inner: MemorySearchIndex::new(),
        });
        let sync = Arc::new(SearchSync::new(index.clone(), fast_retry(2)));
        let handle = spawn_sync_task(sync.clone(), store.clone());

        store.create("components", "old", json!({ "title": "Old" })).await.unwrap();
        assert!(eventually(|| index.inner.get("components", "old").is_some()).await);

        index.down.store(true, Ordering::SeqCst);
        store.create("components", "c1", json!({ "title": "New" })).await.unwrap();
        store.delete("components", "old").await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(index.inner.get("components", "c1").is_none());
        assert!(index.inner.get("components", "old").is_some());

        index.down.store(false, Ordering::SeqCst);
        assert!(eventually(|| index.inner.get("components", "c1").is_some()).await);
        assert!(eventually(|| index.inner.get("components", "old").is_none()).await);
        assert_eq!(index.inner.get("components", "c1").unwrap()["title"], "New");

        sync.shutdown();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_repair_follows_current_store_state() {
        let store = MemoryStore::new();
        let index = Arc::new(MemorySearchIndex::new());
        let sync = SearchSync::new(index.clone(), fast_retry(0));

        store.create("users", "u1", json!({ "displayName": "Ada" })).await.unwrap();
        sync.repair(&store, "users", "u1").await.unwrap();
        assert_eq!(index.get("users", "u1").unwrap()["displayName"], "Ada");

        store.delete("users", "u1").await.unwrap();
        sync.repair(&store, "users", "u1").await.unwrap();
        assert!(index.get("users", "u1").is_none());

        sync.repair(&store, "favorites", "x").await.unwrap();
    }
}
