//! Media cleanup
//!
//! Component images live in an external storage service. Deleting a
//! component asks that service to drop every object the component
//! references; failures are logged and never fail the delete.

use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::types::VaultError;

/// Storage backend for component media
#[async_trait]
pub trait MediaStore: Send + Sync {
    /// Delete one stored object by its public URL
    async fn delete(&self, url: &str) -> Result<(), VaultError>;
}

/// Storage service reached over HTTP
pub struct HttpMediaStore {
    base_url: String,
    http_client: reqwest::Client,
}

impl HttpMediaStore {
    pub fn new(base_url: impl Into<String>) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .user_agent(concat!("component-vault/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_default();

        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http_client,
        }
    }

    /// Whether the URL points at an object this storage service owns
    pub fn owns(&self, url: &str) -> bool {
        url.strip_prefix(&self.base_url)
            .map(|rest| rest.starts_with('/'))
            .unwrap_or(false)
    }
}

#[async_trait]
impl MediaStore for HttpMediaStore {
    async fn delete(&self, url: &str) -> Result<(), VaultError> {
        if !self.owns(url) {
            debug!(url, "Skipping media hosted outside the storage service");
            return Ok(());
        }

        let response = self.http_client.delete(url).send().await?;
        let status = response.status();
        // Already gone counts as deleted
        if status.is_success() || status == reqwest::StatusCode::NOT_FOUND {
            Ok(())
        } else {
            Err(VaultError::Storage(format!(
                "Storage service returned {} for {}",
                status, url
            )))
        }
    }
}

/// Used when no storage service is configured
pub struct NoopMediaStore;

#[async_trait]
impl MediaStore for NoopMediaStore {
    async fn delete(&self, url: &str) -> Result<(), VaultError> {
        debug!(url, "No storage service configured, media left in place");
        Ok(())
    }
}

/// Best-effort deletion of a component's media. Returns how many objects
/// were deleted.
pub async fn cleanup(media: &dyn MediaStore, component_id: &str, urls: &[String]) -> usize {
    let mut deleted = 0;
    for url in urls {
        match media.delete(url).await {
            Ok(()) => deleted += 1,
            Err(e) => warn!(component_id, url = %url, error = %e, "Media cleanup failed"),
        }
    }
    if !urls.is_empty() {
        info!(component_id, deleted, total = urls.len(), "Component media cleanup finished");
    }
    deleted
}
