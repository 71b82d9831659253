//! Platform-wide statistics
//!
//! Totals come from count queries; downloads and rating need the per-document
//! fallbacks so they scan public components. Any failure degrades to a
//! zeroed payload.

use serde::Serialize;
use std::collections::HashSet;
use tracing::warn;

use crate::db::schemas::{
    ComponentDoc, COLLECTION_COLLECTION, COMPONENT_COLLECTION, USER_COLLECTION,
};
use crate::db::{fetch_all, DocumentStore, Filter, Query, SortDirection};
use crate::types::VaultError;

/// Default size of the trending list
pub const DEFAULT_TRENDING: usize = 5;

/// Trending component summary
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendingComponent {
    pub id: String,
    pub title: String,
    pub author_id: String,
    pub author_name: String,
    pub category: String,
    pub likes: i64,
    pub downloads: i64,
    pub views: i64,
}

impl From<&ComponentDoc> for TrendingComponent {
    fn from(doc: &ComponentDoc) -> Self {
        Self {
            id: doc.id.clone(),
            title: doc.title.clone(),
            author_id: doc.author_id.clone(),
            author_name: doc.author_name.clone(),
            category: doc.category.clone(),
            likes: doc.likes,
            downloads: doc.effective_downloads(),
            views: doc.views,
        }
    }
}

/// Sitewide statistics payload
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformStats {
    pub total_components: u64,
    pub public_components: u64,
    pub total_users: u64,
    pub total_collections: u64,
    pub total_downloads: i64,
    pub average_rating: f64,
    /// Distinct authors with at least one public component
    pub active_users: usize,
    pub trending: Vec<TrendingComponent>,
}

/// Aggregates that need a full scan of public components
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScanTotals {
    pub total_downloads: i64,
    pub average_rating: f64,
    pub active_users: usize,
}

/// Compute scan-based totals over public components
pub fn scan_totals(components: &[ComponentDoc]) -> ScanTotals {
    let authors: HashSet<&str> = components
        .iter()
        .map(|c| c.author_id.as_str())
        .filter(|a| !a.is_empty())
        .collect();

    let rated: Vec<f64> = components
        .iter()
        .map(ComponentDoc::effective_rating)
        .filter(|r| *r > 0.0)
        .collect();
    let average_rating = if rated.is_empty() {
        0.0
    } else {
        rated.iter().sum::<f64>() / rated.len() as f64
    };

    ScanTotals {
        total_downloads: components.iter().map(ComponentDoc::effective_downloads).sum(),
        average_rating,
        active_users: authors.len(),
    }
}

async fn collect(
    store: &dyn DocumentStore,
    trending_limit: usize,
) -> Result<PlatformStats, VaultError> {
    let public = [Filter::eq("isPublic", true)];

    let total_components = store.count(COMPONENT_COLLECTION, &[]).await?;
    let public_components = store.count(COMPONENT_COLLECTION, &public).await?;
    let total_users = store.count(USER_COLLECTION, &[]).await?;
    let total_collections = store.count(COLLECTION_COLLECTION, &[]).await?;

    let components: Vec<ComponentDoc> = fetch_all(
        store,
        COMPONENT_COLLECTION,
        &Query::all().where_eq("isPublic", true),
    )
    .await?;
    let totals = scan_totals(&components);

    let trending: Vec<ComponentDoc> = fetch_all(
        store,
        COMPONENT_COLLECTION,
        &Query::all()
            .where_eq("isPublic", true)
            .order_by("likes", SortDirection::Desc)
            .limit(trending_limit),
    )
    .await?;

    Ok(PlatformStats {
        total_components,
        public_components,
        total_users,
        total_collections,
        total_downloads: totals.total_downloads,
        average_rating: totals.average_rating,
        active_users: totals.active_users,
        trending: trending.iter().map(TrendingComponent::from).collect(),
    })
}

/// Collect platform statistics, degrading to zeros on failure
pub async fn platform_stats(store: &dyn DocumentStore, trending_limit: usize) -> PlatformStats {
    match collect(store, trending_limit).await {
        Ok(stats) => stats,
        Err(e) => {
            warn!(error = %e, "Platform stats unavailable, returning zeros");
            PlatformStats::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;
    use serde_json::json;

    fn component(author: &str, downloads: i64, rating: f64) -> ComponentDoc {
        ComponentDoc {
            author_id: author.into(),
            downloads: Some(downloads),
            rating: Some(rating),
            is_public: true,
            ..Default::default()
        }
    }

    #[test]
    fn test_scan_totals() {
        let totals = scan_totals(&[
            component("a", 10, 4.0),
            component("a", 5, 0.0),
            component("b", 1, 2.0),
        ]);
        assert_eq!(totals.total_downloads, 16);
        assert_eq!(totals.average_rating, 3.0);
        assert_eq!(totals.active_users, 2);
    }

    #[test]
    fn test_scan_totals_empty() {
        assert_eq!(scan_totals(&[]), ScanTotals::default());
    }

    #[tokio::test]
    async fn test_platform_stats_from_store() {
        let store = MemoryStore::new();
        store
            .create("components", "c1", json!({ "authorId": "u1", "likes": 3, "copies": 7, "isPublic": true }))
            .await
            .unwrap();
        store
            .create("components", "c2", json!({ "authorId": "u2", "likes": 9, "downloads": 1, "isPublic": true }))
            .await
            .unwrap();
        store
            .create("components", "c3", json!({ "authorId": "u3", "likes": 50, "isPublic": false }))
            .await
            .unwrap();
        store.create("users", "u1", json!({})).await.unwrap();
        store.create("collections", "col1", json!({ "userId": "u1" })).await.unwrap();

        let stats = platform_stats(&store, 1).await;
        assert_eq!(stats.total_components, 3);
        assert_eq!(stats.public_components, 2);
        assert_eq!(stats.total_users, 1);
        assert_eq!(stats.total_collections, 1);
        assert_eq!(stats.total_downloads, 8);
        assert_eq!(stats.active_users, 2);
        assert_eq!(stats.trending.len(), 1);
        assert_eq!(stats.trending[0].id, "c2");
    }
}
