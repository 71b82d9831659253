//! Component document schema

use bson::doc;
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use super::{lenient_i64, lenient_opt_f64, lenient_opt_i64, timestamp, Timestamp};
use crate::db::mongo::IntoIndexes;

/// Collection name for components
pub const COMPONENT_COLLECTION: &str = "components";

/// Legacy nested metrics carried by older uploads
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct ComponentStats {
    #[serde(default, deserialize_with = "lenient_opt_i64", skip_serializing_if = "Option::is_none")]
    pub downloads: Option<i64>,

    #[serde(default, deserialize_with = "lenient_opt_f64", skip_serializing_if = "Option::is_none")]
    pub rating: Option<f64>,
}

/// Component document
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ComponentDoc {
    #[serde(default)]
    pub id: String,

    #[serde(default)]
    pub title: String,

    #[serde(default)]
    pub description: String,

    /// Source code of the component
    #[serde(default)]
    pub code: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview_image: Option<String>,

    #[serde(default)]
    pub images: Vec<String>,

    #[serde(default)]
    pub tags: Vec<String>,

    #[serde(default)]
    pub category: String,

    #[serde(default)]
    pub framework: String,

    #[serde(default)]
    pub language: String,

    #[serde(default)]
    pub styling: String,

    #[serde(default)]
    pub source_type: String,

    /// Owner user ID
    #[serde(default)]
    pub author_id: String,

    /// Denormalized owner display name
    #[serde(default)]
    pub author_name: String,

    #[serde(default, deserialize_with = "lenient_i64")]
    pub views: i64,

    #[serde(default, deserialize_with = "lenient_opt_i64", skip_serializing_if = "Option::is_none")]
    pub downloads: Option<i64>,

    /// Legacy name of `downloads`
    #[serde(default, deserialize_with = "lenient_opt_i64", skip_serializing_if = "Option::is_none")]
    pub copies: Option<i64>,

    #[serde(default, deserialize_with = "lenient_i64")]
    pub likes: i64,

    /// Mean review rating
    #[serde(default, deserialize_with = "lenient_opt_f64", skip_serializing_if = "Option::is_none")]
    pub rating: Option<f64>,

    #[serde(default, deserialize_with = "lenient_i64")]
    pub review_count: i64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stats: Option<ComponentStats>,

    #[serde(default)]
    pub is_public: bool,

    #[serde(default, deserialize_with = "timestamp::lenient", skip_serializing_if = "Option::is_none")]
    pub created_at: Option<Timestamp>,

    #[serde(default, deserialize_with = "timestamp::lenient", skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<Timestamp>,
}

impl ComponentDoc {
    /// Downloads with legacy fallbacks: `downloads`, then `copies`, then
    /// `stats.downloads`, else 0
    pub fn effective_downloads(&self) -> i64 {
        self.downloads
            .or(self.copies)
            .or_else(|| self.stats.as_ref().and_then(|s| s.downloads))
            .unwrap_or(0)
    }

    /// Rating preferring nested `stats.rating` over the flat field, else 0
    pub fn effective_rating(&self) -> f64 {
        self.stats
            .as_ref()
            .and_then(|s| s.rating)
            .or(self.rating)
            .unwrap_or(0.0)
    }

    /// Every media URL owned by this component
    pub fn media_urls(&self) -> Vec<String> {
        let mut urls: Vec<String> = self.preview_image.iter().cloned().collect();
        for image in &self.images {
            if !urls.contains(image) {
                urls.push(image.clone());
            }
        }
        urls.retain(|u| !u.is_empty());
        urls
    }
}

impl IntoIndexes for ComponentDoc {
    fn into_indices() -> Vec<(bson::Document, Option<IndexOptions>)> {
        vec![
            (doc! { "authorId": 1 }, None),
            (doc! { "isPublic": 1, "createdAt.seconds": -1 }, None),
            (doc! { "isPublic": 1, "likes": -1 }, None),
            (doc! { "category": 1 }, None),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn component(value: serde_json::Value) -> ComponentDoc {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_download_fallbacks() {
        assert_eq!(component(json!({ "downloads": 7, "copies": 3 })).effective_downloads(), 7);
        assert_eq!(component(json!({ "copies": 3 })).effective_downloads(), 3);
        assert_eq!(
            component(json!({ "stats": { "downloads": 9 } })).effective_downloads(),
            9
        );
        assert_eq!(component(json!({})).effective_downloads(), 0);
    }

    #[test]
    fn test_rating_prefers_nested_stats() {
        assert_eq!(
            component(json!({ "rating": 3.0, "stats": { "rating": 4.5 } })).effective_rating(),
            4.5
        );
        assert_eq!(component(json!({ "rating": 3.0 })).effective_rating(), 3.0);
        assert_eq!(component(json!({})).effective_rating(), 0.0);
    }

    #[test]
    fn test_media_urls_dedup() {
        let doc = component(json!({
            "previewImage": "https://cdn/a.png",
            "images": ["https://cdn/a.png", "https://cdn/b.png", ""]
        }));
        assert_eq!(doc.media_urls(), vec!["https://cdn/a.png", "https://cdn/b.png"]);
    }
}
