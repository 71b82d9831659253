//! Collection document schema
//!
//! A named, user-owned set of component IDs. `componentIds` is only ever
//! mutated through array union/remove so it never holds duplicates.

use bson::doc;
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use super::{lenient_i64, timestamp, Timestamp};
use crate::db::mongo::IntoIndexes;

/// Collection name for collections
pub const COLLECTION_COLLECTION: &str = "collections";

/// Collection document
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CollectionDoc {
    #[serde(default)]
    pub id: String,

    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub description: String,

    /// Owner user ID
    #[serde(default)]
    pub user_id: String,

    #[serde(default)]
    pub component_ids: Vec<String>,

    #[serde(default)]
    pub is_public: bool,

    #[serde(default, deserialize_with = "lenient_i64")]
    pub likes: i64,

    #[serde(default, deserialize_with = "timestamp::lenient", skip_serializing_if = "Option::is_none")]
    pub created_at: Option<Timestamp>,

    #[serde(default, deserialize_with = "timestamp::lenient", skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<Timestamp>,
}

impl IntoIndexes for CollectionDoc {
    fn into_indices() -> Vec<(bson::Document, Option<IndexOptions>)> {
        vec![
            (doc! { "userId": 1 }, None),
            (doc! { "isPublic": 1, "createdAt.seconds": -1 }, None),
        ]
    }
}

/// Order-preserving deduplication of component IDs
pub fn dedup_component_ids(ids: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    ids.into_iter()
        .filter(|id| !id.is_empty() && seen.insert(id.clone()))
        .collect()
}
