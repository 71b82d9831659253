//! Activity log document schema (append-only)

use bson::doc;
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use super::{timestamp, Timestamp};
use crate::db::mongo::IntoIndexes;

/// Collection name for activities
pub const ACTIVITY_COLLECTION: &str = "activities";

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ActivityDoc {
    #[serde(default)]
    pub id: String,
    pub user_id: String,
    /// Event type, e.g. "upload", "favorite", "follow", "review", "comment"
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub target_id: String,
    #[serde(default)]
    pub target_type: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, deserialize_with = "timestamp::lenient", skip_serializing_if = "Option::is_none")]
    pub created_at: Option<Timestamp>,
}

impl IntoIndexes for ActivityDoc {
    fn into_indices() -> Vec<(bson::Document, Option<IndexOptions>)> {
        vec![(doc! { "userId": 1, "createdAt.seconds": -1 }, None)]
    }
}
