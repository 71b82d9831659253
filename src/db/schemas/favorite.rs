//! Favorite join document
//!
//! Keyed by the encoded `userId:componentId` pair so a second favorite of the same
//! component collides on insert.

use bson::doc;
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use super::{timestamp, Timestamp};
use crate::db::mongo::IntoIndexes;

/// Collection name for favorites
pub const FAVORITE_COLLECTION: &str = "favorites";

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FavoriteDoc {
    #[serde(default)]
    pub id: String,
    pub user_id: String,
    pub component_id: String,
    #[serde(default, deserialize_with = "timestamp::lenient", skip_serializing_if = "Option::is_none")]
    pub created_at: Option<Timestamp>,
}

impl FavoriteDoc {
    pub fn new(user_id: &str, component_id: &str) -> Self {
        Self {
            id: favorite_id(user_id, component_id),
            user_id: user_id.to_string(),
            component_id: component_id.to_string(),
            created_at: Some(Timestamp::now()),
        }
    }
}

/// Composite document ID of a favorite
pub fn favorite_id(user_id: &str, component_id: &str) -> String {
    super::join_key(&[user_id, component_id])
}

impl IntoIndexes for FavoriteDoc {
    fn into_indices() -> Vec<(bson::Document, Option<IndexOptions>)> {
        vec![
            (doc! { "userId": 1, "createdAt.seconds": -1 }, None),
            (doc! { "componentId": 1 }, None),
        ]
    }
}
