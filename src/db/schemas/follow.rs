//! Follow join document, keyed by the encoded `followerId:followingId` pair

use bson::doc;
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use super::{timestamp, Timestamp};
use crate::db::mongo::IntoIndexes;

/// Collection name for follows
pub const FOLLOW_COLLECTION: &str = "follows";

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FollowDoc {
    #[serde(default)]
    pub id: String,
    /// User doing the following
    pub follower_id: String,
    /// User being followed
    pub following_id: String,
    #[serde(default, deserialize_with = "timestamp::lenient", skip_serializing_if = "Option::is_none")]
    pub created_at: Option<Timestamp>,
}

impl FollowDoc {
    pub fn new(follower_id: &str, following_id: &str) -> Self {
        Self {
            id: follow_id(follower_id, following_id),
            follower_id: follower_id.to_string(),
            following_id: following_id.to_string(),
            created_at: Some(Timestamp::now()),
        }
    }
}

/// Composite document ID of a follow
pub fn follow_id(follower_id: &str, following_id: &str) -> String {
    super::join_key(&[follower_id, following_id])
}

impl IntoIndexes for FollowDoc {
    fn into_indices() -> Vec<(bson::Document, Option<IndexOptions>)> {
        vec![
            (doc! { "followerId": 1 }, None),
            (doc! { "followingId": 1 }, None),
        ]
    }
}
