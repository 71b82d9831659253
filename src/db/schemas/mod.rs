//! Document schemas for ComponentVault
//!
//! Field names are camelCase on the wire and in the store. Numeric counters
//! are read leniently since older documents may hold them as floats.

mod activity;
mod collection;
mod comment;
mod component;
mod favorite;
mod follow;
mod review;
pub mod timestamp;
mod user;

pub use activity::{ActivityDoc, ACTIVITY_COLLECTION};
pub use collection::{dedup_component_ids, CollectionDoc, COLLECTION_COLLECTION};
pub use comment::{validate_content, CommentDoc, COMMENT_COLLECTION, MAX_COMMENT_LENGTH};
pub use component::{ComponentDoc, ComponentStats, COMPONENT_COLLECTION};
pub use favorite::{favorite_id, FavoriteDoc, FAVORITE_COLLECTION};
pub use follow::{follow_id, FollowDoc, FOLLOW_COLLECTION};
pub use review::{
    average_rating, review_id, review_vote_id, validate_rating, ReviewDoc, ReviewVoteDoc,
    REVIEW_COLLECTION, REVIEW_VOTE_COLLECTION,
};
pub use timestamp::Timestamp;
pub use user::{validate_username, UserDoc, USER_COLLECTION};

use serde::{Deserialize, Deserializer};
use serde_json::Value as JsonValue;

/// Composite document ID from its parts.
///
/// Each part is percent-encoded before joining with `:`. Encoded parts never
/// contain `:`, so two different tuples can never share a key.
pub fn join_key(parts: &[&str]) -> String {
    parts
        .iter()
        .map(|part| urlencoding::encode(part))
        .collect::<Vec<_>>()
        .join(":")
}

fn number(value: Option<JsonValue>) -> Option<f64> {
    match value? {
        JsonValue::Number(n) => n.as_f64(),
        _ => None,
    }
}

/// Counter that tolerates floats and null (rounded, default 0)
pub(crate) fn lenient_i64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    Ok(lenient_opt_i64(deserializer)?.unwrap_or(0))
}

pub(crate) fn lenient_opt_i64<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<i64>, D::Error> {
    let value = Option::<JsonValue>::deserialize(deserializer)?;
    Ok(number(value).map(|n| n.round() as i64))
}

pub(crate) fn lenient_opt_f64<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<f64>, D::Error> {
    let value = Option::<JsonValue>::deserialize(deserializer)?;
    Ok(number(value))
}
