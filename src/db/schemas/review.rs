//! Review and review vote schemas
//!
//! A review is keyed by the encoded `userId:componentId` pair (one per user and
//! component); a vote by `reviewId:userId` (one per user and review).

use bson::doc;
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use super::{lenient_i64, timestamp, Timestamp};
use crate::db::mongo::IntoIndexes;

/// Collection name for reviews
pub const REVIEW_COLLECTION: &str = "reviews";

/// Collection name for review votes
pub const REVIEW_VOTE_COLLECTION: &str = "reviewVotes";

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ReviewDoc {
    #[serde(default)]
    pub id: String,
    pub component_id: String,
    pub user_id: String,
    #[serde(default)]
    pub user_name: String,
    /// 1 to 5 stars
    #[serde(default, deserialize_with = "lenient_i64")]
    pub rating: i64,
    #[serde(default)]
    pub comment: String,
    /// Count of "helpful" votes
    #[serde(default, deserialize_with = "lenient_i64")]
    pub helpful: i64,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub not_helpful: i64,
    #[serde(default, deserialize_with = "timestamp::lenient", skip_serializing_if = "Option::is_none")]
    pub created_at: Option<Timestamp>,
    #[serde(default, deserialize_with = "timestamp::lenient", skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<Timestamp>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ReviewVoteDoc {
    #[serde(default)]
    pub id: String,
    pub review_id: String,
    pub user_id: String,
    pub helpful: bool,
    #[serde(default, deserialize_with = "timestamp::lenient", skip_serializing_if = "Option::is_none")]
    pub created_at: Option<Timestamp>,
}

/// Composite document ID of a review
pub fn review_id(user_id: &str, component_id: &str) -> String {
    super::join_key(&[user_id, component_id])
}

/// Composite document ID of a review vote
pub fn review_vote_id(review_id: &str, user_id: &str) -> String {
    super::join_key(&[review_id, user_id])
}

/// Validate a star rating (integer 1 to 5)
pub fn validate_rating(rating: &serde_json::Value) -> Result<i64, String> {
    rating
        .as_i64()
        .filter(|r| (1..=5).contains(r))
        .ok_or_else(|| "Rating must be an integer between 1 and 5".to_string())
}

/// Mean rating of a set of reviews, 0 when empty
pub fn average_rating(reviews: &[ReviewDoc]) -> f64 {
    if reviews.is_empty() {
        return 0.0;
    }
    let total: i64 = reviews.iter().map(|r| r.rating).sum();
    total as f64 / reviews.len() as f64
}

impl IntoIndexes for ReviewDoc {
    fn into_indices() -> Vec<(bson::Document, Option<IndexOptions>)> {
        vec![(doc! { "componentId": 1, "createdAt.seconds": -1 }, None)]
    }
}

impl IntoIndexes for ReviewVoteDoc {
    fn into_indices() -> Vec<(bson::Document, Option<IndexOptions>)> {
        vec![(doc! { "reviewId": 1 }, None)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_validate_rating() {
        assert_eq!(validate_rating(&json!(5)), Ok(5));
        assert!(validate_rating(&json!(0)).is_err());
        assert!(validate_rating(&json!(6)).is_err());
        assert!(validate_rating(&json!(4.5)).is_err());
        assert!(validate_rating(&json!("4")).is_err());
    }

    #[test]
    fn test_average_rating() {
        let review = |rating| ReviewDoc {
            rating,
            ..Default::default()
        };
        assert_eq!(average_rating(&[]), 0.0);
        assert_eq!(average_rating(&[review(5), review(4)]), 4.5);
    }
}
