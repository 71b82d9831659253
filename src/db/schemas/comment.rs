//! Comment document schema (flat list per component)

use bson::doc;
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use super::{timestamp, Timestamp};
use crate::db::mongo::IntoIndexes;

/// Collection name for comments
pub const COMMENT_COLLECTION: &str = "comments";

/// Maximum comment length in characters
pub const MAX_COMMENT_LENGTH: usize = 2000;

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CommentDoc {
    #[serde(default)]
    pub id: String,
    pub component_id: String,
    pub user_id: String,
    #[serde(default)]
    pub user_name: String,
    #[serde(default)]
    pub content: String,
    #[serde(default, deserialize_with = "timestamp::lenient", skip_serializing_if = "Option::is_none")]
    pub created_at: Option<Timestamp>,
    #[serde(default, deserialize_with = "timestamp::lenient", skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<Timestamp>,
}

/// Trim and validate comment content
pub fn validate_content(content: &str) -> Result<String, String> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return Err("Comment content is required".to_string());
    }
    if trimmed.chars().count() > MAX_COMMENT_LENGTH {
        return Err(format!(
            "Comment must be at most {} characters",
            MAX_COMMENT_LENGTH
        ));
    }
    Ok(trimmed.to_string())
}

impl IntoIndexes for CommentDoc {
    fn into_indices() -> Vec<(bson::Document, Option<IndexOptions>)> {
        vec![(doc! { "componentId": 1, "createdAt.seconds": 1 }, None)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_content() {
        assert_eq!(validate_content("  nice work \n").unwrap(), "nice work");
        assert!(validate_content("   ").is_err());
        assert!(validate_content(&"x".repeat(MAX_COMMENT_LENGTH)).is_ok());
        assert!(validate_content(&"x".repeat(MAX_COMMENT_LENGTH + 1)).is_err());
    }
}
