//! User document schema
//!
//! One document per identity-provider subject; the document ID is the token
//! `sub`. Counters are maintained by follow, favorite and upload side effects.

use bson::doc;
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use super::{lenient_i64, timestamp, Timestamp};
use crate::db::mongo::IntoIndexes;

/// Collection name for users
pub const USER_COLLECTION: &str = "users";

/// User document
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserDoc {
    /// Identity-provider subject (document ID)
    #[serde(default)]
    pub id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,

    /// Unique handle, 3-30 chars of [A-Za-z0-9_-]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    /// Never exposed on public profile reads
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub github: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub twitter: Option<String>,

    #[serde(default, deserialize_with = "lenient_i64")]
    pub followers: i64,

    #[serde(default, deserialize_with = "lenient_i64")]
    pub following: i64,

    #[serde(default, deserialize_with = "lenient_i64")]
    pub total_components: i64,

    #[serde(default, deserialize_with = "lenient_i64")]
    pub total_likes: i64,

    #[serde(default, deserialize_with = "timestamp::lenient", skip_serializing_if = "Option::is_none")]
    pub created_at: Option<Timestamp>,

    #[serde(default, deserialize_with = "timestamp::lenient", skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<Timestamp>,
}

impl UserDoc {
    /// Fresh user record with zeroed counters
    pub fn new(id: &str) -> Self {
        let now = Timestamp::now();
        Self {
            id: id.to_string(),
            created_at: Some(now),
            updated_at: Some(now),
            ..Default::default()
        }
    }

    /// Public view of the profile (email removed)
    pub fn public(mut self) -> Self {
        self.email = None;
        self
    }
}

impl IntoIndexes for UserDoc {
    fn into_indices() -> Vec<(bson::Document, Option<IndexOptions>)> {
        vec![
            (
                doc! { "username": 1 },
                Some(
                    IndexOptions::builder()
                        .name(Some("username_index".to_string()))
                        .sparse(Some(true))
                        .build(),
                ),
            ),
            (doc! { "createdAt.seconds": -1 }, None),
        ]
    }
}

/// Validate a username: 3-30 characters of letters, digits, `_` or `-`
pub fn validate_username(username: &str) -> Result<(), String> {
    let len = username.chars().count();
    if !(3..=30).contains(&len) {
        return Err("Username must be between 3 and 30 characters".to_string());
    }
    if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(
            "Username can only contain letters, numbers, underscores and hyphens".to_string(),
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_validate_username() {
        assert!(validate_username("ada_l-1").is_ok());
        assert!(validate_username("ab").is_err());
        assert!(validate_username(&"a".repeat(31)).is_err());
        assert!(validate_username("has space").is_err());
    }

    #[test]
    fn test_public_hides_email() {
        let mut user = UserDoc::new("u1");
        user.email = Some("ada@example.com".into());
        let value = serde_json::to_value(user.public()).unwrap();
        assert!(value.get("email").is_none());
        assert_eq!(value["followers"], json!(0));
    }

    #[test]
    fn test_tolerates_float_counters() {
        let user: UserDoc =
            serde_json::from_value(json!({ "id": "u1", "followers": 12.0 })).unwrap();
        assert_eq!(user.followers, 12);
        assert!(user.created_at.is_none());
    }
}
