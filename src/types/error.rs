//! Error types for ComponentVault
//!
//! Every handler returns `Result<_, VaultError>`; the router turns the error
//! into a JSON `{error, details?}` body with the matching status code.

use hyper::StatusCode;
use serde::Serialize;

/// Main error type for ComponentVault operations
#[derive(Debug, thiserror::Error)]
pub enum VaultError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// A join document with the same composite key already exists
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Search index error: {0}")]
    Search(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Authentication error: {0}")]
    Auth(String),
}

/// JSON error envelope returned to clients
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl VaultError {
    /// Convert error to HTTP status code
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::AlreadyExists(_) => StatusCode::BAD_REQUEST,
            Self::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Search(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Storage(_) => StatusCode::BAD_GATEWAY,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Auth(_) => StatusCode::UNAUTHORIZED,
        }
    }

    /// Client-facing body. 4xx errors carry their message as `error`;
    /// server-side failures get a generic `error` with the cause in `details`.
    pub fn to_body(&self) -> ErrorBody {
        match self {
            Self::BadRequest(msg)
            | Self::Unauthorized(msg)
            | Self::Forbidden(msg)
            | Self::NotFound(msg)
            | Self::AlreadyExists(msg)
            | Self::Auth(msg) => ErrorBody {
                error: msg.clone(),
                details: None,
            },
            Self::Database(msg)
            | Self::Search(msg)
            | Self::Storage(msg)
            | Self::Internal(msg)
            | Self::Config(msg) => ErrorBody {
                error: "Internal server error".to_string(),
                details: Some(msg.clone()),
            },
        }
    }

    /// Convert to status code and body tuple for HTTP response
    pub fn into_status_code_and_body(self) -> (StatusCode, String) {
        let status = self.status_code();
        let body = serde_json::to_string(&self.to_body())
            .unwrap_or_else(|_| r#"{"error":"Internal server error"}"#.to_string());
        (status, body)
    }
}

// Implement From conversions for common error types

impl From<std::io::Error> for VaultError {
    fn from(err: std::io::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<serde_json::Error> for VaultError {
    fn from(err: serde_json::Error) -> Self {
        Self::BadRequest(format!("Invalid JSON: {}", err))
    }
}

impl From<hyper::Error> for VaultError {
    fn from(err: hyper::Error) -> Self {
        Self::Internal(format!("HTTP error: {}", err))
    }
}

impl From<mongodb::error::Error> for VaultError {
    fn from(err: mongodb::error::Error) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<bson::ser::Error> for VaultError {
    fn from(err: bson::ser::Error) -> Self {
        Self::Database(format!("BSON encode failed: {}", err))
    }
}

impl From<bson::de::Error> for VaultError {
    fn from(err: bson::de::Error) -> Self {
        Self::Database(format!("BSON decode failed: {}", err))
    }
}

impl From<jsonwebtoken::errors::Error> for VaultError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        Self::Unauthorized(format!("JWT error: {}", err))
    }
}

impl From<meilisearch_sdk::errors::Error> for VaultError {
    fn from(err: meilisearch_sdk::errors::Error) -> Self {
        Self::Search(err.to_string())
    }
}

impl From<reqwest::Error> for VaultError {
    fn from(err: reqwest::Error) -> Self {
        Self::Storage(err.to_string())
    }
}

/// Result type alias for ComponentVault operations
pub type Result<T> = std::result::Result<T, VaultError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_errors_keep_message() {
        let (status, body) = VaultError::NotFound("Component not found".into())
            .into_status_code_and_body();
        assert_eq!(status, StatusCode::NOT_FOUND);
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["error"], "Component not found");
        assert!(json.get("details").is_none());
    }

    #[test]
    fn test_server_errors_move_cause_to_details() {
        let (status, body) = VaultError::Database("connection reset".into())
            .into_status_code_and_body();
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["error"], "Internal server error");
        assert_eq!(json["details"], "connection reset");
    }

    #[test]
    fn test_duplicate_join_is_bad_request() {
        let err = VaultError::AlreadyExists("favorites/u1_c1".into());
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }
}
