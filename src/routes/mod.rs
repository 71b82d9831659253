//! HTTP routes for ComponentVault
//!
//! Every `/api/*` request is parsed once into an [`ApiRequest`] (body bytes
//! already collected) and dispatched by method and path segments. Handlers
//! return `Result<Response, VaultError>`; errors become `{error, details?}`
//! bodies here.

pub mod collections;
pub mod comments;
pub mod components;
pub mod favorites;
pub mod follows;
pub mod health;
pub mod leaderboard;
pub mod profile;
pub mod reviews;
pub mod search;
pub mod stats;
pub mod users;

pub use health::{health_check, version_info};

use bytes::Bytes;
use http_body_util::Full;
use hyper::{Method, Response, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error};

use crate::auth::{self, AuthUser};
use crate::server::AppState;
use crate::types::VaultError;

/// Result type of every API handler
pub type ApiResult = Result<Response<Full<Bytes>>, VaultError>;

/// A parsed API request
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    /// Path below `/api`, e.g. `/components/abc`
    pub path: String,
    pub query: HashMap<String, String>,
    pub auth_header: Option<String>,
    pub body: Bytes,
}

impl ApiRequest {
    pub fn new(method: Method, path: &str, query: Option<&str>) -> Self {
        Self {
            method,
            path: path.to_string(),
            query: parse_query_params(query.unwrap_or("")),
            auth_header: None,
            body: Bytes::new(),
        }
    }

    pub fn with_auth(mut self, auth_header: impl Into<String>) -> Self {
        self.auth_header = Some(auth_header.into());
        self
    }

    pub fn with_json(mut self, body: &JsonValue) -> Self {
        self.body = Bytes::from(body.to_string());
        self
    }

    /// Non-empty query parameter
    pub fn param(&self, key: &str) -> Option<&str> {
        self.query
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    /// Deserialize the JSON body
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, VaultError> {
        if self.body.is_empty() {
            return Err(VaultError::BadRequest("Request body is required".into()));
        }
        Ok(serde_json::from_slice(&self.body)?)
    }

    /// Authenticated caller or 401
    pub fn user(&self, state: &AppState) -> Result<AuthUser, VaultError> {
        auth::require_user(&state.jwt, self.auth_header.as_deref())
    }

    /// Authenticated caller, if any
    pub fn optional_user(&self, state: &AppState) -> Option<AuthUser> {
        auth::optional_user(&state.jwt, self.auth_header.as_deref())
    }
}

/// Parse query string into a decoded key-value map
pub fn parse_query_params(query: &str) -> HashMap<String, String> {
    if query.is_empty() {
        return HashMap::new();
    }

    serde_urlencoded::from_str::<Vec<(String, String)>>(query)
        .map(|pairs| pairs.into_iter().collect())
        .unwrap_or_default()
}

/// Build a JSON response
pub fn json_response<T: Serialize>(status: StatusCode, data: &T) -> Response<Full<Bytes>> {
    let body = serde_json::to_vec(data).unwrap_or_default();

    Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .header("Cache-Control", "no-store")
        .header("Access-Control-Allow-Origin", "*")
        .body(Full::new(Bytes::from(body)))
        .unwrap_or_else(|_| internal_error_response())
}

/// `{success: true, message, ...extra}` envelope
pub fn success_response(status: StatusCode, message: &str, extra: JsonValue) -> ApiResult {
    let mut body = serde_json::json!({ "success": true, "message": message });
    if let (Some(obj), JsonValue::Object(extra)) = (body.as_object_mut(), extra) {
        obj.extend(extra);
    }
    Ok(json_response(status, &body))
}

/// Render an error as `{error, details?}`
pub fn error_response(err: VaultError) -> Response<Full<Bytes>> {
    let (status, body) = err.into_status_code_and_body();

    Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .header("Cache-Control", "no-store")
        .header("Access-Control-Allow-Origin", "*")
        .body(Full::new(Bytes::from(body)))
        .unwrap_or_else(|_| internal_error_response())
}

fn internal_error_response() -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from(r#"{"error":"Internal server error"}"#)));
    *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
    response
}

fn not_found(path: &str) -> VaultError {
    VaultError::NotFound(format!("No route for {}", path))
}

/// Split `/components/abc/actions` into decoded segments
fn segments(path: &str) -> Vec<String> {
    path.split('/')
        .filter(|s| !s.is_empty())
        .map(|s| {
            urlencoding::decode(s)
                .map(|d| d.into_owned())
                .unwrap_or_else(|_| s.to_string())
        })
        .collect()
}

/// Dispatch an `/api/*` request
pub async fn handle_api_request(state: Arc<AppState>, req: ApiRequest) -> Response<Full<Bytes>> {
    let owned = segments(&req.path);
    let parts: Vec<&str> = owned.iter().map(String::as_str).collect();
    let state = state.as_ref();

    let result = match (&req.method, parts.as_slice()) {
        // Components
        (&Method::GET, ["components"]) => components::list(state, &req).await,
        (&Method::POST, ["components"]) => components::create(state, &req).await,
        (&Method::GET, ["components", id]) => components::get(state, &req, id).await,
        (&Method::PUT, ["components", id]) => components::update(state, &req, id).await,
        (&Method::DELETE, ["components", id]) => components::delete(state, &req, id).await,
        (&Method::POST, ["components", id, "actions"]) => {
            components::action(state, &req, id).await
        }

        // Collections
        (&Method::GET, ["collections"]) => collections::list(state, &req).await,
        (&Method::POST, ["collections"]) => collections::create(state, &req).await,
        (&Method::GET, ["collections", id]) => collections::get(state, &req, id).await,
        (&Method::PUT, ["collections", id]) => collections::update(state, &req, id).await,
        (&Method::DELETE, ["collections", id]) => collections::delete(state, &req, id).await,
        (&Method::POST, ["collections", id, "components"]) => {
            collections::add_component(state, &req, id).await
        }
        (&Method::DELETE, ["collections", id, "components", component_id]) => {
            collections::remove_component(state, &req, id, component_id).await
        }

        // Favorites
        (&Method::GET, ["favorites"]) => favorites::list(state, &req).await,
        (&Method::POST, ["favorites"]) => favorites::add(state, &req).await,
        (&Method::GET, ["favorites", component_id]) => {
            favorites::check(state, &req, component_id).await
        }
        (&Method::DELETE, ["favorites", component_id]) => {
            favorites::remove(state, &req, component_id).await
        }

        // Follows
        (&Method::GET, ["follows"]) => follows::list(state, &req).await,
        (&Method::POST, ["follows"]) => follows::follow(state, &req).await,
        (&Method::GET, ["follows", user_id]) => follows::check(state, &req, user_id).await,
        (&Method::DELETE, ["follows", user_id]) => follows::unfollow(state, &req, user_id).await,

        // Reviews
        (&Method::GET, ["reviews"]) => reviews::list(state, &req).await,
        (&Method::POST, ["reviews"]) => reviews::create(state, &req).await,
        (&Method::PUT, ["reviews", id]) => reviews::update(state, &req, id).await,
        (&Method::DELETE, ["reviews", id]) => reviews::delete(state, &req, id).await,
        (&Method::POST, ["reviews", id, "vote"]) => reviews::vote(state, &req, id).await,

        // Comments
        (&Method::GET, ["comments"]) => comments::list(state, &req).await,
        (&Method::POST, ["comments"]) => comments::create(state, &req).await,
        (&Method::PUT, ["comments", id]) => comments::update(state, &req, id).await,
        (&Method::DELETE, ["comments", id]) => comments::delete(state, &req, id).await,

        // Users
        (&Method::GET, ["users", id]) => users::get(state, id).await,
        (&Method::GET, ["users", id, "components"]) => users::components(state, id).await,
        (&Method::GET, ["users", id, "activity"]) => users::activity(state, &req, id).await,
        (&Method::GET, ["users", id, "achievements"]) => users::achievements(state, id).await,

        // Profile
        (&Method::GET, ["profile"]) => profile::get(state, &req).await,
        (&Method::PUT, ["profile"]) => profile::update(state, &req).await,
        (&Method::GET, ["profile", "achievements"]) => profile::achievements(state, &req).await,

        // Leaderboard and stats
        (&Method::GET, ["leaderboard"]) => leaderboard::get(state, &req).await,
        (&Method::GET, ["leaderboard", "summary"]) => leaderboard::summary(state).await,
        (&Method::GET, ["stats"]) => stats::get(state, &req).await,

        // Search
        (&Method::POST, ["search", "resync"]) => search::resync(state, &req).await,

        _ => Err(not_found(&req.path)),
    };

    match result {
        Ok(response) => {
            debug!(method = %req.method, path = %req.path, status = %response.status(), "API request handled");
            response
        }
        Err(err) => {
            if err.status_code().is_server_error() {
                error!(method = %req.method, path = %req.path, error = %err, "API request failed");
            } else {
                debug!(method = %req.method, path = %req.path, error = %err, "API request rejected");
            }
            error_response(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_query_params_decodes() {
        let params = parse_query_params("type=rated&limit=5&q=hello%20world&name=a+b");
        assert_eq!(params.get("type").map(String::as_str), Some("rated"));
        assert_eq!(params.get("limit").map(String::as_str), Some("5"));
        assert_eq!(params.get("q").map(String::as_str), Some("hello world"));
        assert_eq!(params.get("name").map(String::as_str), Some("a b"));
        assert!(parse_query_params("").is_empty());
    }

    #[test]
    fn test_segments() {
        assert_eq!(segments("/components/abc/actions"), vec!["components", "abc", "actions"]);
        assert_eq!(segments("/users/a%20b/"), vec!["users", "a b"]);
    }

    #[test]
    fn test_empty_param_is_none() {
        let req = ApiRequest::new(Method::GET, "/components", Some("category=&framework=react"));
        assert_eq!(req.param("category"), None);
        assert_eq!(req.param("framework"), Some("react"));
    }

    #[test]
    fn test_json_requires_body() {
        let req = ApiRequest::new(Method::POST, "/favorites", None);
        let err = req.json::<JsonValue>().unwrap_err();
        assert!(matches!(err, VaultError::BadRequest(_)));
    }
}
