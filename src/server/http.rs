//! HTTP server implementation
//!
//! Uses hyper http1 with TokioIo for async handling. Each connection gets
//! its own task; requests are routed by path prefix.

use bytes::Bytes;
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::Incoming;
use hyper::header::AUTHORIZATION;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

use crate::auth::JwtValidator;
use crate::config::Args;
use crate::db::{DocumentStore, MemoryStore};
use crate::routes::{self, ApiRequest};
use crate::search::{spawn_sync_task, MemorySearchIndex, RetryPolicy, SearchIndex, SearchSync};
use crate::services::{MediaStore, NoopMediaStore};
use crate::types::VaultError;

type BoxBody = http_body_util::combinators::BoxBody<Bytes, hyper::Error>;

/// Largest accepted request body (component source plus metadata)
const MAX_BODY_BYTES: usize = 5 * 1024 * 1024;

/// Shared application state
pub struct AppState {
    pub args: Args,
    /// Document store (MongoDB, or in-memory in dev mode)
    pub store: Arc<dyn DocumentStore>,
    /// Hosted search index (Meilisearch, or in-memory)
    pub search: Arc<dyn SearchIndex>,
    /// Store-to-index synchronizer
    pub sync: Arc<SearchSync>,
    /// Media storage used for image cleanup
    pub media: Arc<dyn MediaStore>,
    /// Bearer token validator
    pub jwt: JwtValidator,
    pub started_at: Instant,
}

impl AppState {
    /// Assemble state from already-connected backends
    pub fn new(
        args: Args,
        store: Arc<dyn DocumentStore>,
        search: Arc<dyn SearchIndex>,
        media: Arc<dyn MediaStore>,
    ) -> Result<Self, VaultError> {
        let secret = args
            .jwt_secret()
            .ok_or_else(|| VaultError::Config("JWT_SECRET is required in production mode".into()))?;
        let jwt = JwtValidator::new(secret, args.jwt_issuer.clone())?;
        let retry = RetryPolicy::with_max_retries(args.search_sync_max_retries)
            .repair_every(Duration::from_secs(args.search_sync_repair_secs.max(1)));
        let sync = Arc::new(SearchSync::new(Arc::clone(&search), retry));

        Ok(Self {
            args,
            store,
            search,
            sync,
            media,
            jwt,
            started_at: Instant::now(),
        })
    }

    /// State backed entirely by in-process doubles
    pub fn in_memory(args: Args) -> Result<Self, VaultError> {
        Self::new(
            args,
            Arc::new(MemoryStore::new()),
            Arc::new(MemorySearchIndex::new()),
            Arc::new(NoopMediaStore),
        )
    }
}

/// Run the HTTP server until Ctrl-C
pub async fn run(state: Arc<AppState>) -> Result<(), VaultError> {
    let listener = TcpListener::bind(state.args.listen).await?;

    info!(
        "ComponentVault listening on {} (store: {}, search: {})",
        state.args.listen,
        state.store.backend(),
        state.search.backend()
    );

    if state.args.dev_mode {
        warn!("Development mode enabled - in-memory fallbacks and dev JWT secret allowed");
    }

    if state.args.search_sync_enabled {
        spawn_sync_task(Arc::clone(&state.sync), Arc::clone(&state.store));
        info!(
            "Search sync enabled (max {} retries per event)",
            state.args.search_sync_max_retries
        );
    } else {
        info!("Search sync disabled");
    }

    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, addr)) => {
                    let state = Arc::clone(&state);
                    tokio::spawn(async move {
                        let io = TokioIo::new(stream);

                        let service = service_fn(move |req| {
                            let state = Arc::clone(&state);
                            async move { handle_request(state, addr, req).await }
                        });

                        if let Err(err) = http1::Builder::new()
                            .serve_connection(io, service)
                            .await
                        {
                            error!("Error serving connection from {}: {:?}", addr, err);
                        }
                    });
                }
                Err(e) => {
                    error!("Failed to accept connection: {}", e);
                }
            },
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received");
                state.sync.shutdown();
                return Ok(());
            }
        }
    }
}

/// Route a request
async fn handle_request(
    state: Arc<AppState>,
    addr: SocketAddr,
    req: Request<Incoming>,
) -> Result<Response<BoxBody>, hyper::Error> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    debug!("[{}] {} {}", addr, method, path);

    if method == Method::OPTIONS {
        return Ok(to_boxed(preflight_response()));
    }

    match (&method, path.as_str()) {
        (&Method::GET, "/health") => return Ok(to_boxed(routes::health_check(state))),
        (&Method::GET, "/version") => return Ok(to_boxed(routes::version_info())),
        _ => {}
    }

    let Some(api_path) = path
        .strip_prefix("/api")
        .filter(|rest| rest.is_empty() || rest.starts_with('/'))
    else {
        return Ok(to_boxed(not_found_response(&path)));
    };

    let query = req.uri().query().map(str::to_string);
    let auth_header = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .map(str::to_string);

    let body = match Limited::new(req.into_body(), MAX_BODY_BYTES).collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) if e.is::<LengthLimitError>() => {
            warn!("[{}] Request body over {} bytes rejected", addr, MAX_BODY_BYTES);
            return Ok(to_boxed(payload_too_large_response()));
        }
        Err(e) => {
            warn!("[{}] Failed to read request body: {}", addr, e);
            return Ok(to_boxed(bad_request_response("Request body could not be read")));
        }
    };

    let mut api_req = ApiRequest::new(method, api_path, query.as_deref());
    api_req.auth_header = auth_header;
    api_req.body = body;

    Ok(to_boxed(routes::handle_api_request(state, api_req).await))
}

/// Convert Full<Bytes> response to BoxBody response
fn to_boxed(response: Response<Full<Bytes>>) -> Response<BoxBody> {
    response.map(|body| body.map_err(|never| match never {}).boxed())
}

/// CORS preflight response
fn preflight_response() -> Response<Full<Bytes>> {
    Response::builder()
        .status(StatusCode::OK)
        .header("Access-Control-Allow-Origin", "*")
        .header("Access-Control-Allow-Headers", "Authorization, Content-Type")
        .header("Access-Control-Allow-Methods", "GET, POST, PUT, DELETE, OPTIONS")
        .header("Access-Control-Max-Age", "86400")
        .body(Full::new(Bytes::new()))
        .unwrap()
}

/// Not found response
fn not_found_response(path: &str) -> Response<Full<Bytes>> {
    let body = serde_json::json!({
        "error": "Not Found",
        "path": path,
        "hint": "API routes live under /api"
    });

    Response::builder()
        .status(StatusCode::NOT_FOUND)
        .header("Content-Type", "application/json")
        .header("Access-Control-Allow-Origin", "*")
        .body(Full::new(Bytes::from(body.to_string())))
        .unwrap()
}

/// Bad request response
fn bad_request_response(message: &str) -> Response<Full<Bytes>> {
    error_body(StatusCode::BAD_REQUEST, message)
}

/// Body over `MAX_BODY_BYTES`
fn payload_too_large_response() -> Response<Full<Bytes>> {
    error_body(StatusCode::PAYLOAD_TOO_LARGE, "Request body too large")
}

fn error_body(status: StatusCode, message: &str) -> Response<Full<Bytes>> {
    let body = serde_json::json!({ "error": message });

    Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .header("Access-Control-Allow-Origin", "*")
        .body(Full::new(Bytes::from(body.to_string())))
        .unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_memory_state() {
        let state = AppState::in_memory(Args::for_dev()).unwrap();
        assert_eq!(state.store.backend(), "memory");
        assert_eq!(state.search.backend(), "memory");
    }

    #[test]
    fn test_production_state_requires_secret() {
        let mut args = Args::for_dev();
        args.dev_mode = false;
        args.jwt_secret = None;
        assert!(matches!(AppState::in_memory(args), Err(VaultError::Config(_))));
    }

    #[tokio::test]
    async fn test_oversized_body_is_413() {
        let oversized = Full::new(Bytes::from(vec![b'x'; MAX_BODY_BYTES + 1]));
        let err = Limited::new(oversized, MAX_BODY_BYTES).collect().await.unwrap_err();
        assert!(err.is::<LengthLimitError>());

        let response = payload_too_large_response();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"], "Request body too large");
    }

    #[test]
    fn test_preflight_allows_api_methods() {
        let response = preflight_response();
        assert_eq!(response.status(), StatusCode::OK);
        let methods = response.headers()["Access-Control-Allow-Methods"].to_str().unwrap();
        assert!(methods.contains("PUT"));
        assert!(methods.contains("DELETE"));
    }
}
