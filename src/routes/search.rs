//! Search maintenance route

use hyper::StatusCode;
use serde_json::json;
use tracing::{error, info};

use super::{success_response, ApiRequest, ApiResult};
use crate::server::AppState;
use crate::types::VaultError;

/// POST /api/search/resync
pub async fn resync(state: &AppState, req: &ApiRequest) -> ApiResult {
    let user = req.user(state)?;
    info!(user_id = %user.uid, "Full search resync requested");

    let report = state
        .sync
        .full_resync(state.store.as_ref())
        .await
        .map_err(|e| {
            error!(error = %e, "Search resync failed");
            VaultError::Internal("Search resync failed".into())
        })?;

    success_response(
        StatusCode::OK,
        "Search index resynced",
        json!({ "counts": report }),
    )
}
