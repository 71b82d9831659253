//! Leaderboard routes

use hyper::StatusCode;
use serde_json::json;

use super::{json_response, ApiRequest, ApiResult};
use crate::server::AppState;
use crate::services::leaderboard::{self, parse_limit, LeaderboardType, DEFAULT_LIMIT, MAX_LIMIT};

/// GET /api/leaderboard?type=&period=&limit=
///
/// `period` is echoed back; rankings are always all-time.
pub async fn get(state: &AppState, req: &ApiRequest) -> ApiResult {
    let kind = LeaderboardType::parse(req.param("type"));
    let period = req.param("period").unwrap_or("all");
    let limit = parse_limit(req.param("limit"), DEFAULT_LIMIT, MAX_LIMIT);

    let entries = leaderboard::leaderboard(state.store.as_ref(), kind, limit).await?;

    Ok(json_response(
        StatusCode::OK,
        &json!({
            "type": kind,
            "period": period,
            "leaderboard": entries,
            "total": entries.len(),
        }),
    ))
}

/// GET /api/leaderboard/summary (always 200)
pub async fn summary(state: &AppState) -> ApiResult {
    let summary = leaderboard::summary(state.store.as_ref()).await;
    Ok(json_response(StatusCode::OK, &summary))
}
