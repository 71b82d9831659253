//! Platform stats route

use hyper::StatusCode;

use super::{json_response, ApiRequest, ApiResult};
use crate::server::AppState;
use crate::services::leaderboard::parse_limit;
use crate::services::stats::{platform_stats, DEFAULT_TRENDING};

const MAX_TRENDING: usize = 50;

/// GET /api/stats?limit= (always 200)
pub async fn get(state: &AppState, req: &ApiRequest) -> ApiResult {
    let trending = parse_limit(req.param("limit"), DEFAULT_TRENDING, MAX_TRENDING);
    let stats = platform_stats(state.store.as_ref(), trending).await;
    Ok(json_response(StatusCode::OK, &stats))
}
