//! Follow routes

use hyper::StatusCode;
use serde::Deserialize;
use serde_json::json;

use super::users::{decrement_user_counter, increment_user_counter};
use super::{json_response, success_response, ApiRequest, ApiResult};
use crate::db::schemas::{follow_id, FollowDoc, FOLLOW_COLLECTION, USER_COLLECTION};
use crate::db::{encode, fetch_all, FieldUpdate, Query};
use crate::server::AppState;
use crate::services::activity;
use crate::types::VaultError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowRequest {
    pub following_id: Option<String>,
}

/// GET /api/follows?userId=&type=followers|following
pub async fn list(state: &AppState, req: &ApiRequest) -> ApiResult {
    let user_id = req
        .param("userId")
        .ok_or_else(|| VaultError::BadRequest("userId is required".into()))?;

    let following = match req.param("type") {
        None | Some("followers") => false,
        Some("following") => true,
        Some(other) => {
            return Err(VaultError::BadRequest(format!(
                "Invalid type: {} (expected followers or following)",
                other
            )))
        }
    };

    let field = if following { "followerId" } else { "followingId" };
    let follows: Vec<FollowDoc> = fetch_all(
        state.store.as_ref(),
        FOLLOW_COLLECTION,
        &Query::all().where_eq(field, user_id),
    )
    .await?;

    let user_ids: Vec<String> = follows
        .into_iter()
        .map(|f| if following { f.following_id } else { f.follower_id })
        .collect();

    Ok(json_response(
        StatusCode::OK,
        &json!({
            "userId": user_id,
            "type": if following { "following" } else { "followers" },
            "userIds": user_ids,
            "count": user_ids.len(),
        }),
    ))
}

/// GET /api/follows/{userId}
pub async fn check(state: &AppState, req: &ApiRequest, user_id: &str) -> ApiResult {
    let user = req.user(state)?;
    let exists = state
        .store
        .get(FOLLOW_COLLECTION, &follow_id(&user.uid, user_id))
        .await?
        .is_some();
    Ok(json_response(StatusCode::OK, &json!({ "isFollowing": exists })))
}

/// POST /api/follows
pub async fn follow(state: &AppState, req: &ApiRequest) -> ApiResult {
    let user = req.user(state)?;
    let body: FollowRequest = req.json()?;
    let following_id = body
        .following_id
        .filter(|f| !f.is_empty())
        .ok_or_else(|| VaultError::BadRequest("followingId is required".into()))?;

    if following_id == user.uid {
        return Err(VaultError::BadRequest("You cannot follow yourself".into()));
    }

    let store = state.store.as_ref();
    if store.get(USER_COLLECTION, &following_id).await?.is_none() {
        return Err(VaultError::NotFound("User not found".into()));
    }

    let follow = FollowDoc::new(&user.uid, &following_id);
    match store.create(FOLLOW_COLLECTION, &follow.id, encode(&follow)?).await {
        Err(VaultError::AlreadyExists(_)) => {
            return Err(VaultError::BadRequest("Already following this user".into()))
        }
        other => other?,
    }

    increment_user_counter(store, &user.uid, "following").await?;
    store
        .update(USER_COLLECTION, &following_id, vec![FieldUpdate::increment("followers", 1)])
        .await?;
    activity::record(store, &user.uid, "follow", &following_id, "user", "Followed a user").await;

    success_response(
        StatusCode::CREATED,
        "Followed successfully",
        json!({ "followId": follow.id }),
    )
}

/// DELETE /api/follows/{userId}
pub async fn unfollow(state: &AppState, req: &ApiRequest, user_id: &str) -> ApiResult {
    let user = req.user(state)?;
    let store = state.store.as_ref();

    if !store.delete(FOLLOW_COLLECTION, &follow_id(&user.uid, user_id)).await? {
        return Err(VaultError::NotFound("Not following this user".into()));
    }

    decrement_user_counter(store, &user.uid, "following").await?;
    decrement_user_counter(store, user_id, "followers").await?;

    success_response(StatusCode::OK, "Unfollowed successfully", json!({}))
}
