//! Comment routes (flat, oldest first)

use hyper::StatusCode;
use serde::Deserialize;
use serde_json::json;

use super::{json_response, success_response, ApiRequest, ApiResult};
use crate::db::schemas::{
    validate_content, CommentDoc, Timestamp, COMMENT_COLLECTION, COMPONENT_COLLECTION,
};
use crate::db::{encode, fetch_all, fetch_required, FieldUpdate, Query, SortDirection};
use crate::server::AppState;
use crate::services::activity;
use crate::types::VaultError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCommentRequest {
    pub component_id: Option<String>,
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateCommentRequest {
    #[serde(default)]
    pub content: String,
}

/// GET /api/comments?componentId=
pub async fn list(state: &AppState, req: &ApiRequest) -> ApiResult {
    let component_id = req
        .param("componentId")
        .ok_or_else(|| VaultError::BadRequest("componentId is required".into()))?;

    let comments: Vec<CommentDoc> = fetch_all(
        state.store.as_ref(),
        COMMENT_COLLECTION,
        &Query::all()
            .where_eq("componentId", component_id)
            .order_by("createdAt.seconds", SortDirection::Asc),
    )
    .await?;

    Ok(json_response(
        StatusCode::OK,
        &json!({ "comments": comments, "total": comments.len() }),
    ))
}

/// POST /api/comments
pub async fn create(state: &AppState, req: &ApiRequest) -> ApiResult {
    let user = req.user(state)?;
    let body: CreateCommentRequest = req.json()?;

    let component_id = body
        .component_id
        .filter(|c| !c.is_empty())
        .ok_or_else(|| VaultError::BadRequest("componentId is required".into()))?;
    let content = validate_content(&body.content).map_err(VaultError::BadRequest)?;

    let store = state.store.as_ref();
    if store.get(COMPONENT_COLLECTION, &component_id).await?.is_none() {
        return Err(VaultError::NotFound("Component not found".into()));
    }

    let now = Timestamp::now();
    let comment = CommentDoc {
        id: String::new(),
        component_id: component_id.clone(),
        user_id: user.uid.clone(),
        user_name: user.display_name(),
        content,
        created_at: Some(now),
        updated_at: Some(now),
    };
    let comment_id = store.add(COMMENT_COLLECTION, encode(&comment)?).await?;
    activity::record(store, &user.uid, "comment", &component_id, "component", "Commented on a component").await;

    success_response(
        StatusCode::CREATED,
        "Comment added successfully",
        json!({ "commentId": comment_id }),
    )
}

/// PUT /api/comments/{id}
pub async fn update(state: &AppState, req: &ApiRequest, id: &str) -> ApiResult {
    let user = req.user(state)?;
    let body: UpdateCommentRequest = req.json()?;
    let content = validate_content(&body.content).map_err(VaultError::BadRequest)?;

    let store = state.store.as_ref();
    let comment: CommentDoc = fetch_required(store, COMMENT_COLLECTION, id, "Comment").await?;
    user.ensure_owner(&comment.user_id, "comment")?;

    store
        .update(
            COMMENT_COLLECTION,
            id,
            vec![
                FieldUpdate::set("content", content),
                FieldUpdate::set("updatedAt", Timestamp::now().to_json()),
            ],
        )
        .await?;

    success_response(StatusCode::OK, "Comment updated successfully", json!({ "commentId": id }))
}

/// DELETE /api/comments/{id}
pub async fn delete(state: &AppState, req: &ApiRequest, id: &str) -> ApiResult {
    let user = req.user(state)?;
    let store = state.store.as_ref();
    let comment: CommentDoc = fetch_required(store, COMMENT_COLLECTION, id, "Comment").await?;
    user.ensure_owner(&comment.user_id, "comment")?;

    store.delete(COMMENT_COLLECTION, id).await?;
    success_response(StatusCode::OK, "Comment deleted successfully", json!({}))
}
