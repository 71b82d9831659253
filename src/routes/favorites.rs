//! Favorite routes
//!
//! A favorite is a join document keyed by the user and component IDs; adding
//! it and bumping the component's `likes` happen only when the insert wins.

use hyper::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::warn;

use super::components::load_visible;
use super::{json_response, success_response, ApiRequest, ApiResult};
use crate::db::schemas::{
    favorite_id, ComponentDoc, FavoriteDoc, Timestamp, COMPONENT_COLLECTION, FAVORITE_COLLECTION,
};
use crate::db::{encode, fetch, fetch_all, FieldUpdate, Query, SortDirection};
use crate::server::AppState;
use crate::services::activity;
use crate::types::VaultError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddFavoriteRequest {
    pub component_id: Option<String>,
}

/// A favorite with its component resolved
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FavoriteEntry {
    pub id: String,
    pub component_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<Timestamp>,
    pub component: ComponentDoc,
}

/// GET /api/favorites
pub async fn list(state: &AppState, req: &ApiRequest) -> ApiResult {
    let user = req.user(state)?;
    let store = state.store.as_ref();

    let favorites: Vec<FavoriteDoc> = fetch_all(
        store,
        FAVORITE_COLLECTION,
        &Query::all()
            .where_eq("userId", user.uid.as_str())
            .order_by("createdAt.seconds", SortDirection::Desc),
    )
    .await?;

    let mut entries = Vec::with_capacity(favorites.len());
    for favorite in favorites {
        // Components deleted since favoriting are dropped from the list
        if let Some(component) =
            fetch::<ComponentDoc>(store, COMPONENT_COLLECTION, &favorite.component_id).await?
        {
            entries.push(FavoriteEntry {
                id: favorite.id,
                component_id: favorite.component_id,
                created_at: favorite.created_at,
                component,
            });
        }
    }

    Ok(json_response(
        StatusCode::OK,
        &json!({ "favorites": entries, "total": entries.len() }),
    ))
}

/// GET /api/favorites/{componentId}
pub async fn check(state: &AppState, req: &ApiRequest, component_id: &str) -> ApiResult {
    let user = req.user(state)?;
    let exists = state
        .store
        .get(FAVORITE_COLLECTION, &favorite_id(&user.uid, component_id))
        .await?
        .is_some();
    Ok(json_response(StatusCode::OK, &json!({ "isFavorited": exists })))
}

/// POST /api/favorites
pub async fn add(state: &AppState, req: &ApiRequest) -> ApiResult {
    let user = req.user(state)?;
    let body: AddFavoriteRequest = req.json()?;
    let component_id = body
        .component_id
        .filter(|c| !c.is_empty())
        .ok_or_else(|| VaultError::BadRequest("componentId is required".into()))?;

    let store = state.store.as_ref();
    let component = load_visible(state, req, &component_id).await?;

    let favorite = FavoriteDoc::new(&user.uid, &component_id);
    match store.create(FAVORITE_COLLECTION, &favorite.id, encode(&favorite)?).await {
        Err(VaultError::AlreadyExists(_)) => {
            return Err(VaultError::BadRequest("Already favorited".into()))
        }
        other => other?,
    }

    store
        .update(COMPONENT_COLLECTION, &component_id, vec![FieldUpdate::increment("likes", 1)])
        .await?;
    activity::record(
        store,
        &user.uid,
        "favorite",
        &component_id,
        "component",
        format!("Favorited {}", component.title),
    )
    .await;

    success_response(
        StatusCode::CREATED,
        "Added to favorites",
        json!({ "favoriteId": favorite.id }),
    )
}

/// DELETE /api/favorites/{componentId}
pub async fn remove(state: &AppState, req: &ApiRequest, component_id: &str) -> ApiResult {
    let user = req.user(state)?;
    let store = state.store.as_ref();

    if !store.delete(FAVORITE_COLLECTION, &favorite_id(&user.uid, component_id)).await? {
        return Err(VaultError::NotFound("Favorite not found".into()));
    }

    match store.decrement_clamped(COMPONENT_COLLECTION, component_id, "likes").await {
        Ok(_) => {}
        Err(VaultError::NotFound(_)) => {
            warn!(component_id, "Unfavorited a component that no longer exists");
        }
        Err(e) => return Err(e),
    }

    success_response(StatusCode::OK, "Removed from favorites", json!({}))
}
