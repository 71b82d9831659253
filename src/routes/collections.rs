//! Collection routes

use hyper::StatusCode;
use serde::Deserialize;
use serde_json::json;

use super::{json_response, success_response, ApiRequest, ApiResult};
use crate::auth::AuthUser;
use crate::db::schemas::{
    dedup_component_ids, CollectionDoc, Timestamp, COLLECTION_COLLECTION, COMPONENT_COLLECTION,
};
use crate::db::{encode, fetch_all, fetch_required, FieldUpdate, Query, SortDirection};
use crate::server::AppState;
use crate::services::{activity, leaderboard::parse_limit};
use crate::types::VaultError;

const DEFAULT_LIST_LIMIT: usize = 50;
const MAX_LIST_LIMIT: usize = 100;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCollectionRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub is_public: Option<bool>,
    #[serde(default)]
    pub component_ids: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCollectionRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub is_public: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddComponentRequest {
    pub component_id: Option<String>,
}

/// GET /api/collections
pub async fn list(state: &AppState, req: &ApiRequest) -> ApiResult {
    let caller = req.optional_user(state);
    let limit = parse_limit(req.param("limit"), DEFAULT_LIST_LIMIT, MAX_LIST_LIMIT);

    let mut query = Query::all();
    let owner = req.param("userId");
    if let Some(user_id) = owner {
        query = query.where_eq("userId", user_id);
    }
    let own_listing = matches!((&caller, owner), (Some(user), Some(id)) if user.uid == id);
    if !own_listing {
        query = query.where_eq("isPublic", true);
    }

    let collections: Vec<CollectionDoc> = fetch_all(
        state.store.as_ref(),
        COLLECTION_COLLECTION,
        &query
            .order_by("createdAt.seconds", SortDirection::Desc)
            .limit(limit),
    )
    .await?;

    Ok(json_response(
        StatusCode::OK,
        &json!({ "collections": collections, "total": collections.len() }),
    ))
}

/// POST /api/collections
pub async fn create(state: &AppState, req: &ApiRequest) -> ApiResult {
    let user = req.user(state)?;
    let body: CreateCollectionRequest = req.json()?;

    let name = body
        .name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .ok_or_else(|| VaultError::BadRequest("Collection name is required".into()))?
        .to_string();

    let now = Timestamp::now();
    let collection = CollectionDoc {
        id: String::new(),
        name,
        description: body.description.unwrap_or_default(),
        user_id: user.uid.clone(),
        component_ids: dedup_component_ids(body.component_ids),
        is_public: body.is_public.unwrap_or(true),
        likes: 0,
        created_at: Some(now),
        updated_at: Some(now),
    };

    let store = state.store.as_ref();
    let collection_id = store.add(COLLECTION_COLLECTION, encode(&collection)?).await?;
    activity::record(
        store,
        &user.uid,
        "collection",
        &collection_id,
        "collection",
        format!("Created collection {}", collection.name),
    )
    .await;

    success_response(
        StatusCode::CREATED,
        "Collection created successfully",
        json!({ "collectionId": collection_id }),
    )
}

/// GET /api/collections/{id}
pub async fn get(state: &AppState, req: &ApiRequest, id: &str) -> ApiResult {
    let collection: CollectionDoc =
        fetch_required(state.store.as_ref(), COLLECTION_COLLECTION, id, "Collection").await?;

    if !collection.is_public {
        let is_owner = req
            .optional_user(state)
            .is_some_and(|u| u.uid == collection.user_id);
        if !is_owner {
            return Err(VaultError::NotFound("Collection not found".into()));
        }
    }

    Ok(json_response(StatusCode::OK, &collection))
}

/// Load a collection the caller owns
async fn load_owned(state: &AppState, user: &AuthUser, id: &str) -> Result<CollectionDoc, VaultError> {
    let collection: CollectionDoc =
        fetch_required(state.store.as_ref(), COLLECTION_COLLECTION, id, "Collection").await?;
    user.ensure_owner(&collection.user_id, "collection")?;
    Ok(collection)
}

/// PUT /api/collections/{id}
pub async fn update(state: &AppState, req: &ApiRequest, id: &str) -> ApiResult {
    let user = req.user(state)?;
    let body: UpdateCollectionRequest = req.json()?;

    let mut updates = Vec::new();
    if let Some(name) = body.name {
        let name = name.trim();
        if name.is_empty() {
            return Err(VaultError::BadRequest("Collection name cannot be empty".into()));
        }
        updates.push(FieldUpdate::set("name", name));
    }
    if let Some(description) = body.description {
        updates.push(FieldUpdate::set("description", description));
    }
    if let Some(is_public) = body.is_public {
        updates.push(FieldUpdate::set("isPublic", is_public));
    }
    if updates.is_empty() {
        return Err(VaultError::BadRequest("No fields to update".into()));
    }
    updates.push(FieldUpdate::set("updatedAt", Timestamp::now().to_json()));

    load_owned(state, &user, id).await?;
    state.store.update(COLLECTION_COLLECTION, id, updates).await?;
    success_response(StatusCode::OK, "Collection updated successfully", json!({ "collectionId": id }))
}

/// DELETE /api/collections/{id}
pub async fn delete(state: &AppState, req: &ApiRequest, id: &str) -> ApiResult {
    let user = req.user(state)?;
    load_owned(state, &user, id).await?;
    state.store.delete(COLLECTION_COLLECTION, id).await?;
    success_response(StatusCode::OK, "Collection deleted successfully", json!({}))
}

/// POST /api/collections/{id}/components
pub async fn add_component(state: &AppState, req: &ApiRequest, id: &str) -> ApiResult {
    let user = req.user(state)?;
    let body: AddComponentRequest = req.json()?;
    let component_id = body
        .component_id
        .filter(|c| !c.is_empty())
        .ok_or_else(|| VaultError::BadRequest("componentId is required".into()))?;

    load_owned(state, &user, id).await?;
    let store = state.store.as_ref();
    if store.get(COMPONENT_COLLECTION, &component_id).await?.is_none() {
        return Err(VaultError::NotFound("Component not found".into()));
    }

    store
        .update(
            COLLECTION_COLLECTION,
            id,
            vec![
                FieldUpdate::ArrayUnion("componentIds".into(), vec![json!(component_id)]),
                FieldUpdate::set("updatedAt", Timestamp::now().to_json()),
            ],
        )
        .await?;

    success_response(StatusCode::OK, "Component added to collection", json!({ "collectionId": id }))
}

/// DELETE /api/collections/{id}/components/{componentId}
pub async fn remove_component(
    state: &AppState,
    req: &ApiRequest,
    id: &str,
    component_id: &str,
) -> ApiResult {
    let user = req.user(state)?;
    load_owned(state, &user, id).await?;

    state
        .store
        .update(
            COLLECTION_COLLECTION,
            id,
            vec![
                FieldUpdate::ArrayRemove("componentIds".into(), vec![json!(component_id)]),
                FieldUpdate::set("updatedAt", Timestamp::now().to_json()),
            ],
        )
        .await?;

    success_response(StatusCode::OK, "Component removed from collection", json!({ "collectionId": id }))
}
