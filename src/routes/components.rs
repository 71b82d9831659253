//! Component routes: listing, CRUD and counter actions

use hyper::StatusCode;
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

use super::users::{decrement_user_counter, increment_user_counter};
use super::{json_response, success_response, ApiRequest, ApiResult};
use crate::db::schemas::{ComponentDoc, Timestamp, UserDoc, COMPONENT_COLLECTION, USER_COLLECTION};
use crate::db::{encode, fetch, fetch_all, fetch_required, FieldUpdate, Filter, Query, SortDirection};
use crate::server::AppState;
use crate::services::{activity, leaderboard::parse_limit, media};
use crate::types::VaultError;

const DEFAULT_LIST_LIMIT: usize = 20;
const MAX_LIST_LIMIT: usize = 100;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateComponentRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub code: Option<String>,
    pub category: Option<String>,
    pub framework: Option<String>,
    pub language: Option<String>,
    pub styling: Option<String>,
    pub source_type: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub preview_image: Option<String>,
    #[serde(default)]
    pub images: Vec<String>,
    pub is_public: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateComponentRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub code: Option<String>,
    pub category: Option<String>,
    pub framework: Option<String>,
    pub language: Option<String>,
    pub styling: Option<String>,
    pub source_type: Option<String>,
    pub tags: Option<Vec<String>>,
    pub preview_image: Option<String>,
    pub images: Option<Vec<String>>,
    pub is_public: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct ActionRequest {
    pub action: String,
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn sort_field(sort: Option<&str>) -> &'static str {
    match sort {
        Some("popular") => "likes",
        Some("downloads") => "downloads",
        _ => "createdAt.seconds",
    }
}

/// GET /api/components
pub async fn list(state: &AppState, req: &ApiRequest) -> ApiResult {
    let caller = req.optional_user(state);
    let limit = parse_limit(req.param("limit"), DEFAULT_LIST_LIMIT, MAX_LIST_LIMIT);

    let mut query = Query::all();
    for field in ["category", "framework", "authorId"] {
        if let Some(value) = req.param(field) {
            query = query.filter(Filter::eq(field, value));
        }
    }

    let own_listing = matches!(
        (&caller, req.param("authorId")),
        (Some(user), Some(author)) if user.uid == author
    );
    if !own_listing {
        query = query.where_eq("isPublic", true);
    }

    let query = query
        .order_by(sort_field(req.param("sort")), SortDirection::Desc)
        .limit(limit);
    let components: Vec<ComponentDoc> =
        fetch_all(state.store.as_ref(), COMPONENT_COLLECTION, &query).await?;

    Ok(json_response(
        StatusCode::OK,
        &json!({ "components": components, "total": components.len() }),
    ))
}

/// POST /api/components
pub async fn create(state: &AppState, req: &ApiRequest) -> ApiResult {
    let user = req.user(state)?;
    let body: CreateComponentRequest = req.json()?;

    let (Some(title), Some(code), Some(category)) = (
        non_empty(&body.title),
        body.code.clone().filter(|c| !c.trim().is_empty()),
        non_empty(&body.category),
    ) else {
        return Err(VaultError::BadRequest(
            "Missing required fields: title, code and category".into(),
        ));
    };

    let store = state.store.as_ref();
    let profile: Option<UserDoc> = fetch(store, USER_COLLECTION, &user.uid).await?;
    let author_name = profile
        .and_then(|p| p.display_name)
        .unwrap_or_else(|| user.display_name());

    let now = Timestamp::now();
    let component = ComponentDoc {
        title,
        description: body.description.unwrap_or_default(),
        code,
        preview_image: non_empty(&body.preview_image),
        images: body.images,
        tags: body.tags,
        category,
        framework: body.framework.unwrap_or_default(),
        language: body.language.unwrap_or_default(),
        styling: body.styling.unwrap_or_default(),
        source_type: body.source_type.unwrap_or_default(),
        author_id: user.uid.clone(),
        author_name,
        downloads: Some(0),
        is_public: body.is_public.unwrap_or(true),
        created_at: Some(now),
        updated_at: Some(now),
        ..Default::default()
    };

    let component_id = store.add(COMPONENT_COLLECTION, encode(&component)?).await?;
    increment_user_counter(store, &user.uid, "totalComponents").await?;
    activity::record(
        store,
        &user.uid,
        "upload",
        &component_id,
        "component",
        format!("Uploaded {}", component.title),
    )
    .await;

    info!(component_id = %component_id, author = %user.uid, "Component created");
    success_response(
        StatusCode::CREATED,
        "Component created successfully",
        json!({ "componentId": component_id }),
    )
}

/// Load a component, hiding private ones from everyone but the author
pub(crate) async fn load_visible(state: &AppState, req: &ApiRequest, id: &str) -> Result<ComponentDoc, VaultError> {
    let component: ComponentDoc =
        fetch_required(state.store.as_ref(), COMPONENT_COLLECTION, id, "Component").await?;
    if !component.is_public {
        let is_owner = req
            .optional_user(state)
            .is_some_and(|u| u.uid == component.author_id);
        if !is_owner {
            return Err(VaultError::NotFound("Component not found".into()));
        }
    }
    Ok(component)
}

/// GET /api/components/{id}
pub async fn get(state: &AppState, req: &ApiRequest, id: &str) -> ApiResult {
    let component = load_visible(state, req, id).await?;

    if let Err(e) = state
        .store
        .update(COMPONENT_COLLECTION, id, vec![FieldUpdate::increment("views", 1)])
        .await
    {
        warn!(component_id = id, error = %e, "Failed to count component view");
    }

    Ok(json_response(StatusCode::OK, &component))
}

/// PUT /api/components/{id}
pub async fn update(state: &AppState, req: &ApiRequest, id: &str) -> ApiResult {
    let user = req.user(state)?;
    let body: UpdateComponentRequest = req.json()?;

    let mut updates = Vec::new();
    for (field, value) in [("title", &body.title), ("code", &body.code), ("category", &body.category)] {
        if let Some(value) = value {
            if value.trim().is_empty() {
                return Err(VaultError::BadRequest(format!("{} cannot be empty", field)));
            }
            updates.push(FieldUpdate::set(field, value.clone()));
        }
    }
    for (field, value) in [
        ("description", body.description),
        ("framework", body.framework),
        ("language", body.language),
        ("styling", body.styling),
        ("sourceType", body.source_type),
        ("previewImage", body.preview_image),
    ] {
        if let Some(value) = value {
            updates.push(FieldUpdate::set(field, value));
        }
    }
    if let Some(tags) = body.tags {
        updates.push(FieldUpdate::set("tags", tags));
    }
    if let Some(images) = body.images {
        updates.push(FieldUpdate::set("images", images));
    }
    if let Some(is_public) = body.is_public {
        updates.push(FieldUpdate::set("isPublic", is_public));
    }

    if updates.is_empty() {
        return Err(VaultError::BadRequest("No fields to update".into()));
    }
    updates.push(FieldUpdate::set("updatedAt", Timestamp::now().to_json()));

    let store = state.store.as_ref();
    let component: ComponentDoc = fetch_required(store, COMPONENT_COLLECTION, id, "Component").await?;
    user.ensure_owner(&component.author_id, "component")?;

    store.update(COMPONENT_COLLECTION, id, updates).await?;
    success_response(StatusCode::OK, "Component updated successfully", json!({ "componentId": id }))
}

/// DELETE /api/components/{id}
pub async fn delete(state: &AppState, req: &ApiRequest, id: &str) -> ApiResult {
    let user = req.user(state)?;
    let store = state.store.as_ref();
    let component: ComponentDoc = fetch_required(store, COMPONENT_COLLECTION, id, "Component").await?;
    user.ensure_owner(&component.author_id, "component")?;

    store.delete(COMPONENT_COLLECTION, id).await?;
    media::cleanup(state.media.as_ref(), id, &component.media_urls()).await;
    decrement_user_counter(store, &component.author_id, "totalComponents").await?;

    info!(component_id = id, author = %user.uid, "Component deleted");
    success_response(StatusCode::OK, "Component deleted successfully", json!({}))
}

/// POST /api/components/{id}/actions
pub async fn action(state: &AppState, req: &ApiRequest, id: &str) -> ApiResult {
    let body: ActionRequest = req.json()?;
    let store = state.store.as_ref();

    let counter = match body.action.as_str() {
        "view" => Some("views"),
        "download" => Some("downloads"),
        "copy" => Some("copies"),
        "like" | "unlike" => None,
        other => {
            return Err(VaultError::BadRequest(format!("Invalid action: {}", other)));
        }
    };

    let component = load_visible(state, req, id).await?;

    if let Some(field) = counter {
        match store
            .update(COMPONENT_COLLECTION, id, vec![FieldUpdate::increment(field, 1)])
            .await
        {
            Err(VaultError::NotFound(_)) => {
                return Err(VaultError::NotFound("Component not found".into()))
            }
            other => other?,
        }
        return Ok(json_response(StatusCode::OK, &json!({ "success": true, "action": body.action })));
    }

    // like / unlike need a caller and touch the author's totals too
    req.user(state)?;

    if body.action == "like" {
        store
            .update(COMPONENT_COLLECTION, id, vec![FieldUpdate::increment("likes", 1)])
            .await?;
        increment_user_counter(store, &component.author_id, "totalLikes").await?;
        return Ok(json_response(StatusCode::OK, &json!({ "success": true, "action": "like" })));
    }

    let likes = store.decrement_clamped(COMPONENT_COLLECTION, id, "likes").await?;
    decrement_user_counter(store, &component.author_id, "totalLikes").await?;
    Ok(json_response(
        StatusCode::OK,
        &json!({ "success": true, "action": "unlike", "likes": likes }),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sort_field() {
        assert_eq!(sort_field(None), "createdAt.seconds");
        assert_eq!(sort_field(Some("popular")), "likes");
        assert_eq!(sort_field(Some("downloads")), "downloads");
        assert_eq!(sort_field(Some("bogus")), "createdAt.seconds");
    }

    #[test]
    fn test_non_empty_trims() {
        assert_eq!(non_empty(&Some("  Button ".into())), Some("Button".into()));
        assert_eq!(non_empty(&Some("   ".into())), None);
        assert_eq!(non_empty(&None), None);
    }

    #[test]
    fn test_create_request_defaults() {
        let body: CreateComponentRequest =
            serde_json::from_value(json!({ "title": "Card", "code": "<div/>", "category": "layout" }))
                .unwrap();
        assert!(body.tags.is_empty());
        assert!(body.is_public.is_none());
    }
}
