//! Public user routes and user counter helpers

use hyper::StatusCode;
use serde_json::json;
use tracing::{debug, warn};

use super::{json_response, ApiRequest, ApiResult};
use crate::db::schemas::{ComponentDoc, UserDoc, COMPONENT_COLLECTION, USER_COLLECTION};
use crate::db::{encode, fetch_all, fetch_required, DocumentStore, FieldUpdate, Query, SortDirection};
use crate::server::AppState;
use crate::services::{self, leaderboard::parse_limit};
use crate::types::VaultError;

const DEFAULT_ACTIVITY_LIMIT: usize = 20;
const MAX_ACTIVITY_LIMIT: usize = 100;

/// Atomically increment a user counter, creating the user record on first
/// touch so side effects on users without a profile are not lost.
pub(crate) async fn increment_user_counter(
    store: &dyn DocumentStore,
    user_id: &str,
    field: &str,
) -> Result<(), VaultError> {
    let updates = vec![FieldUpdate::increment(field, 1)];
    match store.update(USER_COLLECTION, user_id, updates.clone()).await {
        Err(VaultError::NotFound(_)) => {}
        other => return other,
    }

    let mut user = encode(&UserDoc::new(user_id))?;
    user[field] = json!(1);
    match store.create(USER_COLLECTION, user_id, user).await {
        // Lost the race to another first write; the record exists now
        Err(VaultError::AlreadyExists(_)) => store.update(USER_COLLECTION, user_id, updates).await,
        other => {
            debug!(user_id, field, "Created user record from counter update");
            other
        }
    }
}

/// Clamped decrement of a user counter. A missing user is not an error.
pub(crate) async fn decrement_user_counter(
    store: &dyn DocumentStore,
    user_id: &str,
    field: &str,
) -> Result<(), VaultError> {
    match store.decrement_clamped(USER_COLLECTION, user_id, field).await {
        Ok(_) => Ok(()),
        Err(VaultError::NotFound(_)) => {
            warn!(user_id, field, "Counter decrement on missing user");
            Ok(())
        }
        Err(e) => Err(e),
    }
}

/// GET /api/users/{id}
pub async fn get(state: &AppState, user_id: &str) -> ApiResult {
    let user: UserDoc =
        fetch_required(state.store.as_ref(), USER_COLLECTION, user_id, "User").await?;
    Ok(json_response(StatusCode::OK, &user.public()))
}

/// GET /api/users/{id}/components
pub async fn components(state: &AppState, user_id: &str) -> ApiResult {
    let components: Vec<ComponentDoc> = fetch_all(
        state.store.as_ref(),
        COMPONENT_COLLECTION,
        &Query::all()
            .where_eq("authorId", user_id)
            .where_eq("isPublic", true)
            .order_by("createdAt.seconds", SortDirection::Desc),
    )
    .await?;

    Ok(json_response(
        StatusCode::OK,
        &json!({ "components": components, "total": components.len() }),
    ))
}

/// GET /api/users/{id}/activity
pub async fn activity(state: &AppState, req: &ApiRequest, user_id: &str) -> ApiResult {
    let limit = parse_limit(req.param("limit"), DEFAULT_ACTIVITY_LIMIT, MAX_ACTIVITY_LIMIT);
    let activities = services::activity::recent(state.store.as_ref(), user_id, limit).await?;
    Ok(json_response(StatusCode::OK, &json!({ "activities": activities })))
}

/// GET /api/users/{id}/achievements
pub async fn achievements(state: &AppState, user_id: &str) -> ApiResult {
    let report = services::achievements::for_user(state.store.as_ref(), user_id).await?;
    Ok(json_response(StatusCode::OK, &report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{fetch, MemoryStore};

    #[tokio::test]
    async fn test_increment_creates_missing_user() {
        let store = MemoryStore::new();
        increment_user_counter(&store, "u1", "totalComponents").await.unwrap();
        increment_user_counter(&store, "u1", "totalComponents").await.unwrap();

        let user: UserDoc = fetch(&store, USER_COLLECTION, "u1").await.unwrap().unwrap();
        assert_eq!(user.total_components, 2);
        assert_eq!(user.followers, 0);
        assert!(user.created_at.is_some());
    }

    #[tokio::test]
    async fn test_decrement_missing_user_is_ok() {
        let store = MemoryStore::new();
        decrement_user_counter(&store, "ghost", "followers").await.unwrap();
        assert!(store.get(USER_COLLECTION, "ghost").await.unwrap().is_none());
    }
}
