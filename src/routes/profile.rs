//! Caller profile routes

use hyper::StatusCode;
use serde::Deserialize;
use serde_json::{json, Value as JsonValue};
use tracing::info;

use super::{json_response, success_response, ApiRequest, ApiResult};
use crate::db::schemas::{validate_username, Timestamp, UserDoc, USER_COLLECTION};
use crate::db::{encode, fetch, fetch_required, FieldUpdate, Query};
use crate::server::AppState;
use crate::services;
use crate::types::VaultError;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    pub display_name: Option<String>,
    pub username: Option<String>,
    pub bio: Option<String>,
    pub avatar: Option<String>,
    pub website: Option<String>,
    pub location: Option<String>,
    pub github: Option<String>,
    pub twitter: Option<String>,
}

impl UpdateProfileRequest {
    /// Provided fields as `(storedField, value)` pairs
    fn fields(self) -> Vec<(&'static str, String)> {
        [
            ("displayName", self.display_name),
            ("username", self.username),
            ("bio", self.bio),
            ("avatar", self.avatar),
            ("website", self.website),
            ("location", self.location),
            ("github", self.github),
            ("twitter", self.twitter),
        ]
        .into_iter()
        .filter_map(|(field, value)| value.map(|v| (field, v.trim().to_string())))
        .collect()
    }
}

/// GET /api/profile
pub async fn get(state: &AppState, req: &ApiRequest) -> ApiResult {
    let user = req.user(state)?;
    let profile: UserDoc =
        fetch_required(state.store.as_ref(), USER_COLLECTION, &user.uid, "Profile").await?;
    Ok(json_response(StatusCode::OK, &profile))
}

/// PUT /api/profile
pub async fn update(state: &AppState, req: &ApiRequest) -> ApiResult {
    let user = req.user(state)?;
    let body: UpdateProfileRequest = req.json()?;

    if let Some(username) = &body.username {
        validate_username(username.trim()).map_err(VaultError::BadRequest)?;
    }
    let fields = body.fields();
    if fields.is_empty() {
        return Err(VaultError::BadRequest("No fields to update".into()));
    }

    let store = state.store.as_ref();
    if let Some((_, username)) = fields.iter().find(|(f, _)| *f == "username") {
        let taken = store
            .query(USER_COLLECTION, &Query::all().where_eq("username", username.as_str()).limit(2))
            .await?
            .iter()
            .any(|doc| doc.id != user.uid);
        if taken {
            return Err(VaultError::BadRequest("Username is already taken".into()));
        }
    }

    let now = Timestamp::now();
    let existing: Option<UserDoc> = fetch(store, USER_COLLECTION, &user.uid).await?;
    if existing.is_none() {
        let mut data = encode(&UserDoc {
            email: user.email.clone(),
            display_name: Some(user.display_name()),
            ..UserDoc::new(&user.uid)
        })?;
        for (field, value) in &fields {
            data[*field] = JsonValue::String(value.clone());
        }

        match store.create(USER_COLLECTION, &user.uid, data).await {
            Ok(()) => info!(user_id = %user.uid, "Profile created"),
            // Created concurrently by a counter side effect; fall through to update
            Err(VaultError::AlreadyExists(_)) => {
                apply(state, &user.uid, &fields, now).await?;
            }
            Err(e) => return Err(e),
        }
    } else {
        apply(state, &user.uid, &fields, now).await?;
    }

    let profile: UserDoc = fetch_required(store, USER_COLLECTION, &user.uid, "Profile").await?;
    success_response(
        StatusCode::OK,
        "Profile updated successfully",
        json!({ "profile": profile }),
    )
}

async fn apply(
    state: &AppState,
    user_id: &str,
    fields: &[(&'static str, String)],
    now: Timestamp,
) -> Result<(), VaultError> {
    let mut updates: Vec<FieldUpdate> = fields
        .iter()
        .map(|(field, value)| FieldUpdate::set(field, value.clone()))
        .collect();
    updates.push(FieldUpdate::set("updatedAt", now.to_json()));
    state.store.update(USER_COLLECTION, user_id, updates).await
}

/// GET /api/profile/achievements
pub async fn achievements(state: &AppState, req: &ApiRequest) -> ApiResult {
    let user = req.user(state)?;
    let report = services::achievements::for_user(state.store.as_ref(), &user.uid).await?;
    Ok(json_response(StatusCode::OK, &report))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fields_skip_absent_and_trim() {
        let body: UpdateProfileRequest =
            serde_json::from_value(json!({ "displayName": " Ada ", "bio": "" })).unwrap();
        let fields = body.fields();
        assert_eq!(
            fields,
            vec![("displayName", "Ada".to_string()), ("bio", String::new())]
        );
    }
}
