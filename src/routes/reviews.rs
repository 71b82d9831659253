//! Review routes
//!
//! Every review write recomputes the component's denormalized `rating` and
//! `reviewCount` from the full set of its reviews.

use hyper::StatusCode;
use serde::Deserialize;
use serde_json::{json, Value as JsonValue};
use tracing::{debug, warn};

use super::{json_response, success_response, ApiRequest, ApiResult};
use crate::db::schemas::{
    average_rating, review_id, review_vote_id, validate_rating, ReviewDoc, ReviewVoteDoc,
    Timestamp, COMPONENT_COLLECTION, REVIEW_COLLECTION, REVIEW_VOTE_COLLECTION,
};
use crate::db::{encode, fetch_all, fetch_required, DocumentStore, FieldUpdate, Query, SortDirection};
use crate::server::AppState;
use crate::services::activity;
use crate::types::VaultError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateReviewRequest {
    pub component_id: Option<String>,
    #[serde(default)]
    pub rating: JsonValue,
    #[serde(default)]
    pub comment: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateReviewRequest {
    pub rating: Option<JsonValue>,
    pub comment: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct VoteRequest {
    pub helpful: Option<bool>,
}

async fn reviews_for(store: &dyn DocumentStore, component_id: &str) -> Result<Vec<ReviewDoc>, VaultError> {
    fetch_all(
        store,
        REVIEW_COLLECTION,
        &Query::all()
            .where_eq("componentId", component_id)
            .order_by("createdAt.seconds", SortDirection::Desc),
    )
    .await
}

/// Recompute a component's rating and review count
async fn refresh_component_rating(store: &dyn DocumentStore, component_id: &str) -> Result<(), VaultError> {
    let reviews = reviews_for(store, component_id).await?;
    let rating = (average_rating(&reviews) * 10.0).round() / 10.0;

    let result = store
        .update(
            COMPONENT_COLLECTION,
            component_id,
            vec![
                FieldUpdate::set("rating", rating),
                FieldUpdate::set("reviewCount", reviews.len() as i64),
            ],
        )
        .await;

    match result {
        Err(VaultError::NotFound(_)) => {
            warn!(component_id, "Review change on a deleted component");
            Ok(())
        }
        other => {
            debug!(component_id, rating, count = reviews.len(), "Component rating refreshed");
            other
        }
    }
}

/// GET /api/reviews?componentId=
pub async fn list(state: &AppState, req: &ApiRequest) -> ApiResult {
    let component_id = req
        .param("componentId")
        .ok_or_else(|| VaultError::BadRequest("componentId is required".into()))?;

    let reviews = reviews_for(state.store.as_ref(), component_id).await?;
    let average = average_rating(&reviews);

    Ok(json_response(
        StatusCode::OK,
        &json!({
            "reviews": reviews,
            "averageRating": average,
            "totalReviews": reviews.len(),
        }),
    ))
}

/// POST /api/reviews
pub async fn create(state: &AppState, req: &ApiRequest) -> ApiResult {
    let user = req.user(state)?;
    let body: CreateReviewRequest = req.json()?;

    let component_id = body
        .component_id
        .filter(|c| !c.is_empty())
        .ok_or_else(|| VaultError::BadRequest("componentId is required".into()))?;
    let rating = validate_rating(&body.rating).map_err(VaultError::BadRequest)?;

    let store = state.store.as_ref();
    if store.get(COMPONENT_COLLECTION, &component_id).await?.is_none() {
        return Err(VaultError::NotFound("Component not found".into()));
    }

    let now = Timestamp::now();
    let review = ReviewDoc {
        id: review_id(&user.uid, &component_id),
        component_id: component_id.clone(),
        user_id: user.uid.clone(),
        user_name: user.display_name(),
        rating,
        comment: body.comment.trim().to_string(),
        helpful: 0,
        not_helpful: 0,
        created_at: Some(now),
        updated_at: Some(now),
    };

    match store.create(REVIEW_COLLECTION, &review.id, encode(&review)?).await {
        Err(VaultError::AlreadyExists(_)) => {
            return Err(VaultError::BadRequest(
                "You have already reviewed this component".into(),
            ))
        }
        other => other?,
    }

    refresh_component_rating(store, &component_id).await?;
    activity::record(
        store,
        &user.uid,
        "review",
        &component_id,
        "component",
        format!("Rated a component {} stars", rating),
    )
    .await;

    success_response(
        StatusCode::CREATED,
        "Review created successfully",
        json!({ "reviewId": review.id }),
    )
}

/// PUT /api/reviews/{id}
pub async fn update(state: &AppState, req: &ApiRequest, id: &str) -> ApiResult {
    let user = req.user(state)?;
    let body: UpdateReviewRequest = req.json()?;

    let mut updates = Vec::new();
    if let Some(rating) = &body.rating {
        let rating = validate_rating(rating).map_err(VaultError::BadRequest)?;
        updates.push(FieldUpdate::set("rating", rating));
    }
    if let Some(comment) = body.comment {
        updates.push(FieldUpdate::set("comment", comment.trim()));
    }
    if updates.is_empty() {
        return Err(VaultError::BadRequest("No fields to update".into()));
    }
    updates.push(FieldUpdate::set("updatedAt", Timestamp::now().to_json()));

    let store = state.store.as_ref();
    let review: ReviewDoc = fetch_required(store, REVIEW_COLLECTION, id, "Review").await?;
    user.ensure_owner(&review.user_id, "review")?;

    store.update(REVIEW_COLLECTION, id, updates).await?;
    refresh_component_rating(store, &review.component_id).await?;

    success_response(StatusCode::OK, "Review updated successfully", json!({ "reviewId": id }))
}

/// DELETE /api/reviews/{id}
pub async fn delete(state: &AppState, req: &ApiRequest, id: &str) -> ApiResult {
    let user = req.user(state)?;
    let store = state.store.as_ref();
    let review: ReviewDoc = fetch_required(store, REVIEW_COLLECTION, id, "Review").await?;
    user.ensure_owner(&review.user_id, "review")?;

    store.delete(REVIEW_COLLECTION, id).await?;

    // Votes are keyed by review ID; drop them with the review
    let votes = store
        .query(REVIEW_VOTE_COLLECTION, &Query::all().where_eq("reviewId", id))
        .await?;
    for vote in votes {
        store.delete(REVIEW_VOTE_COLLECTION, &vote.id).await?;
    }

    refresh_component_rating(store, &review.component_id).await?;
    success_response(StatusCode::OK, "Review deleted successfully", json!({}))
}

/// POST /api/reviews/{id}/vote
pub async fn vote(state: &AppState, req: &ApiRequest, id: &str) -> ApiResult {
    let user = req.user(state)?;
    let body: VoteRequest = req.json()?;
    let helpful = body
        .helpful
        .ok_or_else(|| VaultError::BadRequest("helpful must be true or false".into()))?;

    let store = state.store.as_ref();
    let review: ReviewDoc = fetch_required(store, REVIEW_COLLECTION, id, "Review").await?;
    if review.user_id == user.uid {
        return Err(VaultError::BadRequest("You cannot vote on your own review".into()));
    }

    let vote = ReviewVoteDoc {
        id: review_vote_id(id, &user.uid),
        review_id: id.to_string(),
        user_id: user.uid.clone(),
        helpful,
        created_at: Some(Timestamp::now()),
    };
    match store.create(REVIEW_VOTE_COLLECTION, &vote.id, encode(&vote)?).await {
        Err(VaultError::AlreadyExists(_)) => {
            return Err(VaultError::BadRequest(
                "You have already voted on this review".into(),
            ))
        }
        other => other?,
    }

    let field = if helpful { "helpful" } else { "notHelpful" };
    store
        .update(REVIEW_COLLECTION, id, vec![FieldUpdate::increment(field, 1)])
        .await?;

    success_response(StatusCode::OK, "Vote recorded", json!({ "helpful": helpful }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schemas::ComponentDoc;
    use crate::db::{fetch, MemoryStore};

    fn review(user: &str, component: &str, rating: i64) -> JsonValue {
        json!({ "componentId": component, "userId": user, "rating": rating })
    }

    #[tokio::test]
    async fn test_refresh_component_rating() {
        let store = MemoryStore::new();
        store
            .create(COMPONENT_COLLECTION, "c1", json!({ "title": "Card", "isPublic": true }))
            .await
            .unwrap();
        store.create(REVIEW_COLLECTION, "a_c1", review("a", "c1", 5)).await.unwrap();
        store.create(REVIEW_COLLECTION, "b_c1", review("b", "c1", 4)).await.unwrap();
        store.create(REVIEW_COLLECTION, "b_c2", review("b", "c2", 1)).await.unwrap();

        refresh_component_rating(&store, "c1").await.unwrap();

        let component: ComponentDoc = fetch(&store, COMPONENT_COLLECTION, "c1").await.unwrap().unwrap();
        assert_eq!(component.rating, Some(4.5));
        assert_eq!(component.review_count, 2);
    }

    #[tokio::test]
    async fn test_refresh_tolerates_deleted_component() {
        let store = MemoryStore::new();
        refresh_component_rating(&store, "gone").await.unwrap();
    }
}
