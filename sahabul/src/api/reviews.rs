//! Review endpoints.
//!
//! - `POST /api/reviews` - submit a review; requires a completed booking
//!   on the field, and admin approval before it counts
//! - `GET /api/reviews/:field_id` - approved reviews for a field
//! - `POST /api/reviews/:id/approve` - admin approval

use super::{registry_error, store_error};
use crate::aggregates::fields::RegistryAction;
use crate::api::fields::outcome_for;
use crate::auth::SessionUser;
use crate::server::state::AppState;
use crate::types::{FieldId, Review, ReviewId};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use chrono::{DateTime, Utc};
use sahabul_web::error::AppError;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Review submission request.
#[derive(Debug, Deserialize)]
pub struct CreateReviewRequest {
    /// Reviewed field
    pub field_id: Uuid,
    /// Rating 1-5
    pub rating: u8,
    /// Comment text
    pub comment: String,
}

/// A review in API responses.
#[derive(Debug, Serialize)]
pub struct ReviewResponse {
    /// Review id
    pub id: Uuid,
    /// Reviewed field
    pub field_id: Uuid,
    /// Rating 1-5
    pub rating: u8,
    /// Comment text
    pub comment: String,
    /// Submission time
    pub created_at: DateTime<Utc>,
}

impl From<Review> for ReviewResponse {
    fn from(review: Review) -> Self {
        Self {
            id: *review.id.as_uuid(),
            field_id: *review.field_id.as_uuid(),
            rating: review.rating,
            comment: review.comment,
            created_at: review.created_at,
        }
    }
}

/// Submit a review.
///
/// The completed-booking gate is checked against the ledger before the
/// registry accepts the submission; the review awaits admin approval.
pub async fn create_review(
    SessionUser(principal): SessionUser,
    State(state): State<AppState>,
    Json(request): Json<CreateReviewRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>), AppError> {
    let field_id = FieldId::from_uuid(request.field_id);

    let completed = state
        .ledger
        .state(move |s| s.has_completed_booking(&principal.user_id, &field_id))
        .await;
    if !completed {
        return Err(AppError::validation(
            "You must complete a booking before reviewing this field",
        ));
    }

    let review_id = ReviewId::new();
    let outcome = state
        .registry
        .send_and_wait_for(
            RegistryAction::SubmitReview {
                review_id,
                field_id,
                user_id: principal.user_id,
                rating: request.rating,
                comment: request.comment,
            },
            move |action| outcome_for(action, &review_id.to_string()),
            state.request_timeout,
        )
        .await
        .map_err(store_error)?;

    match outcome {
        RegistryAction::Committed { .. } => Ok((
            StatusCode::CREATED,
            Json(serde_json::json!({
                "review_id": review_id.to_string(),
                "message": "Review submitted for approval",
            })),
        )),
        RegistryAction::RegistryRejected { reason, .. } => Err(registry_error(&reason)),
        _ => Err(AppError::internal("Unexpected registry outcome")),
    }
}

/// Approved-reviews listing response.
#[derive(Debug, Serialize)]
pub struct ListReviewsResponse {
    /// Approved reviews, newest first
    pub reviews: Vec<ReviewResponse>,
}

/// List approved reviews for a field.
pub async fn list_reviews(
    State(state): State<AppState>,
    Path(field_id): Path<Uuid>,
) -> Result<Json<ListReviewsResponse>, AppError> {
    let id = FieldId::from_uuid(field_id);
    let reviews = state
        .registry
        .state(move |s| s.approved_reviews(&id))
        .await;

    Ok(Json(ListReviewsResponse {
        reviews: reviews.into_iter().map(Into::into).collect(),
    }))
}

/// Approve a review (admin role).
pub async fn approve_review(
    SessionUser(principal): SessionUser,
    State(state): State<AppState>,
    Path(review_id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, AppError> {
    let id = ReviewId::from_uuid(review_id);

    let outcome = state
        .registry
        .send_and_wait_for(
            RegistryAction::ApproveReview {
                review_id: id,
                principal,
            },
            move |action| outcome_for(action, &id.to_string()),
            state.request_timeout,
        )
        .await
        .map_err(store_error)?;

    match outcome {
        RegistryAction::Committed { .. } => Ok(Json(serde_json::json!({
            "review_id": review_id,
            "approved": true,
        }))),
        RegistryAction::RegistryRejected { reason, .. } => Err(registry_error(&reason)),
        _ => Err(AppError::internal("Unexpected registry outcome")),
    }
}
