//! Team-search board endpoints.
//!
//! - `POST /api/team-search` - post an ad
//! - `GET /api/team-search?date&position&field_id` - filtered listing
//! - `POST /api/team-search/:id/join` - join (idempotent per user)
//! - `DELETE /api/team-search/:id` - delete (creator or admin)

use super::{board_error, parse_date, parse_hour, store_error};
use crate::aggregates::team_board::{BoardAction, SearchFilter};
use crate::auth::SessionUser;
use crate::server::state::AppState;
use crate::types::{FieldId, Position, SearchId, TeamSearch};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use chrono::{DateTime, NaiveDate, Utc};
use sahabul_web::error::AppError;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Ad creation request.
#[derive(Debug, Deserialize)]
pub struct CreateSearchRequest {
    /// Planned field, if any
    pub field_id: Option<Uuid>,
    /// Match date, `YYYY-MM-DD`
    pub date: String,
    /// Match start, `HH:00`
    pub time: String,
    /// Position sought: kaleci, defans, orta saha, forvet
    pub position: Position,
    /// Free-text message
    pub message: String,
}

/// Listing filters.
#[derive(Debug, Deserialize)]
pub struct ListSearchesQuery {
    /// Match date filter, `YYYY-MM-DD`
    pub date: Option<String>,
    /// Position filter
    pub position: Option<Position>,
    /// Planned-field filter
    pub field_id: Option<Uuid>,
}

/// An ad in API responses.
#[derive(Debug, Serialize)]
pub struct SearchResponse {
    /// Ad id
    pub id: Uuid,
    /// Creating user
    pub user_id: Uuid,
    /// Planned field, if any
    pub field_id: Option<Uuid>,
    /// Match date
    pub date: NaiveDate,
    /// Match start hour
    pub hour: u8,
    /// Position sought
    pub position: Position,
    /// Free-text message
    pub message: String,
    /// Number of users who joined
    pub participant_count: usize,
    /// Creation time
    pub created_at: DateTime<Utc>,
}

impl From<TeamSearch> for SearchResponse {
    fn from(search: TeamSearch) -> Self {
        Self {
            id: *search.id.as_uuid(),
            user_id: *search.user_id.as_uuid(),
            field_id: search.field_id.map(|f| *f.as_uuid()),
            date: search.date,
            hour: search.hour,
            position: search.position,
            message: search.message,
            participant_count: search.participants.len(),
            created_at: search.created_at,
        }
    }
}

/// Post a team-search ad.
pub async fn create_search(
    SessionUser(principal): SessionUser,
    State(state): State<AppState>,
    Json(request): Json<CreateSearchRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>), AppError> {
    let date = parse_date(&request.date)?;
    let hour = parse_hour(&request.time)?;
    let search_id = SearchId::new();

    let outcome = state
        .board
        .send_and_wait_for(
            BoardAction::CreateSearch {
                search_id,
                user_id: principal.user_id,
                field_id: request.field_id.map(FieldId::from_uuid),
                date,
                hour,
                position: request.position,
                message: request.message,
            },
            move |action| board_outcome_for(action, search_id),
            state.request_timeout,
        )
        .await
        .map_err(store_error)?;

    match outcome {
        BoardAction::Committed { .. } => Ok((
            StatusCode::CREATED,
            Json(serde_json::json!({ "search_id": search_id.to_string() })),
        )),
        BoardAction::BoardRejected { reason, .. } => Err(board_error(&reason)),
        _ => Err(AppError::internal("Unexpected board outcome")),
    }
}

/// Listing response.
#[derive(Debug, Serialize)]
pub struct ListSearchesResponse {
    /// Matching ads, newest first
    pub team_searches: Vec<SearchResponse>,
}

/// List ads with optional filters.
pub async fn list_searches(
    State(state): State<AppState>,
    Query(query): Query<ListSearchesQuery>,
) -> Result<Json<ListSearchesResponse>, AppError> {
    let filter = SearchFilter {
        date: query.date.as_deref().map(parse_date).transpose()?,
        position: query.position,
        field_id: query.field_id.map(FieldId::from_uuid),
    };

    let searches = state.board.state(move |s| s.list(&filter)).await;

    Ok(Json(ListSearchesResponse {
        team_searches: searches.into_iter().map(Into::into).collect(),
    }))
}

/// Join an ad. Joining twice is acknowledged without duplicating
/// participation.
pub async fn join_search(
    SessionUser(principal): SessionUser,
    State(state): State<AppState>,
    Path(search_id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, AppError> {
    let search_id = SearchId::from_uuid(search_id);

    let outcome = state
        .board
        .send_and_wait_for(
            BoardAction::JoinSearch {
                search_id,
                user_id: principal.user_id,
            },
            move |action| match action {
                // First join commits; repeat joins come back as a bare
                // SearchJoined notification
                BoardAction::Committed { event, .. } => matches!(
                    event.as_ref(),
                    BoardAction::SearchJoined { search_id: id, .. } if *id == search_id
                ),
                BoardAction::SearchJoined { search_id: id, .. } => *id == search_id,
                BoardAction::BoardRejected { search_id: id, .. } => *id == search_id,
                _ => false,
            },
            state.request_timeout,
        )
        .await
        .map_err(store_error)?;

    match outcome {
        BoardAction::BoardRejected { reason, .. } => Err(board_error(&reason)),
        _ => Ok(Json(serde_json::json!({ "status": "joined" }))),
    }
}

/// Delete an ad (creator or admin).
pub async fn delete_search(
    SessionUser(principal): SessionUser,
    State(state): State<AppState>,
    Path(search_id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, AppError> {
    let search_id = SearchId::from_uuid(search_id);

    let outcome = state
        .board
        .send_and_wait_for(
            BoardAction::DeleteSearch {
                search_id,
                principal,
            },
            move |action| board_outcome_for(action, search_id),
            state.request_timeout,
        )
        .await
        .map_err(store_error)?;

    match outcome {
        BoardAction::Committed { .. } => Ok(Json(serde_json::json!({ "status": "deleted" }))),
        BoardAction::BoardRejected { reason, .. } => Err(board_error(&reason)),
        _ => Err(AppError::internal("Unexpected board outcome")),
    }
}

/// Whether a broadcast board action is the outcome for `search_id`.
fn board_outcome_for(action: &BoardAction, search_id: SearchId) -> bool {
    match action {
        BoardAction::Committed { event, .. } => match event.as_ref() {
            BoardAction::SearchCreated { search } => search.id == search_id,
            BoardAction::SearchJoined { search_id: id, .. }
            | BoardAction::SearchDeleted { search_id: id } => *id == search_id,
            _ => false,
        },
        BoardAction::BoardRejected { search_id: id, .. } => *id == search_id,
        _ => false,
    }
}
