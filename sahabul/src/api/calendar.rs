//! Weekly availability calendar endpoint.
//!
//! `GET /api/fields/:id/calendar?week_start=YYYY-MM-DD` projects one
//! field's week into hourly slots, each with exactly one status.

use super::parse_date;
use crate::calendar::{WeekCalendar, week_calendar};
use crate::server::state::AppState;
use crate::types::FieldId;
use axum::{
    Json,
    extract::{Path, Query, State},
};
use chrono::Utc;
use sahabul_web::error::AppError;
use serde::Deserialize;
use uuid::Uuid;

/// Calendar query parameters.
#[derive(Debug, Deserialize)]
pub struct CalendarQuery {
    /// First day of the projected week, `YYYY-MM-DD`. Defaults to today.
    pub week_start: Option<String>,
}

/// Week-projected slot grid for a field.
///
/// Only approved fields have public calendars. The grid reflects one
/// consistent snapshot of ledger occupancy: no slot can appear available
/// and reserved to two readers of the same instant.
pub async fn get_calendar(
    State(state): State<AppState>,
    Path(field_id): Path<Uuid>,
    Query(query): Query<CalendarQuery>,
) -> Result<Json<WeekCalendar>, AppError> {
    let id = FieldId::from_uuid(field_id);

    let field = state
        .registry
        .state(move |s| s.fields.get(&id).cloned())
        .await
        .filter(|f| f.approved)
        .ok_or_else(|| AppError::not_found("Field", field_id))?;

    let now = Utc::now();
    let week_start = match &query.week_start {
        Some(raw) => parse_date(raw)?,
        None => now.date_naive(),
    };

    let occupancy = state.ledger.state(|s| s.occupancy.clone()).await;

    Ok(Json(week_calendar(
        field.id,
        state.rules.operating_hours(),
        &occupancy,
        week_start,
        now,
    )))
}
