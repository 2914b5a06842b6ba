//! Field registry endpoints.
//!
//! - `GET /api/fields?city&date&time` - public listing (approved only),
//!   optionally filtered to fields with the given slot still available
//! - `GET /api/fields/:id` - field detail
//! - `POST /api/fields` - owner registers a field (lands unapproved)
//! - `POST /api/fields/:id/approve` - admin approval
//! - `POST /api/fields/:id/photos` - append a photo
//! - `PUT /api/fields/:id/cover-photo` - choose the cover photo

use super::{parse_date, parse_hour, registry_error, store_error};
use crate::aggregates::fields::{FieldRegistration, RegistryAction};
use crate::auth::SessionUser;
use crate::calendar::slot_status;
use crate::server::state::AppState;
use crate::types::{Field, FieldId, GeoPoint, Money, SlotKey, SlotStatus};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use chrono::Utc;
use sahabul_web::error::AppError;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Listing filters.
#[derive(Debug, Deserialize)]
pub struct ListFieldsQuery {
    /// City filter (case-insensitive)
    pub city: Option<String>,
    /// Availability filter: date, `YYYY-MM-DD` (requires `time`)
    pub date: Option<String>,
    /// Availability filter: slot start, `HH:00` (requires `date`)
    pub time: Option<String>,
}

/// A field in API responses.
#[derive(Debug, Serialize)]
pub struct FieldResponse {
    /// Field id
    pub id: Uuid,
    /// Display name
    pub name: String,
    /// City
    pub city: String,
    /// Street address
    pub address: String,
    /// Location
    pub location: GeoPoint,
    /// Hourly base price (kuruş)
    pub base_price_per_hour: Money,
    /// Optional 4-match package price (kuruş)
    pub subscription_price_4_match: Option<Money>,
    /// Average approved-review rating
    pub rating: f64,
    /// Number of approved reviews
    pub review_count: u32,
    /// Photo URLs
    pub photos: Vec<String>,
    /// Cover photo URL, when photos exist
    pub cover_photo: Option<String>,
}

impl From<Field> for FieldResponse {
    fn from(field: Field) -> Self {
        let cover_photo = field.photos.get(field.cover_photo).cloned();
        Self {
            id: *field.id.as_uuid(),
            name: field.name,
            city: field.city,
            address: field.address,
            location: field.location,
            base_price_per_hour: field.base_price_per_hour,
            subscription_price_4_match: field.subscription_price_4_match,
            rating: field.rating,
            review_count: field.review_count,
            photos: field.photos,
            cover_photo,
        }
    }
}

/// Listing response.
#[derive(Debug, Serialize)]
pub struct ListFieldsResponse {
    /// Matching fields
    pub fields: Vec<FieldResponse>,
    /// Total count
    pub total: usize,
}

/// List approved fields, optionally filtered by city and slot
/// availability.
pub async fn list_fields(
    State(state): State<AppState>,
    Query(query): Query<ListFieldsQuery>,
) -> Result<Json<ListFieldsResponse>, AppError> {
    let ListFieldsQuery { city, date, time } = query;

    let mut fields = state
        .registry
        .state(move |s| s.approved_fields(city.as_deref()))
        .await;

    // Availability filter: keep fields where the requested slot is free
    if let (Some(date), Some(time)) = (&date, &time) {
        let date = parse_date(date)?;
        let hour = parse_hour(time)?;
        let occupancy = state.ledger.state(|s| s.occupancy.clone()).await;
        let now = Utc::now();

        fields.retain(|field| {
            slot_status(&occupancy, SlotKey::new(field.id, date, hour), now)
                == SlotStatus::Available
        });
    }

    let fields: Vec<FieldResponse> = fields.into_iter().map(Into::into).collect();
    Ok(Json(ListFieldsResponse {
        total: fields.len(),
        fields,
    }))
}

/// Field detail. Unapproved fields are visible only to their owner or an
/// admin through this endpoint's absence - publicly they do not exist.
pub async fn get_field(
    State(state): State<AppState>,
    Path(field_id): Path<Uuid>,
) -> Result<Json<FieldResponse>, AppError> {
    let id = FieldId::from_uuid(field_id);
    let field = state
        .registry
        .state(move |s| s.fields.get(&id).cloned())
        .await
        .filter(|f| f.approved)
        .ok_or_else(|| AppError::not_found("Field", field_id))?;

    Ok(Json(field.into()))
}

/// Owner field-registration request.
#[derive(Debug, Deserialize)]
pub struct CreateFieldRequest {
    /// Display name
    pub name: String,
    /// City
    pub city: String,
    /// Street address
    pub address: String,
    /// Location
    pub location: GeoPoint,
    /// Hourly base price in kuruş
    pub base_price_per_hour: u64,
    /// Optional 4-match package price in kuruş
    pub subscription_price_4_match: Option<u64>,
    /// Contact phone
    pub contact_phone: Option<String>,
    /// Tax number (10 digits)
    pub tax_number: Option<String>,
    /// Payout IBAN (TR-prefixed, 26 chars)
    pub iban: Option<String>,
    /// Initial photo URLs (max 10)
    #[serde(default)]
    pub photos: Vec<String>,
}

/// Response after registering a field.
#[derive(Debug, Serialize)]
pub struct CreateFieldResponse {
    /// The new field id
    pub field_id: Uuid,
    /// Approval state (always false at registration)
    pub approved: bool,
    /// Message for the owner
    pub message: String,
}

/// Register a field (owner role). The field awaits admin approval before
/// it appears anywhere public.
pub async fn create_field(
    SessionUser(principal): SessionUser,
    State(state): State<AppState>,
    Json(request): Json<CreateFieldRequest>,
) -> Result<(StatusCode, Json<CreateFieldResponse>), AppError> {
    let field_id = FieldId::new();
    let registration = FieldRegistration {
        name: request.name,
        city: request.city,
        address: request.address,
        location: request.location,
        base_price_per_hour: Money::from_kurus(request.base_price_per_hour),
        subscription_price_4_match: request.subscription_price_4_match.map(Money::from_kurus),
        contact_phone: request.contact_phone,
        tax_number: request.tax_number,
        iban: request.iban,
        photos: request.photos,
    };

    let outcome = state
        .registry
        .send_and_wait_for(
            RegistryAction::RegisterField {
                field_id,
                principal,
                registration,
            },
            move |action| registry_outcome_for(action, &field_id.to_string()),
            state.request_timeout,
        )
        .await
        .map_err(store_error)?;

    match outcome {
        RegistryAction::Committed { .. } => Ok((
            StatusCode::CREATED,
            Json(CreateFieldResponse {
                field_id: *field_id.as_uuid(),
                approved: false,
                message: "Field registered; it will be listed after admin approval".to_string(),
            }),
        )),
        RegistryAction::RegistryRejected { reason, .. } => Err(registry_error(&reason)),
        _ => Err(AppError::internal("Unexpected registry outcome")),
    }
}

/// Approve a field (admin role).
pub async fn approve_field(
    SessionUser(principal): SessionUser,
    State(state): State<AppState>,
    Path(field_id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, AppError> {
    let id = FieldId::from_uuid(field_id);

    let outcome = state
        .registry
        .send_and_wait_for(
            RegistryAction::ApproveField {
                field_id: id,
                principal,
            },
            move |action| registry_outcome_for(action, &id.to_string()),
            state.request_timeout,
        )
        .await
        .map_err(store_error)?;

    match outcome {
        RegistryAction::Committed { .. } => Ok(Json(serde_json::json!({
            "field_id": field_id,
            "approved": true,
        }))),
        RegistryAction::RegistryRejected { reason, .. } => Err(registry_error(&reason)),
        _ => Err(AppError::internal("Unexpected registry outcome")),
    }
}

/// Photo-append request.
#[derive(Debug, Deserialize)]
pub struct AddPhotoRequest {
    /// Photo URL
    pub url: String,
}

/// Append a photo to a field (owner or admin, max 10 photos).
pub async fn add_photo(
    SessionUser(principal): SessionUser,
    State(state): State<AppState>,
    Path(field_id): Path<Uuid>,
    Json(request): Json<AddPhotoRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let id = FieldId::from_uuid(field_id);

    let outcome = state
        .registry
        .send_and_wait_for(
            RegistryAction::AddPhoto {
                field_id: id,
                principal,
                url: request.url,
            },
            move |action| registry_outcome_for(action, &id.to_string()),
            state.request_timeout,
        )
        .await
        .map_err(store_error)?;

    match outcome {
        RegistryAction::Committed { .. } => Ok(Json(serde_json::json!({ "status": "ok" }))),
        RegistryAction::RegistryRejected { reason, .. } => Err(registry_error(&reason)),
        _ => Err(AppError::internal("Unexpected registry outcome")),
    }
}

/// Cover-photo request.
#[derive(Debug, Deserialize)]
pub struct SetCoverPhotoRequest {
    /// Index into the photo list
    pub index: usize,
}

/// Choose the cover photo (owner or admin).
pub async fn set_cover_photo(
    SessionUser(principal): SessionUser,
    State(state): State<AppState>,
    Path(field_id): Path<Uuid>,
    Json(request): Json<SetCoverPhotoRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let id = FieldId::from_uuid(field_id);

    let outcome = state
        .registry
        .send_and_wait_for(
            RegistryAction::SetCoverPhoto {
                field_id: id,
                principal,
                index: request.index,
            },
            move |action| registry_outcome_for(action, &id.to_string()),
            state.request_timeout,
        )
        .await
        .map_err(store_error)?;

    match outcome {
        RegistryAction::Committed { .. } => Ok(Json(serde_json::json!({ "status": "ok" }))),
        RegistryAction::RegistryRejected { reason, .. } => Err(registry_error(&reason)),
        _ => Err(AppError::internal("Unexpected registry outcome")),
    }
}

/// Whether a broadcast registry action is the outcome for `entity_id`.
pub(crate) fn registry_outcome_for(action: &RegistryAction, entity_id: &str) -> bool {
    match action {
        RegistryAction::Committed { event, .. } => match event.as_ref() {
            RegistryAction::FieldRegistered { field } => field.id.to_string() == entity_id,
            RegistryAction::FieldApproved { field_id, .. }
            | RegistryAction::PhotoAdded { field_id, .. }
            | RegistryAction::CoverPhotoSet { field_id, .. } => field_id.to_string() == entity_id,
            RegistryAction::ReviewSubmitted { review } => review.id.to_string() == entity_id,
            RegistryAction::ReviewApproved { review_id } => review_id.to_string() == entity_id,
            _ => false,
        },
        RegistryAction::RegistryRejected { entity_id: id, .. } => id == entity_id,
        _ => false,
    }
}

pub(crate) use self::registry_outcome_for as outcome_for;
