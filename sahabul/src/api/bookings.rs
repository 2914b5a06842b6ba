//! Booking endpoints.
//!
//! - `POST /api/bookings` - create a booking (single or 4-match
//!   subscription); returns the server-computed charge breakdown
//! - `GET /api/bookings` - caller's bookings (owners see their fields')
//! - `DELETE /api/bookings/:id` - cancellation under the 72-hour rule,
//!   triggering an asynchronous refund

use super::{ledger_error, parse_date, parse_hour, store_error};
use crate::aggregates::booking::{FieldTerms, LedgerAction};
use crate::auth::SessionUser;
use crate::server::state::AppState;
use crate::types::{Booking, BookingId, BookingStatus, ChargeBreakdown, FieldId, Money, Role};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use chrono::{DateTime, NaiveDate, Utc};
use sahabul_web::error::AppError;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Request to create a booking.
#[derive(Debug, Deserialize)]
pub struct CreateBookingRequest {
    /// Field to book
    pub field_id: Uuid,
    /// Match date, `YYYY-MM-DD`
    pub date: String,
    /// Slot start, `HH:00`
    pub time: String,
    /// Reserve 4 weekly occurrences as one unit
    #[serde(default)]
    pub is_subscription: bool,
}

/// Charge breakdown in kuruş.
#[derive(Debug, Serialize)]
pub struct ChargeResponse {
    /// Amount the user pays
    pub total: Money,
    /// Platform fee share
    pub platform_fee: Money,
    /// Field owner's share
    pub owner_share: Money,
    /// Loyalty discount applied (zero when ineligible)
    pub loyalty_discount: Money,
}

impl From<ChargeBreakdown> for ChargeResponse {
    fn from(charge: ChargeBreakdown) -> Self {
        Self {
            total: charge.total,
            platform_fee: charge.platform_fee,
            owner_share: charge.owner_share,
            loyalty_discount: charge.loyalty_discount,
        }
    }
}

/// A booking in API responses.
#[derive(Debug, Serialize)]
pub struct BookingResponse {
    /// Booking id
    pub id: Uuid,
    /// Booked field
    pub field_id: Uuid,
    /// Match date
    pub date: NaiveDate,
    /// Slot start hour
    pub start_hour: u8,
    /// Slot end hour
    pub end_hour: u8,
    /// Whether this is a 4-match subscription
    pub is_subscription: bool,
    /// Lifecycle status
    pub status: BookingStatus,
    /// Charge breakdown (kuruş)
    pub charge: ChargeResponse,
    /// Creation time
    pub created_at: DateTime<Utc>,
}

impl From<Booking> for BookingResponse {
    fn from(booking: Booking) -> Self {
        Self {
            id: *booking.id.as_uuid(),
            field_id: *booking.field_id.as_uuid(),
            date: booking.date,
            start_hour: booking.start_hour,
            end_hour: booking.end_hour(),
            is_subscription: booking.is_subscription,
            status: booking.status,
            charge: booking.charge.into(),
            created_at: booking.created_at,
        }
    }
}

/// Response after creating a booking.
#[derive(Debug, Serialize)]
pub struct CreateBookingResponse {
    /// The created booking
    pub booking: BookingResponse,
    /// Where to take the payment next
    pub payment_initiation: String,
}

/// Create a booking.
///
/// The ledger performs the atomic check-and-reserve; when two users race
/// for the same slot exactly one of them receives the booking, the other
/// a 409 `SLOT_CONFLICT`.
pub async fn create_booking(
    SessionUser(principal): SessionUser,
    State(state): State<AppState>,
    Json(request): Json<CreateBookingRequest>,
) -> Result<(StatusCode, Json<CreateBookingResponse>), AppError> {
    let date = parse_date(&request.date)?;
    let hour = parse_hour(&request.time)?;
    let field_id = FieldId::from_uuid(request.field_id);

    // Resolve the field snapshot the ledger prices against
    let field = state
        .registry
        .state(|s| s.fields.get(&field_id).cloned())
        .await
        .ok_or_else(|| AppError::not_found("Field", request.field_id))?;

    let terms = FieldTerms {
        field_id,
        approved: field.approved,
        base_price_per_hour: field.base_price_per_hour,
        subscription_price_4_match: field.subscription_price_4_match,
    };

    let booking_id = BookingId::new();
    let outcome = state
        .ledger
        .send_and_wait_for(
            LedgerAction::CreateBooking {
                booking_id,
                user_id: principal.user_id,
                terms,
                date,
                hour,
                is_subscription: request.is_subscription,
            },
            move |action| match action {
                LedgerAction::CommittedBatch { events, .. } => events.iter().any(|e| {
                    matches!(e, LedgerAction::BookingCreated { booking } if booking.id == booking_id)
                }),
                LedgerAction::BookingRejected { booking_id: id, .. } => *id == booking_id,
                _ => false,
            },
            state.request_timeout,
        )
        .await
        .map_err(store_error)?;

    match outcome {
        LedgerAction::CommittedBatch { events, .. } => {
            let booking = events
                .into_iter()
                .find_map(|e| match e {
                    LedgerAction::BookingCreated { booking } if booking.id == booking_id => {
                        Some(booking)
                    },
                    _ => None,
                })
                .ok_or_else(|| AppError::internal("Committed booking missing from batch"))?;

            Ok((
                StatusCode::CREATED,
                Json(CreateBookingResponse {
                    payment_initiation: format!("/api/payments/initiate/{booking_id}"),
                    booking: booking.into(),
                }),
            ))
        },
        LedgerAction::BookingRejected { reason, .. } => Err(ledger_error(&reason)),
        _ => Err(AppError::internal("Unexpected ledger outcome")),
    }
}

/// List the caller's bookings.
///
/// Players see their own bookings; owners see every booking on their
/// fields (the console view).
#[derive(Debug, Serialize)]
pub struct ListBookingsResponse {
    /// The bookings, newest first
    pub bookings: Vec<BookingResponse>,
    /// Total count
    pub total: usize,
}

/// List bookings for the authenticated principal.
pub async fn list_bookings(
    SessionUser(principal): SessionUser,
    State(state): State<AppState>,
) -> Result<Json<ListBookingsResponse>, AppError> {
    let bookings = if principal.role == Role::Owner {
        let field_ids: Vec<FieldId> = state
            .registry
            .state(|s| s.fields_of_owner(&principal.user_id))
            .await
            .into_iter()
            .map(|f| f.id)
            .collect();
        state
            .ledger
            .state(move |s| s.bookings_for_fields(&field_ids))
            .await
    } else {
        state
            .ledger
            .state(move |s| s.bookings_for_user(&principal.user_id))
            .await
    };

    let bookings: Vec<BookingResponse> = bookings.into_iter().map(Into::into).collect();
    Ok(Json(ListBookingsResponse {
        total: bookings.len(),
        bookings,
    }))
}

/// Response after cancelling a booking.
#[derive(Debug, Serialize)]
pub struct CancelBookingResponse {
    /// The cancelled booking
    pub booking_id: Uuid,
    /// Status after cancellation
    pub status: BookingStatus,
    /// Refund owed (kuruş); processed asynchronously
    pub refund: Money,
    /// Message for the user
    pub message: String,
}

/// Cancel a booking.
///
/// Allowed only for confirmed/paid bookings strictly more than 72 hours
/// before the slot start. The refund request goes to the payment
/// coordinator asynchronously; this response does not wait for it.
pub async fn cancel_booking(
    SessionUser(principal): SessionUser,
    State(state): State<AppState>,
    Path(booking_id): Path<Uuid>,
) -> Result<Json<CancelBookingResponse>, AppError> {
    let booking_id = BookingId::from_uuid(booking_id);

    let outcome = state
        .ledger
        .send_and_wait_for(
            LedgerAction::CancelBooking {
                booking_id,
                principal,
                attempt: 0,
            },
            move |action| match action {
                LedgerAction::CommittedBatch { events, .. } => events.iter().any(|e| {
                    matches!(e, LedgerAction::BookingCancelled { booking_id: id, .. } if *id == booking_id)
                }),
                LedgerAction::BookingRejected { booking_id: id, .. } => *id == booking_id,
                _ => false,
            },
            state.request_timeout,
        )
        .await
        .map_err(store_error)?;

    match outcome {
        LedgerAction::CommittedBatch { events, .. } => {
            let refund = events
                .iter()
                .find_map(|e| match e {
                    LedgerAction::BookingCancelled { refund, .. } => Some(*refund),
                    _ => None,
                })
                .unwrap_or(Money::ZERO);

            Ok(Json(CancelBookingResponse {
                booking_id: *booking_id.as_uuid(),
                status: BookingStatus::Cancelled,
                refund,
                message: "Booking cancelled; the refund is being processed".to_string(),
            }))
        },
        LedgerAction::BookingRejected { reason, .. } => Err(ledger_error(&reason)),
        _ => Err(AppError::internal("Unexpected ledger outcome")),
    }
}
