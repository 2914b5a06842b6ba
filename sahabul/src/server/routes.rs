//! Router configuration for the booking service.

use super::health::{health_check, readiness_check};
use super::state::AppState;
use crate::api::{bookings, calendar, fields, loyalty, payments, reviews, team_search};
use axum::{
    Router,
    routing::{delete, get, post, put},
};

/// Build the complete Axum router.
///
/// - Field registry and calendar (public reads, owner/admin writes)
/// - Booking lifecycle
/// - Payment initiation, gateway webhook, sandbox page
/// - Loyalty status
/// - Reviews
/// - Team-search board
pub fn build_router(state: AppState) -> Router {
    let api_routes = Router::new()
        // Field registry
        .route("/fields", get(fields::list_fields))
        .route("/fields", post(fields::create_field))
        .route("/fields/:id", get(fields::get_field))
        .route("/fields/:id/approve", post(fields::approve_field))
        .route("/fields/:id/photos", post(fields::add_photo))
        .route("/fields/:id/cover-photo", put(fields::set_cover_photo))
        // Availability calendar (CQRS read side)
        .route("/fields/:id/calendar", get(calendar::get_calendar))
        // Bookings
        .route("/bookings", post(bookings::create_booking))
        .route("/bookings", get(bookings::list_bookings))
        .route("/bookings/:id", delete(bookings::cancel_booking))
        // Payments
        .route("/payments/initiate/:booking_id", post(payments::initiate_payment))
        .route("/payments/callback", post(payments::payment_callback))
        .route("/payments/simulate/:merchant_oid", get(payments::simulate_payment))
        // Loyalty
        .route("/loyalty/status", get(loyalty::loyalty_status))
        // Reviews
        .route("/reviews", post(reviews::create_review))
        .route("/reviews/:field_id", get(reviews::list_reviews))
        .route("/reviews/:id/approve", post(reviews::approve_review))
        // Team-search board
        .route("/team-search", post(team_search::create_search))
        .route("/team-search", get(team_search::list_searches))
        .route("/team-search/:id/join", post(team_search::join_search))
        .route("/team-search/:id", delete(team_search::delete_search));

    Router::new()
        // Health checks (no authentication)
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        // API routes under /api prefix
        .nest("/api", api_routes)
        .with_state(state)
}
