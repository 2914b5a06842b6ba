//! Loyalty ("Altın Taç") status endpoint.
//!
//! `GET /api/loyalty/status` reports the caller's crown balance, progress
//! toward the next discount tier, and discount eligibility. Crowns are
//! awarded by the ledger, one per successfully paid booking.

use crate::auth::SessionUser;
use crate::server::state::AppState;
use axum::{Json, extract::State};
use sahabul_web::error::AppError;
use serde::Serialize;

/// Loyalty status response.
#[derive(Debug, Serialize)]
pub struct LoyaltyStatusResponse {
    /// Crown balance
    pub altin_tac: u32,
    /// Progress toward the threshold, 0-100
    pub progress: f32,
    /// Whether the subscription discount applies
    pub eligible_for_discount: bool,
}

/// Report the caller's loyalty status.
pub async fn loyalty_status(
    SessionUser(principal): SessionUser,
    State(state): State<AppState>,
) -> Result<Json<LoyaltyStatusResponse>, AppError> {
    let crowns = state
        .ledger
        .state(move |s| s.crowns_of(&principal.user_id))
        .await;

    let threshold = state.rules.loyalty_threshold.max(1);
    #[allow(clippy::cast_precision_loss)] // Crown counts are tiny
    let progress = (crowns % threshold) as f32 / threshold as f32 * 100.0;

    Ok(Json(LoyaltyStatusResponse {
        altin_tac: crowns,
        progress,
        eligible_for_discount: crowns >= state.rules.loyalty_threshold,
    }))
}
