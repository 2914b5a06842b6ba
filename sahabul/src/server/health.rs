//! Health and readiness endpoints.

use crate::server::state::AppState;
use axum::{Json, extract::State};
use serde_json::json;

/// Liveness probe: the process is up and serving.
pub async fn health_check() -> Json<serde_json::Value> {
    Json(json!({ "status": "healthy" }))
}

/// Readiness probe: the aggregate stores answer state reads and the
/// dead-letter queues are not saturated.
pub async fn readiness_check(State(state): State<AppState>) -> Json<serde_json::Value> {
    let bookings = state.ledger.state(|s| s.bookings.len()).await;
    let fields = state.registry.state(|s| s.fields.len()).await;

    let ledger_dlq = state.ledger.dlq();
    let degraded = ledger_dlq.len() * 2 > ledger_dlq.max_size();

    Json(json!({
        "status": if degraded { "degraded" } else { "ready" },
        "bookings": bookings,
        "fields": fields,
        "ledger_dlq": ledger_dlq.len(),
    }))
}
