//! Application state for the booking HTTP server.
//!
//! Shared resources for all handlers: the four aggregate stores, the
//! session verifier, and the booking rules handlers need for read-side
//! projections (calendar operating hours).

use crate::aggregates::booking::{LedgerAction, LedgerEnvironment, LedgerReducer, LedgerState};
use crate::aggregates::fields::{
    RegistryAction, RegistryEnvironment, RegistryReducer, RegistryState,
};
use crate::aggregates::payment::{PaymentAction, PaymentEnvironment, PaymentReducer, PaymentState};
use crate::aggregates::team_board::{BoardAction, BoardEnvironment, BoardReducer, BoardState};
use crate::auth::SessionVerifier;
use crate::config::BookingRules;
use axum::extract::FromRef;
use sahabul_runtime::Store;
use std::sync::Arc;
use std::time::Duration;

/// Field registry store.
pub type RegistryStore = Store<RegistryState, RegistryAction, RegistryEnvironment, RegistryReducer>;
/// Booking ledger store.
pub type LedgerStore = Store<LedgerState, LedgerAction, LedgerEnvironment, LedgerReducer>;
/// Payment coordinator store.
pub type PaymentStore = Store<PaymentState, PaymentAction, PaymentEnvironment, PaymentReducer>;
/// Team-search board store.
pub type BoardStore = Store<BoardState, BoardAction, BoardEnvironment, BoardReducer>;

/// Application state shared across all HTTP handlers.
///
/// Cloned cheaply (everything is behind an `Arc`) for each request.
#[derive(Clone)]
pub struct AppState {
    /// Field registry aggregate
    pub registry: Arc<RegistryStore>,
    /// Booking ledger aggregate
    pub ledger: Arc<LedgerStore>,
    /// Payment coordinator aggregate
    pub payments: Arc<PaymentStore>,
    /// Team-search board aggregate
    pub board: Arc<BoardStore>,
    /// Session verification seam
    pub verifier: Arc<dyn SessionVerifier>,
    /// Booking rules (operating hours for the calendar projection)
    pub rules: BookingRules,
    /// How long request handlers wait for an aggregate outcome
    pub request_timeout: Duration,
}

// Lets the SessionUser extractor pull the verifier out of AppState
impl FromRef<AppState> for Arc<dyn SessionVerifier> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.verifier.clone()
    }
}
