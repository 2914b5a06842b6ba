//! Shared helpers for store-level integration tests.
//!
//! Wires the real bootstrap (stores, bus relays, sweeper) over the
//! in-memory event store and the mock gateway, so tests exercise the same
//! pipeline production runs - only the edges are swapped.

// Each test binary uses a subset of these helpers
#![allow(dead_code)]

use chrono::{NaiveDate, Utc};
use sahabul::aggregates::booking::{FieldTerms, LedgerAction};
use sahabul::aggregates::fields::{FieldRegistration, RegistryAction};
use sahabul::auth::StaticSessionVerifier;
use sahabul::bootstrap;
use sahabul::config::{BookingRules, Config, PaymentsConfig, PostgresConfig, ServerConfig};
use sahabul::payment_gateway::MockPaymentGateway;
use sahabul::server::state::AppState;
use sahabul::types::{
    BookingId, FieldId, GeoPoint, Money, Principal, Role, UserId,
};
use sahabul_testing::InMemoryEventStore;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// How long tests wait for an aggregate outcome.
pub const WAIT: Duration = Duration::from_secs(5);

/// Config for tests: mock gateway, fast sweeps, configurable callback
/// timeout.
pub fn test_config(callback_timeout_secs: u64) -> Config {
    Config {
        postgres: PostgresConfig {
            url: "postgres://unused".to_string(),
            max_connections: 1,
            connect_timeout: 1,
        },
        server: ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            log_level: "warn".to_string(),
            metrics_port: None,
            shutdown_timeout: 5,
        },
        payments: PaymentsConfig {
            platform_fee_kurus: 5_000,
            callback_timeout_secs,
            gateway_base_url: None,
        },
        booking: BookingRules {
            sweep_interval_secs: 3600, // tests trigger sweeps explicitly
            ..BookingRules::default()
        },
    }
}

/// Build a fully-wired app over in-memory infrastructure.
pub async fn test_app(callback_timeout_secs: u64) -> (AppState, Arc<InMemoryEventStore>) {
    let event_store = Arc::new(InMemoryEventStore::new());
    let state = bootstrap::build(
        &test_config(callback_timeout_secs),
        event_store.clone(),
        MockPaymentGateway::shared(),
        Arc::new(StaticSessionVerifier::new()),
    )
    .await
    .unwrap_or_else(|e| panic!("bootstrap failed: {e}"));

    (state, event_store)
}

/// Register and approve a field, returning its id and booking terms.
pub async fn approved_field(state: &AppState, base_lira: u64) -> (FieldId, FieldTerms) {
    let owner = Principal::new(UserId::new(), Role::Owner);
    let admin = Principal::new(UserId::new(), Role::Admin);
    let field_id = FieldId::new();

    let registration = FieldRegistration {
        name: "Test Arena".to_string(),
        city: "Ankara".to_string(),
        address: "Stadyum Sok. 1".to_string(),
        location: GeoPoint { lat: 39.9, lon: 32.8 },
        base_price_per_hour: Money::from_lira(base_lira),
        subscription_price_4_match: None,
        contact_phone: None,
        tax_number: None,
        iban: None,
        photos: vec![],
    };

    let registered = state
        .registry
        .send_and_wait_for(
            RegistryAction::RegisterField {
                field_id,
                principal: owner,
                registration,
            },
            |a| matches!(a, RegistryAction::Committed { .. } | RegistryAction::RegistryRejected { .. }),
            WAIT,
        )
        .await
        .unwrap_or_else(|e| panic!("register field: {e}"));
    assert!(
        matches!(registered, RegistryAction::Committed { .. }),
        "field registration rejected: {registered:?}"
    );

    let approved = state
        .registry
        .send_and_wait_for(
            RegistryAction::ApproveField {
                field_id,
                principal: admin,
            },
            |a| matches!(a, RegistryAction::Committed { .. } | RegistryAction::RegistryRejected { .. }),
            WAIT,
        )
        .await
        .unwrap_or_else(|e| panic!("approve field: {e}"));
    assert!(matches!(approved, RegistryAction::Committed { .. }));

    let terms = FieldTerms {
        field_id,
        approved: true,
        base_price_per_hour: Money::from_lira(base_lira),
        subscription_price_4_match: None,
    };

    (field_id, terms)
}

/// Create a booking through the ledger, returning the outcome action.
pub async fn create_booking(
    state: &AppState,
    user_id: UserId,
    terms: FieldTerms,
    date: NaiveDate,
    hour: u8,
    is_subscription: bool,
) -> LedgerAction {
    let booking_id = BookingId::new();
    state
        .ledger
        .send_and_wait_for(
            LedgerAction::CreateBooking {
                booking_id,
                user_id,
                terms,
                date,
                hour,
                is_subscription,
            },
            move |action| match action {
                LedgerAction::CommittedBatch { events, .. } => events.iter().any(|e| {
                    matches!(e, LedgerAction::BookingCreated { booking } if booking.id == booking_id)
                }),
                LedgerAction::BookingRejected { booking_id: id, .. } => *id == booking_id,
                _ => false,
            },
            WAIT,
        )
        .await
        .unwrap_or_else(|e| panic!("create booking: {e}"))
}

/// Extract the created booking id from a create outcome, if it succeeded.
pub fn created_booking_id(outcome: &LedgerAction) -> Option<BookingId> {
    match outcome {
        LedgerAction::CommittedBatch { events, .. } => events.iter().find_map(|e| match e {
            LedgerAction::BookingCreated { booking } => Some(booking.id),
            _ => None,
        }),
        _ => None,
    }
}

/// A date comfortably in the future relative to the system clock.
pub fn future_date(days: i64) -> NaiveDate {
    (Utc::now() + chrono::Duration::days(days)).date_naive()
}

/// Poll until `cond` holds or the timeout elapses. Returns whether the
/// condition was met.
pub async fn eventually<F, Fut>(mut cond: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + WAIT;
    loop {
        if cond().await {
            return true;
        }
        if tokio::time::Instant::now() > deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}
