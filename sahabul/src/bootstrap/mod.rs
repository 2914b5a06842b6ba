//! Service wiring: stores, event-bus relays, background tasks.
//!
//! Builds the four aggregate stores over one event store and one
//! in-process bus, rehydrates their state from persisted events, and
//! installs the saga plumbing:
//!
//! - payment events → booking ledger (`RecordPaymentOutcome`)
//! - booking cancellations → payment coordinator (`RequestRefund`)
//! - a periodic completion sweep on the ledger
//!
//! Relays subscribe before any store accepts commands, so no committed
//! event can slip past them.

use crate::aggregates::booking::{
    BOOKING_STREAM, BOOKING_TOPIC, CancelReason, LedgerAction, LedgerEnvironment, LedgerReducer,
    LedgerRules, LedgerState, PaymentOutcome,
};
use crate::aggregates::fields::{
    FIELD_STREAM, RegistryEnvironment, RegistryReducer, RegistryState,
};
use crate::aggregates::payment::{
    PAYMENT_STREAM, PAYMENT_TOPIC, PaymentAction, PaymentEnvironment, PaymentReducer, PaymentState,
};
use crate::aggregates::team_board::{
    BOARD_STREAM, BoardEnvironment, BoardReducer, BoardState,
};
use crate::auth::SessionVerifier;
use crate::config::Config;
use crate::payment_gateway::PaymentGateway;
use crate::server::state::AppState;
use anyhow::Context;
use futures::StreamExt;
use sahabul_core::environment::{Clock, SystemClock};
use sahabul_core::event_bus::{BroadcastEventBus, EventBus};
use sahabul_core::event_store::EventStore;
use sahabul_core::stream::StreamId;
use sahabul_runtime::Store;
use std::sync::Arc;
use std::time::Duration;

/// How long HTTP handlers wait for an aggregate outcome.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Build the fully-wired application state.
///
/// # Errors
///
/// Returns an error if rehydration reads or bus subscriptions fail.
pub async fn build(
    config: &Config,
    event_store: Arc<dyn EventStore>,
    gateway: Arc<dyn PaymentGateway>,
    verifier: Arc<dyn SessionVerifier>,
) -> anyhow::Result<AppState> {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let bus: Arc<dyn EventBus> = Arc::new(BroadcastEventBus::new());

    // ---- Rehydrate aggregate state from the event store ----

    let ledger_events = event_store
        .load_events(StreamId::new(BOOKING_STREAM), None)
        .await
        .context("loading booking events")?;
    let registry_events = event_store
        .load_events(StreamId::new(FIELD_STREAM), None)
        .await
        .context("loading field events")?;
    let payment_events = event_store
        .load_events(StreamId::new(PAYMENT_STREAM), None)
        .await
        .context("loading payment events")?;
    let board_events = event_store
        .load_events(StreamId::new(BOARD_STREAM), None)
        .await
        .context("loading team-search events")?;

    tracing::info!(
        bookings = ledger_events.len(),
        fields = registry_events.len(),
        payments = payment_events.len(),
        team_searches = board_events.len(),
        "Rehydrated event streams"
    );

    // ---- Build stores ----

    let rules = LedgerRules {
        platform_fee: config.payments.platform_fee(),
        cancellation_window: config.booking.cancellation_window(),
        loyalty_threshold: config.booking.loyalty_threshold,
        loyalty_discount_percent: config.booking.loyalty_discount_percent,
        operating_hours: config.booking.operating_hours(),
    };

    let ledger = Arc::new(Store::new(
        LedgerState::rehydrate(&ledger_events),
        LedgerReducer::new(),
        LedgerEnvironment::new(
            Arc::clone(&clock),
            Arc::clone(&event_store),
            Arc::clone(&bus),
            rules,
        ),
    ));

    let registry = Arc::new(Store::new(
        RegistryState::rehydrate(&registry_events),
        RegistryReducer::new(),
        RegistryEnvironment::new(
            Arc::clone(&clock),
            Arc::clone(&event_store),
            Arc::clone(&bus),
        ),
    ));

    let payments = Arc::new(Store::new(
        PaymentState::rehydrate(&payment_events),
        PaymentReducer::new(),
        PaymentEnvironment::new(
            Arc::clone(&clock),
            Arc::clone(&event_store),
            Arc::clone(&bus),
            gateway,
            config.payments.callback_timeout(),
        ),
    ));

    let board = Arc::new(Store::new(
        BoardState::rehydrate(&board_events),
        BoardReducer::new(),
        BoardEnvironment::new(
            Arc::clone(&clock),
            Arc::clone(&event_store),
            Arc::clone(&bus),
        ),
    ));

    // ---- Saga relays ----

    spawn_payment_relay(&bus, Arc::clone(&ledger)).await?;
    spawn_refund_relay(&bus, Arc::clone(&payments)).await?;
    spawn_completion_sweeper(Arc::clone(&ledger), config.booking.sweep_interval_secs);

    Ok(AppState {
        registry,
        ledger,
        payments,
        board,
        verifier,
        rules: config.booking.clone(),
        request_timeout: REQUEST_TIMEOUT,
    })
}

/// Relay payment outcomes into the booking ledger.
async fn spawn_payment_relay(
    bus: &Arc<dyn EventBus>,
    ledger: Arc<crate::server::state::LedgerStore>,
) -> anyhow::Result<()> {
    let mut stream = bus
        .subscribe(&[PAYMENT_TOPIC])
        .await
        .map_err(|e| anyhow::anyhow!("subscribing to payment events: {e}"))?;

    tokio::spawn(async move {
        while let Some(item) = stream.next().await {
            let event = match item {
                Ok(event) => event,
                Err(error) => {
                    tracing::warn!(error = %error, "Payment relay stream error");
                    continue;
                },
            };

            let Ok(action) = event.decode::<PaymentAction>() else {
                tracing::warn!(event_type = %event.event_type, "Undecodable payment event");
                continue;
            };

            let relay = match action {
                PaymentAction::PaymentSucceeded { booking_id, .. } => {
                    Some((booking_id, PaymentOutcome::Succeeded))
                },
                PaymentAction::PaymentFailed {
                    booking_id, reason, ..
                }
                | PaymentAction::CheckoutFailed {
                    booking_id, reason, ..
                } => Some((booking_id, PaymentOutcome::Failed { reason })),
                PaymentAction::PaymentTimedOut { booking_id, .. } => {
                    Some((booking_id, PaymentOutcome::TimedOut))
                },
                _ => None,
            };

            if let Some((booking_id, outcome)) = relay {
                if let Err(error) = ledger
                    .send(LedgerAction::RecordPaymentOutcome {
                        booking_id,
                        outcome,
                        attempt: 0,
                    })
                    .await
                {
                    tracing::error!(
                        booking_id = %booking_id,
                        error = %error,
                        "Failed to relay payment outcome"
                    );
                }
            }
        }
        tracing::info!("Payment relay stream closed");
    });

    Ok(())
}

/// Relay user cancellations into refund requests.
async fn spawn_refund_relay(
    bus: &Arc<dyn EventBus>,
    payments: Arc<crate::server::state::PaymentStore>,
) -> anyhow::Result<()> {
    let mut stream = bus
        .subscribe(&[BOOKING_TOPIC])
        .await
        .map_err(|e| anyhow::anyhow!("subscribing to booking events: {e}"))?;

    tokio::spawn(async move {
        while let Some(item) = stream.next().await {
            let Ok(event) = item else { continue };
            let Ok(action) = event.decode::<LedgerAction>() else {
                continue;
            };

            // Only explicit user cancellations owe a refund; failure and
            // timeout cancellations never captured anything.
            if let LedgerAction::BookingCancelled {
                booking_id,
                reason: CancelReason::User,
                refund,
                ..
            } = action
            {
                if refund.is_zero() {
                    continue;
                }
                if let Err(error) = payments
                    .send(PaymentAction::RequestRefund {
                        booking_id,
                        amount: refund,
                    })
                    .await
                {
                    tracing::error!(
                        booking_id = %booking_id,
                        error = %error,
                        "Failed to relay refund request"
                    );
                }
            }
        }
        tracing::info!("Refund relay stream closed");
    });

    Ok(())
}

/// Periodic completion sweep: bookings whose slots elapsed move to
/// `completed`.
fn spawn_completion_sweeper(
    ledger: Arc<crate::server::state::LedgerStore>,
    interval_secs: u64,
) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs.max(1)));
        // First tick fires immediately; skip it so startup stays quiet
        ticker.tick().await;
        loop {
            ticker.tick().await;
            if let Err(error) = ledger.send(LedgerAction::SweepCompleted { attempt: 0 }).await {
                tracing::warn!(error = %error, "Completion sweep rejected");
                break;
            }
        }
    });
}

/// Install the Prometheus exporter when a metrics port is configured.
///
/// # Errors
///
/// Returns an error if the exporter fails to bind.
pub fn install_metrics_exporter(port: u16) -> anyhow::Result<()> {
    use metrics_exporter_prometheus::PrometheusBuilder;

    PrometheusBuilder::new()
        .with_http_listener(([0, 0, 0, 0], port))
        .install()
        .context("installing Prometheus exporter")?;

    tracing::info!(port, "Prometheus exporter listening");
    Ok(())
}
