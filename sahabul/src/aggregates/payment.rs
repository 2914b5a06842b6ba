//! Payment coordinator aggregate.
//!
//! Hands bookings to the external payment gateway and reconciles the
//! outcome:
//!
//! 1. `InitiatePayment` creates a payment in `initiated`, asks the gateway
//!    for a checkout URL, and schedules an expiry for the callback window.
//! 2. `HandleCallback` records the gateway outcome exactly once - replays
//!    of a terminal payment are absorbed as `CallbackReplayed`, never a
//!    second transition or a duplicate financial record.
//! 3. `ExpirePayment` fires when no callback arrived in time; whichever of
//!    callback and expiry commits first wins, the loser is a no-op.
//! 4. Refunds (user cancellations) are asynchronous: the payment moves to
//!    `refund_pending` immediately and `refunded` once the gateway
//!    acknowledges; nothing blocks on the gateway.
//!
//! Committed events are published on [`PAYMENT_TOPIC`]; the booking ledger
//! consumes them to finalize or release slot holds.

use crate::payment_gateway::PaymentGateway;
use crate::types::{BookingId, Money, Payment, PaymentId, PaymentStatus, UserId};
use chrono::{DateTime, Utc};
use sahabul_core::environment::Clock;
use sahabul_core::event::SerializedEvent;
use sahabul_core::event_bus::EventBus;
use sahabul_core::event_store::EventStore;
use sahabul_core::stream::{StreamId, Version};
use sahabul_core::{SmallVec, append_events, delay, effect::Effect, publish_event, reducer::Reducer, smallvec};
use sahabul_macros::Action;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Stream the coordinator appends to.
pub const PAYMENT_STREAM: &str = "payments";

/// Topic the coordinator publishes committed events on.
pub const PAYMENT_TOPIC: &str = "payment-events";

/// Outcome reported by the gateway callback.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallbackOutcome {
    /// The gateway captured the payment
    Success,
    /// The gateway rejected or aborted the payment
    Failed,
}

// ============================================================================
// Actions (Commands + Events)
// ============================================================================

/// Actions for the payment coordinator.
#[derive(Action, Clone, Debug, Serialize, Deserialize)]
pub enum PaymentAction {
    // Commands
    /// Start a checkout for a pending booking
    #[command]
    InitiatePayment {
        /// Pre-generated payment id (correlation for the caller)
        payment_id: PaymentId,
        /// The booking being paid
        booking_id: BookingId,
        /// The paying user
        user_id: UserId,
        /// Amount from the ledger's charge breakdown
        amount: Money,
    },

    /// Record a gateway callback (idempotent)
    #[command]
    HandleCallback {
        /// External reference the gateway echoes back
        merchant_oid: String,
        /// Reported outcome
        outcome: CallbackOutcome,
    },

    /// Expire a payment whose callback window elapsed
    #[command]
    ExpirePayment {
        /// The payment to expire
        payment_id: PaymentId,
    },

    /// Request an asynchronous refund (relayed from a booking cancellation)
    #[command]
    RequestRefund {
        /// The cancelled booking
        booking_id: BookingId,
        /// Amount to refund
        amount: Money,
    },

    // Events
    /// Checkout created; callback window opened
    #[event]
    PaymentInitiated {
        /// The new payment record
        payment: Payment,
    },

    /// The gateway returned a checkout URL
    #[event]
    CheckoutReady {
        /// The payment
        payment_id: PaymentId,
        /// The booking, for caller correlation
        booking_id: BookingId,
        /// URL the user completes payment at
        payment_url: String,
    },

    /// Checkout could not be created; the payment failed upfront
    #[event]
    CheckoutFailed {
        /// The payment
        payment_id: PaymentId,
        /// The booking, for ledger release
        booking_id: BookingId,
        /// Gateway error
        reason: String,
    },

    /// The gateway confirmed capture
    #[event]
    PaymentSucceeded {
        /// The payment
        payment_id: PaymentId,
        /// The paid booking
        booking_id: BookingId,
        /// External reference
        merchant_oid: String,
        /// Captured amount
        amount: Money,
        /// Callback time
        succeeded_at: DateTime<Utc>,
    },

    /// The gateway reported failure
    #[event]
    PaymentFailed {
        /// The payment
        payment_id: PaymentId,
        /// The booking, for ledger release
        booking_id: BookingId,
        /// External reference, for callback correlation
        merchant_oid: String,
        /// Failure reason
        reason: String,
    },

    /// No callback within the window; the hold is released
    #[event]
    PaymentTimedOut {
        /// The payment
        payment_id: PaymentId,
        /// The booking, for ledger release
        booking_id: BookingId,
    },

    /// A duplicate callback was absorbed (not persisted)
    #[event]
    CallbackReplayed {
        /// External reference of the replayed callback
        merchant_oid: String,
    },

    /// Refund requested from the gateway
    #[event]
    RefundRequested {
        /// The payment being refunded
        payment_id: PaymentId,
        /// Amount to refund
        amount: Money,
        /// Request time
        requested_at: DateTime<Utc>,
    },

    /// The gateway acknowledged the refund
    #[event]
    PaymentRefunded {
        /// The refunded payment
        payment_id: PaymentId,
        /// Gateway refund reference
        refund_reference: String,
    },

    /// A callback referenced an unknown merchant oid (not persisted)
    #[event]
    CallbackUnmatched {
        /// The unknown reference
        merchant_oid: String,
    },

    /// An append was accepted: apply, bump version, publish
    Committed {
        /// The persisted event
        event: Box<PaymentAction>,
        /// New stream version
        version: Version,
    },
}

// ============================================================================
// State
// ============================================================================

/// Payment coordinator state.
#[derive(Clone, Debug, Default)]
pub struct PaymentState {
    /// Payments by id
    pub payments: HashMap<PaymentId, Payment>,
    /// Index: merchant oid -> payment id (callback routing)
    pub by_merchant_oid: HashMap<String, PaymentId>,
    /// Persisted stream version
    pub version: Version,
    /// Last anomaly, for diagnostics
    pub last_error: Option<String>,
}

impl PaymentState {
    /// Empty coordinator state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild state by replaying persisted events.
    #[must_use]
    pub fn rehydrate(events: &[SerializedEvent]) -> Self {
        let mut state = Self::new();
        for serialized in events {
            if let Ok(action) = serialized.decode::<PaymentAction>() {
                PaymentReducer::apply_event(&mut state, &action);
            }
        }
        state.version = Version::new(events.len() as u64);
        state
    }

    /// The most recent payment for a booking, if any.
    #[must_use]
    pub fn latest_for_booking(&self, booking_id: &BookingId) -> Option<&Payment> {
        self.payments
            .values()
            .filter(|p| p.booking_id == *booking_id)
            .max_by_key(|p| p.initiated_at)
    }
}

// ============================================================================
// Environment
// ============================================================================

/// Environment dependencies for the payment coordinator.
#[derive(Clone)]
pub struct PaymentEnvironment {
    /// Clock for timestamps
    pub clock: Arc<dyn Clock>,
    /// Event store for persistence
    pub event_store: Arc<dyn EventStore>,
    /// Event bus for publishing
    pub event_bus: Arc<dyn EventBus>,
    /// Stream this coordinator appends to
    pub stream_id: StreamId,
    /// External payment gateway
    pub gateway: Arc<dyn PaymentGateway>,
    /// How long to wait for a gateway callback before releasing the booking
    pub callback_timeout: Duration,
}

impl PaymentEnvironment {
    /// Creates a new `PaymentEnvironment`.
    #[must_use]
    pub fn new(
        clock: Arc<dyn Clock>,
        event_store: Arc<dyn EventStore>,
        event_bus: Arc<dyn EventBus>,
        gateway: Arc<dyn PaymentGateway>,
        callback_timeout: Duration,
    ) -> Self {
        Self {
            clock,
            event_store,
            event_bus,
            stream_id: StreamId::new(PAYMENT_STREAM),
            gateway,
            callback_timeout,
        }
    }
}

// ============================================================================
// Reducer
// ============================================================================

/// Reducer for the payment coordinator.
#[derive(Clone, Debug, Default)]
pub struct PaymentReducer;

impl PaymentReducer {
    /// Creates a new `PaymentReducer`.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// External reference sent to the gateway: `{booking_id}_{8 hex}`.
    fn merchant_oid(booking_id: &BookingId) -> String {
        let suffix = uuid::Uuid::new_v4().simple().to_string();
        format!("{booking_id}_{}", &suffix[..8])
    }

    /// Serialize an event action for persistence/publishing.
    fn serialize(action: &PaymentAction) -> Option<SerializedEvent> {
        let data = bincode::serialize(action).ok()?;
        Some(SerializedEvent::new(
            action.event_type().to_string(),
            data,
            Some(serde_json::json!({ "aggregate": "payment" })),
        ))
    }

    /// Broadcast-only feedback (never persisted).
    fn notify(action: PaymentAction) -> Effect<PaymentAction> {
        Effect::Future(Box::pin(async move { Some(action) }))
    }

    /// Append one event unconditionally and route it through `Committed`.
    ///
    /// The coordinator's invariants are per-payment (terminal-state checks
    /// in the reducer), so appends don't carry an expected version - two
    /// coordinator events never contend for the same business fact the way
    /// two bookings contend for a slot.
    fn commit(
        env: &PaymentEnvironment,
        event: PaymentAction,
    ) -> SmallVec<[Effect<PaymentAction>; 4]> {
        let Some(serialized) = Self::serialize(&event) else {
            return SmallVec::new();
        };
        smallvec![append_events! {
            store: env.event_store,
            stream: env.stream_id.as_str(),
            expected_version: None,
            events: vec![serialized],
            on_success: |version| Some(PaymentAction::Committed {
                event: Box::new(event),
                version,
            }),
            on_error: |error| {
                tracing::error!(error = %error, "Failed to persist payment event");
                None
            }
        }]
    }

    /// Applies an event to state.
    pub(crate) fn apply_event(state: &mut PaymentState, action: &PaymentAction) {
        match action {
            PaymentAction::PaymentInitiated { payment } => {
                state
                    .by_merchant_oid
                    .insert(payment.merchant_oid.clone(), payment.id);
                state.payments.insert(payment.id, payment.clone());
                state.last_error = None;
            }

            PaymentAction::CheckoutReady {
                payment_id,
                payment_url,
                ..
            } => {
                if let Some(payment) = state.payments.get_mut(payment_id) {
                    payment.payment_url = Some(payment_url.clone());
                }
            }

            PaymentAction::CheckoutFailed {
                payment_id, reason, ..
            }
            | PaymentAction::PaymentFailed {
                payment_id, reason, ..
            } => {
                if let Some(payment) = state.payments.get_mut(payment_id) {
                    payment.status = PaymentStatus::Failed {
                        reason: reason.clone(),
                    };
                }
            }

            PaymentAction::PaymentSucceeded { payment_id, .. } => {
                if let Some(payment) = state.payments.get_mut(payment_id) {
                    payment.status = PaymentStatus::Succeeded;
                }
            }

            PaymentAction::PaymentTimedOut { payment_id, .. } => {
                if let Some(payment) = state.payments.get_mut(payment_id) {
                    payment.status = PaymentStatus::Failed {
                        reason: "no gateway callback within the timeout window".to_string(),
                    };
                }
            }

            PaymentAction::RefundRequested { payment_id, .. } => {
                if let Some(payment) = state.payments.get_mut(payment_id) {
                    payment.status = PaymentStatus::RefundPending;
                }
            }

            PaymentAction::PaymentRefunded { payment_id, .. } => {
                if let Some(payment) = state.payments.get_mut(payment_id) {
                    payment.status = PaymentStatus::Refunded;
                }
            }

            PaymentAction::CallbackReplayed { merchant_oid } => {
                tracing::debug!(merchant_oid = %merchant_oid, "Duplicate callback absorbed");
            }

            PaymentAction::CallbackUnmatched { merchant_oid } => {
                state.last_error = Some(format!("unmatched callback: {merchant_oid}"));
            }

            // Commands and plumbing don't modify state here
            _ => {}
        }
    }
}

impl Reducer for PaymentReducer {
    type State = PaymentState;
    type Action = PaymentAction;
    type Environment = PaymentEnvironment;

    #[allow(clippy::too_many_lines)] // One arm per command
    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        match action {
            // ========== Initiate checkout ==========
            PaymentAction::InitiatePayment {
                payment_id,
                booking_id,
                user_id: _,
                amount,
            } => {
                // One live payment per booking: reuse an open checkout
                // instead of creating a second charge path.
                if let Some(existing) = state.latest_for_booking(&booking_id) {
                    if existing.status == PaymentStatus::Initiated {
                        let ready = PaymentAction::CheckoutReady {
                            payment_id: existing.id,
                            booking_id,
                            payment_url: existing.payment_url.clone().unwrap_or_default(),
                        };
                        return smallvec![Self::notify(ready)];
                    }
                }

                let merchant_oid = Self::merchant_oid(&booking_id);
                let payment = Payment {
                    id: payment_id,
                    booking_id,
                    merchant_oid: merchant_oid.clone(),
                    status: PaymentStatus::Initiated,
                    amount,
                    payment_url: None,
                    initiated_at: env.clock.now(),
                };

                let gateway = Arc::clone(&env.gateway);
                let checkout = Effect::Future(Box::pin(async move {
                    match gateway.create_checkout(&merchant_oid, amount).await {
                        Ok(checkout) => Some(PaymentAction::CheckoutReady {
                            payment_id,
                            booking_id,
                            payment_url: checkout.payment_url,
                        }),
                        Err(error) => Some(PaymentAction::CheckoutFailed {
                            payment_id,
                            booking_id,
                            reason: error.to_string(),
                        }),
                    }
                }));

                // The checkout call runs only after the initiation commit
                // has applied, so its feedback always finds the payment.
                let mut commit_effects = Self::commit(env, PaymentAction::PaymentInitiated { payment });
                let initiate_then_checkout = match commit_effects.pop() {
                    Some(append) => Effect::Sequential(vec![append, checkout]),
                    None => checkout,
                };

                smallvec![
                    initiate_then_checkout,
                    delay! {
                        duration: env.callback_timeout,
                        action: PaymentAction::ExpirePayment { payment_id }
                    }
                ]
            }

            // ========== Gateway callback (idempotent) ==========
            PaymentAction::HandleCallback {
                merchant_oid,
                outcome,
            } => {
                let Some(payment_id) = state.by_merchant_oid.get(&merchant_oid).copied() else {
                    // Unknown reference: acknowledged to the gateway but
                    // surfaced nowhere else.
                    tracing::warn!(merchant_oid = %merchant_oid, "Callback for unknown payment");
                    return smallvec![Self::notify(PaymentAction::CallbackUnmatched {
                        merchant_oid,
                    })];
                };

                let Some(payment) = state.payments.get(&payment_id) else {
                    return SmallVec::new();
                };

                // Replay short-circuit: the same outcome twice (or a late
                // callback after the timeout) produces no second transition.
                if payment.status.is_terminal() {
                    metrics::counter!("payments.callback.replayed").increment(1);
                    return smallvec![Self::notify(PaymentAction::CallbackReplayed {
                        merchant_oid,
                    })];
                }

                let event = match outcome {
                    CallbackOutcome::Success => PaymentAction::PaymentSucceeded {
                        payment_id,
                        booking_id: payment.booking_id,
                        merchant_oid,
                        amount: payment.amount,
                        succeeded_at: env.clock.now(),
                    },
                    CallbackOutcome::Failed => PaymentAction::PaymentFailed {
                        payment_id,
                        booking_id: payment.booking_id,
                        merchant_oid,
                        reason: "gateway reported failure".to_string(),
                    },
                };

                Self::commit(env, event)
            }

            // ========== Callback-window expiry ==========
            PaymentAction::ExpirePayment { payment_id } => {
                let Some(payment) = state.payments.get(&payment_id) else {
                    return SmallVec::new();
                };

                // A callback that won the race already moved the payment
                // out of `initiated`; the expiry is then a no-op.
                if payment.status.is_terminal() {
                    return SmallVec::new();
                }

                metrics::counter!("payments.timeout").increment(1);
                tracing::info!(
                    payment_id = %payment_id,
                    booking_id = %payment.booking_id,
                    "Payment callback window elapsed; releasing the booking"
                );

                Self::commit(
                    env,
                    PaymentAction::PaymentTimedOut {
                        payment_id,
                        booking_id: payment.booking_id,
                    },
                )
            }

            // ========== Asynchronous refund ==========
            PaymentAction::RequestRefund { booking_id, amount } => {
                if amount.is_zero() {
                    return SmallVec::new();
                }

                let Some(payment) = state.latest_for_booking(&booking_id) else {
                    tracing::warn!(booking_id = %booking_id, "Refund requested with no payment on file");
                    return SmallVec::new();
                };

                if payment.status != PaymentStatus::Succeeded {
                    // Nothing was captured; nothing to refund.
                    return SmallVec::new();
                }

                let payment_id = payment.id;
                let merchant_oid = payment.merchant_oid.clone();
                let gateway = Arc::clone(&env.gateway);

                let refund_call = Effect::Future(Box::pin(async move {
                    match gateway.refund(&merchant_oid, amount).await {
                        Ok(reference) => Some(PaymentAction::PaymentRefunded {
                            payment_id,
                            refund_reference: reference,
                        }),
                        Err(error) => {
                            // The refund stays pending; operators retry via
                            // the gateway's own tooling.
                            tracing::error!(
                                payment_id = %payment_id,
                                error = %error,
                                "Refund request failed"
                            );
                            None
                        }
                    }
                }));

                let mut effects = Self::commit(
                    env,
                    PaymentAction::RefundRequested {
                        payment_id,
                        amount,
                        requested_at: env.clock.now(),
                    },
                );
                effects.push(refund_call);
                effects
            }

            // ========== Gateway feedback needing persistence ==========
            PaymentAction::CheckoutReady {
                payment_id,
                booking_id,
                payment_url,
            } => {
                // First arrival is persisted; the reuse notification for an
                // already-recorded checkout is not re-committed.
                let needs_persist = state
                    .payments
                    .get(&payment_id)
                    .is_some_and(|p| p.payment_url.is_none());
                if needs_persist {
                    Self::commit(
                        env,
                        PaymentAction::CheckoutReady {
                            payment_id,
                            booking_id,
                            payment_url,
                        },
                    )
                } else {
                    SmallVec::new()
                }
            }

            PaymentAction::CheckoutFailed {
                payment_id,
                booking_id,
                reason,
            } => {
                // Persist and publish so the ledger releases the hold
                let open = state
                    .payments
                    .get(&payment_id)
                    .is_some_and(|p| !p.status.is_terminal());
                if open {
                    Self::commit(
                        env,
                        PaymentAction::CheckoutFailed {
                            payment_id,
                            booking_id,
                            reason,
                        },
                    )
                } else {
                    SmallVec::new()
                }
            }

            PaymentAction::PaymentRefunded {
                payment_id,
                refund_reference,
            } => {
                // Persist the gateway acknowledgement once. The gateway may
                // answer before RefundRequested's own commit applies, so a
                // still-Succeeded status is accepted too.
                let pending = state.payments.get(&payment_id).is_some_and(|p| {
                    matches!(
                        p.status,
                        PaymentStatus::Succeeded | PaymentStatus::RefundPending
                    )
                });
                if pending {
                    Self::commit(
                        env,
                        PaymentAction::PaymentRefunded {
                            payment_id,
                            refund_reference,
                        },
                    )
                } else {
                    SmallVec::new()
                }
            }

            // ========== Commit plumbing ==========
            PaymentAction::Committed { event, version } => {
                Self::apply_event(state, &event);
                state.version = version;

                match Self::serialize(&event) {
                    Some(serialized) => smallvec![publish_event! {
                        bus: env.event_bus,
                        topic: PAYMENT_TOPIC,
                        event: serialized,
                        on_success: || None,
                        on_error: |error| {
                            tracing::warn!(error = %error, "Failed to publish payment event");
                            None
                        }
                    }],
                    None => SmallVec::new(),
                }
            }

            // ========== Events (replay or broadcast feedback) ==========
            event => {
                Self::apply_event(state, &event);
                SmallVec::new()
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::payment_gateway::MockPaymentGateway;
    use sahabul_core::event_bus::BroadcastEventBus;
    use sahabul_testing::{InMemoryEventStore, ReducerTest, assertions, mocks::test_clock};

    fn test_env() -> PaymentEnvironment {
        PaymentEnvironment::new(
            Arc::new(test_clock()),
            Arc::new(InMemoryEventStore::new()),
            Arc::new(BroadcastEventBus::new()),
            MockPaymentGateway::shared(),
            Duration::from_secs(15 * 60),
        )
    }

    fn initiated_payment(amount: Money) -> Payment {
        let booking_id = BookingId::new();
        Payment {
            id: PaymentId::new(),
            booking_id,
            merchant_oid: format!("{booking_id}_deadbeef"),
            status: PaymentStatus::Initiated,
            amount,
            payment_url: None,
            initiated_at: Utc::now(),
        }
    }

    fn state_with(payment: &Payment) -> PaymentState {
        let mut state = PaymentState::new();
        PaymentReducer::apply_event(
            &mut state,
            &PaymentAction::PaymentInitiated {
                payment: payment.clone(),
            },
        );
        state
    }

    #[test]
    fn merchant_oid_embeds_booking_id() {
        let booking_id = BookingId::new();
        let oid = PaymentReducer::merchant_oid(&booking_id);
        assert!(oid.starts_with(&booking_id.to_string()));
        assert_eq!(oid.len(), booking_id.to_string().len() + 1 + 8);
    }

    #[test]
    fn initiate_schedules_checkout_and_expiry() {
        ReducerTest::new(PaymentReducer::new())
            .with_env(test_env())
            .given_state(PaymentState::new())
            .when_action(PaymentAction::InitiatePayment {
                payment_id: PaymentId::new(),
                booking_id: BookingId::new(),
                user_id: UserId::new(),
                amount: Money::from_lira(350),
            })
            .then_state(|state| {
                // Applies on commit, not synchronously
                assert!(state.payments.is_empty());
            })
            .then_effects(|effects| {
                assertions::assert_effects_count(effects, 2);
                // Persist-then-checkout chain, plus the expiry timer
                assert!(matches!(effects[0], Effect::Sequential(_)));
                assertions::assert_has_delay_effect(effects);
            })
            .run();
    }

    #[test]
    fn success_callback_commits_succeeded_event() {
        let payment = initiated_payment(Money::from_lira(350));
        let state = state_with(&payment);

        ReducerTest::new(PaymentReducer::new())
            .with_env(test_env())
            .given_state(state)
            .when_action(PaymentAction::HandleCallback {
                merchant_oid: payment.merchant_oid.clone(),
                outcome: CallbackOutcome::Success,
            })
            .then_effects(assertions::assert_has_event_store_effect)
            .run();
    }

    #[test]
    fn replayed_callback_is_absorbed() {
        let mut payment = initiated_payment(Money::from_lira(350));
        payment.status = PaymentStatus::Succeeded;
        let mut state = state_with(&payment);
        state.payments.get_mut(&payment.id).unwrap().status = PaymentStatus::Succeeded;

        ReducerTest::new(PaymentReducer::new())
            .with_env(test_env())
            .given_state(state)
            .when_action(PaymentAction::HandleCallback {
                merchant_oid: payment.merchant_oid.clone(),
                outcome: CallbackOutcome::Success,
            })
            .then_effects(|effects| {
                // Only the broadcast notification, no persistence
                assertions::assert_effects_count(effects, 1);
                assertions::assert_has_future_effect(effects);
            })
            .run();
    }

    #[test]
    fn unknown_merchant_oid_is_acknowledged_without_state_change() {
        ReducerTest::new(PaymentReducer::new())
            .with_env(test_env())
            .given_state(PaymentState::new())
            .when_action(PaymentAction::HandleCallback {
                merchant_oid: "nothing_here".to_string(),
                outcome: CallbackOutcome::Success,
            })
            .then_state(|state| {
                assert!(state.payments.is_empty());
            })
            .then_effects(assertions::assert_has_future_effect)
            .run();
    }

    #[test]
    fn expiry_after_terminal_outcome_is_a_no_op() {
        let mut payment = initiated_payment(Money::from_lira(350));
        payment.status = PaymentStatus::Succeeded;
        let mut state = state_with(&payment);
        state.payments.get_mut(&payment.id).unwrap().status = PaymentStatus::Succeeded;

        ReducerTest::new(PaymentReducer::new())
            .with_env(test_env())
            .given_state(state)
            .when_action(PaymentAction::ExpirePayment {
                payment_id: payment.id,
            })
            .then_effects(assertions::assert_no_effects)
            .run();
    }

    #[test]
    fn expiry_of_initiated_payment_commits_timeout() {
        let payment = initiated_payment(Money::from_lira(350));
        let state = state_with(&payment);

        ReducerTest::new(PaymentReducer::new())
            .with_env(test_env())
            .given_state(state)
            .when_action(PaymentAction::ExpirePayment {
                payment_id: payment.id,
            })
            .then_effects(assertions::assert_has_event_store_effect)
            .run();
    }

    #[test]
    fn refund_requires_a_captured_payment() {
        let payment = initiated_payment(Money::from_lira(350));
        let booking_id = payment.booking_id;
        let state = state_with(&payment);

        ReducerTest::new(PaymentReducer::new())
            .with_env(test_env())
            .given_state(state)
            .when_action(PaymentAction::RequestRefund {
                booking_id,
                amount: Money::from_lira(350),
            })
            .then_effects(assertions::assert_no_effects)
            .run();
    }

    #[test]
    fn refund_of_captured_payment_requests_gateway_refund() {
        let mut payment = initiated_payment(Money::from_lira(350));
        payment.status = PaymentStatus::Succeeded;
        let booking_id = payment.booking_id;
        let mut state = state_with(&payment);
        state.payments.get_mut(&payment.id).unwrap().status = PaymentStatus::Succeeded;

        ReducerTest::new(PaymentReducer::new())
            .with_env(test_env())
            .given_state(state)
            .when_action(PaymentAction::RequestRefund {
                booking_id,
                amount: Money::from_lira(350),
            })
            .then_effects(|effects| {
                assertions::assert_effects_count(effects, 2);
                assertions::assert_has_event_store_effect(effects);
                assertions::assert_has_future_effect(effects);
            })
            .run();
    }

    #[test]
    fn zero_refund_is_skipped() {
        ReducerTest::new(PaymentReducer::new())
            .with_env(test_env())
            .given_state(PaymentState::new())
            .when_action(PaymentAction::RequestRefund {
                booking_id: BookingId::new(),
                amount: Money::ZERO,
            })
            .then_effects(assertions::assert_no_effects)
            .run();
    }

    #[test]
    fn committed_event_applies_and_publishes() {
        let payment = initiated_payment(Money::from_lira(350));
        let payment_id = payment.id;

        ReducerTest::new(PaymentReducer::new())
            .with_env(test_env())
            .given_state(PaymentState::new())
            .when_action(PaymentAction::Committed {
                event: Box::new(PaymentAction::PaymentInitiated { payment }),
                version: Version::new(1),
            })
            .then_state(move |state| {
                assert!(state.payments.contains_key(&payment_id));
                assert_eq!(state.version, Version::new(1));
            })
            .then_effects(assertions::assert_has_publish_event_effect)
            .run();
    }
}
