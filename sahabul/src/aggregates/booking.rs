//! Booking ledger aggregate.
//!
//! Owns bookings, slot occupancy, charge breakdowns, and loyalty crowns.
//! This aggregate is CRITICAL for preventing double-booking: the
//! check-and-reserve step runs inside the reducer (serialized per store)
//! and becomes durable through an event-store append that carries the
//! ledger's expected stream version - an atomic compare-and-swap against
//! the backing store. A concurrent writer loses the append with a
//! concurrency conflict, re-validates against refreshed state, and the
//! caller observes `SlotConflict` if the slot is genuinely taken.
//!
//! Pricing lives here and only here; API handlers return the ledger's
//! breakdown verbatim.

use crate::types::{
    Booking, BookingId, BookingStatus, ChargeBreakdown, FieldId, Money, OperatingHours, Principal,
    SlotKey, UserId,
};
use chrono::{DateTime, NaiveDate, Utc};
use sahabul_core::environment::Clock;
use sahabul_core::event::SerializedEvent;
use sahabul_core::event_bus::EventBus;
use sahabul_core::event_store::{EventStore, EventStoreError};
use sahabul_core::stream::{StreamId, Version};
use sahabul_core::{SmallVec, append_events, effect::Effect, publish_event, reducer::Reducer, smallvec};
use sahabul_macros::Action;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Stream the ledger appends to.
pub const BOOKING_STREAM: &str = "bookings";

/// Topic the ledger publishes committed events on.
pub const BOOKING_TOPIC: &str = "booking-events";

/// Upper bound on append retries after version conflicts. Generous: under
/// N-way contention each commit round resolves at least one writer, so a
/// loser may need up to N-1 rounds before its re-validation settles.
const MAX_APPEND_ATTEMPTS: u32 = 16;

/// Base pause between append retries, letting the winning event apply
/// first. Grows linearly with the attempt number.
const RETRY_DELAY: Duration = Duration::from_millis(25);

// ============================================================================
// Rejections
// ============================================================================

/// Why a ledger command was rejected. User-facing taxonomy per the error
/// design: conflicts are retryable by picking another slot, window
/// violations are not.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum RejectReason {
    /// Another booking holds the requested slot(s)
    #[error("slot is already booked")]
    SlotConflict,
    /// Cancellation attempted 72 hours or less before the slot start
    #[error("cannot cancel this close to the match; the cancellation window has expired")]
    CancellationWindowExpired,
    /// The field has not been approved for public booking
    #[error("field is not approved")]
    FieldNotApproved,
    /// The slot's start time has already passed
    #[error("slot is in the past")]
    PastSlot,
    /// The slot lies outside the field's operating hours
    #[error("slot is outside operating hours")]
    OutsideOperatingHours,
    /// No booking with the given id
    #[error("booking not found")]
    BookingNotFound,
    /// Only the booking user (or an admin) may cancel
    #[error("not authorized to cancel this booking")]
    NotBookingOwner,
    /// A booking with this id already exists
    #[error("booking already exists")]
    DuplicateBooking,
    /// The booking is not in a status that allows this transition
    #[error("booking status does not allow this operation")]
    InvalidTransition,
    /// Persistence failed for a non-conflict reason
    #[error("booking could not be persisted")]
    PersistenceFailed,
}

/// Why a booking was cancelled.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CancelReason {
    /// Explicit user cancellation (refund owed)
    User,
    /// The gateway reported a failed payment
    PaymentFailed,
    /// No gateway callback arrived within the timeout window
    PaymentTimeout,
}

/// Gateway outcome relayed from the payment coordinator.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentOutcome {
    /// Payment captured
    Succeeded,
    /// Payment failed at the gateway
    Failed {
        /// Gateway failure reason
        reason: String,
    },
    /// The callback window elapsed with no outcome
    TimedOut,
}

// ============================================================================
// Field terms
//============================================================================

/// Immutable snapshot of the field data a booking is priced against.
///
/// Resolved by the API layer from the field registry and validated here -
/// the approval gate and all pricing rules execute inside the ledger.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldTerms {
    /// The field being booked
    pub field_id: FieldId,
    /// Whether an admin approved the field
    pub approved: bool,
    /// Hourly base price
    pub base_price_per_hour: Money,
    /// Optional package price for 4 weekly matches (falls back to 4x base)
    pub subscription_price_4_match: Option<Money>,
}

// ============================================================================
// Rules
// ============================================================================

/// Business-rule knobs injected from configuration.
#[derive(Clone, Debug)]
pub struct LedgerRules {
    /// Fixed per-match platform fee
    pub platform_fee: Money,
    /// Cancellation cut-off before slot start
    pub cancellation_window: chrono::Duration,
    /// Crown balance required for the subscription discount
    pub loyalty_threshold: u32,
    /// Discount as a percentage of one match's base price
    pub loyalty_discount_percent: u32,
    /// Bookable hours per day
    pub operating_hours: OperatingHours,
}

impl Default for LedgerRules {
    fn default() -> Self {
        Self {
            platform_fee: Money::from_lira(50),
            cancellation_window: chrono::Duration::hours(72),
            loyalty_threshold: 5,
            loyalty_discount_percent: 10,
            operating_hours: OperatingHours::default(),
        }
    }
}

/// Compute the charge breakdown for a booking.
///
/// Single booking: `total = base + platform_fee`, owner takes the base.
/// Subscription: four matches billed as one unit; the loyalty discount
/// (when the user's crown balance meets the threshold) is a percentage of
/// one match's base price and is absorbed by the platform - the owner
/// share never shrinks.
#[must_use]
pub fn charge_breakdown(
    rules: &LedgerRules,
    terms: &FieldTerms,
    is_subscription: bool,
    crowns: u32,
) -> ChargeBreakdown {
    let base = terms.base_price_per_hour;

    if !is_subscription {
        return ChargeBreakdown {
            total: base.add(rules.platform_fee),
            platform_fee: rules.platform_fee,
            owner_share: base,
            loyalty_discount: Money::ZERO,
        };
    }

    let owner_share = terms
        .subscription_price_4_match
        .unwrap_or_else(|| base.multiply(4));
    let fees = rules.platform_fee.multiply(4);
    let loyalty_discount = if crowns >= rules.loyalty_threshold {
        base.percent(rules.loyalty_discount_percent)
    } else {
        Money::ZERO
    };

    ChargeBreakdown {
        total: owner_share.add(fees).saturating_sub(loyalty_discount),
        platform_fee: fees,
        owner_share,
        loyalty_discount,
    }
}

// ============================================================================
// Actions (Commands + Events)
// ============================================================================

/// Actions for the booking ledger.
#[derive(Action, Clone, Debug, Serialize, Deserialize)]
pub enum LedgerAction {
    // Commands
    /// Create a booking (single slot, or 4 weekly slots atomically)
    #[command]
    CreateBooking {
        /// Pre-generated booking id (correlation for the caller)
        booking_id: BookingId,
        /// The booking user
        user_id: UserId,
        /// Field snapshot resolved by the API layer
        terms: FieldTerms,
        /// Match date
        date: NaiveDate,
        /// Slot start hour
        hour: u8,
        /// Whether to reserve 4 weekly occurrences
        is_subscription: bool,
    },

    /// Retry a create whose append lost a version race
    #[command]
    RetryCreate {
        /// The booking that failed to persist
        booking: Booking,
        /// Retry attempt number
        attempt: u32,
    },

    /// Cancel a booking (72-hour rule)
    #[command]
    CancelBooking {
        /// Booking to cancel
        booking_id: BookingId,
        /// Acting principal (owner-or-admin check)
        principal: Principal,
        /// Append retry attempt
        attempt: u32,
    },

    /// Record a payment outcome relayed from the payment coordinator
    #[command]
    RecordPaymentOutcome {
        /// The booking the payment was for
        booking_id: BookingId,
        /// Gateway outcome
        outcome: PaymentOutcome,
        /// Append retry attempt
        attempt: u32,
    },

    /// Sweep: complete bookings whose slots have fully elapsed
    #[command]
    SweepCompleted {
        /// Append retry attempt
        attempt: u32,
    },

    // Events
    /// A booking was created in `pending`, holding its slots
    #[event]
    BookingCreated {
        /// The full booking record incl. charge breakdown and held slots
        booking: Booking,
    },

    /// Payment accepted; the hold is finalized
    #[event]
    BookingConfirmed {
        /// The confirmed booking
        booking_id: BookingId,
    },

    /// Payment captured; a loyalty crown is awarded
    #[event]
    BookingPaid {
        /// The paid booking
        booking_id: BookingId,
        /// The paying user (crown recipient)
        user_id: UserId,
        /// Capture time
        paid_at: DateTime<Utc>,
    },

    /// Booking cancelled; slots released
    #[event]
    BookingCancelled {
        /// The cancelled booking
        booking_id: BookingId,
        /// Why it was cancelled
        reason: CancelReason,
        /// Refund owed to the user (zero when nothing was captured)
        refund: Money,
        /// Cancellation time
        cancelled_at: DateTime<Utc>,
    },

    /// Booking completed after its slots elapsed
    #[event]
    BookingCompleted {
        /// The completed booking
        booking_id: BookingId,
        /// Sweep time
        completed_at: DateTime<Utc>,
    },

    /// A command was rejected (broadcast to the waiting caller, never
    /// persisted)
    #[event]
    BookingRejected {
        /// The booking the command addressed
        booking_id: BookingId,
        /// Why it was rejected
        reason: RejectReason,
    },

    /// An append was accepted by the event store: apply the event, bump
    /// the version, publish to the bus
    Committed {
        /// The persisted event
        event: Box<LedgerAction>,
        /// New stream version
        version: Version,
    },

    /// Like [`LedgerAction::Committed`] for a multi-event append
    CommittedBatch {
        /// The persisted events, in order
        events: Vec<LedgerAction>,
        /// New stream version
        version: Version,
    },

    /// Pause before re-reducing a conflicted command, so the winning
    /// append's feedback lands in state first
    Backoff {
        /// The command to re-dispatch after the pause
        resume: Box<LedgerAction>,
        /// Retry attempt, scales the pause
        attempt: u32,
    },
}

// ============================================================================
// State
// ============================================================================

/// Who holds a slot and how.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotHold {
    /// The holding booking
    pub booking_id: BookingId,
    /// Whether the hold belongs to a subscription pattern
    pub is_subscription: bool,
}

/// Ledger state: bookings, slot occupancy, crown balances.
#[derive(Clone, Debug, Default)]
pub struct LedgerState {
    /// All bookings by id
    pub bookings: HashMap<BookingId, Booking>,
    /// Slot occupancy for bookings that currently hold slots
    pub occupancy: HashMap<SlotKey, SlotHold>,
    /// "Altın Taç" crown balance per user
    pub crowns: HashMap<UserId, u32>,
    /// Persisted stream version (compare-and-swap token)
    pub version: Version,
    /// Last rejection, for diagnostics
    pub last_error: Option<String>,
}

impl LedgerState {
    /// Empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self {
            bookings: HashMap::new(),
            occupancy: HashMap::new(),
            crowns: HashMap::new(),
            version: Version::INITIAL,
            last_error: None,
        }
    }

    /// Rebuild state by replaying persisted events.
    #[must_use]
    pub fn rehydrate(events: &[SerializedEvent]) -> Self {
        let mut state = Self::new();
        for serialized in events {
            if let Ok(action) = serialized.decode::<LedgerAction>() {
                LedgerReducer::apply_event(&mut state, &action);
            }
        }
        state.version = Version::new(events.len() as u64);
        state
    }

    /// Crown balance for a user.
    #[must_use]
    pub fn crowns_of(&self, user_id: &UserId) -> u32 {
        self.crowns.get(user_id).copied().unwrap_or(0)
    }

    /// All bookings made by a user, newest first.
    #[must_use]
    pub fn bookings_for_user(&self, user_id: &UserId) -> Vec<Booking> {
        let mut bookings: Vec<Booking> = self
            .bookings
            .values()
            .filter(|b| b.user_id == *user_id)
            .cloned()
            .collect();
        bookings.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        bookings
    }

    /// All bookings on any of the given fields, newest first (owner view).
    #[must_use]
    pub fn bookings_for_fields(&self, field_ids: &[FieldId]) -> Vec<Booking> {
        let mut bookings: Vec<Booking> = self
            .bookings
            .values()
            .filter(|b| field_ids.contains(&b.field_id))
            .cloned()
            .collect();
        bookings.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        bookings
    }

    /// Whether a user has a completed booking on a field (review gate).
    #[must_use]
    pub fn has_completed_booking(&self, user_id: &UserId, field_id: &FieldId) -> bool {
        self.bookings.values().any(|b| {
            b.user_id == *user_id
                && b.field_id == *field_id
                && b.status == BookingStatus::Completed
        })
    }
}

// ============================================================================
// Environment
// ============================================================================

/// Environment dependencies for the booking ledger.
#[derive(Clone)]
pub struct LedgerEnvironment {
    /// Clock for timestamps and window checks
    pub clock: Arc<dyn Clock>,
    /// Event store for persistence
    pub event_store: Arc<dyn EventStore>,
    /// Event bus for publishing committed events
    pub event_bus: Arc<dyn EventBus>,
    /// Stream this ledger appends to
    pub stream_id: StreamId,
    /// Business rules
    pub rules: LedgerRules,
}

impl LedgerEnvironment {
    /// Creates a new `LedgerEnvironment`.
    #[must_use]
    pub fn new(
        clock: Arc<dyn Clock>,
        event_store: Arc<dyn EventStore>,
        event_bus: Arc<dyn EventBus>,
        rules: LedgerRules,
    ) -> Self {
        Self {
            clock,
            event_store,
            event_bus,
            stream_id: StreamId::new(BOOKING_STREAM),
            rules,
        }
    }
}

// ============================================================================
// Reducer
// ============================================================================

/// Reducer for the booking ledger.
#[derive(Clone, Debug, Default)]
pub struct LedgerReducer;

impl LedgerReducer {
    /// Creates a new `LedgerReducer`.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// The slots a booking occupies: one, or four weekly occurrences.
    fn target_slots(field_id: FieldId, date: NaiveDate, hour: u8, is_subscription: bool) -> Vec<SlotKey> {
        let first = SlotKey::new(field_id, date, hour);
        if is_subscription {
            (0..4).map(|week| first.weeks_later(week)).collect()
        } else {
            vec![first]
        }
    }

    /// Validate a create command. The slot check here is the in-process
    /// half of check-and-reserve; the append's expected version is the
    /// durable half.
    fn validate_create(
        state: &LedgerState,
        env: &LedgerEnvironment,
        booking_id: &BookingId,
        terms: &FieldTerms,
        slots: &[SlotKey],
        hour: u8,
    ) -> Result<(), RejectReason> {
        if state.bookings.contains_key(booking_id) {
            return Err(RejectReason::DuplicateBooking);
        }

        if !terms.approved {
            return Err(RejectReason::FieldNotApproved);
        }

        if !env.rules.operating_hours.contains(hour) {
            return Err(RejectReason::OutsideOperatingHours);
        }

        let now = env.clock.now();
        if slots.first().is_some_and(|slot| slot.start_at() < now) {
            return Err(RejectReason::PastSlot);
        }

        // All four weekly occurrences must be free, or none is taken
        if slots.iter().any(|slot| state.occupancy.contains_key(slot)) {
            return Err(RejectReason::SlotConflict);
        }

        Ok(())
    }

    /// Serialize an event action for persistence/publishing.
    fn serialize(action: &LedgerAction) -> Option<SerializedEvent> {
        let data = bincode::serialize(action).ok()?;
        Some(SerializedEvent::new(
            action.event_type().to_string(),
            data,
            Some(serde_json::json!({ "aggregate": "booking" })),
        ))
    }

    /// Broadcast-only feedback (never persisted).
    fn notify(action: LedgerAction) -> Effect<LedgerAction> {
        Effect::Future(Box::pin(async move { Some(action) }))
    }

    /// Reject a command: record nothing, notify the waiting caller.
    fn reject(booking_id: BookingId, reason: RejectReason) -> SmallVec<[Effect<LedgerAction>; 4]> {
        smallvec![Self::notify(LedgerAction::BookingRejected { booking_id, reason })]
    }

    /// Append `events` at the ledger's current version. On success the
    /// events come back as `CommittedBatch`; on a version conflict the
    /// `on_conflict` command re-dispatches after a growing back-off (via
    /// [`LedgerAction::Backoff`]), re-validating against refreshed state;
    /// other errors surface as a rejection.
    fn commit(
        env: &LedgerEnvironment,
        state: &LedgerState,
        events: Vec<LedgerAction>,
        booking_id: BookingId,
        attempt: u32,
        on_conflict: LedgerAction,
    ) -> SmallVec<[Effect<LedgerAction>; 4]> {
        let serialized: Vec<SerializedEvent> =
            events.iter().filter_map(Self::serialize).collect();
        if serialized.len() != events.len() {
            return Self::reject(booking_id, RejectReason::PersistenceFailed);
        }

        let committed = events;
        smallvec![append_events! {
            store: env.event_store,
            stream: env.stream_id.as_str(),
            expected_version: Some(state.version),
            events: serialized,
            on_success: |version| Some(LedgerAction::CommittedBatch {
                events: committed,
                version,
            }),
            on_error: |error| Some(match error {
                EventStoreError::ConcurrencyConflict { .. } => LedgerAction::Backoff {
                    resume: Box::new(on_conflict),
                    attempt: attempt + 1,
                },
                _ => LedgerAction::BookingRejected {
                    booking_id,
                    reason: RejectReason::PersistenceFailed,
                },
            })
        }]
    }

    /// Applies an event to state.
    #[allow(clippy::too_many_lines)] // One arm per event
    pub(crate) fn apply_event(state: &mut LedgerState, action: &LedgerAction) {
        match action {
            LedgerAction::BookingCreated { booking } => {
                for slot in &booking.slots {
                    state.occupancy.insert(
                        *slot,
                        SlotHold {
                            booking_id: booking.id,
                            is_subscription: booking.is_subscription,
                        },
                    );
                }
                state.bookings.insert(booking.id, booking.clone());
                state.last_error = None;
            }

            LedgerAction::BookingConfirmed { booking_id } => {
                if let Some(booking) = state.bookings.get_mut(booking_id) {
                    booking.status = BookingStatus::Confirmed;
                }
                state.last_error = None;
            }

            LedgerAction::BookingPaid {
                booking_id,
                user_id,
                ..
            } => {
                if let Some(booking) = state.bookings.get_mut(booking_id) {
                    booking.status = BookingStatus::Paid;
                }
                // One crown per successfully paid booking
                *state.crowns.entry(*user_id).or_insert(0) += 1;
                state.last_error = None;
            }

            LedgerAction::BookingCancelled { booking_id, .. } => {
                if let Some(booking) = state.bookings.get_mut(booking_id) {
                    booking.status = BookingStatus::Cancelled;
                    let slots = booking.slots.clone();
                    for slot in slots {
                        state.occupancy.remove(&slot);
                    }
                }
                state.last_error = None;
            }

            LedgerAction::BookingCompleted { booking_id, .. } => {
                if let Some(booking) = state.bookings.get_mut(booking_id) {
                    booking.status = BookingStatus::Completed;
                    let slots = booking.slots.clone();
                    for slot in slots {
                        state.occupancy.remove(&slot);
                    }
                }
                state.last_error = None;
            }

            LedgerAction::BookingRejected { reason, .. } => {
                state.last_error = Some(reason.to_string());
            }

            // Commands and commit plumbing don't modify state here
            _ => {}
        }
    }
}

impl Reducer for LedgerReducer {
    type State = LedgerState;
    type Action = LedgerAction;
    type Environment = LedgerEnvironment;

    #[allow(clippy::too_many_lines)] // One arm per command
    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        match action {
            // ========== Create (check-and-reserve) ==========
            LedgerAction::CreateBooking {
                booking_id,
                user_id,
                terms,
                date,
                hour,
                is_subscription,
            } => {
                let slots = Self::target_slots(terms.field_id, date, hour, is_subscription);

                if let Err(reason) =
                    Self::validate_create(state, env, &booking_id, &terms, &slots, hour)
                {
                    Self::apply_event(
                        state,
                        &LedgerAction::BookingRejected { booking_id, reason: reason.clone() },
                    );
                    return Self::reject(booking_id, reason);
                }

                let charge =
                    charge_breakdown(&env.rules, &terms, is_subscription, state.crowns_of(&user_id));

                let booking = Booking {
                    id: booking_id,
                    user_id,
                    field_id: terms.field_id,
                    date,
                    start_hour: hour,
                    is_subscription,
                    status: BookingStatus::Pending,
                    charge,
                    slots,
                    created_at: env.clock.now(),
                };

                let event = LedgerAction::BookingCreated {
                    booking: booking.clone(),
                };
                Self::commit(
                    env,
                    state,
                    vec![event],
                    booking_id,
                    0,
                    LedgerAction::RetryCreate { booking, attempt: 1 },
                )
            }

            // ========== Create retry after a version race ==========
            LedgerAction::RetryCreate { booking, attempt } => {
                if attempt > MAX_APPEND_ATTEMPTS {
                    tracing::warn!(
                        booking_id = %booking.id,
                        attempt,
                        "Create retries exhausted under contention"
                    );
                    return Self::reject(booking.id, RejectReason::SlotConflict);
                }

                // Re-validate against refreshed state: if the race winner
                // took one of our slots, this is a genuine conflict.
                if booking.slots.iter().any(|slot| state.occupancy.contains_key(slot)) {
                    return Self::reject(booking.id, RejectReason::SlotConflict);
                }
                if state.bookings.contains_key(&booking.id) {
                    return Self::reject(booking.id, RejectReason::DuplicateBooking);
                }

                let booking_id = booking.id;
                let event = LedgerAction::BookingCreated {
                    booking: booking.clone(),
                };
                let retry = LedgerAction::RetryCreate {
                    booking,
                    attempt: attempt + 1,
                };

                Self::commit(env, state, vec![event], booking_id, attempt, retry)
            }

            // ========== Cancel (72-hour rule) ==========
            LedgerAction::CancelBooking {
                booking_id,
                principal,
                attempt,
            } => {
                if attempt > MAX_APPEND_ATTEMPTS {
                    return Self::reject(booking_id, RejectReason::PersistenceFailed);
                }

                let Some(booking) = state.bookings.get(&booking_id) else {
                    return Self::reject(booking_id, RejectReason::BookingNotFound);
                };

                if booking.user_id != principal.user_id && !principal.is_admin() {
                    return Self::reject(booking_id, RejectReason::NotBookingOwner);
                }

                if !booking.status.cancellable() {
                    return Self::reject(booking_id, RejectReason::InvalidTransition);
                }

                // Strictly more than the window before the slot start
                let remaining = booking.starts_at() - env.clock.now();
                if remaining <= env.rules.cancellation_window {
                    return Self::reject(booking_id, RejectReason::CancellationWindowExpired);
                }

                let event = LedgerAction::BookingCancelled {
                    booking_id,
                    reason: CancelReason::User,
                    refund: booking.charge.total,
                    cancelled_at: env.clock.now(),
                };
                Self::commit(
                    env,
                    state,
                    vec![event],
                    booking_id,
                    attempt,
                    LedgerAction::CancelBooking {
                        booking_id,
                        principal,
                        attempt: attempt + 1,
                    },
                )
            }

            // ========== Payment outcome (from the coordinator) ==========
            LedgerAction::RecordPaymentOutcome {
                booking_id,
                outcome,
                attempt,
            } => {
                if attempt > MAX_APPEND_ATTEMPTS {
                    tracing::error!(
                        booking_id = %booking_id,
                        "Payment outcome could not be recorded; left pending for the sweep"
                    );
                    return SmallVec::new();
                }

                let Some(booking) = state.bookings.get(&booking_id) else {
                    tracing::warn!(booking_id = %booking_id, "Payment outcome for unknown booking");
                    return SmallVec::new();
                };

                // A timeout racing an earlier success (or vice versa) loses
                // here: only pending bookings accept an outcome, the rest
                // is a no-op.
                if booking.status != BookingStatus::Pending {
                    tracing::debug!(
                        booking_id = %booking_id,
                        status = ?booking.status,
                        "Payment outcome absorbed; booking already transitioned"
                    );
                    return SmallVec::new();
                }

                let user_id = booking.user_id;
                let events = match &outcome {
                    PaymentOutcome::Succeeded => vec![
                        LedgerAction::BookingConfirmed { booking_id },
                        LedgerAction::BookingPaid {
                            booking_id,
                            user_id,
                            paid_at: env.clock.now(),
                        },
                    ],
                    PaymentOutcome::Failed { .. } => vec![LedgerAction::BookingCancelled {
                        booking_id,
                        reason: CancelReason::PaymentFailed,
                        refund: Money::ZERO,
                        cancelled_at: env.clock.now(),
                    }],
                    PaymentOutcome::TimedOut => vec![LedgerAction::BookingCancelled {
                        booking_id,
                        reason: CancelReason::PaymentTimeout,
                        refund: Money::ZERO,
                        cancelled_at: env.clock.now(),
                    }],
                };

                Self::commit(
                    env,
                    state,
                    events,
                    booking_id,
                    attempt,
                    LedgerAction::RecordPaymentOutcome {
                        booking_id,
                        outcome,
                        attempt: attempt + 1,
                    },
                )
            }

            // ========== Completion sweep ==========
            LedgerAction::SweepCompleted { attempt } => {
                if attempt > MAX_APPEND_ATTEMPTS {
                    return SmallVec::new(); // next sweep picks it up
                }

                let now = env.clock.now();
                let mut completions: Vec<LedgerAction> = state
                    .bookings
                    .values()
                    .filter(|b| {
                        matches!(b.status, BookingStatus::Confirmed | BookingStatus::Paid)
                            && b.last_slot_ends_at() <= now
                    })
                    .map(|b| LedgerAction::BookingCompleted {
                        booking_id: b.id,
                        completed_at: now,
                    })
                    .collect();

                if completions.is_empty() {
                    return SmallVec::new();
                }
                // Deterministic order for replay
                completions.sort_by_key(|a| match a {
                    LedgerAction::BookingCompleted { booking_id, .. } => *booking_id,
                    _ => BookingId::from_uuid(uuid::Uuid::nil()),
                });

                let sweep_marker = BookingId::from_uuid(uuid::Uuid::nil());
                Self::commit(
                    env,
                    state,
                    completions,
                    sweep_marker,
                    attempt,
                    LedgerAction::SweepCompleted { attempt: attempt + 1 },
                )
            }

            // ========== Commit plumbing ==========
            LedgerAction::Committed { event, version } => {
                Self::apply_event(state, &event);
                state.version = version;

                match Self::serialize(&event) {
                    Some(serialized) => smallvec![publish_event! {
                        bus: env.event_bus,
                        topic: BOOKING_TOPIC,
                        event: serialized,
                        on_success: || None,
                        on_error: |error| {
                            tracing::warn!(error = %error, "Failed to publish booking event");
                            None
                        }
                    }],
                    None => SmallVec::new(),
                }
            }

            // ========== Conflict back-off ==========
            LedgerAction::Backoff { resume, attempt } => {
                smallvec![Effect::Delay {
                    duration: RETRY_DELAY.saturating_mul(attempt),
                    action: resume,
                }]
            }

            LedgerAction::CommittedBatch { events, version } => {
                let mut effects: SmallVec<[Effect<LedgerAction>; 4]> = SmallVec::new();
                for event in &events {
                    Self::apply_event(state, event);
                    if let Some(serialized) = Self::serialize(event) {
                        effects.push(publish_event! {
                            bus: env.event_bus,
                            topic: BOOKING_TOPIC,
                            event: serialized,
                            on_success: || None,
                            on_error: |error| {
                                tracing::warn!(error = %error, "Failed to publish booking event");
                                None
                            }
                        });
                    }
                }
                state.version = version;
                effects
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
    use chrono::NaiveDate;
    use sahabul_core::event_bus::BroadcastEventBus;
    use sahabul_testing::{InMemoryEventStore, ReducerTest, assertions, mocks::FixedClock};

    fn clock_at(rfc3339: &str) -> Arc<FixedClock> {
        Arc::new(FixedClock::new(
            DateTime::parse_from_rfc3339(rfc3339)
                .unwrap()
                .with_timezone(&Utc),
        ))
    }

    fn test_env(clock: Arc<FixedClock>) -> LedgerEnvironment {
        LedgerEnvironment::new(
            clock,
            Arc::new(InMemoryEventStore::new()),
            Arc::new(BroadcastEventBus::new()),
            LedgerRules::default(),
        )
    }

    fn approved_terms(base_lira: u64) -> FieldTerms {
        FieldTerms {
            field_id: FieldId::new(),
            approved: true,
            base_price_per_hour: Money::from_lira(base_lira),
            subscription_price_4_match: None,
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn created_booking(terms: &FieldTerms, date_: NaiveDate, hour: u8, sub: bool) -> Booking {
        let rules = LedgerRules::default();
        let slots = LedgerReducer::target_slots(terms.field_id, date_, hour, sub);
        Booking {
            id: BookingId::new(),
            user_id: UserId::new(),
            field_id: terms.field_id,
            date: date_,
            start_hour: hour,
            is_subscription: sub,
            status: BookingStatus::Pending,
            charge: charge_breakdown(&rules, terms, sub, 0),
            slots,
            created_at: Utc::now(),
        }
    }

    // ---------- pricing ----------

    #[test]
    fn single_booking_pricing() {
        let rules = LedgerRules::default();
        let terms = approved_terms(300);
        let charge = charge_breakdown(&rules, &terms, false, 0);
        assert_eq!(charge.total, Money::from_lira(350));
        assert_eq!(charge.owner_share, Money::from_lira(300));
        assert_eq!(charge.platform_fee, Money::from_lira(50));
        assert_eq!(charge.loyalty_discount, Money::ZERO);
    }

    #[test]
    fn subscription_pricing_without_discount() {
        let rules = LedgerRules::default();
        let terms = approved_terms(300);
        // Below the crown threshold
        let charge = charge_breakdown(&rules, &terms, true, 4);
        assert_eq!(charge.total, Money::from_lira(1400));
        assert_eq!(charge.owner_share, Money::from_lira(1200));
        assert_eq!(charge.platform_fee, Money::from_lira(200));
        assert_eq!(charge.loyalty_discount, Money::ZERO);
    }

    #[test]
    fn subscription_pricing_with_loyalty_discount() {
        let rules = LedgerRules::default();
        let terms = approved_terms(300);
        let charge = charge_breakdown(&rules, &terms, true, 5);
        // 10% of one match's base price, absorbed by the platform
        assert_eq!(charge.loyalty_discount, Money::from_lira(30));
        assert_eq!(charge.total, Money::from_lira(1370));
        assert_eq!(charge.owner_share, Money::from_lira(1200));
    }

    #[test]
    fn subscription_package_price_overrides_four_times_base() {
        let rules = LedgerRules::default();
        let mut terms = approved_terms(300);
        terms.subscription_price_4_match = Some(Money::from_lira(1100));
        let charge = charge_breakdown(&rules, &terms, true, 0);
        assert_eq!(charge.owner_share, Money::from_lira(1100));
        assert_eq!(charge.total, Money::from_lira(1300));
    }

    // ---------- create ----------

    #[test]
    fn create_booking_appends_created_event() {
        let clock = clock_at("2025-06-01T12:00:00Z");
        let terms = approved_terms(300);

        ReducerTest::new(LedgerReducer::new())
            .with_env(test_env(clock))
            .given_state(LedgerState::new())
            .when_action(LedgerAction::CreateBooking {
                booking_id: BookingId::new(),
                user_id: UserId::new(),
                terms,
                date: date(2025, 6, 10),
                hour: 20,
                is_subscription: false,
            })
            .then_state(|state| {
                // Nothing applies until the append commits
                assert!(state.bookings.is_empty());
                assert!(state.occupancy.is_empty());
            })
            .then_effects(|effects| {
                assertions::assert_effects_count(effects, 1);
                assertions::assert_has_event_store_effect(effects);
            })
            .run();
    }

    #[test]
    fn create_rejects_unapproved_field() {
        let clock = clock_at("2025-06-01T12:00:00Z");
        let mut terms = approved_terms(300);
        terms.approved = false;
        let booking_id = BookingId::new();

        ReducerTest::new(LedgerReducer::new())
            .with_env(test_env(clock))
            .given_state(LedgerState::new())
            .when_action(LedgerAction::CreateBooking {
                booking_id,
                user_id: UserId::new(),
                terms,
                date: date(2025, 6, 10),
                hour: 20,
                is_subscription: false,
            })
            .then_state(|state| {
                assert!(state.last_error.as_deref().unwrap().contains("not approved"));
            })
            .then_effects(assertions::assert_has_future_effect)
            .run();
    }

    #[test]
    fn create_rejects_past_slot() {
        let clock = clock_at("2025-06-10T21:30:00Z");
        let terms = approved_terms(300);

        ReducerTest::new(LedgerReducer::new())
            .with_env(test_env(clock))
            .given_state(LedgerState::new())
            .when_action(LedgerAction::CreateBooking {
                booking_id: BookingId::new(),
                user_id: UserId::new(),
                terms,
                date: date(2025, 6, 10),
                hour: 21, // started half an hour ago
                is_subscription: false,
            })
            .then_state(|state| {
                assert!(state.last_error.as_deref().unwrap().contains("past"));
            })
            .run();
    }

    #[test]
    fn create_rejects_outside_operating_hours() {
        let clock = clock_at("2025-06-01T12:00:00Z");
        let terms = approved_terms(300);

        ReducerTest::new(LedgerReducer::new())
            .with_env(test_env(clock))
            .given_state(LedgerState::new())
            .when_action(LedgerAction::CreateBooking {
                booking_id: BookingId::new(),
                user_id: UserId::new(),
                terms,
                date: date(2025, 6, 10),
                hour: 7, // before opening
                is_subscription: false,
            })
            .then_state(|state| {
                assert!(
                    state
                        .last_error
                        .as_deref()
                        .unwrap()
                        .contains("operating hours")
                );
            })
            .run();
    }

    #[test]
    fn create_rejects_occupied_slot() {
        let clock = clock_at("2025-06-01T12:00:00Z");
        let terms = approved_terms(300);
        let existing = created_booking(&terms, date(2025, 6, 10), 20, false);

        let mut state = LedgerState::new();
        LedgerReducer::apply_event(
            &mut state,
            &LedgerAction::BookingCreated {
                booking: existing,
            },
        );

        ReducerTest::new(LedgerReducer::new())
            .with_env(test_env(clock))
            .given_state(state)
            .when_action(LedgerAction::CreateBooking {
                booking_id: BookingId::new(),
                user_id: UserId::new(),
                terms,
                date: date(2025, 6, 10),
                hour: 20,
                is_subscription: false,
            })
            .then_state(|state| {
                assert!(state.last_error.as_deref().unwrap().contains("already booked"));
            })
            .run();
    }

    #[test]
    fn subscription_is_all_or_nothing() {
        let clock = clock_at("2025-06-01T12:00:00Z");
        let terms = approved_terms(300);

        // Occupy only the third weekly occurrence
        let blocker = created_booking(&terms, date(2025, 6, 24), 20, false);
        let mut state = LedgerState::new();
        LedgerReducer::apply_event(&mut state, &LedgerAction::BookingCreated { booking: blocker });

        ReducerTest::new(LedgerReducer::new())
            .with_env(test_env(clock))
            .given_state(state)
            .when_action(LedgerAction::CreateBooking {
                booking_id: BookingId::new(),
                user_id: UserId::new(),
                terms,
                date: date(2025, 6, 10),
                hour: 20,
                is_subscription: true,
            })
            .then_state(|state| {
                assert!(state.last_error.as_deref().unwrap().contains("already booked"));
                // No partial holds were taken
                assert_eq!(state.occupancy.len(), 1);
            })
            .run();
    }

    // ---------- committed events ----------

    #[test]
    fn committed_create_occupies_slots_and_publishes() {
        let clock = clock_at("2025-06-01T12:00:00Z");
        let terms = approved_terms(300);
        let booking = created_booking(&terms, date(2025, 6, 10), 20, true);
        let booking_id = booking.id;

        ReducerTest::new(LedgerReducer::new())
            .with_env(test_env(clock))
            .given_state(LedgerState::new())
            .when_action(LedgerAction::Committed {
                event: Box::new(LedgerAction::BookingCreated { booking }),
                version: Version::new(1),
            })
            .then_state(move |state| {
                assert_eq!(state.version, Version::new(1));
                let stored = state.bookings.get(&booking_id).unwrap();
                assert_eq!(stored.status, BookingStatus::Pending);
                assert_eq!(stored.slots.len(), 4);
                assert_eq!(state.occupancy.len(), 4);
                assert!(state.occupancy.values().all(|h| h.is_subscription));
            })
            .then_effects(assertions::assert_has_publish_event_effect)
            .run();
    }

    #[test]
    fn paid_booking_awards_a_crown() {
        let clock = clock_at("2025-06-01T12:00:00Z");
        let terms = approved_terms(300);
        let booking = created_booking(&terms, date(2025, 6, 10), 20, false);
        let (booking_id, user_id) = (booking.id, booking.user_id);

        let mut state = LedgerState::new();
        LedgerReducer::apply_event(&mut state, &LedgerAction::BookingCreated { booking });

        ReducerTest::new(LedgerReducer::new())
            .with_env(test_env(clock.clone()))
            .given_state(state)
            .when_action(LedgerAction::CommittedBatch {
                events: vec![
                    LedgerAction::BookingConfirmed { booking_id },
                    LedgerAction::BookingPaid {
                        booking_id,
                        user_id,
                        paid_at: clock.now(),
                    },
                ],
                version: Version::new(3),
            })
            .then_state(move |state| {
                assert_eq!(
                    state.bookings.get(&booking_id).unwrap().status,
                    BookingStatus::Paid
                );
                assert_eq!(state.crowns_of(&user_id), 1);
                assert_eq!(state.version, Version::new(3));
            })
            .run();
    }

    // ---------- payment outcome ----------

    #[test]
    fn outcome_on_non_pending_booking_is_absorbed() {
        let clock = clock_at("2025-06-01T12:00:00Z");
        let terms = approved_terms(300);
        let mut booking = created_booking(&terms, date(2025, 6, 10), 20, false);
        booking.status = BookingStatus::Paid;
        let booking_id = booking.id;

        let mut state = LedgerState::new();
        LedgerReducer::apply_event(&mut state, &LedgerAction::BookingCreated { booking });
        // apply_event keeps the embedded status
        state.bookings.get_mut(&booking_id).unwrap().status = BookingStatus::Paid;

        ReducerTest::new(LedgerReducer::new())
            .with_env(test_env(clock))
            .given_state(state)
            .when_action(LedgerAction::RecordPaymentOutcome {
                booking_id,
                outcome: PaymentOutcome::TimedOut,
                attempt: 0,
            })
            .then_state(move |state| {
                // The earlier success won; the timeout is a no-op
                assert_eq!(
                    state.bookings.get(&booking_id).unwrap().status,
                    BookingStatus::Paid
                );
            })
            .then_effects(assertions::assert_no_effects)
            .run();
    }

    #[test]
    fn failed_payment_cancels_pending_booking() {
        let clock = clock_at("2025-06-01T12:00:00Z");
        let terms = approved_terms(300);
        let booking = created_booking(&terms, date(2025, 6, 10), 20, false);
        let booking_id = booking.id;

        let mut state = LedgerState::new();
        LedgerReducer::apply_event(&mut state, &LedgerAction::BookingCreated { booking });

        ReducerTest::new(LedgerReducer::new())
            .with_env(test_env(clock))
            .given_state(state)
            .when_action(LedgerAction::RecordPaymentOutcome {
                booking_id,
                outcome: PaymentOutcome::Failed {
                    reason: "card declined".to_string(),
                },
                attempt: 0,
            })
            .then_effects(assertions::assert_has_event_store_effect)
            .run();
    }

    // ---------- cancellation ----------

    fn cancellable_state(
        terms: &FieldTerms,
        date_: NaiveDate,
        hour: u8,
    ) -> (LedgerState, BookingId, UserId) {
        let mut booking = created_booking(terms, date_, hour, false);
        booking.status = BookingStatus::Paid;
        let (id, user) = (booking.id, booking.user_id);
        let mut state = LedgerState::new();
        LedgerReducer::apply_event(&mut state, &LedgerAction::BookingCreated { booking });
        state.bookings.get_mut(&id).unwrap().status = BookingStatus::Paid;
        (state, id, user)
    }

    #[test]
    fn cancel_exactly_at_the_window_is_rejected() {
        // Slot starts 2025-06-04T12:00:00Z; now is exactly 72h before
        let clock = clock_at("2025-06-01T12:00:00Z");
        let terms = approved_terms(300);
        let (state, booking_id, user_id) = cancellable_state(&terms, date(2025, 6, 4), 12);

        ReducerTest::new(LedgerReducer::new())
            .with_env(test_env(clock))
            .given_state(state)
            .when_action(LedgerAction::CancelBooking {
                booking_id,
                principal: Principal::new(user_id, crate::types::Role::Player),
                attempt: 0,
            })
            .then_state(|state| {
                assert!(
                    state
                        .last_error
                        .as_deref()
                        .unwrap()
                        .contains("cancellation window")
                );
            })
            .run();
    }

    #[test]
    fn cancel_one_second_past_the_window_succeeds() {
        // Slot starts 2025-06-04T12:00:00Z; now is 72h + 1s before
        let clock = clock_at("2025-06-01T11:59:59Z");
        let terms = approved_terms(300);
        let (state, booking_id, user_id) = cancellable_state(&terms, date(2025, 6, 4), 12);

        ReducerTest::new(LedgerReducer::new())
            .with_env(test_env(clock))
            .given_state(state)
            .when_action(LedgerAction::CancelBooking {
                booking_id,
                principal: Principal::new(user_id, crate::types::Role::Player),
                attempt: 0,
            })
            .then_effects(assertions::assert_has_event_store_effect)
            .run();
    }

    #[test]
    fn cancel_by_stranger_is_rejected() {
        let clock = clock_at("2025-06-01T11:59:59Z");
        let terms = approved_terms(300);
        let (state, booking_id, _user) = cancellable_state(&terms, date(2025, 6, 4), 12);

        ReducerTest::new(LedgerReducer::new())
            .with_env(test_env(clock))
            .given_state(state)
            .when_action(LedgerAction::CancelBooking {
                booking_id,
                principal: Principal::new(UserId::new(), crate::types::Role::Player),
                attempt: 0,
            })
            .then_state(|state| {
                assert!(state.last_error.as_deref().unwrap().contains("not authorized"));
            })
            .run();
    }

    #[test]
    fn admin_may_cancel_for_a_user() {
        let clock = clock_at("2025-06-01T11:59:59Z");
        let terms = approved_terms(300);
        let (state, booking_id, _user) = cancellable_state(&terms, date(2025, 6, 4), 12);

        ReducerTest::new(LedgerReducer::new())
            .with_env(test_env(clock))
            .given_state(state)
            .when_action(LedgerAction::CancelBooking {
                booking_id,
                principal: Principal::new(UserId::new(), crate::types::Role::Admin),
                attempt: 0,
            })
            .then_effects(assertions::assert_has_event_store_effect)
            .run();
    }

    #[test]
    fn cancel_pending_booking_is_rejected() {
        let clock = clock_at("2025-06-01T11:59:59Z");
        let terms = approved_terms(300);
        let booking = created_booking(&terms, date(2025, 6, 4), 12, false);
        let (booking_id, user_id) = (booking.id, booking.user_id);
        let mut state = LedgerState::new();
        LedgerReducer::apply_event(&mut state, &LedgerAction::BookingCreated { booking });

        ReducerTest::new(LedgerReducer::new())
            .with_env(test_env(clock))
            .given_state(state)
            .when_action(LedgerAction::CancelBooking {
                booking_id,
                principal: Principal::new(user_id, crate::types::Role::Player),
                attempt: 0,
            })
            .then_state(|state| {
                assert!(state.last_error.is_some());
            })
            .run();
    }

    // ---------- sweep ----------

    #[test]
    fn sweep_completes_elapsed_bookings() {
        let clock = clock_at("2025-06-11T00:30:00Z");
        let terms = approved_terms(300);
        // Paid booking whose slot (June 10, 20:00-21:00) has elapsed
        let (mut state, _id, _user) = cancellable_state(&terms, date(2025, 6, 10), 20);
        // And one still in the future
        let future = created_booking(&terms, date(2025, 6, 20), 20, false);
        LedgerReducer::apply_event(&mut state, &LedgerAction::BookingCreated { booking: future });

        ReducerTest::new(LedgerReducer::new())
            .with_env(test_env(clock))
            .given_state(state)
            .when_action(LedgerAction::SweepCompleted { attempt: 0 })
            .then_effects(assertions::assert_has_event_store_effect)
            .run();
    }

    #[test]
    fn sweep_with_nothing_elapsed_is_a_no_op() {
        let clock = clock_at("2025-06-01T12:00:00Z");
        let terms = approved_terms(300);
        let (state, _id, _user) = cancellable_state(&terms, date(2025, 6, 10), 20);

        ReducerTest::new(LedgerReducer::new())
            .with_env(test_env(clock))
            .given_state(state)
            .when_action(LedgerAction::SweepCompleted { attempt: 0 })
            .then_effects(assertions::assert_no_effects)
            .run();
    }

    // ---------- pricing properties ----------

    mod pricing_properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn breakdown_components_always_reconcile(
                base in 1_u64..100_000,
                fee in 0_u64..10_000,
                crowns in 0_u32..20,
                is_subscription in proptest::bool::ANY,
            ) {
                let rules = LedgerRules {
                    platform_fee: Money::from_kurus(fee),
                    ..LedgerRules::default()
                };
                let terms = FieldTerms {
                    field_id: FieldId::new(),
                    approved: true,
                    base_price_per_hour: Money::from_kurus(base),
                    subscription_price_4_match: None,
                };

                let charge = charge_breakdown(&rules, &terms, is_subscription, crowns);

                // The user pays owner share + fees - discount, exactly
                prop_assert_eq!(
                    charge.total,
                    charge
                        .owner_share
                        .add(charge.platform_fee)
                        .saturating_sub(charge.loyalty_discount)
                );
                // The discount never exceeds one match's base price and
                // never touches the owner's share
                prop_assert!(charge.loyalty_discount <= terms.base_price_per_hour);
                let expected_owner = if is_subscription {
                    terms.base_price_per_hour.multiply(4)
                } else {
                    terms.base_price_per_hour
                };
                prop_assert_eq!(charge.owner_share, expected_owner);
                // Single bookings never get the discount
                if !is_subscription {
                    prop_assert!(charge.loyalty_discount.is_zero());
                }
            }

            #[test]
            fn crowns_only_change_the_discount(
                base in 1_u64..100_000,
                crowns in 0_u32..20,
            ) {
                let rules = LedgerRules::default();
                let terms = FieldTerms {
                    field_id: FieldId::new(),
                    approved: true,
                    base_price_per_hour: Money::from_kurus(base),
                    subscription_price_4_match: None,
                };

                let charge = charge_breakdown(&rules, &terms, true, crowns);
                let baseline = charge_breakdown(&rules, &terms, true, 0);

                prop_assert_eq!(charge.owner_share, baseline.owner_share);
                prop_assert_eq!(charge.platform_fee, baseline.platform_fee);
                if crowns >= rules.loyalty_threshold {
                    prop_assert_eq!(
                        charge.loyalty_discount,
                        terms.base_price_per_hour.percent(rules.loyalty_discount_percent)
                    );
                } else {
                    prop_assert!(charge.loyalty_discount.is_zero());
                }
            }
        }
    }

    // ---------- rehydration ----------

    #[test]
    fn rehydrate_replays_events_in_order() {
        let terms = approved_terms(300);
        let booking = created_booking(&terms, date(2025, 6, 10), 20, false);
        let (booking_id, user_id) = (booking.id, booking.user_id);

        let events: Vec<SerializedEvent> = [
            LedgerAction::BookingCreated { booking },
            LedgerAction::BookingConfirmed { booking_id },
            LedgerAction::BookingPaid {
                booking_id,
                user_id,
                paid_at: Utc::now(),
            },
        ]
        .iter()
        .map(|e| LedgerReducer::serialize(e).unwrap())
        .collect();

        let state = LedgerState::rehydrate(&events);
        assert_eq!(state.version, Version::new(3));
        assert_eq!(
            state.bookings.get(&booking_id).unwrap().status,
            BookingStatus::Paid
        );
        assert_eq!(state.crowns_of(&user_id), 1);
    }
}
