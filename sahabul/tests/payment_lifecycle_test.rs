//! Payment lifecycle over the wired stores: timeout release, failure
//! cancellation, and the cancellation→refund path.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod support;

use sahabul::aggregates::booking::LedgerAction;
use sahabul::aggregates::payment::{CallbackOutcome, PaymentAction};
use sahabul::types::{BookingStatus, Money, PaymentId, PaymentStatus, Principal, Role, UserId};
use support::{
    WAIT, approved_field, create_booking, created_booking_id, eventually, future_date, test_app,
};

/// Drive a booking to an initiated payment; returns (booking_id, oid).
async fn initiated_booking(
    state: &sahabul::server::state::AppState,
    user_id: UserId,
    terms: sahabul::aggregates::booking::FieldTerms,
    hour: u8,
) -> (sahabul::types::BookingId, String) {
    let outcome = create_booking(state, user_id, terms, future_date(10), hour, false).await;
    let booking_id = created_booking_id(&outcome).expect("booking should be created");

    state
        .payments
        .send_and_wait_for(
            PaymentAction::InitiatePayment {
                payment_id: PaymentId::new(),
                booking_id,
                user_id,
                amount: Money::from_lira(350),
            },
            move |a| matches!(a, PaymentAction::CheckoutReady { booking_id: id, .. } if *id == booking_id),
            WAIT,
        )
        .await
        .unwrap();

    let merchant_oid = state
        .payments
        .state(move |s| s.latest_for_booking(&booking_id).map(|p| p.merchant_oid.clone()))
        .await
        .unwrap();

    (booking_id, merchant_oid)
}

#[tokio::test]
async fn payment_timeout_releases_the_slot() {
    // One-second callback window
    let (state, _store) = test_app(1).await;
    let (_field_id, terms) = approved_field(&state, 300).await;
    let user_id = UserId::new();

    let (booking_id, _oid) = initiated_booking(&state, user_id, terms, 20).await;

    // No callback arrives; the expiry fires and the relay cancels the
    // booking, releasing its hold.
    assert!(
        eventually(|| async {
            state
                .ledger
                .state(move |s| {
                    s.bookings.get(&booking_id).map(|b| b.status)
                        == Some(BookingStatus::Cancelled)
                })
                .await
        })
        .await,
        "timeout should cancel the booking"
    );

    let holds = state.ledger.state(|s| s.occupancy.len()).await;
    assert_eq!(holds, 0, "the slot returns to available");

    // A late success callback after the timeout is absorbed, not applied
    let late = state
        .payments
        .state(move |s| s.latest_for_booking(&booking_id).map(|p| p.merchant_oid.clone()))
        .await
        .unwrap();
    state
        .payments
        .send(PaymentAction::HandleCallback {
            merchant_oid: late,
            outcome: CallbackOutcome::Success,
        })
        .await
        .unwrap();

    tokio::time::sleep(std::time::Duration::from_millis(300)).await;
    let status = state
        .ledger
        .state(move |s| s.bookings.get(&booking_id).map(|b| b.status))
        .await
        .unwrap();
    assert_eq!(status, BookingStatus::Cancelled, "first transition wins");
}

#[tokio::test]
async fn failed_callback_cancels_the_booking() {
    let (state, _store) = test_app(15 * 60).await;
    let (_field_id, terms) = approved_field(&state, 300).await;
    let user_id = UserId::new();

    let (booking_id, merchant_oid) = initiated_booking(&state, user_id, terms, 21).await;

    state
        .payments
        .send(PaymentAction::HandleCallback {
            merchant_oid,
            outcome: CallbackOutcome::Failed,
        })
        .await
        .unwrap();

    assert!(
        eventually(|| async {
            state
                .ledger
                .state(move |s| {
                    s.bookings.get(&booking_id).map(|b| b.status)
                        == Some(BookingStatus::Cancelled)
                })
                .await
        })
        .await,
        "failed payment should cancel the booking"
    );

    // No crown for a failed payment
    assert_eq!(state.ledger.state(move |s| s.crowns_of(&user_id)).await, 0);
    assert_eq!(state.ledger.state(|s| s.occupancy.len()).await, 0);
}

#[tokio::test]
async fn user_cancellation_triggers_an_asynchronous_refund() {
    let (state, _store) = test_app(15 * 60).await;
    let (_field_id, terms) = approved_field(&state, 300).await;
    let user_id = UserId::new();

    let (booking_id, merchant_oid) = initiated_booking(&state, user_id, terms, 22).await;

    // Pay first
    state
        .payments
        .send(PaymentAction::HandleCallback {
            merchant_oid,
            outcome: CallbackOutcome::Success,
        })
        .await
        .unwrap();
    assert!(
        eventually(|| async {
            state
                .ledger
                .state(move |s| {
                    s.bookings.get(&booking_id).map(|b| b.status) == Some(BookingStatus::Paid)
                })
                .await
        })
        .await
    );

    // Cancel well outside the 72-hour window (slot is 10 days out)
    let cancelled = state
        .ledger
        .send_and_wait_for(
            LedgerAction::CancelBooking {
                booking_id,
                principal: Principal::new(user_id, Role::Player),
                attempt: 0,
            },
            move |action| match action {
                LedgerAction::CommittedBatch { events, .. } => events.iter().any(|e| {
                    matches!(e, LedgerAction::BookingCancelled { booking_id: id, .. } if *id == booking_id)
                }),
                LedgerAction::BookingRejected { booking_id: id, .. } => *id == booking_id,
                _ => false,
            },
            WAIT,
        )
        .await
        .unwrap();
    assert!(
        matches!(cancelled, LedgerAction::CommittedBatch { .. }),
        "cancellation should commit: {cancelled:?}"
    );

    // The booking shows cancelled immediately; the refund settles
    // asynchronously through the relay and the mock gateway.
    let status = state
        .ledger
        .state(move |s| s.bookings.get(&booking_id).map(|b| b.status))
        .await
        .unwrap();
    assert_eq!(status, BookingStatus::Cancelled);

    assert!(
        eventually(|| async {
            state
                .payments
                .state(move |s| {
                    s.latest_for_booking(&booking_id).map(|p| p.status.clone())
                        == Some(PaymentStatus::Refunded)
                })
                .await
        })
        .await,
        "refund should be acknowledged by the gateway"
    );

    assert_eq!(state.ledger.state(|s| s.occupancy.len()).await, 0);
}
