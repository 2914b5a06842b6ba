//! Payment endpoints.
//!
//! - `POST /api/payments/initiate/:booking_id` - create a checkout and
//!   return the payment URL
//! - `POST /api/payments/callback` - gateway webhook (form-encoded),
//!   idempotent, always answers `OK`
//! - `GET /api/payments/simulate/:merchant_oid` - sandbox payment page
//!   used with the built-in mock gateway

use super::store_error;
use crate::aggregates::payment::{CallbackOutcome, PaymentAction};
use crate::auth::SessionUser;
use crate::server::state::AppState;
use crate::types::{BookingId, BookingStatus, Money, PaymentId};
use axum::{
    Form, Json,
    extract::{Path, State},
    response::Html,
};
use sahabul_web::error::AppError;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Response after initiating a payment.
#[derive(Debug, Serialize)]
pub struct InitiatePaymentResponse {
    /// The payment record id
    pub payment_id: Uuid,
    /// External reference the gateway echoes in its callback
    pub merchant_oid: Option<String>,
    /// URL the user completes payment at
    pub payment_url: String,
    /// Amount to be captured (kuruş)
    pub amount: Money,
}

/// Initiate payment for a pending booking.
///
/// Only the booking user may initiate. Re-initiating while a checkout is
/// open returns the same checkout instead of opening a second charge
/// path. The callback window starts now; with no callback the booking's
/// slots are released automatically.
pub async fn initiate_payment(
    SessionUser(principal): SessionUser,
    State(state): State<AppState>,
    Path(booking_id): Path<Uuid>,
) -> Result<Json<InitiatePaymentResponse>, AppError> {
    let booking_id = BookingId::from_uuid(booking_id);

    let booking = state
        .ledger
        .state(move |s| s.bookings.get(&booking_id).cloned())
        .await
        .ok_or_else(|| AppError::not_found("Booking", booking_id))?;

    if booking.user_id != principal.user_id && !principal.is_admin() {
        return Err(AppError::forbidden("Not your booking"));
    }

    if booking.status != BookingStatus::Pending {
        return Err(AppError::conflict(
            "Only pending bookings can be paid; this one already transitioned",
        ));
    }

    let payment_id = PaymentId::new();
    let amount = booking.charge.total;

    let outcome = state
        .payments
        .send_and_wait_for(
            PaymentAction::InitiatePayment {
                payment_id,
                booking_id,
                user_id: principal.user_id,
                amount,
            },
            move |action| match action {
                PaymentAction::CheckoutReady { booking_id: id, .. }
                | PaymentAction::CheckoutFailed { booking_id: id, .. } => *id == booking_id,
                _ => false,
            },
            state.request_timeout,
        )
        .await
        .map_err(store_error)?;

    match outcome {
        PaymentAction::CheckoutReady {
            payment_id,
            payment_url,
            ..
        } => {
            let merchant_oid = state
                .payments
                .state(move |s| {
                    s.payments
                        .get(&payment_id)
                        .map(|p| p.merchant_oid.clone())
                })
                .await;

            Ok(Json(InitiatePaymentResponse {
                payment_id: *payment_id.as_uuid(),
                merchant_oid,
                payment_url,
                amount,
            }))
        },
        PaymentAction::CheckoutFailed { reason, .. } => Err(AppError::validation_with_code(
            format!("Payment could not be initiated: {reason}"),
            "CHECKOUT_FAILED",
        )),
        _ => Err(AppError::internal("Unexpected payment outcome")),
    }
}

/// Gateway callback payload (form-encoded, PayTR style).
#[derive(Debug, Deserialize)]
pub struct CallbackForm {
    /// External reference from initiation
    pub merchant_oid: String,
    /// `success` or anything else for failure
    pub status: String,
    /// Echoed amount in kuruş (unused; the coordinator trusts its record)
    #[allow(dead_code)]
    pub total_amount: Option<String>,
}

/// Gateway webhook.
///
/// Idempotent: replaying a callback for a terminal payment is absorbed
/// without a second transition. Always answers `OK` so the gateway stops
/// retrying; anomalies are logged, not surfaced.
pub async fn payment_callback(
    State(state): State<AppState>,
    Form(form): Form<CallbackForm>,
) -> Result<String, AppError> {
    let outcome = if form.status == "success" {
        CallbackOutcome::Success
    } else {
        CallbackOutcome::Failed
    };

    let merchant_oid = form.merchant_oid.clone();
    let result = state
        .payments
        .send_and_wait_for(
            PaymentAction::HandleCallback {
                merchant_oid: form.merchant_oid,
                outcome,
            },
            move |action| match action {
                PaymentAction::Committed { event, .. } => matches!(
                    event.as_ref(),
                    PaymentAction::PaymentSucceeded { merchant_oid: oid, .. }
                    | PaymentAction::PaymentFailed { merchant_oid: oid, .. }
                        if *oid == merchant_oid
                ),
                PaymentAction::CallbackReplayed { merchant_oid: oid }
                | PaymentAction::CallbackUnmatched { merchant_oid: oid } => *oid == merchant_oid,
                _ => false,
            },
            state.request_timeout,
        )
        .await;

    if let Err(error) = result {
        tracing::error!(error = %error, "Payment callback processing did not settle in time");
    }

    Ok("OK".to_string())
}

/// Sandbox payment page for the built-in mock gateway.
///
/// Renders success/failure buttons that post back to the callback
/// webhook, mirroring the processor's hosted page during development.
pub async fn simulate_payment(
    State(state): State<AppState>,
    Path(merchant_oid): Path<String>,
) -> Result<Html<String>, AppError> {
    let lookup = merchant_oid.clone();
    let payment = state
        .payments
        .state(move |s| {
            s.by_merchant_oid
                .get(&lookup)
                .and_then(|id| s.payments.get(id))
                .cloned()
        })
        .await
        .ok_or_else(|| AppError::not_found("Payment", &merchant_oid))?;

    Ok(Html(format!(
        r#"<!DOCTYPE html>
<html>
<head><title>Simulated Payment</title></head>
<body>
  <h2>Simulated Payment</h2>
  <p>Reference: {merchant_oid}</p>
  <p>Amount: {amount}</p>
  <form method="post" action="/api/payments/callback">
    <input type="hidden" name="merchant_oid" value="{merchant_oid}" />
    <input type="hidden" name="total_amount" value="{kurus}" />
    <button name="status" value="success">Simulate Success</button>
    <button name="status" value="failed">Simulate Failure</button>
  </form>
</body>
</html>"#,
        amount = payment.amount,
        kurus = payment.amount.kurus(),
    )))
}
