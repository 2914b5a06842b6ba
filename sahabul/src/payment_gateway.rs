//! Payment gateway abstraction.
//!
//! The coordinator talks to the processor through this trait. The HTTP
//! implementation speaks the PayTR-style form API the platform settles
//! through; the mock always succeeds and serves development and tests.

use crate::types::Money;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use thiserror::Error;

/// Payment gateway result
pub type GatewayResult<T> = Result<T, PaymentGatewayError>;

/// Payment gateway error
#[derive(Error, Debug, Clone)]
pub enum PaymentGatewayError {
    /// The gateway rejected the checkout request
    #[error("Checkout rejected: {reason}")]
    CheckoutRejected {
        /// Rejection reason
        reason: String,
    },
    /// The gateway rejected the refund request
    #[error("Refund rejected: {reason}")]
    RefundRejected {
        /// Rejection reason
        reason: String,
    },
    /// Network or transport failure
    #[error("Gateway transport error: {0}")]
    Transport(String),
    /// Gateway timeout
    #[error("Gateway timeout")]
    Timeout,
}

/// A created checkout: where to send the user to pay.
#[derive(Debug, Clone)]
pub struct Checkout {
    /// URL the user completes payment at
    pub payment_url: String,
}

/// Payment gateway trait.
///
/// Abstraction over external payment processors. Uses explicit
/// `Pin<Box<dyn Future>>` returns for trait-object usage inside effects.
pub trait PaymentGateway: Send + Sync {
    /// Create a checkout for the given external reference and amount.
    ///
    /// # Errors
    ///
    /// Returns an error if the gateway rejects the request or is
    /// unreachable.
    fn create_checkout(
        &self,
        merchant_oid: &str,
        amount: Money,
    ) -> Pin<Box<dyn Future<Output = GatewayResult<Checkout>> + Send>>;

    /// Request a refund for a captured payment.
    ///
    /// Returns the gateway's refund reference.
    ///
    /// # Errors
    ///
    /// Returns an error if the gateway rejects the request or is
    /// unreachable.
    fn refund(
        &self,
        merchant_oid: &str,
        amount: Money,
    ) -> Pin<Box<dyn Future<Output = GatewayResult<String>> + Send>>;
}

// ============================================================================
// Mock gateway
// ============================================================================

/// Mock payment gateway (always succeeds).
///
/// Checkout URLs point at the service's own simulated payment page, the
/// way the sandbox flow works end to end without an external processor.
#[derive(Clone, Debug, Default)]
pub struct MockPaymentGateway;

impl MockPaymentGateway {
    /// Creates a new mock gateway.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Creates an Arc-wrapped instance for sharing.
    #[must_use]
    pub fn shared() -> Arc<dyn PaymentGateway> {
        Arc::new(Self::new())
    }
}

impl PaymentGateway for MockPaymentGateway {
    fn create_checkout(
        &self,
        merchant_oid: &str,
        amount: Money,
    ) -> Pin<Box<dyn Future<Output = GatewayResult<Checkout>> + Send>> {
        let merchant_oid = merchant_oid.to_string();
        Box::pin(async move {
            tracing::info!(
                merchant_oid = %merchant_oid,
                amount = amount.kurus(),
                "Mock checkout created"
            );

            Ok(Checkout {
                payment_url: format!("/api/payments/simulate/{merchant_oid}"),
            })
        })
    }

    fn refund(
        &self,
        merchant_oid: &str,
        amount: Money,
    ) -> Pin<Box<dyn Future<Output = GatewayResult<String>> + Send>> {
        let merchant_oid = merchant_oid.to_string();
        Box::pin(async move {
            let refund_id = format!("mock_refund_{}", uuid::Uuid::new_v4());

            tracing::info!(
                merchant_oid = %merchant_oid,
                amount = amount.kurus(),
                refund_id = %refund_id,
                "Mock refund processed"
            );

            Ok(refund_id)
        })
    }
}

// ============================================================================
// HTTP gateway
// ============================================================================

/// HTTP gateway client speaking a PayTR-shaped form API.
///
/// `POST {base}/checkout` with `merchant_oid` and `amount` (kuruş) returns
/// `{"payment_url": ...}`; `POST {base}/refund` returns
/// `{"refund_reference": ...}`.
#[derive(Clone)]
pub struct HttpPaymentGateway {
    client: reqwest::Client,
    base_url: String,
}

#[derive(serde::Deserialize)]
struct CheckoutResponse {
    payment_url: String,
}

#[derive(serde::Deserialize)]
struct RefundResponse {
    refund_reference: String,
}

impl HttpPaymentGateway {
    /// Create a gateway client against the given base URL.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }
}

impl PaymentGateway for HttpPaymentGateway {
    fn create_checkout(
        &self,
        merchant_oid: &str,
        amount: Money,
    ) -> Pin<Box<dyn Future<Output = GatewayResult<Checkout>> + Send>> {
        let client = self.client.clone();
        let url = format!("{}/checkout", self.base_url);
        let form = [
            ("merchant_oid", merchant_oid.to_string()),
            ("amount", amount.kurus().to_string()),
        ];

        Box::pin(async move {
            let response = client
                .post(&url)
                .form(&form)
                .send()
                .await
                .map_err(|e| PaymentGatewayError::Transport(e.to_string()))?;

            if !response.status().is_success() {
                return Err(PaymentGatewayError::CheckoutRejected {
                    reason: format!("gateway returned {}", response.status()),
                });
            }

            let body: CheckoutResponse = response
                .json()
                .await
                .map_err(|e| PaymentGatewayError::Transport(e.to_string()))?;

            Ok(Checkout {
                payment_url: body.payment_url,
            })
        })
    }

    fn refund(
        &self,
        merchant_oid: &str,
        amount: Money,
    ) -> Pin<Box<dyn Future<Output = GatewayResult<String>> + Send>> {
        let client = self.client.clone();
        let url = format!("{}/refund", self.base_url);
        let form = [
            ("merchant_oid", merchant_oid.to_string()),
            ("amount", amount.kurus().to_string()),
        ];

        Box::pin(async move {
            let response = client
                .post(&url)
                .form(&form)
                .send()
                .await
                .map_err(|e| PaymentGatewayError::Transport(e.to_string()))?;

            if !response.status().is_success() {
                return Err(PaymentGatewayError::RefundRejected {
                    reason: format!("gateway returned {}", response.status()),
                });
            }

            let body: RefundResponse = response
                .json()
                .await
                .map_err(|e| PaymentGatewayError::Transport(e.to_string()))?;

            Ok(body.refund_reference)
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_checkout_points_at_simulation_page() {
        let gateway = MockPaymentGateway::new();
        let checkout = gateway
            .create_checkout("booking_abc12345", Money::from_lira(350))
            .await
            .unwrap();
        assert_eq!(checkout.payment_url, "/api/payments/simulate/booking_abc12345");
    }

    #[tokio::test]
    async fn mock_refund_returns_reference() {
        let gateway = MockPaymentGateway::new();
        let reference = gateway
            .refund("booking_abc12345", Money::from_lira(350))
            .await
            .unwrap();
        assert!(reference.starts_with("mock_refund_"));
    }
}
