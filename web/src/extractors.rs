//! Custom Axum extractors.
//!
//! - [`BearerToken`]: token from the `Authorization: Bearer <token>` header
//! - [`CorrelationId`]: request correlation ID, extracted or generated
//!
//! # Examples
//!
//! ```ignore
//! use sahabul_web::extractors::{BearerToken, CorrelationId};
//!
//! async fn handler(
//!     BearerToken(token): BearerToken,
//!     correlation_id: CorrelationId,
//! ) -> Result<Json<Response>, AppError> {
//!     tracing::info!(correlation_id = %correlation_id.0, "Processing request");
//!     // verify token, handle request
//! }
//! ```

use crate::error::AppError;
use axum::{
    async_trait,
    extract::FromRequestParts,
    http::request::Parts,
};
use uuid::Uuid;

/// Bearer token extracted from the `Authorization: Bearer <token>` header.
///
/// Extraction fails with 401 when the header is missing or malformed;
/// token *verification* is the caller's job (the service injects a session
/// verifier for that).
#[derive(Debug, Clone)]
pub struct BearerToken(pub String);

#[async_trait]
impl<S> FromRequestParts<S> for BearerToken
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| AppError::unauthorized("Missing authorization header"))?;

        let token = auth_header.strip_prefix("Bearer ").ok_or_else(|| {
            AppError::unauthorized("Invalid authorization format. Expected 'Bearer <token>'")
        })?;

        if token.is_empty() {
            return Err(AppError::unauthorized("Empty bearer token"));
        }

        Ok(Self(token.to_string()))
    }
}

/// Correlation ID for request tracing.
///
/// Extracts the correlation ID from the `X-Correlation-ID` header, or
/// generates a new UUID v4 if not present.
#[derive(Debug, Clone, Copy)]
pub struct CorrelationId(pub Uuid);

#[async_trait]
impl<S> FromRequestParts<S> for CorrelationId
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let correlation_id = parts
            .headers
            .get("X-Correlation-ID")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| Uuid::parse_str(s).ok())
            .unwrap_or_else(Uuid::new_v4);

        Ok(Self(correlation_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts_with_headers(headers: &[(&str, &str)]) -> Parts {
        let mut builder = Request::builder().uri("/");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        #[allow(clippy::unwrap_used)] // Test construction
        let (parts, ()) = builder.body(()).unwrap().into_parts();
        parts
    }

    #[tokio::test]
    async fn bearer_token_extracts_token() {
        let mut parts = parts_with_headers(&[("authorization", "Bearer abc123")]);
        #[allow(clippy::unwrap_used)] // Test assertion
        let BearerToken(token) = BearerToken::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(token, "abc123");
    }

    #[tokio::test]
    async fn bearer_token_rejects_missing_header() {
        let mut parts = parts_with_headers(&[]);
        let result = BearerToken::from_request_parts(&mut parts, &()).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn bearer_token_rejects_wrong_scheme() {
        let mut parts = parts_with_headers(&[("authorization", "Basic abc123")]);
        let result = BearerToken::from_request_parts(&mut parts, &()).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn correlation_id_prefers_header() {
        let id = Uuid::new_v4();
        let mut parts = parts_with_headers(&[("X-Correlation-ID", &id.to_string())]);
        #[allow(clippy::unwrap_used)] // Infallible
        let CorrelationId(extracted) = CorrelationId::from_request_parts(&mut parts, &())
            .await
            .unwrap();
        assert_eq!(extracted, id);
    }

    #[tokio::test]
    async fn correlation_id_generates_when_missing() {
        let mut parts = parts_with_headers(&[]);
        #[allow(clippy::unwrap_used)] // Infallible
        let CorrelationId(extracted) = CorrelationId::from_request_parts(&mut parts, &())
            .await
            .unwrap();
        assert!(!extracted.is_nil());
    }
}
