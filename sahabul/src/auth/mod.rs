//! Authentication: bearer-token verification and principal extraction.
//!
//! Session mechanics (issuing, storing, expiring tokens) belong to an
//! external auth collaborator; the booking core only needs to turn a
//! bearer token into an explicit [`Principal`] that is passed into every
//! operation. The [`SessionVerifier`] trait is that seam; the in-memory
//! implementation serves development and tests.

use crate::types::{Principal, Role, UserId};
use axum::async_trait;
use axum::extract::{FromRef, FromRequestParts};
use axum::http::request::Parts;
use sahabul_web::error::AppError;
use sahabul_web::extractors::BearerToken;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, RwLock};

/// Verifies bearer tokens against the external session system.
pub trait SessionVerifier: Send + Sync {
    /// Resolve a token to its principal, or `None` for unknown/expired
    /// tokens.
    fn verify(&self, token: &str) -> Pin<Box<dyn Future<Output = Option<Principal>> + Send + '_>>;
}

/// In-memory verifier for development and tests.
///
/// Tokens are registered explicitly (tests) or parsed from the
/// `DEV_SESSION_TOKENS` environment variable (`token:role` pairs,
/// comma-separated).
#[derive(Default)]
pub struct StaticSessionVerifier {
    tokens: RwLock<HashMap<String, Principal>>,
}

impl StaticSessionVerifier {
    /// Empty verifier.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a token for a principal; returns the principal.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned, which only happens after a
    /// panic while holding it.
    #[allow(clippy::expect_used)] // Poisoned lock means an earlier panic already broke the process
    pub fn register(&self, token: impl Into<String>, principal: Principal) -> Principal {
        self.tokens
            .write()
            .expect("verifier lock poisoned")
            .insert(token.into(), principal);
        principal
    }

    /// Build a verifier from `DEV_SESSION_TOKENS` (`token:role`, comma
    /// separated; roles: player, owner, admin). Unknown roles are skipped.
    #[must_use]
    pub fn from_env() -> Self {
        let verifier = Self::new();
        if let Ok(raw) = std::env::var("DEV_SESSION_TOKENS") {
            for entry in raw.split(',') {
                let Some((token, role)) = entry.split_once(':') else {
                    continue;
                };
                let role = match role.trim() {
                    "player" => Role::Player,
                    "owner" => Role::Owner,
                    "admin" => Role::Admin,
                    _ => continue,
                };
                verifier.register(token.trim(), Principal::new(UserId::new(), role));
                tracing::info!(role = ?role, "Registered dev session token");
            }
        }
        verifier
    }
}

impl SessionVerifier for StaticSessionVerifier {
    fn verify(&self, token: &str) -> Pin<Box<dyn Future<Output = Option<Principal>> + Send + '_>> {
        #[allow(clippy::expect_used)] // Poisoned lock means an earlier panic already broke the process
        let principal = self
            .tokens
            .read()
            .expect("verifier lock poisoned")
            .get(token)
            .copied();
        Box::pin(async move { principal })
    }
}

/// Authenticated principal extractor.
///
/// Extracts the bearer token, verifies it against the injected
/// [`SessionVerifier`], and hands the handler an explicit [`Principal`].
#[derive(Debug, Clone, Copy)]
pub struct SessionUser(pub Principal);

#[async_trait]
impl<S> FromRequestParts<S> for SessionUser
where
    S: Send + Sync,
    Arc<dyn SessionVerifier>: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let BearerToken(token) = BearerToken::from_request_parts(parts, state).await?;
        let verifier = Arc::<dyn SessionVerifier>::from_ref(state);

        let principal = verifier
            .verify(&token)
            .await
            .ok_or_else(|| AppError::unauthorized("Invalid or expired session token"))?;

        Ok(Self(principal))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn registered_token_verifies() {
        let verifier = StaticSessionVerifier::new();
        let principal = Principal::new(UserId::new(), Role::Player);
        verifier.register("tok-123", principal);

        assert_eq!(verifier.verify("tok-123").await, Some(principal));
        assert_eq!(verifier.verify("other").await, None);
    }
}
