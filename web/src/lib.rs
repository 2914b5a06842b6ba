//! # Sahabul Web
//!
//! Axum integration for the sahabul booking platform:
//!
//! - [`error::AppError`] - bridges domain errors to JSON HTTP responses
//!   with stable error codes
//! - [`extractors`] - bearer-token and correlation-id extractors shared by
//!   the service's handlers

pub mod error;
pub mod extractors;

pub use error::AppError;
