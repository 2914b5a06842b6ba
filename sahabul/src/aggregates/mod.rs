//! Aggregates of the booking platform.
//!
//! - [`fields`] - field registry: registration, approval, photos, reviews
//! - [`booking`] - booking ledger: slot check-and-reserve, pricing,
//!   cancellation, completion sweep, loyalty crowns
//! - [`payment`] - payment coordinator: checkout, idempotent callbacks,
//!   timeout release, asynchronous refunds
//! - [`team_board`] - team-search classifieds

pub mod booking;
pub mod fields;
pub mod payment;
pub mod team_board;
