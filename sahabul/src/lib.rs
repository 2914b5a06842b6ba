//! # Sahabul
//!
//! Turf-field booking marketplace core: the availability calendar, the
//! booking ledger, payment coordination, and the team-search board,
//! exposed over HTTP.
//!
//! ## Architecture
//!
//! Event-sourced reducers behind [`sahabul_runtime::Store`]s:
//!
//! - [`aggregates::fields`] - field registry (registration, approval,
//!   photos, reviews)
//! - [`aggregates::booking`] - booking ledger (atomic slot
//!   check-and-reserve, pricing, 72-hour cancellation, completion sweep,
//!   loyalty crowns)
//! - [`aggregates::payment`] - payment coordinator (checkout, idempotent
//!   callbacks, timeout release, asynchronous refunds)
//! - [`aggregates::team_board`] - team-search classifieds
//!
//! The [`calendar`] module projects ledger occupancy into week grids;
//! [`bootstrap`] wires stores, the in-process event bus relays that tie
//! the aggregates together, and the completion sweeper; [`api`] and
//! [`server`] expose the HTTP surface.

pub mod aggregates;
pub mod api;
pub mod auth;
pub mod bootstrap;
pub mod calendar;
pub mod config;
pub mod payment_gateway;
pub mod server;
pub mod types;
