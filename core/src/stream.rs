//! Event stream identification and versioning types.
//!
//! Strong types for event stream identification (`StreamId`) and version
//! control (`Version`) used in event sourcing. The version number is the
//! compare-and-swap token for optimistic concurrency: appends that carry a
//! stale expected version are rejected by the event store.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Error type for `StreamId` parsing.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid stream ID: {0}")]
pub struct ParseStreamIdError(String);

/// Unique identifier for an event stream (aggregate instance).
///
/// A stream ID uniquely identifies a single aggregate instance in the event
/// store, for example:
/// - `"bookings"` - the booking ledger
/// - `"fields"` - the field registry
/// - `"payments"` - the payment coordinator
///
/// # Validation
///
/// - `FromStr::from_str()`: Validates input (rejects empty strings)
/// - `From::from()` and `new()`: No validation (for internal use with trusted input)
///
/// Use `FromStr` when parsing external input; use `new()` or `From` when
/// constructing stream IDs from application-controlled data.
///
/// # Examples
///
/// ```
/// use sahabul_core::stream::StreamId;
///
/// let stream_id = StreamId::new("bookings");
/// assert_eq!(stream_id.as_str(), "bookings");
///
/// let parsed: StreamId = "fields".parse().unwrap();
/// assert_eq!(parsed, StreamId::new("fields"));
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StreamId(String);

impl StreamId {
    /// Create a new `StreamId` from a string.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the stream ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Convert the `StreamId` into its inner `String`.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for StreamId {
    type Err = ParseStreamIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(ParseStreamIdError("Stream ID cannot be empty".to_string()));
        }
        Ok(Self(s.to_string()))
    }
}

impl From<String> for StreamId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for StreamId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl AsRef<str> for StreamId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Event version number for optimistic concurrency control.
///
/// Versions start at 0 (empty stream) and increment by 1 for each event
/// appended. When appending, the caller states the version it believes the
/// stream to be at; a mismatch means another writer got there first and the
/// append fails with a concurrency conflict instead of silently losing the
/// other writer's events.
///
/// # Examples
///
/// ```
/// use sahabul_core::stream::Version;
///
/// let v0 = Version::INITIAL;
/// let v1 = v0.next();
/// assert_eq!(v1, Version::new(1));
/// assert_eq!(v1.value(), 1);
/// ```
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Version(u64);

impl Version {
    /// The initial version (0) for a new event stream.
    pub const INITIAL: Self = Self(0);

    /// Create a new `Version` with the given value.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Get the version number.
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }

    /// Get the next version (current + 1).
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }

    /// Advance the version by `count` events.
    #[must_use]
    pub const fn advance(self, count: u64) -> Self {
        Self(self.0 + count)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for Version {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stream_id_roundtrip() {
        let id = StreamId::new("bookings");
        assert_eq!(id.as_str(), "bookings");
        assert_eq!(id.to_string(), "bookings");
        assert_eq!(id.clone().into_inner(), "bookings");
    }

    #[test]
    fn stream_id_rejects_empty_on_parse() {
        let result: Result<StreamId, _> = "".parse();
        assert!(result.is_err());
    }

    #[test]
    fn version_advances() {
        let v = Version::INITIAL;
        assert_eq!(v.next(), Version::new(1));
        assert_eq!(v.advance(3), Version::new(3));
        assert!(Version::new(2) < Version::new(3));
    }
}
