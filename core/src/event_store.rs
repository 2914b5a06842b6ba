//! Event store trait and related types for event sourcing.
//!
//! The `EventStore` trait is the durable write side of the platform: an
//! append-only log of event streams with optimistic concurrency control.
//! The booking ledger's slot mutual exclusion ultimately rests on this
//! contract - a stale expected version is rejected instead of overwriting
//! a concurrent writer's reservation.
//!
//! # Implementations
//!
//! - `PostgresEventStore` (in `sahabul-postgres`): production implementation
//! - `InMemoryEventStore` (in `sahabul-testing`): fast, deterministic testing
//!
//! # Example
//!
//! ```no_run
//! use sahabul_core::event_store::{EventStore, EventStoreError};
//! use sahabul_core::stream::{StreamId, Version};
//! use sahabul_core::event::SerializedEvent;
//!
//! async fn example<E: EventStore>(store: &E) -> Result<(), EventStoreError> {
//!     let stream_id = StreamId::new("bookings");
//!
//!     // Append events with optimistic concurrency
//!     let events = vec![/* ... */];
//!     let new_version = store.append_events(
//!         stream_id.clone(),
//!         Some(Version::INITIAL),  // Expected current version
//!         events,
//!     ).await?;
//!
//!     // Load events to reconstruct state
//!     let all_events = store.load_events(stream_id, None).await?;
//!
//!     Ok(())
//! }
//! ```

use crate::event::SerializedEvent;
use crate::stream::{StreamId, Version};
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Type alias for snapshot data: `(Version, Vec<u8>)`
type SnapshotData = (Version, Vec<u8>);

/// Errors that can occur during event store operations.
#[derive(Error, Debug)]
pub enum EventStoreError {
    /// Optimistic concurrency conflict: expected version doesn't match
    /// current version. Another process modified the stream concurrently.
    #[error("Concurrency conflict: expected version {expected}, found {actual}")]
    ConcurrencyConflict {
        /// The stream ID where the conflict occurred.
        stream_id: StreamId,
        /// The version we expected the stream to be at.
        expected: Version,
        /// The actual current version of the stream.
        actual: Version,
    },

    /// Stream not found in the event store.
    #[error("Stream not found: {0}")]
    StreamNotFound(StreamId),

    /// Database connection error.
    #[error("Database error: {0}")]
    DatabaseError(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// General I/O error.
    #[error("I/O error: {0}")]
    IoError(String),
}

/// Event store abstraction for storing and retrieving event streams.
///
/// An event store is a specialized database optimized for:
///
/// - Appending events to streams (immutable, append-only)
/// - Loading events for state reconstruction
/// - Optimistic concurrency control
/// - Snapshot support for performance
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync` to be safely shared across the
/// async runtime.
///
/// # Dyn Compatibility
///
/// This trait uses explicit `Pin<Box<dyn Future>>` returns instead of
/// `async fn` to enable trait-object usage (`Arc<dyn EventStore>`), which
/// the effect system requires when reducers capture the store in effects.
pub trait EventStore: Send + Sync {
    /// Append events to a stream with optimistic concurrency control.
    ///
    /// # Optimistic Concurrency
    ///
    /// - `Some(version)`: assert the stream is currently at this version
    /// - `None`: append unconditionally (no version check, use with caution)
    ///
    /// If the stream's current version doesn't match `expected_version`,
    /// the append fails with [`EventStoreError::ConcurrencyConflict`] and
    /// nothing is written.
    ///
    /// # Returns
    ///
    /// The new version after appending. A stream at version 5 receiving 3
    /// events returns `Version(8)`.
    ///
    /// # Errors
    ///
    /// - `ConcurrencyConflict`: version mismatch (concurrent modification)
    /// - `DatabaseError`: connection or query failed
    /// - `SerializationError`: failed to serialize events
    fn append_events(
        &self,
        stream_id: StreamId,
        expected_version: Option<Version>,
        events: Vec<SerializedEvent>,
    ) -> Pin<Box<dyn Future<Output = Result<Version, EventStoreError>> + Send + '_>>;

    /// Load events from a stream, oldest first.
    ///
    /// - `Some(version)`: load events from this version onwards (inclusive)
    /// - `None`: load all events from the beginning
    ///
    /// A missing stream yields an empty vector, not an error - new streams
    /// start empty.
    ///
    /// # Errors
    ///
    /// - `DatabaseError`: connection or query failed
    /// - `SerializationError`: failed to deserialize events
    fn load_events(
        &self,
        stream_id: StreamId,
        from_version: Option<Version>,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<SerializedEvent>, EventStoreError>> + Send + '_>>;

    /// Save a snapshot of aggregate state at `version`.
    ///
    /// Snapshots let an aggregate rebuild without replaying the full
    /// stream: load the latest snapshot, then replay events after its
    /// version.
    ///
    /// # Errors
    ///
    /// - `DatabaseError`: connection or query failed
    fn save_snapshot(
        &self,
        stream_id: StreamId,
        version: Version,
        state: Vec<u8>,
    ) -> Pin<Box<dyn Future<Output = Result<(), EventStoreError>> + Send + '_>>;

    /// Load the latest snapshot for a stream.
    ///
    /// Returns `Some((version, state))` if a snapshot exists, `None`
    /// otherwise. Events from `version` onwards complete the state.
    ///
    /// # Errors
    ///
    /// - `DatabaseError`: connection or query failed
    /// - `SerializationError`: failed to deserialize snapshot
    fn load_snapshot(
        &self,
        stream_id: StreamId,
    ) -> Pin<Box<dyn Future<Output = Result<Option<SnapshotData>, EventStoreError>> + Send + '_>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn concurrency_conflict_error_display() {
        let error = EventStoreError::ConcurrencyConflict {
            stream_id: StreamId::new("bookings"),
            expected: Version::new(5),
            actual: Version::new(7),
        };

        let display = format!("{error}");
        assert!(display.contains("expected version 5"));
        assert!(display.contains("found 7"));
    }

    #[test]
    fn stream_not_found_error_display() {
        let error = EventStoreError::StreamNotFound(StreamId::new("missing-stream"));
        let display = format!("{error}");
        assert!(display.contains("missing-stream"));
    }
}
