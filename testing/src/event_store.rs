//! In-memory event store for deterministic tests.
//!
//! Implements the same optimistic-concurrency contract as the Postgres
//! store: appends carry an expected version, a mismatch fails with
//! `ConcurrencyConflict` and writes nothing. The booking integration tests
//! rely on this to exercise the slot check-and-reserve path without a
//! database.

use sahabul_core::event::SerializedEvent;
use sahabul_core::event_store::{EventStore, EventStoreError};
use sahabul_core::stream::{StreamId, Version};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct Inner {
    streams: HashMap<StreamId, Vec<SerializedEvent>>,
    snapshots: HashMap<StreamId, (Version, Vec<u8>)>,
}

/// In-memory implementation of [`EventStore`].
///
/// Cheap to clone (shared state behind an `Arc`); all operations are
/// synchronous under a mutex, wrapped in ready futures.
///
/// # Example
///
/// ```
/// use sahabul_testing::InMemoryEventStore;
/// use sahabul_core::event_store::EventStore;
/// use sahabul_core::event::SerializedEvent;
/// use sahabul_core::stream::{StreamId, Version};
///
/// # tokio_test::block_on(async {
/// let store = InMemoryEventStore::new();
/// let event = SerializedEvent::new("BookingCreated.v1".into(), vec![1], None);
/// let version = store
///     .append_events(StreamId::new("bookings"), Some(Version::INITIAL), vec![event])
///     .await
///     .unwrap();
/// assert_eq!(version, Version::new(1));
/// # });
/// ```
#[derive(Clone, Default)]
pub struct InMemoryEventStore {
    inner: Arc<Mutex<Inner>>,
}

impl InMemoryEventStore {
    /// Create an empty in-memory event store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of events across all streams (test introspection).
    #[must_use]
    #[allow(clippy::expect_used)] // Poisoned lock means an earlier panic already broke the test
    pub fn total_events(&self) -> usize {
        let inner = self.inner.lock().expect("event store lock poisoned");
        inner.streams.values().map(Vec::len).sum()
    }

    /// Event types recorded for a stream, in order (test introspection).
    #[must_use]
    #[allow(clippy::expect_used)] // Poisoned lock means an earlier panic already broke the test
    pub fn event_types(&self, stream_id: &StreamId) -> Vec<String> {
        let inner = self.inner.lock().expect("event store lock poisoned");
        inner
            .streams
            .get(stream_id)
            .map(|events| events.iter().map(|e| e.event_type.clone()).collect())
            .unwrap_or_default()
    }
}

impl EventStore for InMemoryEventStore {
    fn append_events(
        &self,
        stream_id: StreamId,
        expected_version: Option<Version>,
        events: Vec<SerializedEvent>,
    ) -> Pin<Box<dyn Future<Output = Result<Version, EventStoreError>> + Send + '_>> {
        let inner = Arc::clone(&self.inner);
        Box::pin(async move {
            #[allow(clippy::expect_used)] // Poisoned lock means an earlier panic already broke the test
            let mut inner = inner.lock().expect("event store lock poisoned");
            let stream = inner.streams.entry(stream_id.clone()).or_default();
            let current = Version::new(stream.len() as u64);

            if let Some(expected) = expected_version {
                if expected != current {
                    return Err(EventStoreError::ConcurrencyConflict {
                        stream_id,
                        expected,
                        actual: current,
                    });
                }
            }

            stream.extend(events);
            Ok(Version::new(stream.len() as u64))
        })
    }

    fn load_events(
        &self,
        stream_id: StreamId,
        from_version: Option<Version>,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<SerializedEvent>, EventStoreError>> + Send + '_>>
    {
        let inner = Arc::clone(&self.inner);
        Box::pin(async move {
            #[allow(clippy::expect_used)] // Poisoned lock means an earlier panic already broke the test
            let inner = inner.lock().expect("event store lock poisoned");
            let events = inner.streams.get(&stream_id).cloned().unwrap_or_default();

            let skip = from_version.map_or(0, |v| v.value().saturating_sub(1) as usize);
            Ok(events.into_iter().skip(skip).collect())
        })
    }

    fn save_snapshot(
        &self,
        stream_id: StreamId,
        version: Version,
        state: Vec<u8>,
    ) -> Pin<Box<dyn Future<Output = Result<(), EventStoreError>> + Send + '_>> {
        let inner = Arc::clone(&self.inner);
        Box::pin(async move {
            #[allow(clippy::expect_used)] // Poisoned lock means an earlier panic already broke the test
            let mut inner = inner.lock().expect("event store lock poisoned");
            inner.snapshots.insert(stream_id, (version, state));
            Ok(())
        })
    }

    fn load_snapshot(
        &self,
        stream_id: StreamId,
    ) -> Pin<Box<dyn Future<Output = Result<Option<(Version, Vec<u8>)>, EventStoreError>> + Send + '_>>
    {
        let inner = Arc::clone(&self.inner);
        Box::pin(async move {
            #[allow(clippy::expect_used)] // Poisoned lock means an earlier panic already broke the test
            let inner = inner.lock().expect("event store lock poisoned");
            Ok(inner.snapshots.get(&stream_id).cloned())
        })
    }
}
