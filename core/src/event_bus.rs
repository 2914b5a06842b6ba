//! Event bus abstraction for cross-aggregate communication.
//!
//! Events flow from the event store (source of truth) through the event bus
//! to enable saga coordination between the booking ledger, the payment
//! coordinator, and read models.
//!
//! # Key Principles
//!
//! - **Store first**: events are persisted to the event store before publishing
//! - **At-least-once delivery**: events may be delivered multiple times
//! - **Idempotency**: subscribers must absorb duplicates (the payment
//!   coordinator's callback handling is the canonical example)
//! - **Ordered within a topic**: events from the same aggregate keep order
//!
//! # Topic Naming Convention
//!
//! Topics follow the pattern `{aggregate}-events`:
//! - `booking-events` - events from the booking ledger
//! - `payment-events` - events from the payment coordinator
//! - `field-events` - events from the field registry
//!
//! # Implementations
//!
//! [`BroadcastEventBus`] is the in-process implementation used by the
//! service; the trait keeps the seam so a broker-backed bus can be swapped
//! in without touching reducers.

use crate::event::SerializedEvent;
use futures::Stream;
use futures::StreamExt;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;
use thiserror::Error;
use tokio::sync::broadcast;

/// Errors that can occur during event bus operations.
#[derive(Error, Debug, Clone)]
pub enum EventBusError {
    /// Failed to publish an event to a topic
    #[error("Publish failed for topic '{topic}': {reason}")]
    PublishFailed {
        /// The topic that failed
        topic: String,
        /// The reason for failure
        reason: String,
    },

    /// Failed to subscribe to topics
    #[error("Subscription failed for topics {topics:?}: {reason}")]
    SubscriptionFailed {
        /// The topics that failed to subscribe
        topics: Vec<String>,
        /// The reason for failure
        reason: String,
    },

    /// Failed to deserialize an event
    #[error("Deserialization failed: {0}")]
    DeserializationFailed(String),

    /// Generic error for other failures
    #[error("Event bus error: {0}")]
    Other(String),
}

/// Stream of events from subscriptions.
///
/// Each item is a `Result` that may contain an event or an error.
pub type EventStream = Pin<Box<dyn Stream<Item = Result<SerializedEvent, EventBusError>> + Send>>;

/// Trait for event bus implementations.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync` to support concurrent access from
/// multiple reducers and effect executors.
///
/// # Dyn Compatibility
///
/// Uses explicit `Pin<Box<dyn Future>>` returns instead of `async fn` to
/// enable trait-object usage (`Arc<dyn EventBus>`) inside effects.
pub trait EventBus: Send + Sync {
    /// Publish an event to a topic.
    ///
    /// Publishing succeeds even when no subscriber is currently attached;
    /// delivery is at-least-once for attached subscribers, so they must be
    /// idempotent.
    ///
    /// # Errors
    ///
    /// Returns [`EventBusError::PublishFailed`] if the publish operation
    /// fails.
    fn publish(
        &self,
        topic: &str,
        event: &SerializedEvent,
    ) -> Pin<Box<dyn Future<Output = Result<(), EventBusError>> + Send + '_>>;

    /// Subscribe to one or more topics and receive a merged stream of
    /// events.
    ///
    /// # Errors
    ///
    /// Returns [`EventBusError::SubscriptionFailed`] if subscription fails.
    fn subscribe(
        &self,
        topics: &[&str],
    ) -> Pin<Box<dyn Future<Output = Result<EventStream, EventBusError>> + Send + '_>>;
}

/// In-process event bus backed by tokio broadcast channels, one per topic.
///
/// Suitable for a single-process deployment of the booking service: every
/// subscriber receives every event published on its topics after the
/// moment of subscription. A slow subscriber that lags beyond the channel
/// capacity skips the overwritten events (they remain durable in the event
/// store).
pub struct BroadcastEventBus {
    topics: Mutex<HashMap<String, broadcast::Sender<SerializedEvent>>>,
    capacity: usize,
}

impl BroadcastEventBus {
    /// Default per-topic channel capacity.
    pub const DEFAULT_CAPACITY: usize = 256;

    /// Create a bus with the default per-topic capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(Self::DEFAULT_CAPACITY)
    }

    /// Create a bus with a custom per-topic capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            topics: Mutex::new(HashMap::new()),
            capacity,
        }
    }

    /// Get or create the broadcast sender for a topic.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned, which only happens after a
    /// panic while holding the lock.
    #[allow(clippy::expect_used)] // Poisoned lock means an earlier panic already broke the process
    fn sender_for(&self, topic: &str) -> broadcast::Sender<SerializedEvent> {
        let mut topics = self.topics.lock().expect("event bus lock poisoned");
        topics
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .clone()
    }
}

impl Default for BroadcastEventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus for BroadcastEventBus {
    fn publish(
        &self,
        topic: &str,
        event: &SerializedEvent,
    ) -> Pin<Box<dyn Future<Output = Result<(), EventBusError>> + Send + '_>> {
        let sender = self.sender_for(topic);
        let event = event.clone();
        Box::pin(async move {
            // A send error only means there is no active receiver; the event
            // is already durable in the event store, so this is not a failure.
            let _ = sender.send(event);
            Ok(())
        })
    }

    fn subscribe(
        &self,
        topics: &[&str],
    ) -> Pin<Box<dyn Future<Output = Result<EventStream, EventBusError>> + Send + '_>> {
        let receivers: Vec<broadcast::Receiver<SerializedEvent>> = topics
            .iter()
            .map(|topic| self.sender_for(topic).subscribe())
            .collect();

        Box::pin(async move {
            let streams = receivers.into_iter().map(|rx| {
                futures::stream::unfold(rx, |mut rx| async move {
                    match rx.recv().await {
                        Ok(event) => Some((Ok(event), rx)),
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            // Overwritten events stay durable in the event
                            // store; report the gap and keep the stream open.
                            Some((
                                Err(EventBusError::Other(format!(
                                    "subscriber lagged, {skipped} events skipped"
                                ))),
                                rx,
                            ))
                        },
                        Err(broadcast::error::RecvError::Closed) => None,
                    }
                })
                .boxed()
            });

            let merged: EventStream = Box::pin(futures::stream::select_all(streams));
            Ok(merged)
        })
    }
}
