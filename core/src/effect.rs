//! Side-effect descriptions returned by reducers.
//!
//! Effects are NOT executed immediately. They are values describing what
//! should happen - persist these events, publish on this topic, dispatch
//! this action after a delay - and the `Store` runtime executes them
//! asynchronously, feeding any resulting actions back into the reducer.

use crate::event::SerializedEvent;
use crate::event_bus::{EventBus, EventBusError};
use crate::event_store::{EventStore, EventStoreError};
use crate::stream::{StreamId, Version};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

/// Callback turning an operation result into an optional feedback action.
type Callback<In, Action> = Box<dyn FnOnce(In) -> Option<Action> + Send>;

/// Effect type - describes a side effect to be executed by the runtime.
///
/// # Type Parameters
///
/// - `Action`: the action type effects can produce (feedback loop)
pub enum Effect<Action> {
    /// No-op effect
    None,

    /// Run effects concurrently
    Parallel(Vec<Effect<Action>>),

    /// Run effects in order, waiting for each to complete
    Sequential(Vec<Effect<Action>>),

    /// Delayed action (timeouts, payment expiry, retries)
    Delay {
        /// How long to wait
        duration: Duration,
        /// Action to dispatch after the delay
        action: Box<Action>,
    },

    /// Arbitrary async computation.
    ///
    /// Returns `Option<Action>` - if `Some`, the action is fed back into
    /// the reducer.
    Future(Pin<Box<dyn Future<Output = Option<Action>> + Send>>),

    /// Event store operation (append/load/snapshot) with feedback callbacks
    EventStore(EventStoreOperation<Action>),

    /// Event bus publish with feedback callbacks
    PublishEvent(EventBusOperation<Action>),
}

/// Event store operations carried by [`Effect::EventStore`].
///
/// Each operation captures the store, its inputs, and two callbacks that
/// map the outcome to an optional feedback action. The runtime wraps the
/// underlying call in its retry policy before invoking a callback.
pub enum EventStoreOperation<Action> {
    /// Append events with optimistic concurrency.
    AppendEvents {
        /// The event store to append to
        event_store: Arc<dyn EventStore>,
        /// Target stream
        stream_id: StreamId,
        /// Expected current version (`None` = unconditional)
        expected_version: Option<Version>,
        /// Events to persist
        events: Vec<SerializedEvent>,
        /// Called with the new stream version on success
        on_success: Callback<Version, Action>,
        /// Called with the store error on failure (incl. concurrency conflicts)
        on_error: Callback<EventStoreError, Action>,
    },

    /// Load events from a stream.
    LoadEvents {
        /// The event store to load from
        event_store: Arc<dyn EventStore>,
        /// Source stream
        stream_id: StreamId,
        /// First version to load (`None` = from the beginning)
        from_version: Option<Version>,
        /// Called with the loaded events on success
        on_success: Callback<Vec<SerializedEvent>, Action>,
        /// Called with the store error on failure
        on_error: Callback<EventStoreError, Action>,
    },

    /// Save a state snapshot.
    SaveSnapshot {
        /// The event store to save into
        event_store: Arc<dyn EventStore>,
        /// Stream the snapshot belongs to
        stream_id: StreamId,
        /// Version covered by the snapshot
        version: Version,
        /// Serialized aggregate state
        state: Vec<u8>,
        /// Called on success
        on_success: Callback<(), Action>,
        /// Called with the store error on failure
        on_error: Callback<EventStoreError, Action>,
    },

    /// Load the latest snapshot.
    LoadSnapshot {
        /// The event store to load from
        event_store: Arc<dyn EventStore>,
        /// Stream to look up
        stream_id: StreamId,
        /// Called with `Some((version, state))` or `None`
        on_success: Callback<Option<(Version, Vec<u8>)>, Action>,
        /// Called with the store error on failure
        on_error: Callback<EventStoreError, Action>,
    },
}

/// Event bus operations carried by [`Effect::PublishEvent`].
pub enum EventBusOperation<Action> {
    /// Publish an event on a topic.
    Publish {
        /// The bus to publish on
        event_bus: Arc<dyn EventBus>,
        /// Topic name (e.g. "booking-events")
        topic: String,
        /// The event to publish
        event: SerializedEvent,
        /// Called on success
        on_success: Callback<(), Action>,
        /// Called with the bus error on failure
        on_error: Callback<EventBusError, Action>,
    },
}

// Manual Debug implementations since futures and callbacks don't implement Debug
impl<Action> std::fmt::Debug for Effect<Action>
where
    Action: std::fmt::Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Effect::None => write!(f, "Effect::None"),
            Effect::Parallel(effects) => f.debug_tuple("Effect::Parallel").field(effects).finish(),
            Effect::Sequential(effects) => {
                f.debug_tuple("Effect::Sequential").field(effects).finish()
            },
            Effect::Delay { duration, action } => f
                .debug_struct("Effect::Delay")
                .field("duration", duration)
                .field("action", action)
                .finish(),
            Effect::Future(_) => write!(f, "Effect::Future(<future>)"),
            Effect::EventStore(op) => write!(f, "Effect::EventStore({op:?})"),
            Effect::PublishEvent(op) => write!(f, "Effect::PublishEvent({op:?})"),
        }
    }
}

impl<Action> std::fmt::Debug for EventStoreOperation<Action> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventStoreOperation::AppendEvents {
                stream_id,
                expected_version,
                events,
                ..
            } => f
                .debug_struct("AppendEvents")
                .field("stream_id", stream_id)
                .field("expected_version", expected_version)
                .field("event_count", &events.len())
                .finish_non_exhaustive(),
            EventStoreOperation::LoadEvents {
                stream_id,
                from_version,
                ..
            } => f
                .debug_struct("LoadEvents")
                .field("stream_id", stream_id)
                .field("from_version", from_version)
                .finish_non_exhaustive(),
            EventStoreOperation::SaveSnapshot {
                stream_id, version, ..
            } => f
                .debug_struct("SaveSnapshot")
                .field("stream_id", stream_id)
                .field("version", version)
                .finish_non_exhaustive(),
            EventStoreOperation::LoadSnapshot { stream_id, .. } => f
                .debug_struct("LoadSnapshot")
                .field("stream_id", stream_id)
                .finish_non_exhaustive(),
        }
    }
}

impl<Action> std::fmt::Debug for EventBusOperation<Action> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventBusOperation::Publish { topic, event, .. } => f
                .debug_struct("Publish")
                .field("topic", topic)
                .field("event_type", &event.event_type)
                .finish_non_exhaustive(),
        }
    }
}

impl<Action> Effect<Action> {
    /// Combine effects to run in parallel
    #[must_use]
    pub const fn merge(effects: Vec<Effect<Action>>) -> Effect<Action> {
        Effect::Parallel(effects)
    }

    /// Chain effects to run sequentially
    #[must_use]
    pub const fn chain(effects: Vec<Effect<Action>>) -> Effect<Action> {
        Effect::Sequential(effects)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Debug)]
    enum TestAction {
        Done,
    }

    #[test]
    fn merge_builds_parallel() {
        let effect: Effect<TestAction> = Effect::merge(vec![Effect::None, Effect::None]);
        assert!(matches!(effect, Effect::Parallel(v) if v.len() == 2));
    }

    #[test]
    fn chain_builds_sequential() {
        let effect: Effect<TestAction> = Effect::chain(vec![Effect::None]);
        assert!(matches!(effect, Effect::Sequential(v) if v.len() == 1));
    }

    #[test]
    fn debug_formats_delay() {
        let effect: Effect<TestAction> = Effect::Delay {
            duration: Duration::from_secs(30),
            action: Box::new(TestAction::Done),
        };
        let formatted = format!("{effect:?}");
        assert!(formatted.contains("Effect::Delay"));
    }
}
