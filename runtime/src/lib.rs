//! # Sahabul Runtime
//!
//! Store runtime for the sahabul booking platform.
//!
//! The [`Store`] owns an aggregate's state and serializes reducer execution:
//! any number of HTTP handlers and relay tasks may `send` actions
//! concurrently, but the reducer processes them one at a time against
//! consistent state. Effects returned by the reducer execute asynchronously
//! on the tokio runtime; actions they produce feed back into the store,
//! and every fed-back action is broadcast to observers so request handlers
//! can await their outcome (`send_and_wait_for`).
//!
//! ## Error handling strategy
//!
//! - **Reducer panics** propagate (fail fast) - reducers are pure functions
//!   and must not panic.
//! - **Effect failures** are retried per [`RetryPolicy`]; exhausted retries
//!   land in the [`DeadLetterQueue`] and are logged, other effects continue.

pub mod retry;

pub use retry::RetryPolicy;

use sahabul_core::effect::{Effect, EventBusOperation, EventStoreOperation};
use sahabul_core::reducer::Reducer;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{RwLock, broadcast, watch};

/// Errors produced by the store runtime.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The store is shutting down and rejects new actions.
    #[error("Store is shutting down; action rejected")]
    ShutdownInProgress,

    /// Graceful shutdown timed out with effects still running.
    #[error("Shutdown timeout: {0} effects still running")]
    ShutdownTimeout(usize),

    /// `send_and_wait_for` timed out before a matching action arrived.
    #[error("Timed out waiting for a matching action")]
    Timeout,

    /// The action broadcast channel closed (store dropped mid-wait).
    #[error("Action broadcast channel closed")]
    ChannelClosed,
}

// ============================================================================
// Dead letter queue
// ============================================================================

/// A failed operation recorded after retries were exhausted.
#[derive(Debug, Clone)]
pub struct DeadLetter<T> {
    /// Operation name (e.g. "`append_events`")
    pub operation: String,
    /// The terminal error
    pub error: T,
    /// How many attempts were made
    pub attempts: usize,
}

/// Bounded in-memory queue of operations that exhausted their retries.
///
/// When full, the oldest entry is dropped to make room - the queue is a
/// diagnostic surface, not a durability mechanism (events are durable in
/// the event store regardless).
#[derive(Debug)]
pub struct DeadLetterQueue<T> {
    entries: Arc<Mutex<VecDeque<DeadLetter<T>>>>,
    max_size: usize,
}

impl<T> Clone for DeadLetterQueue<T> {
    fn clone(&self) -> Self {
        Self {
            entries: Arc::clone(&self.entries),
            max_size: self.max_size,
        }
    }
}

impl<T: Clone> DeadLetterQueue<T> {
    /// Create a queue holding at most `max_size` entries.
    #[must_use]
    pub fn new(max_size: usize) -> Self {
        Self {
            entries: Arc::new(Mutex::new(VecDeque::new())),
            max_size,
        }
    }

    /// Record a failed operation.
    #[allow(clippy::expect_used)] // Poisoned lock means an earlier panic already broke the process
    pub fn push(&self, operation: String, error: T, attempts: usize) {
        let mut entries = self.entries.lock().expect("DLQ lock poisoned");
        if entries.len() >= self.max_size {
            entries.pop_front();
        }
        entries.push_back(DeadLetter {
            operation,
            error,
            attempts,
        });
        metrics::counter!("store.dlq.pushed").increment(1);
    }

    /// Number of entries currently queued.
    #[must_use]
    #[allow(clippy::expect_used)] // Poisoned lock means an earlier panic already broke the process
    pub fn len(&self) -> usize {
        self.entries.lock().expect("DLQ lock poisoned").len()
    }

    /// Whether the queue is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Maximum capacity.
    #[must_use]
    pub const fn max_size(&self) -> usize {
        self.max_size
    }

    /// Snapshot of the queued entries.
    #[must_use]
    #[allow(clippy::expect_used)] // Poisoned lock means an earlier panic already broke the process
    pub fn entries(&self) -> Vec<DeadLetter<T>> {
        self.entries
            .lock()
            .expect("DLQ lock poisoned")
            .iter()
            .cloned()
            .collect()
    }
}

impl<T: Clone> Default for DeadLetterQueue<T> {
    fn default() -> Self {
        Self::new(100)
    }
}

// ============================================================================
// Store configuration
// ============================================================================

/// Configuration for a [`Store`].
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Retry policy for effect operations
    pub retry_policy: RetryPolicy,
    /// Dead letter queue capacity
    pub dlq_max_size: usize,
    /// Action broadcast channel capacity
    pub broadcast_capacity: usize,
}

impl StoreConfig {
    /// Override the retry policy.
    #[must_use]
    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    /// Override the DLQ capacity.
    #[must_use]
    pub const fn with_dlq_max_size(mut self, max_size: usize) -> Self {
        self.dlq_max_size = max_size;
        self
    }

    /// Override the broadcast capacity. Increase when many slow observers
    /// (`WebSocket` fan-out, busy request handlers) subscribe.
    #[must_use]
    pub const fn with_broadcast_capacity(mut self, capacity: usize) -> Self {
        self.broadcast_capacity = capacity;
        self
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            retry_policy: RetryPolicy::default(),
            dlq_max_size: 100,
            broadcast_capacity: 64,
        }
    }
}

// ============================================================================
// Effect tracking
// ============================================================================

/// Shared completion tracking for the effects of one `send` call.
#[derive(Clone)]
struct EffectTracking {
    counter: Arc<AtomicUsize>,
    notifier: watch::Sender<()>,
}

impl EffectTracking {
    fn new() -> (Self, watch::Receiver<()>) {
        let (notifier, receiver) = watch::channel(());
        (
            Self {
                counter: Arc::new(AtomicUsize::new(0)),
                notifier,
            },
            receiver,
        )
    }

    fn increment(&self) {
        self.counter.fetch_add(1, Ordering::SeqCst);
    }

    fn decrement(&self) {
        if self.counter.fetch_sub(1, Ordering::SeqCst) == 1 {
            let _ = self.notifier.send(());
        }
    }
}

/// Decrements tracking on drop so panicking effects still complete the
/// handle.
struct DecrementGuard(EffectTracking);

impl Drop for DecrementGuard {
    fn drop(&mut self) {
        self.0.decrement();
    }
}

/// Decrements the store's global pending-effect counter on drop.
struct PendingGuard(Arc<AtomicUsize>);

impl Drop for PendingGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Handle returned by [`Store::send`] to await effect completion.
///
/// `send` returns after *starting* effect execution; use the handle when a
/// caller needs the effects themselves (persistence, publishes) to finish.
pub struct EffectHandle {
    counter: Arc<AtomicUsize>,
    receiver: watch::Receiver<()>,
}

impl EffectHandle {
    /// Wait until all effects spawned by the originating `send` completed.
    pub async fn wait(mut self) {
        while self.counter.load(Ordering::SeqCst) > 0 {
            if self.receiver.changed().await.is_err() {
                break;
            }
        }
    }

    /// Wait with a timeout.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Timeout`] if effects are still running when the
    /// timeout expires.
    pub async fn wait_with_timeout(self, timeout: Duration) -> Result<(), StoreError> {
        tokio::time::timeout(timeout, self.wait())
            .await
            .map_err(|_| StoreError::Timeout)
    }
}

// ============================================================================
// Store
// ============================================================================

/// The Store - owns aggregate state and runs the reducer/effect loop.
///
/// # Type Parameters
///
/// - `S`: State type
/// - `A`: Action type
/// - `E`: Environment type
/// - `R`: Reducer implementation
///
/// # Concurrency
///
/// - The reducer executes synchronously while holding a write lock, so
///   concurrent `send` calls serialize at the reducer - this is what makes
///   the booking ledger's check-and-reserve indivisible in-process.
/// - Effects execute asynchronously in spawned tasks and may complete in
///   any order.
///
/// # Example
///
/// ```ignore
/// let store = Store::new(LedgerState::new(), LedgerReducer::new(), env);
///
/// let outcome = store.send_and_wait_for(
///     LedgerAction::CreateBooking { .. },
///     |a| matches!(a, LedgerAction::BookingCreated { .. } | LedgerAction::BookingRejected { .. }),
///     Duration::from_secs(10),
/// ).await?;
/// ```
pub struct Store<S, A, E, R>
where
    R: Reducer<State = S, Action = A, Environment = E>,
{
    state: Arc<RwLock<S>>,
    reducer: R,
    environment: E,
    retry_policy: RetryPolicy,
    dlq: DeadLetterQueue<String>,
    shutdown: Arc<AtomicBool>,
    pending_effects: Arc<AtomicUsize>,
    /// All actions produced by effects are broadcast to observers. This is
    /// what enables HTTP request-response over the async pipeline.
    action_broadcast: broadcast::Sender<A>,
}

impl<S, A, E, R> Clone for Store<S, A, E, R>
where
    R: Reducer<State = S, Action = A, Environment = E> + Clone,
    E: Clone,
{
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            reducer: self.reducer.clone(),
            environment: self.environment.clone(),
            retry_policy: self.retry_policy.clone(),
            dlq: self.dlq.clone(),
            shutdown: Arc::clone(&self.shutdown),
            pending_effects: Arc::clone(&self.pending_effects),
            action_broadcast: self.action_broadcast.clone(),
        }
    }
}

impl<S, A, E, R> Store<S, A, E, R>
where
    R: Reducer<State = S, Action = A, Environment = E> + Clone + Send + Sync + 'static,
    A: Send + Clone + 'static,
    S: Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    /// Create a store with default configuration.
    #[must_use]
    pub fn new(initial_state: S, reducer: R, environment: E) -> Self {
        Self::with_config(initial_state, reducer, environment, StoreConfig::default())
    }

    /// Create a store with custom configuration.
    #[must_use]
    pub fn with_config(initial_state: S, reducer: R, environment: E, config: StoreConfig) -> Self {
        let (action_broadcast, _) = broadcast::channel(config.broadcast_capacity);

        Self {
            state: Arc::new(RwLock::new(initial_state)),
            reducer,
            environment,
            retry_policy: config.retry_policy,
            dlq: DeadLetterQueue::new(config.dlq_max_size),
            shutdown: Arc::new(AtomicBool::new(false)),
            pending_effects: Arc::new(AtomicUsize::new(0)),
            action_broadcast,
        }
    }

    /// Access the dead letter queue for inspection.
    #[must_use]
    pub fn dlq(&self) -> DeadLetterQueue<String> {
        self.dlq.clone()
    }

    /// Send an action to the store.
    ///
    /// 1. Acquires the write lock on state
    /// 2. Runs the reducer with (state, action, environment)
    /// 3. Executes returned effects asynchronously
    /// 4. Effects may produce more actions (feedback loop)
    ///
    /// Returns after *starting* effect execution; the returned
    /// [`EffectHandle`] can be awaited for completion.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ShutdownInProgress`] if the store is shutting
    /// down.
    pub async fn send(&self, action: A) -> Result<EffectHandle, StoreError> {
        if self.shutdown.load(Ordering::Acquire) {
            metrics::counter!("store.actions.rejected").increment(1);
            return Err(StoreError::ShutdownInProgress);
        }

        metrics::counter!("store.actions.received").increment(1);

        let effects = {
            let mut state = self.state.write().await;
            self.reducer.reduce(&mut state, action, &self.environment)
        };

        let (tracking, receiver) = EffectTracking::new();
        let counter = Arc::clone(&tracking.counter);

        for effect in effects {
            self.execute_effect_internal(effect, tracking.clone());
        }

        Ok(EffectHandle { counter, receiver })
    }

    /// Send an action and wait for a matching result action.
    ///
    /// Designed for request-response over the async pipeline: subscribe to
    /// the action broadcast *before* sending (avoids the race where the
    /// outcome lands between send and subscribe), send the action, then
    /// return the first broadcast action matching the predicate.
    ///
    /// Use entity IDs inside the predicate to distinguish concurrent
    /// requests.
    ///
    /// # Errors
    ///
    /// - [`StoreError::Timeout`]: no matching action within `timeout`
    /// - [`StoreError::ChannelClosed`]: the store dropped mid-wait
    /// - [`StoreError::ShutdownInProgress`]: the store is shutting down
    pub async fn send_and_wait_for<F>(
        &self,
        action: A,
        predicate: F,
        timeout: Duration,
    ) -> Result<A, StoreError>
    where
        F: Fn(&A) -> bool,
    {
        let mut rx = self.action_broadcast.subscribe();

        self.send(action).await?;

        tokio::time::timeout(timeout, async {
            loop {
                match rx.recv().await {
                    Ok(action) if predicate(&action) => return Ok(action),
                    Ok(_) => {},
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        // Slow consumer; if the terminal action was among the
                        // dropped ones the timeout reports it.
                        tracing::warn!(skipped, "Action observer lagged");
                    },
                    Err(broadcast::error::RecvError::Closed) => {
                        return Err(StoreError::ChannelClosed);
                    },
                }
            }
        })
        .await
        .map_err(|_| StoreError::Timeout)?
    }

    /// Subscribe to all actions produced by effects of this store.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<A> {
        self.action_broadcast.subscribe()
    }

    /// Read current state via a closure.
    ///
    /// The closure runs under the read lock; keep it cheap and return owned
    /// data:
    ///
    /// ```ignore
    /// let open = store.state(|s| s.bookings.len()).await;
    /// ```
    pub async fn state<F, T>(&self, f: F) -> T
    where
        F: FnOnce(&S) -> T,
    {
        let state = self.state.read().await;
        f(&state)
    }

    /// Initiate graceful shutdown: reject new actions, wait for pending
    /// effects.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ShutdownTimeout`] if effects are still running
    /// when the timeout expires.
    pub async fn shutdown(&self, timeout: Duration) -> Result<(), StoreError> {
        tracing::info!("Initiating graceful shutdown");
        metrics::counter!("store.shutdown.initiated").increment(1);

        self.shutdown.store(true, Ordering::Release);

        let start = std::time::Instant::now();
        let poll_interval = Duration::from_millis(100);

        loop {
            let pending = self.pending_effects.load(Ordering::Acquire);

            if pending == 0 {
                tracing::info!("All effects completed, shutdown successful");
                metrics::counter!("store.shutdown.completed").increment(1);
                return Ok(());
            }

            if start.elapsed() >= timeout {
                tracing::error!(pending_effects = pending, "Shutdown timeout");
                metrics::counter!("store.shutdown.timeout").increment(1);
                return Err(StoreError::ShutdownTimeout(pending));
            }

            tokio::time::sleep(poll_interval).await;
        }
    }

    /// Retry an async operation according to the retry policy, pushing to
    /// the DLQ when exhausted.
    async fn retry_operation<F, Fut, T, Err>(&self, operation_name: &str, mut f: F) -> Result<T, Err>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, Err>>,
        Err: std::fmt::Display,
    {
        let mut attempt = 0;

        loop {
            match f().await {
                Ok(result) => {
                    if attempt > 0 {
                        metrics::counter!(
                            "store.retry.success",
                            "operation" => operation_name.to_string()
                        )
                        .increment(1);
                        tracing::info!(
                            operation = operation_name,
                            attempt,
                            "Operation succeeded after retry"
                        );
                    }
                    return Ok(result);
                },
                Err(error) => {
                    if !self.retry_policy.should_retry(attempt + 1) {
                        self.dlq.push(
                            operation_name.to_string(),
                            format!("{error}"),
                            (attempt + 1) as usize,
                        );

                        metrics::counter!(
                            "store.retry.exhausted",
                            "operation" => operation_name.to_string()
                        )
                        .increment(1);
                        tracing::error!(
                            operation = operation_name,
                            attempt,
                            error = %error,
                            "Operation failed after exhausting retries, added to DLQ"
                        );
                        return Err(error);
                    }

                    let delay = self.retry_policy.delay_for_attempt(attempt);
                    tracing::warn!(
                        operation = operation_name,
                        attempt,
                        delay_ms = delay.as_millis(),
                        error = %error,
                        "Operation failed, retrying after delay"
                    );

                    tokio::time::sleep(delay).await;
                    attempt += 1;
                },
            }
        }
    }

    /// Spawn a tracked effect task.
    ///
    /// Registers the effect with both the per-send tracking and the store's
    /// global pending counter, then runs `task` to completion. Guards ensure
    /// both counters are decremented even if the task panics.
    fn spawn_tracked<Fut>(&self, tracking: &EffectTracking, task: Fut)
    where
        Fut: Future<Output = ()> + Send + 'static,
    {
        tracking.increment();
        self.pending_effects.fetch_add(1, Ordering::SeqCst);

        let guard = DecrementGuard(tracking.clone());
        let pending_guard = PendingGuard(Arc::clone(&self.pending_effects));

        tokio::spawn(async move {
            let _guard = guard;
            let _pending_guard = pending_guard;
            task.await;
        });
    }

    /// Feed an action back into the reducer, then broadcast it.
    ///
    /// Reduce-before-broadcast gives observers read-your-writes
    /// consistency: a handler woken by the broadcast sees the
    /// post-transition state.
    async fn feed_back(&self, action: A) {
        let _ = Box::pin(self.send(action.clone())).await;
        let _ = self.action_broadcast.send(action);
    }

    /// Execute a single effect with completion tracking.
    #[allow(clippy::too_many_lines)] // One arm per effect variant
    fn execute_effect_internal(&self, effect: Effect<A>, tracking: EffectTracking) {
        match effect {
            Effect::None => {
                metrics::counter!("store.effects.executed", "type" => "none").increment(1);
            },
            Effect::Future(fut) => {
                metrics::counter!("store.effects.executed", "type" => "future").increment(1);
                let store = self.clone();
                self.spawn_tracked(&tracking, async move {
                    if let Some(action) = fut.await {
                        store.feed_back(action).await;
                    }
                });
            },
            Effect::Delay { duration, action } => {
                metrics::counter!("store.effects.executed", "type" => "delay").increment(1);
                let store = self.clone();
                self.spawn_tracked(&tracking, async move {
                    tokio::time::sleep(duration).await;
                    store.feed_back(*action).await;
                });
            },
            Effect::Parallel(effects) => {
                metrics::counter!("store.effects.executed", "type" => "parallel").increment(1);
                for effect in effects {
                    self.execute_effect_internal(effect, tracking.clone());
                }
            },
            Effect::Sequential(effects) => {
                metrics::counter!("store.effects.executed", "type" => "sequential").increment(1);
                let store = self.clone();
                self.spawn_tracked(&tracking, async move {
                    for effect in effects {
                        let (sub_tracking, mut sub_rx) = EffectTracking::new();
                        store.execute_effect_internal(effect, sub_tracking.clone());
                        // Wait for this effect before starting the next
                        if sub_tracking.counter.load(Ordering::SeqCst) > 0 {
                            let _ = sub_rx.changed().await;
                        }
                    }
                });
            },
            Effect::EventStore(op) => {
                metrics::counter!("store.effects.executed", "type" => "event_store").increment(1);
                let store = self.clone();
                self.spawn_tracked(&tracking, async move {
                    let action = store.run_event_store_op(op).await;
                    if let Some(action) = action {
                        store.feed_back(action).await;
                    }
                });
            },
            Effect::PublishEvent(op) => {
                metrics::counter!("store.effects.executed", "type" => "publish_event").increment(1);
                let store = self.clone();
                self.spawn_tracked(&tracking, async move {
                    let EventBusOperation::Publish {
                        event_bus,
                        topic,
                        event,
                        on_success,
                        on_error,
                    } = op;

                    tracing::debug!(topic = %topic, event_type = %event.event_type, "Publishing event");

                    let result = store
                        .retry_operation("publish", || {
                            let event_bus = Arc::clone(&event_bus);
                            let topic = topic.clone();
                            let event = event.clone();
                            async move { event_bus.publish(&topic, &event).await }
                        })
                        .await;

                    let action = match result {
                        Ok(()) => on_success(()),
                        Err(error) => {
                            tracing::warn!(topic = %topic, error = %error, "publish failed");
                            on_error(error)
                        },
                    };

                    if let Some(action) = action {
                        store.feed_back(action).await;
                    }
                });
            },
        }
    }

    /// Execute a single event-store operation with retry, returning the
    /// feedback action produced by its callback.
    async fn run_event_store_op(&self, op: EventStoreOperation<A>) -> Option<A> {
        match op {
            EventStoreOperation::AppendEvents {
                event_store,
                stream_id,
                expected_version,
                events,
                on_success,
                on_error,
            } => {
                tracing::debug!(
                    stream_id = %stream_id,
                    expected_version = ?expected_version,
                    event_count = events.len(),
                    "Executing append_events"
                );

                // A concurrency conflict is a definitive answer, not a
                // transient fault - surface it without retrying so the
                // reducer can roll back its optimistic hold.
                let result = event_store
                    .append_events(stream_id.clone(), expected_version, events)
                    .await;

                match result {
                    Ok(version) => {
                        tracing::debug!(new_version = %version, "append_events succeeded");
                        on_success(version)
                    },
                    Err(error) => {
                        tracing::warn!(stream_id = %stream_id, error = %error, "append_events failed");
                        on_error(error)
                    },
                }
            },
            EventStoreOperation::LoadEvents {
                event_store,
                stream_id,
                from_version,
                on_success,
                on_error,
            } => {
                let result = self
                    .retry_operation("load_events", || {
                        let event_store = Arc::clone(&event_store);
                        let stream_id = stream_id.clone();
                        async move { event_store.load_events(stream_id, from_version).await }
                    })
                    .await;

                match result {
                    Ok(events) => on_success(events),
                    Err(error) => on_error(error),
                }
            },
            EventStoreOperation::SaveSnapshot {
                event_store,
                stream_id,
                version,
                state,
                on_success,
                on_error,
            } => {
                let result = self
                    .retry_operation("save_snapshot", || {
                        let event_store = Arc::clone(&event_store);
                        let stream_id = stream_id.clone();
                        let state = state.clone();
                        async move { event_store.save_snapshot(stream_id, version, state).await }
                    })
                    .await;

                match result {
                    Ok(()) => on_success(()),
                    Err(error) => on_error(error),
                }
            },
            EventStoreOperation::LoadSnapshot {
                event_store,
                stream_id,
                on_success,
                on_error,
            } => {
                let result = self
                    .retry_operation("load_snapshot", || {
                        let event_store = Arc::clone(&event_store);
                        let stream_id = stream_id.clone();
                        async move { event_store.load_snapshot(stream_id).await }
                    })
                    .await;

                match result {
                    Ok(snapshot) => on_success(snapshot),
                    Err(error) => on_error(error),
                }
            },
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use sahabul_core::{SmallVec, smallvec};

    #[derive(Clone, Debug, Default)]
    struct TestState {
        count: i64,
        echoes: Vec<String>,
    }

    #[derive(Clone, Debug)]
    enum TestAction {
        Increment,
        EchoLater { message: String },
        Echoed { message: String },
        DelayedIncrement { after: Duration },
    }

    #[derive(Clone)]
    struct TestReducer;

    impl Reducer for TestReducer {
        type State = TestState;
        type Action = TestAction;
        type Environment = ();

        fn reduce(
            &self,
            state: &mut Self::State,
            action: Self::Action,
            _env: &Self::Environment,
        ) -> SmallVec<[Effect<Self::Action>; 4]> {
            match action {
                TestAction::Increment => {
                    state.count += 1;
                    SmallVec::new()
                },
                TestAction::EchoLater { message } => {
                    smallvec![Effect::Future(Box::pin(async move {
                        Some(TestAction::Echoed { message })
                    }))]
                },
                TestAction::Echoed { message } => {
                    state.echoes.push(message);
                    SmallVec::new()
                },
                TestAction::DelayedIncrement { after } => {
                    smallvec![Effect::Delay {
                        duration: after,
                        action: Box::new(TestAction::Increment),
                    }]
                },
            }
        }
    }

    fn test_store() -> Store<TestState, TestAction, (), TestReducer> {
        Store::new(TestState::default(), TestReducer, ())
    }

    #[tokio::test]
    async fn send_updates_state() {
        let store = test_store();
        store.send(TestAction::Increment).await.unwrap();
        assert_eq!(store.state(|s| s.count).await, 1);
    }

    #[tokio::test]
    async fn future_effect_feeds_back() {
        let store = test_store();
        let handle = store
            .send(TestAction::EchoLater {
                message: "merhaba".to_string(),
            })
            .await
            .unwrap();
        handle.wait_with_timeout(Duration::from_secs(5)).await.unwrap();
        // The fed-back action spawns no further effects, but its reducer run
        // happens inside the effect task before the handle completes.
        assert_eq!(store.state(|s| s.echoes.clone()).await, vec!["merhaba"]);
    }

    #[tokio::test]
    async fn send_and_wait_for_returns_matching_action() {
        let store = test_store();
        let result = store
            .send_and_wait_for(
                TestAction::EchoLater {
                    message: "sonuç".to_string(),
                },
                |a| matches!(a, TestAction::Echoed { .. }),
                Duration::from_secs(5),
            )
            .await
            .unwrap();

        assert!(matches!(result, TestAction::Echoed { message } if message == "sonuç"));
    }

    #[tokio::test]
    async fn delay_effect_dispatches_after_duration() {
        let store = test_store();
        let handle = store
            .send(TestAction::DelayedIncrement {
                after: Duration::from_millis(20),
            })
            .await
            .unwrap();
        handle.wait_with_timeout(Duration::from_secs(5)).await.unwrap();
        assert_eq!(store.state(|s| s.count).await, 1);
    }

    #[tokio::test]
    async fn shutdown_rejects_new_actions() {
        let store = test_store();
        store.shutdown(Duration::from_secs(1)).await.unwrap();
        let result = store.send(TestAction::Increment).await;
        assert!(matches!(result, Err(StoreError::ShutdownInProgress)));
    }

    #[tokio::test]
    async fn dlq_records_exhausted_operations() {
        let dlq: DeadLetterQueue<String> = DeadLetterQueue::new(2);
        dlq.push("op-a".to_string(), "boom".to_string(), 3);
        dlq.push("op-b".to_string(), "boom".to_string(), 3);
        dlq.push("op-c".to_string(), "boom".to_string(), 3);
        // Oldest dropped at capacity
        assert_eq!(dlq.len(), 2);
        let entries = dlq.entries();
        assert_eq!(entries[0].operation, "op-b");
        assert_eq!(entries[1].operation, "op-c");
    }
}
