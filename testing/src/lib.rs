//! # Sahabul Testing
//!
//! Testing utilities and helpers for the sahabul booking platform.
//!
//! This crate provides:
//! - [`ReducerTest`] - fluent Given-When-Then harness for reducers
//! - [`assertions`] - effect assertion helpers
//! - [`mocks`] - deterministic environment implementations (`FixedClock`)
//! - [`InMemoryEventStore`] - event store with the same optimistic
//!   concurrency contract as the Postgres store, for hermetic tests
//!
//! ## Example
//!
//! ```ignore
//! use sahabul_testing::{ReducerTest, mocks::test_clock};
//!
//! ReducerTest::new(LedgerReducer::new())
//!     .with_env(test_environment())
//!     .given_state(LedgerState::new())
//!     .when_action(LedgerAction::CreateBooking { .. })
//!     .then_state(|state| assert_eq!(state.bookings.len(), 1))
//!     .run();
//! ```

pub mod event_store;

pub use event_store::InMemoryEventStore;
pub use mocks::{FixedClock, test_clock};
pub use reducer_test::{ReducerTest, assertions};

/// Mock implementations of environment traits.
pub mod mocks {
    use chrono::{DateTime, Utc};
    use sahabul_core::environment::Clock;

    /// Fixed clock for deterministic tests.
    ///
    /// Always returns the same time, making time-dependent rules (the
    /// 72-hour cancellation window, slot "past" classification) reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use sahabul_testing::mocks::FixedClock;
    /// use sahabul_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// assert_eq!(clock.now(), clock.now());
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time.
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Create a default fixed clock for tests (2025-06-01 12:00:00 UTC).
    ///
    /// # Panics
    ///
    /// Panics if the hardcoded timestamp fails to parse, which cannot
    /// happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(
            DateTime::parse_from_rfc3339("2025-06-01T12:00:00Z")
                .expect("hardcoded timestamp should always parse")
                .with_timezone(&Utc),
        )
    }
}
