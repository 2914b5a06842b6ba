//! # Sahabul Core
//!
//! Core traits and types for the sahabul booking platform.
//!
//! This crate provides the fundamental abstractions for building the
//! event-driven booking core using the Reducer pattern with CQRS and
//! Event Sourcing.
//!
//! ## Core Concepts
//!
//! - **State**: Domain state for an aggregate (ledger, registry, board)
//! - **Action**: All possible inputs to a reducer (commands and events)
//! - **Reducer**: Pure function `(State, Action, Environment) → (State, Effects)`
//! - **Effect**: Side-effect descriptions (not execution)
//! - **Environment**: Injected dependencies via traits
//!
//! ## Architecture Principles
//!
//! - Functional Core, Imperative Shell
//! - Unidirectional Data Flow
//! - Explicit Effects (no hidden I/O)
//! - Dependency Injection via Environment
//!
//! ## Example
//!
//! ```ignore
//! use sahabul_core::prelude::*;
//!
//! impl Reducer for LedgerReducer {
//!     type State = LedgerState;
//!     type Action = LedgerAction;
//!     type Environment = LedgerEnvironment;
//!
//!     fn reduce(
//!         &self,
//!         state: &mut LedgerState,
//!         action: LedgerAction,
//!         env: &LedgerEnvironment,
//!     ) -> SmallVec<[Effect<LedgerAction>; 4]> {
//!         match action {
//!             LedgerAction::CreateBooking { .. } => {
//!                 // validate, apply events, describe persistence effects
//!                 smallvec![]
//!             }
//!             _ => smallvec![],
//!         }
//!     }
//! }
//! ```

pub mod effect;
pub mod effect_macros;
pub mod event;
pub mod event_bus;
pub mod event_store;
pub mod stream;

// Re-export commonly used types
pub use chrono::{DateTime, Utc};
pub use serde::{Deserialize, Serialize};
pub use smallvec::{SmallVec, smallvec};

/// Reducer module - the core trait for business logic.
///
/// Reducers are pure functions: `(State, Action, Environment) → (State, Effects)`.
/// They contain all business logic and are deterministic and testable.
pub mod reducer {
    use crate::effect::Effect;
    use smallvec::SmallVec;

    /// The Reducer trait - core abstraction for business logic.
    ///
    /// # Type Parameters
    ///
    /// - `State`: The domain state this reducer operates on
    /// - `Action`: The action type this reducer processes
    /// - `Environment`: The injected dependencies this reducer needs
    ///
    /// # Contract
    ///
    /// `reduce` must be pure with respect to I/O: it validates the action,
    /// updates state in place, and returns *descriptions* of side effects.
    /// The runtime executes the effects; the reducer never performs I/O
    /// itself.
    ///
    /// # Example
    ///
    /// ```ignore
    /// impl Reducer for BoardReducer {
    ///     type State = BoardState;
    ///     type Action = BoardAction;
    ///     type Environment = BoardEnvironment;
    ///
    ///     fn reduce(
    ///         &self,
    ///         state: &mut BoardState,
    ///         action: BoardAction,
    ///         env: &BoardEnvironment,
    ///     ) -> SmallVec<[Effect<BoardAction>; 4]> {
    ///         match action {
    ///             BoardAction::CreateSearch { .. } => {
    ///                 // Business logic here
    ///                 smallvec![]
    ///             }
    ///             _ => smallvec![],
    ///         }
    ///     }
    /// }
    /// ```
    pub trait Reducer {
        /// The state type this reducer operates on
        type State;

        /// The action type this reducer processes
        type Action;

        /// The environment type with injected dependencies
        type Environment;

        /// Reduce an action into state changes and effects.
        ///
        /// This is a pure function that:
        /// 1. Validates the action
        /// 2. Updates state in place
        /// 3. Returns effect descriptions to be executed
        ///
        /// The `SmallVec` return keeps the common zero-to-four-effect case
        /// off the heap.
        fn reduce(
            &self,
            state: &mut Self::State,
            action: Self::Action,
            env: &Self::Environment,
        ) -> SmallVec<[Effect<Self::Action>; 4]>;
    }
}

/// Environment module - dependency injection traits.
///
/// All external dependencies are abstracted behind traits and injected
/// via the Environment parameter. This keeps reducers deterministic and
/// testable: tests inject fixed clocks and in-memory stores, production
/// injects the system clock and Postgres.
pub mod environment {
    use chrono::{DateTime, Utc};

    /// Clock trait - abstracts time operations for testability.
    ///
    /// # Examples
    ///
    /// ```
    /// use sahabul_core::environment::{Clock, SystemClock};
    ///
    /// let clock = SystemClock;
    /// let now = clock.now();
    /// assert!(now.timestamp() > 0);
    /// ```
    pub trait Clock: Send + Sync {
        /// Get the current time
        fn now(&self) -> DateTime<Utc>;
    }

    /// Production clock backed by the system clock.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct SystemClock;

    impl Clock for SystemClock {
        fn now(&self) -> DateTime<Utc> {
            Utc::now()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::effect::Effect;
    use super::reducer::Reducer;
    use smallvec::{SmallVec, smallvec};

    #[derive(Clone, Debug)]
    struct CounterState {
        count: i64,
    }

    #[derive(Clone, Debug)]
    enum CounterAction {
        Increment,
    }

    struct CounterReducer;

    impl Reducer for CounterReducer {
        type State = CounterState;
        type Action = CounterAction;
        type Environment = ();

        fn reduce(
            &self,
            state: &mut Self::State,
            action: Self::Action,
            _env: &Self::Environment,
        ) -> SmallVec<[Effect<Self::Action>; 4]> {
            match action {
                CounterAction::Increment => {
                    state.count += 1;
                    smallvec![Effect::None]
                }
            }
        }
    }

    #[test]
    fn reducer_updates_state_in_place() {
        let mut state = CounterState { count: 0 };
        let effects = CounterReducer.reduce(&mut state, CounterAction::Increment, &());
        assert_eq!(state.count, 1);
        assert_eq!(effects.len(), 1);
    }
}
