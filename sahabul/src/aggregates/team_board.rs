//! Team-search board aggregate.
//!
//! Classifieds for players looking for a team: create an ad, join it,
//! delete it. Joining is idempotent per user; only the creator (or an
//! admin) may delete. Deliberately shallow compared to the booking ledger.

use crate::types::{FieldId, Position, Principal, SearchId, TeamSearch, UserId};
use chrono::NaiveDate;
use sahabul_core::environment::Clock;
use sahabul_core::event::SerializedEvent;
use sahabul_core::event_bus::EventBus;
use sahabul_core::event_store::EventStore;
use sahabul_core::stream::{StreamId, Version};
use sahabul_core::{SmallVec, append_events, effect::Effect, publish_event, reducer::Reducer, smallvec};
use sahabul_macros::Action;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

/// Stream the board appends to.
pub const BOARD_STREAM: &str = "team-searches";

/// Topic the board publishes committed events on.
pub const BOARD_TOPIC: &str = "team-search-events";

/// Why a board command was rejected.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum BoardReject {
    /// No ad with the given id
    #[error("team search not found")]
    SearchNotFound,
    /// Only the creator may delete an ad
    #[error("only the creator can delete this search")]
    NotCreator,
    /// Request failed validation
    #[error("invalid team search: {0}")]
    Invalid(String),
    /// Persistence failed
    #[error("board event could not be persisted")]
    PersistenceFailed,
}

/// Listing filters for the board.
#[derive(Clone, Debug, Default)]
pub struct SearchFilter {
    /// Match date
    pub date: Option<NaiveDate>,
    /// Position sought
    pub position: Option<Position>,
    /// Planned field
    pub field_id: Option<FieldId>,
}

// ============================================================================
// Actions (Commands + Events)
// ============================================================================

/// Actions for the team-search board.
#[derive(Action, Clone, Debug, Serialize, Deserialize)]
pub enum BoardAction {
    // Commands
    /// Post a new ad
    #[command]
    CreateSearch {
        /// Pre-generated ad id
        search_id: SearchId,
        /// Posting user
        user_id: UserId,
        /// Planned field, if any
        field_id: Option<FieldId>,
        /// Match date
        date: NaiveDate,
        /// Match start hour
        hour: u8,
        /// Position sought
        position: Position,
        /// Free-text message
        message: String,
    },

    /// Join an ad (idempotent per user)
    #[command]
    JoinSearch {
        /// The ad to join
        search_id: SearchId,
        /// Joining user
        user_id: UserId,
    },

    /// Delete an ad (creator or admin)
    #[command]
    DeleteSearch {
        /// The ad to delete
        search_id: SearchId,
        /// Acting principal
        principal: Principal,
    },

    // Events
    /// Ad posted
    #[event]
    SearchCreated {
        /// The new ad
        search: TeamSearch,
    },

    /// A user joined an ad
    #[event]
    SearchJoined {
        /// The ad
        search_id: SearchId,
        /// The joining user
        user_id: UserId,
    },

    /// Ad deleted
    #[event]
    SearchDeleted {
        /// The deleted ad
        search_id: SearchId,
    },

    /// A command was rejected (broadcast to the caller, never persisted)
    #[event]
    BoardRejected {
        /// The ad the command addressed
        search_id: SearchId,
        /// Why it was rejected
        reason: BoardReject,
    },

    /// An append was accepted: apply, bump version, publish
    Committed {
        /// The persisted event
        event: Box<BoardAction>,
        /// New stream version
        version: Version,
    },
}

// ============================================================================
// State
// ============================================================================

/// Board state: the open ads.
#[derive(Clone, Debug, Default)]
pub struct BoardState {
    /// Ads by id
    pub searches: HashMap<SearchId, TeamSearch>,
    /// Persisted stream version
    pub version: Version,
    /// Last rejection, for diagnostics
    pub last_error: Option<String>,
}

impl BoardState {
    /// Empty board.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild state by replaying persisted events.
    #[must_use]
    pub fn rehydrate(events: &[SerializedEvent]) -> Self {
        let mut state = Self::new();
        for serialized in events {
            if let Ok(action) = serialized.decode::<BoardAction>() {
                BoardReducer::apply_event(&mut state, &action);
            }
        }
        state.version = Version::new(events.len() as u64);
        state
    }

    /// Filtered listing, newest first.
    #[must_use]
    pub fn list(&self, filter: &SearchFilter) -> Vec<TeamSearch> {
        let mut searches: Vec<TeamSearch> = self
            .searches
            .values()
            .filter(|s| filter.date.is_none_or(|d| s.date == d))
            .filter(|s| filter.position.is_none_or(|p| s.position == p))
            .filter(|s| filter.field_id.is_none_or(|f| s.field_id == Some(f)))
            .cloned()
            .collect();
        searches.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        searches
    }
}

// ============================================================================
// Environment
// ============================================================================

/// Environment dependencies for the board.
#[derive(Clone)]
pub struct BoardEnvironment {
    /// Clock for timestamps
    pub clock: Arc<dyn Clock>,
    /// Event store for persistence
    pub event_store: Arc<dyn EventStore>,
    /// Event bus for publishing
    pub event_bus: Arc<dyn EventBus>,
    /// Stream this board appends to
    pub stream_id: StreamId,
}

impl BoardEnvironment {
    /// Creates a new `BoardEnvironment`.
    #[must_use]
    pub fn new(
        clock: Arc<dyn Clock>,
        event_store: Arc<dyn EventStore>,
        event_bus: Arc<dyn EventBus>,
    ) -> Self {
        Self {
            clock,
            event_store,
            event_bus,
            stream_id: StreamId::new(BOARD_STREAM),
        }
    }
}

// ============================================================================
// Reducer
// ============================================================================

/// Reducer for the team-search board.
#[derive(Clone, Debug, Default)]
pub struct BoardReducer;

impl BoardReducer {
    /// Creates a new `BoardReducer`.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn serialize(action: &BoardAction) -> Option<SerializedEvent> {
        let data = bincode::serialize(action).ok()?;
        Some(SerializedEvent::new(
            action.event_type().to_string(),
            data,
            Some(serde_json::json!({ "aggregate": "team-search" })),
        ))
    }

    fn notify(action: BoardAction) -> Effect<BoardAction> {
        Effect::Future(Box::pin(async move { Some(action) }))
    }

    fn reject(search_id: SearchId, reason: BoardReject) -> SmallVec<[Effect<BoardAction>; 4]> {
        smallvec![Self::notify(BoardAction::BoardRejected { search_id, reason })]
    }

    fn commit(env: &BoardEnvironment, event: BoardAction, search_id: SearchId) -> SmallVec<[Effect<BoardAction>; 4]> {
        let Some(serialized) = Self::serialize(&event) else {
            return Self::reject(search_id, BoardReject::PersistenceFailed);
        };
        smallvec![append_events! {
            store: env.event_store,
            stream: env.stream_id.as_str(),
            expected_version: None,
            events: vec![serialized],
            on_success: |version| Some(BoardAction::Committed {
                event: Box::new(event),
                version,
            }),
            on_error: |error| {
                tracing::error!(error = %error, "Failed to persist board event");
                Some(BoardAction::BoardRejected {
                    search_id,
                    reason: BoardReject::PersistenceFailed,
                })
            }
        }]
    }

    /// Applies an event to state.
    pub(crate) fn apply_event(state: &mut BoardState, action: &BoardAction) {
        match action {
            BoardAction::SearchCreated { search } => {
                state.searches.insert(search.id, search.clone());
                state.last_error = None;
            }

            BoardAction::SearchJoined { search_id, user_id } => {
                if let Some(search) = state.searches.get_mut(search_id) {
                    search.participants.insert(*user_id);
                }
            }

            BoardAction::SearchDeleted { search_id } => {
                state.searches.remove(search_id);
            }

            BoardAction::BoardRejected { reason, .. } => {
                state.last_error = Some(reason.to_string());
            }

            _ => {}
        }
    }
}

impl Reducer for BoardReducer {
    type State = BoardState;
    type Action = BoardAction;
    type Environment = BoardEnvironment;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        match action {
            BoardAction::CreateSearch {
                search_id,
                user_id,
                field_id,
                date,
                hour,
                position,
                message,
            } => {
                if message.trim().is_empty() {
                    return Self::reject(
                        search_id,
                        BoardReject::Invalid("message is required".to_string()),
                    );
                }
                if hour > 23 {
                    return Self::reject(
                        search_id,
                        BoardReject::Invalid("hour must be 0-23".to_string()),
                    );
                }

                let search = TeamSearch {
                    id: search_id,
                    user_id,
                    field_id,
                    date,
                    hour,
                    position,
                    message,
                    participants: BTreeSet::new(),
                    created_at: env.clock.now(),
                };

                Self::commit(env, BoardAction::SearchCreated { search }, search_id)
            }

            BoardAction::JoinSearch { search_id, user_id } => {
                let Some(search) = state.searches.get(&search_id) else {
                    return Self::reject(search_id, BoardReject::SearchNotFound);
                };

                // Idempotent: joining twice is acknowledged without a second
                // participation record.
                if search.participants.contains(&user_id) {
                    return smallvec![Self::notify(BoardAction::SearchJoined {
                        search_id,
                        user_id,
                    })];
                }

                Self::commit(
                    env,
                    BoardAction::SearchJoined { search_id, user_id },
                    search_id,
                )
            }

            BoardAction::DeleteSearch {
                search_id,
                principal,
            } => {
                let Some(search) = state.searches.get(&search_id) else {
                    return Self::reject(search_id, BoardReject::SearchNotFound);
                };

                if search.user_id != principal.user_id && !principal.is_admin() {
                    return Self::reject(search_id, BoardReject::NotCreator);
                }

                Self::commit(env, BoardAction::SearchDeleted { search_id }, search_id)
            }

            // ========== Commit plumbing ==========
            BoardAction::Committed { event, version } => {
                Self::apply_event(state, &event);
                state.version = version;

                match Self::serialize(&event) {
                    Some(serialized) => smallvec![publish_event! {
                        bus: env.event_bus,
                        topic: BOARD_TOPIC,
                        event: serialized,
                        on_success: || None,
                        on_error: |error| {
                            tracing::warn!(error = %error, "Failed to publish board event");
                            None
                        }
                    }],
                    None => SmallVec::new(),
                }
            }

            event => {
                Self::apply_event(state, &event);
                SmallVec::new()
            }
        }
    }
}
