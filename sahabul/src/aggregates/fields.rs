//! Field registry aggregate.
//!
//! Owner-facing registration, admin approval, photo management, and the
//! review flow. Unapproved fields never appear in public listings or
//! calendars; reviews count toward a field's rating only after approval.

use crate::types::{
    Field, FieldId, GeoPoint, MAX_FIELD_PHOTOS, Money, Principal, Review, ReviewId, UserId,
};
use chrono::{DateTime, Utc};
use sahabul_core::environment::Clock;
use sahabul_core::event::SerializedEvent;
use sahabul_core::event_bus::EventBus;
use sahabul_core::event_store::EventStore;
use sahabul_core::stream::{StreamId, Version};
use sahabul_core::{SmallVec, append_events, effect::Effect, publish_event, reducer::Reducer, smallvec};
use sahabul_macros::Action;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Stream the registry appends to.
pub const FIELD_STREAM: &str = "fields";

/// Topic the registry publishes committed events on.
pub const FIELD_TOPIC: &str = "field-events";

/// Why a registry command was rejected.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum RegistryReject {
    /// Only owners register fields
    #[error("only field owners can register fields")]
    NotAnOwner,
    /// Only admins approve fields and reviews
    #[error("admin role required")]
    NotAnAdmin,
    /// No field with the given id
    #[error("field not found")]
    FieldNotFound,
    /// Photo limit reached
    #[error("a field carries at most {MAX_FIELD_PHOTOS} photos")]
    TooManyPhotos,
    /// Cover index out of range
    #[error("cover photo index out of range")]
    BadCoverIndex,
    /// Request failed validation
    #[error("invalid field data: {0}")]
    Invalid(String),
    /// Reviews require a completed booking on the field
    #[error("a completed booking is required before reviewing")]
    NoCompletedBooking,
    /// No review with the given id
    #[error("review not found")]
    ReviewNotFound,
    /// Persistence failed
    #[error("registry event could not be persisted")]
    PersistenceFailed,
}

/// Owner-submitted field registration data, validated before it reaches
/// the registry.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FieldRegistration {
    /// Display name
    pub name: String,
    /// City
    pub city: String,
    /// Street address
    pub address: String,
    /// Geographic location
    pub location: GeoPoint,
    /// Hourly base price
    pub base_price_per_hour: Money,
    /// Optional 4-match subscription package price
    pub subscription_price_4_match: Option<Money>,
    /// Contact phone
    pub contact_phone: Option<String>,
    /// Tax number (10 digits when present)
    pub tax_number: Option<String>,
    /// Payout IBAN (TR-prefixed, 26 chars, when present)
    pub iban: Option<String>,
    /// Initial photo URLs
    pub photos: Vec<String>,
}

impl FieldRegistration {
    /// Validate the onboarding constraints.
    ///
    /// # Errors
    ///
    /// Returns `RegistryReject::Invalid` describing the first violated
    /// constraint.
    pub fn validate(&self) -> Result<(), RegistryReject> {
        if self.name.trim().len() < 3 {
            return Err(RegistryReject::Invalid(
                "name must be at least 3 characters".to_string(),
            ));
        }
        if self.city.trim().is_empty() {
            return Err(RegistryReject::Invalid("city is required".to_string()));
        }
        if self.address.trim().len() < 5 {
            return Err(RegistryReject::Invalid(
                "address must be at least 5 characters".to_string(),
            ));
        }
        if self.base_price_per_hour.is_zero() {
            return Err(RegistryReject::Invalid(
                "base price must be positive".to_string(),
            ));
        }
        if self.photos.len() > MAX_FIELD_PHOTOS {
            return Err(RegistryReject::Invalid(format!(
                "at most {MAX_FIELD_PHOTOS} photos"
            )));
        }
        if let Some(iban) = &self.iban {
            if !iban.starts_with("TR") || iban.len() != 26 {
                return Err(RegistryReject::Invalid(
                    "IBAN must start with TR and be 26 characters".to_string(),
                ));
            }
        }
        if let Some(tax_number) = &self.tax_number {
            if tax_number.len() != 10 || !tax_number.chars().all(|c| c.is_ascii_digit()) {
                return Err(RegistryReject::Invalid(
                    "tax number must be 10 digits".to_string(),
                ));
            }
        }
        Ok(())
    }
}

// ============================================================================
// Actions (Commands + Events)
// ============================================================================

/// Actions for the field registry.
#[derive(Action, Clone, Debug, Serialize, Deserialize)]
pub enum RegistryAction {
    // Commands
    /// Register a new field (owner role)
    #[command]
    RegisterField {
        /// Pre-generated field id
        field_id: FieldId,
        /// Acting principal
        principal: Principal,
        /// Validated registration data
        registration: FieldRegistration,
    },

    /// Approve a field for public listing (admin role)
    #[command]
    ApproveField {
        /// Field to approve
        field_id: FieldId,
        /// Acting principal
        principal: Principal,
    },

    /// Append a photo to a field
    #[command]
    AddPhoto {
        /// Target field
        field_id: FieldId,
        /// Acting principal (field owner or admin)
        principal: Principal,
        /// Photo URL
        url: String,
    },

    /// Choose the cover photo
    #[command]
    SetCoverPhoto {
        /// Target field
        field_id: FieldId,
        /// Acting principal (field owner or admin)
        principal: Principal,
        /// Index into the photo list
        index: usize,
    },

    /// Submit a review (completed-booking gate checked by the caller
    /// against the ledger before sending)
    #[command]
    SubmitReview {
        /// Pre-generated review id
        review_id: ReviewId,
        /// Reviewed field
        field_id: FieldId,
        /// Reviewing user
        user_id: UserId,
        /// Rating 1-5
        rating: u8,
        /// Comment text
        comment: String,
    },

    /// Approve a review so it counts toward the rating (admin role)
    #[command]
    ApproveReview {
        /// Review to approve
        review_id: ReviewId,
        /// Acting principal
        principal: Principal,
    },

    // Events
    /// Field registered (unapproved)
    #[event]
    FieldRegistered {
        /// The new field record
        field: Field,
    },

    /// Field approved for public listing
    #[event]
    FieldApproved {
        /// The approved field
        field_id: FieldId,
        /// Approval time
        approved_at: DateTime<Utc>,
    },

    /// Photo appended
    #[event]
    PhotoAdded {
        /// Target field
        field_id: FieldId,
        /// Photo URL
        url: String,
    },

    /// Cover photo chosen
    #[event]
    CoverPhotoSet {
        /// Target field
        field_id: FieldId,
        /// Index into the photo list
        index: usize,
    },

    /// Review submitted (pending approval)
    #[event]
    ReviewSubmitted {
        /// The new review
        review: Review,
    },

    /// Review approved; the field's rating absorbs it
    #[event]
    ReviewApproved {
        /// The approved review
        review_id: ReviewId,
    },

    /// A command was rejected (broadcast to the caller, never persisted)
    #[event]
    RegistryRejected {
        /// The entity the command addressed
        entity_id: String,
        /// Why it was rejected
        reason: RegistryReject,
    },

    /// An append was accepted: apply, bump version, publish
    Committed {
        /// The persisted event
        event: Box<RegistryAction>,
        /// New stream version
        version: Version,
    },
}

// ============================================================================
// State
// ============================================================================

/// Registry state: fields and reviews.
#[derive(Clone, Debug, Default)]
pub struct RegistryState {
    /// Fields by id
    pub fields: HashMap<FieldId, Field>,
    /// Reviews by id
    pub reviews: HashMap<ReviewId, Review>,
    /// Persisted stream version
    pub version: Version,
    /// Last rejection, for diagnostics
    pub last_error: Option<String>,
}

impl RegistryState {
    /// Empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild state by replaying persisted events.
    #[must_use]
    pub fn rehydrate(events: &[SerializedEvent]) -> Self {
        let mut state = Self::new();
        for serialized in events {
            if let Ok(action) = serialized.decode::<RegistryAction>() {
                RegistryReducer::apply_event(&mut state, &action);
            }
        }
        state.version = Version::new(events.len() as u64);
        state
    }

    /// Approved fields, optionally filtered by city (case-insensitive).
    #[must_use]
    pub fn approved_fields(&self, city: Option<&str>) -> Vec<Field> {
        let mut fields: Vec<Field> = self
            .fields
            .values()
            .filter(|f| f.approved)
            .filter(|f| {
                city.is_none_or(|wanted| f.city.eq_ignore_ascii_case(wanted))
            })
            .cloned()
            .collect();
        fields.sort_by(|a, b| a.name.cmp(&b.name));
        fields
    }

    /// Fields owned by a user.
    #[must_use]
    pub fn fields_of_owner(&self, owner_id: &UserId) -> Vec<Field> {
        self.fields
            .values()
            .filter(|f| f.owner_id == *owner_id)
            .cloned()
            .collect()
    }

    /// Approved reviews for a field, newest first.
    #[must_use]
    pub fn approved_reviews(&self, field_id: &FieldId) -> Vec<Review> {
        let mut reviews: Vec<Review> = self
            .reviews
            .values()
            .filter(|r| r.field_id == *field_id && r.approved)
            .cloned()
            .collect();
        reviews.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        reviews
    }
}

// ============================================================================
// Environment
// ============================================================================

/// Environment dependencies for the field registry.
#[derive(Clone)]
pub struct RegistryEnvironment {
    /// Clock for timestamps
    pub clock: Arc<dyn Clock>,
    /// Event store for persistence
    pub event_store: Arc<dyn EventStore>,
    /// Event bus for publishing
    pub event_bus: Arc<dyn EventBus>,
    /// Stream this registry appends to
    pub stream_id: StreamId,
}

impl RegistryEnvironment {
    /// Creates a new `RegistryEnvironment`.
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
            stream_id: StreamId::new(FIELD_STREAM),
        }
    }
}

// ============================================================================
// Reducer
// ============================================================================

/// Reducer for the field registry.
#[derive(Clone, Debug, Default)]
pub struct RegistryReducer;

impl RegistryReducer {
    /// Creates a new `RegistryReducer`.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn serialize(action: &RegistryAction) -> Option<SerializedEvent> {
        let data = bincode::serialize(action).ok()?;
        Some(SerializedEvent::new(
            action.event_type().to_string(),
            data,
            Some(serde_json::json!({ "aggregate": "field" })),
        ))
    }

    fn notify(action: RegistryAction) -> Effect<RegistryAction> {
        Effect::Future(Box::pin(async move { Some(action) }))
    }

    fn reject(
        entity_id: String,
        reason: RegistryReject,
    ) -> SmallVec<[Effect<RegistryAction>; 4]> {
        smallvec![Self::notify(RegistryAction::RegistryRejected {
            entity_id,
            reason,
        })]
    }

    /// Append one event unconditionally and route it through `Committed`.
    ///
    /// Registry writes are low-contention administrative operations; the
    /// reducer's serialized validation is the guard that matters here.
    fn commit(
        env: &RegistryEnvironment,
        event: RegistryAction,
        entity_id: String,
    ) -> SmallVec<[Effect<RegistryAction>; 4]> {
        let Some(serialized) = Self::serialize(&event) else {
            return Self::reject(entity_id, RegistryReject::PersistenceFailed);
        };
        smallvec![append_events! {
            store: env.event_store,
            stream: env.stream_id.as_str(),
            expected_version: None,
            events: vec![serialized],
            on_success: |version| Some(RegistryAction::Committed {
                event: Box::new(event),
                version,
            }),
            on_error: |error| {
                tracing::error!(error = %error, "Failed to persist registry event");
                Some(RegistryAction::RegistryRejected {
                    entity_id,
                    reason: RegistryReject::PersistenceFailed,
                })
            }
        }]
    }

    /// Recompute a field's rating from its approved reviews.
    fn refresh_rating(state: &mut RegistryState, field_id: &FieldId) {
        let (sum, count) = state
            .reviews
            .values()
            .filter(|r| r.field_id == *field_id && r.approved)
            .fold((0_u32, 0_u32), |(sum, count), r| {
                (sum + u32::from(r.rating), count + 1)
            });

        if let Some(field) = state.fields.get_mut(field_id) {
            field.review_count = count;
            field.rating = if count == 0 {
                0.0
            } else {
                f64::from(sum) / f64::from(count)
            };
        }
    }

    /// Applies an event to state.
    pub(crate) fn apply_event(state: &mut RegistryState, action: &RegistryAction) {
        match action {
            RegistryAction::FieldRegistered { field } => {
                state.fields.insert(field.id, field.clone());
                state.last_error = None;
            }

            RegistryAction::FieldApproved { field_id, .. } => {
                if let Some(field) = state.fields.get_mut(field_id) {
                    field.approved = true;
                }
                state.last_error = None;
            }

            RegistryAction::PhotoAdded { field_id, url } => {
                if let Some(field) = state.fields.get_mut(field_id) {
                    field.photos.push(url.clone());
                }
            }

            RegistryAction::CoverPhotoSet { field_id, index } => {
                if let Some(field) = state.fields.get_mut(field_id) {
                    field.cover_photo = *index;
                }
            }

            RegistryAction::ReviewSubmitted { review } => {
                state.reviews.insert(review.id, review.clone());
            }

            RegistryAction::ReviewApproved { review_id } => {
                let field_id = state.reviews.get_mut(review_id).map(|review| {
                    review.approved = true;
                    review.field_id
                });
                if let Some(field_id) = field_id {
                    Self::refresh_rating(state, &field_id);
                }
            }

            RegistryAction::RegistryRejected { reason, .. } => {
                state.last_error = Some(reason.to_string());
            }

            _ => {}
        }
    }
}

impl Reducer for RegistryReducer {
    type State = RegistryState;
    type Action = RegistryAction;
    type Environment = RegistryEnvironment;

    #[allow(clippy::too_many_lines)] // One arm per command
    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        match action {
            RegistryAction::RegisterField {
                field_id,
                principal,
                registration,
            } => {
                if !principal.is_owner() && !principal.is_admin() {
                    let reason = RegistryReject::NotAnOwner;
                    Self::apply_event(
                        state,
                        &RegistryAction::RegistryRejected {
                            entity_id: field_id.to_string(),
                            reason: reason.clone(),
                        },
                    );
                    return Self::reject(field_id.to_string(), reason);
                }

                if let Err(reason) = registration.validate() {
                    Self::apply_event(
                        state,
                        &RegistryAction::RegistryRejected {
                            entity_id: field_id.to_string(),
                            reason: reason.clone(),
                        },
                    );
                    return Self::reject(field_id.to_string(), reason);
                }

                let field = Field {
                    id: field_id,
                    owner_id: principal.user_id,
                    name: registration.name,
                    city: registration.city,
                    address: registration.address,
                    location: registration.location,
                    base_price_per_hour: registration.base_price_per_hour,
                    subscription_price_4_match: registration.subscription_price_4_match,
                    contact_phone: registration.contact_phone,
                    tax_number: registration.tax_number,
                    iban: registration.iban,
                    approved: false,
                    rating: 0.0,
                    review_count: 0,
                    photos: registration.photos,
                    cover_photo: 0,
                    created_at: env.clock.now(),
                };

                Self::commit(
                    env,
                    RegistryAction::FieldRegistered { field },
                    field_id.to_string(),
                )
            }

            RegistryAction::ApproveField {
                field_id,
                principal,
            } => {
                if !principal.is_admin() {
                    return Self::reject(field_id.to_string(), RegistryReject::NotAnAdmin);
                }
                if !state.fields.contains_key(&field_id) {
                    return Self::reject(field_id.to_string(), RegistryReject::FieldNotFound);
                }

                Self::commit(
                    env,
                    RegistryAction::FieldApproved {
                        field_id,
                        approved_at: env.clock.now(),
                    },
                    field_id.to_string(),
                )
            }

            RegistryAction::AddPhoto {
                field_id,
                principal,
                url,
            } => {
                let Some(field) = state.fields.get(&field_id) else {
                    return Self::reject(field_id.to_string(), RegistryReject::FieldNotFound);
                };
                if field.owner_id != principal.user_id && !principal.is_admin() {
                    return Self::reject(field_id.to_string(), RegistryReject::NotAnOwner);
                }
                if field.photos.len() >= MAX_FIELD_PHOTOS {
                    return Self::reject(field_id.to_string(), RegistryReject::TooManyPhotos);
                }

                Self::commit(
                    env,
                    RegistryAction::PhotoAdded { field_id, url },
                    field_id.to_string(),
                )
            }

            RegistryAction::SetCoverPhoto {
                field_id,
                principal,
                index,
            } => {
                let Some(field) = state.fields.get(&field_id) else {
                    return Self::reject(field_id.to_string(), RegistryReject::FieldNotFound);
                };
                if field.owner_id != principal.user_id && !principal.is_admin() {
                    return Self::reject(field_id.to_string(), RegistryReject::NotAnOwner);
                }
                if index >= field.photos.len() {
                    return Self::reject(field_id.to_string(), RegistryReject::BadCoverIndex);
                }

                Self::commit(
                    env,
                    RegistryAction::CoverPhotoSet { field_id, index },
                    field_id.to_string(),
                )
            }

            RegistryAction::SubmitReview {
                review_id,
                field_id,
                user_id,
                rating,
                comment,
            } => {
                if !state.fields.contains_key(&field_id) {
                    return Self::reject(review_id.to_string(), RegistryReject::FieldNotFound);
                }
                if !(1..=5).contains(&rating) {
                    return Self::reject(
                        review_id.to_string(),
                        RegistryReject::Invalid("rating must be 1-5".to_string()),
                    );
                }

                let review = Review {
                    id: review_id,
                    field_id,
                    user_id,
                    rating,
                    comment,
                    approved: false,
                    created_at: env.clock.now(),
                };

                Self::commit(
                    env,
                    RegistryAction::ReviewSubmitted { review },
                    review_id.to_string(),
                )
            }

            RegistryAction::ApproveReview {
                review_id,
                principal,
            } => {
                if !principal.is_admin() {
                    return Self::reject(review_id.to_string(), RegistryReject::NotAnAdmin);
                }
                if !state.reviews.contains_key(&review_id) {
                    return Self::reject(review_id.to_string(), RegistryReject::ReviewNotFound);
                }

                Self::commit(
                    env,
                    RegistryAction::ReviewApproved { review_id },
                    review_id.to_string(),
                )
            }

            // ========== Commit plumbing ==========
            RegistryAction::Committed { event, version } => {
                Self::apply_event(state, &event);
                state.version = version;

                match Self::serialize(&event) {
                    Some(serialized) => smallvec![publish_event! {
                        bus: env.event_bus,
                        topic: FIELD_TOPIC,
                        event: serialized,
                        on_success: || None,
                        on_error: |error| {
                            tracing::warn!(error = %error, "Failed to publish field event");
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

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::Role;
    use sahabul_core::event_bus::BroadcastEventBus;
    use sahabul_testing::{InMemoryEventStore, ReducerTest, assertions, mocks::test_clock};

    fn test_env() -> RegistryEnvironment {
        RegistryEnvironment::new(
            Arc::new(test_clock()),
            Arc::new(InMemoryEventStore::new()),
            Arc::new(BroadcastEventBus::new()),
        )
    }

    fn registration() -> FieldRegistration {
        FieldRegistration {
            name: "Yeşil Vadi Halı Saha".to_string(),
            city: "İstanbul".to_string(),
            address: "Atatürk Cad. No: 12".to_string(),
            location: GeoPoint {
                lat: 41.015,
                lon: 28.979,
            },
            base_price_per_hour: Money::from_lira(300),
            subscription_price_4_match: None,
            contact_phone: Some("+90 555 000 00 00".to_string()),
            tax_number: Some("1234567890".to_string()),
            iban: Some("TR000000000000000000000000".to_string()),
            photos: vec!["https://cdn.example/pitch.jpg".to_string()],
        }
    }

    fn registered_field(owner: UserId, approved: bool) -> Field {
        let reg = registration();
        Field {
            id: FieldId::new(),
            owner_id: owner,
            name: reg.name,
            city: reg.city,
            address: reg.address,
            location: reg.location,
            base_price_per_hour: reg.base_price_per_hour,
            subscription_price_4_match: None,
            contact_phone: reg.contact_phone,
            tax_number: reg.tax_number,
            iban: reg.iban,
            approved,
            rating: 0.0,
            review_count: 0,
            photos: reg.photos,
            cover_photo: 0,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn owner_registers_field() {
        let owner = Principal::new(UserId::new(), Role::Owner);

        ReducerTest::new(RegistryReducer::new())
            .with_env(test_env())
            .given_state(RegistryState::new())
            .when_action(RegistryAction::RegisterField {
                field_id: FieldId::new(),
                principal: owner,
                registration: registration(),
            })
            .then_effects(assertions::assert_has_event_store_effect)
            .run();
    }

    #[test]
    fn player_cannot_register_field() {
        let player = Principal::new(UserId::new(), Role::Player);

        ReducerTest::new(RegistryReducer::new())
            .with_env(test_env())
            .given_state(RegistryState::new())
            .when_action(RegistryAction::RegisterField {
                field_id: FieldId::new(),
                principal: player,
                registration: registration(),
            })
            .then_state(|state| {
                assert!(state.last_error.as_deref().unwrap().contains("owners"));
            })
            .run();
    }

    #[test]
    fn registration_validates_iban_and_tax_number() {
        let mut bad_iban = registration();
        bad_iban.iban = Some("DE00000000000000000000".to_string());
        assert!(bad_iban.validate().is_err());

        let mut bad_tax = registration();
        bad_tax.tax_number = Some("12345".to_string());
        assert!(bad_tax.validate().is_err());

        let mut too_many_photos = registration();
        too_many_photos.photos = (0..=MAX_FIELD_PHOTOS).map(|i| format!("p{i}.jpg")).collect();
        assert!(too_many_photos.validate().is_err());

        assert!(registration().validate().is_ok());
    }

    #[test]
    fn only_admin_approves_fields() {
        let owner = UserId::new();
        let field = registered_field(owner, false);
        let field_id = field.id;
        let mut state = RegistryState::new();
        RegistryReducer::apply_event(&mut state, &RegistryAction::FieldRegistered { field });

        ReducerTest::new(RegistryReducer::new())
            .with_env(test_env())
            .given_state(state)
            .when_action(RegistryAction::ApproveField {
                field_id,
                principal: Principal::new(owner, Role::Owner),
            })
            .then_effects(|effects| {
                // Rejected: only the broadcast notification
                assertions::assert_effects_count(effects, 1);
                assertions::assert_has_future_effect(effects);
            })
            .run();
    }

    #[test]
    fn unapproved_fields_stay_out_of_listings() {
        let mut state = RegistryState::new();
        let approved = registered_field(UserId::new(), true);
        let unapproved = registered_field(UserId::new(), false);
        RegistryReducer::apply_event(
            &mut state,
            &RegistryAction::FieldRegistered { field: approved },
        );
        RegistryReducer::apply_event(
            &mut state,
            &RegistryAction::FieldRegistered { field: unapproved },
        );

        assert_eq!(state.approved_fields(None).len(), 1);
        assert_eq!(state.approved_fields(Some("istanbul")).len(), 0); // Turkish İ differs from ASCII i
        assert_eq!(state.approved_fields(Some("İstanbul")).len(), 1);
    }

    #[test]
    fn photo_limit_is_enforced() {
        let owner = UserId::new();
        let mut field = registered_field(owner, true);
        field.photos = (0..MAX_FIELD_PHOTOS).map(|i| format!("p{i}.jpg")).collect();
        let field_id = field.id;
        let mut state = RegistryState::new();
        RegistryReducer::apply_event(&mut state, &RegistryAction::FieldRegistered { field });

        ReducerTest::new(RegistryReducer::new())
            .with_env(test_env())
            .given_state(state)
            .when_action(RegistryAction::AddPhoto {
                field_id,
                principal: Principal::new(owner, Role::Owner),
                url: "one-too-many.jpg".to_string(),
            })
            .then_effects(|effects| {
                assertions::assert_effects_count(effects, 1);
                assertions::assert_has_future_effect(effects);
            })
            .run();
    }

    #[test]
    fn approved_review_updates_rating() {
        let field = registered_field(UserId::new(), true);
        let field_id = field.id;
        let mut state = RegistryState::new();
        RegistryReducer::apply_event(&mut state, &RegistryAction::FieldRegistered { field });

        for rating in [4_u8, 5_u8] {
            let review = Review {
                id: ReviewId::new(),
                field_id,
                user_id: UserId::new(),
                rating,
                comment: "iyi saha".to_string(),
                approved: false,
                created_at: Utc::now(),
            };
            let review_id = review.id;
            RegistryReducer::apply_event(&mut state, &RegistryAction::ReviewSubmitted { review });
            RegistryReducer::apply_event(&mut state, &RegistryAction::ReviewApproved { review_id });
        }

        let field = state.fields.get(&field_id).unwrap();
        assert_eq!(field.review_count, 2);
        assert!((field.rating - 4.5).abs() < f64::EPSILON);
        assert_eq!(state.approved_reviews(&field_id).len(), 2);
    }

    #[test]
    fn unapproved_reviews_do_not_count() {
        let field = registered_field(UserId::new(), true);
        let field_id = field.id;
        let mut state = RegistryState::new();
        RegistryReducer::apply_event(&mut state, &RegistryAction::FieldRegistered { field });

        let review = Review {
            id: ReviewId::new(),
            field_id,
            user_id: UserId::new(),
            rating: 1,
            comment: "çamur içinde".to_string(),
            approved: false,
            created_at: Utc::now(),
        };
        RegistryReducer::apply_event(&mut state, &RegistryAction::ReviewSubmitted { review });

        let field = state.fields.get(&field_id).unwrap();
        assert_eq!(field.review_count, 0);
        assert!(state.approved_reviews(&field_id).is_empty());
    }
}
