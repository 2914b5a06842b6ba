//! Domain types for the turf-field booking platform.
//!
//! Value objects, entities, and state types shared by the aggregates:
//! identifiers, kuruş-based money, slots, bookings, payments, and the
//! team-search board records.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use uuid::Uuid;

/// A field may carry at most this many photos.
pub const MAX_FIELD_PHOTOS: usize = 10;

// ============================================================================
// Identifiers
// ============================================================================

macro_rules! uuid_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(Uuid);

        impl $name {
            /// Creates a new random identifier
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Create an identifier from a `Uuid`
            #[must_use]
            pub const fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Get the inner UUID
            #[must_use]
            pub const fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

uuid_id!(
    /// Unique identifier for a turf field
    FieldId
);
uuid_id!(
    /// Unique identifier for a user (player, owner, or admin)
    UserId
);
uuid_id!(
    /// Unique identifier for a booking
    BookingId
);
uuid_id!(
    /// Unique identifier for a payment
    PaymentId
);
uuid_id!(
    /// Unique identifier for a team-search ad
    SearchId
);
uuid_id!(
    /// Unique identifier for a review
    ReviewId
);

// ============================================================================
// Money (kuruş-based to avoid floating point errors)
// ============================================================================

/// Represents money in kuruş (1 TL = 100 kuruş) to avoid floating-point
/// arithmetic errors in charge breakdowns.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Money(u64);

impl Money {
    /// Zero lira.
    pub const ZERO: Self = Self(0);

    /// Creates a `Money` value from kuruş
    #[must_use]
    pub const fn from_kurus(kurus: u64) -> Self {
        Self(kurus)
    }

    /// Creates a `Money` value from lira
    ///
    /// # Panics
    ///
    /// Panics if the conversion would overflow (`lira * 100 > u64::MAX`).
    /// Use `checked_from_lira` for non-panicking conversion.
    #[must_use]
    #[allow(clippy::panic)]
    pub const fn from_lira(lira: u64) -> Self {
        match lira.checked_mul(100) {
            Some(kurus) => Self(kurus),
            None => panic!("Money::from_lira overflow"),
        }
    }

    /// Creates a `Money` value from lira with overflow checking
    #[must_use]
    pub const fn checked_from_lira(lira: u64) -> Option<Self> {
        match lira.checked_mul(100) {
            Some(kurus) => Some(Self(kurus)),
            None => None,
        }
    }

    /// Returns the amount in kuruş
    #[must_use]
    pub const fn kurus(&self) -> u64 {
        self.0
    }

    /// Returns the amount in whole lira (rounded down)
    #[must_use]
    pub const fn lira(&self) -> u64 {
        self.0 / 100
    }

    /// Checks if the amount is zero
    #[must_use]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Adds two money amounts with overflow checking
    #[must_use]
    pub const fn checked_add(self, other: Self) -> Option<Self> {
        match self.0.checked_add(other.0) {
            Some(result) => Some(Self(result)),
            None => None,
        }
    }

    /// Adds two money amounts
    ///
    /// # Panics
    ///
    /// Panics if the addition would overflow. Use `checked_add` for
    /// non-panicking addition.
    #[must_use]
    #[allow(clippy::panic)]
    #[allow(clippy::should_implement_trait)] // Named method keeps call sites explicit about overflow
    pub const fn add(self, other: Self) -> Self {
        match self.checked_add(other) {
            Some(result) => result,
            None => panic!("Money::add overflow"),
        }
    }

    /// Subtracts two money amounts (saturating at zero)
    #[must_use]
    pub const fn saturating_sub(self, other: Self) -> Self {
        Self(self.0.saturating_sub(other.0))
    }

    /// Multiplies money by a quantity with overflow checking
    #[must_use]
    pub const fn checked_multiply(self, quantity: u32) -> Option<Self> {
        match self.0.checked_mul(quantity as u64) {
            Some(result) => Some(Self(result)),
            None => None,
        }
    }

    /// Multiplies money by a quantity
    ///
    /// # Panics
    ///
    /// Panics if the multiplication would overflow. Use `checked_multiply`
    /// for non-panicking multiplication.
    #[must_use]
    #[allow(clippy::panic)]
    pub const fn multiply(self, quantity: u32) -> Self {
        match self.checked_multiply(quantity) {
            Some(result) => result,
            None => panic!("Money::multiply overflow"),
        }
    }

    /// Returns `percent`% of this amount, rounded down to the kuruş.
    ///
    /// Used for the loyalty discount (10% of one match's base price).
    #[must_use]
    pub const fn percent(self, percent: u32) -> Self {
        Self(self.0 * percent as u64 / 100)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02} TL", self.lira(), self.0 % 100)
    }
}

// ============================================================================
// Principals
// ============================================================================

/// Role of an authenticated user.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Regular player booking fields
    Player,
    /// Field owner managing their fields
    Owner,
    /// Platform administrator
    Admin,
}

/// An authenticated principal, passed explicitly into every core
/// operation - there is no ambient user context.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    /// The authenticated user
    pub user_id: UserId,
    /// The user's role
    pub role: Role,
}

impl Principal {
    /// Create a principal.
    #[must_use]
    pub const fn new(user_id: UserId, role: Role) -> Self {
        Self { user_id, role }
    }

    /// Whether this principal is a platform administrator.
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Whether this principal is a field owner.
    #[must_use]
    pub fn is_owner(&self) -> bool {
        self.role == Role::Owner
    }
}

// ============================================================================
// Slots
// ============================================================================

/// One bookable hourly interval for a field on a given date.
///
/// Slots are derived, not persisted: the calendar engine computes a status
/// per slot from ledger occupancy at query time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SlotKey {
    /// The field
    pub field_id: FieldId,
    /// The calendar date
    pub date: NaiveDate,
    /// The starting hour (0-23); slots are one hour long
    pub hour: u8,
}

impl SlotKey {
    /// Create a slot key.
    #[must_use]
    pub const fn new(field_id: FieldId, date: NaiveDate, hour: u8) -> Self {
        Self {
            field_id,
            date,
            hour,
        }
    }

    /// The instant this slot starts, in UTC.
    #[must_use]
    pub fn start_at(&self) -> DateTime<Utc> {
        self.date
            .and_hms_opt(u32::from(self.hour), 0, 0)
            .map_or_else(Utc::now, |naive| naive.and_utc())
    }

    /// The instant this slot ends (start + 1 hour), in UTC.
    #[must_use]
    pub fn end_at(&self) -> DateTime<Utc> {
        self.start_at() + chrono::Duration::hours(1)
    }

    /// The same slot `weeks` weeks later (subscription cadence).
    #[must_use]
    pub fn weeks_later(&self, weeks: u32) -> Self {
        Self {
            field_id: self.field_id,
            date: self.date + chrono::Duration::weeks(i64::from(weeks)),
            hour: self.hour,
        }
    }
}

impl fmt::Display for SlotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{} {:02}:00", self.field_id, self.date, self.hour)
    }
}

/// Computed status of a slot at a query instant.
///
/// Exactly one status applies; `past` dominates all others.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotStatus {
    /// Free to book
    Available,
    /// Held by an active single booking
    Reserved,
    /// Held by a subscription booking's weekly pattern
    SubscriptionLocked,
    /// The slot's start time has passed
    Past,
}

/// A field's daily operating window, hourly granularity.
///
/// Slots start at each hour in `open_hour..close_hour`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperatingHours {
    /// First bookable hour (e.g. 9)
    pub open_hour: u8,
    /// Hour at which the field closes (e.g. 24 - last slot starts at 23)
    pub close_hour: u8,
}

impl OperatingHours {
    /// Create an operating window.
    #[must_use]
    pub const fn new(open_hour: u8, close_hour: u8) -> Self {
        Self {
            open_hour,
            close_hour,
        }
    }

    /// Whether a slot starting at `hour` lies inside the window.
    #[must_use]
    pub const fn contains(&self, hour: u8) -> bool {
        hour >= self.open_hour && hour < self.close_hour
    }

    /// Iterate the bookable start hours.
    pub fn slot_hours(&self) -> impl Iterator<Item = u8> {
        self.open_hour..self.close_hour
    }
}

impl Default for OperatingHours {
    /// 09:00 through 24:00 - the last slot starts at 23:00.
    fn default() -> Self {
        Self::new(9, 24)
    }
}

// ============================================================================
// Fields
// ============================================================================

/// Geographic coordinate of a field.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    /// Latitude in degrees
    pub lat: f64,
    /// Longitude in degrees
    pub lon: f64,
}

/// A turf field record.
///
/// Unapproved fields are excluded from public listings and calendars.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Field {
    /// Field identifier
    pub id: FieldId,
    /// Owning user
    pub owner_id: UserId,
    /// Display name
    pub name: String,
    /// City (listing filter)
    pub city: String,
    /// Street address
    pub address: String,
    /// Geographic location
    pub location: GeoPoint,
    /// Hourly base price
    pub base_price_per_hour: Money,
    /// Optional price for a 4-match subscription package
    pub subscription_price_4_match: Option<Money>,
    /// Owner contact phone
    pub contact_phone: Option<String>,
    /// Owner tax number (10 digits when present)
    pub tax_number: Option<String>,
    /// Owner payout IBAN (TR-prefixed when present)
    pub iban: Option<String>,
    /// Whether an admin approved the field for public listing
    pub approved: bool,
    /// Average approved-review rating
    pub rating: f64,
    /// Number of approved reviews
    pub review_count: u32,
    /// Photo URLs, at most [`MAX_FIELD_PHOTOS`]
    pub photos: Vec<String>,
    /// Index into `photos` used as the cover
    pub cover_photo: usize,
    /// Registration time
    pub created_at: DateTime<Utc>,
}

/// A user review of a field. Counts toward the field's rating only once
/// approved.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Review {
    /// Review identifier
    pub id: ReviewId,
    /// Reviewed field
    pub field_id: FieldId,
    /// Reviewing user
    pub user_id: UserId,
    /// Rating, 1-5
    pub rating: u8,
    /// Free-text comment
    pub comment: String,
    /// Whether an admin approved the review
    pub approved: bool,
    /// Submission time
    pub created_at: DateTime<Utc>,
}

// ============================================================================
// Bookings
// ============================================================================

/// Lifecycle status of a booking.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    /// Created, awaiting payment; holds its slots
    Pending,
    /// Payment accepted by the gateway, hold finalized
    Confirmed,
    /// Payment captured
    Paid,
    /// Cancelled by the user, payment failure, or payment timeout
    Cancelled,
    /// The slot's end time passed while confirmed/paid
    Completed,
}

impl BookingStatus {
    /// Whether this status occupies slots (excludes others from booking).
    #[must_use]
    pub const fn holds_slots(self) -> bool {
        matches!(self, Self::Pending | Self::Confirmed | Self::Paid)
    }

    /// Whether the 72-hour cancellation rule applies to this status.
    #[must_use]
    pub const fn cancellable(self) -> bool {
        matches!(self, Self::Confirmed | Self::Paid)
    }
}

/// Server-computed charge breakdown for a booking.
///
/// The ledger is the single source of pricing truth; clients only display
/// these numbers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChargeBreakdown {
    /// Amount the user pays
    pub total: Money,
    /// Fixed per-match surcharge retained by the platform
    pub platform_fee: Money,
    /// The field owner's share
    pub owner_share: Money,
    /// Loyalty discount absorbed by the platform (zero when ineligible)
    pub loyalty_discount: Money,
}

/// A booking record in the ledger.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Booking {
    /// Booking identifier
    pub id: BookingId,
    /// Booking user
    pub user_id: UserId,
    /// Booked field
    pub field_id: FieldId,
    /// Date of the (first) match
    pub date: NaiveDate,
    /// Slot start hour; the slot ends one hour later
    pub start_hour: u8,
    /// Whether this is a 4-match weekly subscription
    pub is_subscription: bool,
    /// Lifecycle status
    pub status: BookingStatus,
    /// Charge breakdown
    pub charge: ChargeBreakdown,
    /// The slots this booking holds (1, or 4 for subscriptions)
    pub slots: Vec<SlotKey>,
    /// Creation time
    pub created_at: DateTime<Utc>,
}

impl Booking {
    /// Slot end hour (start + 1, fixed duration).
    #[must_use]
    pub const fn end_hour(&self) -> u8 {
        self.start_hour + 1
    }

    /// Start instant of the first slot.
    #[must_use]
    pub fn starts_at(&self) -> DateTime<Utc> {
        SlotKey::new(self.field_id, self.date, self.start_hour).start_at()
    }

    /// End instant of the last held slot.
    #[must_use]
    pub fn last_slot_ends_at(&self) -> DateTime<Utc> {
        self.slots
            .iter()
            .map(SlotKey::end_at)
            .max()
            .unwrap_or_else(|| self.starts_at() + chrono::Duration::hours(1))
    }
}

// ============================================================================
// Payments
// ============================================================================

/// Lifecycle status of a payment.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    /// Checkout created, awaiting gateway callback
    Initiated,
    /// Gateway reported success
    Succeeded,
    /// Gateway reported failure, or the callback window timed out
    Failed {
        /// Failure reason
        reason: String,
    },
    /// Refund requested from the gateway, acknowledgement pending
    RefundPending,
    /// Gateway acknowledged the refund
    Refunded,
}

impl PaymentStatus {
    /// Whether this payment reached a terminal gateway outcome.
    ///
    /// Callbacks arriving for a terminal payment are replays and are
    /// absorbed without a state transition.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        !matches!(self, Self::Initiated)
    }
}

/// A payment record owned by the payment coordinator. 1:1 with a booking
/// at a time; a cancelled-and-rebooked slot produces a new payment.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Payment {
    /// Payment identifier
    pub id: PaymentId,
    /// The booking being paid for
    pub booking_id: BookingId,
    /// External reference sent to the gateway (`{booking_id}_{8 hex}`)
    pub merchant_oid: String,
    /// Lifecycle status
    pub status: PaymentStatus,
    /// Amount to capture
    pub amount: Money,
    /// Checkout URL the user is sent to (set once the gateway responds)
    pub payment_url: Option<String>,
    /// Initiation time
    pub initiated_at: DateTime<Utc>,
}

// ============================================================================
// Team-search board
// ============================================================================

/// Player position sought in a team-search ad.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Position {
    /// Goalkeeper
    #[serde(rename = "kaleci")]
    Kaleci,
    /// Defender
    #[serde(rename = "defans")]
    Defans,
    /// Midfielder
    #[serde(rename = "orta saha")]
    OrtaSaha,
    /// Forward
    #[serde(rename = "forvet")]
    Forvet,
}

/// A team-search classified ad.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TeamSearch {
    /// Ad identifier
    pub id: SearchId,
    /// Creating user (the only one allowed to delete)
    pub user_id: UserId,
    /// Optional field the match is planned at
    pub field_id: Option<FieldId>,
    /// Match date
    pub date: NaiveDate,
    /// Match start hour
    pub hour: u8,
    /// Position sought
    pub position: Position,
    /// Free-text message
    pub message: String,
    /// Users who joined the ad; joining is idempotent per user
    pub participants: BTreeSet<UserId>,
    /// Creation time
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn money_lira_kurus_roundtrip() {
        let m = Money::from_lira(300);
        assert_eq!(m.kurus(), 30_000);
        assert_eq!(m.lira(), 300);
        assert_eq!(m.to_string(), "300.00 TL");
    }

    #[test]
    fn money_percent_rounds_down() {
        // 10% of 300 TL = 30 TL
        assert_eq!(Money::from_lira(300).percent(10), Money::from_lira(30));
        // 10% of 0.05 TL = 0.005 TL, rounded down to 0
        assert_eq!(Money::from_kurus(5).percent(10), Money::ZERO);
    }

    #[test]
    fn money_saturating_sub_stops_at_zero() {
        let small = Money::from_lira(10);
        let big = Money::from_lira(20);
        assert_eq!(small.saturating_sub(big), Money::ZERO);
        assert_eq!(big.saturating_sub(small), Money::from_lira(10));
    }

    #[test]
    fn slot_key_times() {
        let key = SlotKey::new(
            FieldId::new(),
            NaiveDate::from_ymd_opt(2025, 6, 10).unwrap(),
            20,
        );
        assert_eq!(key.start_at().to_rfc3339(), "2025-06-10T20:00:00+00:00");
        assert_eq!(key.end_at().to_rfc3339(), "2025-06-10T21:00:00+00:00");

        let next_week = key.weeks_later(1);
        assert_eq!(next_week.date, NaiveDate::from_ymd_opt(2025, 6, 17).unwrap());
        assert_eq!(next_week.hour, 20);
    }

    #[test]
    fn operating_hours_default_window() {
        let hours = OperatingHours::default();
        assert!(hours.contains(9));
        assert!(hours.contains(23));
        assert!(!hours.contains(8));
        assert!(!hours.contains(24));
        assert_eq!(hours.slot_hours().count(), 15);
    }

    #[test]
    fn booking_status_slot_holding() {
        assert!(BookingStatus::Pending.holds_slots());
        assert!(BookingStatus::Confirmed.holds_slots());
        assert!(BookingStatus::Paid.holds_slots());
        assert!(!BookingStatus::Cancelled.holds_slots());
        assert!(!BookingStatus::Completed.holds_slots());

        assert!(!BookingStatus::Pending.cancellable());
        assert!(BookingStatus::Paid.cancellable());
    }

    #[test]
    fn payment_status_terminality() {
        assert!(!PaymentStatus::Initiated.is_terminal());
        assert!(PaymentStatus::Succeeded.is_terminal());
        assert!(
            PaymentStatus::Failed {
                reason: "declined".to_string()
            }
            .is_terminal()
        );
    }

    #[test]
    fn position_serde_matches_board_vocabulary() {
        assert_eq!(
            serde_json::to_string(&Position::OrtaSaha).unwrap(),
            "\"orta saha\""
        );
        let parsed: Position = serde_json::from_str("\"kaleci\"").unwrap();
        assert_eq!(parsed, Position::Kaleci);
    }

    proptest! {
        #[test]
        fn money_add_is_commutative(a in 0_u64..1_000_000_000, b in 0_u64..1_000_000_000) {
            let (a, b) = (Money::from_kurus(a), Money::from_kurus(b));
            prop_assert_eq!(a.add(b), b.add(a));
        }

        #[test]
        fn money_percent_never_exceeds_original(kurus in 0_u64..1_000_000_000, pct in 0_u32..=100) {
            let m = Money::from_kurus(kurus);
            prop_assert!(m.percent(pct) <= m);
        }

        #[test]
        fn money_multiply_matches_repeated_add(kurus in 0_u64..1_000_000, n in 1_u32..16) {
            let m = Money::from_kurus(kurus);
            let mut sum = Money::ZERO;
            for _ in 0..n {
                sum = sum.add(m);
            }
            prop_assert_eq!(m.multiply(n), sum);
        }
    }
}
