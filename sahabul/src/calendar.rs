//! Slot calendar engine.
//!
//! Pure projection of a field's week into hourly slots. Reads an immutable
//! snapshot of ledger occupancy and never mutates state; consistency under
//! concurrent writers comes from the store's read lock handing the engine
//! one coherent snapshot per query.
//!
//! Status priority per slot: `past` ≻ `reserved` ≻ `subscription_locked` ≻
//! `available`. Pending holds render as `reserved` - they exclude new
//! bookings just as finalized ones do.

use crate::aggregates::booking::SlotHold;
use crate::types::{FieldId, OperatingHours, SlotKey, SlotStatus};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Serialize;
use std::collections::HashMap;

/// One slot in a week calendar.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CalendarSlot {
    /// Slot start hour
    pub hour: u8,
    /// Computed status at evaluation time
    pub status: SlotStatus,
}

/// One day of the calendar.
#[derive(Clone, Debug, Serialize)]
pub struct CalendarDay {
    /// The calendar date
    pub date: NaiveDate,
    /// The day's slots, in hour order
    pub slots: Vec<CalendarSlot>,
}

/// A 7-day calendar for one field.
#[derive(Clone, Debug, Serialize)]
pub struct WeekCalendar {
    /// The field
    pub field_id: FieldId,
    /// First day of the projected week
    pub week_start: NaiveDate,
    /// Seven days, `week_start` first
    pub days: Vec<CalendarDay>,
}

/// Classify a single slot at `now`.
///
/// Evaluation order implements the priority contract: a started slot is
/// `past` no matter who holds it; an occupied slot renders by the kind of
/// hold; otherwise the slot is free.
#[must_use]
pub fn slot_status(
    occupancy: &HashMap<SlotKey, SlotHold>,
    slot: SlotKey,
    now: DateTime<Utc>,
) -> SlotStatus {
    if slot.start_at() < now {
        return SlotStatus::Past;
    }

    match occupancy.get(&slot) {
        Some(hold) if hold.is_subscription => SlotStatus::SubscriptionLocked,
        Some(_) => SlotStatus::Reserved,
        None => SlotStatus::Available,
    }
}

/// Project a field's week into slots.
///
/// Enumerates 7 days from `week_start`, each with one slot per operating
/// hour, and classifies every slot against the occupancy snapshot.
#[must_use]
pub fn week_calendar(
    field_id: FieldId,
    hours: OperatingHours,
    occupancy: &HashMap<SlotKey, SlotHold>,
    week_start: NaiveDate,
    now: DateTime<Utc>,
) -> WeekCalendar {
    let days = (0..7)
        .map(|offset| {
            let date = week_start + Duration::days(offset);
            let slots = hours
                .slot_hours()
                .map(|hour| CalendarSlot {
                    hour,
                    status: slot_status(occupancy, SlotKey::new(field_id, date, hour), now),
                })
                .collect();
            CalendarDay { date, slots }
        })
        .collect();

    WeekCalendar {
        field_id,
        week_start,
        days,
    }
}
