//! HTTP API endpoints.
//!
//! Thin handlers over the aggregate stores: validate and parse input,
//! send a command, await the correlated outcome with `send_and_wait_for`,
//! map rejections to the stable error taxonomy. All amounts in responses
//! are kuruş.

pub mod bookings;
pub mod calendar;
pub mod fields;
pub mod loyalty;
pub mod payments;
pub mod reviews;
pub mod team_search;

use crate::aggregates::booking::RejectReason;
use crate::aggregates::fields::RegistryReject;
use crate::aggregates::team_board::BoardReject;
use chrono::NaiveDate;
use sahabul_runtime::StoreError;
use sahabul_web::error::AppError;

/// Map a ledger rejection to its HTTP taxonomy entry.
pub(crate) fn ledger_error(reason: &RejectReason) -> AppError {
    match reason {
        RejectReason::SlotConflict => {
            AppError::conflict_with_code(reason.to_string(), "SLOT_CONFLICT")
        },
        RejectReason::CancellationWindowExpired => {
            AppError::validation_with_code(reason.to_string(), "CANCELLATION_WINDOW_EXPIRED")
        },
        RejectReason::FieldNotApproved => {
            AppError::validation_with_code(reason.to_string(), "FIELD_NOT_APPROVED")
        },
        RejectReason::PastSlot | RejectReason::OutsideOperatingHours => {
            AppError::bad_request(reason.to_string())
        },
        RejectReason::BookingNotFound => AppError::not_found("Booking", "requested"),
        RejectReason::NotBookingOwner => AppError::forbidden(reason.to_string()),
        RejectReason::DuplicateBooking | RejectReason::InvalidTransition => {
            AppError::conflict(reason.to_string())
        },
        RejectReason::PersistenceFailed => AppError::internal(reason.to_string()),
    }
}

/// Map a registry rejection to its HTTP taxonomy entry.
pub(crate) fn registry_error(reason: &RegistryReject) -> AppError {
    match reason {
        RegistryReject::NotAnOwner | RegistryReject::NotAnAdmin => {
            AppError::forbidden(reason.to_string())
        },
        RegistryReject::FieldNotFound => AppError::not_found("Field", "requested"),
        RegistryReject::ReviewNotFound => AppError::not_found("Review", "requested"),
        RegistryReject::TooManyPhotos
        | RegistryReject::BadCoverIndex
        | RegistryReject::Invalid(_)
        | RegistryReject::NoCompletedBooking => AppError::validation(reason.to_string()),
        RegistryReject::PersistenceFailed => AppError::internal(reason.to_string()),
    }
}

/// Map a board rejection to its HTTP taxonomy entry.
pub(crate) fn board_error(reason: &BoardReject) -> AppError {
    match reason {
        BoardReject::SearchNotFound => AppError::not_found("Team search", "requested"),
        BoardReject::NotCreator => AppError::forbidden(reason.to_string()),
        BoardReject::Invalid(_) => AppError::validation(reason.to_string()),
        BoardReject::PersistenceFailed => AppError::internal(reason.to_string()),
    }
}

/// Map a store error (timeout/shutdown) to an HTTP error.
pub(crate) fn store_error(error: StoreError) -> AppError {
    match error {
        StoreError::Timeout => AppError::timeout("The operation did not complete in time"),
        StoreError::ShutdownInProgress | StoreError::ShutdownTimeout(_) => {
            AppError::unavailable("The service is shutting down")
        },
        StoreError::ChannelClosed => AppError::internal("Internal pipeline closed"),
    }
}

/// Parse a `YYYY-MM-DD` date parameter.
pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, AppError> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|_| AppError::bad_request(format!("Invalid date '{raw}', expected YYYY-MM-DD")))
}

/// Parse an `HH:MM` slot time parameter into its start hour.
pub(crate) fn parse_hour(raw: &str) -> Result<u8, AppError> {
    let (hour, minute) = raw
        .split_once(':')
        .ok_or_else(|| AppError::bad_request(format!("Invalid time '{raw}', expected HH:MM")))?;

    if minute != "00" {
        return Err(AppError::bad_request(
            "Slots start on the hour; minutes must be 00",
        ));
    }

    hour.parse::<u8>()
        .ok()
        .filter(|h| *h < 24)
        .ok_or_else(|| AppError::bad_request(format!("Invalid hour in '{raw}'")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_hour_accepts_whole_hours_only() {
        assert_eq!(parse_hour("09:00").unwrap_or(0), 9);
        assert_eq!(parse_hour("23:00").unwrap_or(0), 23);
        assert!(parse_hour("21:30").is_err());
        assert!(parse_hour("24:00").is_err());
        assert!(parse_hour("evening").is_err());
    }

    #[test]
    fn parse_date_requires_iso_format() {
        assert!(parse_date("2025-06-10").is_ok());
        assert!(parse_date("10.06.2025").is_err());
    }

    #[test]
    fn slot_conflict_maps_to_conflict_code() {
        let error = ledger_error(&RejectReason::SlotConflict);
        assert_eq!(error.code(), "SLOT_CONFLICT");
        let error = ledger_error(&RejectReason::CancellationWindowExpired);
        assert_eq!(error.code(), "CANCELLATION_WINDOW_EXPIRED");
    }
}
