//! Tests for the `#[derive(Action)]` macro.

use sahabul_macros::Action;

#[derive(Action, Clone, Debug)]
enum LedgerAction {
    #[command]
    CreateBooking {
        field_id: String,
    },

    #[command]
    CancelBooking(String),

    #[event]
    BookingCreated {
        booking_id: String,
    },

    #[event]
    BookingCancelled,

    // Unmarked variants are neither command nor event
    Noop,
}

#[test]
fn commands_are_commands() {
    let action = LedgerAction::CreateBooking {
        field_id: "field-1".to_string(),
    };
    assert!(action.is_command());
    assert!(!action.is_event());

    let action = LedgerAction::CancelBooking("booking-1".to_string());
    assert!(action.is_command());
}

#[test]
fn events_are_events() {
    let action = LedgerAction::BookingCreated {
        booking_id: "booking-1".to_string(),
    };
    assert!(action.is_event());
    assert!(!action.is_command());

    assert!(LedgerAction::BookingCancelled.is_event());
}

#[test]
fn event_type_names_are_versioned() {
    let action = LedgerAction::BookingCreated {
        booking_id: "booking-1".to_string(),
    };
    assert_eq!(action.event_type(), "BookingCreated.v1");
    assert_eq!(LedgerAction::BookingCancelled.event_type(), "BookingCancelled.v1");
}

#[test]
fn commands_have_no_event_type() {
    let action = LedgerAction::CreateBooking {
        field_id: "field-1".to_string(),
    };
    assert_eq!(action.event_type(), "unknown");
}

#[test]
fn unmarked_variants_are_neither() {
    assert!(!LedgerAction::Noop.is_command());
    assert!(!LedgerAction::Noop.is_event());
}
