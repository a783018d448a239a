//! Typed rejections for the booking ledger and the check-in state machine.
//!
//! Every rejection carries a short human-readable message (via
//! [`LedgerError::user_message`] / [`CheckInError::user_message`]) distinct
//! from the internal `Display` form that goes into logs. Store faults nest
//! transparently and surface their classification's user message.

use chrono::{DateTime, Utc};
use gatelist_core::StoreFault;
use thiserror::Error;

/// Result type alias for ledger operations.
pub type LedgerResult<T> = std::result::Result<T, LedgerError>;

/// Result type alias for check-in operations.
pub type CheckInResult<T> = std::result::Result<T, CheckInError>;

/// Rejections raised by the booking ledger.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum LedgerError {
    /// The event does not exist (or is soft-deleted).
    #[error("event not found")]
    EventNotFound,

    /// The event exists but is not published.
    #[error("event is not open for registration")]
    EventNotOpen,

    /// The event's date has passed.
    #[error("event has already started")]
    EventEnded,

    /// The event's check-in window has not closed yet (close sweep only).
    #[error("event has not ended yet")]
    EventStillOpen,

    /// The subject already holds an active booking for this event.
    #[error("subject already holds an active booking for this event")]
    AlreadyReserved,

    /// The booking does not exist.
    #[error("booking not found")]
    BookingNotFound,

    /// The booking belongs to a different subject.
    #[error("booking does not belong to this subject")]
    Unauthorized,

    /// The booking is already cancelled (or otherwise no longer active).
    #[error("booking is already cancelled")]
    AlreadyCancelled,

    /// Checked-in bookings cannot be cancelled.
    #[error("booking has already been checked in")]
    CannotCancelAfterCheckIn,

    /// A store fault that survived the executor's retries.
    #[error(transparent)]
    Store(#[from] StoreFault),
}

impl LedgerError {
    /// Short human-readable message safe to show the subject.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::EventNotFound => "This event could not be found.".into(),
            Self::EventNotOpen => "This event is not open for registration.".into(),
            Self::EventEnded => "This event has already started.".into(),
            Self::EventStillOpen => "This event is still in progress.".into(),
            Self::AlreadyReserved => "You already have a reservation for this event.".into(),
            Self::BookingNotFound => "This reservation could not be found.".into(),
            Self::Unauthorized => "This reservation belongs to someone else.".into(),
            Self::AlreadyCancelled => "This reservation was already cancelled.".into(),
            Self::CannotCancelAfterCheckIn => {
                "Checked-in reservations can no longer be cancelled.".into()
            }
            Self::Store(fault) => fault.classify().user_message.into(),
        }
    }

    /// Whether re-running the whole operation may succeed.
    ///
    /// Domain rejections never retry; only transient store faults do.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Store(fault) if fault.is_retryable())
    }
}

/// Rejections raised by the check-in state machine.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CheckInError {
    /// No booking for the given id or ticket.
    #[error("booking not found")]
    NotFound,

    /// Idempotent no-op: the booking was already checked in.
    #[error("booking already checked in at {checked_in_at}")]
    AlreadyCheckedIn {
        /// When the original check-in happened, for operator display
        checked_in_at: DateTime<Utc>,
    },

    /// Cancelled bookings cannot check in.
    #[error("booking is cancelled")]
    Cancelled,

    /// Waitlisted bookings must be promoted to a seat first.
    #[error("waitlisted booking is not confirmed")]
    WaitlistNotConfirmed,

    /// The event's check-in window (start plus grace) has closed.
    #[error("check-in window has closed")]
    Expired,

    /// The ticket resolves to a booking for a different event.
    #[error("ticket belongs to event \"{event_title}\"")]
    WrongEvent {
        /// Title of the event the ticket actually belongs to
        event_title: String,
    },

    /// The scanned or typed identifier is malformed.
    #[error("ticket identifier is malformed")]
    InvalidFormat,

    /// A store fault that survived the executor's retries.
    #[error(transparent)]
    Store(#[from] StoreFault),
}

impl CheckInError {
    /// Short human-readable message safe to show the operator.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::NotFound => "No reservation matches this ticket.".into(),
            Self::AlreadyCheckedIn { checked_in_at } => {
                format!("This ticket was already checked in at {}.", checked_in_at.format("%H:%M"))
            }
            Self::Cancelled => "This reservation was cancelled.".into(),
            Self::WaitlistNotConfirmed => {
                "This reservation is still on the waitlist and cannot check in.".into()
            }
            Self::Expired => "The check-in window for this event has closed.".into(),
            Self::WrongEvent { event_title } => {
                format!("This ticket is for a different event: {event_title}.")
            }
            Self::InvalidFormat => "That doesn't look like a valid ticket code.".into(),
            Self::Store(fault) => fault.classify().user_message.into(),
        }
    }

    /// Whether re-running the whole operation may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Store(fault) if fault.is_retryable())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_rejections_never_retry() {
        assert!(!LedgerError::AlreadyReserved.is_retryable());
        assert!(!LedgerError::EventEnded.is_retryable());
        assert!(!CheckInError::Cancelled.is_retryable());
        assert!(!CheckInError::AlreadyCheckedIn { checked_in_at: Utc::now() }.is_retryable());
    }

    #[test]
    fn transient_store_faults_retry_through_the_wrapper() {
        let ledger: LedgerError = StoreFault::RateLimited.into();
        assert!(ledger.is_retryable());

        let check_in: CheckInError =
            StoreFault::WriteConflict { entity: "event".into() }.into();
        assert!(check_in.is_retryable());

        let terminal: LedgerError =
            StoreFault::PermissionDenied { detail: "rules".into() }.into();
        assert!(!terminal.is_retryable());
    }

    #[test]
    fn user_messages_hide_internal_codes() {
        let err: LedgerError =
            StoreFault::Unavailable { detail: "ECONNREFUSED 10.0.0.3".into() }.into();
        let message = err.user_message();
        assert!(!message.contains("ECONNREFUSED"));
        assert!(!message.contains("store/"));
    }

    #[test]
    fn wrong_event_surfaces_the_actual_title() {
        let err = CheckInError::WrongEvent { event_title: "Rust Meetup".into() };
        assert!(err.user_message().contains("Rust Meetup"));
    }
}
