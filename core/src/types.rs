//! Domain types for the event-registration core.
//!
//! Events carry the capacity counters, bookings carry the reservation
//! lifecycle, and the check-in log is the append-only audit trail. Counters
//! and booking statuses are only ever mutated through committed store
//! transactions; these types hold no synchronization of their own.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ============================================================================
// Identifiers
// ============================================================================

/// Unique identifier for an event
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventId(Uuid);

impl EventId {
    /// Creates a new random `EventId`
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create an `EventId` from a `Uuid`
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

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a booking
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BookingId(Uuid);

impl BookingId {
    /// Creates a new random `BookingId`
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a `BookingId` from a `Uuid`
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

impl Default for BookingId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for BookingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a reserving subject (the attendee)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubjectId(Uuid);

impl SubjectId {
    /// Creates a new random `SubjectId`
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a `SubjectId` from a `Uuid`
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

impl Default for SubjectId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SubjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a check-in operator (scanner or admin identity)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OperatorId(Uuid);

impl OperatorId {
    /// Creates a new random `OperatorId`
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create an `OperatorId` from a `Uuid`
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

impl Default for OperatorId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for OperatorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a notification
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NotificationId(Uuid);

impl NotificationId {
    /// Creates a new random `NotificationId`
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a `NotificationId` from a `Uuid`
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

impl Default for NotificationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for NotificationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque printable ticket code.
///
/// Unlike the UUID identifiers above, a ticket id round-trips through QR
/// payloads and manual operator entry, so it is restricted to a small
/// printable charset (`A-Z a-z 0-9 _ -`) and bounded in length. Use
/// [`TicketId::parse`] on any externally supplied string before touching the
/// store with it.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TicketId(String);

impl TicketId {
    /// Maximum accepted length of a ticket code
    pub const MAX_LEN: usize = 64;

    /// Issue a fresh ticket code for a new booking
    #[must_use]
    pub fn issue() -> Self {
        Self(format!("TKT-{}", Uuid::new_v4().simple()))
    }

    /// Parse and sanitize an externally supplied ticket code.
    ///
    /// Returns `None` when the trimmed input is empty, too long, or contains
    /// characters outside the ticket charset. Rejecting here keeps malformed
    /// identifiers away from the store entirely.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.len() > Self::MAX_LEN {
            return None;
        }
        let valid = trimmed
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        valid.then(|| Self(trimmed.to_owned()))
    }

    /// The ticket code as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TicketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// Events
// ============================================================================

/// Lifecycle status of an event
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventStatus {
    /// Not yet visible to subjects
    Draft,
    /// Open for reservations
    Published,
    /// Cancelled by the organizer
    Cancelled,
    /// Held and closed out
    Completed,
}

/// An event with its capacity counters.
///
/// `capacity` is immutable once published. `registered_count` and
/// `waitlist_count` are mutated only inside committed store transactions;
/// `version` is the optimistic-concurrency token those commits are guarded
/// by. The invariant `registered_count <= capacity` holds at all times.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Event identifier
    pub id: EventId,
    /// Human-readable title (surfaced in operator-facing rejections)
    pub title: String,
    /// Maximum number of confirmed bookings
    pub capacity: u32,
    /// Number of currently confirmed bookings
    pub registered_count: u32,
    /// Number of currently waitlisted bookings
    pub waitlist_count: u32,
    /// Highest waitlist position ever assigned for this event; positions are
    /// monotone and never reused
    pub waitlist_high_water: u32,
    /// Lifecycle status
    pub status: EventStatus,
    /// Scheduled start of the event
    pub starts_at: DateTime<Utc>,
    /// Soft-deletion marker; a deleted event accepts no operations
    pub deleted_at: Option<DateTime<Utc>>,
    /// Optimistic-concurrency token, bumped by every committed transaction
    pub version: u64,
}

impl EventRecord {
    /// Create a draft event with empty counters
    #[must_use]
    pub const fn new(id: EventId, title: String, capacity: u32, starts_at: DateTime<Utc>) -> Self {
        Self {
            id,
            title,
            capacity,
            registered_count: 0,
            waitlist_count: 0,
            waitlist_high_water: 0,
            status: EventStatus::Draft,
            starts_at,
            deleted_at: None,
            version: 0,
        }
    }

    /// Whether the event is published, not soft-deleted, and accepts operations
    #[must_use]
    pub const fn is_open(&self) -> bool {
        matches!(self.status, EventStatus::Published) && self.deleted_at.is_none()
    }

    /// Whether the event still has confirmed seats to hand out
    #[must_use]
    pub const fn has_capacity(&self) -> bool {
        self.registered_count < self.capacity
    }

    /// Confirmed seats still available
    #[must_use]
    pub const fn seats_remaining(&self) -> u32 {
        self.capacity.saturating_sub(self.registered_count)
    }
}

// ============================================================================
// Bookings
// ============================================================================

/// Lifecycle status of a booking.
///
/// Bookings are never deleted; they only move through these states. A
/// booking is *active* (counts toward the one-per-subject-per-event rule)
/// while `Confirmed` or `Waitlist`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    /// Holds a confirmed seat
    Confirmed,
    /// Waiting for a seat to free up
    Waitlist,
    /// Checked in at the venue (terminal success)
    CheckedIn,
    /// Cancelled by the subject
    Cancelled,
    /// Waitlisted entry that never got a seat before the event closed
    Expired,
    /// Confirmed seat that was never checked in
    NoShow,
}

/// How a check-in was performed
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckInMethod {
    /// Scanned QR payload
    QrScan,
    /// Operator typed the ticket code
    ManualEntry,
    /// Looked up directly by ticket id
    TicketId,
    /// Automatic (bulk or system-initiated) check-in
    Auto,
}

/// A reservation against an event's capacity.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    /// Booking identifier
    pub id: BookingId,
    /// The reserving subject
    pub subject_id: SubjectId,
    /// The event reserved against
    pub event_id: EventId,
    /// Unique ticket code, immutable once assigned
    pub ticket_id: TicketId,
    /// Lifecycle status
    pub status: BookingStatus,
    /// Consistent with `status == Waitlist`
    pub is_waitlist: bool,
    /// FIFO promotion order; set only while waitlisted
    pub waitlist_position: Option<u32>,
    /// When the booking was created
    pub created_at: DateTime<Utc>,
    /// When the booking was cancelled, if ever
    pub cancelled_at: Option<DateTime<Utc>>,
    /// When the booking was checked in, if ever
    pub checked_in_at: Option<DateTime<Utc>>,
    /// Operator that performed the check-in
    pub checked_in_by: Option<OperatorId>,
    /// Method the check-in was performed with
    pub check_in_method: Option<CheckInMethod>,
}

impl Booking {
    /// Create a confirmed booking holding one seat
    #[must_use]
    pub fn confirmed(subject_id: SubjectId, event_id: EventId, created_at: DateTime<Utc>) -> Self {
        Self::fresh(subject_id, event_id, BookingStatus::Confirmed, None, created_at)
    }

    /// Create a waitlisted booking at the given position
    #[must_use]
    pub fn waitlisted(
        subject_id: SubjectId,
        event_id: EventId,
        position: u32,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self::fresh(
            subject_id,
            event_id,
            BookingStatus::Waitlist,
            Some(position),
            created_at,
        )
    }

    fn fresh(
        subject_id: SubjectId,
        event_id: EventId,
        status: BookingStatus,
        waitlist_position: Option<u32>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: BookingId::new(),
            subject_id,
            event_id,
            ticket_id: TicketId::issue(),
            status,
            is_waitlist: matches!(status, BookingStatus::Waitlist),
            waitlist_position,
            created_at,
            cancelled_at: None,
            checked_in_at: None,
            checked_in_by: None,
            check_in_method: None,
        }
    }

    /// Whether this booking counts toward the one-active-per-subject rule
    #[must_use]
    pub const fn is_active(&self) -> bool {
        matches!(self.status, BookingStatus::Confirmed | BookingStatus::Waitlist)
    }
}

// ============================================================================
// Check-in log
// ============================================================================

/// One row of the append-only check-in audit log.
///
/// Written exactly once per successful check-in transition, in the same
/// transaction as the booking's status change, and never on a rejected
/// attempt.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckInRecord {
    /// Log row identifier
    pub id: Uuid,
    /// The checked-in booking
    pub booking_id: BookingId,
    /// The booking's event
    pub event_id: EventId,
    /// The booking's subject
    pub subject_id: SubjectId,
    /// Operator that performed the check-in
    pub checked_in_by: OperatorId,
    /// Method used
    pub method: CheckInMethod,
    /// When the check-in happened
    pub checked_in_at: DateTime<Utc>,
}

impl CheckInRecord {
    /// Build the audit row for a booking being checked in now
    #[must_use]
    pub fn for_booking(
        booking: &Booking,
        checked_in_by: OperatorId,
        method: CheckInMethod,
        checked_in_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            booking_id: booking.id,
            event_id: booking.event_id,
            subject_id: booking.subject_id,
            checked_in_by,
            method,
            checked_in_at,
        }
    }
}

// ============================================================================
// Notifications
// ============================================================================

/// Kind of a stored notification
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    /// The subject's waitlisted booking was promoted to a confirmed seat
    WaitlistPromoted,
}

/// A stored notification, created atomically with the transition it reports.
///
/// Delivery (push/email) is an external concern; this record is what makes
/// exactly-once notification per promotion possible.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    /// Notification identifier
    pub id: NotificationId,
    /// The subject to notify
    pub subject_id: SubjectId,
    /// What happened
    pub kind: NotificationKind,
    /// The booking the notification is about
    pub booking_id: BookingId,
    /// The booking's event
    pub event_id: EventId,
    /// When the notification was created
    pub created_at: DateTime<Utc>,
}

impl Notification {
    /// Build the promotion notification for a just-promoted booking
    #[must_use]
    pub fn waitlist_promoted(booking: &Booking, created_at: DateTime<Utc>) -> Self {
        Self {
            id: NotificationId::new(),
            subject_id: booking.subject_id,
            kind: NotificationKind::WaitlistPromoted,
            booking_id: booking.id,
            event_id: booking.event_id,
            created_at,
        }
    }
}
