//! The logical operation set and the transactional commit primitive.

use async_trait::async_trait;
use gatelist_core::{
    Booking, BookingId, CheckInRecord, EventId, EventRecord, Notification, StoreFault, SubjectId,
    TicketId,
};

/// Result type alias for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreFault>;

/// One typed write inside an [`EventTransaction`].
///
/// This is the closed set of mutations the core ever performs. Seat-counter
/// changes ride on [`TxOp::UpdateEvent`] so that every increment/decrement is
/// part of a version-guarded read-check-write, never a bare fetch-then-add.
#[derive(Clone, Debug)]
pub enum TxOp {
    /// Insert a new booking row
    CreateBooking(Booking),
    /// Replace an existing booking row (status transitions only; bookings are
    /// never deleted)
    UpdateBooking(Booking),
    /// Replace the event row (counters, status). The engine overrides the
    /// record's `version` with `expected_version + 1` on commit.
    UpdateEvent(EventRecord),
    /// Append one row to the check-in audit log
    AppendCheckIn(CheckInRecord),
    /// Insert a notification record
    CreateNotification(Notification),
}

/// An atomic write-set against a single event, guarded by the event's
/// version.
///
/// `commit` applies every op or none: the engine compares the stored event
/// version against `expected_version`, and a mismatch aborts the whole set
/// with [`StoreFault::WriteConflict`]. Every successful commit bumps the
/// version — including commits that don't rewrite the event row itself (a
/// check-in, say) — so all writers touching one event's bookings and
/// counters serialize against each other.
///
/// `operation` is the logical mutation name (`"CreateBooking"`,
/// `"CancelBooking"`, `"CheckInParticipant"`, ...) used by the router and
/// engines for dispatch logging.
#[derive(Clone, Debug)]
pub struct EventTransaction {
    /// Logical operation name, for dispatch logging
    pub operation: &'static str,
    /// The event whose version guards this write-set
    pub event_id: EventId,
    /// Version the caller's snapshot was read at
    pub expected_version: u64,
    /// The writes to apply atomically
    pub ops: Vec<TxOp>,
}

impl EventTransaction {
    /// Start an empty write-set for an event snapshot.
    #[must_use]
    pub const fn new(operation: &'static str, event_id: EventId, expected_version: u64) -> Self {
        Self { operation, event_id, expected_version, ops: Vec::new() }
    }

    /// Add a write op (builder style).
    #[must_use]
    pub fn with(mut self, op: TxOp) -> Self {
        self.ops.push(op);
        self
    }
}

/// The logical operation set both the primary and the secondary store
/// implement identically.
///
/// The Booking Ledger and the Check-in State Machine call these methods and
/// nothing else; which engine (or router) sits behind the trait object is
/// invisible to them.
#[async_trait]
pub trait Store: Send + Sync {
    /// Insert a new event record.
    ///
    /// # Errors
    ///
    /// Returns a fault if the event already exists or the backend fails.
    async fn insert_event(&self, event: EventRecord) -> StoreResult<()>;

    /// Fetch an event snapshot (including its current version).
    ///
    /// # Errors
    ///
    /// Returns a fault if the backend fails.
    async fn get_event(&self, id: EventId) -> StoreResult<Option<EventRecord>>;

    /// Fetch a booking by id (`GetBookingById`).
    ///
    /// # Errors
    ///
    /// Returns a fault if the backend fails.
    async fn get_booking(&self, id: BookingId) -> StoreResult<Option<Booking>>;

    /// Fetch a booking by its ticket code (`GetBookingByTicketId`).
    ///
    /// # Errors
    ///
    /// Returns a fault if the backend fails.
    async fn get_booking_by_ticket(&self, ticket_id: &TicketId) -> StoreResult<Option<Booking>>;

    /// Find the subject's active (confirmed or waitlisted) booking for an
    /// event, if any.
    ///
    /// # Errors
    ///
    /// Returns a fault if the backend fails.
    async fn find_active_booking(
        &self,
        subject_id: SubjectId,
        event_id: EventId,
    ) -> StoreResult<Option<Booking>>;

    /// All bookings for an event, ordered by creation time
    /// (`GetEventParticipants`).
    ///
    /// # Errors
    ///
    /// Returns a fault if the backend fails.
    async fn event_participants(&self, event_id: EventId) -> StoreResult<Vec<Booking>>;

    /// The waitlisted booking with the lowest position for an event, if any.
    ///
    /// # Errors
    ///
    /// Returns a fault if the backend fails.
    async fn next_waitlisted(&self, event_id: EventId) -> StoreResult<Option<Booking>>;

    /// Audit-log rows for a booking, in append order.
    ///
    /// # Errors
    ///
    /// Returns a fault if the backend fails.
    async fn check_in_log(&self, booking_id: BookingId) -> StoreResult<Vec<CheckInRecord>>;

    /// Stored notifications for a subject, in creation order.
    ///
    /// # Errors
    ///
    /// Returns a fault if the backend fails.
    async fn notifications_for(&self, subject_id: SubjectId) -> StoreResult<Vec<Notification>>;

    /// Apply a write-set atomically under the event's version check.
    ///
    /// # Errors
    ///
    /// Returns [`StoreFault::WriteConflict`] when the stored version differs
    /// from `tx.expected_version`; other faults on backend failure. On any
    /// error, no op in the set is applied.
    async fn commit(&self, tx: EventTransaction) -> StoreResult<()>;
}
