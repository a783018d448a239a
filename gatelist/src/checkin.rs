//! The check-in state machine.
//!
//! Valid transition: `Confirmed -> CheckedIn`, once, within the event's
//! check-in window. Everything else is a typed rejection, and the
//! already-checked-in case reports the original timestamp so the operator
//! can see when the ticket was first used. The status transition and the
//! audit-log append commit in one transaction: a reader can never observe
//! one without the other.

use crate::context::AppContext;
use crate::error::{CheckInError, CheckInResult};
use crate::ticket::ticket_from_scan;
use chrono::{DateTime, Utc};
use gatelist_core::{
    BookingId, BookingStatus, CheckInMethod, CheckInRecord, EventId, OperatorId, SubjectId,
};
use gatelist_store::{EventTransaction, TxOp};

/// Result of a successful check-in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CheckInOutcome {
    /// The checked-in booking
    pub booking_id: BookingId,
    /// The booking's subject
    pub subject_id: SubjectId,
    /// When the check-in was stamped
    pub checked_in_at: DateTime<Utc>,
}

/// Venue-side check-in service.
#[derive(Clone, Debug)]
pub struct CheckInDesk {
    ctx: AppContext,
}

impl CheckInDesk {
    /// Create a check-in desk over the given context.
    #[must_use]
    pub const fn new(ctx: AppContext) -> Self {
        Self { ctx }
    }

    /// Check a booking in.
    ///
    /// Idempotent in effect: a second call on the same booking changes
    /// nothing and reports [`CheckInError::AlreadyCheckedIn`] with the first
    /// call's timestamp.
    ///
    /// # Errors
    ///
    /// The typed rejections of the state machine (`NotFound`,
    /// `AlreadyCheckedIn`, `Cancelled`, `WaitlistNotConfirmed`, `Expired`),
    /// or a store fault that survived retries.
    pub async fn check_in(
        &self,
        booking_id: BookingId,
        operator_id: OperatorId,
        method: CheckInMethod,
    ) -> CheckInResult<CheckInOutcome> {
        let outcome = self
            .ctx
            .transactionally(
                || self.try_check_in(booking_id, operator_id, method),
                CheckInError::is_retryable,
            )
            .await?;

        tracing::info!(
            booking_id = %outcome.booking_id,
            operator_id = %operator_id,
            method = ?method,
            "participant checked in"
        );
        Ok(outcome)
    }

    async fn try_check_in(
        &self,
        booking_id: BookingId,
        operator_id: OperatorId,
        method: CheckInMethod,
    ) -> CheckInResult<CheckInOutcome> {
        let booking = self
            .ctx
            .call(|| self.ctx.store().get_booking(booking_id))
            .await?
            .ok_or(CheckInError::NotFound)?;

        match booking.status {
            BookingStatus::CheckedIn => {
                // Stamped in the same transaction as the status, so present
                // on any checked-in row.
                let checked_in_at = booking.checked_in_at.unwrap_or(booking.created_at);
                return Err(CheckInError::AlreadyCheckedIn { checked_in_at });
            }
            BookingStatus::Cancelled => return Err(CheckInError::Cancelled),
            BookingStatus::Waitlist => return Err(CheckInError::WaitlistNotConfirmed),
            BookingStatus::Expired | BookingStatus::NoShow => return Err(CheckInError::Expired),
            BookingStatus::Confirmed => {}
        }

        let event = self
            .ctx
            .call(|| self.ctx.store().get_event(booking.event_id))
            .await?
            .ok_or(CheckInError::NotFound)?;

        let now = self.ctx.clock().now();
        if now > event.starts_at + self.ctx.grace_window() {
            return Err(CheckInError::Expired);
        }

        let mut checked_in = booking.clone();
        checked_in.status = BookingStatus::CheckedIn;
        checked_in.checked_in_at = Some(now);
        checked_in.checked_in_by = Some(operator_id);
        checked_in.check_in_method = Some(method);

        let record = CheckInRecord::for_booking(&booking, operator_id, method, now);

        let tx = EventTransaction::new("CheckInParticipant", event.id, event.version)
            .with(TxOp::UpdateBooking(checked_in))
            .with(TxOp::AppendCheckIn(record));
        self.ctx.commit(&tx).await?;

        Ok(CheckInOutcome { booking_id, subject_id: booking.subject_id, checked_in_at: now })
    }

    /// Resolve scanner or operator input to a booking id.
    ///
    /// Accepts the structured QR payload or a bare ticket code; both are
    /// sanitized before the store is touched. When `expected_event` is given
    /// (venue-scoped scanner), a booking for a different event is rejected
    /// as [`CheckInError::WrongEvent`] with the actual event's title, and no
    /// transition is performed.
    ///
    /// # Errors
    ///
    /// `InvalidFormat` on malformed input, `NotFound` when no booking
    /// matches, `WrongEvent` on event mismatch, or a store fault.
    pub async fn resolve_ticket(
        &self,
        raw_input: &str,
        expected_event: Option<EventId>,
    ) -> CheckInResult<BookingId> {
        let ticket_id = ticket_from_scan(raw_input)?;

        let booking = self
            .ctx
            .call(|| self.ctx.store().get_booking_by_ticket(&ticket_id))
            .await?
            .ok_or(CheckInError::NotFound)?;

        if let Some(expected) = expected_event {
            if booking.event_id != expected {
                let event_title = self
                    .ctx
                    .call(|| self.ctx.store().get_event(booking.event_id))
                    .await?
                    .map_or_else(|| "unknown event".to_owned(), |event| event.title);
                tracing::warn!(
                    booking_id = %booking.id,
                    expected_event = %expected,
                    actual_event = %booking.event_id,
                    "ticket scanned at the wrong event"
                );
                return Err(CheckInError::WrongEvent { event_title });
            }
        }

        Ok(booking.id)
    }

    /// Resolve-then-check-in, the path a venue scanner takes.
    ///
    /// # Errors
    ///
    /// Any rejection of [`Self::resolve_ticket`] or [`Self::check_in`].
    pub async fn check_in_ticket(
        &self,
        raw_input: &str,
        expected_event: Option<EventId>,
        operator_id: OperatorId,
        method: CheckInMethod,
    ) -> CheckInResult<CheckInOutcome> {
        let booking_id = self.resolve_ticket(raw_input, expected_event).await?;
        self.check_in(booking_id, operator_id, method).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::ledger::BookingLedger;
    use crate::ticket::TicketPayload;
    use chrono::Duration;
    use gatelist_core::{EventId, SubjectId};
    use gatelist_store::{MemoryStore, Store};
    use gatelist_testing::{FixedClock, published_event, test_context};
    use std::sync::Arc;

    struct Fixture {
        store: MemoryStore,
        clock: Arc<FixedClock>,
        ledger: BookingLedger,
        desk: CheckInDesk,
    }

    fn fixture() -> Fixture {
        let store = MemoryStore::new();
        let clock = Arc::new(FixedClock::at(Utc::now()));
        let ctx = test_context(store.clone(), Arc::clone(&clock));
        Fixture {
            store,
            clock,
            ledger: BookingLedger::new(ctx.clone()),
            desk: CheckInDesk::new(ctx),
        }
    }

    async fn seed_confirmed(fix: &Fixture) -> (EventId, SubjectId, BookingId, String) {
        let event = published_event(5, fix.clock.now() + Duration::hours(1));
        let event_id = event.id;
        fix.store.insert_event(event).await.unwrap();
        let subject = SubjectId::new();
        let reservation = fix.ledger.create_reservation(subject, event_id).await.unwrap();
        (event_id, subject, reservation.booking_id, reservation.ticket_id.as_str().to_owned())
    }

    #[tokio::test]
    async fn confirmed_booking_checks_in_once_with_one_log_row() {
        let fix = fixture();
        let (_, subject, booking_id, _) = seed_confirmed(&fix).await;
        let operator = OperatorId::new();

        let outcome = fix
            .desk
            .check_in(booking_id, operator, CheckInMethod::QrScan)
            .await
            .unwrap();
        assert_eq!(outcome.booking_id, booking_id);
        assert_eq!(outcome.subject_id, subject);

        let booking = fix.store.get_booking(booking_id).await.unwrap().unwrap();
        assert_eq!(booking.status, BookingStatus::CheckedIn);
        assert_eq!(booking.checked_in_by, Some(operator));
        assert_eq!(booking.check_in_method, Some(CheckInMethod::QrScan));

        let log = fix.store.check_in_log(booking_id).await.unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].checked_in_by, operator);

        // Second attempt: rejected with the original timestamp, no second
        // log row.
        let err = fix
            .desk
            .check_in(booking_id, OperatorId::new(), CheckInMethod::ManualEntry)
            .await
            .unwrap_err();
        assert_eq!(err, CheckInError::AlreadyCheckedIn { checked_in_at: outcome.checked_in_at });
        assert_eq!(fix.store.check_in_log(booking_id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn waitlisted_and_cancelled_bookings_are_rejected() {
        let fix = fixture();
        let event = published_event(0, fix.clock.now() + Duration::hours(1));
        let event_id = event.id;
        fix.store.insert_event(event).await.unwrap();

        let subject = SubjectId::new();
        let reservation = fix.ledger.create_reservation(subject, event_id).await.unwrap();
        assert!(reservation.is_waitlist);

        let waitlisted = fix
            .desk
            .check_in(reservation.booking_id, OperatorId::new(), CheckInMethod::TicketId)
            .await
            .unwrap_err();
        assert_eq!(waitlisted, CheckInError::WaitlistNotConfirmed);

        fix.ledger.cancel_reservation(reservation.booking_id, subject).await.unwrap();
        let cancelled = fix
            .desk
            .check_in(reservation.booking_id, OperatorId::new(), CheckInMethod::TicketId)
            .await
            .unwrap_err();
        assert_eq!(cancelled, CheckInError::Cancelled);

        // No audit rows for rejected attempts.
        assert!(fix.store.check_in_log(reservation.booking_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn check_in_window_closes_after_grace() {
        let fix = fixture();
        let (_, _, booking_id, _) = seed_confirmed(&fix).await;

        // Event starts in 1h; grace is 4h; jump past both.
        fix.clock.advance(Duration::hours(6));
        let err = fix
            .desk
            .check_in(booking_id, OperatorId::new(), CheckInMethod::QrScan)
            .await
            .unwrap_err();
        assert_eq!(err, CheckInError::Expired);
    }

    #[tokio::test]
    async fn check_in_inside_grace_window_is_accepted() {
        let fix = fixture();
        let (_, _, booking_id, _) = seed_confirmed(&fix).await;

        // 1h to start + 2h into the event: inside start + 4h grace.
        fix.clock.advance(Duration::hours(3));
        fix.desk
            .check_in(booking_id, OperatorId::new(), CheckInMethod::QrScan)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn missing_booking_is_not_found() {
        let fix = fixture();
        let err = fix
            .desk
            .check_in(BookingId::new(), OperatorId::new(), CheckInMethod::Auto)
            .await
            .unwrap_err();
        assert_eq!(err, CheckInError::NotFound);
    }

    #[tokio::test]
    async fn resolve_accepts_payload_and_manual_code() {
        let fix = fixture();
        let (event_id, _, booking_id, ticket) = seed_confirmed(&fix).await;

        // Manual code.
        let resolved = fix.desk.resolve_ticket(&ticket, Some(event_id)).await.unwrap();
        assert_eq!(resolved, booking_id);

        // Structured payload.
        let booking = fix.store.get_booking(booking_id).await.unwrap().unwrap();
        let payload = TicketPayload::for_booking(&booking, fix.clock.now()).encode();
        let resolved = fix.desk.resolve_ticket(&payload, Some(event_id)).await.unwrap();
        assert_eq!(resolved, booking_id);
    }

    #[tokio::test]
    async fn resolve_rejects_unknown_and_malformed_tickets() {
        let fix = fixture();
        seed_confirmed(&fix).await;

        let unknown = fix.desk.resolve_ticket("TKT-0000000000", None).await.unwrap_err();
        assert_eq!(unknown, CheckInError::NotFound);

        let malformed = fix.desk.resolve_ticket("not a ticket!!", None).await.unwrap_err();
        assert_eq!(malformed, CheckInError::InvalidFormat);
    }

    #[tokio::test]
    async fn wrong_event_scanner_rejects_with_title_and_no_transition() {
        let fix = fixture();
        let (_, _, booking_id, ticket) = seed_confirmed(&fix).await;

        let other = published_event(5, fix.clock.now() + Duration::hours(1));
        let other_id = other.id;
        fix.store.insert_event(other).await.unwrap();

        let err = fix
            .desk
            .check_in_ticket(&ticket, Some(other_id), OperatorId::new(), CheckInMethod::QrScan)
            .await
            .unwrap_err();
        assert_eq!(err, CheckInError::WrongEvent { event_title: "Test Event".into() });

        // The booking was not transitioned.
        let booking = fix.store.get_booking(booking_id).await.unwrap().unwrap();
        assert_eq!(booking.status, BookingStatus::Confirmed);
        assert!(fix.store.check_in_log(booking_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn scanner_path_resolves_and_checks_in() {
        let fix = fixture();
        let (event_id, _, booking_id, ticket) = seed_confirmed(&fix).await;

        let outcome = fix
            .desk
            .check_in_ticket(&ticket, Some(event_id), OperatorId::new(), CheckInMethod::QrScan)
            .await
            .unwrap();
        assert_eq!(outcome.booking_id, booking_id);

        let booking = fix.store.get_booking(booking_id).await.unwrap().unwrap();
        assert_eq!(booking.status, BookingStatus::CheckedIn);
    }
}
