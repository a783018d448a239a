//! The booking ledger: reservations, cancellations, waitlist promotion.
//!
//! Every mutation here is a read-check-write closure: read a fresh event
//! snapshot, check preconditions, build a write-set, and commit it under the
//! snapshot's version. Two writers racing for the last seat both read the
//! same version and at most one commit wins; the loser's conflict is
//! transient and the executor re-runs its closure against fresh state, which
//! lands it on the waitlist. That version check is the only thing standing
//! between a full event and an oversold one, so no code path mutates
//! counters outside a committed transaction.

use crate::context::AppContext;
use crate::error::{LedgerError, LedgerResult};
use gatelist_core::{
    Booking, BookingId, BookingStatus, EventId, EventRecord, EventStatus, Notification, SubjectId,
    TicketId,
};
use gatelist_store::{EventTransaction, TxOp};

/// Result of a successful reservation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReservationOutcome {
    /// The created booking
    pub booking_id: BookingId,
    /// The booking's ticket code
    pub ticket_id: TicketId,
    /// Whether the booking landed on the waitlist
    pub is_waitlist: bool,
    /// FIFO position when waitlisted
    pub waitlist_position: Option<u32>,
}

/// Result of a successful cancellation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CancelOutcome {
    /// The cancelled booking's event
    pub event_id: EventId,
    /// Whether a confirmed seat was freed (waitlisted cancellations free
    /// none)
    pub freed_seat: bool,
}

/// Result of the post-event close sweep.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CloseOutcome {
    /// Confirmed bookings marked no-show
    pub no_shows: u32,
    /// Waitlisted bookings marked expired
    pub expired: u32,
}

/// The transactional core of the registration system.
#[derive(Clone, Debug)]
pub struct BookingLedger {
    ctx: AppContext,
}

impl BookingLedger {
    /// Create a ledger over the given context.
    #[must_use]
    pub const fn new(ctx: AppContext) -> Self {
        Self { ctx }
    }

    /// Reserve a seat (or a waitlist slot) for `subject_id` on `event_id`.
    ///
    /// # Errors
    ///
    /// `EventNotFound` / `EventNotOpen` / `EventEnded` on event
    /// preconditions, `AlreadyReserved` when the subject already holds an
    /// active booking, or a store fault that survived retries.
    pub async fn create_reservation(
        &self,
        subject_id: SubjectId,
        event_id: EventId,
    ) -> LedgerResult<ReservationOutcome> {
        // Identity is fixed before the retry loop: if a commit lands but its
        // response is lost, the retried closure recognizes its own booking
        // instead of reporting a duplicate.
        let booking_id = BookingId::new();
        let ticket_id = TicketId::issue();

        let outcome = self
            .ctx
            .transactionally(
                || self.try_create(subject_id, event_id, booking_id, &ticket_id),
                LedgerError::is_retryable,
            )
            .await?;

        tracing::info!(
            booking_id = %outcome.booking_id,
            event_id = %event_id,
            is_waitlist = outcome.is_waitlist,
            "reservation created"
        );
        Ok(outcome)
    }

    async fn try_create(
        &self,
        subject_id: SubjectId,
        event_id: EventId,
        booking_id: BookingId,
        ticket_id: &TicketId,
    ) -> LedgerResult<ReservationOutcome> {
        let event = self.load_event(event_id).await?;

        if !matches!(event.status, EventStatus::Published) {
            return Err(LedgerError::EventNotOpen);
        }

        let now = self.ctx.clock().now();
        if now > event.starts_at {
            return Err(LedgerError::EventEnded);
        }

        if let Some(existing) = self
            .ctx
            .call(|| self.ctx.store().find_active_booking(subject_id, event_id))
            .await?
        {
            if existing.id == booking_id {
                // Our earlier commit landed; only the response was lost.
                return Ok(outcome_of(&existing));
            }
            return Err(LedgerError::AlreadyReserved);
        }

        let mut updated_event = event.clone();
        let mut booking = if event.has_capacity() {
            updated_event.registered_count += 1;
            Booking::confirmed(subject_id, event_id, now)
        } else {
            let position = event.waitlist_high_water + 1;
            updated_event.waitlist_count += 1;
            updated_event.waitlist_high_water = position;
            Booking::waitlisted(subject_id, event_id, position, now)
        };
        booking.id = booking_id;
        booking.ticket_id = ticket_id.clone();

        let tx = EventTransaction::new("CreateBooking", event_id, event.version)
            .with(TxOp::CreateBooking(booking.clone()))
            .with(TxOp::UpdateEvent(updated_event));
        self.ctx.commit(&tx).await?;

        Ok(outcome_of(&booking))
    }

    /// Cancel `booking_id` on behalf of `subject_id`, freeing its seat or
    /// waitlist slot.
    ///
    /// # Errors
    ///
    /// `BookingNotFound`, `Unauthorized` on subject mismatch,
    /// `AlreadyCancelled`, `CannotCancelAfterCheckIn`, or a store fault.
    pub async fn cancel_reservation(
        &self,
        booking_id: BookingId,
        subject_id: SubjectId,
    ) -> LedgerResult<CancelOutcome> {
        let outcome = self
            .ctx
            .transactionally(
                || self.try_cancel(booking_id, subject_id),
                LedgerError::is_retryable,
            )
            .await?;

        tracing::info!(
            booking_id = %booking_id,
            event_id = %outcome.event_id,
            freed_seat = outcome.freed_seat,
            "reservation cancelled"
        );
        Ok(outcome)
    }

    async fn try_cancel(
        &self,
        booking_id: BookingId,
        subject_id: SubjectId,
    ) -> LedgerResult<CancelOutcome> {
        let booking = self
            .ctx
            .call(|| self.ctx.store().get_booking(booking_id))
            .await?
            .ok_or(LedgerError::BookingNotFound)?;

        if booking.subject_id != subject_id {
            return Err(LedgerError::Unauthorized);
        }
        match booking.status {
            BookingStatus::CheckedIn => return Err(LedgerError::CannotCancelAfterCheckIn),
            BookingStatus::Cancelled | BookingStatus::Expired | BookingStatus::NoShow => {
                return Err(LedgerError::AlreadyCancelled);
            }
            BookingStatus::Confirmed | BookingStatus::Waitlist => {}
        }

        let event = self.load_event(booking.event_id).await?;
        let freed_seat = matches!(booking.status, BookingStatus::Confirmed);

        let mut cancelled = booking.clone();
        cancelled.status = BookingStatus::Cancelled;
        cancelled.cancelled_at = Some(self.ctx.clock().now());
        cancelled.is_waitlist = false;
        cancelled.waitlist_position = None;

        let mut updated_event = event.clone();
        if freed_seat {
            updated_event.registered_count = updated_event.registered_count.saturating_sub(1);
        } else {
            updated_event.waitlist_count = updated_event.waitlist_count.saturating_sub(1);
        }

        let tx = EventTransaction::new("CancelBooking", event.id, event.version)
            .with(TxOp::UpdateBooking(cancelled))
            .with(TxOp::UpdateEvent(updated_event));
        self.ctx.commit(&tx).await?;

        Ok(CancelOutcome { event_id: event.id, freed_seat })
    }

    /// Cancel, then promote the head of the waitlist into the freed seat.
    ///
    /// Promotion is a separate, retryable follow-up: its failure is logged
    /// and never propagated into the (already committed) cancel result. A
    /// later cancellation or an explicit [`Self::promote_from_waitlist`]
    /// call will pick the promotion up.
    ///
    /// # Errors
    ///
    /// Same rejections as [`Self::cancel_reservation`].
    pub async fn cancel_and_promote(
        &self,
        booking_id: BookingId,
        subject_id: SubjectId,
    ) -> LedgerResult<CancelOutcome> {
        let outcome = self.cancel_reservation(booking_id, subject_id).await?;
        if outcome.freed_seat {
            if let Err(err) = self.promote_from_waitlist(outcome.event_id).await {
                tracing::warn!(
                    event_id = %outcome.event_id,
                    error = %err,
                    "waitlist promotion after cancel failed"
                );
            }
        }
        Ok(outcome)
    }

    /// Promote the longest-waiting waitlisted booking into a free seat.
    ///
    /// Returns `None` when capacity is already consumed or the waitlist is
    /// empty. The status transition, both counter updates, and the
    /// promotion notification commit in one transaction.
    ///
    /// # Errors
    ///
    /// `EventNotFound`, or a store fault that survived retries.
    pub async fn promote_from_waitlist(
        &self,
        event_id: EventId,
    ) -> LedgerResult<Option<BookingId>> {
        let promoted = self
            .ctx
            .transactionally(|| self.try_promote(event_id), LedgerError::is_retryable)
            .await?;

        if let Some(booking_id) = promoted {
            tracing::info!(
                booking_id = %booking_id,
                event_id = %event_id,
                "waitlisted booking promoted"
            );
        }
        Ok(promoted)
    }

    async fn try_promote(&self, event_id: EventId) -> LedgerResult<Option<BookingId>> {
        let event = self.load_event(event_id).await?;
        if !event.has_capacity() {
            return Ok(None);
        }

        let Some(next) = self
            .ctx
            .call(|| self.ctx.store().next_waitlisted(event_id))
            .await?
        else {
            return Ok(None);
        };

        let now = self.ctx.clock().now();
        let mut promoted = next.clone();
        promoted.status = BookingStatus::Confirmed;
        promoted.is_waitlist = false;
        promoted.waitlist_position = None;

        let mut updated_event = event.clone();
        updated_event.registered_count += 1;
        updated_event.waitlist_count = updated_event.waitlist_count.saturating_sub(1);

        let notification = Notification::waitlist_promoted(&promoted, now);

        let tx = EventTransaction::new("PromoteFromWaitlist", event_id, event.version)
            .with(TxOp::UpdateBooking(promoted))
            .with(TxOp::UpdateEvent(updated_event))
            .with(TxOp::CreateNotification(notification));
        self.ctx.commit(&tx).await?;

        Ok(Some(next.id))
    }

    /// All bookings for an event, in creation order (`GetEventParticipants`).
    ///
    /// # Errors
    ///
    /// Returns a store fault that survived retries.
    pub async fn participants(&self, event_id: EventId) -> LedgerResult<Vec<Booking>> {
        Ok(self
            .ctx
            .call(|| self.ctx.store().event_participants(event_id))
            .await?)
    }

    /// Post-event sweep: once the check-in window has closed, mark every
    /// still-confirmed booking no-show and every still-waitlisted booking
    /// expired, and complete the event.
    ///
    /// Idempotent: re-running after completion finds nothing to transition.
    ///
    /// # Errors
    ///
    /// `EventNotFound`, `EventStillOpen` before the window closes, or a
    /// store fault.
    pub async fn close_event(&self, event_id: EventId) -> LedgerResult<CloseOutcome> {
        let outcome = self
            .ctx
            .transactionally(|| self.try_close(event_id), LedgerError::is_retryable)
            .await?;

        tracing::info!(
            event_id = %event_id,
            no_shows = outcome.no_shows,
            expired = outcome.expired,
            "event closed"
        );
        Ok(outcome)
    }

    async fn try_close(&self, event_id: EventId) -> LedgerResult<CloseOutcome> {
        let event = self.load_event(event_id).await?;

        let now = self.ctx.clock().now();
        if now <= event.starts_at + self.ctx.grace_window() {
            return Err(LedgerError::EventStillOpen);
        }

        let participants = self
            .ctx
            .call(|| self.ctx.store().event_participants(event_id))
            .await?;

        let mut outcome = CloseOutcome::default();
        let mut tx = EventTransaction::new("CloseEvent", event_id, event.version);
        for booking in participants {
            match booking.status {
                BookingStatus::Confirmed => {
                    let mut swept = booking;
                    swept.status = BookingStatus::NoShow;
                    tx = tx.with(TxOp::UpdateBooking(swept));
                    outcome.no_shows += 1;
                }
                BookingStatus::Waitlist => {
                    let mut swept = booking;
                    swept.status = BookingStatus::Expired;
                    swept.is_waitlist = false;
                    swept.waitlist_position = None;
                    tx = tx.with(TxOp::UpdateBooking(swept));
                    outcome.expired += 1;
                }
                BookingStatus::CheckedIn
                | BookingStatus::Cancelled
                | BookingStatus::Expired
                | BookingStatus::NoShow => {}
            }
        }

        let mut completed = event.clone();
        completed.status = EventStatus::Completed;
        completed.waitlist_count = 0;
        tx = tx.with(TxOp::UpdateEvent(completed));
        self.ctx.commit(&tx).await?;

        Ok(outcome)
    }

    /// Load an event, treating soft-deleted records as missing.
    async fn load_event(&self, event_id: EventId) -> LedgerResult<EventRecord> {
        let event = self
            .ctx
            .call(|| self.ctx.store().get_event(event_id))
            .await?
            .ok_or(LedgerError::EventNotFound)?;
        if event.deleted_at.is_some() {
            return Err(LedgerError::EventNotFound);
        }
        Ok(event)
    }
}

fn outcome_of(booking: &Booking) -> ReservationOutcome {
    ReservationOutcome {
        booking_id: booking.id,
        ticket_id: booking.ticket_id.clone(),
        is_waitlist: booking.is_waitlist,
        waitlist_position: booking.waitlist_position,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::error::LedgerError;
    use chrono::{Duration, Utc};
    use gatelist_core::NotificationKind;
    use gatelist_store::{MemoryStore, Store};
    use gatelist_testing::{FixedClock, published_event, test_context};
    use std::sync::Arc;

    struct Fixture {
        store: MemoryStore,
        clock: Arc<FixedClock>,
        ledger: BookingLedger,
    }

    fn fixture() -> Fixture {
        let store = MemoryStore::new();
        let clock = Arc::new(FixedClock::at(Utc::now()));
        let ctx = test_context(store.clone(), Arc::clone(&clock));
        Fixture { store, clock, ledger: BookingLedger::new(ctx) }
    }

    async fn seed_event(fix: &Fixture, capacity: u32) -> EventId {
        let event = published_event(capacity, fix.clock.now() + Duration::hours(2));
        let event_id = event.id;
        fix.store.insert_event(event).await.unwrap();
        event_id
    }

    #[tokio::test]
    async fn confirms_until_capacity_then_waitlists_in_order() {
        let fix = fixture();
        let event_id = seed_event(&fix, 2).await;

        let first = fix
            .ledger
            .create_reservation(SubjectId::new(), event_id)
            .await
            .unwrap();
        let second = fix
            .ledger
            .create_reservation(SubjectId::new(), event_id)
            .await
            .unwrap();
        let third = fix
            .ledger
            .create_reservation(SubjectId::new(), event_id)
            .await
            .unwrap();
        let fourth = fix
            .ledger
            .create_reservation(SubjectId::new(), event_id)
            .await
            .unwrap();

        assert!(!first.is_waitlist);
        assert!(!second.is_waitlist);
        assert!(third.is_waitlist);
        assert_eq!(third.waitlist_position, Some(1));
        assert_eq!(fourth.waitlist_position, Some(2));

        let event = fix.store.get_event(event_id).await.unwrap().unwrap();
        assert_eq!(event.registered_count, 2);
        assert_eq!(event.waitlist_count, 2);
    }

    #[tokio::test]
    async fn second_reservation_for_same_subject_is_rejected() {
        let fix = fixture();
        let event_id = seed_event(&fix, 10).await;
        let subject = SubjectId::new();

        fix.ledger.create_reservation(subject, event_id).await.unwrap();
        let err = fix
            .ledger
            .create_reservation(subject, event_id)
            .await
            .unwrap_err();
        assert_eq!(err, LedgerError::AlreadyReserved);

        // Counters untouched by the rejected attempt.
        let event = fix.store.get_event(event_id).await.unwrap().unwrap();
        assert_eq!(event.registered_count, 1);
        assert_eq!(event.waitlist_count, 0);
    }

    #[tokio::test]
    async fn unpublished_missing_and_past_events_are_rejected() {
        let fix = fixture();

        let missing = fix
            .ledger
            .create_reservation(SubjectId::new(), EventId::new())
            .await
            .unwrap_err();
        assert_eq!(missing, LedgerError::EventNotFound);

        let mut draft = published_event(5, fix.clock.now() + Duration::hours(2));
        draft.status = EventStatus::Draft;
        let draft_id = draft.id;
        fix.store.insert_event(draft).await.unwrap();
        let not_open = fix
            .ledger
            .create_reservation(SubjectId::new(), draft_id)
            .await
            .unwrap_err();
        assert_eq!(not_open, LedgerError::EventNotOpen);

        let past = published_event(5, fix.clock.now() - Duration::hours(1));
        let past_id = past.id;
        fix.store.insert_event(past).await.unwrap();
        let ended = fix
            .ledger
            .create_reservation(SubjectId::new(), past_id)
            .await
            .unwrap_err();
        assert_eq!(ended, LedgerError::EventEnded);

        let mut deleted = published_event(5, fix.clock.now() + Duration::hours(2));
        deleted.deleted_at = Some(fix.clock.now());
        let deleted_id = deleted.id;
        fix.store.insert_event(deleted).await.unwrap();
        let gone = fix
            .ledger
            .create_reservation(SubjectId::new(), deleted_id)
            .await
            .unwrap_err();
        assert_eq!(gone, LedgerError::EventNotFound);
    }

    #[tokio::test]
    async fn cancelling_confirmed_frees_a_seat() {
        let fix = fixture();
        let event_id = seed_event(&fix, 1).await;
        let subject = SubjectId::new();

        let reservation = fix.ledger.create_reservation(subject, event_id).await.unwrap();
        let outcome = fix
            .ledger
            .cancel_reservation(reservation.booking_id, subject)
            .await
            .unwrap();
        assert!(outcome.freed_seat);

        let event = fix.store.get_event(event_id).await.unwrap().unwrap();
        assert_eq!(event.registered_count, 0);

        let booking = fix.store.get_booking(reservation.booking_id).await.unwrap().unwrap();
        assert_eq!(booking.status, BookingStatus::Cancelled);
        assert!(booking.cancelled_at.is_some());
    }

    #[tokio::test]
    async fn cancelling_waitlisted_frees_no_seat() {
        let fix = fixture();
        let event_id = seed_event(&fix, 0).await;
        let subject = SubjectId::new();

        let reservation = fix.ledger.create_reservation(subject, event_id).await.unwrap();
        assert!(reservation.is_waitlist);

        let outcome = fix
            .ledger
            .cancel_reservation(reservation.booking_id, subject)
            .await
            .unwrap();
        assert!(!outcome.freed_seat);

        let event = fix.store.get_event(event_id).await.unwrap().unwrap();
        assert_eq!(event.waitlist_count, 0);
        assert_eq!(event.registered_count, 0);
    }

    #[tokio::test]
    async fn cancel_rejections() {
        let fix = fixture();
        let event_id = seed_event(&fix, 5).await;
        let subject = SubjectId::new();

        let missing = fix
            .ledger
            .cancel_reservation(BookingId::new(), subject)
            .await
            .unwrap_err();
        assert_eq!(missing, LedgerError::BookingNotFound);

        let reservation = fix.ledger.create_reservation(subject, event_id).await.unwrap();

        let wrong_subject = fix
            .ledger
            .cancel_reservation(reservation.booking_id, SubjectId::new())
            .await
            .unwrap_err();
        assert_eq!(wrong_subject, LedgerError::Unauthorized);

        fix.ledger
            .cancel_reservation(reservation.booking_id, subject)
            .await
            .unwrap();
        let twice = fix
            .ledger
            .cancel_reservation(reservation.booking_id, subject)
            .await
            .unwrap_err();
        assert_eq!(twice, LedgerError::AlreadyCancelled);
    }

    #[tokio::test]
    async fn checked_in_bookings_cannot_cancel() {
        let fix = fixture();
        let event_id = seed_event(&fix, 5).await;
        let subject = SubjectId::new();

        let reservation = fix.ledger.create_reservation(subject, event_id).await.unwrap();

        // Flip the booking to checked-in directly through the store.
        let event = fix.store.get_event(event_id).await.unwrap().unwrap();
        let mut booking = fix.store.get_booking(reservation.booking_id).await.unwrap().unwrap();
        booking.status = BookingStatus::CheckedIn;
        booking.checked_in_at = Some(fix.clock.now());
        fix.store
            .commit(
                EventTransaction::new("CheckInParticipant", event_id, event.version)
                    .with(TxOp::UpdateBooking(booking)),
            )
            .await
            .unwrap();

        let err = fix
            .ledger
            .cancel_reservation(reservation.booking_id, subject)
            .await
            .unwrap_err();
        assert_eq!(err, LedgerError::CannotCancelAfterCheckIn);
    }

    #[tokio::test]
    async fn promotion_is_fifo_and_notifies_exactly_once() {
        let fix = fixture();
        let event_id = seed_event(&fix, 1).await;

        let holder = SubjectId::new();
        let first_waiting = SubjectId::new();
        let second_waiting = SubjectId::new();

        let seat = fix.ledger.create_reservation(holder, event_id).await.unwrap();
        let first = fix.ledger.create_reservation(first_waiting, event_id).await.unwrap();
        let second = fix.ledger.create_reservation(second_waiting, event_id).await.unwrap();
        assert_eq!(first.waitlist_position, Some(1));
        assert_eq!(second.waitlist_position, Some(2));

        fix.ledger.cancel_reservation(seat.booking_id, holder).await.unwrap();
        let promoted = fix.ledger.promote_from_waitlist(event_id).await.unwrap();
        assert_eq!(promoted, Some(first.booking_id));

        let booking = fix.store.get_booking(first.booking_id).await.unwrap().unwrap();
        assert_eq!(booking.status, BookingStatus::Confirmed);
        assert!(!booking.is_waitlist);
        assert_eq!(booking.waitlist_position, None);

        let notifications = fix.store.notifications_for(first_waiting).await.unwrap();
        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0].kind, NotificationKind::WaitlistPromoted);
        assert_eq!(notifications[0].booking_id, first.booking_id);

        // Nobody else was notified, and the second entry still waits.
        assert!(fix.store.notifications_for(second_waiting).await.unwrap().is_empty());
        let event = fix.store.get_event(event_id).await.unwrap().unwrap();
        assert_eq!(event.registered_count, 1);
        assert_eq!(event.waitlist_count, 1);
    }

    #[tokio::test]
    async fn promotion_noops_without_capacity_or_waitlist() {
        let fix = fixture();
        let event_id = seed_event(&fix, 1).await;

        // Empty waitlist, free seat.
        assert_eq!(fix.ledger.promote_from_waitlist(event_id).await.unwrap(), None);

        // Full event, populated waitlist.
        fix.ledger.create_reservation(SubjectId::new(), event_id).await.unwrap();
        fix.ledger.create_reservation(SubjectId::new(), event_id).await.unwrap();
        assert_eq!(fix.ledger.promote_from_waitlist(event_id).await.unwrap(), None);
    }

    #[tokio::test]
    async fn cancel_and_promote_fills_the_freed_seat() {
        let fix = fixture();
        let event_id = seed_event(&fix, 1).await;

        let holder = SubjectId::new();
        let waiting = SubjectId::new();
        let seat = fix.ledger.create_reservation(holder, event_id).await.unwrap();
        let queued = fix.ledger.create_reservation(waiting, event_id).await.unwrap();

        fix.ledger.cancel_and_promote(seat.booking_id, holder).await.unwrap();

        let promoted = fix.store.get_booking(queued.booking_id).await.unwrap().unwrap();
        assert_eq!(promoted.status, BookingStatus::Confirmed);

        let event = fix.store.get_event(event_id).await.unwrap().unwrap();
        assert_eq!(event.registered_count, 1);
        assert_eq!(event.waitlist_count, 0);
    }

    #[tokio::test]
    async fn waitlist_positions_are_never_reused() {
        let fix = fixture();
        let event_id = seed_event(&fix, 0).await;

        let first = fix.ledger.create_reservation(SubjectId::new(), event_id).await.unwrap();
        let leaving = SubjectId::new();
        let second = fix.ledger.create_reservation(leaving, event_id).await.unwrap();
        assert_eq!(first.waitlist_position, Some(1));
        assert_eq!(second.waitlist_position, Some(2));

        fix.ledger.cancel_reservation(second.booking_id, leaving).await.unwrap();

        let third = fix.ledger.create_reservation(SubjectId::new(), event_id).await.unwrap();
        assert_eq!(third.waitlist_position, Some(3));
    }

    #[tokio::test]
    async fn close_event_sweeps_no_shows_and_expired_waitlist() {
        let fix = fixture();
        let event_id = seed_event(&fix, 1).await;

        let no_show = SubjectId::new();
        let waiting = SubjectId::new();
        fix.ledger.create_reservation(no_show, event_id).await.unwrap();
        let queued = fix.ledger.create_reservation(waiting, event_id).await.unwrap();

        // Too early to close.
        let early = fix.ledger.close_event(event_id).await.unwrap_err();
        assert_eq!(early, LedgerError::EventStillOpen);

        // Jump past start + grace window.
        fix.clock.advance(Duration::hours(7));
        let outcome = fix.ledger.close_event(event_id).await.unwrap();
        assert_eq!(outcome.no_shows, 1);
        assert_eq!(outcome.expired, 1);

        let event = fix.store.get_event(event_id).await.unwrap().unwrap();
        assert_eq!(event.status, EventStatus::Completed);
        assert_eq!(event.waitlist_count, 0);

        let swept = fix.store.get_booking(queued.booking_id).await.unwrap().unwrap();
        assert_eq!(swept.status, BookingStatus::Expired);
        assert!(!swept.is_waitlist);

        // Idempotent: a second sweep finds nothing to transition.
        let again = fix.ledger.close_event(event_id).await.unwrap();
        assert_eq!(again, CloseOutcome::default());
    }
}
