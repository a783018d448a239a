//! Fault-injecting store doubles.

use async_trait::async_trait;
use gatelist_core::{
    Booking, BookingId, CheckInRecord, EventId, EventRecord, Notification, StoreFault, SubjectId,
    TicketId,
};
use gatelist_store::{EventTransaction, Store, StoreResult};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

/// Wraps a store and fails the first N calls (any operation) with a fixed
/// fault, then behaves normally. Exercises the retry executor.
pub struct FlakyStore {
    inner: Arc<dyn Store>,
    failures_remaining: AtomicU32,
    fault: StoreFault,
}

impl FlakyStore {
    /// Fail the next `failures` calls with clones of `fault`.
    #[must_use]
    pub fn new(inner: Arc<dyn Store>, failures: u32, fault: StoreFault) -> Self {
        Self { inner, failures_remaining: AtomicU32::new(failures), fault }
    }

    /// Calls that have not yet been allowed through.
    #[must_use]
    pub fn failures_remaining(&self) -> u32 {
        self.failures_remaining.load(Ordering::SeqCst)
    }

    fn gate(&self) -> StoreResult<()> {
        let mut current = self.failures_remaining.load(Ordering::SeqCst);
        while current > 0 {
            match self.failures_remaining.compare_exchange(
                current,
                current - 1,
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => return Err(self.fault.clone()),
                Err(actual) => current = actual,
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Store for FlakyStore {
    async fn insert_event(&self, event: EventRecord) -> StoreResult<()> {
        self.gate()?;
        self.inner.insert_event(event).await
    }

    async fn get_event(&self, id: EventId) -> StoreResult<Option<EventRecord>> {
        self.gate()?;
        self.inner.get_event(id).await
    }

    async fn get_booking(&self, id: BookingId) -> StoreResult<Option<Booking>> {
        self.gate()?;
        self.inner.get_booking(id).await
    }

    async fn get_booking_by_ticket(&self, ticket_id: &TicketId) -> StoreResult<Option<Booking>> {
        self.gate()?;
        self.inner.get_booking_by_ticket(ticket_id).await
    }

    async fn find_active_booking(
        &self,
        subject_id: SubjectId,
        event_id: EventId,
    ) -> StoreResult<Option<Booking>> {
        self.gate()?;
        self.inner.find_active_booking(subject_id, event_id).await
    }

    async fn event_participants(&self, event_id: EventId) -> StoreResult<Vec<Booking>> {
        self.gate()?;
        self.inner.event_participants(event_id).await
    }

    async fn next_waitlisted(&self, event_id: EventId) -> StoreResult<Option<Booking>> {
        self.gate()?;
        self.inner.next_waitlisted(event_id).await
    }

    async fn check_in_log(&self, booking_id: BookingId) -> StoreResult<Vec<CheckInRecord>> {
        self.gate()?;
        self.inner.check_in_log(booking_id).await
    }

    async fn notifications_for(&self, subject_id: SubjectId) -> StoreResult<Vec<Notification>> {
        self.gate()?;
        self.inner.notifications_for(subject_id).await
    }

    async fn commit(&self, tx: EventTransaction) -> StoreResult<()> {
        self.gate()?;
        self.inner.commit(tx).await
    }
}

/// A store that refuses every call with clones of a fixed fault. Plays the
/// broken primary in router fallback tests.
pub struct FailingStore {
    fault: StoreFault,
}

impl FailingStore {
    /// Fail every call with clones of `fault`.
    #[must_use]
    pub const fn new(fault: StoreFault) -> Self {
        Self { fault }
    }

    fn refuse<T>(&self) -> StoreResult<T> {
        Err(self.fault.clone())
    }
}

impl Default for FailingStore {
    fn default() -> Self {
        Self::new(StoreFault::Unavailable { detail: "primary store is down".into() })
    }
}

#[async_trait]
impl Store for FailingStore {
    async fn insert_event(&self, _event: EventRecord) -> StoreResult<()> {
        self.refuse()
    }

    async fn get_event(&self, _id: EventId) -> StoreResult<Option<EventRecord>> {
        self.refuse()
    }

    async fn get_booking(&self, _id: BookingId) -> StoreResult<Option<Booking>> {
        self.refuse()
    }

    async fn get_booking_by_ticket(&self, _ticket_id: &TicketId) -> StoreResult<Option<Booking>> {
        self.refuse()
    }

    async fn find_active_booking(
        &self,
        _subject_id: SubjectId,
        _event_id: EventId,
    ) -> StoreResult<Option<Booking>> {
        self.refuse()
    }

    async fn event_participants(&self, _event_id: EventId) -> StoreResult<Vec<Booking>> {
        self.refuse()
    }

    async fn next_waitlisted(&self, _event_id: EventId) -> StoreResult<Option<Booking>> {
        self.refuse()
    }

    async fn check_in_log(&self, _booking_id: BookingId) -> StoreResult<Vec<CheckInRecord>> {
        self.refuse()
    }

    async fn notifications_for(&self, _subject_id: SubjectId) -> StoreResult<Vec<Notification>> {
        self.refuse()
    }

    async fn commit(&self, _tx: EventTransaction) -> StoreResult<()> {
        self.refuse()
    }
}
