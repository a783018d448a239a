//! Primary/secondary store routing.
//!
//! The router implements [`Store`] itself, so the ledger and check-in desk
//! never know which engine served them. Every logical operation tries the
//! primary first (when enabled), logs the fault with the operation name, and
//! transparently re-dispatches the identical call to the secondary. One arm
//! per logical operation name; the secondary implements every operation the
//! primary does, so routing never narrows the API.

use crate::store::{EventTransaction, Store, StoreResult};
use async_trait::async_trait;
use gatelist_core::{
    Booking, BookingId, CheckInRecord, EventId, EventRecord, Notification, StoreFault, SubjectId,
    TicketId,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Routes each logical operation to the primary store, falling back to the
/// secondary on any fault.
pub struct StoreRouter {
    primary: Arc<dyn Store>,
    secondary: Arc<dyn Store>,
    primary_enabled: AtomicBool,
}

impl StoreRouter {
    /// Compose a primary and a secondary store. The primary starts enabled.
    #[must_use]
    pub fn new(primary: Arc<dyn Store>, secondary: Arc<dyn Store>) -> Self {
        Self { primary, secondary, primary_enabled: AtomicBool::new(true) }
    }

    /// Whether the primary store is currently consulted at all.
    #[must_use]
    pub fn primary_enabled(&self) -> bool {
        self.primary_enabled.load(Ordering::Relaxed)
    }

    /// Enable or disable the primary store at runtime (e.g. during a known
    /// outage); disabled means every operation goes straight to the
    /// secondary.
    pub fn set_primary_enabled(&self, enabled: bool) {
        self.primary_enabled.store(enabled, Ordering::Relaxed);
    }

    fn log_fallback(&self, operation: &'static str, fault: &StoreFault) {
        let class = fault.classify();
        tracing::warn!(
            operation,
            code = class.code,
            category = %class.category,
            error = %fault,
            "primary store failed, falling back to secondary"
        );
    }
}

#[async_trait]
impl Store for StoreRouter {
    async fn insert_event(&self, event: EventRecord) -> StoreResult<()> {
        if self.primary_enabled() {
            match self.primary.insert_event(event.clone()).await {
                Ok(()) => return Ok(()),
                Err(fault) => self.log_fallback("InsertEvent", &fault),
            }
        }
        self.secondary.insert_event(event).await
    }

    async fn get_event(&self, id: EventId) -> StoreResult<Option<EventRecord>> {
        if self.primary_enabled() {
            match self.primary.get_event(id).await {
                Ok(event) => return Ok(event),
                Err(fault) => self.log_fallback("GetEvent", &fault),
            }
        }
        self.secondary.get_event(id).await
    }

    async fn get_booking(&self, id: BookingId) -> StoreResult<Option<Booking>> {
        if self.primary_enabled() {
            match self.primary.get_booking(id).await {
                Ok(booking) => return Ok(booking),
                Err(fault) => self.log_fallback("GetBookingById", &fault),
            }
        }
        self.secondary.get_booking(id).await
    }

    async fn get_booking_by_ticket(&self, ticket_id: &TicketId) -> StoreResult<Option<Booking>> {
        if self.primary_enabled() {
            match self.primary.get_booking_by_ticket(ticket_id).await {
                Ok(booking) => return Ok(booking),
                Err(fault) => self.log_fallback("GetBookingByTicketId", &fault),
            }
        }
        self.secondary.get_booking_by_ticket(ticket_id).await
    }

    async fn find_active_booking(
        &self,
        subject_id: SubjectId,
        event_id: EventId,
    ) -> StoreResult<Option<Booking>> {
        if self.primary_enabled() {
            match self.primary.find_active_booking(subject_id, event_id).await {
                Ok(booking) => return Ok(booking),
                Err(fault) => self.log_fallback("FindActiveBooking", &fault),
            }
        }
        self.secondary.find_active_booking(subject_id, event_id).await
    }

    async fn event_participants(&self, event_id: EventId) -> StoreResult<Vec<Booking>> {
        if self.primary_enabled() {
            match self.primary.event_participants(event_id).await {
                Ok(participants) => return Ok(participants),
                Err(fault) => self.log_fallback("GetEventParticipants", &fault),
            }
        }
        self.secondary.event_participants(event_id).await
    }

    async fn next_waitlisted(&self, event_id: EventId) -> StoreResult<Option<Booking>> {
        if self.primary_enabled() {
            match self.primary.next_waitlisted(event_id).await {
                Ok(booking) => return Ok(booking),
                Err(fault) => self.log_fallback("NextWaitlisted", &fault),
            }
        }
        self.secondary.next_waitlisted(event_id).await
    }

    async fn check_in_log(&self, booking_id: BookingId) -> StoreResult<Vec<CheckInRecord>> {
        if self.primary_enabled() {
            match self.primary.check_in_log(booking_id).await {
                Ok(log) => return Ok(log),
                Err(fault) => self.log_fallback("GetCheckInLog", &fault),
            }
        }
        self.secondary.check_in_log(booking_id).await
    }

    async fn notifications_for(&self, subject_id: SubjectId) -> StoreResult<Vec<Notification>> {
        if self.primary_enabled() {
            match self.primary.notifications_for(subject_id).await {
                Ok(notifications) => return Ok(notifications),
                Err(fault) => self.log_fallback("GetNotifications", &fault),
            }
        }
        self.secondary.notifications_for(subject_id).await
    }

    async fn commit(&self, tx: EventTransaction) -> StoreResult<()> {
        if self.primary_enabled() {
            match self.primary.commit(tx.clone()).await {
                Ok(()) => return Ok(()),
                Err(fault) => self.log_fallback(tx.operation, &fault),
            }
        }
        self.secondary.commit(tx).await
    }
}
