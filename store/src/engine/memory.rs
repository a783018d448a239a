//! In-memory store engine.
//!
//! The secondary/fallback store, and the engine hermetic tests run against.
//! A single `parking_lot` lock guards the maps; `commit` performs the same
//! version-guarded, all-or-nothing apply the Postgres engine performs in a
//! database transaction.

use crate::store::{EventTransaction, Store, StoreResult, TxOp};
use async_trait::async_trait;
use gatelist_core::{
    Booking, BookingId, BookingStatus, CheckInRecord, EventId, EventRecord, Notification,
    StoreFault, SubjectId, TicketId,
};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// In-memory store with transactional commit semantics.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore(Arc<RwLock<Inner>>);

#[derive(Debug, Default)]
struct Inner {
    events: HashMap<EventId, EventRecord>,
    bookings: HashMap<BookingId, Booking>,
    check_in_log: Vec<CheckInRecord>,
    notifications: Vec<Notification>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn insert_event(&self, event: EventRecord) -> StoreResult<()> {
        let mut inner = self.0.write();
        if inner.events.contains_key(&event.id) {
            return Err(StoreFault::Backend {
                code: "duplicate-event".into(),
                detail: format!("event {} already exists", event.id),
            });
        }
        inner.events.insert(event.id, event);
        Ok(())
    }

    async fn get_event(&self, id: EventId) -> StoreResult<Option<EventRecord>> {
        Ok(self.0.read().events.get(&id).cloned())
    }

    async fn get_booking(&self, id: BookingId) -> StoreResult<Option<Booking>> {
        Ok(self.0.read().bookings.get(&id).cloned())
    }

    async fn get_booking_by_ticket(&self, ticket_id: &TicketId) -> StoreResult<Option<Booking>> {
        Ok(self
            .0
            .read()
            .bookings
            .values()
            .find(|b| &b.ticket_id == ticket_id)
            .cloned())
    }

    async fn find_active_booking(
        &self,
        subject_id: SubjectId,
        event_id: EventId,
    ) -> StoreResult<Option<Booking>> {
        Ok(self
            .0
            .read()
            .bookings
            .values()
            .find(|b| b.subject_id == subject_id && b.event_id == event_id && b.is_active())
            .cloned())
    }

    async fn event_participants(&self, event_id: EventId) -> StoreResult<Vec<Booking>> {
        let mut participants: Vec<Booking> = self
            .0
            .read()
            .bookings
            .values()
            .filter(|b| b.event_id == event_id)
            .cloned()
            .collect();
        participants.sort_by_key(|b| (b.created_at, *b.id.as_uuid()));
        Ok(participants)
    }

    async fn next_waitlisted(&self, event_id: EventId) -> StoreResult<Option<Booking>> {
        Ok(self
            .0
            .read()
            .bookings
            .values()
            .filter(|b| b.event_id == event_id && matches!(b.status, BookingStatus::Waitlist))
            .min_by_key(|b| b.waitlist_position.unwrap_or(u32::MAX))
            .cloned())
    }

    async fn check_in_log(&self, booking_id: BookingId) -> StoreResult<Vec<CheckInRecord>> {
        Ok(self
            .0
            .read()
            .check_in_log
            .iter()
            .filter(|r| r.booking_id == booking_id)
            .cloned()
            .collect())
    }

    async fn notifications_for(&self, subject_id: SubjectId) -> StoreResult<Vec<Notification>> {
        Ok(self
            .0
            .read()
            .notifications
            .iter()
            .filter(|n| n.subject_id == subject_id)
            .cloned()
            .collect())
    }

    async fn commit(&self, tx: EventTransaction) -> StoreResult<()> {
        let mut inner = self.0.write();

        {
            let event = inner
                .events
                .get(&tx.event_id)
                .ok_or_else(|| StoreFault::Missing { entity: "event".into() })?;
            if event.version != tx.expected_version {
                tracing::debug!(
                    operation = tx.operation,
                    event_id = %tx.event_id,
                    expected = tx.expected_version,
                    actual = event.version,
                    "commit aborted on version check"
                );
                return Err(StoreFault::WriteConflict { entity: "event".into() });
            }
        }

        // Validate the whole set before applying anything, so a bad op
        // leaves the store untouched.
        for op in &tx.ops {
            match op {
                TxOp::CreateBooking(b) => {
                    if inner.bookings.contains_key(&b.id) {
                        return Err(StoreFault::Backend {
                            code: "duplicate-booking".into(),
                            detail: format!("booking {} already exists", b.id),
                        });
                    }
                }
                TxOp::UpdateBooking(b) => {
                    if !inner.bookings.contains_key(&b.id) {
                        return Err(StoreFault::Missing { entity: "booking".into() });
                    }
                }
                TxOp::UpdateEvent(ev) => {
                    if ev.id != tx.event_id {
                        return Err(StoreFault::Invalid {
                            detail: format!(
                                "transaction for event {} cannot update event {}",
                                tx.event_id, ev.id
                            ),
                        });
                    }
                }
                TxOp::AppendCheckIn(_) | TxOp::CreateNotification(_) => {}
            }
        }

        let next_version = tx.expected_version + 1;
        let mut event_rewritten = false;

        for op in tx.ops {
            match op {
                TxOp::CreateBooking(b) | TxOp::UpdateBooking(b) => {
                    inner.bookings.insert(b.id, b);
                }
                TxOp::UpdateEvent(mut ev) => {
                    ev.version = next_version;
                    inner.events.insert(tx.event_id, ev);
                    event_rewritten = true;
                }
                TxOp::AppendCheckIn(record) => inner.check_in_log.push(record),
                TxOp::CreateNotification(notification) => inner.notifications.push(notification),
            }
        }

        // Every commit claims the version, even when the event row itself is
        // untouched, so all writers on one event serialize.
        if !event_rewritten {
            if let Some(event) = inner.events.get_mut(&tx.event_id) {
                event.version = next_version;
            }
        }

        Ok(())
    }
}
