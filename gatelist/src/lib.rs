//! # Gatelist
//!
//! The correctness core of an event-registration platform: reserve a
//! capacity-limited seat, consume the reservation exactly once at the venue
//! door, and survive a flaky store while doing it.
//!
//! This is a library, not a service: page rendering, identity, uploads,
//! exports, and notification delivery all live in out-of-scope layers that
//! consume these types.
//!
//! ## Components
//!
//! - [`ledger::BookingLedger`] — transactional reservations against event
//!   capacity, one-active-booking-per-subject, FIFO waitlist promotion.
//! - [`checkin::CheckInDesk`] — ticket resolution and the idempotent
//!   check-in state machine with its append-only audit log.
//! - [`context::AppContext`] — the dependency-injected container (store,
//!   clock, connectivity, retry policies) every component is constructed
//!   with.
//! - [`config::Config`] — environment-loaded knobs for the above.
//!
//! The resilient executor lives in `gatelist-runtime`, the store trait,
//! engines, and primary/secondary router in `gatelist-store`, and the
//! domain types and fault classifier in `gatelist-core`.
//!
//! ## Example
//!
//! ```rust
//! use gatelist::context::AppContext;
//! use gatelist::ledger::BookingLedger;
//! use gatelist_core::{EventRecord, EventId, EventStatus, SubjectId};
//! use gatelist_store::{MemoryStore, Store};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = MemoryStore::new();
//! let mut event = EventRecord::new(
//!     EventId::new(),
//!     "Launch Party".into(),
//!     100,
//!     chrono::Utc::now() + chrono::Duration::days(7),
//! );
//! event.status = EventStatus::Published;
//! let event_id = event.id;
//! store.insert_event(event).await?;
//!
//! let ledger = BookingLedger::new(AppContext::new(Arc::new(store)));
//! let outcome = ledger.create_reservation(SubjectId::new(), event_id).await?;
//! assert!(!outcome.is_waitlist);
//! # Ok(())
//! # }
//! ```

pub mod checkin;
pub mod config;
pub mod context;
pub mod error;
pub mod ledger;
pub mod ticket;

pub use checkin::{CheckInDesk, CheckInOutcome};
pub use config::Config;
pub use context::AppContext;
pub use error::{CheckInError, CheckInResult, LedgerError, LedgerResult};
pub use ledger::{BookingLedger, CancelOutcome, CloseOutcome, ReservationOutcome};
pub use ticket::{TICKET_PAYLOAD_TYPE, TicketPayload};

// Re-export the domain types and the crates consumers wire the core
// together with.
pub use gatelist_core::{
    Booking, BookingId, BookingStatus, CheckInMethod, CheckInRecord, Clock, Connectivity, EventId,
    EventRecord, EventStatus, Notification, NotificationKind, OperatorId, StoreFault, SubjectId,
    SystemClock, TicketId,
};
pub use gatelist_runtime as runtime;
pub use gatelist_store as store;
