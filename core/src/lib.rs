//! # Gatelist Core
//!
//! Domain types and leaf abstractions for the gatelist event-registration core.
//!
//! This crate defines:
//!
//! - **Domain records** ([`types`]): events with capacity counters, bookings
//!   with their soft lifecycle, the append-only check-in log, and waitlist
//!   promotion notifications.
//! - **Fault classification** ([`fault`]): the closed [`StoreFault`] enum
//!   constructed at the store boundary, and the fixed table that maps each
//!   fault to a `(code, category, retryable, user message)` classification.
//! - **Environment traits** ([`environment`]): injected dependencies
//!   ([`Clock`], [`Connectivity`]) so business logic never reaches for
//!   ambient globals.
//!
//! Everything above this crate (executor, stores, ledger, check-in) is written
//! against these types; nothing here performs I/O.

// Re-export commonly used types
pub use chrono::{DateTime, Utc};

pub mod environment;
pub mod fault;
pub mod types;

pub use environment::{Clock, Connectivity, SystemClock};
pub use fault::{Classification, ErrorCategory, FaultResult, StoreFault};
pub use types::{
    Booking, BookingId, BookingStatus, CheckInMethod, CheckInRecord, EventId, EventRecord,
    EventStatus, Notification, NotificationId, NotificationKind, OperatorId, SubjectId, TicketId,
};
