//! # Gatelist Store
//!
//! The store boundary of the registration core: the [`Store`] trait is the
//! logical operation set the Booking Ledger and Check-in State Machine are
//! written against, never a specific backend's API.
//!
//! Two engines implement the trait:
//!
//! - [`MemoryStore`] (feature `memory`, default) — `parking_lot`-locked maps
//!   with exact transactional semantics; the secondary/fallback store, and
//!   the store every hermetic test runs against.
//! - `PgStore` (feature `pg`) — `PostgreSQL` via sqlx; the primary store.
//!
//! Mutations are expressed as an [`EventTransaction`]: a set of typed write
//! ops committed atomically under the owning event's version
//! (compare-and-set). A lost race surfaces as
//! [`gatelist_core::StoreFault::WriteConflict`], which the executor treats as
//! transient and retries with a fresh snapshot.
//!
//! [`StoreRouter`] composes a primary and a secondary store behind the same
//! trait, falling back transparently per logical operation.

pub mod engine;
pub mod router;
pub mod store;

pub use engine::*;
pub use router::StoreRouter;
pub use store::{EventTransaction, Store, StoreResult, TxOp};
