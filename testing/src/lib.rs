//! # Gatelist Testing
//!
//! Deterministic test doubles and fixtures for the registration core:
//!
//! - [`FixedClock`] — a settable, advanceable [`gatelist_core::Clock`] so
//!   grace-window and expiry decisions are reproducible.
//! - [`FlakyStore`] / [`FailingStore`] — fault-injecting wrappers for
//!   exercising the retry executor and the primary/secondary router.
//! - [`published_event`] / [`test_context`] — fixtures with test-scale retry
//!   delays.

pub mod clock;
pub mod fixtures;
pub mod stores;

pub use clock::FixedClock;
pub use fixtures::{fast_call_policy, fast_commit_policy, published_event, test_context};
pub use stores::{FailingStore, FlakyStore};
