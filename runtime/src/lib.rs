//! # Gatelist Runtime
//!
//! The resilient operation executor: every store interaction in the
//! registration core goes through this crate's combinators.
//!
//! - [`retry`] — retry with exponential backoff and ±25% jitter, driven by
//!   the fault classification table (or a caller-supplied predicate), with an
//!   immediate short-circuit when the process is offline.
//! - [`timeout`] — deadline wrapper; an elapsed timer becomes a
//!   [`gatelist_core::StoreFault::Timeout`] and is classified and logged like
//!   any other fault.
//!
//! The executor absorbs and retries only transient faults (network,
//! rate-limit, and the optimistic-concurrency abort); everything else
//! propagates immediately to the caller.

pub mod retry;
pub mod timeout;

pub use retry::{RetryPolicy, retry_classified, retry_with_predicate};
pub use timeout::{DEFAULT_STORE_TIMEOUT, with_timeout};
