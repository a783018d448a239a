//! Record fixtures and pre-wired contexts.

use chrono::{DateTime, Utc};
use gatelist::context::AppContext;
use gatelist_core::{Clock, EventId, EventRecord, EventStatus};
use gatelist_runtime::retry::RetryPolicy;
use gatelist_store::Store;
use std::sync::Arc;
use std::time::Duration;

/// A published event ready to take reservations.
#[must_use]
pub fn published_event(capacity: u32, starts_at: DateTime<Utc>) -> EventRecord {
    let mut event = EventRecord::new(EventId::new(), "Test Event".into(), capacity, starts_at);
    event.status = EventStatus::Published;
    event
}

/// Per-call retry policy with test-scale delays.
#[must_use]
pub fn fast_call_policy() -> RetryPolicy {
    RetryPolicy::builder()
        .max_attempts(3)
        .initial_delay(Duration::from_millis(5))
        .max_delay(Duration::from_millis(50))
        .build()
}

/// Commit-loop retry policy with test-scale delays.
#[must_use]
pub fn fast_commit_policy() -> RetryPolicy {
    RetryPolicy::builder()
        .max_attempts(16)
        .initial_delay(Duration::from_millis(2))
        .max_delay(Duration::from_millis(20))
        .build()
}

/// An [`AppContext`] over the given store and clock, with test-scale retry
/// delays so fault-injection tests stay fast.
#[must_use]
pub fn test_context<C: Clock + 'static>(store: impl Store + 'static, clock: Arc<C>) -> AppContext {
    AppContext::new(Arc::new(store))
        .with_clock(clock)
        .with_call_policy(fast_call_policy())
        .with_commit_policy(fast_commit_policy())
}
