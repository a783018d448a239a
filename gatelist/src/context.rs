//! The dependency-injected application context.
//!
//! One `AppContext` is constructed per process and handed (by clone; all
//! handles are shared) to the [`crate::ledger::BookingLedger`] and the
//! [`crate::checkin::CheckInDesk`]. It owns the store handle, the clock, the
//! connectivity signal, the retry policies, and the per-call store timeout —
//! there is no module-level state anywhere in the core.

use crate::config::Config;
use chrono::Duration as ChronoDuration;
use gatelist_core::{Clock, Connectivity, StoreFault, SystemClock};
use gatelist_runtime::retry::{RetryPolicy, retry_classified, retry_with_predicate};
use gatelist_runtime::timeout::{DEFAULT_STORE_TIMEOUT, with_timeout};
use gatelist_store::{EventTransaction, Store};
use std::sync::Arc;
use std::time::Duration;

/// Default check-in grace window after an event's start time.
pub const DEFAULT_GRACE_WINDOW_HOURS: i64 = 4;

/// Process-wide dependency container for the registration core.
#[derive(Clone)]
pub struct AppContext {
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
    connectivity: Connectivity,
    /// Policy for individual store calls (network/rate-limit faults).
    call_policy: RetryPolicy,
    /// Policy for whole read-check-write closures (version conflicts).
    commit_policy: RetryPolicy,
    store_timeout: Duration,
    grace_window: ChronoDuration,
}

impl AppContext {
    /// Build a context with production defaults: system clock, online
    /// connectivity, default retry policies, 30 s store timeout, 4 h
    /// check-in grace window.
    #[must_use]
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            store,
            clock: Arc::new(SystemClock),
            connectivity: Connectivity::new(),
            call_policy: RetryPolicy::default(),
            commit_policy: RetryPolicy::transactional(),
            store_timeout: DEFAULT_STORE_TIMEOUT,
            grace_window: ChronoDuration::hours(DEFAULT_GRACE_WINDOW_HOURS),
        }
    }

    /// Build a context from loaded [`Config`].
    #[must_use]
    pub fn from_config(store: Arc<dyn Store>, config: &Config) -> Self {
        Self::new(store)
            .with_call_policy(config.retry_policy())
            .with_store_timeout(config.store_timeout())
            .with_grace_window(config.grace_window())
    }

    /// Replace the clock (tests use a fixed clock).
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Replace the connectivity signal.
    #[must_use]
    pub fn with_connectivity(mut self, connectivity: Connectivity) -> Self {
        self.connectivity = connectivity;
        self
    }

    /// Replace the per-store-call retry policy.
    #[must_use]
    pub fn with_call_policy(mut self, policy: RetryPolicy) -> Self {
        self.call_policy = policy;
        self
    }

    /// Replace the read-check-write closure retry policy.
    #[must_use]
    pub fn with_commit_policy(mut self, policy: RetryPolicy) -> Self {
        self.commit_policy = policy;
        self
    }

    /// Replace the per-call store timeout.
    #[must_use]
    pub fn with_store_timeout(mut self, timeout: Duration) -> Self {
        self.store_timeout = timeout;
        self
    }

    /// Replace the check-in grace window.
    #[must_use]
    pub fn with_grace_window(mut self, window: ChronoDuration) -> Self {
        self.grace_window = window;
        self
    }

    /// The store behind the trait object (engine or router).
    #[must_use]
    pub fn store(&self) -> &dyn Store {
        self.store.as_ref()
    }

    /// The injected clock.
    #[must_use]
    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    /// The shared connectivity signal.
    #[must_use]
    pub const fn connectivity(&self) -> &Connectivity {
        &self.connectivity
    }

    /// The read-check-write retry policy.
    #[must_use]
    pub const fn commit_policy(&self) -> &RetryPolicy {
        &self.commit_policy
    }

    /// The check-in grace window after event start.
    #[must_use]
    pub const fn grace_window(&self) -> ChronoDuration {
        self.grace_window
    }

    /// Run a read against the store with timeout and classified retry.
    ///
    /// # Errors
    ///
    /// Returns the final fault once the executor gives up.
    pub async fn call<T, F, Fut>(&self, mut operation: F) -> Result<T, StoreFault>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, StoreFault>>,
    {
        retry_classified(&self.call_policy, &self.connectivity, || {
            with_timeout(self.store_timeout, operation())
        })
        .await
    }

    /// Commit a write-set with timeout and network-fault retry.
    ///
    /// Version conflicts are *not* retried here: a stale snapshot can only be
    /// fixed by re-running the whole read-check-write closure, which is the
    /// caller's loop.
    ///
    /// # Errors
    ///
    /// Returns [`StoreFault::WriteConflict`] on a lost race, or the final
    /// fault once the executor gives up.
    pub async fn commit(&self, tx: &EventTransaction) -> Result<(), StoreFault> {
        retry_with_predicate(
            &self.call_policy,
            &self.connectivity,
            || with_timeout(self.store_timeout, self.store.commit(tx.clone())),
            |fault: &StoreFault| {
                fault.is_retryable() && !matches!(fault, StoreFault::WriteConflict { .. })
            },
        )
        .await
    }

    /// Re-run a whole read-check-write closure while it fails transiently.
    ///
    /// This is the outer loop of every ledger/check-in mutation: the closure
    /// re-reads its snapshot on each attempt, so a version conflict from
    /// [`Self::commit`] resolves against fresh state.
    ///
    /// # Errors
    ///
    /// Returns the closure's error once it is non-retryable or attempts are
    /// exhausted.
    pub async fn transactionally<T, E, F, Fut>(
        &self,
        operation: F,
        is_retryable: fn(&E) -> bool,
    ) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        retry_with_predicate(&self.commit_policy, &self.connectivity, operation, is_retryable)
            .await
    }
}

impl std::fmt::Debug for AppContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppContext")
            .field("call_policy", &self.call_policy)
            .field("commit_policy", &self.commit_policy)
            .field("store_timeout", &self.store_timeout)
            .field("grace_window", &self.grace_window)
            .finish_non_exhaustive()
    }
}
