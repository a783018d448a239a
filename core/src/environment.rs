//! Injected environment dependencies.
//!
//! Business logic in the ledger and check-in desk never reaches for ambient
//! globals: the clock and the connectivity signal are passed in explicitly
//! through a context object so tests can substitute deterministic
//! implementations.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Clock trait - abstracts time operations for testability.
///
/// Production uses [`SystemClock`]; tests use a fixed clock so grace-window
/// and expiry decisions are deterministic.
pub trait Clock: Send + Sync {
    /// Get the current time
    fn now(&self) -> DateTime<Utc>;
}

/// System clock backed by [`Utc::now`].
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Shared online/offline signal.
///
/// The retry executor checks this before sleeping: when the process knows it
/// is offline there is no point backing off and retrying, so retries
/// short-circuit immediately. The handle is cheap to clone and safe to flip
/// from another task (a platform connectivity watcher, or a test).
#[derive(Clone, Debug)]
pub struct Connectivity {
    online: Arc<AtomicBool>,
}

impl Connectivity {
    /// Create a handle that reports online
    #[must_use]
    pub fn new() -> Self {
        Self { online: Arc::new(AtomicBool::new(true)) }
    }

    /// Create a handle that reports offline
    #[must_use]
    pub fn offline() -> Self {
        Self { online: Arc::new(AtomicBool::new(false)) }
    }

    /// Whether the process currently believes it is online
    #[must_use]
    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::Relaxed)
    }

    /// Flip the online signal (shared across all clones)
    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::Relaxed);
    }
}

impl Default for Connectivity {
    fn default() -> Self {
        Self::new()
    }
}
