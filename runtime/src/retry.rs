//! Retry logic with exponential backoff for handling transient failures.
//!
//! Operations against the store may fail transiently (connection drops,
//! rate limits, optimistic-concurrency aborts). This module retries them
//! with exponentially growing, jittered delays, and gives up immediately on
//! faults the classification table marks non-retryable or when the process
//! knows it is offline.
//!
//! # Example
//!
//! ```rust
//! use gatelist_runtime::retry::{RetryPolicy, retry_classified};
//! use gatelist_core::Connectivity;
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), gatelist_core::StoreFault> {
//! let policy = RetryPolicy::builder()
//!     .max_attempts(5)
//!     .initial_delay(Duration::from_millis(100))
//!     .max_delay(Duration::from_secs(10))
//!     .multiplier(2.0)
//!     .build();
//! let connectivity = Connectivity::new();
//!
//! let result = retry_classified(&policy, &connectivity, || async {
//!     // Your fallible store operation here
//!     Ok::<_, gatelist_core::StoreFault>(42)
//! }).await?;
//! # Ok(())
//! # }
//! ```

use gatelist_core::{Connectivity, StoreFault};
use rand::Rng;
use std::time::Duration;
use tokio::time::sleep;

/// Retry policy configuration for exponential backoff.
///
/// # Default Values
///
/// - `max_attempts`: 3 (the first call plus two retries)
/// - `initial_delay`: 1 second
/// - `max_delay`: 30 seconds
/// - `multiplier`: 2.0 (delay doubles each retry)
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first call
    pub max_attempts: u32,
    /// Delay before the first retry
    pub initial_delay: Duration,
    /// Maximum delay between retries (cap for exponential backoff)
    pub max_delay: Duration,
    /// Multiplier for exponential backoff
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Create a new policy builder.
    #[must_use]
    pub const fn builder() -> RetryPolicyBuilder {
        RetryPolicyBuilder {
            max_attempts: None,
            initial_delay: None,
            max_delay: None,
            multiplier: None,
        }
    }

    /// Policy for optimistic-concurrency commit loops.
    ///
    /// Version conflicts on an in-contention event resolve in microseconds,
    /// so this uses many short attempts instead of few long ones. The jitter
    /// spreads racing writers apart.
    #[must_use]
    pub const fn transactional() -> Self {
        Self {
            max_attempts: 16,
            initial_delay: Duration::from_millis(2),
            max_delay: Duration::from_millis(50),
            multiplier: 2.0,
        }
    }

    /// Calculate the un-jittered delay after a given failed attempt.
    ///
    /// Uses exponential backoff: `initial_delay * multiplier^attempt`,
    /// capped at `max_delay`. `attempt` is zero-based: the delay after the
    /// first failure is `delay_for_attempt(0) == initial_delay`.
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return self.initial_delay.min(self.max_delay);
        }

        let delay_ms =
            self.initial_delay.as_millis() as f64 * self.multiplier.powi(attempt as i32);

        let delay = Duration::from_millis(delay_ms as u64);

        if delay > self.max_delay { self.max_delay } else { delay }
    }

    /// The delay actually slept: [`Self::delay_for_attempt`] with ±25% jitter.
    ///
    /// Jitter keeps a burst of callers that failed together from retrying in
    /// lockstep against a recovering backend.
    #[must_use]
    pub fn jittered_delay(&self, attempt: u32) -> Duration {
        let base = self.delay_for_attempt(attempt);
        let factor: f64 = rand::thread_rng().gen_range(0.75..=1.25);
        Duration::from_secs_f64(base.as_secs_f64() * factor)
    }
}

/// Builder for [`RetryPolicy`].
#[derive(Debug, Clone)]
pub struct RetryPolicyBuilder {
    max_attempts: Option<u32>,
    initial_delay: Option<Duration>,
    max_delay: Option<Duration>,
    multiplier: Option<f64>,
}

impl RetryPolicyBuilder {
    /// Set the total number of attempts, including the first call.
    #[must_use]
    pub const fn max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    /// Set delay before the first retry.
    #[must_use]
    pub const fn initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = Some(delay);
        self
    }

    /// Set maximum delay (cap for exponential backoff).
    #[must_use]
    pub const fn max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = Some(delay);
        self
    }

    /// Set multiplier for exponential backoff.
    #[must_use]
    pub const fn multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = Some(multiplier);
        self
    }

    /// Build the [`RetryPolicy`].
    #[must_use]
    pub fn build(self) -> RetryPolicy {
        let defaults = RetryPolicy::default();
        RetryPolicy {
            max_attempts: self.max_attempts.unwrap_or(defaults.max_attempts).max(1),
            initial_delay: self.initial_delay.unwrap_or(defaults.initial_delay),
            max_delay: self.max_delay.unwrap_or(defaults.max_delay),
            multiplier: self.multiplier.unwrap_or(defaults.multiplier),
        }
    }
}

/// Retry an async operation, deciding retryability with a predicate.
///
/// The operation is attempted up to `policy.max_attempts` times. After each
/// failure the error is passed to `is_retryable`; a `false` answer (or an
/// offline [`Connectivity`] signal) propagates the error immediately without
/// sleeping.
///
/// # Errors
///
/// Returns the last error once attempts are exhausted, or the first
/// non-retryable error.
pub async fn retry_with_predicate<F, Fut, T, E, P>(
    policy: &RetryPolicy,
    connectivity: &Connectivity,
    mut operation: F,
    is_retryable: P,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
    P: Fn(&E) -> bool,
{
    let mut attempt: u32 = 1;

    loop {
        match operation().await {
            Ok(result) => {
                if attempt > 1 {
                    tracing::info!(attempt, "operation succeeded after retry");
                }
                return Ok(result);
            }
            Err(err) => {
                if !is_retryable(&err) {
                    tracing::warn!(
                        error = %err,
                        "fault is not retryable, failing immediately"
                    );
                    return Err(err);
                }

                if attempt >= policy.max_attempts {
                    tracing::error!(
                        attempt,
                        error = %err,
                        "operation failed after max attempts"
                    );
                    return Err(err);
                }

                if !connectivity.is_online() {
                    tracing::warn!(
                        error = %err,
                        "offline, short-circuiting remaining retries"
                    );
                    return Err(err);
                }

                let delay = policy.jittered_delay(attempt - 1);
                tracing::warn!(
                    attempt,
                    delay_ms = delay.as_millis(),
                    error = %err,
                    "operation failed, retrying"
                );

                sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

/// Retry a store operation, deciding retryability from the classification
/// table.
///
/// This is [`retry_with_predicate`] specialized to [`StoreFault`]: a fault
/// retries exactly when its classification is marked retryable (network,
/// rate-limit, optimistic-concurrency abort).
///
/// # Errors
///
/// Returns the last fault once attempts are exhausted, or the first
/// non-retryable fault.
pub async fn retry_classified<F, Fut, T>(
    policy: &RetryPolicy,
    connectivity: &Connectivity,
    operation: F,
) -> Result<T, StoreFault>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, StoreFault>>,
{
    retry_with_predicate(policy, connectivity, operation, StoreFault::is_retryable).await
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Instant;

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy::builder()
            .max_attempts(max_attempts)
            .initial_delay(Duration::from_millis(10))
            .max_delay(Duration::from_millis(200))
            .build()
    }

    #[test]
    fn delay_calculation_is_exponential() {
        let policy = RetryPolicy::builder()
            .initial_delay(Duration::from_millis(100))
            .multiplier(2.0)
            .max_delay(Duration::from_secs(10))
            .build();

        assert_eq!(policy.delay_for_attempt(0), Duration::from_millis(100));
        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(200));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(400));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_millis(800));
    }

    #[test]
    fn delay_is_capped_at_max() {
        let policy = RetryPolicy::builder()
            .initial_delay(Duration::from_millis(1000))
            .multiplier(10.0)
            .max_delay(Duration::from_secs(2))
            .build();

        // 1000ms * 10^5 would be far past the cap
        assert_eq!(policy.delay_for_attempt(5), Duration::from_secs(2));
    }

    #[test]
    fn jitter_stays_within_quarter_band() {
        let policy = RetryPolicy::builder()
            .initial_delay(Duration::from_millis(100))
            .build();

        for _ in 0..100 {
            let jittered = policy.jittered_delay(0);
            assert!(jittered >= Duration::from_millis(75), "{jittered:?} below band");
            assert!(jittered <= Duration::from_millis(125), "{jittered:?} above band");
        }
    }

    #[tokio::test]
    async fn succeeds_on_first_try_without_sleeping() {
        let counter = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&counter);

        let result = retry_classified(&fast_policy(3), &Connectivity::new(), || {
            let c = Arc::clone(&c);
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Ok::<_, StoreFault>(42)
            }
        })
        .await;

        assert_eq!(result, Ok(42));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn two_network_faults_then_success_takes_three_attempts() {
        let policy = fast_policy(3);
        let counter = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&counter);
        let started = Instant::now();

        let result = retry_classified(&policy, &Connectivity::new(), || {
            let c = Arc::clone(&c);
            async move {
                let attempt = c.fetch_add(1, Ordering::SeqCst);
                if attempt < 2 {
                    Err(StoreFault::Unavailable { detail: format!("attempt {attempt}") })
                } else {
                    Ok(7)
                }
            }
        })
        .await;

        assert_eq!(result, Ok(7));
        assert_eq!(counter.load(Ordering::SeqCst), 3);

        // Slept delays: ~10ms and ~20ms, each jittered by at most ±25%.
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(10), "{elapsed:?} too fast");
        assert!(elapsed <= Duration::from_millis(10 + 20) * 2, "{elapsed:?} too slow");
    }

    #[tokio::test]
    async fn exhausts_attempts_on_persistent_fault() {
        let counter = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&counter);

        let result: Result<i32, StoreFault> =
            retry_classified(&fast_policy(3), &Connectivity::new(), || {
                let c = Arc::clone(&c);
                async move {
                    c.fetch_add(1, Ordering::SeqCst);
                    Err(StoreFault::RateLimited)
                }
            })
            .await;

        assert_eq!(result, Err(StoreFault::RateLimited));
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn non_retryable_fault_fails_immediately() {
        let counter = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&counter);

        let result: Result<i32, StoreFault> =
            retry_classified(&fast_policy(5), &Connectivity::new(), || {
                let c = Arc::clone(&c);
                async move {
                    c.fetch_add(1, Ordering::SeqCst);
                    Err(StoreFault::PermissionDenied { detail: "rules".into() })
                }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn offline_short_circuits_retries() {
        let counter = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&counter);

        let result: Result<i32, StoreFault> =
            retry_classified(&fast_policy(5), &Connectivity::offline(), || {
                let c = Arc::clone(&c);
                async move {
                    c.fetch_add(1, Ordering::SeqCst);
                    Err(StoreFault::Unavailable { detail: "airplane mode".into() })
                }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn predicate_variant_respects_caller_rules() {
        let counter = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&counter);

        let result: Result<i32, String> = retry_with_predicate(
            &fast_policy(5),
            &Connectivity::new(),
            || {
                let c = Arc::clone(&c);
                async move {
                    c.fetch_add(1, Ordering::SeqCst);
                    Err("permanent".to_string())
                }
            },
            |err: &String| err.contains("transient"),
        )
        .await;

        assert!(result.is_err());
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }
}
