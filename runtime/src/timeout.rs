//! Deadline wrapper for store operations.
//!
//! Every store interaction carries a fixed timeout; exceeding it is treated
//! as a retryable network fault, not a permanent failure. The elapsed timer
//! is normalized into [`StoreFault::Timeout`] so it flows through the same
//! classification table as every other fault.

use gatelist_core::StoreFault;
use std::time::Duration;

/// Default per-call deadline for store operations.
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(30);

/// Race `operation` against a timer.
///
/// # Errors
///
/// Returns the operation's own fault if it completes with one, or
/// [`StoreFault::Timeout`] if the deadline elapses first. The timeout is
/// logged with its classification code like any other fault.
pub async fn with_timeout<T, Fut>(timeout: Duration, operation: Fut) -> Result<T, StoreFault>
where
    Fut: Future<Output = Result<T, StoreFault>>,
{
    match tokio::time::timeout(timeout, operation).await {
        Ok(result) => result,
        Err(_elapsed) => {
            let fault = StoreFault::Timeout { timeout };
            let class = fault.classify();
            tracing::warn!(
                code = class.code,
                category = %class.category,
                timeout_ms = timeout.as_millis(),
                "store call exceeded its deadline"
            );
            Err(fault)
        }
    }
}
