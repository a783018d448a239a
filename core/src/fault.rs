//! Store-boundary fault type and the fixed error classification table.
//!
//! Every raised fault from a storage or network operation is normalized into
//! a [`StoreFault`] exactly once, at the store boundary. Downstream code
//! (executor, router, ledger, check-in) matches on the variant or asks for
//! its [`Classification`]; nothing ever probes ad hoc error fields.
//!
//! Classification is a closed table: known fault codes map to a category and
//! a retryable flag, and anything unrecognized classifies as
//! [`ErrorCategory::Unknown`] and non-retryable. Failing closed here is what
//! keeps the executor from retrying indefinitely on surprises.

use std::time::Duration;
use thiserror::Error;

/// Result type alias for store-boundary operations.
pub type FaultResult<T> = std::result::Result<T, StoreFault>;

/// Normalized fault raised by a storage or network operation.
///
/// Constructed once at the store boundary (engine implementations map their
/// backend's native errors into these variants) and never re-inspected by
/// field probing elsewhere.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreFault {
    /// The store call exceeded its deadline.
    #[error("store call timed out after {timeout:?}")]
    Timeout {
        /// The deadline that elapsed
        timeout: Duration,
    },

    /// The store could not be reached.
    #[error("store unavailable: {detail}")]
    Unavailable {
        /// Backend-specific connection detail (logged, never user-facing)
        detail: String,
    },

    /// A committed transaction lost a write-write race and was aborted.
    ///
    /// This is the optimistic-concurrency abort of the event-version check:
    /// the snapshot the caller read is stale. Retrying the whole
    /// read-check-write closure against a fresh snapshot is the correct
    /// response, so this is the one storage fault the table whitelists as
    /// retryable.
    #[error("write conflict on {entity}")]
    WriteConflict {
        /// The contested entity, for logs
        entity: String,
    },

    /// The store rejected the call for quota/throughput reasons.
    #[error("rate limited by store")]
    RateLimited,

    /// The caller is not allowed to perform this operation.
    #[error("permission denied: {detail}")]
    PermissionDenied {
        /// Backend detail (logged, never user-facing)
        detail: String,
    },

    /// The caller's credentials are missing or expired.
    #[error("unauthenticated store call: {detail}")]
    Unauthenticated {
        /// Backend detail (logged, never user-facing)
        detail: String,
    },

    /// The store rejected the request shape itself.
    #[error("invalid store request: {detail}")]
    Invalid {
        /// What was malformed
        detail: String,
    },

    /// A record the operation requires does not exist.
    #[error("{entity} not found in store")]
    Missing {
        /// The missing entity, for logs
        entity: String,
    },

    /// A stored record failed to decode.
    #[error("corrupted record: {detail}")]
    Corrupted {
        /// Decode failure detail
        detail: String,
    },

    /// The backend reported an error we recognize but cannot act on.
    #[error("store backend error {code}: {detail}")]
    Backend {
        /// Backend-native error code
        code: String,
        /// Backend detail (logged, never user-facing)
        detail: String,
    },

    /// Anything we could not recognize. Classifies non-retryable.
    #[error("unclassified store fault: {detail}")]
    Unknown {
        /// Whatever the backend gave us
        detail: String,
    },
}

/// Category a fault classifies into.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Transient connectivity problem; retryable
    Network,
    /// Caller lacks permission; surfaced verbatim
    Permission,
    /// Caller input error
    Validation,
    /// Entity missing
    NotFound,
    /// Duplicate or concurrently mutated state; caller must re-fetch
    Conflict,
    /// Throttled; retryable with backoff
    RateLimit,
    /// Storage-layer failure
    Storage,
    /// Credentials missing or expired
    Auth,
    /// Unrecognized; treated as non-retryable
    Unknown,
}

impl ErrorCategory {
    /// Stable lowercase name, used in structured log fields
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Network => "network",
            Self::Permission => "permission",
            Self::Validation => "validation",
            Self::NotFound => "not_found",
            Self::Conflict => "conflict",
            Self::RateLimit => "rate_limit",
            Self::Storage => "storage",
            Self::Auth => "auth",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The `(code, category, retryable, user message)` triple a fault maps to.
///
/// `code` is the stable internal identifier that goes into logs;
/// `user_message` is the short human-readable text callers may surface.
/// The two are deliberately distinct: internal codes never reach end users.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Classification {
    /// Stable internal fault code
    pub code: &'static str,
    /// Category per the taxonomy
    pub category: ErrorCategory,
    /// Whether the executor may retry this fault
    pub retryable: bool,
    /// Short human-readable message safe to show end users
    pub user_message: &'static str,
}

impl StoreFault {
    /// Classify this fault per the fixed table.
    #[must_use]
    pub const fn classify(&self) -> Classification {
        match self {
            Self::Timeout { .. } => Classification {
                code: "store/timeout",
                category: ErrorCategory::Network,
                retryable: true,
                user_message: "The connection timed out. Please try again.",
            },
            Self::Unavailable { .. } => Classification {
                code: "store/unavailable",
                category: ErrorCategory::Network,
                retryable: true,
                user_message: "We couldn't reach the server. Check your connection and try again.",
            },
            // Whitelisted: the CAS abort is transient by construction.
            Self::WriteConflict { .. } => Classification {
                code: "store/aborted",
                category: ErrorCategory::Storage,
                retryable: true,
                user_message: "The record changed while saving. Please try again.",
            },
            Self::RateLimited => Classification {
                code: "store/rate-limit",
                category: ErrorCategory::RateLimit,
                retryable: true,
                user_message: "Too many requests. Please wait a moment and try again.",
            },
            Self::PermissionDenied { .. } => Classification {
                code: "store/permission-denied",
                category: ErrorCategory::Permission,
                retryable: false,
                user_message: "You don't have permission to perform this action.",
            },
            Self::Unauthenticated { .. } => Classification {
                code: "store/unauthenticated",
                category: ErrorCategory::Auth,
                retryable: false,
                user_message: "Your session has expired. Please sign in again.",
            },
            Self::Invalid { .. } => Classification {
                code: "store/invalid-argument",
                category: ErrorCategory::Validation,
                retryable: false,
                user_message: "The request was invalid. Please check your input.",
            },
            Self::Missing { .. } => Classification {
                code: "store/not-found",
                category: ErrorCategory::NotFound,
                retryable: false,
                user_message: "The requested record was not found.",
            },
            Self::Corrupted { .. } => Classification {
                code: "store/corrupted",
                category: ErrorCategory::Storage,
                retryable: false,
                user_message: "Something went wrong reading your data.",
            },
            Self::Backend { .. } => Classification {
                code: "store/backend",
                category: ErrorCategory::Storage,
                retryable: false,
                user_message: "Something went wrong. Please try again later.",
            },
            Self::Unknown { .. } => Classification {
                code: "store/unknown",
                category: ErrorCategory::Unknown,
                retryable: false,
                user_message: "An unexpected error occurred.",
            },
        }
    }

    /// Whether the executor may retry this fault.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        self.classify().retryable
    }
}
