//! Configuration management for the registration core.
//!
//! Loads configuration from environment variables with sensible defaults.
//! Everything here feeds [`crate::context::AppContext`]; nothing reads the
//! environment after startup.

use crate::context::DEFAULT_GRACE_WINDOW_HOURS;
use chrono::Duration as ChronoDuration;
use gatelist_runtime::retry::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Core configuration loaded from environment variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Retry/backoff policy for store calls
    pub retry: RetryConfig,
    /// Store connection and routing configuration
    pub store: StoreConfig,
    /// Check-in behavior
    pub checkin: CheckInConfig,
}

/// Retry/backoff configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts per store call, including the first (default: 3)
    pub max_attempts: u32,
    /// Base delay before the first retry, in milliseconds (default: 1000)
    pub initial_delay_ms: u64,
    /// Backoff cap, in milliseconds (default: 30000)
    pub max_delay_ms: u64,
    /// Backoff multiplier (default: 2.0)
    pub multiplier: f64,
}

/// Store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Per-call timeout in seconds (default: 30)
    pub timeout_secs: u64,
    /// Whether the primary store is consulted at all (default: true)
    pub primary_enabled: bool,
    /// `PostgreSQL` connection URL for the primary store (feature `pg`)
    pub database_url: Option<String>,
    /// Maximum primary-store connections in the pool (default: 5)
    pub max_connections: u32,
}

/// Check-in configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckInConfig {
    /// Grace window after event start during which check-in is still
    /// accepted, in hours (default: 4)
    pub grace_window_hours: i64,
}

impl Config {
    /// Load configuration from the environment, falling back to defaults.
    ///
    /// Reads a `.env` file when present.
    #[must_use]
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        Self {
            retry: RetryConfig {
                max_attempts: env_or("GATELIST_RETRY_MAX_ATTEMPTS", 3),
                initial_delay_ms: env_or("GATELIST_RETRY_INITIAL_DELAY_MS", 1_000),
                max_delay_ms: env_or("GATELIST_RETRY_MAX_DELAY_MS", 30_000),
                multiplier: env_or("GATELIST_RETRY_MULTIPLIER", 2.0),
            },
            store: StoreConfig {
                timeout_secs: env_or("GATELIST_STORE_TIMEOUT_SECS", 30),
                primary_enabled: env_or("GATELIST_PRIMARY_STORE_ENABLED", true),
                database_url: env::var("DATABASE_URL").ok(),
                max_connections: env_or("GATELIST_STORE_MAX_CONNECTIONS", 5),
            },
            checkin: CheckInConfig {
                grace_window_hours: env_or(
                    "GATELIST_CHECKIN_GRACE_HOURS",
                    DEFAULT_GRACE_WINDOW_HOURS,
                ),
            },
        }
    }

    /// The configured per-store-call retry policy.
    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::builder()
            .max_attempts(self.retry.max_attempts)
            .initial_delay(Duration::from_millis(self.retry.initial_delay_ms))
            .max_delay(Duration::from_millis(self.retry.max_delay_ms))
            .multiplier(self.retry.multiplier)
            .build()
    }

    /// The configured per-call store timeout.
    #[must_use]
    pub const fn store_timeout(&self) -> Duration {
        Duration::from_secs(self.store.timeout_secs)
    }

    /// The configured check-in grace window.
    #[must_use]
    pub fn grace_window(&self) -> ChronoDuration {
        ChronoDuration::hours(self.checkin.grace_window_hours)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            retry: RetryConfig {
                max_attempts: 3,
                initial_delay_ms: 1_000,
                max_delay_ms: 30_000,
                multiplier: 2.0,
            },
            store: StoreConfig {
                timeout_secs: 30,
                primary_enabled: true,
                database_url: None,
                max_connections: 5,
            },
            checkin: CheckInConfig { grace_window_hours: DEFAULT_GRACE_WINDOW_HOURS },
        }
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key).ok().and_then(|raw| raw.parse().ok()).unwrap_or(default)
}
