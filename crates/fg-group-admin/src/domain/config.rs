//! # Group Admin Configuration
//!
//! Timeouts, retry budgets, and batch limits for the service.

use super::errors::GroupError;
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

/// Bounded exponential backoff.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Attempts including the first; at least 1.
    pub max_attempts: u32,
    /// Delay after the first failure.
    pub initial_backoff_ms: u64,
    /// Upper bound on any single delay.
    pub max_backoff_ms: u64,
    /// Growth factor between delays.
    pub multiplier: u32,
}

impl RetryPolicy {
    /// Delay to wait after failed attempt number `attempt` (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1);
        let factor = u64::from(self.multiplier.max(1)).saturating_pow(exponent);
        let millis = self
            .initial_backoff_ms
            .saturating_mul(factor)
            .min(self.max_backoff_ms);
        Duration::from_millis(millis)
    }

    fn validate(&self, name: &str) -> Result<(), GroupError> {
        if self.max_attempts == 0 {
            return Err(GroupError::Config(format!(
                "{name}.max_attempts must be at least 1"
            )));
        }
        if self.initial_backoff_ms > self.max_backoff_ms {
            return Err(GroupError::Config(format!(
                "{name}.initial_backoff_ms exceeds max_backoff_ms"
            )));
        }
        Ok(())
    }
}

/// Group admin service configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GroupAdminConfig {
    /// How long a mutation caller waits before getting `Timeout`.
    pub operation_timeout_ms: u64,

    /// Retry budget for transient mutation log failures.
    pub persistence_retry: RetryPolicy,

    /// Retry budget for each balancer notification.
    pub notify_retry: RetryPolicy,

    /// Largest server or table batch accepted by one move.
    pub max_batch_size: usize,

    /// Reject moves of servers/tables whose previous move is undelivered.
    /// When off, such moves serialize behind the earlier one.
    pub reject_moves_in_transition: bool,

    /// Poll interval for `wait_for_transitions`.
    pub transition_poll_interval_ms: u64,
}

impl Default for GroupAdminConfig {
    fn default() -> Self {
        Self {
            operation_timeout_ms: 30_000,
            persistence_retry: RetryPolicy {
                max_attempts: 5,
                initial_backoff_ms: 50,
                max_backoff_ms: 2_000,
                multiplier: 2,
            },
            notify_retry: RetryPolicy {
                max_attempts: 10,
                initial_backoff_ms: 100,
                max_backoff_ms: 10_000,
                multiplier: 2,
            },
            max_batch_size: 1_000,
            reject_moves_in_transition: false,
            transition_poll_interval_ms: 100,
        }
    }
}

impl GroupAdminConfig {
    /// Create a config for testing (short delays).
    pub fn for_testing() -> Self {
        Self {
            operation_timeout_ms: 2_000,
            persistence_retry: RetryPolicy {
                max_attempts: 3,
                initial_backoff_ms: 1,
                max_backoff_ms: 5,
                multiplier: 2,
            },
            notify_retry: RetryPolicy {
                max_attempts: 3,
                initial_backoff_ms: 1,
                max_backoff_ms: 5,
                multiplier: 2,
            },
            max_batch_size: 100,
            reject_moves_in_transition: false,
            transition_poll_interval_ms: 5,
        }
    }

    /// Defaults overridden by environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `FG_OPERATION_TIMEOUT_MS`: mutation timeout (default: 30000)
    /// - `FG_PERSIST_MAX_ATTEMPTS`: log commit attempts (default: 5)
    /// - `FG_NOTIFY_MAX_ATTEMPTS`: balancer delivery attempts (default: 10)
    /// - `FG_MAX_BATCH_SIZE`: largest move batch (default: 1000)
    /// - `FG_REJECT_MOVES_IN_TRANSITION`: `true`/`1` to reject (default: false)
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        let number = |key: &str| lookup(key).and_then(|v| v.trim().parse::<u64>().ok());

        if let Some(ms) = number("FG_OPERATION_TIMEOUT_MS") {
            config.operation_timeout_ms = ms;
        }
        if let Some(n) = number("FG_PERSIST_MAX_ATTEMPTS") {
            config.persistence_retry.max_attempts = u32::try_from(n).unwrap_or(u32::MAX);
        }
        if let Some(n) = number("FG_NOTIFY_MAX_ATTEMPTS") {
            config.notify_retry.max_attempts = u32::try_from(n).unwrap_or(u32::MAX);
        }
        if let Some(n) = number("FG_MAX_BATCH_SIZE") {
            config.max_batch_size = usize::try_from(n).unwrap_or(usize::MAX);
        }
        if let Some(v) = lookup("FG_REJECT_MOVES_IN_TRANSITION") {
            config.reject_moves_in_transition =
                matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes");
        }
        config
    }

    /// Check that the values can drive the service.
    pub fn validate(&self) -> Result<(), GroupError> {
        if self.operation_timeout_ms == 0 {
            return Err(GroupError::Config(
                "operation_timeout_ms must be positive".to_string(),
            ));
        }
        if self.max_batch_size == 0 {
            return Err(GroupError::Config(
                "max_batch_size must be positive".to_string(),
            ));
        }
        if self.transition_poll_interval_ms == 0 {
            return Err(GroupError::Config(
                "transition_poll_interval_ms must be positive".to_string(),
            ));
        }
        self.persistence_retry.validate("persistence_retry")?;
        self.notify_retry.validate("notify_retry")
    }

    /// `operation_timeout_ms` as a `Duration`.
    pub fn operation_timeout(&self) -> Duration {
        Duration::from_millis(self.operation_timeout_ms)
    }

    /// `transition_poll_interval_ms` as a `Duration`.
    pub fn transition_poll_interval(&self) -> Duration {
        Duration::from_millis(self.transition_poll_interval_ms)
    }
}
