//! Exponential backoff policy for transient fetch failures
//!
//! The policy is a pure function of the attempt count: it never sleeps
//! itself and holds no state between calls.

use crate::config::CrawlerConfig;
use std::time::Duration;

/// Decides whether and how long to wait before retrying a failed fetch
///
/// `attempt` counts the retries already performed, starting at 0 for the
/// first failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    base_delay: Duration,
    max_delay: Duration,
    max_attempts: u32,
}

impl BackoffPolicy {
    pub fn new(base_delay: Duration, max_delay: Duration, max_attempts: u32) -> Self {
        Self {
            base_delay,
            max_delay: max_delay.max(base_delay),
            max_attempts,
        }
    }

    /// Builds the policy from crawler configuration
    pub fn from_config(config: &CrawlerConfig) -> Self {
        Self::new(
            Duration::from_millis(config.retry_base_delay_ms),
            Duration::from_millis(config.retry_max_delay_ms),
            config.max_attempts,
        )
    }

    /// Delay before the retry following `attempt`
    ///
    /// `base_delay * 2^attempt`, capped at `max_delay`.
    pub fn next_delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    /// Returns true while another retry is allowed
    pub fn should_retry(&self, attempt: u32) -> bool {
        should_retry(attempt, self.max_attempts)
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::new(Duration::from_secs(5), Duration::from_secs(300), 3)
    }
}

/// Retry is allowed only while `attempt < max_attempts`
pub fn should_retry(attempt: u32, max_attempts: u32) -> bool {
    attempt < max_attempts
}
