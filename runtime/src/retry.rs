//! Retry policy for effect execution.
//!
//! Event-store appends, bus publishes, and gateway calls are retried with
//! exponential backoff before landing in the dead-letter queue.

use std::time::Duration;

/// Retry policy with exponential backoff.
///
/// Attempt numbering: the first try is attempt 1. `should_retry(n)` answers
/// whether attempt `n` may run; `delay_for_attempt(n)` is the sleep before
/// attempt `n + 1`.
///
/// # Example
///
/// ```
/// use sahabul_runtime::RetryPolicy;
/// use std::time::Duration;
///
/// let policy = RetryPolicy::new(3, Duration::from_millis(100), Duration::from_secs(5));
/// assert!(policy.should_retry(1));
/// assert!(policy.should_retry(3));
/// assert!(!policy.should_retry(4));
/// ```
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including the first)
    max_attempts: u32,
    /// Delay before the first retry
    base_delay: Duration,
    /// Upper bound for any single delay
    max_delay: Duration,
}

impl RetryPolicy {
    /// Create a new retry policy.
    #[must_use]
    pub const fn new(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
            max_delay,
        }
    }

    /// A policy that never retries (single attempt).
    #[must_use]
    pub const fn no_retry() -> Self {
        Self::new(1, Duration::from_millis(0), Duration::from_millis(0))
    }

    /// Whether the given attempt (1-based) is allowed to run.
    #[must_use]
    pub const fn should_retry(&self, attempt: u32) -> bool {
        attempt <= self.max_attempts
    }

    /// Delay before retrying after the given attempt (0-based).
    ///
    /// Exponential: `base * 2^attempt`, capped at `max_delay`.
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.min(16));
        let delay = self.base_delay.saturating_mul(factor);
        delay.min(self.max_delay)
    }

    /// Maximum number of attempts.
    #[must_use]
    pub const fn max_attempts(&self) -> u32 {
        self.max_attempts
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(100), Duration::from_secs(10))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_allows_three_attempts() {
        let policy = RetryPolicy::default();
        assert!(policy.should_retry(1));
        assert!(policy.should_retry(3));
        assert!(!policy.should_retry(4));
    }

    #[test]
    fn delays_grow_exponentially_and_cap() {
        let policy = RetryPolicy::new(5, Duration::from_millis(100), Duration::from_millis(500));
        assert_eq!(policy.delay_for_attempt(0), Duration::from_millis(100));
        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(200));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(400));
        // Capped
        assert_eq!(policy.delay_for_attempt(3), Duration::from_millis(500));
        assert_eq!(policy.delay_for_attempt(10), Duration::from_millis(500));
    }

    #[test]
    fn no_retry_is_single_attempt() {
        let policy = RetryPolicy::no_retry();
        assert!(policy.should_retry(1));
        assert!(!policy.should_retry(2));
    }
}
