//! Retry policy for connection attempts on a single server.

use std::time::Duration;

/// Fixed-delay retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts per server, including the first.
    pub attempts: u32,
    /// Delay between consecutive attempts.
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn new(attempts: u32, backoff: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            backoff,
        }
    }

    /// Delay to wait after the given 1-based attempt failed, or `None` when
    /// it was the last one.
    pub fn delay_after(&self, attempt: u32) -> Option<Duration> {
        if attempt >= self.attempts {
            None
        } else {
            Some(self.backoff)
        }
    }

    /// Upper bound on the time spent sleeping for one server.
    pub fn max_total_delay(&self) -> Duration {
        self.backoff * self.attempts.saturating_sub(1)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(500))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_delay_between_attempts() {
        let policy = RetryPolicy::new(3, Duration::from_millis(500));
        assert_eq!(policy.delay_after(1), Some(Duration::from_millis(500)));
        assert_eq!(policy.delay_after(2), Some(Duration::from_millis(500)));
        assert_eq!(policy.delay_after(3), None);
        assert_eq!(policy.max_total_delay(), Duration::from_secs(1));
    }

    #[test]
    fn test_at_least_one_attempt() {
        let policy = RetryPolicy::new(0, Duration::from_millis(500));
        assert_eq!(policy.attempts, 1);
        assert_eq!(policy.delay_after(1), None);
        assert_eq!(policy.max_total_delay(), Duration::ZERO);
    }
}
