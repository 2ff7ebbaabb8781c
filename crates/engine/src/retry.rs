//! Retry policy for worker-side task execution.

use std::time::Duration;

/// Fixed-delay retry budget for one task.
///
/// The budget covers the whole download/process/upload attempt: a retryable
/// failure anywhere in the attempt consumes one retry and the attempt starts
/// over. Terminal failures (bad input, unknown tool, missing object) never
/// consume the budget; they fail the run immediately.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    /// One retry after 30 seconds.
    fn default() -> Self {
        Self::fixed(1, Duration::from_secs(30))
    }
}

impl RetryPolicy {
    pub fn fixed(max_retries: u32, delay: Duration) -> Self {
        Self { max_retries, delay }
    }

    pub fn no_retry() -> Self {
        Self::fixed(0, Duration::ZERO)
    }

    /// Total attempts including the first.
    pub fn attempts(&self) -> u32 {
        self.max_retries + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_one_retry_after_thirty_seconds() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_retries, 1);
        assert_eq!(policy.delay, Duration::from_secs(30));
        assert_eq!(policy.attempts(), 2);
    }

    #[test]
    fn no_retry_means_a_single_attempt() {
        assert_eq!(RetryPolicy::no_retry().attempts(), 1);
    }
}
