//! Retry and discard policy for failed commits.

use offline_first_types::ToolError;
use std::time::Duration;

/// Interval between offline-driven flush retries: 10 minutes.
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_millis(10 * 60 * 1000);

/// Decides what happens to a batch after a failed commit.
pub trait RetryPolicy: Send + Sync {
    /// Drop the batch instead of retrying it.
    ///
    /// `attempts` is the failed-attempt count including this failure.
    fn discard(&self, error: &ToolError, attempts: u32) -> bool;

    /// Delay before the next scheduled retry.
    fn retry(&self, attempts: u32) -> Duration;
}

/// Never discards; retries on a constant interval regardless of attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedInterval {
    interval: Duration,
}

impl FixedInterval {
    /// Retry every `interval`.
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }

    /// The configured interval.
    pub fn interval(&self) -> Duration {
        self.interval
    }
}

impl Default for FixedInterval {
    fn default() -> Self {
        Self::new(DEFAULT_RETRY_INTERVAL)
    }
}

impl RetryPolicy for FixedInterval {
    fn discard(&self, _error: &ToolError, _attempts: u32) -> bool {
        false
    }

    fn retry(&self, _attempts: u32) -> Duration {
        self.interval
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_interval_is_ten_minutes() {
        assert_eq!(FixedInterval::default().retry(1), Duration::from_millis(600_000));
    }

    #[test]
    fn interval_ignores_attempt_count() {
        let policy = FixedInterval::default();
        assert_eq!(policy.retry(1), policy.retry(50));
    }

    #[test]
    fn default_policy_never_discards() {
        let policy = FixedInterval::default();
        let err = ToolError::Failed("permission denied".into());
        assert!(!policy.discard(&err, 1));
        assert!(!policy.discard(&err, u32::MAX));
    }
}
