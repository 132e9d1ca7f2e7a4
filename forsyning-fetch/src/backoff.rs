//! Linear retry backoff.
//!
//! The n-th consecutive failure waits `min(base * max(n, 1), ceiling)`.

use std::time::Duration;

/// Default delay per failure.
pub const DEFAULT_BASE: Duration = Duration::from_secs(15 * 60);

/// Default upper bound on a single delay.
pub const DEFAULT_CEILING: Duration = Duration::from_secs(60 * 60);

/// Linear backoff policy with a ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    /// Delay added per consecutive failure.
    pub base: Duration,
    /// Maximum delay.
    pub ceiling: Duration,
}

impl BackoffPolicy {
    /// Creates a policy. A ceiling below `base` is raised to `base`.
    pub fn new(base: Duration, ceiling: Duration) -> Self {
        Self {
            base,
            ceiling: ceiling.max(base),
        }
    }

    /// Creates a policy from whole minutes.
    pub fn from_minutes(base: u64, ceiling: u64) -> Self {
        Self::new(
            Duration::from_secs(base * 60),
            Duration::from_secs(ceiling * 60),
        )
    }

    /// Delay before the retry following `retry_count` consecutive failures.
    pub fn next_delay(&self, retry_count: u32) -> Duration {
        self.base
            .saturating_mul(retry_count.max(1))
            .min(self.ceiling)
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_BASE, DEFAULT_CEILING)
    }
}

/// Consecutive-failure counter and the delay it produced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetryState {
    /// Consecutive failures since the last success.
    pub retry_count: u32,
    /// Delay chosen for the pending retry.
    pub next_retry_delay: Duration,
}

impl RetryState {
    /// Records a failure and returns the delay before the next attempt.
    pub fn record_failure(&mut self, policy: &BackoffPolicy) -> Duration {
        self.retry_count = self.retry_count.saturating_add(1);
        self.next_retry_delay = policy.next_delay(self.retry_count);
        self.next_retry_delay
    }

    /// Clears the counter after a success.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minutes(m: u64) -> Duration {
        Duration::from_secs(m * 60)
    }

    #[test]
    fn test_linear_then_capped() {
        let policy = BackoffPolicy::default();
        assert_eq!(policy.next_delay(0), minutes(15));
        assert_eq!(policy.next_delay(1), minutes(15));
        assert_eq!(policy.next_delay(2), minutes(30));
        assert_eq!(policy.next_delay(3), minutes(45));
        assert_eq!(policy.next_delay(4), minutes(60));
        assert_eq!(policy.next_delay(50), minutes(60));
    }

    #[test]
    fn test_delay_never_exceeds_ceiling() {
        let policy = BackoffPolicy::from_minutes(7, 40);
        for n in 0..100 {
            let delay = policy.next_delay(n);
            assert!(delay <= minutes(40));
            assert!(delay >= minutes(7));
        }
        assert_eq!(policy.next_delay(u32::MAX), minutes(40));
    }

    #[test]
    fn test_five_failures_reach_ceiling() {
        let policy = BackoffPolicy::default();
        let mut state = RetryState::default();
        let delays: Vec<_> = (0..5).map(|_| state.record_failure(&policy)).collect();

        assert_eq!(
            delays,
            vec![minutes(15), minutes(30), minutes(45), minutes(60), minutes(60)]
        );
        assert_eq!(state.retry_count, 5);

        state.reset();
        assert_eq!(state.retry_count, 0);
        assert_eq!(state.next_retry_delay, Duration::ZERO);
    }

    #[test]
    fn test_ceiling_below_base_is_raised() {
        let policy = BackoffPolicy::from_minutes(20, 10);
        assert_eq!(policy.ceiling, minutes(20));
    }
}
