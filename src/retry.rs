//! Exponential backoff for retryable flush failures.

use crate::config::RetryConfig;
use std::time::Duration;
use tokio::time::Instant;

/// Upper bound on the doubling exponent.
const MAX_DOUBLINGS: u32 = 16;

/// Backoff parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Delay after the first failure.
    pub initial_backoff: Duration,
    /// Ceiling for the doubled delay.
    pub max_backoff: Duration,
    /// How long a failure may stay unrecovered before giving up.
    pub max_age: Duration,
}

impl RetryPolicy {
    /// Delay after `failures` consecutive failures.
    pub fn delay_for(&self, failures: u32) -> Duration {
        if failures == 0 {
            return Duration::ZERO;
        }
        let exponent = (failures - 1).min(MAX_DOUBLINGS);
        self.initial_backoff
            .saturating_mul(1u32 << exponent)
            .min(self.max_backoff)
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            initial_backoff: Duration::from_secs(config.initial_backoff_seconds),
            max_backoff: Duration::from_secs(config.max_backoff_seconds),
            max_age: Duration::from_secs(config.max_age_seconds),
        }
    }
}

/// What to do after a retryable failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Try again once the delay has passed.
    RetryIn(Duration),
    /// Failures have persisted longer than the policy allows.
    GiveUp { age: Duration },
}

/// Consecutive-failure tracker.
#[derive(Debug)]
pub struct Backoff {
    policy: RetryPolicy,
    failures: u32,
    first_failure: Option<Instant>,
    next_attempt: Option<Instant>,
}

impl Backoff {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            failures: 0,
            first_failure: None,
            next_attempt: None,
        }
    }

    /// Whether an attempt is allowed at `now`.
    pub fn ready(&self, now: Instant) -> bool {
        self.next_attempt.map_or(true, |at| now >= at)
    }

    /// Record a failure observed at `now`.
    pub fn record_failure(&mut self, now: Instant) -> RetryDecision {
        let first = *self.first_failure.get_or_insert(now);
        let age = now.saturating_duration_since(first);
        if age > self.policy.max_age {
            return RetryDecision::GiveUp { age };
        }

        self.failures = self.failures.saturating_add(1);
        let delay = self.policy.delay_for(self.failures);
        self.next_attempt = Some(now + delay);
        RetryDecision::RetryIn(delay)
    }

    /// Forget past failures after a successful attempt.
    pub fn reset(&mut self) {
        self.failures = 0;
        self.first_failure = None;
        self.next_attempt = None;
    }

    /// Consecutive failures so far.
    pub fn failures(&self) -> u32 {
        self.failures
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> RetryPolicy {
        RetryPolicy {
            initial_backoff: Duration::from_secs(10),
            max_backoff: Duration::from_secs(60),
            max_age: Duration::from_secs(300),
        }
    }

    #[test]
    fn test_delay_doubles_and_caps() {
        let policy = policy();
        assert_eq!(policy.delay_for(0), Duration::ZERO);
        assert_eq!(policy.delay_for(1), Duration::from_secs(10));
        assert_eq!(policy.delay_for(2), Duration::from_secs(20));
        assert_eq!(policy.delay_for(3), Duration::from_secs(40));
        assert_eq!(policy.delay_for(4), Duration::from_secs(60));
        assert_eq!(policy.delay_for(100), Duration::from_secs(60));
    }

    #[test]
    fn test_ready_respects_delay() {
        let mut backoff = Backoff::new(policy());
        let start = Instant::now();
        assert!(backoff.ready(start));

        assert_eq!(
            backoff.record_failure(start),
            RetryDecision::RetryIn(Duration::from_secs(10))
        );
        assert!(!backoff.ready(start + Duration::from_secs(5)));
        assert!(backoff.ready(start + Duration::from_secs(10)));
        assert_eq!(backoff.failures(), 1);
    }

    #[test]
    fn test_gives_up_after_max_age() {
        let mut backoff = Backoff::new(policy());
        let start = Instant::now();

        backoff.record_failure(start);
        backoff.record_failure(start + Duration::from_secs(100));
        let decision = backoff.record_failure(start + Duration::from_secs(301));

        assert_eq!(
            decision,
            RetryDecision::GiveUp {
                age: Duration::from_secs(301)
            }
        );
    }

    #[test]
    fn test_reset_clears_failure_window() {
        let mut backoff = Backoff::new(policy());
        let start = Instant::now();

        backoff.record_failure(start);
        backoff.reset();
        assert_eq!(backoff.failures(), 0);
        assert!(backoff.ready(start));

        // The age window restarts from the next failure.
        let later = start + Duration::from_secs(1000);
        assert_eq!(
            backoff.record_failure(later),
            RetryDecision::RetryIn(Duration::from_secs(10))
        );
    }
}
