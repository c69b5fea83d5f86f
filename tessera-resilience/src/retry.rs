//! Retry policy for subtask attempts

use log::debug;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tessera_config::CoordinatorConfig;

use crate::backoff::{BackoffCalculator, BackoffStrategy};

/// Retry policy configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum number of attempts, including the first
    pub max_attempts: u32,

    /// Initial delay between attempts
    #[serde(with = "humantime_serde")]
    pub initial_delay: Duration,

    /// Maximum delay between attempts
    #[serde(with = "humantime_serde")]
    pub max_delay: Duration,

    pub backoff_strategy: BackoffStrategy,

    /// Whether to add jitter to retry delays
    pub jitter: bool,
}

/// What to do after an attempt failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Make another attempt after the delay
    RetryAfter(Duration),
    /// The failure is final
    GiveUp,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&CoordinatorConfig::default())
    }
}

impl From<&CoordinatorConfig> for RetryPolicy {
    fn from(config: &CoordinatorConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            initial_delay: config.retry.base_delay,
            max_delay: config.retry.max_delay,
            backoff_strategy: config.retry.backoff.into(),
            jitter: config.retry.jitter,
        }
    }
}

impl RetryPolicy {
    /// Calculate delay after a failed attempt
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        BackoffCalculator::new(
            self.backoff_strategy.clone(),
            self.initial_delay,
            self.max_delay,
            self.jitter,
        )
        .calculate_delay(attempt)
    }

    /// Decide what follows the failure of `attempt` (1-based)
    pub fn decide(&self, attempt: u32, retryable: bool) -> RetryDecision {
        if !retryable {
            debug!("Attempt {} failed with a non-retryable error", attempt);
            return RetryDecision::GiveUp;
        }
        if attempt >= self.max_attempts {
            debug!("Attempt {} of {} failed, giving up", attempt, self.max_attempts);
            return RetryDecision::GiveUp;
        }
        RetryDecision::RetryAfter(self.delay_for_attempt(attempt))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_budget_is_respected() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.decide(1, true), RetryDecision::RetryAfter(Duration::from_millis(100)));
        assert_eq!(policy.decide(2, true), RetryDecision::RetryAfter(Duration::from_millis(100)));
        assert_eq!(policy.decide(3, true), RetryDecision::GiveUp);
    }

    #[test]
    fn test_non_retryable_gives_up_immediately() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.decide(1, false), RetryDecision::GiveUp);
    }

    #[test]
    fn test_single_attempt_policy() {
        let policy = RetryPolicy {
            max_attempts: 1,
            ..Default::default()
        };
        assert_eq!(policy.decide(1, true), RetryDecision::GiveUp);
    }

    #[test]
    fn test_from_coordinator_config() {
        let mut config = CoordinatorConfig::default();
        config.max_attempts = 5;
        config.retry.backoff = tessera_config::BackoffKind::Linear;
        let policy = RetryPolicy::from(&config);
        assert_eq!(policy.max_attempts, 5);
        assert_eq!(policy.delay_for_attempt(3), Duration::from_millis(300));
    }
}
