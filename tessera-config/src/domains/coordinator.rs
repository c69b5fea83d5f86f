//! Execution coordinator configuration

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

use crate::error::ConfigResult;
use crate::validation::{validate_positive, Validatable};

/// Execution coordinator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    /// Attempts per subtask before it fails permanently
    pub max_attempts: u32,

    /// Delay between a failed attempt and the next one
    pub retry: RetryConfig,

    /// How long a finished job's result stays queryable
    #[serde(with = "humantime_serde")]
    pub result_retention: Duration,

    /// Period of the maintenance loop (heartbeat sweep and garbage collection)
    #[serde(with = "humantime_serde")]
    pub sweep_interval: Duration,
}

/// Retry backoff configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub backoff: BackoffKind,

    #[serde(with = "humantime_serde")]
    pub base_delay: Duration,

    #[serde(with = "humantime_serde")]
    pub max_delay: Duration,

    /// Randomize delays by up to +/-25%
    pub jitter: bool,
}

/// Shape of the retry backoff curve
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BackoffKind {
    #[default]
    Fixed,
    Linear,
    Exponential,
}

impl FromStr for BackoffKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "fixed" => Ok(BackoffKind::Fixed),
            "linear" => Ok(BackoffKind::Linear),
            "exponential" => Ok(BackoffKind::Exponential),
            _ => Err(format!("Invalid backoff kind: {}", s)),
        }
    }
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            retry: RetryConfig::default(),
            result_retention: Duration::from_secs(600),
            sweep_interval: Duration::from_secs(1),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            backoff: BackoffKind::Fixed,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(5),
            jitter: false,
        }
    }
}

impl Validatable for CoordinatorConfig {
    fn validate(&self) -> ConfigResult<()> {
        validate_positive(self.max_attempts, "max_attempts", self.domain_name())?;
        validate_positive(self.sweep_interval.as_millis(), "sweep_interval", self.domain_name())?;
        self.retry.validate()
    }

    fn domain_name(&self) -> &'static str {
        "coordinator"
    }
}

impl Validatable for RetryConfig {
    fn validate(&self) -> ConfigResult<()> {
        if self.max_delay < self.base_delay {
            return Err(self.validation_error(format!(
                "max_delay ({:?}) must not be shorter than base_delay ({:?})",
                self.max_delay, self.base_delay
            )));
        }
        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "coordinator.retry"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coordinator_defaults() {
        let config = CoordinatorConfig::default();
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.retry.base_delay, Duration::from_millis(100));
        assert_eq!(config.result_retention, Duration::from_secs(600));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_attempts_rejected() {
        let config = CoordinatorConfig {
            max_attempts: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_retry_delay_order() {
        let retry = RetryConfig {
            base_delay: Duration::from_secs(10),
            max_delay: Duration::from_secs(1),
            ..Default::default()
        };
        assert!(retry.validate().is_err());
        assert_eq!("Exponential".parse::<BackoffKind>().unwrap(), BackoffKind::Exponential);
    }
}
