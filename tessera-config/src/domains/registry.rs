//! Worker registry configuration

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

use crate::error::ConfigResult;
use crate::validation::{validate_positive, Validatable};

/// Worker registry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Interval at which workers are expected to heartbeat
    #[serde(with = "humantime_serde")]
    pub heartbeat_interval: Duration,

    /// Silence after which a worker is evicted
    #[serde(with = "humantime_serde")]
    pub heartbeat_timeout: Duration,

    /// How a re-registration of a live worker is handled
    pub registration_policy: RegistrationPolicy,
}

/// Handling of duplicate registrations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RegistrationPolicy {
    /// The newest capabilities replace the old ones
    #[default]
    LastWriteWins,
    /// A live worker re-registering with different capabilities is rejected
    RejectConflicts,
}

impl FromStr for RegistrationPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "last_write_wins" => Ok(RegistrationPolicy::LastWriteWins),
            "reject_conflicts" => Ok(RegistrationPolicy::RejectConflicts),
            _ => Err(format!("Invalid registration policy: {}", s)),
        }
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval: Duration::from_secs(5),
            heartbeat_timeout: Duration::from_secs(15),
            registration_policy: RegistrationPolicy::default(),
        }
    }
}

impl Validatable for RegistryConfig {
    fn validate(&self) -> ConfigResult<()> {
        validate_positive(self.heartbeat_interval.as_millis(), "heartbeat_interval", self.domain_name())?;
        if self.heartbeat_timeout <= self.heartbeat_interval {
            return Err(self.validation_error(format!(
                "heartbeat_timeout ({:?}) must exceed heartbeat_interval ({:?})",
                self.heartbeat_timeout, self.heartbeat_interval
            )));
        }
        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "registry"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_defaults() {
        let config = RegistryConfig::default();
        assert_eq!(config.heartbeat_timeout, Duration::from_secs(15));
        assert_eq!(config.registration_policy, RegistrationPolicy::LastWriteWins);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_timeout_must_exceed_interval() {
        let config = RegistryConfig {
            heartbeat_interval: Duration::from_secs(10),
            heartbeat_timeout: Duration::from_secs(10),
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("heartbeat_timeout"));
    }

    #[test]
    fn test_policy_from_str() {
        assert_eq!(
            "reject_conflicts".parse::<RegistrationPolicy>().unwrap(),
            RegistrationPolicy::RejectConflicts
        );
        assert!("first_wins".parse::<RegistrationPolicy>().is_err());
    }
}
