//! Scheduler configuration

use serde::{Deserialize, Serialize};

use crate::error::ConfigResult;
use crate::validation::{validate_range, Validatable};

/// Scheduler configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Ranked backup candidates returned after the primary
    pub backup_count: usize,

    /// Cap applied to failure probabilities when scoring
    pub max_failure_probability: f64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            backup_count: 2,
            max_failure_probability: 0.99,
        }
    }
}

impl Validatable for SchedulerConfig {
    fn validate(&self) -> ConfigResult<()> {
        validate_range(
            self.max_failure_probability,
            0.0,
            0.999_999,
            "max_failure_probability",
            self.domain_name(),
        )
    }

    fn domain_name(&self) -> &'static str {
        "scheduler"
    }
}
