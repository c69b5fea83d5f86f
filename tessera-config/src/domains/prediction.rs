//! Performance model configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::ConfigResult;
use crate::validation::{validate_positive, Validatable};

/// Performance model configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PredictionConfig {
    /// Successful samples needed before a worker's own history is trusted
    pub min_samples: usize,

    /// Samples retained per (worker, task type)
    pub window_size: usize,

    /// Population estimate of milliseconds per cost unit on a medium worker
    pub base_ms_per_cost_unit: f64,

    /// Fractional slowdown per unit of load
    pub load_penalty: f64,

    /// Hazard rate added to the failure probability per unit of load
    pub load_risk: f64,

    /// Beta prior pseudo-failures
    pub prior_failures: f64,

    /// Beta prior pseudo-successes
    pub prior_successes: f64,

    /// Age at which a worker's history counts half as much towards confidence
    #[serde(with = "humantime_serde")]
    pub recency_half_life: Duration,

    /// Samples an hour-of-day bucket needs before its factor applies
    pub hour_bucket_min_samples: usize,
}

impl Default for PredictionConfig {
    fn default() -> Self {
        Self {
            min_samples: 10,
            window_size: 1000,
            base_ms_per_cost_unit: 100.0,
            load_penalty: 0.25,
            load_risk: 0.05,
            prior_failures: 1.0,
            prior_successes: 9.0,
            recency_half_life: Duration::from_secs(3600),
            hour_bucket_min_samples: 5,
        }
    }
}

impl Validatable for PredictionConfig {
    fn validate(&self) -> ConfigResult<()> {
        let domain = self.domain_name();
        validate_positive(self.min_samples, "min_samples", domain)?;
        validate_positive(self.window_size, "window_size", domain)?;
        validate_positive(self.base_ms_per_cost_unit, "base_ms_per_cost_unit", domain)?;
        validate_positive(self.prior_failures, "prior_failures", domain)?;
        validate_positive(self.prior_successes, "prior_successes", domain)?;
        validate_positive(self.recency_half_life.as_millis(), "recency_half_life", domain)?;

        if self.load_penalty < 0.0 || self.load_risk < 0.0 {
            return Err(self.validation_error("load_penalty and load_risk must not be negative"));
        }
        if self.window_size < self.min_samples {
            return Err(self.validation_error(format!(
                "window_size ({}) must be at least min_samples ({})",
                self.window_size, self.min_samples
            )));
        }
        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "prediction"
    }
}
