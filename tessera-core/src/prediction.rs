//! Performance predictions for (worker, task type) pairs

use serde::{Deserialize, Serialize};

use crate::types::CapacityClass;

/// Per-call context fed into a prediction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionContext {
    /// Load gauge reported by the worker's last heartbeat
    pub declared_load: f64,
    /// Subtasks currently assigned to the worker by this coordinator
    pub in_flight: u32,
    pub capacity_class: CapacityClass,
    pub estimated_cost_units: f64,
    /// Hour of day (0-23), if hour-of-day adjustment should apply
    pub hour_of_day: Option<u8>,
}

impl PredictionContext {
    /// Combined load used by the load penalty and the failure adjustment
    pub fn load(&self) -> f64 {
        self.declared_load.max(0.0) + self.in_flight as f64
    }
}

impl Default for PredictionContext {
    fn default() -> Self {
        Self {
            declared_load: 0.0,
            in_flight: 0,
            capacity_class: CapacityClass::default(),
            estimated_cost_units: 1.0,
            hour_of_day: None,
        }
    }
}

/// Estimated completion time and failure risk
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub expected_time_ms: f64,
    /// Confidence in the estimate, in [0, 1]
    pub confidence: f64,
    /// Probability of failure, strictly in (0, 1)
    pub failure_probability: f64,
    /// Produced from population defaults rather than this worker's history
    pub cold_start: bool,
}

impl Prediction {
    /// Expected time inflated by the chance of having to retry.
    ///
    /// `max_failure_probability` keeps the divisor away from zero.
    pub fn score(&self, max_failure_probability: f64) -> f64 {
        let p = self.failure_probability.min(max_failure_probability);
        self.expected_time_ms / (1.0 - p)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_score_penalizes_risk() {
        let safe = Prediction {
            expected_time_ms: 100.0,
            confidence: 1.0,
            failure_probability: 0.1,
            cold_start: false,
        };
        let risky = Prediction {
            failure_probability: 0.5,
            ..safe
        };
        assert!(safe.score(0.99) < risky.score(0.99));
        assert!((risky.score(0.99) - 200.0).abs() < 1e-9);
    }

    #[test]
    fn test_score_is_capped() {
        let doomed = Prediction {
            expected_time_ms: 10.0,
            confidence: 0.0,
            failure_probability: 1.0,
            cold_start: true,
        };
        assert!(doomed.score(0.99).is_finite());
    }

    #[test]
    fn test_context_load() {
        let ctx = PredictionContext {
            declared_load: 0.5,
            in_flight: 2,
            ..Default::default()
        };
        assert_eq!(ctx.load(), 2.5);
    }
}
