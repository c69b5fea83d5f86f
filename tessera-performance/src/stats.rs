//! Model statistics

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Model statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelStats {
    /// Total number of predictions served
    pub predictions: u64,

    /// Predictions served from the cold-start heuristic
    pub cold_start_predictions: u64,

    /// Total observations recorded
    pub observations: u64,

    /// Observations of failed attempts
    pub failed_observations: u64,

    /// Current number of (worker, task type) pairs tracked
    pub tracked_pairs: usize,

    /// Share of predictions served cold (0.0 to 1.0)
    pub cold_start_rate: f64,
}

/// Thread-safe statistics collector
#[derive(Debug, Default)]
pub struct StatsCollector {
    predictions: AtomicU64,
    cold_start_predictions: AtomicU64,
    observations: AtomicU64,
    failed_observations: AtomicU64,
}

impl StatsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_prediction(&self, cold_start: bool) {
        self.predictions.fetch_add(1, Ordering::Relaxed);
        if cold_start {
            self.cold_start_predictions.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_observation(&self, succeeded: bool) {
        self.observations.fetch_add(1, Ordering::Relaxed);
        if !succeeded {
            self.failed_observations.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Get current stats
    pub fn get_stats(&self, tracked_pairs: usize) -> ModelStats {
        let predictions = self.predictions.load(Ordering::Relaxed);
        let cold_start_predictions = self.cold_start_predictions.load(Ordering::Relaxed);

        let cold_start_rate = if predictions > 0 {
            cold_start_predictions as f64 / predictions as f64
        } else {
            0.0
        };

        ModelStats {
            predictions,
            cold_start_predictions,
            observations: self.observations.load(Ordering::Relaxed),
            failed_observations: self.failed_observations.load(Ordering::Relaxed),
            tracked_pairs,
            cold_start_rate,
        }
    }
}
