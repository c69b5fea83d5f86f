//! Performance model for Tessera
//!
//! Predicts completion time and failure probability for (worker, task type)
//! pairs from a bounded window of observed outcomes, falling back to a
//! capacity-class heuristic until enough history exists.

pub mod model;
pub mod stats;
pub mod window;

// Re-export main types
pub use model::PerformanceModel;
pub use stats::{ModelStats, StatsCollector};
pub use window::{HourBuckets, Sample, SampleWindow};
