//! # Tessera Decomposition
//!
//! Splits jobs into subtasks and reassembles their outputs.
//!
//! The strategy for a job type is a closed [`DecomposeStrategy`] enum resolved
//! through a [`StrategyCatalog`]. The [`Decomposer`] and the `merge` module
//! both switch on it.
//!
//! ## Example
//!
//! ```rust
//! use tessera_config::DecompositionConfig;
//! use tessera_core::Job;
//! use tessera_decomposition::Decomposer;
//! use serde_json::json;
//! use std::time::Duration;
//!
//! let decomposer = Decomposer::from_config(&DecompositionConfig::default());
//! let job = Job::new(
//!     "render.frame",
//!     json!({"region": {"x": 0, "y": 0, "width": 64, "height": 64}}),
//!     Duration::from_secs(10),
//! );
//! let subtasks = decomposer.decompose(&job, 4).unwrap();
//! assert_eq!(subtasks.len(), 4);
//! ```

pub mod decomposer;
pub mod merge;
pub mod spatial;
pub mod strategy;

pub use decomposer::Decomposer;
pub use merge::{merge, partial_failure};
pub use spatial::{bisect, DensityMap, UniformCost};
pub use strategy::{
    DecomposeStrategy, FunctionalRole, PipelineStage, SpatialStrategy, StrategyCatalog, MIN_SUBTASK_DEADLINE,
};
