//! Core domain types for Tessera
//!
//! Jobs, subtasks, workers, assignments, predictions and the error taxonomy
//! shared by every other crate in the workspace.

pub mod assignment;
pub mod error;
pub mod ids;
pub mod job;
pub mod outcome;
pub mod prediction;
pub mod region;
pub mod subtask;
pub mod types;
pub mod worker;

pub use assignment::{Assignment, AssignmentState};
pub use error::{JobError, Result, SchedulingError, SubtaskError, TesseraError, WorkerError};
pub use ids::{JobId, SubtaskId, WorkerId};
pub use job::Job;
pub use outcome::{CompletedOutput, JobOutcome, JobResult, MergedOutput, MissingSubtask, PartialFailure, TileOutput};
pub use prediction::{Prediction, PredictionContext};
pub use region::{Axis, Region};
pub use subtask::{ResourceConstraints, Subtask, SubtaskShape, SubtaskStatus};
pub use types::{CapacityClass, JobType, ParseError, Priority, TaskType};
pub use worker::WorkerCapabilities;
