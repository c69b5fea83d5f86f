//! Scheduling and execution for Tessera
//!
//! - [`Scheduler`] ranks workers for a subtask from performance predictions
//! - [`ExecutionCoordinator`] owns job and subtask state, dispatches attempts,
//!   enforces deadlines and retries, and delivers merged results
//! - [`SimulatedWorkerPool`] is an in-process [`WorkerDispatcher`] used by the
//!   CLI simulation and by tests
//!
//! [`WorkerDispatcher`]: tessera_interfaces::WorkerDispatcher

pub mod coordinator;
pub mod scheduler;
pub mod worker;

pub use coordinator::{ExecutionCoordinator, JobStatus, SubtaskView, SweepReport};
pub use scheduler::{RankedCandidate, Scheduler};
pub use worker::{RecordingDispatcher, SimulatedWorker, SimulatedWorkerPool};
