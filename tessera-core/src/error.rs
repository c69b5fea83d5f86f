//! Core error types for Tessera

use thiserror::Error;

use crate::ids::{JobId, SubtaskId, WorkerId};
use crate::types::{JobType, TaskType};

/// Core error type for all Tessera errors
#[derive(Debug, Error)]
pub enum TesseraError {
    /// Job-related errors
    #[error("Job error: {0}")]
    Job(#[from] JobError),

    /// Worker-related errors
    #[error("Worker error: {0}")]
    Worker(#[from] WorkerError),

    /// Scheduling errors
    #[error("Scheduling error: {0}")]
    Scheduling(#[from] SchedulingError),

    /// Subtask execution errors
    #[error("Subtask error: {0}")]
    Subtask(#[from] SubtaskError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Generic errors
    #[error("{0}")]
    Other(String),
}

/// Result type alias for Tessera
pub type Result<T> = std::result::Result<T, TesseraError>;

/// Job-related errors
#[derive(Debug, Error)]
pub enum JobError {
    #[error("Job not found: {0}")]
    NotFound(JobId),

    #[error("Unsupported job type: {0}")]
    UnsupportedJobType(JobType),

    #[error("Invalid payload for job type {job_type}: {reason}")]
    InvalidPayload { job_type: JobType, reason: String },

    #[error("Job rejected: {0}")]
    Rejected(String),
}

/// Worker-related errors
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Worker not found: {0}")]
    NotFound(WorkerId),

    #[error("Worker {0} is already registered with different capabilities")]
    DuplicateRegistration(WorkerId),
}

/// Scheduling errors
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SchedulingError {
    /// No available worker that declares the task type is left to try.
    #[error("No capable worker for task type {0}")]
    NoCapableWorker(TaskType),

    /// Capable workers exist but every one of them is at capacity.
    #[error("All capable workers for task type {0} are busy")]
    AllWorkersBusy(TaskType),
}

/// Errors describing why a single subtask attempt did not succeed
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SubtaskError {
    #[error("Subtask not found: {0}")]
    NotFound(SubtaskId),

    #[error("Worker {worker_id} did not report within {deadline_ms}ms")]
    WorkerTimeout { worker_id: WorkerId, deadline_ms: u64 },

    #[error("Worker {worker_id} reported failure: {message}")]
    WorkerReportedFailure { worker_id: WorkerId, message: String },

    #[error("Worker {0} was lost while the subtask was in flight")]
    WorkerLost(WorkerId),

    #[error("Dispatch to worker {worker_id} failed: {message}")]
    DispatchFailed { worker_id: WorkerId, message: String },
}

impl SubtaskError {
    /// The worker blamed for this failure, if any
    pub fn worker_id(&self) -> Option<&WorkerId> {
        match self {
            SubtaskError::NotFound(_) => None,
            SubtaskError::WorkerTimeout { worker_id, .. }
            | SubtaskError::WorkerReportedFailure { worker_id, .. }
            | SubtaskError::DispatchFailed { worker_id, .. } => Some(worker_id),
            SubtaskError::WorkerLost(worker_id) => Some(worker_id),
        }
    }
}

impl TesseraError {
    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            TesseraError::Subtask(SubtaskError::NotFound(_)) => false,
            TesseraError::Subtask(_) => true,
            TesseraError::Scheduling(SchedulingError::AllWorkersBusy(_)) => true,
            _ => false,
        }
    }

    /// Get the error code for API responses
    pub fn error_code(&self) -> &'static str {
        match self {
            TesseraError::Job(JobError::NotFound(_)) => "JOB_NOT_FOUND",
            TesseraError::Job(JobError::UnsupportedJobType(_)) => "UNSUPPORTED_JOB_TYPE",
            TesseraError::Job(JobError::InvalidPayload { .. }) => "INVALID_PAYLOAD",
            TesseraError::Job(JobError::Rejected(_)) => "JOB_REJECTED",
            TesseraError::Worker(WorkerError::NotFound(_)) => "WORKER_NOT_FOUND",
            TesseraError::Worker(WorkerError::DuplicateRegistration(_)) => "DUPLICATE_REGISTRATION",
            TesseraError::Scheduling(SchedulingError::NoCapableWorker(_)) => "NO_CAPABLE_WORKER",
            TesseraError::Scheduling(SchedulingError::AllWorkersBusy(_)) => "ALL_WORKERS_BUSY",
            TesseraError::Subtask(SubtaskError::NotFound(_)) => "SUBTASK_NOT_FOUND",
            TesseraError::Subtask(SubtaskError::WorkerTimeout { .. }) => "WORKER_TIMEOUT",
            TesseraError::Subtask(SubtaskError::WorkerReportedFailure { .. }) => {
                "WORKER_REPORTED_FAILURE"
            }
            TesseraError::Subtask(SubtaskError::WorkerLost(_)) => "WORKER_LOST",
            TesseraError::Subtask(SubtaskError::DispatchFailed { .. }) => "DISPATCH_FAILED",
            TesseraError::Config(_) => "CONFIG_ERROR",
            TesseraError::Serialization(_) => "SERIALIZATION_ERROR",
            TesseraError::Other(_) => "INTERNAL_ERROR",
        }
    }

    /// Whether the error was produced while validating a submission
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            TesseraError::Job(
                JobError::UnsupportedJobType(_) | JobError::InvalidPayload { .. } | JobError::Rejected(_)
            )
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_retryable() {
        let timeout = TesseraError::from(SubtaskError::WorkerTimeout {
            worker_id: WorkerId::from("w1"),
            deadline_ms: 1000,
        });
        assert!(timeout.is_retryable());

        let unsupported = TesseraError::from(JobError::UnsupportedJobType(JobType::from("x")));
        assert!(!unsupported.is_retryable());

        let no_worker = TesseraError::from(SchedulingError::NoCapableWorker(TaskType::from("render")));
        assert!(!no_worker.is_retryable());
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(
            TesseraError::from(JobError::UnsupportedJobType(JobType::from("x"))).error_code(),
            "UNSUPPORTED_JOB_TYPE"
        );
        assert_eq!(
            TesseraError::from(WorkerError::DuplicateRegistration(WorkerId::from("w"))).error_code(),
            "DUPLICATE_REGISTRATION"
        );
        assert_eq!(
            TesseraError::from(SchedulingError::NoCapableWorker(TaskType::from("t"))).error_code(),
            "NO_CAPABLE_WORKER"
        );
    }

    #[test]
    fn test_rejection() {
        assert!(TesseraError::from(JobError::UnsupportedJobType(JobType::from("x"))).is_rejection());
        assert!(!TesseraError::from(JobError::NotFound(JobId::new())).is_rejection());
    }

    #[test]
    fn test_blamed_worker() {
        let err = SubtaskError::WorkerLost(WorkerId::from("gone"));
        assert_eq!(err.worker_id().map(|w| w.as_str()), Some("gone"));
        assert!(SubtaskError::NotFound(SubtaskId::new()).worker_id().is_none());
    }
}
