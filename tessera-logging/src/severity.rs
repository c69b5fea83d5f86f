//! Error severity levels for logging

use serde::{Deserialize, Serialize};
use tessera_core::{JobError, SchedulingError, TesseraError, WorkerError};

/// Error severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub enum ErrorSeverity {
    Info,
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl ErrorSeverity {
    pub fn should_alert(&self) -> bool {
        matches!(self, ErrorSeverity::High | ErrorSeverity::Critical)
    }

    pub fn for_error(error: &TesseraError) -> Self {
        match error {
            TesseraError::Job(JobError::NotFound(_)) | TesseraError::Worker(WorkerError::NotFound(_)) => {
                ErrorSeverity::Info
            }
            TesseraError::Job(_) | TesseraError::Worker(_) => ErrorSeverity::Low,
            TesseraError::Scheduling(SchedulingError::AllWorkersBusy(_)) => ErrorSeverity::Low,
            TesseraError::Scheduling(SchedulingError::NoCapableWorker(_)) => ErrorSeverity::High,
            TesseraError::Subtask(_) | TesseraError::Serialization(_) => ErrorSeverity::Medium,
            TesseraError::Config(_) => ErrorSeverity::Critical,
            TesseraError::Other(_) => ErrorSeverity::High,
        }
    }
}
