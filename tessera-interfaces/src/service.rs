//! Requester and worker boundaries

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::time::Duration;

use tessera_core::{JobId, JobOutcome, JobType, Priority, Result, SubtaskId, WorkerCapabilities, WorkerId};

/// Outcome report sent by a worker for one subtask attempt
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultReport {
    pub subtask_id: SubtaskId,
    pub attempt: u32,
    pub success: bool,
    #[serde(default)]
    pub output: JsonValue,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ResultReport {
    pub fn success(subtask_id: SubtaskId, attempt: u32, output: JsonValue) -> Self {
        Self {
            subtask_id,
            attempt,
            success: true,
            output,
            error: None,
        }
    }

    pub fn failure(subtask_id: SubtaskId, attempt: u32, error: impl Into<String>) -> Self {
        Self {
            subtask_id,
            attempt,
            success: false,
            output: JsonValue::Null,
            error: Some(error.into()),
        }
    }
}

/// Acknowledgement of a result report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportAck {
    /// The report changed subtask state
    Accepted,
    /// Same (subtask, attempt) was already recorded
    Duplicate,
    /// The attempt is no longer active and the report was ignored
    Stale,
}

/// Requester-facing operations
#[async_trait]
pub trait JobService: Send + Sync {
    /// Validate, decompose and enqueue a job. Returns without waiting for execution.
    async fn submit_job(
        &self,
        job_type: JobType,
        payload: JsonValue,
        deadline: Duration,
        priority: Priority,
    ) -> Result<JobId>;

    async fn get_result(&self, job_id: JobId) -> Result<JobOutcome>;

    /// Idempotent
    async fn cancel_job(&self, job_id: JobId) -> Result<()>;
}

/// Worker-facing operations
#[async_trait]
pub trait WorkerGateway: Send + Sync {
    async fn register_worker(&self, worker_id: WorkerId, capabilities: WorkerCapabilities) -> Result<()>;

    async fn heartbeat(&self, worker_id: WorkerId, load: f64) -> Result<()>;

    async fn report_result(&self, report: ResultReport) -> Result<ReportAck>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_report_constructors() {
        let id = SubtaskId::new();
        let ok = ResultReport::success(id, 2, json!({"v": 1}));
        assert!(ok.success);
        assert!(ok.error.is_none());

        let failed = ResultReport::failure(id, 3, "out of memory");
        assert!(!failed.success);
        assert_eq!(failed.error.as_deref(), Some("out of memory"));
    }

    #[test]
    fn test_report_deserializes_without_output() {
        let id = SubtaskId::new();
        let raw = json!({"subtask_id": id, "attempt": 1, "success": false});
        let report: ResultReport = serde_json::from_value(raw).unwrap();
        assert_eq!(report.output, JsonValue::Null);
        assert_eq!(report.subtask_id, id);
    }
}
