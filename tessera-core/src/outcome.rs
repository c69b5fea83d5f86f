//! Job outcomes returned to requesters

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;

use crate::ids::{JobId, SubtaskId};
use crate::region::Region;

/// Output of one spatial tile, already cropped to its core region
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TileOutput {
    pub region: Region,
    pub output: JsonValue,
}

/// Reassembled job output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum MergedOutput {
    /// Tiles in decomposition order
    Spatial { tiles: Vec<TileOutput> },
    /// Role name to role output
    Functional { roles: BTreeMap<String, JsonValue> },
    /// Output of the final stage
    Pipeline { output: JsonValue },
}

/// Complete result of a job whose subtasks all succeeded
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobResult {
    pub job_id: JobId,
    pub subtask_count: usize,
    pub output: MergedOutput,
    pub completed_at: DateTime<Utc>,
}

/// A subtask output that completed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletedOutput {
    pub subtask_id: SubtaskId,
    pub label: String,
    pub sequence: usize,
    pub output: JsonValue,
}

/// A subtask that never produced an output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MissingSubtask {
    pub subtask_id: SubtaskId,
    pub label: String,
    pub reason: String,
}

/// Terminal result of a job where at least one subtask failed permanently
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartialFailure {
    pub job_id: JobId,
    pub completed: Vec<CompletedOutput>,
    pub missing: Vec<MissingSubtask>,
}

impl PartialFailure {
    pub fn is_missing(&self, subtask_id: &SubtaskId) -> bool {
        self.missing.iter().any(|m| &m.subtask_id == subtask_id)
    }
}

/// What a requester sees when asking for a job's result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum JobOutcome {
    Pending { completed: usize, total: usize },
    Completed(JobResult),
    PartialFailure(PartialFailure),
    Cancelled { job_id: JobId, completed: usize, total: usize },
}

impl JobOutcome {
    /// Whether the job has reached a final state
    pub fn is_final(&self) -> bool {
        !matches!(self, JobOutcome::Pending { .. })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobOutcome::Pending { .. } => "pending",
            JobOutcome::Completed(_) => "completed",
            JobOutcome::PartialFailure(_) => "partial_failure",
            JobOutcome::Cancelled { .. } => "cancelled",
        }
    }
}
