//! Subtask domain model

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;
use std::time::Duration;

use crate::ids::{JobId, SubtaskId};
use crate::region::Region;
use crate::types::TaskType;

/// Resource constraints declared by a subtask
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceConstraints {
    /// Only workers with an accelerator may run this subtask
    #[serde(default)]
    pub requires_accelerator: bool,

    /// Estimated computational cost, in abstract cost units
    pub estimated_cost_units: f64,
}

impl Default for ResourceConstraints {
    fn default() -> Self {
        Self {
            requires_accelerator: false,
            estimated_cost_units: 1.0,
        }
    }
}

/// Strategy-specific placement of a subtask within its job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SubtaskShape {
    /// A tile of a spatial job; `padded` includes the ghost margin
    Tile { core: Region, padded: Region },
    /// A named subsystem of a functional job
    Role { role: String },
    /// A stage of a pipeline job
    Stage { stage: String, index: usize },
}

/// Lifecycle status of a subtask
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubtaskStatus {
    /// Waiting for a pipeline predecessor to succeed
    Blocked,
    /// Eligible for scheduling
    Pending,
    /// Bound to a worker by an active assignment
    Assigned,
    /// Completed with an output
    Succeeded,
    /// Last attempt failed; waiting out the retry backoff
    FailedRetryable,
    /// Retry budget exhausted or no capable worker exists
    FailedPermanently,
    /// Parent job was cancelled before this subtask finished
    Cancelled,
}

impl SubtaskStatus {
    /// Check if the subtask can no longer change status
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SubtaskStatus::Succeeded | SubtaskStatus::FailedPermanently | SubtaskStatus::Cancelled
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SubtaskStatus::Blocked => "blocked",
            SubtaskStatus::Pending => "pending",
            SubtaskStatus::Assigned => "assigned",
            SubtaskStatus::Succeeded => "succeeded",
            SubtaskStatus::FailedRetryable => "failed_retryable",
            SubtaskStatus::FailedPermanently => "failed_permanently",
            SubtaskStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for SubtaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An independently executable slice of a job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subtask {
    pub id: SubtaskId,
    pub job_id: JobId,

    /// Human readable label (tile bounds, role or stage name)
    pub label: String,

    /// Capability a worker must declare to run this subtask
    pub task_type: TaskType,

    pub payload: JsonValue,
    pub constraints: ResourceConstraints,

    /// Per-attempt deadline
    #[serde(with = "humantime_serde")]
    pub deadline: Duration,

    /// Position of this subtask's output when the job result is reassembled
    pub sequence: usize,

    /// Predecessor that must succeed before this subtask may be scheduled
    #[serde(skip_serializing_if = "Option::is_none")]
    pub depends_on: Option<SubtaskId>,

    pub shape: SubtaskShape,
}

impl Subtask {
    /// Initial status when the subtask enters the coordinator
    pub fn initial_status(&self) -> SubtaskStatus {
        if self.depends_on.is_some() {
            SubtaskStatus::Blocked
        } else {
            SubtaskStatus::Pending
        }
    }
}
