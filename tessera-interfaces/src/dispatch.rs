//! Outbound dispatch interface
//!
//! The coordinator hands subtasks to workers through a [`WorkerDispatcher`];
//! results come back asynchronously through the worker gateway.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::time::Duration;
use thiserror::Error;

use tessera_core::{SubtaskId, TaskType, WorkerId};

/// Everything a worker needs to run one subtask attempt
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchRequest {
    pub subtask_id: SubtaskId,
    /// Attempt number the worker must echo back when reporting
    pub attempt: u32,
    pub worker_id: WorkerId,
    pub task_type: TaskType,
    pub payload: JsonValue,
    #[serde(with = "humantime_serde")]
    pub deadline: Duration,
}

/// Errors raised while handing a subtask to a worker
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DispatchError {
    #[error("Worker {0} is unreachable")]
    Unreachable(WorkerId),

    #[error("Worker {worker_id} refused the subtask: {reason}")]
    Refused { worker_id: WorkerId, reason: String },

    #[error("Transport error: {0}")]
    Transport(String),
}

/// Delivers subtasks to workers.
///
/// `dispatch` returns once the request has been handed off; it must not wait
/// for the subtask to finish.
#[async_trait]
pub trait WorkerDispatcher: Send + Sync {
    async fn dispatch(&self, request: DispatchRequest) -> Result<(), DispatchError>;
}
