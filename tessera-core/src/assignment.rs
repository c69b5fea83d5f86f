//! Assignment of a subtask attempt to a worker

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::time::Instant;

use crate::ids::{SubtaskId, WorkerId};

/// State of a single assignment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentState {
    /// Dispatched and awaiting a report
    Active,
    Succeeded,
    /// Deadline elapsed with no report
    TimedOut,
    /// Worker reported failure or dispatch failed
    Failed,
    /// Worker was evicted while the attempt was in flight
    WorkerLost,
    /// Superseded by another attempt's success or by cancellation
    Abandoned,
}

impl AssignmentState {
    pub fn is_active(&self) -> bool {
        matches!(self, AssignmentState::Active)
    }

    /// Whether the outcome is charged to the worker's reliability
    pub fn counts_against_worker(&self) -> bool {
        matches!(
            self,
            AssignmentState::TimedOut | AssignmentState::Failed | AssignmentState::WorkerLost
        )
    }
}

/// Binding of one subtask to one worker for one attempt
#[derive(Debug, Clone, Serialize)]
pub struct Assignment {
    pub subtask_id: SubtaskId,
    pub worker_id: WorkerId,

    /// 1-based attempt number
    pub attempt: u32,

    pub assigned_at: DateTime<Utc>,

    /// Monotonic start, used for elapsed time measurement
    #[serde(skip)]
    pub started: Instant,

    /// Predicted completion time when the assignment was made
    pub expected_ms: f64,

    pub state: AssignmentState,
}

impl Assignment {
    pub fn new(subtask_id: SubtaskId, worker_id: WorkerId, attempt: u32, expected_ms: f64) -> Self {
        Self {
            subtask_id,
            worker_id,
            attempt,
            assigned_at: Utc::now(),
            started: Instant::now(),
            expected_ms,
            state: AssignmentState::Active,
        }
    }

    /// Milliseconds since dispatch
    pub fn elapsed_ms(&self) -> f64 {
        self.started.elapsed().as_secs_f64() * 1000.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_penalized_states() {
        assert!(AssignmentState::TimedOut.counts_against_worker());
        assert!(AssignmentState::WorkerLost.counts_against_worker());
        assert!(!AssignmentState::Abandoned.counts_against_worker());
        assert!(!AssignmentState::Succeeded.counts_against_worker());
    }

    #[tokio::test(start_paused = true)]
    async fn test_elapsed_follows_tokio_clock() {
        let assignment = Assignment::new(SubtaskId::new(), WorkerId::from("w1"), 1, 10.0);
        assert!(assignment.state.is_active());
        tokio::time::advance(Duration::from_millis(250)).await;
        let elapsed = assignment.elapsed_ms();
        assert!((elapsed - 250.0).abs() < 1.0, "elapsed was {elapsed}");
    }
}
