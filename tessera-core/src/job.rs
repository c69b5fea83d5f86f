//! Job domain model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::time::Duration;

use crate::ids::JobId;
use crate::types::{JobType, Priority};

/// A unit of work submitted by a requester
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    /// Unique job ID
    pub id: JobId,

    /// Job type; selects the decomposition strategy
    pub job_type: JobType,

    /// Opaque payload interpreted by the decomposition strategy
    pub payload: JsonValue,

    /// Time budget for the whole job, relative to submission
    #[serde(with = "humantime_serde")]
    pub deadline: Duration,

    /// Scheduling priority
    pub priority: Priority,

    /// When the job was submitted
    pub submitted_at: DateTime<Utc>,
}

impl Job {
    pub fn new(job_type: impl Into<JobType>, payload: JsonValue, deadline: Duration) -> Self {
        Self {
            id: JobId::new(),
            job_type: job_type.into(),
            payload,
            deadline,
            priority: Priority::default(),
            submitted_at: Utc::now(),
        }
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }
}
