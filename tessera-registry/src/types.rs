use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;
use tessera_core::{WorkerCapabilities, WorkerId};

/// Point-in-time view of one registered worker
#[derive(Debug, Clone, Serialize)]
pub struct WorkerSnapshot {
    pub worker_id: WorkerId,
    pub capabilities: WorkerCapabilities,
    pub in_flight: u32,
    pub declared_load: f64,
    pub epoch: u64,
    pub available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unavailable_reason: Option<String>,
    pub registered_at: DateTime<Utc>,
    #[serde(with = "duration_ms")]
    pub since_heartbeat: Duration,
}

impl WorkerSnapshot {
    pub fn free_slots(&self) -> u32 {
        self.capabilities.max_concurrent.saturating_sub(self.in_flight)
    }

    pub fn has_free_slot(&self) -> bool {
        self.available && self.free_slots() > 0
    }
}

/// What a registration call did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RegistrationOutcome {
    /// First registration of this worker ID
    New { epoch: u64 },
    /// A previously evicted or unavailable worker came back
    Reconnected { epoch: u64 },
    /// A live worker re-registered with the same capabilities
    Refreshed { epoch: u64 },
    /// A live worker re-registered with different capabilities
    Replaced { epoch: u64 },
}

impl RegistrationOutcome {
    pub fn epoch(&self) -> u64 {
        match self {
            RegistrationOutcome::New { epoch }
            | RegistrationOutcome::Reconnected { epoch }
            | RegistrationOutcome::Refreshed { epoch }
            | RegistrationOutcome::Replaced { epoch } => *epoch,
        }
    }
}

mod duration_ms {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(duration.as_millis() as u64)
    }
}
