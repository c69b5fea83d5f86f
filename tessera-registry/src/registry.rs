use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use tessera_config::{RegistrationPolicy, RegistryConfig};
use tessera_core::{Result, Subtask, TaskType, WorkerCapabilities, WorkerError, WorkerId};

use crate::types::{RegistrationOutcome, WorkerSnapshot};

struct WorkerEntry {
    capabilities: WorkerCapabilities,
    in_flight: u32,
    declared_load: f64,
    last_heartbeat: Instant,
    registered_at: DateTime<Utc>,
    epoch: u64,
    available: bool,
    unavailable_reason: Option<String>,
}

impl WorkerEntry {
    fn snapshot(&self, worker_id: &WorkerId, now: Instant) -> WorkerSnapshot {
        WorkerSnapshot {
            worker_id: worker_id.clone(),
            capabilities: self.capabilities.clone(),
            in_flight: self.in_flight,
            declared_load: self.declared_load,
            epoch: self.epoch,
            available: self.available,
            unavailable_reason: self.unavailable_reason.clone(),
            registered_at: self.registered_at,
            since_heartbeat: now.saturating_duration_since(self.last_heartbeat),
        }
    }

    fn start_epoch(&mut self, capabilities: WorkerCapabilities, now: Instant) {
        self.capabilities = capabilities;
        self.in_flight = 0;
        self.declared_load = 0.0;
        self.last_heartbeat = now;
        self.registered_at = Utc::now();
        self.epoch += 1;
        self.available = true;
        self.unavailable_reason = None;
    }
}

/// Registry of workers known to the coordinator.
///
/// Reads take the map's read lock; each worker's mutable state sits behind its
/// own mutex, so heartbeats and slot accounting for different workers never
/// contend. Entries outlive eviction so a returning worker resumes with the
/// next epoch.
pub struct WorkerRegistry {
    workers: RwLock<HashMap<WorkerId, Arc<Mutex<WorkerEntry>>>>,
    heartbeat_timeout: Duration,
    policy: RegistrationPolicy,
}

impl Default for WorkerRegistry {
    fn default() -> Self {
        Self::new(&RegistryConfig::default())
    }
}

impl WorkerRegistry {
    pub fn new(config: &RegistryConfig) -> Self {
        Self {
            workers: RwLock::new(HashMap::new()),
            heartbeat_timeout: config.heartbeat_timeout,
            policy: config.registration_policy,
        }
    }

    fn entry(&self, worker_id: &WorkerId) -> Option<Arc<Mutex<WorkerEntry>>> {
        self.workers.read().get(worker_id).cloned()
    }

    /// Add a worker or update an existing registration
    pub fn register(&self, worker_id: WorkerId, capabilities: WorkerCapabilities) -> Result<RegistrationOutcome> {
        let now = Instant::now();

        let entry = match self.entry(&worker_id) {
            Some(entry) => entry,
            None => {
                let mut workers = self.workers.write();
                match workers.get(&worker_id) {
                    Some(entry) => entry.clone(),
                    None => {
                        info!(worker_id = %worker_id, "Registering worker with {} slots", capabilities.max_concurrent);
                        workers.insert(
                            worker_id,
                            Arc::new(Mutex::new(WorkerEntry {
                                capabilities,
                                in_flight: 0,
                                declared_load: 0.0,
                                last_heartbeat: now,
                                registered_at: Utc::now(),
                                epoch: 1,
                                available: true,
                                unavailable_reason: None,
                            })),
                        );
                        return Ok(RegistrationOutcome::New { epoch: 1 });
                    }
                }
            }
        };

        let mut entry = entry.lock();
        if !entry.available {
            entry.start_epoch(capabilities, now);
            info!(worker_id = %worker_id, epoch = entry.epoch, "Worker reconnected");
            return Ok(RegistrationOutcome::Reconnected { epoch: entry.epoch });
        }

        entry.last_heartbeat = now;
        if entry.capabilities == capabilities {
            debug!(worker_id = %worker_id, "Worker re-registered with unchanged capabilities");
            return Ok(RegistrationOutcome::Refreshed { epoch: entry.epoch });
        }

        match self.policy {
            RegistrationPolicy::RejectConflicts => {
                warn!(worker_id = %worker_id, "Rejecting conflicting registration");
                Err(WorkerError::DuplicateRegistration(worker_id).into())
            }
            RegistrationPolicy::LastWriteWins => {
                info!(worker_id = %worker_id, "Replacing worker capabilities");
                entry.capabilities = capabilities;
                Ok(RegistrationOutcome::Replaced { epoch: entry.epoch })
            }
        }
    }

    /// Refresh liveness and the declared load gauge.
    ///
    /// Unknown and evicted workers get `WorkerNotFound` and must re-register.
    pub fn heartbeat(&self, worker_id: &WorkerId, load: f64) -> Result<()> {
        let entry = self
            .entry(worker_id)
            .ok_or_else(|| WorkerError::NotFound(worker_id.clone()))?;
        let mut entry = entry.lock();
        if !entry.available {
            return Err(WorkerError::NotFound(worker_id.clone()).into());
        }
        entry.last_heartbeat = Instant::now();
        entry.declared_load = if load.is_finite() { load.max(0.0) } else { 0.0 };
        Ok(())
    }

    /// Available workers declaring support for `task_type`, in unspecified order
    pub fn list_capable(&self, task_type: &TaskType) -> Vec<WorkerSnapshot> {
        self.collect(|caps| caps.supports(task_type))
    }

    /// Available workers able to run `subtask`, including its accelerator constraint
    pub fn list_capable_for(&self, subtask: &Subtask) -> Vec<WorkerSnapshot> {
        self.collect(|caps| caps.can_run(subtask))
    }

    fn collect(&self, filter: impl Fn(&WorkerCapabilities) -> bool) -> Vec<WorkerSnapshot> {
        let now = Instant::now();
        self.workers
            .read()
            .iter()
            .filter_map(|(id, entry)| {
                let entry = entry.lock();
                (entry.available && filter(&entry.capabilities)).then(|| entry.snapshot(id, now))
            })
            .collect()
    }

    /// Remove a worker from scheduling eligibility. Performance history is untouched.
    pub fn mark_unavailable(&self, worker_id: &WorkerId, reason: &str) -> Result<()> {
        let entry = self
            .entry(worker_id)
            .ok_or_else(|| WorkerError::NotFound(worker_id.clone()))?;
        let mut entry = entry.lock();
        if entry.available {
            warn!(worker_id = %worker_id, reason, "Marking worker unavailable");
        }
        entry.available = false;
        entry.unavailable_reason = Some(reason.to_string());
        Ok(())
    }

    /// Take one slot on an available worker; false when full, unavailable or unknown
    pub fn reserve_slot(&self, worker_id: &WorkerId) -> bool {
        let Some(entry) = self.entry(worker_id) else {
            return false;
        };
        let mut entry = entry.lock();
        if entry.available && entry.in_flight < entry.capabilities.max_concurrent {
            entry.in_flight += 1;
            true
        } else {
            false
        }
    }

    /// Give back a slot. Unknown workers are ignored.
    pub fn release_slot(&self, worker_id: &WorkerId) {
        if let Some(entry) = self.entry(worker_id) {
            let mut entry = entry.lock();
            entry.in_flight = entry.in_flight.saturating_sub(1);
        }
    }

    /// Evict workers silent for longer than the heartbeat timeout
    pub fn evict_stale(&self) -> Vec<WorkerId> {
        let now = Instant::now();
        let mut evicted = Vec::new();
        for (id, entry) in self.workers.read().iter() {
            let mut entry = entry.lock();
            if entry.available && now.saturating_duration_since(entry.last_heartbeat) > self.heartbeat_timeout {
                entry.available = false;
                entry.in_flight = 0;
                entry.unavailable_reason = Some("heartbeat timeout".to_string());
                evicted.push(id.clone());
            }
        }
        for id in &evicted {
            warn!(worker_id = %id, "Evicted worker after missed heartbeats");
        }
        evicted
    }

    pub fn snapshot(&self, worker_id: &WorkerId) -> Option<WorkerSnapshot> {
        let now = Instant::now();
        self.entry(worker_id).map(|entry| entry.lock().snapshot(worker_id, now))
    }

    pub fn snapshots(&self) -> Vec<WorkerSnapshot> {
        self.collect_all()
    }

    fn collect_all(&self) -> Vec<WorkerSnapshot> {
        let now = Instant::now();
        let mut all: Vec<_> = self
            .workers
            .read()
            .iter()
            .map(|(id, entry)| entry.lock().snapshot(id, now))
            .collect();
        all.sort_by(|a, b| a.worker_id.cmp(&b.worker_id));
        all
    }

    pub fn is_available(&self, worker_id: &WorkerId) -> bool {
        self.entry(worker_id).map(|e| e.lock().available).unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.workers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
