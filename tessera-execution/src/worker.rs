//! In-process workers
//!
//! [`SimulatedWorkerPool`] stands in for remote workers: it accepts dispatches,
//! sleeps for a simulated run time and reports back through a
//! [`WorkerGateway`]. [`RecordingDispatcher`] only records what it is asked to
//! dispatch, leaving reports to the caller.

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::{json, Value as JsonValue};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use tessera_core::{Region, Result, WorkerCapabilities, WorkerId};
use tessera_interfaces::{DispatchError, DispatchRequest, ResultReport, WorkerDispatcher, WorkerGateway};
use tessera_resilience::ShutdownCoordinator;

/// Behaviour of one simulated worker
#[derive(Debug, Clone)]
pub struct SimulatedWorker {
    pub worker_id: WorkerId,
    pub capabilities: WorkerCapabilities,
    /// Mean run time of one subtask
    pub mean_duration: Duration,
    /// Probability that an attempt reports failure
    pub failure_rate: f64,
    /// Probability that an attempt never reports at all
    pub hang_rate: f64,
}

impl SimulatedWorker {
    pub fn new(worker_id: impl Into<WorkerId>, capabilities: WorkerCapabilities) -> Self {
        let speed = capabilities.capacity_class.speed_factor();
        Self {
            worker_id: worker_id.into(),
            mean_duration: Duration::from_millis(100).div_f64(speed),
            capabilities,
            failure_rate: 0.0,
            hang_rate: 0.0,
        }
    }

    pub fn with_mean_duration(mut self, mean_duration: Duration) -> Self {
        self.mean_duration = mean_duration;
        self
    }

    pub fn with_failure_rate(mut self, failure_rate: f64) -> Self {
        self.failure_rate = failure_rate.clamp(0.0, 1.0);
        self
    }

    pub fn with_hang_rate(mut self, hang_rate: f64) -> Self {
        self.hang_rate = hang_rate.clamp(0.0, 1.0);
        self
    }
}

enum Behaviour {
    Succeed,
    Fail,
    Hang,
}

/// Output a simulated worker produces for a request.
///
/// Tiles get a grid over their padded region whose cells hold their own
/// coordinates; everything else echoes its input.
fn simulated_output(request: &DispatchRequest) -> JsonValue {
    let padded = request
        .payload
        .get("padded")
        .and_then(|value| serde_json::from_value::<Region>(value.clone()).ok());
    match padded {
        Some(region) => {
            let mut values = Vec::with_capacity(region.area() as usize);
            for y in region.y..region.bottom() {
                for x in region.x..region.right() {
                    values.push(json!([x, y]));
                }
            }
            json!({"region": region, "values": values})
        }
        None => json!({
            "worker": request.worker_id,
            "task_type": request.task_type,
            "input": request.payload,
        }),
    }
}

/// Pool of simulated workers reporting through a gateway
pub struct SimulatedWorkerPool {
    workers: HashMap<WorkerId, SimulatedWorker>,
    offline: Arc<RwLock<HashSet<WorkerId>>>,
    gateway: RwLock<Option<Weak<dyn WorkerGateway>>>,
    rng: Mutex<StdRng>,
    dispatched: AtomicU64,
}

impl SimulatedWorkerPool {
    /// Create a pool; `seed` makes failure rolls reproducible
    pub fn new(workers: Vec<SimulatedWorker>, seed: u64) -> Arc<Self> {
        Arc::new(Self {
            workers: workers
                .into_iter()
                .map(|w| (w.worker_id.clone(), w))
                .collect(),
            offline: Arc::new(RwLock::new(HashSet::new())),
            gateway: RwLock::new(None),
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
            dispatched: AtomicU64::new(0),
        })
    }

    /// Connect the pool to the gateway it reports to
    pub fn attach(&self, gateway: Weak<dyn WorkerGateway>) {
        *self.gateway.write() = Some(gateway);
    }

    fn gateway(&self) -> Option<Arc<dyn WorkerGateway>> {
        self.gateway.read().as_ref().and_then(Weak::upgrade)
    }

    pub fn worker_ids(&self) -> Vec<WorkerId> {
        let mut ids: Vec<_> = self.workers.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn dispatched_count(&self) -> u64 {
        self.dispatched.load(Ordering::Relaxed)
    }

    /// Take a worker off the network: it stops heartbeating and its reports are lost
    pub fn set_offline(&self, worker_id: &WorkerId, offline: bool) {
        let mut set = self.offline.write();
        if offline {
            set.insert(worker_id.clone());
        } else {
            set.remove(worker_id);
        }
    }

    fn is_online(&self, worker_id: &WorkerId) -> bool {
        !self.offline.read().contains(worker_id)
    }

    /// Register every online worker with the gateway
    pub async fn register_all(&self) -> Result<()> {
        let Some(gateway) = self.gateway() else {
            return Ok(());
        };
        for worker_id in self.worker_ids() {
            if !self.is_online(&worker_id) {
                continue;
            }
            if let Some(worker) = self.workers.get(&worker_id) {
                gateway
                    .register_worker(worker_id.clone(), worker.capabilities.clone())
                    .await?;
            }
        }
        info!(workers = self.workers.len(), "Simulated workers registered");
        Ok(())
    }

    /// Heartbeat every online worker each `interval` until shutdown.
    ///
    /// A worker whose heartbeat is refused re-registers.
    pub fn spawn_heartbeats(self: &Arc<Self>, interval: Duration, shutdown: &ShutdownCoordinator) -> JoinHandle<()> {
        let pool = Arc::downgrade(self);
        let mut signals = shutdown.subscribe();
        let guard = shutdown.track();
        tokio::spawn(async move {
            let _guard = guard;
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let Some(pool) = pool.upgrade() else { break };
                        pool.heartbeat_once().await;
                    }
                    _ = signals.recv() => break,
                }
            }
        })
    }

    async fn heartbeat_once(&self) {
        let Some(gateway) = self.gateway() else {
            return;
        };
        for worker_id in self.worker_ids() {
            if !self.is_online(&worker_id) {
                continue;
            }
            if gateway.heartbeat(worker_id.clone(), 0.0).await.is_err() {
                if let Some(worker) = self.workers.get(&worker_id) {
                    debug!(worker_id = %worker_id, "Heartbeat refused, re-registering");
                    if let Err(e) = gateway
                        .register_worker(worker_id.clone(), worker.capabilities.clone())
                        .await
                    {
                        warn!(worker_id = %worker_id, "Re-registration failed: {}", e);
                    }
                }
            }
        }
    }

    fn roll(&self, worker: &SimulatedWorker) -> (Behaviour, Duration) {
        let mut rng = self.rng.lock();
        let roll: f64 = rng.gen();
        let behaviour = if roll < worker.hang_rate {
            Behaviour::Hang
        } else if roll < worker.hang_rate + worker.failure_rate {
            Behaviour::Fail
        } else {
            Behaviour::Succeed
        };
        let jitter: f64 = rng.gen_range(0.8..1.2);
        (behaviour, worker.mean_duration.mul_f64(jitter))
    }
}

#[async_trait]
impl WorkerDispatcher for SimulatedWorkerPool {
    async fn dispatch(&self, request: DispatchRequest) -> std::result::Result<(), DispatchError> {
        let worker = self
            .workers
            .get(&request.worker_id)
            .filter(|w| self.is_online(&w.worker_id))
            .ok_or_else(|| DispatchError::Unreachable(request.worker_id.clone()))?;
        let gateway = self
            .gateway
            .read()
            .clone()
            .ok_or_else(|| DispatchError::Transport("pool is not attached to a gateway".to_string()))?;

        self.dispatched.fetch_add(1, Ordering::Relaxed);
        let (behaviour, run_time) = self.roll(worker);
        let report = match behaviour {
            Behaviour::Hang => {
                debug!(subtask_id = %request.subtask_id, worker_id = %request.worker_id, "Simulated worker will not report");
                return Ok(());
            }
            Behaviour::Fail => ResultReport::failure(request.subtask_id, request.attempt, "simulated failure"),
            Behaviour::Succeed => {
                ResultReport::success(request.subtask_id, request.attempt, simulated_output(&request))
            }
        };

        let offline = Arc::clone(&self.offline);
        let worker_id = request.worker_id.clone();
        tokio::spawn(async move {
            tokio::time::sleep(run_time).await;
            if offline.read().contains(&worker_id) {
                return;
            }
            if let Some(gateway) = gateway.upgrade() {
                if let Err(e) = gateway.report_result(report).await {
                    warn!(worker_id = %worker_id, "Report rejected: {}", e);
                }
            }
        });
        Ok(())
    }
}

/// Dispatcher that records requests and never reports.
///
/// Workers listed as unreachable fail at dispatch time.
#[derive(Default)]
pub struct RecordingDispatcher {
    requests: Mutex<Vec<DispatchRequest>>,
    unreachable: RwLock<HashSet<WorkerId>>,
}

impl RecordingDispatcher {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_unreachable(&self, worker_id: &WorkerId, unreachable: bool) {
        let mut set = self.unreachable.write();
        if unreachable {
            set.insert(worker_id.clone());
        } else {
            set.remove(worker_id);
        }
    }

    /// Everything dispatched so far, oldest first
    pub fn requests(&self) -> Vec<DispatchRequest> {
        self.requests.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.requests.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl WorkerDispatcher for RecordingDispatcher {
    async fn dispatch(&self, request: DispatchRequest) -> std::result::Result<(), DispatchError> {
        if self.unreachable.read().contains(&request.worker_id) {
            return Err(DispatchError::Unreachable(request.worker_id));
        }
        self.requests.lock().push(request);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_core::{CapacityClass, SubtaskId, TaskType};

    fn request(worker: &str, payload: JsonValue) -> DispatchRequest {
        DispatchRequest {
            subtask_id: SubtaskId::new(),
            attempt: 1,
            worker_id: WorkerId::from(worker),
            task_type: TaskType::from("render"),
            payload,
            deadline: Duration::from_secs(1),
        }
    }

    #[test]
    fn test_tile_output_is_grid_over_padded_region() {
        let payload = json!({
            "core": {"x": 1, "y": 1, "width": 1, "height": 1},
            "padded": {"x": 0, "y": 0, "width": 2, "height": 2}
        });
        let output = simulated_output(&request("w1", payload));
        assert_eq!(output["values"], json!([[0, 0], [1, 0], [0, 1], [1, 1]]));
        assert_eq!(output["region"]["width"], json!(2));
    }

    #[test]
    fn test_other_output_echoes_input() {
        let output = simulated_output(&request("w1", json!({"tick": 3})));
        assert_eq!(output["input"], json!({"tick": 3}));
        assert_eq!(output["worker"], json!("w1"));
    }

    #[test]
    fn test_class_sets_mean_duration() {
        let caps = WorkerCapabilities::new(CapacityClass::Large, ["render"]);
        let worker = SimulatedWorker::new("w1", caps).with_failure_rate(2.0);
        assert_eq!(worker.mean_duration, Duration::from_millis(50));
        assert_eq!(worker.failure_rate, 1.0);
    }

    #[tokio::test]
    async fn test_unknown_and_offline_workers_are_unreachable() {
        let caps = WorkerCapabilities::new(CapacityClass::Medium, ["render"]);
        let pool = SimulatedWorkerPool::new(vec![SimulatedWorker::new("w1", caps)], 7);

        let err = pool.dispatch(request("nobody", json!({}))).await.unwrap_err();
        assert_eq!(err, DispatchError::Unreachable(WorkerId::from("nobody")));

        pool.set_offline(&WorkerId::from("w1"), true);
        assert!(pool.dispatch(request("w1", json!({}))).await.is_err());
        assert_eq!(pool.dispatched_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_heartbeat_loop_stops_on_shutdown() {
        let caps = WorkerCapabilities::new(CapacityClass::Medium, ["render"]);
        let pool = SimulatedWorkerPool::new(vec![SimulatedWorker::new("w1", caps)], 7);
        let shutdown = ShutdownCoordinator::with_timeout(Duration::from_secs(5));

        let heartbeats = pool.spawn_heartbeats(Duration::from_secs(1), &shutdown);
        assert_eq!(shutdown.active_task_count(), 1);
        shutdown.shutdown().await.unwrap();
        heartbeats.await.unwrap();
        assert_eq!(shutdown.active_task_count(), 0);
    }

    #[tokio::test]
    async fn test_recording_dispatcher() {
        let dispatcher = RecordingDispatcher::new();
        dispatcher.dispatch(request("w1", json!({}))).await.unwrap();
        dispatcher.set_unreachable(&WorkerId::from("w2"), true);
        assert!(dispatcher.dispatch(request("w2", json!({}))).await.is_err());
        assert_eq!(dispatcher.len(), 1);
        assert_eq!(dispatcher.requests()[0].worker_id.as_str(), "w1");
    }
}
