//! Execution coordinator
//!
//! Owns the state machine of every subtask:
//!
//! ```text
//! blocked -> pending -> assigned -> succeeded
//!              ^           |
//!              |           +-> timed_out | failed | worker_lost
//!              |                     |
//!              +-- failed_retryable -+-> failed_permanently
//! ```
//!
//! Each job record sits behind its own mutex. Handlers mutate records
//! synchronously and collect dispatch requests; the requests are handed to the
//! [`WorkerDispatcher`] only after every lock is released.

use async_trait::async_trait;
use futures::future::join_all;
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use serde_json::Value as JsonValue;
use std::cmp::Reverse;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use tessera_config::{CoordinatorConfig, TesseraConfig};
use tessera_core::{
    Assignment, AssignmentState, Job, JobError, JobId, JobOutcome, JobType, PartialFailure, Priority, Result,
    SchedulingError, Subtask, SubtaskError, SubtaskId, SubtaskStatus, TaskType, TesseraError,
    WorkerCapabilities, WorkerId,
};
use tessera_decomposition::{merge, partial_failure, DecomposeStrategy, Decomposer};
use tessera_interfaces::{
    DispatchError, DispatchRequest, JobService, ReportAck, ResultReport, WorkerDispatcher,
    WorkerGateway,
};
use tessera_performance::PerformanceModel;
use tessera_registry::WorkerRegistry;
use tessera_resilience::{RetryDecision, RetryPolicy, ShutdownCoordinator, ShutdownSignal};

use crate::scheduler::{RankedCandidate, Scheduler};

struct ActiveAttempt {
    attempt: u32,
    worker_id: WorkerId,
    audit_index: usize,
    timer: Option<JoinHandle<()>>,
}

struct SubtaskRecord {
    subtask: Subtask,
    status: SubtaskStatus,
    /// Attempts dispatched so far
    attempts: u32,
    active: Option<ActiveAttempt>,
    /// Workers that already failed this subtask
    excluded: HashSet<WorkerId>,
    /// Attempts whose worker report has been recorded
    reported: HashSet<u32>,
    output: Option<JsonValue>,
    last_error: Option<String>,
    retry_timer: Option<JoinHandle<()>>,
}

impl SubtaskRecord {
    fn new(subtask: Subtask) -> Self {
        Self {
            status: subtask.initial_status(),
            subtask,
            attempts: 0,
            active: None,
            excluded: HashSet::new(),
            reported: HashSet::new(),
            output: None,
            last_error: None,
            retry_timer: None,
        }
    }

    fn is_active_attempt(&self, attempt: u32) -> bool {
        self.active.as_ref().is_some_and(|a| a.attempt == attempt)
    }

    fn abort_retry(&mut self) {
        if let Some(timer) = self.retry_timer.take() {
            timer.abort();
        }
    }
}

struct JobRecord {
    job: Job,
    strategy: DecomposeStrategy,
    subtasks: Vec<SubtaskRecord>,
    positions: HashMap<SubtaskId, usize>,
    /// Every assignment ever made for this job, in creation order
    assignments: Vec<Assignment>,
    cancelled: bool,
    final_outcome: Option<JobOutcome>,
    finished_at: Option<Instant>,
    submission_seq: u64,
    outcome_tx: watch::Sender<JobOutcome>,
}

impl JobRecord {
    fn completed(&self) -> usize {
        self.subtasks
            .iter()
            .filter(|s| s.status == SubtaskStatus::Succeeded)
            .count()
    }

    fn outcome(&self) -> JobOutcome {
        if let Some(outcome) = &self.final_outcome {
            return outcome.clone();
        }
        let completed = self.completed();
        let total = self.subtasks.len();
        if self.cancelled {
            JobOutcome::Cancelled {
                job_id: self.job.id,
                completed,
                total,
            }
        } else {
            JobOutcome::Pending { completed, total }
        }
    }

    fn publish(&self) {
        self.outcome_tx.send_replace(self.outcome());
    }

    /// Cancelled or already delivered: nothing new is assigned
    fn is_halted(&self) -> bool {
        self.cancelled || self.final_outcome.is_some()
    }

    fn is_schedulable(&self) -> bool {
        !self.is_halted()
            && self
                .subtasks
                .iter()
                .any(|s| s.status == SubtaskStatus::Pending)
    }

    fn output_of(&self, subtask_id: &SubtaskId) -> Option<&JsonValue> {
        self.positions
            .get(subtask_id)
            .and_then(|&idx| self.subtasks[idx].output.as_ref())
    }
}

/// Per-subtask view in a [`JobStatus`]
#[derive(Debug, Clone, Serialize)]
pub struct SubtaskView {
    pub subtask_id: SubtaskId,
    pub label: String,
    pub task_type: TaskType,
    pub status: SubtaskStatus,
    pub attempts: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub worker_id: Option<WorkerId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

/// Detailed state of a job, including its assignment audit trail
#[derive(Debug, Clone, Serialize)]
pub struct JobStatus {
    pub job_id: JobId,
    pub job_type: JobType,
    pub priority: Priority,
    pub outcome: JobOutcome,
    pub subtasks: Vec<SubtaskView>,
    pub assignments: Vec<Assignment>,
}

impl JobStatus {
    /// Assignments made for one subtask, oldest first
    pub fn assignments_for(&self, subtask_id: &SubtaskId) -> Vec<&Assignment> {
        self.assignments
            .iter()
            .filter(|a| &a.subtask_id == subtask_id)
            .collect()
    }
}

/// What one maintenance pass did
#[derive(Debug, Clone, Default, Serialize)]
pub struct SweepReport {
    pub evicted: Vec<WorkerId>,
    pub collected_jobs: usize,
}

impl SweepReport {
    pub fn is_empty(&self) -> bool {
        self.evicted.is_empty() && self.collected_jobs == 0
    }
}

/// Accepts jobs, drives their subtasks to completion and delivers results
pub struct ExecutionCoordinator {
    this: Weak<ExecutionCoordinator>,
    config: CoordinatorConfig,
    retry: RetryPolicy,
    default_subtask_count: usize,
    registry: Arc<WorkerRegistry>,
    model: Arc<PerformanceModel>,
    scheduler: Scheduler,
    decomposer: Decomposer,
    dispatcher: Arc<dyn WorkerDispatcher>,
    jobs: RwLock<HashMap<JobId, Arc<Mutex<JobRecord>>>>,
    owners: RwLock<HashMap<SubtaskId, JobId>>,
    submissions: AtomicU64,
    accepting: AtomicBool,
}

impl ExecutionCoordinator {
    /// Build a coordinator with a fresh registry and performance model
    pub fn new(config: &TesseraConfig, dispatcher: Arc<dyn WorkerDispatcher>) -> Arc<Self> {
        let registry = Arc::new(WorkerRegistry::new(&config.registry));
        let model = Arc::new(PerformanceModel::new(config.prediction.clone()));
        Self::with_components(config, registry, model, dispatcher)
    }

    /// Build a coordinator around an existing registry and performance model
    pub fn with_components(
        config: &TesseraConfig,
        registry: Arc<WorkerRegistry>,
        model: Arc<PerformanceModel>,
        dispatcher: Arc<dyn WorkerDispatcher>,
    ) -> Arc<Self> {
        let scheduler = Scheduler::new(registry.clone(), model.clone(), config.scheduler.clone());
        Arc::new_cyclic(|this| Self {
            this: this.clone(),
            config: config.coordinator.clone(),
            retry: RetryPolicy::from(&config.coordinator),
            default_subtask_count: config.decomposition.default_subtask_count,
            registry,
            model,
            scheduler,
            decomposer: Decomposer::from_config(&config.decomposition),
            dispatcher,
            jobs: RwLock::new(HashMap::new()),
            owners: RwLock::new(HashMap::new()),
            submissions: AtomicU64::new(0),
            accepting: AtomicBool::new(true),
        })
    }

    pub fn registry(&self) -> &Arc<WorkerRegistry> {
        &self.registry
    }

    pub fn model(&self) -> &Arc<PerformanceModel> {
        &self.model
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    fn job_record(&self, job_id: &JobId) -> Option<Arc<Mutex<JobRecord>>> {
        self.jobs.read().get(job_id).cloned()
    }

    fn owner_record(&self, subtask_id: &SubtaskId) -> Option<Arc<Mutex<JobRecord>>> {
        let job_id = self.owners.read().get(subtask_id).copied()?;
        self.job_record(&job_id)
    }

    /// Submit a job with an explicit spatial subtask target
    pub async fn submit(&self, job: Job, target_subtask_count: usize) -> Result<JobId> {
        if !self.accepting.load(Ordering::Acquire) {
            return Err(JobError::Rejected("coordinator is shutting down".to_string()).into());
        }
        if job.deadline.is_zero() {
            return Err(JobError::Rejected("deadline must be positive".to_string()).into());
        }

        let strategy = self.decomposer.catalog().resolve(&job.job_type)?.clone();
        let subtasks = self.decomposer.decompose(&job, target_subtask_count)?;
        let job_id = job.id;

        let positions = subtasks
            .iter()
            .enumerate()
            .map(|(idx, s)| (s.id, idx))
            .collect();
        let subtask_ids: Vec<SubtaskId> = subtasks.iter().map(|s| s.id).collect();
        let total = subtasks.len();
        let (outcome_tx, _) = watch::channel(JobOutcome::Pending {
            completed: 0,
            total,
        });

        info!(
            job_id = %job_id,
            job_type = %job.job_type,
            priority = %job.priority,
            subtasks = total,
            "Accepted job"
        );

        let record = JobRecord {
            submission_seq: self.submissions.fetch_add(1, Ordering::Relaxed),
            job,
            strategy,
            subtasks: subtasks.into_iter().map(SubtaskRecord::new).collect(),
            positions,
            assignments: Vec::new(),
            cancelled: false,
            final_outcome: None,
            finished_at: None,
            outcome_tx,
        };

        {
            let mut owners = self.owners.write();
            for id in subtask_ids {
                owners.insert(id, job_id);
            }
        }
        self.jobs.write().insert(job_id, Arc::new(Mutex::new(record)));

        self.drive().await;
        Ok(job_id)
    }

    /// Wait until the job reaches a final outcome
    pub async fn wait_for_result(&self, job_id: JobId) -> Result<JobOutcome> {
        let mut outcomes = {
            let record = self
                .job_record(&job_id)
                .ok_or(JobError::NotFound(job_id))?;
            let record = record.lock();
            record.outcome_tx.subscribe()
        };
        let outcome = outcomes
            .wait_for(|outcome| outcome.is_final())
            .await
            .map_err(|_| JobError::NotFound(job_id))?;
        Ok(outcome.clone())
    }

    /// Detailed job state including the assignment audit trail
    pub fn job_status(&self, job_id: JobId) -> Result<JobStatus> {
        let record = self
            .job_record(&job_id)
            .ok_or(JobError::NotFound(job_id))?;
        let record = record.lock();
        Ok(JobStatus {
            job_id,
            job_type: record.job.job_type.clone(),
            priority: record.job.priority,
            outcome: record.outcome(),
            subtasks: record
                .subtasks
                .iter()
                .map(|s| SubtaskView {
                    subtask_id: s.subtask.id,
                    label: s.subtask.label.clone(),
                    task_type: s.subtask.task_type.clone(),
                    status: s.status,
                    attempts: s.attempts,
                    worker_id: s.active.as_ref().map(|a| a.worker_id.clone()),
                    last_error: s.last_error.clone(),
                })
                .collect(),
            assignments: record.assignments.clone(),
        })
    }

    /// Subtasks of a job, in decomposition order
    pub fn subtasks(&self, job_id: JobId) -> Result<Vec<Subtask>> {
        let record = self
            .job_record(&job_id)
            .ok_or(JobError::NotFound(job_id))?;
        let record = record.lock();
        Ok(record.subtasks.iter().map(|s| s.subtask.clone()).collect())
    }

    /// Take a worker out of rotation without charging it for in-flight work
    pub async fn mark_worker_unavailable(&self, worker_id: &WorkerId, reason: &str) -> Result<()> {
        self.registry.mark_unavailable(worker_id, reason)?;
        self.lose_worker(worker_id, false);
        self.drive().await;
        Ok(())
    }

    /// Stop accepting new jobs; in-flight work continues
    pub fn stop_accepting(&self) {
        if self.accepting.swap(false, Ordering::AcqRel) {
            info!("Coordinator no longer accepting jobs");
        }
    }

    /// Evict silent workers, reassign their work and collect expired jobs
    pub async fn sweep(&self) -> SweepReport {
        let evicted = self.registry.evict_stale();
        for worker_id in &evicted {
            self.lose_worker(worker_id, true);
        }
        let collected_jobs = self.collect_garbage();
        self.drive().await;
        SweepReport {
            evicted,
            collected_jobs,
        }
    }

    /// Attempts dispatched and not yet resolved, across all jobs
    pub fn active_attempts(&self) -> usize {
        self.jobs
            .read()
            .values()
            .map(|record| {
                let record = record.lock();
                record.subtasks.iter().filter(|s| s.active.is_some()).count()
            })
            .sum()
    }

    /// Run [`sweep`](Self::sweep) every `sweep_interval` until shutdown is signalled.
    ///
    /// A graceful shutdown stops new submissions and keeps the shutdown
    /// pending until in-flight attempts resolve or shutdown is forced.
    pub fn spawn_maintenance(&self, shutdown: &ShutdownCoordinator) -> JoinHandle<()> {
        let this = self.this.clone();
        let period = self.config.sweep_interval;
        let mut signals = shutdown.subscribe();
        let guard = shutdown.track();

        tokio::spawn(async move {
            let _guard = guard;
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let Some(coordinator) = this.upgrade() else { break };
                        let report = coordinator.sweep().await;
                        if !report.is_empty() {
                            debug!(
                                evicted = report.evicted.len(),
                                collected_jobs = report.collected_jobs,
                                "Maintenance sweep"
                            );
                        }
                    }
                    signal = signals.recv() => {
                        if let Some(coordinator) = this.upgrade() {
                            coordinator.stop_accepting();
                        }
                        if matches!(signal, Ok(ShutdownSignal::Graceful)) {
                            Self::drain(&this, &mut ticker, &mut signals).await;
                        }
                        info!(signal = ?signal.ok(), "Maintenance loop stopping");
                        break;
                    }
                }
            }
        })
    }

    /// Wait for in-flight attempts to resolve, or for the next shutdown signal
    async fn drain(
        this: &Weak<ExecutionCoordinator>,
        ticker: &mut Interval,
        signals: &mut broadcast::Receiver<ShutdownSignal>,
    ) {
        loop {
            let remaining = this.upgrade().map_or(0, |c| c.active_attempts());
            if remaining == 0 {
                return;
            }
            debug!(remaining, "Draining in-flight attempts");
            tokio::select! {
                _ = ticker.tick() => {}
                signal = signals.recv() => {
                    warn!(remaining, signal = ?signal.ok(), "Drain interrupted");
                    return;
                }
            }
        }
    }

    fn collect_garbage(&self) -> usize {
        let retention = self.config.result_retention;
        let mut removed = Vec::new();
        self.jobs.write().retain(|job_id, record| {
            let mut record = record.lock();
            let expired = record
                .finished_at
                .is_some_and(|finished| finished.elapsed() >= retention);
            if expired {
                // Attempts still out on workers hold slots and timers
                for idx in 0..record.subtasks.len() {
                    record.subtasks[idx].abort_retry();
                    self.abandon_active(&mut record, idx);
                }
                removed.push((*job_id, record.positions.keys().copied().collect::<Vec<_>>()));
            }
            !expired
        });

        if !removed.is_empty() {
            let mut owners = self.owners.write();
            for (job_id, subtask_ids) in &removed {
                for id in subtask_ids {
                    owners.remove(id);
                }
                debug!(job_id = %job_id, "Collected finished job");
            }
        }
        removed.len()
    }

    /// Assign pending work and dispatch it until nothing more can be placed
    async fn drive(&self) {
        let mut requests = self.pump();
        while !requests.is_empty() {
            let results = join_all(requests.into_iter().map(|(job_id, request)| {
                let dispatcher = self.dispatcher.clone();
                async move {
                    let key = (job_id, request.subtask_id, request.attempt, request.worker_id.clone());
                    (key, dispatcher.dispatch(request).await)
                }
            }))
            .await;

            let mut failed = false;
            for ((job_id, subtask_id, attempt, worker_id), result) in results {
                if let Err(error) = result {
                    self.handle_dispatch_error(job_id, subtask_id, attempt, worker_id, error);
                    failed = true;
                }
            }
            requests = if failed { self.pump() } else { Vec::new() };
        }
    }

    /// Place pending subtasks, most urgent job first
    fn pump(&self) -> Vec<(JobId, DispatchRequest)> {
        let mut queue: Vec<_> = self
            .jobs
            .read()
            .values()
            .filter_map(|record| {
                let guard = record.lock();
                guard
                    .is_schedulable()
                    .then(|| (Reverse(guard.job.priority), guard.submission_seq, record.clone()))
            })
            .collect();
        queue.sort_by_key(|(priority, seq, _)| (*priority, *seq));

        let mut requests = Vec::new();
        for (_, _, record) in queue {
            let mut record = record.lock();
            if record.is_schedulable() {
                self.schedule_job(&mut record, &mut requests);
            }
        }
        requests
    }

    fn schedule_job(&self, record: &mut JobRecord, requests: &mut Vec<(JobId, DispatchRequest)>) {
        let mut changed = false;
        for idx in 0..record.subtasks.len() {
            if record.subtasks[idx].status != SubtaskStatus::Pending {
                continue;
            }
            let ranked = {
                let st = &record.subtasks[idx];
                self.scheduler.rank(&st.subtask, &st.excluded)
            };
            match ranked {
                Ok(candidates) => {
                    let Some(candidate) = candidates
                        .into_iter()
                        .find(|c| self.registry.reserve_slot(&c.worker_id))
                    else {
                        continue;
                    };
                    requests.push((record.job.id, self.assign(record, idx, candidate)));
                    changed = true;
                }
                Err(SchedulingError::AllWorkersBusy(_)) => {}
                Err(error @ SchedulingError::NoCapableWorker(_)) => {
                    warn!(
                        job_id = %record.job.id,
                        subtask_id = %record.subtasks[idx].subtask.id,
                        "{}",
                        error
                    );
                    self.fail_permanently(record, idx, error.to_string());
                    changed = true;
                    break;
                }
            }
        }
        if changed {
            self.settle(record);
        }
    }

    fn assign(&self, record: &mut JobRecord, idx: usize, candidate: RankedCandidate) -> DispatchRequest {
        let job_id = record.job.id;
        let payload = match record.subtasks[idx].subtask.depends_on {
            Some(predecessor) => record.output_of(&predecessor).cloned().unwrap_or(JsonValue::Null),
            None => record.subtasks[idx].subtask.payload.clone(),
        };

        let st = &mut record.subtasks[idx];
        st.attempts += 1;
        let attempt = st.attempts;
        let subtask_id = st.subtask.id;
        let deadline = st.subtask.deadline;

        info!(
            job_id = %job_id,
            subtask_id = %subtask_id,
            worker_id = %candidate.worker_id,
            attempt,
            expected_ms = candidate.prediction.expected_time_ms,
            "Assigning subtask"
        );

        st.status = SubtaskStatus::Assigned;
        st.active = Some(ActiveAttempt {
            attempt,
            worker_id: candidate.worker_id.clone(),
            audit_index: record.assignments.len(),
            timer: Some(self.spawn_deadline_timer(job_id, subtask_id, attempt, deadline)),
        });
        let task_type = st.subtask.task_type.clone();

        record.assignments.push(Assignment::new(
            subtask_id,
            candidate.worker_id.clone(),
            attempt,
            candidate.prediction.expected_time_ms,
        ));

        DispatchRequest {
            subtask_id,
            attempt,
            worker_id: candidate.worker_id,
            task_type,
            payload,
            deadline,
        }
    }

    fn spawn_deadline_timer(
        &self,
        job_id: JobId,
        subtask_id: SubtaskId,
        attempt: u32,
        deadline: Duration,
    ) -> JoinHandle<()> {
        let this = self.this.clone();
        tokio::spawn(async move {
            tokio::time::sleep(deadline).await;
            if let Some(coordinator) = this.upgrade() {
                coordinator.handle_timeout(job_id, subtask_id, attempt);
                coordinator.drive().await;
            }
        })
    }

    fn spawn_retry_timer(
        &self,
        job_id: JobId,
        subtask_id: SubtaskId,
        attempt: u32,
        delay: Duration,
    ) -> JoinHandle<()> {
        let this = self.this.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(coordinator) = this.upgrade() {
                coordinator.release_retry(job_id, subtask_id, attempt);
                coordinator.drive().await;
            }
        })
    }

    fn handle_timeout(&self, job_id: JobId, subtask_id: SubtaskId, attempt: u32) {
        let Some(record) = self.job_record(&job_id) else {
            return;
        };
        let mut record = record.lock();
        let Some(&idx) = record.positions.get(&subtask_id) else {
            return;
        };
        let st = &mut record.subtasks[idx];
        let deadline_ms = st.subtask.deadline.as_millis() as u64;
        let Some(active) = st.active.as_mut().filter(|a| a.attempt == attempt) else {
            return;
        };
        // Running on the timer task itself, which must not abort itself
        active.timer.take();
        let error = SubtaskError::WorkerTimeout {
            worker_id: active.worker_id.clone(),
            deadline_ms,
        };
        self.fail_attempt(&mut record, idx, AssignmentState::TimedOut, error, true);
        self.settle(&mut record);
    }

    fn release_retry(&self, job_id: JobId, subtask_id: SubtaskId, attempt: u32) {
        let Some(record) = self.job_record(&job_id) else {
            return;
        };
        let mut record = record.lock();
        let Some(&idx) = record.positions.get(&subtask_id) else {
            return;
        };
        let st = &mut record.subtasks[idx];
        if st.status == SubtaskStatus::FailedRetryable && st.attempts == attempt {
            st.retry_timer.take();
            st.status = SubtaskStatus::Pending;
            debug!(job_id = %job_id, subtask_id = %subtask_id, next_attempt = attempt + 1, "Subtask ready for retry");
            record.publish();
        }
    }

    fn handle_dispatch_error(
        &self,
        job_id: JobId,
        subtask_id: SubtaskId,
        attempt: u32,
        worker_id: WorkerId,
        error: DispatchError,
    ) {
        let Some(record) = self.job_record(&job_id) else {
            return;
        };
        let mut record = record.lock();
        let Some(&idx) = record.positions.get(&subtask_id) else {
            return;
        };
        if !record.subtasks[idx].is_active_attempt(attempt) {
            return;
        }
        let error = SubtaskError::DispatchFailed {
            worker_id,
            message: error.to_string(),
        };
        self.fail_attempt(&mut record, idx, AssignmentState::Failed, error, true);
        self.settle(&mut record);
    }

    /// Fail every active attempt running on `worker_id`
    fn lose_worker(&self, worker_id: &WorkerId, penalize: bool) {
        let records: Vec<_> = self.jobs.read().values().cloned().collect();
        for record in records {
            let mut record = record.lock();
            let lost: Vec<usize> = record
                .subtasks
                .iter()
                .enumerate()
                .filter(|(_, s)| s.active.as_ref().is_some_and(|a| &a.worker_id == worker_id))
                .map(|(idx, _)| idx)
                .collect();
            if lost.is_empty() {
                continue;
            }
            for idx in lost {
                let error = SubtaskError::WorkerLost(worker_id.clone());
                self.fail_attempt(&mut record, idx, AssignmentState::WorkerLost, error, penalize);
            }
            self.settle(&mut record);
        }
    }

    /// Close the active attempt of a subtask as failed and decide what follows
    fn fail_attempt(
        &self,
        record: &mut JobRecord,
        idx: usize,
        state: AssignmentState,
        error: SubtaskError,
        penalize: bool,
    ) {
        let job_id = record.job.id;
        let halted = record.is_halted();
        let Some(mut active) = record.subtasks[idx].active.take() else {
            return;
        };
        if let Some(timer) = active.timer.take() {
            timer.abort();
        }

        let elapsed_ms = record.assignments[active.audit_index].elapsed_ms();
        record.assignments[active.audit_index].state = if halted {
            AssignmentState::Abandoned
        } else {
            state
        };
        self.registry.release_slot(&active.worker_id);

        let st = &mut record.subtasks[idx];
        if halted {
            st.status = SubtaskStatus::Cancelled;
            debug!(
                job_id = %job_id,
                subtask_id = %st.subtask.id,
                attempt = active.attempt,
                "Attempt of a halted job ended without a result"
            );
            return;
        }

        if penalize {
            self.model
                .observe(&active.worker_id, &st.subtask.task_type, elapsed_ms, false);
        }
        warn!(
            job_id = %job_id,
            subtask_id = %st.subtask.id,
            worker_id = %active.worker_id,
            attempt = active.attempt,
            error_code = TesseraError::from(error.clone()).error_code(),
            "Attempt failed: {}",
            error
        );
        st.excluded.insert(active.worker_id);
        st.last_error = Some(error.to_string());

        let retryable = TesseraError::from(error).is_retryable();
        match self.retry.decide(active.attempt, retryable) {
            RetryDecision::RetryAfter(delay) => {
                st.status = SubtaskStatus::FailedRetryable;
                let subtask_id = st.subtask.id;
                st.retry_timer = Some(self.spawn_retry_timer(job_id, subtask_id, active.attempt, delay));
            }
            RetryDecision::GiveUp => {
                let reason = format!(
                    "failed after {} attempts: {}",
                    active.attempt,
                    st.last_error.as_deref().unwrap_or("unknown error")
                );
                self.fail_permanently(record, idx, reason);
            }
        }
    }

    /// Mark a subtask failed for good, along with every pipeline stage waiting on it
    fn fail_permanently(&self, record: &mut JobRecord, idx: usize, reason: String) {
        let job_id = record.job.id;
        let mut pending = vec![(idx, reason)];
        while let Some((idx, reason)) = pending.pop() {
            let st = &mut record.subtasks[idx];
            st.abort_retry();
            st.status = SubtaskStatus::FailedPermanently;
            warn!(
                job_id = %job_id,
                subtask_id = %st.subtask.id,
                label = %st.subtask.label,
                "Subtask failed permanently: {}",
                reason
            );
            st.last_error = Some(reason);

            let failed_id = st.subtask.id;
            let label = st.subtask.label.clone();
            for (dep_idx, dependent) in record.subtasks.iter().enumerate() {
                if dependent.subtask.depends_on == Some(failed_id) && !dependent.status.is_terminal() {
                    pending.push((dep_idx, format!("predecessor {} failed", label)));
                }
            }
        }
    }

    fn succeed(&self, record: &mut JobRecord, idx: usize, output: JsonValue) {
        let st = &mut record.subtasks[idx];
        st.abort_retry();
        st.status = SubtaskStatus::Succeeded;
        st.output = Some(output);
        st.last_error = None;
        let finished_id = st.subtask.id;

        if record.is_halted() {
            return;
        }
        for dependent in record.subtasks.iter_mut() {
            if dependent.subtask.depends_on == Some(finished_id) && dependent.status == SubtaskStatus::Blocked {
                dependent.status = SubtaskStatus::Pending;
                debug!(subtask_id = %dependent.subtask.id, "Unblocked pipeline stage");
            }
        }
    }

    /// Abandon the active attempt without charging its worker
    fn abandon_active(&self, record: &mut JobRecord, idx: usize) {
        if let Some(mut active) = record.subtasks[idx].active.take() {
            if let Some(timer) = active.timer.take() {
                timer.abort();
            }
            record.assignments[active.audit_index].state = AssignmentState::Abandoned;
            self.registry.release_slot(&active.worker_id);
        }
    }

    /// Deliver the final outcome once it is decided, then publish.
    ///
    /// A job fails as soon as one subtask fails permanently: its remaining
    /// pending and blocked subtasks are stopped and in-flight attempts run out
    /// without penalty.
    fn settle(&self, record: &mut JobRecord) {
        if !record.is_halted() {
            let failed = record
                .subtasks
                .iter()
                .any(|s| s.status == SubtaskStatus::FailedPermanently);
            let outcome = if failed {
                self.stop_remaining(record);
                Some(JobOutcome::PartialFailure(missing_outputs(record)))
            } else if record.completed() == record.subtasks.len() {
                Some(merged_outcome(record))
            } else {
                None
            };

            if let Some(outcome) = outcome {
                info!(job_id = %record.job.id, outcome = outcome.as_str(), "Job finished");
                record.final_outcome = Some(outcome);
                record.finished_at = Some(Instant::now());
            }
        }
        record.publish();
    }

    /// Stop every subtask of a failed job that has not been dispatched
    fn stop_remaining(&self, record: &mut JobRecord) {
        let mut stopped = 0;
        for st in record.subtasks.iter_mut() {
            if matches!(
                st.status,
                SubtaskStatus::Pending | SubtaskStatus::Blocked | SubtaskStatus::FailedRetryable
            ) {
                st.abort_retry();
                st.status = SubtaskStatus::Cancelled;
                st.last_error = Some("stopped after another subtask failed".to_string());
                stopped += 1;
            }
        }
        if stopped > 0 {
            debug!(job_id = %record.job.id, stopped, "Stopped remaining subtasks of failed job");
        }
    }

    fn handle_report(&self, report: ResultReport) -> Result<ReportAck> {
        let record = self
            .owner_record(&report.subtask_id)
            .ok_or(SubtaskError::NotFound(report.subtask_id))?;
        let mut record = record.lock();
        let idx = *record
            .positions
            .get(&report.subtask_id)
            .ok_or(SubtaskError::NotFound(report.subtask_id))?;
        let job_id = record.job.id;
        let attempt = report.attempt;

        let st = &mut record.subtasks[idx];
        if st.reported.contains(&attempt) {
            debug!(subtask_id = %report.subtask_id, attempt, "Duplicate report");
            return Ok(ReportAck::Duplicate);
        }

        let active_worker = st
            .active
            .as_ref()
            .filter(|a| a.attempt == attempt)
            .map(|a| a.worker_id.clone());
        let Some(worker_id) = active_worker else {
            let late_success = report.success
                && attempt >= 1
                && attempt <= st.attempts
                && !st.status.is_terminal();
            if !late_success {
                debug!(subtask_id = %report.subtask_id, attempt, status = %st.status, "Stale report");
                return Ok(ReportAck::Stale);
            }

            st.reported.insert(attempt);
            info!(
                job_id = %job_id,
                subtask_id = %report.subtask_id,
                attempt,
                "Accepting late success"
            );
            self.abandon_active(&mut record, idx);
            self.succeed(&mut record, idx, report.output);
            self.settle(&mut record);
            return Ok(ReportAck::Accepted);
        };

        st.reported.insert(attempt);
        if report.success {
            if let Some(mut active) = st.active.take() {
                if let Some(timer) = active.timer.take() {
                    timer.abort();
                }
                let task_type = st.subtask.task_type.clone();
                let assignment = &mut record.assignments[active.audit_index];
                assignment.state = AssignmentState::Succeeded;
                let elapsed_ms = assignment.elapsed_ms();
                self.registry.release_slot(&worker_id);
                self.model.observe(&worker_id, &task_type, elapsed_ms, true);
                info!(
                    job_id = %job_id,
                    subtask_id = %report.subtask_id,
                    worker_id = %worker_id,
                    attempt,
                    elapsed_ms,
                    "Subtask succeeded"
                );
            }
            self.succeed(&mut record, idx, report.output);
        } else {
            let error = SubtaskError::WorkerReportedFailure {
                worker_id,
                message: report.error.unwrap_or_else(|| "unspecified failure".to_string()),
            };
            self.fail_attempt(&mut record, idx, AssignmentState::Failed, error, true);
        }
        self.settle(&mut record);
        Ok(ReportAck::Accepted)
    }
}

fn merged_outcome(record: &JobRecord) -> JobOutcome {
    let job_id = record.job.id;
    let parts = record
        .subtasks
        .iter()
        .map(|s| (&s.subtask, s.output.clone().unwrap_or(JsonValue::Null)))
        .collect();
    match merge(job_id, &record.strategy, parts) {
        Ok(result) => JobOutcome::Completed(result),
        Err(error) => {
            warn!(job_id = %job_id, "Merge failed: {}", error);
            let missing = record
                .subtasks
                .iter()
                .map(|s| (&s.subtask, format!("merge failed: {}", error)))
                .collect();
            JobOutcome::PartialFailure(partial_failure(job_id, Vec::new(), missing))
        }
    }
}

fn missing_outputs(record: &JobRecord) -> PartialFailure {
    let mut completed = Vec::new();
    let mut missing = Vec::new();
    for s in &record.subtasks {
        match (&s.output, s.status) {
            (Some(output), SubtaskStatus::Succeeded) => completed.push((&s.subtask, output.clone())),
            (_, SubtaskStatus::Assigned) => {
                missing.push((&s.subtask, "still running when the job failed".to_string()))
            }
            _ => missing.push((
                &s.subtask,
                s.last_error.clone().unwrap_or_else(|| s.status.to_string()),
            )),
        }
    }
    partial_failure(record.job.id, completed, missing)
}

#[async_trait]
impl JobService for ExecutionCoordinator {
    async fn submit_job(
        &self,
        job_type: JobType,
        payload: JsonValue,
        deadline: Duration,
        priority: Priority,
    ) -> Result<JobId> {
        let job = Job::new(job_type, payload, deadline).with_priority(priority);
        self.submit(job, self.default_subtask_count).await
    }

    async fn get_result(&self, job_id: JobId) -> Result<JobOutcome> {
        let record = self
            .job_record(&job_id)
            .ok_or(JobError::NotFound(job_id))?;
        let outcome = record.lock().outcome();
        Ok(outcome)
    }

    async fn cancel_job(&self, job_id: JobId) -> Result<()> {
        let record = self
            .job_record(&job_id)
            .ok_or(JobError::NotFound(job_id))?;
        let mut record = record.lock();
        if record.is_halted() {
            return Ok(());
        }

        record.cancelled = true;
        record.finished_at = Some(Instant::now());
        let mut stopped = 0;
        for st in record.subtasks.iter_mut() {
            if matches!(
                st.status,
                SubtaskStatus::Pending | SubtaskStatus::Blocked | SubtaskStatus::FailedRetryable
            ) {
                st.abort_retry();
                st.status = SubtaskStatus::Cancelled;
                stopped += 1;
            }
        }
        info!(job_id = %job_id, stopped, "Cancelled job");
        record.publish();
        Ok(())
    }
}

#[async_trait]
impl WorkerGateway for ExecutionCoordinator {
    async fn register_worker(&self, worker_id: WorkerId, capabilities: WorkerCapabilities) -> Result<()> {
        let outcome = self.registry.register(worker_id.clone(), capabilities)?;
        debug!(worker_id = %worker_id, epoch = outcome.epoch(), "Worker registration accepted");
        self.drive().await;
        Ok(())
    }

    async fn heartbeat(&self, worker_id: WorkerId, load: f64) -> Result<()> {
        self.registry.heartbeat(&worker_id, load)?;
        self.drive().await;
        Ok(())
    }

    async fn report_result(&self, report: ResultReport) -> Result<ReportAck> {
        let ack = self.handle_report(report)?;
        if ack == ReportAck::Accepted {
            self.drive().await;
        }
        Ok(ack)
    }
}
