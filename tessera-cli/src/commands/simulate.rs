//! `tessera simulate`: one job against an in-process worker pool

use anyhow::{Context, Result};
use colored::Colorize;
use serde_json::{json, Value as JsonValue};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use tessera_config::{StrategySpec, TesseraConfig};
use tessera_core::{CapacityClass, Job, JobOutcome, WorkerCapabilities};
use tessera_execution::{ExecutionCoordinator, JobStatus, SimulatedWorker, SimulatedWorkerPool};
use tessera_interfaces::WorkerGateway;
use tessera_resilience::ShutdownCoordinator;

use crate::cli::SimulateArgs;

const CLASSES: [CapacityClass; 4] = [
    CapacityClass::Small,
    CapacityClass::Medium,
    CapacityClass::Large,
    CapacityClass::Accelerated,
];

/// Outcome of a simulation run together with the job's audit trail
#[derive(Debug)]
pub struct SimulationReport {
    pub outcome: JobOutcome,
    pub status: JobStatus,
    pub dispatched: u64,
}

impl SimulationReport {
    /// JSON printed on stdout
    pub fn to_json(&self, output_only: bool) -> Result<JsonValue> {
        match (&self.outcome, output_only) {
            (JobOutcome::Completed(result), true) => {
                serde_json::to_value(&result.output).context("Failed to serialize merged output")
            }
            _ => serde_json::to_value(&self.outcome).context("Failed to serialize outcome"),
        }
    }

    /// One-line human summary for stderr
    pub fn summary(&self) -> String {
        let label = match &self.outcome {
            JobOutcome::Completed(_) => "completed".green(),
            JobOutcome::PartialFailure(_) => "partial failure".yellow(),
            JobOutcome::Cancelled { .. } => "cancelled".red(),
            JobOutcome::Pending { .. } => "pending".normal(),
        };
        let retried = self.status.subtasks.iter().filter(|s| s.attempts > 1).count();
        format!(
            "{} {}: {} subtasks, {} assignments, {} retried, {} dispatches",
            self.status.job_type.as_str().bold(),
            label,
            self.status.subtasks.len(),
            self.status.assignments.len(),
            retried,
            self.dispatched
        )
    }
}

/// Every task type the configured strategies can produce
fn task_types(config: &TesseraConfig) -> BTreeSet<String> {
    let mut types = BTreeSet::new();
    for spec in config.decomposition.strategies.values() {
        match spec {
            StrategySpec::Spatial { task_type, .. } => {
                types.insert(task_type.clone());
            }
            StrategySpec::Functional { roles } => {
                types.extend(roles.iter().map(|r| r.task_type.clone()));
            }
            StrategySpec::Pipeline { stages } => {
                types.extend(stages.iter().map(|s| s.task_type.clone()));
            }
        }
    }
    types
}

fn build_workers(config: &TesseraConfig, args: &SimulateArgs) -> Vec<SimulatedWorker> {
    let types = task_types(config);
    (0..args.workers.max(1))
        .map(|i| {
            let caps = WorkerCapabilities::new(CLASSES[i % CLASSES.len()], types.iter().cloned())
                .with_max_concurrent(2);
            SimulatedWorker::new(format!("sim-{:02}", i + 1), caps)
                .with_failure_rate(args.failure_rate)
                .with_hang_rate(args.hang_rate)
        })
        .collect()
}

fn job_payload(config: &TesseraConfig, args: &SimulateArgs) -> JsonValue {
    match config.decomposition.strategies.get(&args.job_type) {
        Some(StrategySpec::Spatial { .. }) => json!({
            "region": {"x": 0, "y": 0, "width": args.size, "height": args.size}
        }),
        _ => json!({"seed": args.seed}),
    }
}

/// Run one job to completion against simulated workers
pub async fn run_simulation(config: &TesseraConfig, args: &SimulateArgs) -> Result<SimulationReport> {
    let pool = SimulatedWorkerPool::new(build_workers(config, args), args.seed);
    let coordinator = ExecutionCoordinator::new(config, pool.clone());
    let gateway: Arc<dyn WorkerGateway> = coordinator.clone();
    pool.attach(Arc::downgrade(&gateway));
    pool.register_all().await.context("Failed to register simulated workers")?;

    let shutdown = ShutdownCoordinator::with_timeout(Duration::from_secs(1));
    let maintenance = coordinator.spawn_maintenance(&shutdown);
    let heartbeats = pool.spawn_heartbeats(config.registry.heartbeat_interval, &shutdown);

    let job = Job::new(
        args.job_type.as_str(),
        job_payload(config, args),
        Duration::from_millis(args.deadline_ms),
    );
    info!(
        job_type = %job.job_type,
        workers = args.workers,
        failure_rate = args.failure_rate,
        "Starting simulation"
    );

    let result = async {
        let job_id = coordinator.submit(job, args.subtasks).await?;
        let outcome = coordinator.wait_for_result(job_id).await?;
        let status = coordinator.job_status(job_id)?;
        Ok::<_, tessera_core::TesseraError>((outcome, status))
    }
    .await;

    if let Err(e) = shutdown.shutdown().await {
        warn!("Shutdown did not complete cleanly: {}", e);
    }
    let _ = tokio::join!(maintenance, heartbeats);

    let (outcome, status) = result.context("Simulation failed")?;
    Ok(SimulationReport {
        outcome,
        status,
        dispatched: pool.dispatched_count(),
    })
}
