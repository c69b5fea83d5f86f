//! Worker ranking for subtask placement

use chrono::{Timelike, Utc};
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::trace;

use tessera_config::SchedulerConfig;
use tessera_core::{Prediction, PredictionContext, SchedulingError, Subtask, WorkerId};
use tessera_performance::PerformanceModel;
use tessera_registry::{WorkerRegistry, WorkerSnapshot};

/// A worker considered for a subtask, with the prediction behind its rank
#[derive(Debug, Clone, Serialize)]
pub struct RankedCandidate {
    pub worker_id: WorkerId,
    pub prediction: Prediction,
    /// Expected time inflated by failure risk; lower is better
    pub score: f64,
    pub in_flight: u32,
}

/// Ranks available workers for a subtask using the performance model
pub struct Scheduler {
    registry: Arc<WorkerRegistry>,
    model: Arc<PerformanceModel>,
    config: SchedulerConfig,
}

impl Scheduler {
    pub fn new(registry: Arc<WorkerRegistry>, model: Arc<PerformanceModel>, config: SchedulerConfig) -> Self {
        Self {
            registry,
            model,
            config,
        }
    }

    fn context(&self, worker: &WorkerSnapshot, subtask: &Subtask, hour: u8) -> PredictionContext {
        PredictionContext {
            declared_load: worker.declared_load,
            in_flight: worker.in_flight,
            capacity_class: worker.capabilities.capacity_class,
            estimated_cost_units: subtask.constraints.estimated_cost_units,
            hour_of_day: Some(hour),
        }
    }

    /// Rank candidates for `subtask`: the primary first, then up to `backup_count` backups.
    ///
    /// Workers in `excluded` already failed this subtask and are never
    /// candidates; when they are the only capable workers the subtask has
    /// nowhere left to go.
    pub fn rank(
        &self,
        subtask: &Subtask,
        excluded: &HashSet<WorkerId>,
    ) -> Result<Vec<RankedCandidate>, SchedulingError> {
        let capable = self.registry.list_capable_for(subtask);
        if capable.is_empty() {
            return Err(SchedulingError::NoCapableWorker(subtask.task_type.clone()));
        }

        let pool: Vec<&WorkerSnapshot> = capable
            .iter()
            .filter(|w| !excluded.contains(&w.worker_id))
            .collect();
        if pool.is_empty() {
            return Err(SchedulingError::NoCapableWorker(subtask.task_type.clone()));
        }

        let hour = Utc::now().hour() as u8;
        let max_p = self.config.max_failure_probability;
        let mut ranked: Vec<RankedCandidate> = pool
            .into_iter()
            .filter(|w| w.has_free_slot())
            .map(|worker| {
                let ctx = self.context(worker, subtask, hour);
                let prediction = self.model.predict(&worker.worker_id, &subtask.task_type, &ctx);
                RankedCandidate {
                    worker_id: worker.worker_id.clone(),
                    score: prediction.score(max_p),
                    prediction,
                    in_flight: worker.in_flight,
                }
            })
            .collect();

        if ranked.is_empty() {
            return Err(SchedulingError::AllWorkersBusy(subtask.task_type.clone()));
        }

        ranked.sort_by(compare);
        ranked.truncate(1 + self.config.backup_count);

        trace!(
            subtask_id = %subtask.id,
            primary = %ranked[0].worker_id,
            candidates = ranked.len(),
            "Ranked workers"
        );
        Ok(ranked)
    }
}

fn compare(a: &RankedCandidate, b: &RankedCandidate) -> Ordering {
    a.score
        .total_cmp(&b.score)
        .then_with(|| {
            a.prediction
                .failure_probability
                .total_cmp(&b.prediction.failure_probability)
        })
        .then_with(|| a.in_flight.cmp(&b.in_flight))
        .then_with(|| a.worker_id.cmp(&b.worker_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;
    use tessera_core::{
        CapacityClass, JobId, ResourceConstraints, SubtaskId, SubtaskShape, TaskType,
        WorkerCapabilities,
    };

    fn subtask(task_type: &str, requires_accelerator: bool) -> Subtask {
        Subtask {
            id: SubtaskId::new(),
            job_id: JobId::new(),
            label: "tile".to_string(),
            task_type: TaskType::from(task_type),
            payload: json!({}),
            constraints: ResourceConstraints {
                requires_accelerator,
                estimated_cost_units: 10.0,
            },
            deadline: Duration::from_secs(1),
            sequence: 0,
            depends_on: None,
            shape: SubtaskShape::Role {
                role: task_type.to_string(),
            },
        }
    }

    fn setup() -> (Arc<WorkerRegistry>, Arc<PerformanceModel>, Scheduler) {
        let registry = Arc::new(WorkerRegistry::default());
        let model = Arc::new(PerformanceModel::default());
        let scheduler = Scheduler::new(registry.clone(), model.clone(), SchedulerConfig::default());
        (registry, model, scheduler)
    }

    fn register(registry: &WorkerRegistry, id: &str, class: CapacityClass) {
        registry
            .register(WorkerId::from(id), WorkerCapabilities::new(class, ["render"]))
            .unwrap();
    }

    #[tokio::test]
    async fn test_faster_class_ranks_first() {
        let (registry, _, scheduler) = setup();
        register(&registry, "small", CapacityClass::Small);
        register(&registry, "large", CapacityClass::Large);
        register(&registry, "medium", CapacityClass::Medium);

        let ranked = scheduler.rank(&subtask("render", false), &HashSet::new()).unwrap();
        let order: Vec<_> = ranked.iter().map(|c| c.worker_id.as_str()).collect();
        assert_eq!(order, vec!["large", "medium", "small"]);
        assert!(ranked.iter().all(|c| c.prediction.cold_start));
    }

    #[tokio::test]
    async fn test_ties_break_on_worker_id() {
        let (registry, _, scheduler) = setup();
        for id in ["w3", "w1", "w2", "w4"] {
            register(&registry, id, CapacityClass::Medium);
        }
        let ranked = scheduler.rank(&subtask("render", false), &HashSet::new()).unwrap();
        let order: Vec<_> = ranked.iter().map(|c| c.worker_id.as_str()).collect();
        // Primary plus two backups
        assert_eq!(order, vec!["w1", "w2", "w3"]);
    }

    #[tokio::test]
    async fn test_failure_history_demotes_worker() {
        let (registry, model, scheduler) = setup();
        register(&registry, "w1", CapacityClass::Medium);
        register(&registry, "w2", CapacityClass::Medium);
        for _ in 0..3 {
            model.observe(&WorkerId::from("w1"), &TaskType::from("render"), 0.0, false);
        }

        let ranked = scheduler.rank(&subtask("render", false), &HashSet::new()).unwrap();
        assert_eq!(ranked[0].worker_id.as_str(), "w2");
        assert!(ranked[1].prediction.failure_probability > ranked[0].prediction.failure_probability);
    }

    #[tokio::test]
    async fn test_no_capable_worker() {
        let (registry, _, scheduler) = setup();
        register(&registry, "w1", CapacityClass::Large);

        let err = scheduler.rank(&subtask("physics", false), &HashSet::new()).unwrap_err();
        assert_eq!(err, SchedulingError::NoCapableWorker(TaskType::from("physics")));

        // Capable by task type but lacking an accelerator
        let err = scheduler.rank(&subtask("render", true), &HashSet::new()).unwrap_err();
        assert!(matches!(err, SchedulingError::NoCapableWorker(_)));
    }

    #[tokio::test]
    async fn test_all_workers_busy() {
        let (registry, _, scheduler) = setup();
        register(&registry, "w1", CapacityClass::Medium);
        assert!(registry.reserve_slot(&WorkerId::from("w1")));

        let err = scheduler.rank(&subtask("render", false), &HashSet::new()).unwrap_err();
        assert_eq!(err, SchedulingError::AllWorkersBusy(TaskType::from("render")));
    }

    #[tokio::test]
    async fn test_excluded_workers_are_never_ranked() {
        let (registry, _, scheduler) = setup();
        register(&registry, "w1", CapacityClass::Large);
        register(&registry, "w2", CapacityClass::Small);

        let excluded: HashSet<_> = [WorkerId::from("w1")].into_iter().collect();
        let ranked = scheduler.rank(&subtask("render", false), &excluded).unwrap();
        let order: Vec<_> = ranked.iter().map(|c| c.worker_id.as_str()).collect();
        assert_eq!(order, vec!["w2"]);

        let everyone: HashSet<_> = [WorkerId::from("w1"), WorkerId::from("w2")].into_iter().collect();
        let err = scheduler.rank(&subtask("render", false), &everyone).unwrap_err();
        assert_eq!(err, SchedulingError::NoCapableWorker(TaskType::from("render")));

        // An excluded worker's free slot does not turn the others' saturation into a refusal
        assert!(registry.reserve_slot(&WorkerId::from("w2")));
        let err = scheduler.rank(&subtask("render", false), &excluded).unwrap_err();
        assert_eq!(err, SchedulingError::AllWorkersBusy(TaskType::from("render")));
    }

    #[tokio::test]
    async fn test_in_flight_load_spreads_work() {
        let (registry, _, scheduler) = setup();
        let caps = WorkerCapabilities::new(CapacityClass::Medium, ["render"]).with_max_concurrent(4);
        registry.register(WorkerId::from("w1"), caps.clone()).unwrap();
        registry.register(WorkerId::from("w2"), caps).unwrap();
        assert!(registry.reserve_slot(&WorkerId::from("w1")));

        let ranked = scheduler.rank(&subtask("render", false), &HashSet::new()).unwrap();
        assert_eq!(ranked[0].worker_id.as_str(), "w2");
        assert_eq!(ranked[1].in_flight, 1);
    }
}
