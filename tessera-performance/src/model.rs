//! Performance model
//!
//! One [`PairStats`] per (worker, task type) holds a bounded [`SampleWindow`]
//! and hour-of-day buckets. The outer map is only write-locked to insert a new
//! pair; observations lock just the touched entry.

use chrono::{Timelike, Utc};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use tessera_config::PredictionConfig;
use tessera_core::{Prediction, PredictionContext, TaskType, WorkerId};
use tokio::time::Instant;
use tracing::{debug, trace};

use crate::stats::{ModelStats, StatsCollector};
use crate::window::{HourBuckets, Sample, SampleWindow};

type PairKey = (WorkerId, TaskType);

#[derive(Debug)]
struct PairStats {
    window: SampleWindow,
    hours: HourBuckets,
    last_sample: Option<Instant>,
}

impl PairStats {
    fn new(window_size: usize) -> Self {
        Self {
            window: SampleWindow::new(window_size),
            hours: HourBuckets::default(),
            last_sample: None,
        }
    }
}

/// Shared store of observed worker performance.
///
/// Construct one per coordinator and pass it around by `Arc`.
#[derive(Debug)]
pub struct PerformanceModel {
    entries: RwLock<HashMap<PairKey, Arc<Mutex<PairStats>>>>,
    config: PredictionConfig,
    stats: StatsCollector,
}

impl PerformanceModel {
    pub fn new(config: PredictionConfig) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            config,
            stats: StatsCollector::new(),
        }
    }

    pub fn config(&self) -> &PredictionConfig {
        &self.config
    }

    fn entry(&self, worker_id: &WorkerId, task_type: &TaskType) -> Option<Arc<Mutex<PairStats>>> {
        self.entries
            .read()
            .get(&(worker_id.clone(), task_type.clone()))
            .cloned()
    }

    fn entry_or_insert(&self, worker_id: &WorkerId, task_type: &TaskType) -> Arc<Mutex<PairStats>> {
        if let Some(entry) = self.entry(worker_id, task_type) {
            return entry;
        }
        let window_size = self.config.window_size;
        self.entries
            .write()
            .entry((worker_id.clone(), task_type.clone()))
            .or_insert_with(|| Arc::new(Mutex::new(PairStats::new(window_size))))
            .clone()
    }

    /// Predict completion time and failure risk for running `task_type` on `worker_id`
    pub fn predict(
        &self,
        worker_id: &WorkerId,
        task_type: &TaskType,
        ctx: &PredictionContext,
    ) -> Prediction {
        let config = &self.config;
        let load = ctx.load();
        let load_factor = 1.0 + config.load_penalty * load;

        let entry = self.entry(worker_id, task_type);
        let guard = entry.as_ref().map(|e| e.lock());
        let pair = guard.as_deref();

        let successes = pair.map_or(0, |p| p.window.successes());
        let failures = pair.map_or(0, |p| p.window.failures());
        let attempts = successes + failures;
        let min_samples = config.min_samples.max(1);
        let cold_start = successes < min_samples;

        let sample_weight = successes as f64 / (successes + min_samples) as f64;
        let recency = pair
            .and_then(|p| p.last_sample)
            .map(|last| {
                let age = last.elapsed().as_secs_f64();
                let half_life = config.recency_half_life.as_secs_f64().max(f64::EPSILON);
                0.5f64.powf(age / half_life)
            })
            .unwrap_or(0.0);

        let (base_ms, confidence) = match pair.and_then(|p| p.window.mean_ms()) {
            Some(mean) if !cold_start => {
                let hour_factor = ctx
                    .hour_of_day
                    .and_then(|h| {
                        pair.and_then(|p| p.hours.factor(h, config.hour_bucket_min_samples))
                    })
                    .unwrap_or(1.0);
                let cv_squared = pair.and_then(|p| p.window.cv_squared()).unwrap_or(0.0);
                (
                    mean * hour_factor,
                    sample_weight * recency / (1.0 + cv_squared),
                )
            }
            _ => {
                let speed = ctx.capacity_class.speed_factor();
                let cost = ctx.estimated_cost_units.max(0.0);
                (
                    cost * config.base_ms_per_cost_unit / speed,
                    sample_weight * recency,
                )
            }
        };

        let alpha = config.prior_failures;
        let beta = config.prior_successes;
        let base_p = (failures as f64 + alpha) / (attempts as f64 + alpha + beta);
        let failure_probability = (1.0 - (1.0 - base_p) * (-config.load_risk * load).exp())
            .clamp(f64::MIN_POSITIVE, 1.0 - f64::EPSILON);

        drop(guard);
        self.stats.record_prediction(cold_start);

        let prediction = Prediction {
            expected_time_ms: base_ms * load_factor,
            confidence: confidence.clamp(0.0, 1.0),
            failure_probability,
            cold_start,
        };
        trace!(
            worker_id = %worker_id,
            task_type = %task_type,
            expected_ms = prediction.expected_time_ms,
            failure_probability = prediction.failure_probability,
            cold_start,
            "Prediction"
        );
        prediction
    }

    /// Record the outcome of one attempt, bucketed by the current UTC hour
    pub fn observe(
        &self,
        worker_id: &WorkerId,
        task_type: &TaskType,
        actual_time_ms: f64,
        succeeded: bool,
    ) {
        let hour = Utc::now().hour() as u8;
        self.observe_at_hour(worker_id, task_type, actual_time_ms, succeeded, hour);
    }

    /// Record the outcome of one attempt in an explicit hour-of-day bucket
    pub fn observe_at_hour(
        &self,
        worker_id: &WorkerId,
        task_type: &TaskType,
        actual_time_ms: f64,
        succeeded: bool,
        hour: u8,
    ) {
        let duration_ms = if actual_time_ms.is_finite() {
            actual_time_ms.max(0.0)
        } else {
            0.0
        };

        let entry = self.entry_or_insert(worker_id, task_type);
        let mut pair = entry.lock();
        pair.window.push(Sample {
            duration_ms,
            succeeded,
        });
        if succeeded {
            pair.hours.record(hour, duration_ms);
        }
        pair.last_sample = Some(Instant::now());
        drop(pair);

        self.stats.record_observation(succeeded);
        debug!(
            worker_id = %worker_id,
            task_type = %task_type,
            duration_ms,
            succeeded,
            "Recorded observation"
        );
    }

    /// Successes over attempts across every task type retained for the worker
    pub fn reliability(&self, worker_id: &WorkerId) -> Option<f64> {
        let entries = self.entries.read();
        let (successes, attempts) = entries
            .iter()
            .filter(|((id, _), _)| id == worker_id)
            .fold((0usize, 0usize), |(s, a), (_, entry)| {
                let pair = entry.lock();
                (s + pair.window.successes(), a + pair.window.attempts())
            });
        (attempts > 0).then(|| successes as f64 / attempts as f64)
    }

    /// Successful samples retained for a pair
    pub fn sample_count(&self, worker_id: &WorkerId, task_type: &TaskType) -> usize {
        self.entry(worker_id, task_type)
            .map_or(0, |entry| entry.lock().window.successes())
    }

    /// Drop all history for a worker
    pub fn forget(&self, worker_id: &WorkerId) -> usize {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|(id, _), _| id != worker_id);
        before - entries.len()
    }

    pub fn stats(&self) -> ModelStats {
        self.stats.get_stats(self.entries.read().len())
    }
}

impl Default for PerformanceModel {
    fn default() -> Self {
        Self::new(PredictionConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use tessera_core::CapacityClass;

    fn worker() -> WorkerId {
        WorkerId::from("w1")
    }

    fn render() -> TaskType {
        TaskType::from("render")
    }

    fn ctx(class: CapacityClass, cost: f64) -> PredictionContext {
        PredictionContext {
            capacity_class: class,
            estimated_cost_units: cost,
            ..Default::default()
        }
    }

    #[test]
    fn test_cold_start_heuristic() {
        let model = PerformanceModel::default();
        let medium = model.predict(&worker(), &render(), &ctx(CapacityClass::Medium, 10.0));
        assert!(medium.cold_start);
        assert_eq!(medium.expected_time_ms, 1000.0);
        assert_eq!(medium.confidence, 0.0);
        assert!((medium.failure_probability - 0.1).abs() < 1e-9);

        let fast = model.predict(&worker(), &render(), &ctx(CapacityClass::Accelerated, 10.0));
        assert!(fast.expected_time_ms < medium.expected_time_ms);
    }

    #[tokio::test(start_paused = true)]
    async fn test_warm_prediction_uses_history() {
        let model = PerformanceModel::default();
        for _ in 0..10 {
            model.observe_at_hour(&worker(), &render(), 250.0, true, 3);
        }
        let p = model.predict(&worker(), &render(), &ctx(CapacityClass::Small, 10.0));
        assert!(!p.cold_start);
        assert!((p.expected_time_ms - 250.0).abs() < 1e-9);
        assert!((p.confidence - 0.5).abs() < 1e-9);
        assert_eq!(model.sample_count(&worker(), &render()), 10);
    }

    #[tokio::test(start_paused = true)]
    async fn test_confidence_decays_with_age() {
        let model = PerformanceModel::default();
        for _ in 0..10 {
            model.observe(&worker(), &render(), 100.0, true);
        }
        let fresh = model.predict(&worker(), &render(), &ctx(CapacityClass::Medium, 1.0));
        tokio::time::advance(std::time::Duration::from_secs(3600)).await;
        let stale = model.predict(&worker(), &render(), &ctx(CapacityClass::Medium, 1.0));
        assert!((stale.confidence - fresh.confidence / 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_hour_of_day_factor() {
        let model = PerformanceModel::default();
        for _ in 0..10 {
            model.observe_at_hour(&worker(), &render(), 100.0, true, 2);
            model.observe_at_hour(&worker(), &render(), 300.0, true, 20);
        }
        let mut context = ctx(CapacityClass::Medium, 1.0);
        context.hour_of_day = Some(20);
        let evening = model.predict(&worker(), &render(), &context);
        context.hour_of_day = Some(2);
        let night = model.predict(&worker(), &render(), &context);
        context.hour_of_day = None;
        let overall = model.predict(&worker(), &render(), &context);

        assert!(evening.expected_time_ms > overall.expected_time_ms);
        assert!(night.expected_time_ms < overall.expected_time_ms);
    }

    #[test]
    fn test_failure_raises_probability() {
        let model = PerformanceModel::default();
        let before = model.predict(&worker(), &render(), &ctx(CapacityClass::Medium, 1.0));
        model.observe(&worker(), &render(), 0.0, false);
        let after = model.predict(&worker(), &render(), &ctx(CapacityClass::Medium, 1.0));
        assert!(after.failure_probability > before.failure_probability);
    }

    #[test]
    fn test_reliability_and_forget() {
        let model = PerformanceModel::default();
        assert_eq!(model.reliability(&worker()), None);

        model.observe(&worker(), &render(), 10.0, true);
        model.observe(&worker(), &TaskType::from("ai"), 10.0, true);
        model.observe(&worker(), &render(), 0.0, false);
        model.observe(&WorkerId::from("w2"), &render(), 0.0, false);

        let reliability = model.reliability(&worker()).unwrap();
        assert!((reliability - 2.0 / 3.0).abs() < 1e-9);
        assert_eq!(model.stats().tracked_pairs, 3);

        assert_eq!(model.forget(&worker()), 2);
        assert_eq!(model.reliability(&worker()), None);
        assert_eq!(model.reliability(&WorkerId::from("w2")), Some(0.0));
    }

    #[test]
    fn test_stats_track_cold_predictions() {
        let model = PerformanceModel::default();
        model.predict(&worker(), &render(), &PredictionContext::default());
        model.observe(&worker(), &render(), 5.0, false);

        let stats = model.stats();
        assert_eq!(stats.predictions, 1);
        assert_eq!(stats.cold_start_predictions, 1);
        assert_eq!(stats.failed_observations, 1);
        assert_eq!(stats.cold_start_rate, 1.0);
    }

    proptest! {
        #[test]
        fn prop_cold_start_probability_is_open_interval(
            load in 0.0f64..50.0,
            in_flight in 0u32..16,
            cost in 0.0f64..1000.0,
        ) {
            let model = PerformanceModel::default();
            let context = PredictionContext {
                declared_load: load,
                in_flight,
                estimated_cost_units: cost,
                ..Default::default()
            };
            let p = model.predict(&worker(), &render(), &context);
            prop_assert!(p.failure_probability > 0.0);
            prop_assert!(p.failure_probability < 1.0);
            prop_assert!(p.expected_time_ms.is_finite());
        }

        #[test]
        fn prop_failure_probability_monotone_in_failures(
            successes in 0usize..40,
            failures in 0usize..40,
        ) {
            let fewer = PerformanceModel::default();
            let more = PerformanceModel::default();
            for _ in 0..successes {
                fewer.observe(&worker(), &render(), 100.0, true);
                more.observe(&worker(), &render(), 100.0, true);
            }
            for _ in 0..failures {
                fewer.observe(&worker(), &render(), 0.0, false);
                more.observe(&worker(), &render(), 0.0, false);
            }
            more.observe(&worker(), &render(), 0.0, false);

            let context = PredictionContext::default();
            let p_fewer = fewer.predict(&worker(), &render(), &context).failure_probability;
            let p_more = more.predict(&worker(), &render(), &context).failure_probability;
            prop_assert!(p_more >= p_fewer);
        }

        #[test]
        fn prop_prediction_monotone_in_load(
            failures in 0usize..10,
            low in 0.0f64..10.0,
            extra in 0.0f64..10.0,
        ) {
            let model = PerformanceModel::default();
            for _ in 0..failures {
                model.observe(&worker(), &render(), 0.0, false);
            }
            let light = PredictionContext { declared_load: low, ..Default::default() };
            let heavy = PredictionContext { declared_load: low + extra, ..Default::default() };
            let p_light = model.predict(&worker(), &render(), &light);
            let p_heavy = model.predict(&worker(), &render(), &heavy);
            prop_assert!(p_heavy.failure_probability >= p_light.failure_probability);
            prop_assert!(p_heavy.expected_time_ms >= p_light.expected_time_ms);
        }
    }
}
