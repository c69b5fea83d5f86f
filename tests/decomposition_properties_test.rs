//! Cross-crate properties of decomposition, prediction and scheduling

use proptest::prelude::*;
use serde_json::json;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tessera_config::{DecompositionConfig, PredictionConfig, RegistryConfig, SchedulerConfig};
use tessera_core::{CapacityClass, Job, PredictionContext, TaskType, WorkerCapabilities, WorkerId};
use tessera_decomposition::Decomposer;
use tessera_execution::Scheduler;
use tessera_performance::PerformanceModel;
use tessera_registry::WorkerRegistry;

fn gradient_frame(side: u32) -> Job {
    // Cost grows left to right
    let density: Vec<f64> = (0..side * side).map(|i| (i % side + 1) as f64).collect();
    Job::new(
        "render.frame",
        json!({
            "region": {"x": 0, "y": 0, "width": side, "height": side},
            "density": density
        }),
        Duration::from_secs(10),
    )
}

#[test]
fn test_uneven_costs_split_into_balanced_subtasks() {
    let decomposer = Decomposer::from_config(&DecompositionConfig::default());
    let subtasks = decomposer.decompose(&gradient_frame(16), 4).unwrap();
    assert_eq!(subtasks.len(), 4);

    let costs: Vec<f64> = subtasks
        .iter()
        .map(|s| s.constraints.estimated_cost_units)
        .collect();
    let total: f64 = costs.iter().sum();
    assert_eq!(total, 16.0 * 136.0);

    let mean = total / costs.len() as f64;
    for cost in &costs {
        assert!(
            (cost - mean).abs() / mean < 0.1,
            "cost {} strays from mean {} ({:?})",
            cost,
            mean,
            costs
        );
    }

    // Cheaper columns yield wider tiles
    let widest = subtasks
        .iter()
        .max_by_key(|s| match &s.shape {
            tessera_core::SubtaskShape::Tile { core, .. } => core.width,
            _ => 0,
        })
        .unwrap();
    assert!(widest.label.contains("@(0,"), "widest tile {} should start at the left edge", widest.label);
}

#[test]
fn test_cold_start_workers_rank_with_nonzero_risk() {
    let registry = Arc::new(WorkerRegistry::new(&RegistryConfig::default()));
    let model = Arc::new(PerformanceModel::new(PredictionConfig::default()));
    for (id, class) in [("small", CapacityClass::Small), ("large", CapacityClass::Large)] {
        registry
            .register(WorkerId::from(id), WorkerCapabilities::new(class, ["render"]))
            .unwrap();
    }
    let scheduler = Scheduler::new(registry, model, SchedulerConfig::default());

    let subtasks = Decomposer::from_config(&DecompositionConfig::default())
        .decompose(&gradient_frame(4), 1)
        .unwrap();
    let ranked = scheduler.rank(&subtasks[0], &HashSet::new()).unwrap();

    assert_eq!(ranked[0].worker_id.as_str(), "large");
    for candidate in &ranked {
        assert!(candidate.prediction.cold_start);
        assert!(candidate.prediction.failure_probability > 0.0);
        assert!(candidate.prediction.failure_probability < 1.0);
    }
}

proptest! {
    #[test]
    fn prop_unobserved_worker_never_has_zero_risk(
        declared_load in 0.0f64..50.0,
        in_flight in 0u32..16,
        cost in 0.0f64..1e6,
        prior_failures in 0.01f64..5.0,
        prior_successes in 0.01f64..50.0,
    ) {
        let model = PerformanceModel::new(PredictionConfig {
            prior_failures,
            prior_successes,
            ..PredictionConfig::default()
        });
        let ctx = PredictionContext {
            declared_load,
            in_flight,
            estimated_cost_units: cost,
            ..PredictionContext::default()
        };
        let prediction = model.predict(&WorkerId::from("fresh"), &TaskType::from("render"), &ctx);
        prop_assert!(prediction.failure_probability > 0.0);
        prop_assert!(prediction.failure_probability < 1.0);
        prop_assert!(prediction.expected_time_ms.is_finite());
    }

    #[test]
    fn prop_spatial_subtasks_cover_the_frame(side in 2u32..24, target in 1usize..10) {
        let decomposer = Decomposer::from_config(&DecompositionConfig::default());
        let subtasks = decomposer.decompose(&gradient_frame(side), target).unwrap();
        prop_assert!(subtasks.len() <= target);

        let total: f64 = subtasks.iter().map(|s| s.constraints.estimated_cost_units).sum();
        let expected = (side * side * (side + 1) / 2) as f64;
        prop_assert!((total - expected).abs() < 1e-6);
    }
}
