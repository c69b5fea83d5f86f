//! Job decomposition

use serde::Deserialize;
use serde_json::{json, Value as JsonValue};
use std::sync::Arc;
use tracing::debug;

use tessera_config::DecompositionConfig;
use tessera_core::{
    Job, JobError, Region, ResourceConstraints, Result, Subtask, SubtaskId, SubtaskShape,
};
use tessera_interfaces::CostEstimator;

use crate::spatial::{bisect, DensityMap, UniformCost};
use crate::strategy::{
    scale_duration, DecomposeStrategy, FunctionalRole, PipelineStage, SpatialStrategy,
    StrategyCatalog,
};

/// Payload accepted by spatial job types
#[derive(Debug, Deserialize)]
struct SpatialPayload {
    region: Region,
    #[serde(default)]
    data: Option<JsonValue>,
    /// Row-major per-cell costs over `region`
    #[serde(default)]
    density: Option<Vec<f64>>,
}

/// Splits jobs into subtasks according to the catalogue
pub struct Decomposer {
    catalog: StrategyCatalog,
    ghost_margin: u32,
    estimator: Arc<dyn CostEstimator>,
}

impl Decomposer {
    pub fn new(catalog: StrategyCatalog, ghost_margin: u32) -> Self {
        Self {
            catalog,
            ghost_margin,
            estimator: Arc::new(UniformCost),
        }
    }

    pub fn from_config(config: &DecompositionConfig) -> Self {
        Self::new(StrategyCatalog::from_config(config), config.ghost_margin)
    }

    /// Replace the default area-based cost estimator
    pub fn with_estimator(mut self, estimator: Arc<dyn CostEstimator>) -> Self {
        self.estimator = estimator;
        self
    }

    pub fn catalog(&self) -> &StrategyCatalog {
        &self.catalog
    }

    /// Decompose a job into subtasks.
    ///
    /// `target_subtask_count` only applies to spatial strategies.
    pub fn decompose(&self, job: &Job, target_subtask_count: usize) -> Result<Vec<Subtask>> {
        self.decompose_with(job, target_subtask_count, self.estimator.as_ref())
    }

    /// Decompose with a caller-supplied cost estimator.
    ///
    /// A `density` grid in a spatial payload takes precedence over `estimator`.
    pub fn decompose_with(
        &self,
        job: &Job,
        target_subtask_count: usize,
        estimator: &dyn CostEstimator,
    ) -> Result<Vec<Subtask>> {
        let strategy = self.catalog.resolve(&job.job_type)?;
        let subtasks = match strategy {
            DecomposeStrategy::Spatial(spatial) => {
                self.decompose_spatial(job, spatial, target_subtask_count, estimator)?
            }
            DecomposeStrategy::Functional(roles) => decompose_functional(job, roles)?,
            DecomposeStrategy::Pipeline(stages) => decompose_pipeline(job, stages)?,
        };

        debug!(
            job_id = %job.id,
            job_type = %job.job_type,
            strategy = strategy.kind(),
            subtasks = subtasks.len(),
            "Decomposed job"
        );
        Ok(subtasks)
    }

    fn decompose_spatial(
        &self,
        job: &Job,
        strategy: &SpatialStrategy,
        target: usize,
        estimator: &dyn CostEstimator,
    ) -> Result<Vec<Subtask>> {
        let payload: SpatialPayload =
            serde_json::from_value(job.payload.clone()).map_err(|e| invalid(job, e.to_string()))?;
        let bounds = payload.region;
        if bounds.is_empty() {
            return Err(invalid(job, "region has zero area"));
        }
        if !bounds.fits_coordinates() {
            return Err(invalid(job, format!("region {} extends past the coordinate space", bounds)));
        }

        let density = match &payload.density {
            Some(costs) => Some(DensityMap::new(bounds, costs).ok_or_else(|| {
                invalid(
                    job,
                    format!(
                        "density has {} cells, region {} has {}",
                        costs.len(),
                        bounds,
                        bounds.area()
                    ),
                )
            })?),
            None => None,
        };
        let estimator: &dyn CostEstimator = match &density {
            Some(map) => map,
            None => estimator,
        };

        let deadline = scale_duration(job.deadline, strategy.deadline_factor);
        let data = payload.data.unwrap_or(JsonValue::Null);
        let subtasks = bisect(bounds, target, estimator)
            .into_iter()
            .enumerate()
            .map(|(sequence, (core, cost))| {
                let padded = core.expand_within(self.ghost_margin, &bounds);
                Subtask {
                    id: SubtaskId::new(),
                    job_id: job.id,
                    label: core.to_string(),
                    task_type: strategy.task_type.clone(),
                    payload: json!({"core": core, "padded": padded, "data": data}),
                    constraints: ResourceConstraints {
                        requires_accelerator: strategy.requires_accelerator,
                        estimated_cost_units: cost,
                    },
                    deadline,
                    sequence,
                    depends_on: None,
                    shape: SubtaskShape::Tile { core, padded },
                }
            })
            .collect();
        Ok(subtasks)
    }
}

fn invalid(job: &Job, reason: impl Into<String>) -> tessera_core::TesseraError {
    JobError::InvalidPayload {
        job_type: job.job_type.clone(),
        reason: reason.into(),
    }
    .into()
}

fn decompose_functional(job: &Job, roles: &[FunctionalRole]) -> Result<Vec<Subtask>> {
    if roles.is_empty() {
        return Err(invalid(job, "strategy declares no roles"));
    }
    Ok(roles
        .iter()
        .enumerate()
        .map(|(sequence, role)| Subtask {
            id: SubtaskId::new(),
            job_id: job.id,
            label: role.name.clone(),
            task_type: role.task_type.clone(),
            payload: job.payload.clone(),
            constraints: ResourceConstraints {
                requires_accelerator: role.requires_accelerator,
                estimated_cost_units: role.cost_units,
            },
            deadline: scale_duration(job.deadline, role.deadline_factor),
            sequence,
            depends_on: None,
            shape: SubtaskShape::Role {
                role: role.name.clone(),
            },
        })
        .collect())
}

fn decompose_pipeline(job: &Job, stages: &[PipelineStage]) -> Result<Vec<Subtask>> {
    if stages.is_empty() {
        return Err(invalid(job, "strategy declares no stages"));
    }
    let deadlines = DecomposeStrategy::stage_deadlines(stages, job.deadline);
    let mut previous: Option<SubtaskId> = None;
    let mut subtasks = Vec::with_capacity(stages.len());

    for (index, (stage, deadline)) in stages.iter().zip(deadlines).enumerate() {
        let id = SubtaskId::new();
        // Later stages get their predecessor's output when dispatched
        let payload = if index == 0 {
            job.payload.clone()
        } else {
            JsonValue::Null
        };
        subtasks.push(Subtask {
            id,
            job_id: job.id,
            label: stage.name.clone(),
            task_type: stage.task_type.clone(),
            payload,
            constraints: ResourceConstraints {
                requires_accelerator: stage.requires_accelerator,
                estimated_cost_units: stage.cost_units,
            },
            deadline,
            sequence: index,
            depends_on: previous,
            shape: SubtaskShape::Stage {
                stage: stage.name.clone(),
                index,
            },
        });
        previous = Some(id);
    }
    Ok(subtasks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::MIN_SUBTASK_DEADLINE;
    use std::time::Duration;
    use tessera_core::{JobType, SubtaskStatus, TaskType};

    fn decomposer() -> Decomposer {
        Decomposer::from_config(&DecompositionConfig::default())
    }

    fn render_job(width: u32, height: u32) -> Job {
        Job::new(
            "render.frame",
            json!({"region": {"x": 0, "y": 0, "width": width, "height": height}, "data": {"scene": "a"}}),
            Duration::from_secs(10),
        )
    }

    #[test]
    fn test_spatial_tiles_carry_ghost_margin() {
        let job = render_job(16, 16);
        let subtasks = decomposer().decompose(&job, 4).unwrap();
        assert_eq!(subtasks.len(), 4);

        let first = &subtasks[0];
        assert_eq!(first.task_type, TaskType::from("render"));
        assert_eq!(first.label, "8x8@(0,0)");
        assert_eq!(first.constraints.estimated_cost_units, 64.0);
        assert_eq!(first.deadline, Duration::from_secs(10));
        match &first.shape {
            SubtaskShape::Tile { core, padded } => {
                assert_eq!(*core, Region::new(0, 0, 8, 8));
                assert_eq!(*padded, Region::new(0, 0, 10, 10));
            }
            other => panic!("unexpected shape {:?}", other),
        }
        assert_eq!(first.payload["data"], json!({"scene": "a"}));
        assert_eq!(first.payload["padded"]["width"], json!(10));

        let sequences: Vec<_> = subtasks.iter().map(|s| s.sequence).collect();
        assert_eq!(sequences, vec![0, 1, 2, 3]);
        assert!(subtasks.iter().all(|s| s.job_id == job.id && s.depends_on.is_none()));
    }

    #[test]
    fn test_spatial_density_payload() {
        let job = Job::new(
            "render.frame",
            json!({
                "region": {"x": 0, "y": 0, "width": 4, "height": 1},
                "density": [10.0, 10.0, 10.0, 10.0]
            }),
            Duration::from_secs(1),
        );
        let subtasks = decomposer().decompose(&job, 4).unwrap();
        let costs: Vec<_> = subtasks
            .iter()
            .map(|s| s.constraints.estimated_cost_units)
            .collect();
        assert_eq!(costs, vec![10.0; 4]);
    }

    #[test]
    fn test_spatial_custom_estimator() {
        let job = render_job(10, 1);
        // Only the first column costs anything
        let hotspot = |r: &Region| if r.x == 0 { 1.0 } else { 0.0 };
        let subtasks = decomposer().decompose_with(&job, 2, &hotspot).unwrap();
        assert_eq!(subtasks.len(), 2);
        assert_eq!(subtasks[0].label, "5x1@(0,0)");
    }

    #[test]
    fn test_spatial_invalid_payloads() {
        let missing = Job::new("render.frame", json!({"data": 1}), Duration::from_secs(1));
        let err = decomposer().decompose(&missing, 4).unwrap_err();
        assert_eq!(err.error_code(), "INVALID_PAYLOAD");

        let empty = render_job(0, 5);
        assert!(decomposer().decompose(&empty, 4).is_err());

        let bad_density = Job::new(
            "render.frame",
            json!({"region": {"x": 0, "y": 0, "width": 2, "height": 2}, "density": [1.0]}),
            Duration::from_secs(1),
        );
        let err = decomposer().decompose(&bad_density, 4).unwrap_err();
        assert!(err.to_string().contains("density"));
    }

    #[test]
    fn test_spatial_region_past_coordinate_space() {
        let job = Job::new(
            "render.frame",
            json!({"region": {"x": u32::MAX - 1, "y": 0, "width": 4, "height": 4}}),
            Duration::from_secs(1),
        );
        let err = decomposer().decompose(&job, 4).unwrap_err();
        assert_eq!(err.error_code(), "INVALID_PAYLOAD");
        assert!(err.to_string().contains("coordinate space"));

        let at_edge = Job::new(
            "render.frame",
            json!({"region": {"x": u32::MAX - 4, "y": 0, "width": 4, "height": 4}}),
            Duration::from_secs(1),
        );
        assert_eq!(decomposer().decompose(&at_edge, 2).unwrap().len(), 2);
    }

    #[test]
    fn test_subtask_deadlines_have_a_floor() {
        let job = Job::new("media.transcode", json!({}), Duration::from_nanos(3));
        let subtasks = decomposer().decompose(&job, 1).unwrap();
        assert!(subtasks.iter().all(|s| s.deadline >= MIN_SUBTASK_DEADLINE));

        let tick = Job::new("simulation.tick", json!({}), Duration::from_nanos(1));
        let subtasks = decomposer().decompose(&tick, 1).unwrap();
        assert!(subtasks.iter().all(|s| !s.deadline.is_zero()));
    }

    #[test]
    fn test_functional_roles_ignore_target() {
        let job = Job::new("simulation.tick", json!({"tick": 7}), Duration::from_secs(10));
        let subtasks = decomposer().decompose(&job, 12).unwrap();
        assert_eq!(subtasks.len(), 3);

        let physics = &subtasks[0];
        assert_eq!(physics.label, "physics");
        assert_eq!(physics.deadline, Duration::from_secs(5));
        assert_eq!(physics.payload, json!({"tick": 7}));
        assert_eq!(subtasks[1].deadline, Duration::from_secs(8));
        assert_eq!(subtasks[2].task_type, TaskType::from("render"));
    }

    #[test]
    fn test_pipeline_stages_chain() {
        let job = Job::new("media.transcode", json!({"file": "a.mp4"}), Duration::from_secs(60));
        let subtasks = decomposer().decompose(&job, 1).unwrap();
        assert_eq!(subtasks.len(), 3);

        assert_eq!(subtasks[0].depends_on, None);
        assert_eq!(subtasks[1].depends_on, Some(subtasks[0].id));
        assert_eq!(subtasks[2].depends_on, Some(subtasks[1].id));
        assert_eq!(subtasks[0].initial_status(), SubtaskStatus::Pending);
        assert_eq!(subtasks[2].initial_status(), SubtaskStatus::Blocked);

        assert_eq!(subtasks[0].payload, json!({"file": "a.mp4"}));
        assert_eq!(subtasks[1].payload, JsonValue::Null);

        let deadlines: Vec<_> = subtasks.iter().map(|s| s.deadline).collect();
        assert_eq!(
            deadlines,
            vec![
                Duration::from_secs(10),
                Duration::from_secs(20),
                Duration::from_secs(30)
            ]
        );
    }

    #[test]
    fn test_unsupported_job_type() {
        let job = Job::new("unknown", json!({}), Duration::from_secs(1));
        let err = decomposer().decompose(&job, 4).unwrap_err();
        assert!(matches!(
            err,
            tessera_core::TesseraError::Job(JobError::UnsupportedJobType(ref t)) if *t == JobType::from("unknown")
        ));
    }
}
