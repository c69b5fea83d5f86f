//! Decomposition strategies and the job type catalogue

use std::collections::HashMap;
use std::time::Duration;

use tessera_config::{DecompositionConfig, RoleSpec, StageSpec, StrategySpec};
use tessera_core::{JobError, JobType, Result, TaskType};

/// Spatial tiling parameters
#[derive(Debug, Clone, PartialEq)]
pub struct SpatialStrategy {
    pub task_type: TaskType,
    pub requires_accelerator: bool,
    pub deadline_factor: f64,
}

/// One subsystem of a functional job
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionalRole {
    pub name: String,
    pub task_type: TaskType,
    pub requires_accelerator: bool,
    pub deadline_factor: f64,
    pub cost_units: f64,
}

/// One stage of a pipeline job
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineStage {
    pub name: String,
    pub task_type: TaskType,
    pub requires_accelerator: bool,
    pub weight: f64,
    pub cost_units: f64,
}

/// How a job type is split into subtasks and how their outputs are merged
#[derive(Debug, Clone, PartialEq)]
pub enum DecomposeStrategy {
    Spatial(SpatialStrategy),
    Functional(Vec<FunctionalRole>),
    Pipeline(Vec<PipelineStage>),
}

impl DecomposeStrategy {
    pub fn kind(&self) -> &'static str {
        match self {
            DecomposeStrategy::Spatial(_) => "spatial",
            DecomposeStrategy::Functional(_) => "functional",
            DecomposeStrategy::Pipeline(_) => "pipeline",
        }
    }

    /// Deadline for each pipeline stage, proportional to its weight
    pub fn stage_deadlines(stages: &[PipelineStage], job_deadline: Duration) -> Vec<Duration> {
        let total: f64 = stages.iter().map(|s| s.weight.max(0.0)).sum();
        stages
            .iter()
            .map(|stage| {
                if total > 0.0 {
                    scale_duration(job_deadline, stage.weight.max(0.0) / total)
                } else {
                    (job_deadline / stages.len().max(1) as u32).max(MIN_SUBTASK_DEADLINE)
                }
            })
            .collect()
    }
}

/// Shortest per-attempt deadline a subtask is given
pub const MIN_SUBTASK_DEADLINE: Duration = Duration::from_millis(1);

/// Scale a duration by a non-negative factor, rounded to the nanosecond and
/// never below [`MIN_SUBTASK_DEADLINE`]
pub(crate) fn scale_duration(duration: Duration, factor: f64) -> Duration {
    let nanos = duration.as_nanos() as f64 * factor.max(0.0);
    Duration::from_nanos(nanos.round().min(u64::MAX as f64) as u64).max(MIN_SUBTASK_DEADLINE)
}

impl From<&RoleSpec> for FunctionalRole {
    fn from(spec: &RoleSpec) -> Self {
        Self {
            name: spec.name.clone(),
            task_type: TaskType::from(spec.task_type.as_str()),
            requires_accelerator: spec.requires_accelerator,
            deadline_factor: spec.deadline_factor,
            cost_units: spec.cost_units,
        }
    }
}

impl From<&StageSpec> for PipelineStage {
    fn from(spec: &StageSpec) -> Self {
        Self {
            name: spec.name.clone(),
            task_type: TaskType::from(spec.task_type.as_str()),
            requires_accelerator: spec.requires_accelerator,
            weight: spec.weight,
            cost_units: spec.cost_units,
        }
    }
}

impl From<&StrategySpec> for DecomposeStrategy {
    fn from(spec: &StrategySpec) -> Self {
        match spec {
            StrategySpec::Spatial {
                task_type,
                requires_accelerator,
                deadline_factor,
            } => DecomposeStrategy::Spatial(SpatialStrategy {
                task_type: TaskType::from(task_type.as_str()),
                requires_accelerator: *requires_accelerator,
                deadline_factor: *deadline_factor,
            }),
            StrategySpec::Functional { roles } => {
                DecomposeStrategy::Functional(roles.iter().map(FunctionalRole::from).collect())
            }
            StrategySpec::Pipeline { stages } => {
                DecomposeStrategy::Pipeline(stages.iter().map(PipelineStage::from).collect())
            }
        }
    }
}

/// Job type to strategy lookup
#[derive(Debug, Clone, Default)]
pub struct StrategyCatalog {
    strategies: HashMap<JobType, DecomposeStrategy>,
}

impl StrategyCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &DecompositionConfig) -> Self {
        let strategies = config
            .strategies
            .iter()
            .map(|(job_type, spec)| (JobType::from(job_type.as_str()), DecomposeStrategy::from(spec)))
            .collect();
        Self { strategies }
    }

    pub fn insert(&mut self, job_type: impl Into<JobType>, strategy: DecomposeStrategy) {
        self.strategies.insert(job_type.into(), strategy);
    }

    /// Strategy for a job type; unknown types are rejected
    pub fn resolve(&self, job_type: &JobType) -> Result<&DecomposeStrategy> {
        self.strategies
            .get(job_type)
            .ok_or_else(|| JobError::UnsupportedJobType(job_type.clone()).into())
    }

    pub fn job_types(&self) -> Vec<&JobType> {
        let mut types: Vec<_> = self.strategies.keys().collect();
        types.sort();
        types
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_catalogue_resolves() {
        let catalog = StrategyCatalog::from_config(&DecompositionConfig::default());
        let render = catalog.resolve(&JobType::from("render.frame")).unwrap();
        assert_eq!(render.kind(), "spatial");

        match catalog.resolve(&JobType::from("simulation.tick")).unwrap() {
            DecomposeStrategy::Functional(roles) => {
                let names: Vec<_> = roles.iter().map(|r| r.name.as_str()).collect();
                assert_eq!(names, vec!["physics", "ai", "render"]);
            }
            other => panic!("unexpected strategy {}", other.kind()),
        }
        assert_eq!(catalog.job_types().len(), 3);
    }

    #[test]
    fn test_unknown_job_type() {
        let catalog = StrategyCatalog::from_config(&DecompositionConfig::default());
        let err = catalog.resolve(&JobType::from("bitcoin.mine")).unwrap_err();
        assert_eq!(err.error_code(), "UNSUPPORTED_JOB_TYPE");
        assert!(err.is_rejection());
    }

    #[test]
    fn test_stage_deadlines_follow_weights() {
        let stages = vec![
            PipelineStage::from(&StageSpec::new("decode", "decode", 1.0)),
            PipelineStage::from(&StageSpec::new("filter", "filter", 2.0)),
            PipelineStage::from(&StageSpec::new("encode", "encode", 3.0)),
        ];
        let deadlines = DecomposeStrategy::stage_deadlines(&stages, Duration::from_secs(6));
        assert_eq!(
            deadlines,
            vec![
                Duration::from_secs(1),
                Duration::from_secs(2),
                Duration::from_secs(3)
            ]
        );
    }

    #[test]
    fn test_tiny_deadlines_keep_a_floor() {
        let stages = vec![
            PipelineStage::from(&StageSpec::new("decode", "decode", 1.0)),
            PipelineStage::from(&StageSpec::new("encode", "encode", 1_000_000.0)),
        ];
        let deadlines = DecomposeStrategy::stage_deadlines(&stages, Duration::from_micros(10));
        assert!(deadlines.iter().all(|d| *d >= MIN_SUBTASK_DEADLINE));

        assert_eq!(scale_duration(Duration::from_secs(1), 0.0), MIN_SUBTASK_DEADLINE);
        assert_eq!(scale_duration(Duration::from_secs(4), 0.5), Duration::from_secs(2));
    }
}
