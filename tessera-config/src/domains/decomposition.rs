//! Decomposition strategy configuration
//!
//! Maps job types to decomposition strategies. The built-in catalogue covers
//! `render.frame` (spatial), `simulation.tick` (functional) and
//! `media.transcode` (pipeline). Supplying `strategies` in a config file
//! replaces the built-in catalogue.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

use crate::error::ConfigResult;
use crate::validation::{validate_positive, validate_required_string, Validatable};

/// Decomposition configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DecompositionConfig {
    /// Ghost margin, in cells, added around spatial tiles
    pub ghost_margin: u32,

    /// Target subtask count used when a submission does not name one
    pub default_subtask_count: usize,

    /// Strategy per job type
    pub strategies: BTreeMap<String, StrategySpec>,
}

/// Strategy declaration for one job type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StrategySpec {
    Spatial {
        task_type: String,
        #[serde(default)]
        requires_accelerator: bool,
        /// Tile deadline relative to the job deadline
        #[serde(default = "default_factor")]
        deadline_factor: f64,
    },
    Functional {
        roles: Vec<RoleSpec>,
    },
    Pipeline {
        stages: Vec<StageSpec>,
    },
}

/// One subsystem of a functional job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoleSpec {
    pub name: String,
    pub task_type: String,
    #[serde(default)]
    pub requires_accelerator: bool,
    /// Role deadline relative to the job deadline
    #[serde(default = "default_factor")]
    pub deadline_factor: f64,
    #[serde(default = "default_factor")]
    pub cost_units: f64,
}

/// One stage of a pipeline job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageSpec {
    pub name: String,
    pub task_type: String,
    #[serde(default)]
    pub requires_accelerator: bool,
    /// Share of the job deadline given to this stage
    #[serde(default = "default_factor")]
    pub weight: f64,
    #[serde(default = "default_factor")]
    pub cost_units: f64,
}

fn default_factor() -> f64 {
    1.0
}

impl RoleSpec {
    pub fn new(name: &str, task_type: &str, deadline_factor: f64) -> Self {
        Self {
            name: name.to_string(),
            task_type: task_type.to_string(),
            requires_accelerator: false,
            deadline_factor,
            cost_units: 1.0,
        }
    }
}

impl StageSpec {
    pub fn new(name: &str, task_type: &str, weight: f64) -> Self {
        Self {
            name: name.to_string(),
            task_type: task_type.to_string(),
            requires_accelerator: false,
            weight,
            cost_units: weight,
        }
    }
}

impl Default for DecompositionConfig {
    fn default() -> Self {
        let mut strategies = BTreeMap::new();
        strategies.insert(
            "render.frame".to_string(),
            StrategySpec::Spatial {
                task_type: "render".to_string(),
                requires_accelerator: false,
                deadline_factor: 1.0,
            },
        );
        strategies.insert(
            "simulation.tick".to_string(),
            StrategySpec::Functional {
                roles: vec![
                    RoleSpec::new("physics", "physics", 0.5),
                    RoleSpec::new("ai", "ai", 0.8),
                    RoleSpec::new("render", "render", 1.0),
                ],
            },
        );
        strategies.insert(
            "media.transcode".to_string(),
            StrategySpec::Pipeline {
                stages: vec![
                    StageSpec::new("decode", "decode", 1.0),
                    StageSpec::new("filter", "filter", 2.0),
                    StageSpec::new("encode", "encode", 3.0),
                ],
            },
        );

        Self {
            ghost_margin: 2,
            default_subtask_count: 4,
            strategies,
        }
    }
}

impl Validatable for DecompositionConfig {
    fn validate(&self) -> ConfigResult<()> {
        let domain = self.domain_name();
        validate_positive(self.default_subtask_count, "default_subtask_count", domain)?;

        for (job_type, spec) in &self.strategies {
            validate_required_string(job_type, "job type", domain)?;
            match spec {
                StrategySpec::Spatial {
                    task_type,
                    deadline_factor,
                    ..
                } => {
                    validate_required_string(task_type, "task_type", domain)?;
                    validate_positive(*deadline_factor, "deadline_factor", domain)?;
                }
                StrategySpec::Functional { roles } => {
                    if roles.is_empty() {
                        return Err(self.validation_error(format!("{} declares no roles", job_type)));
                    }
                    let mut seen = HashSet::new();
                    for role in roles {
                        validate_required_string(&role.name, "role name", domain)?;
                        validate_required_string(&role.task_type, "task_type", domain)?;
                        validate_positive(role.deadline_factor, "deadline_factor", domain)?;
                        if !seen.insert(role.name.as_str()) {
                            return Err(self.validation_error(format!(
                                "{} declares role '{}' twice",
                                job_type, role.name
                            )));
                        }
                    }
                }
                StrategySpec::Pipeline { stages } => {
                    if stages.is_empty() {
                        return Err(self.validation_error(format!("{} declares no stages", job_type)));
                    }
                    for stage in stages {
                        validate_required_string(&stage.name, "stage name", domain)?;
                        validate_required_string(&stage.task_type, "task_type", domain)?;
                        validate_positive(stage.weight, "weight", domain)?;
                    }
                }
            }
        }
        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "decomposition"
    }
}
