//! Worker capability declarations

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::subtask::Subtask;
use crate::types::{CapacityClass, TaskType};

/// Capabilities a worker declares when it registers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerCapabilities {
    #[serde(default)]
    pub capacity_class: CapacityClass,

    /// Task types this worker can execute
    pub supported_task_types: BTreeSet<TaskType>,

    #[serde(default)]
    pub has_accelerator: bool,

    /// Maximum number of subtasks the worker runs concurrently
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: u32,
}

fn default_max_concurrent() -> u32 {
    1
}

impl WorkerCapabilities {
    pub fn new<I, T>(capacity_class: CapacityClass, task_types: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<TaskType>,
    {
        Self {
            capacity_class,
            supported_task_types: task_types.into_iter().map(Into::into).collect(),
            has_accelerator: capacity_class == CapacityClass::Accelerated,
            max_concurrent: default_max_concurrent(),
        }
    }

    pub fn with_max_concurrent(mut self, max_concurrent: u32) -> Self {
        self.max_concurrent = max_concurrent.max(1);
        self
    }

    pub fn with_accelerator(mut self, has_accelerator: bool) -> Self {
        self.has_accelerator = has_accelerator;
        self
    }

    pub fn supports(&self, task_type: &TaskType) -> bool {
        self.supported_task_types.contains(task_type)
    }

    /// Whether this worker satisfies both the task type and constraints of a subtask
    pub fn can_run(&self, subtask: &Subtask) -> bool {
        self.supports(&subtask.task_type)
            && (!subtask.constraints.requires_accelerator || self.has_accelerator)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_supports() {
        let caps = WorkerCapabilities::new(CapacityClass::Large, ["render", "encode"]);
        assert!(caps.supports(&TaskType::from("render")));
        assert!(!caps.supports(&TaskType::from("physics")));
        assert!(!caps.has_accelerator);
        assert_eq!(caps.max_concurrent, 1);
    }

    #[test]
    fn test_accelerated_class_implies_accelerator() {
        let caps = WorkerCapabilities::new(CapacityClass::Accelerated, ["render"]);
        assert!(caps.has_accelerator);
        assert_eq!(caps.with_max_concurrent(0).max_concurrent, 1);
    }

    #[test]
    fn test_deserialize_with_defaults() {
        let caps: WorkerCapabilities =
            serde_json::from_str(r#"{"supported_task_types": ["ai"]}"#).unwrap();
        assert_eq!(caps.capacity_class, CapacityClass::Medium);
        assert_eq!(caps.max_concurrent, 1);
    }
}
