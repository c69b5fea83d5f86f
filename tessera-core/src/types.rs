//! Core type definitions for Tessera

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Name of a job type; selects the decomposition strategy
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobType(String);

impl JobType {
    pub fn new(name: impl Into<String>) -> Self {
        JobType(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for JobType {
    fn from(value: &str) -> Self {
        JobType(value.to_string())
    }
}

impl From<String> for JobType {
    fn from(value: String) -> Self {
        JobType(value)
    }
}

/// Name of a subtask's task type; workers declare which task types they support
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskType(String);

impl TaskType {
    pub fn new(name: impl Into<String>) -> Self {
        TaskType(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TaskType {
    fn from(value: &str) -> Self {
        TaskType(value.to_string())
    }
}

impl From<String> for TaskType {
    fn from(value: String) -> Self {
        TaskType(value)
    }
}

/// Job priority levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[derive(Default)]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
    Urgent,
}

impl Priority {
    /// Get the string representation of the priority
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Normal => "normal",
            Priority::High => "high",
            Priority::Urgent => "urgent",
        }
    }

    /// Get the numeric value for ordering (higher = more urgent)
    pub fn as_u8(&self) -> u8 {
        match self {
            Priority::Low => 0,
            Priority::Normal => 1,
            Priority::High => 2,
            Priority::Urgent => 3,
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Priority {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "low" => Ok(Priority::Low),
            "normal" => Ok(Priority::Normal),
            "high" => Ok(Priority::High),
            "urgent" => Ok(Priority::Urgent),
            _ => Err(ParseError::InvalidPriority(s.to_string())),
        }
    }
}

/// Declared capacity class of a worker
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[derive(Default)]
pub enum CapacityClass {
    Small,
    #[default]
    Medium,
    Large,
    Accelerated,
}

impl CapacityClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            CapacityClass::Small => "small",
            CapacityClass::Medium => "medium",
            CapacityClass::Large => "large",
            CapacityClass::Accelerated => "accelerated",
        }
    }

    /// Relative throughput used by cold-start predictions (medium = 1.0)
    pub fn speed_factor(&self) -> f64 {
        match self {
            CapacityClass::Small => 0.5,
            CapacityClass::Medium => 1.0,
            CapacityClass::Large => 2.0,
            CapacityClass::Accelerated => 4.0,
        }
    }
}

impl fmt::Display for CapacityClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for CapacityClass {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "small" => Ok(CapacityClass::Small),
            "medium" => Ok(CapacityClass::Medium),
            "large" => Ok(CapacityClass::Large),
            "accelerated" => Ok(CapacityClass::Accelerated),
            _ => Err(ParseError::InvalidCapacityClass(s.to_string())),
        }
    }
}

/// Errors that can occur when parsing types
#[derive(Error, Debug, Clone)]
pub enum ParseError {
    #[error("Invalid priority: '{0}'. Supported priorities are: low, normal, high, urgent")]
    InvalidPriority(String),

    #[error("Invalid capacity class: '{0}'. Supported classes are: small, medium, large, accelerated")]
    InvalidCapacityClass(String),
}
