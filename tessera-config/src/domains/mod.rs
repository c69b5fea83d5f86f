//! Domain-specific configuration modules

pub mod coordinator;
pub mod decomposition;
pub mod logging;
pub mod prediction;
pub mod registry;
pub mod scheduler;

use crate::error::ConfigResult;
use crate::validation::Validatable;
use serde::{Deserialize, Serialize};

/// Main Tessera configuration combining all domains
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct TesseraConfig {
    pub coordinator: coordinator::CoordinatorConfig,
    pub registry: registry::RegistryConfig,
    pub prediction: prediction::PredictionConfig,
    pub scheduler: scheduler::SchedulerConfig,
    pub decomposition: decomposition::DecompositionConfig,
    pub logging: logging::LoggingConfig,
}

impl TesseraConfig {
    /// Validate all domain configurations
    pub fn validate_all(&self) -> ConfigResult<()> {
        self.coordinator.validate()?;
        self.registry.validate()?;
        self.prediction.validate()?;
        self.scheduler.validate()?;
        self.decomposition.validate()?;
        self.logging.validate()?;
        Ok(())
    }

    /// Generate a sample configuration file
    pub fn generate_sample() -> String {
        let config = TesseraConfig::default();
        serde_yaml::to_string(&config).unwrap_or_else(|_| "# Failed to generate sample config".to_string())
    }
}
