//! Domain-driven configuration management for Tessera
//!
//! Configuration is split by functional domain. Every domain has defaults,
//! validates itself, and can be overridden through `TESSERA_*` environment
//! variables.

pub mod error;
pub mod loader;
pub mod validation;

// Domain-specific configuration modules
pub mod domains;

// Re-export main types
pub use error::{ConfigError, ConfigResult};
pub use loader::ConfigLoader;
pub use validation::Validatable;

// Re-export domain configurations
pub use domains::{
    coordinator::{BackoffKind, CoordinatorConfig, RetryConfig},
    decomposition::{DecompositionConfig, RoleSpec, StageSpec, StrategySpec},
    logging::{LogFormat, LogLevel, LoggingConfig},
    prediction::PredictionConfig,
    registry::{RegistrationPolicy, RegistryConfig},
    scheduler::SchedulerConfig,
    TesseraConfig,
};
