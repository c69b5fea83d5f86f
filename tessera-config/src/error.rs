//! Configuration error types

use std::path::PathBuf;
use thiserror::Error;

/// Configuration result type
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors raised while loading or validating a [`TesseraConfig`](crate::TesseraConfig)
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {}: {source}", .path.display())]
    FileReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// YAML that does not match the configuration schema
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] serde_yaml::Error),

    /// A `TESSERA_*` override that does not parse as its field's type
    #[error("Invalid override {var}={value:?}: {reason}")]
    EnvOverride {
        var: String,
        value: String,
        reason: String,
    },

    /// A domain rejected one of its settings
    #[error("Domain configuration error in {domain}: {message}")]
    DomainError { domain: String, message: String },
}

impl ConfigError {
    /// Name of the environment variable behind an override error
    pub fn env_var(&self) -> Option<&str> {
        match self {
            ConfigError::EnvOverride { var, .. } => Some(var),
            _ => None,
        }
    }
}
