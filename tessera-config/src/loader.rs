//! Configuration loading and environment variable handling

use crate::domains::TesseraConfig;
use crate::error::{ConfigError, ConfigResult};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Configuration loader with environment variable support
pub struct ConfigLoader {
    /// Environment variable prefix
    prefix: String,
}

impl ConfigLoader {
    /// Create a new config loader with default prefix
    pub fn new() -> Self {
        Self {
            prefix: "TESSERA".to_string(),
        }
    }

    /// Create a new config loader with custom prefix
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self { prefix: prefix.into() }
    }

    /// Load configuration from a YAML file with environment overrides
    pub fn from_file(&self, path: impl AsRef<Path>) -> ConfigResult<TesseraConfig> {
        let path = path.as_ref();
        log::debug!("Loading configuration from {}", path.display());
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::FileReadError {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config: TesseraConfig = serde_yaml::from_str(&content)?;

        self.apply_env_overrides(&mut config)?;
        config.validate_all()?;

        Ok(config)
    }

    /// Load configuration from environment variables only
    pub fn from_env(&self) -> ConfigResult<TesseraConfig> {
        let mut config = TesseraConfig::default();
        self.apply_env_overrides(&mut config)?;
        config.validate_all()?;
        Ok(config)
    }

    /// Load configuration with fallback chain
    pub fn load(&self, config_path: Option<impl AsRef<Path>>) -> ConfigResult<TesseraConfig> {
        match config_path {
            Some(path) => self.from_file(path),
            None => self.from_env(),
        }
    }

    /// Apply environment variable overrides to configuration
    fn apply_env_overrides(&self, config: &mut TesseraConfig) -> ConfigResult<()> {
        if let Some(v) = self.parse_var::<u32>("MAX_ATTEMPTS")? {
            config.coordinator.max_attempts = v;
        }
        if let Some(v) = self.duration_var("RETRY_BASE_DELAY")? {
            config.coordinator.retry.base_delay = v;
        }
        if let Some(v) = self.duration_var("RESULT_RETENTION")? {
            config.coordinator.result_retention = v;
        }

        if let Some(v) = self.duration_var("HEARTBEAT_INTERVAL")? {
            config.registry.heartbeat_interval = v;
        }
        if let Some(v) = self.duration_var("HEARTBEAT_TIMEOUT")? {
            config.registry.heartbeat_timeout = v;
        }
        if let Some(v) = self.parse_var("REGISTRATION_POLICY")? {
            config.registry.registration_policy = v;
        }

        if let Some(v) = self.parse_var::<usize>("MIN_SAMPLES")? {
            config.prediction.min_samples = v;
        }
        if let Some(v) = self.parse_var::<usize>("WINDOW_SIZE")? {
            config.prediction.window_size = v;
        }

        if let Some(v) = self.parse_var::<usize>("BACKUP_COUNT")? {
            config.scheduler.backup_count = v;
        }

        if let Some(v) = self.parse_var::<u32>("GHOST_MARGIN")? {
            config.decomposition.ghost_margin = v;
        }

        if let Some(v) = self.parse_var("LOG_LEVEL")? {
            config.logging.level = v;
        }
        if let Some(v) = self.parse_var("LOG_FORMAT")? {
            config.logging.format = v;
        }

        Ok(())
    }

    /// Parse a prefixed variable if it is set
    fn parse_var<T>(&self, name: &str) -> ConfigResult<Option<T>>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        let Ok(raw) = self.get_env_var(name) else {
            return Ok(None);
        };
        raw.trim()
            .parse()
            .map(Some)
            .map_err(|e| self.override_error(name, &raw, e))
    }

    /// Parse a prefixed human-readable duration ("250ms", "15s") if it is set
    fn duration_var(&self, name: &str) -> ConfigResult<Option<Duration>> {
        let Ok(raw) = self.get_env_var(name) else {
            return Ok(None);
        };
        humantime_serde::re::humantime::parse_duration(raw.trim())
            .map(Some)
            .map_err(|e| self.override_error(name, &raw, e))
    }

    fn override_error(&self, name: &str, raw: &str, reason: impl std::fmt::Display) -> ConfigError {
        ConfigError::EnvOverride {
            var: format!("{}_{}", self.prefix, name),
            value: raw.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Get environment variable with prefix
    fn get_env_var(&self, name: &str) -> Result<String, std::env::VarError> {
        std::env::var(format!("{}_{}", self.prefix, name))
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}
