use crate::severity::ErrorSeverity;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use tessera_core::TesseraError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub error_type: String,
    pub error_code: String,
    pub message: String,
    pub severity: ErrorSeverity,
    pub is_retryable: bool,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub context: HashMap<String, JsonValue>,
    pub suggestions: ErrorSuggestions,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ErrorSuggestions {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub immediate: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub preventive: Vec<String>,
}

impl ErrorInfo {
    pub fn new(error_type: impl Into<String>, error_code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error_type: error_type.into(),
            error_code: error_code.into(),
            message: message.into(),
            severity: ErrorSeverity::Medium,
            is_retryable: false,
            timestamp: chrono::Utc::now(),
            context: HashMap::new(),
            suggestions: ErrorSuggestions::default(),
        }
    }

    pub fn with_severity(mut self, severity: ErrorSeverity) -> Self {
        self.severity = severity;
        self
    }

    pub fn with_retryable(mut self, is_retryable: bool) -> Self {
        self.is_retryable = is_retryable;
        self
    }

    pub fn with_context_value(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        if let Ok(json_value) = serde_json::to_value(value) {
            self.context.insert(key.into(), json_value);
        }
        self
    }

    pub fn with_suggestion(mut self, immediate: impl Into<String>) -> Self {
        self.suggestions.immediate.push(immediate.into());
        self
    }

    pub fn with_preventive_suggestion(mut self, preventive: impl Into<String>) -> Self {
        self.suggestions.preventive.push(preventive.into());
        self
    }

    /// Emit this report through `tracing` at a level matching its severity
    pub fn log(&self) {
        let context = serde_json::to_string(&self.context).unwrap_or_default();
        match self.severity {
            ErrorSeverity::Info | ErrorSeverity::Low => tracing::info!(
                error_code = %self.error_code,
                retryable = self.is_retryable,
                context = %context,
                "{}",
                self.message
            ),
            ErrorSeverity::Medium => tracing::warn!(
                error_code = %self.error_code,
                retryable = self.is_retryable,
                context = %context,
                "{}",
                self.message
            ),
            ErrorSeverity::High | ErrorSeverity::Critical => tracing::error!(
                error_code = %self.error_code,
                retryable = self.is_retryable,
                context = %context,
                "{}",
                self.message
            ),
        }
    }
}

impl From<&TesseraError> for ErrorInfo {
    fn from(error: &TesseraError) -> Self {
        let error_type = match error {
            TesseraError::Job(_) => "JobError",
            TesseraError::Worker(_) => "WorkerError",
            TesseraError::Scheduling(_) => "SchedulingError",
            TesseraError::Subtask(_) => "SubtaskError",
            TesseraError::Config(_) => "ConfigError",
            TesseraError::Serialization(_) => "SerializationError",
            TesseraError::Other(_) => "InternalError",
        };
        let code = error.error_code();

        let mut info = ErrorInfo::new(error_type, code, error.to_string())
            .with_severity(ErrorSeverity::for_error(error))
            .with_retryable(error.is_retryable());

        if let TesseraError::Subtask(subtask_error) = error {
            if let Some(worker_id) = subtask_error.worker_id() {
                info = info.with_context_value("worker_id", worker_id);
            }
        }

        match code {
            "UNSUPPORTED_JOB_TYPE" => info
                .with_suggestion("Check the job type against the configured decomposition strategies")
                .with_preventive_suggestion("Add a strategy for the job type under decomposition.strategies"),
            "INVALID_PAYLOAD" => info.with_suggestion("Check the payload shape expected by the job type's strategy"),
            "NO_CAPABLE_WORKER" => info
                .with_suggestion("Register a worker that declares the task type")
                .with_preventive_suggestion("Keep at least two workers per task type"),
            "ALL_WORKERS_BUSY" => info.with_suggestion("Wait for a slot to free or raise worker max_concurrent"),
            "WORKER_TIMEOUT" => info
                .with_suggestion("Check the worker's health and load")
                .with_preventive_suggestion("Loosen subtask deadlines for slow task types"),
            "WORKER_LOST" => info.with_suggestion("Check the worker's heartbeat interval against heartbeat_timeout"),
            "DUPLICATE_REGISTRATION" => {
                info.with_suggestion("Re-register after the previous session is evicted or use a new worker ID")
            }
            "WORKER_NOT_FOUND" => info.with_suggestion("Register the worker before sending heartbeats"),
            "CONFIG_ERROR" => info.with_suggestion("Run `tessera config validate` on the configuration file"),
            _ => info,
        }
    }
}
