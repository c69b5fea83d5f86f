//! Structured logging infrastructure for Tessera
//!
//! - Subscriber initialisation from [`tessera_config::LoggingConfig`]
//! - Structured error reports built from [`tessera_core::TesseraError`]

pub mod error_info;
pub mod init;
pub mod severity;

pub use error_info::{ErrorInfo, ErrorSuggestions};
pub use init::{build_env_filter, init_logging_from_config, init_simple_tracing};
pub use severity::ErrorSeverity;
