use anyhow::Result;
use tessera_config::{LogFormat, LoggingConfig};
use tracing_subscriber::EnvFilter;

/// Build the filter directives for a logging configuration
pub fn build_env_filter(config: &LoggingConfig) -> Result<EnvFilter> {
    let mut directives = config.level.as_str().to_string();
    if let Some(extra) = &config.filter {
        directives.push(',');
        directives.push_str(extra.trim());
    }
    EnvFilter::try_new(&directives).map_err(|e| anyhow::anyhow!("Invalid log filter '{}': {}", directives, e))
}

/// Initialize logging from configuration
pub fn init_logging_from_config(config: &LoggingConfig) -> Result<()> {
    let env_filter = build_env_filter(config)?;
    let location = config.include_location;

    // stdout is reserved for command output
    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_file(location)
        .with_line_number(location);

    // Use try_init to avoid panic if global subscriber already set
    let result = match config.format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Text => builder.try_init(),
    };
    if result.is_err() {
        tracing::debug!("Global tracing subscriber already initialized, skipping");
    }

    Ok(())
}

/// Initialize simple tracing for basic console output
pub fn init_simple_tracing(log_level: &str) -> Result<()> {
    let env_filter = EnvFilter::try_new(log_level)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("info"));

    if tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .try_init()
        .is_err()
    {
        tracing::debug!("Global tracing subscriber already initialized, skipping");
    }

    Ok(())
}
