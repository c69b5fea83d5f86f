use tessera_config::{LogFormat, LogLevel, LoggingConfig};
use tessera_logging::{build_env_filter, init_logging_from_config, init_simple_tracing};

#[test]
fn test_logging_config_integration() {
    let yaml_config = r#"
level: debug
format: json
filter: "tessera_execution=trace"
include_location: true
"#;

    let config: LoggingConfig = serde_yaml::from_str(yaml_config).unwrap();
    assert_eq!(config.level, LogLevel::Debug);
    assert_eq!(config.format, LogFormat::Json);

    let filter = build_env_filter(&config).unwrap();
    assert!(filter.to_string().contains("tessera_execution=trace"));

    init_logging_from_config(&config).unwrap();
    tracing::info!(job_id = "j1", "logging initialised");
}

#[test]
fn test_invalid_filter_is_rejected() {
    let config = LoggingConfig {
        filter: Some("tessera=notalevel".to_string()),
        ..Default::default()
    };
    assert!(build_env_filter(&config).is_err());
}

#[test]
fn test_repeated_initialisation_is_harmless() {
    init_simple_tracing("info").unwrap();
    init_simple_tracing("debug").unwrap();
    init_logging_from_config(&LoggingConfig::default()).unwrap();
}
