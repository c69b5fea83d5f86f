use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::{debug, info};

use tessera_config::{ConfigLoader, LogLevel, TesseraConfig};
use tessera_logging::{init_logging_from_config, init_simple_tracing};

mod cli;
mod commands;

use cli::{Cli, Commands, ConfigCommands};
use commands::{handle_config_generate, handle_config_validate, run_simulation};

/// Load configuration from file or from the environment
fn load_config(config_path: Option<&PathBuf>) -> Result<TesseraConfig> {
    let loader = ConfigLoader::new();
    match config_path {
        Some(path) => loader
            .from_file(path)
            .with_context(|| format!("Failed to load configuration from {:?}", path)),
        None => {
            debug!("No configuration file specified. Loading from environment or defaults.");
            loader
                .from_env()
                .context("Failed to load configuration from environment")
        }
    }
}

/// Initialize logging from configuration, letting `--log-level` override it
fn init_logging(config: &TesseraConfig, log_level: Option<&String>) -> Result<()> {
    let mut logging = config.logging.clone();
    if let Some(level) = log_level {
        logging.level = level
            .parse::<LogLevel>()
            .map_err(|e| anyhow::anyhow!(e))?;
    }

    if let Err(e) = init_logging_from_config(&logging) {
        eprintln!(
            "Failed to initialize structured logging: {}, falling back to simple tracing",
            e
        );
        init_simple_tracing(logging.level.as_str())?;
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match &cli.command {
        Commands::Config { config_cmd } => {
            init_simple_tracing(cli.log_level.as_deref().unwrap_or("warn"))?;
            match config_cmd {
                ConfigCommands::Validate => {
                    let path = cli
                        .config
                        .as_ref()
                        .ok_or_else(|| anyhow::anyhow!("config validate requires --config <PATH>"))?;
                    handle_config_validate(path).map(|_| ())
                }
                ConfigCommands::Generate { output, force } => {
                    handle_config_generate(output.as_deref(), *force)
                }
            }
        }
        Commands::Simulate(args) => {
            let config = load_config(cli.config.as_ref())?;
            init_logging(&config, cli.log_level.as_ref())?;
            info!("Tessera simulation starting");

            let report = run_simulation(&config, args).await?;
            eprintln!("{}", report.summary());
            let json = report.to_json(args.output_only)?;
            println!(
                "{}",
                serde_json::to_string_pretty(&json).context("Failed to format outcome")?
            );
            Ok(())
        }
    }
}
