//! `tessera config` subcommands

use anyhow::{Context, Result};
use colored::Colorize;
use std::fs;
use std::path::Path;
use tracing::{error, info};

use tessera_config::{ConfigLoader, TesseraConfig};

/// Load and validate a configuration file
pub fn handle_config_validate(config_file: &Path) -> Result<TesseraConfig> {
    info!("Validating configuration file: {:?}", config_file);

    if !config_file.exists() {
        return Err(anyhow::anyhow!("Configuration file not found: {:?}", config_file));
    }

    match ConfigLoader::new().from_file(config_file) {
        Ok(config) => {
            eprintln!("{} Configuration file is valid", "✓".green());
            Ok(config)
        }
        Err(e) => {
            eprintln!("{} Configuration validation failed: {}", "✗".red(), e);
            error!("Configuration validation failed: {}", e);
            Err(e.into())
        }
    }
}

/// Write a sample configuration to `output`, or print it when no path is given
pub fn handle_config_generate(output: Option<&Path>, force: bool) -> Result<()> {
    let sample = TesseraConfig::generate_sample();
    let Some(output) = output else {
        println!("{}", sample);
        return Ok(());
    };

    if output.exists() && !force {
        return Err(anyhow::anyhow!(
            "Output file already exists: {:?}. Use --force to overwrite.",
            output
        ));
    }
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).context("Failed to create output directory")?;
    }
    fs::write(output, sample).with_context(|| format!("Failed to write {:?}", output))?;
    info!("Sample configuration written to {:?}", output);
    Ok(())
}
