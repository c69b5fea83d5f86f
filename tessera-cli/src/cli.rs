//! CLI argument parsing definitions

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "tessera", author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Set the log level (trace, debug, info, warn, error)
    #[arg(long, value_name = "LEVEL", global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a job against an in-process pool of simulated workers
    Simulate(SimulateArgs),

    /// Configuration management commands
    Config {
        #[command(subcommand)]
        config_cmd: ConfigCommands,
    },
}

#[derive(clap::Args, Debug, Clone)]
pub struct SimulateArgs {
    /// Number of simulated workers
    #[arg(long, value_name = "N", default_value_t = 4)]
    pub workers: usize,

    /// Probability that a worker reports failure for an attempt
    #[arg(long, value_name = "RATE", default_value_t = 0.0)]
    pub failure_rate: f64,

    /// Probability that a worker never reports for an attempt
    #[arg(long, value_name = "RATE", default_value_t = 0.0)]
    pub hang_rate: f64,

    /// Job type to submit (render.frame, simulation.tick, media.transcode)
    #[arg(long, value_name = "TYPE", default_value = "render.frame")]
    pub job_type: String,

    /// Target number of subtasks for spatial jobs
    #[arg(long, value_name = "N", default_value_t = 4)]
    pub subtasks: usize,

    /// Side length of the square region rendered by spatial jobs
    #[arg(long, value_name = "CELLS", default_value_t = 16)]
    pub size: u32,

    /// Job deadline in milliseconds
    #[arg(long, value_name = "MS", default_value_t = 5000)]
    pub deadline_ms: u64,

    /// Seed for the simulated workers' random behaviour
    #[arg(long, value_name = "SEED", default_value_t = 42)]
    pub seed: u64,

    /// Print only the merged output instead of the full outcome
    #[arg(long)]
    pub output_only: bool,
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Validate the file given with --config
    Validate,

    /// Print a sample configuration with every default spelled out
    Generate {
        /// Write to a file instead of stdout
        #[arg(long, value_name = "PATH")]
        output: Option<PathBuf>,

        /// Overwrite existing file
        #[arg(long)]
        force: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simulate_defaults() {
        let cli = Cli::try_parse_from(["tessera", "simulate"]).unwrap();
        let Commands::Simulate(args) = cli.command else {
            panic!("expected simulate");
        };
        assert_eq!(args.workers, 4);
        assert_eq!(args.job_type, "render.frame");
        assert_eq!(args.deadline_ms, 5000);
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "tessera",
            "config",
            "validate",
            "--config",
            "tessera.yaml",
            "--log-level",
            "debug",
        ])
        .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("tessera.yaml")));
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
        assert!(matches!(
            cli.command,
            Commands::Config {
                config_cmd: ConfigCommands::Validate
            }
        ));
    }

    #[test]
    fn test_simulate_flags() {
        let cli = Cli::try_parse_from([
            "tessera",
            "simulate",
            "--workers",
            "8",
            "--failure-rate",
            "0.2",
            "--job-type",
            "media.transcode",
        ])
        .unwrap();
        let Commands::Simulate(args) = cli.command else {
            panic!("expected simulate");
        };
        assert_eq!(args.workers, 8);
        assert_eq!(args.failure_rate, 0.2);
        assert_eq!(args.job_type, "media.transcode");
    }
}
