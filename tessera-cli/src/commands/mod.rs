//! Command handlers for the `tessera` binary

pub mod config;
pub mod simulate;

pub use config::{handle_config_generate, handle_config_validate};
pub use simulate::{run_simulation, SimulationReport};
