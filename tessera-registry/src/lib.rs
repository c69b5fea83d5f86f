pub mod registry;
pub mod types;

// Re-export main types
pub use registry::WorkerRegistry;
pub use types::{RegistrationOutcome, WorkerSnapshot};
