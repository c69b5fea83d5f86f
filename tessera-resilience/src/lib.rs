//! Resilience patterns for Tessera
//!
//! Retry backoff for failed subtask attempts and graceful shutdown
//! coordination for the coordinator's background tasks.

pub mod backoff;
pub mod retry;
pub mod shutdown;

// Re-export commonly used types
pub use backoff::{BackoffCalculator, BackoffStrategy};
pub use retry::{RetryDecision, RetryPolicy};
pub use shutdown::{ShutdownCoordinator, ShutdownError, ShutdownSignal, TaskGuard};
