//! Graceful shutdown coordination
//!
//! Background tasks subscribe to a [`ShutdownCoordinator`] and stop when it
//! signals. Work that must drain before shutdown completes holds a
//! [`TaskGuard`].

use log::{info, warn};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

/// Shutdown signal types with escalating urgency
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownSignal {
    /// Stop taking new work, let in-flight work drain
    Graceful,
    /// Drain timed out; stop immediately
    Forced,
}

impl std::fmt::Display for ShutdownSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ShutdownSignal::Graceful => write!(f, "graceful"),
            ShutdownSignal::Forced => write!(f, "forced"),
        }
    }
}

/// Graceful shutdown coordinator
pub struct ShutdownCoordinator {
    sender: broadcast::Sender<ShutdownSignal>,
    is_shutting_down: AtomicBool,
    active_tasks: Arc<AtomicU32>,
    graceful_timeout: Duration,
}

/// Counts as one active task until dropped
pub struct TaskGuard {
    active_tasks: Arc<AtomicU32>,
}

impl Drop for TaskGuard {
    fn drop(&mut self) {
        self.active_tasks.fetch_sub(1, Ordering::AcqRel);
    }
}

impl ShutdownCoordinator {
    /// Create a new shutdown coordinator with the default drain timeout
    pub fn new() -> Self {
        Self::with_timeout(Duration::from_secs(30))
    }

    pub fn with_timeout(graceful_timeout: Duration) -> Self {
        let (sender, _) = broadcast::channel(16);
        Self {
            sender,
            is_shutting_down: AtomicBool::new(false),
            active_tasks: Arc::new(AtomicU32::new(0)),
            graceful_timeout,
        }
    }

    /// Subscribe to shutdown signals
    pub fn subscribe(&self) -> broadcast::Receiver<ShutdownSignal> {
        self.sender.subscribe()
    }

    pub fn is_shutting_down(&self) -> bool {
        self.is_shutting_down.load(Ordering::Acquire)
    }

    /// Register a unit of work that shutdown waits for
    pub fn track(&self) -> TaskGuard {
        self.active_tasks.fetch_add(1, Ordering::AcqRel);
        TaskGuard {
            active_tasks: self.active_tasks.clone(),
        }
    }

    pub fn active_task_count(&self) -> u32 {
        self.active_tasks.load(Ordering::Acquire)
    }

    /// Signal shutdown and wait for tracked work to drain
    pub async fn shutdown(&self) -> Result<(), ShutdownError> {
        if self.is_shutting_down.swap(true, Ordering::AcqRel) {
            return Err(ShutdownError::AlreadyShuttingDown);
        }

        info!("Starting graceful shutdown");
        // No receivers is fine: nothing was listening
        let _ = self.sender.send(ShutdownSignal::Graceful);

        if self.wait_for_tasks(self.graceful_timeout).await {
            info!("Graceful shutdown completed");
            return Ok(());
        }

        let remaining = self.active_task_count();
        warn!("Graceful shutdown timed out with {} tasks active, forcing", remaining);
        let _ = self.sender.send(ShutdownSignal::Forced);
        Err(ShutdownError::TasksRemaining(remaining))
    }

    async fn wait_for_tasks(&self, timeout: Duration) -> bool {
        let start = tokio::time::Instant::now();
        loop {
            if self.active_task_count() == 0 {
                return true;
            }
            if start.elapsed() >= timeout {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

/// Shutdown error types
#[derive(Debug, thiserror::Error)]
pub enum ShutdownError {
    /// Shutdown already in progress
    #[error("Shutdown already in progress")]
    AlreadyShuttingDown,

    /// Tasks remaining after the drain timeout
    #[error("Shutdown timed out with {0} tasks still active")]
    TasksRemaining(u32),
}
