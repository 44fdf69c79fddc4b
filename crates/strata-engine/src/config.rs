//! Tick coordinator configuration and validation.

use thiserror::Error;

/// Default prefix for worker thread names.
pub const DEFAULT_THREAD_NAME: &str = "strata-tick";

/// Upper bound on auto-detected worker threads.
const MAX_AUTO_WORKERS: usize = 16;

/// Configuration for [`TickCoordinator`](crate::TickCoordinator).
#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// Number of worker threads. `None` = auto-detect
    /// (`available_parallelism`, clamped to `[1, 16]`).
    pub worker_count: Option<usize>,
    /// Worker threads are named `"{thread_name}-{index}"`.
    pub thread_name: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            worker_count: None,
            thread_name: DEFAULT_THREAD_NAME.to_string(),
        }
    }
}

impl EngineConfig {
    /// A configuration with an explicit worker count.
    pub fn with_workers(worker_count: usize) -> Self {
        Self {
            worker_count: Some(worker_count),
            ..Self::default()
        }
    }

    /// Check structural invariants.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.worker_count == Some(0) {
            return Err(ConfigError::ZeroWorkers);
        }
        if self.thread_name.trim().is_empty() {
            return Err(ConfigError::ThreadNameEmpty);
        }
        Ok(())
    }

    /// Resolve the actual worker count, applying auto-detection if `None`.
    pub fn resolved_worker_count(&self) -> usize {
        match self.worker_count {
            Some(n) => n.max(1),
            None => std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4)
                .clamp(1, MAX_AUTO_WORKERS),
        }
    }
}

/// Errors detected by [`EngineConfig::validate`].
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// `worker_count` was `Some(0)`.
    #[error("worker_count must be at least 1")]
    ZeroWorkers,
    /// `thread_name` was empty or whitespace.
    #[error("thread_name must not be empty")]
    ThreadNameEmpty,
}
