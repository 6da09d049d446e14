//! Harness Error Types
//!
//! Only genuine programming or environment failures live here. Induced
//! hazards (a detected deadlock, a negative balance, a starved writer) are
//! ordinary scenario results and never surface as errors.

use crate::domain::worker::{LockId, WorkerId};

/// Errors that abort a harness run
#[derive(Debug, thiserror::Error)]
pub enum HarnessError {
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Configuration Errors
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    /// Scenario parameters are malformed
    #[error("Invalid scenario configuration: {0}")]
    InvalidConfig(String),

    /// Configuration file could not be read
    #[error("Failed to read configuration: {0}")]
    ConfigIo(#[from] std::io::Error),

    /// Configuration file could not be parsed
    #[error("Failed to parse configuration: {0}")]
    ConfigParse(#[from] serde_json::Error),

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Runtime Errors
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    /// Worker is not known to the registry
    #[error("Unknown worker: {0}")]
    UnknownWorker(WorkerId),

    /// Worker released a lock it does not hold
    #[error("Worker {worker} does not hold lock {lock}")]
    NotOwner { worker: WorkerId, lock: LockId },

    /// OS refused to spawn a worker thread
    #[error("Failed to spawn worker '{name}': {source}")]
    Spawn {
        name: String,
        #[source]
        source: std::io::Error,
    },

    /// Worker thread panicked instead of returning
    #[error("Worker '{0}' panicked")]
    WorkerPanicked(String),
}

impl HarnessError {
    /// Shorthand for configuration validation failures
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }
}

/// Result alias used across the crate
pub type Result<T> = std::result::Result<T, HarnessError>;
