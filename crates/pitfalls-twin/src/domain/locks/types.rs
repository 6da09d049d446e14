//! Lock Policy Types

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// How often a blocked waiter re-checks its interrupt token
pub const DEFAULT_INTERRUPT_POLL: Duration = Duration::from_millis(5);

/// Hand-off policy of an exclusive lock
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Fairness {
    /// Oldest waiter gets the lock next (FIFO)
    #[default]
    Fair,
    /// Whoever reaches a free lock first takes it, including new arrivals
    Unfair,
}

impl fmt::Display for Fairness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Fairness::Fair => write!(f, "fair"),
            Fairness::Unfair => write!(f, "unfair"),
        }
    }
}

/// Admission policy of a read/write lock
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RwPolicy {
    /// Readers are admitted whenever no writer holds the lock.
    /// Continuous reader traffic can starve writers.
    #[default]
    ReaderPreferred,
    /// New readers wait while any writer is queued.
    WriterPreferred,
}

impl fmt::Display for RwPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RwPolicy::ReaderPreferred => write!(f, "reader-preferred"),
            RwPolicy::WriterPreferred => write!(f, "writer-preferred"),
        }
    }
}

/// Tuning shared by every lock a scenario creates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LockConfig {
    /// Interrupt poll interval of blocked waiters
    #[serde(with = "crate::infrastructure::config::millis")]
    pub interrupt_poll: Duration,
    /// Hand-off policy of exclusive locks
    pub fairness: Fairness,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            interrupt_poll: DEFAULT_INTERRUPT_POLL,
            fairness: Fairness::Fair,
        }
    }
}
