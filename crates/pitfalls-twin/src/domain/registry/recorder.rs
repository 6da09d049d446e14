//! ContentionRecorder Trait - Blocked-Time Accounting Interface

use std::fmt;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::domain::worker::WorkerId;

/// Blocked-time accounting hooks
///
/// The registry calls these on every wait transition. Two implementations
/// exist:
///
/// - `DetailedRecorder`: per-worker blocked count and cumulative time
/// - `NoOpRecorder`: records nothing and reports `Contention::Unsupported`
pub trait ContentionRecorder: Send + Sync {
    /// Worker started waiting on a lock
    fn on_blocked(&self, worker: WorkerId, at: Instant);

    /// Worker stopped waiting (acquired the lock or gave up)
    fn on_unblocked(&self, worker: WorkerId, at: Instant);

    /// Accumulated statistics for `worker`
    fn stats(&self, worker: WorkerId) -> Contention;

    /// Whether this recorder measures anything
    fn is_supported(&self) -> bool;
}

/// Contention statistics for one worker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Contention {
    /// Accounting is enabled
    Measured {
        /// Number of times the worker had to wait
        blocked_count: u64,
        /// Total time spent waiting, including any wait still in progress
        blocked_time: Duration,
    },
    /// Accounting is disabled for this registry
    Unsupported,
}

impl Contention {
    /// Blocked count, if measured
    pub fn blocked_count(&self) -> Option<u64> {
        match self {
            Self::Measured { blocked_count, .. } => Some(*blocked_count),
            Self::Unsupported => None,
        }
    }

    /// Cumulative blocked time, if measured
    pub fn blocked_time(&self) -> Option<Duration> {
        match self {
            Self::Measured { blocked_time, .. } => Some(*blocked_time),
            Self::Unsupported => None,
        }
    }
}

impl fmt::Display for Contention {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Measured {
                blocked_count,
                blocked_time,
            } => write!(f, "blocked {} times for {:?}", blocked_count, blocked_time),
            Self::Unsupported => write!(f, "unknown (contention accounting unsupported)"),
        }
    }
}

/// Which recorder a registry is built with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Accounting {
    /// Track blocked counts and time
    #[default]
    Detailed,
    /// No accounting; contention queries report `Unsupported`
    Disabled,
}
