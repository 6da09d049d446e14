//! Core Worker Types
//!
//! Identifiers and lifecycle states shared by locks, the registry and the
//! scenario runners.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Worker identifier, unique within one scenario run
///
/// # Example
///
/// ```rust
/// use pitfalls_twin::domain::worker::WorkerId;
///
/// let a = WorkerId::new(0);
/// let b = WorkerId::new(1);
/// assert_ne!(a, b);
/// assert_eq!(a.to_string(), "w0");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WorkerId(pub usize);

impl WorkerId {
    /// Create a new worker identifier
    #[inline(always)]
    pub const fn new(id: usize) -> Self {
        Self(id)
    }

    /// Get the underlying usize value
    #[inline(always)]
    pub const fn as_usize(self) -> usize {
        self.0
    }
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "w{}", self.0)
    }
}

/// Lock identifier, unique within one registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LockId(pub usize);

impl LockId {
    /// Create a new lock identifier
    #[inline(always)]
    pub const fn new(id: usize) -> Self {
        Self(id)
    }

    /// Get the underlying usize value
    #[inline(always)]
    pub const fn as_usize(self) -> usize {
        self.0
    }
}

impl fmt::Display for LockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L{}", self.0)
    }
}

/// Worker lifecycle state
///
/// # State Transitions
///
/// ```text
/// CREATED ──> RUNNING ──> BLOCKED ──> RUNNING ──> TERMINATED
///                │           │
///                └───────────┴──────> INTERRUPTED
/// ```
///
/// INTERRUPTED and TERMINATED are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WorkerState {
    /// Registered, thread not started yet
    Created,
    /// Executing or sleeping; not waiting on any lock
    Running,
    /// Waiting to acquire a lock
    Blocked,
    /// Stopped by an interrupt request
    Interrupted,
    /// Returned normally
    Terminated,
}

impl WorkerState {
    /// Check if the worker is waiting on a lock
    #[inline(always)]
    pub const fn is_blocked(self) -> bool {
        matches!(self, WorkerState::Blocked)
    }

    /// Check if the worker can still make progress or block
    #[inline(always)]
    pub const fn is_alive(self) -> bool {
        matches!(self, WorkerState::Created | WorkerState::Running | WorkerState::Blocked)
    }

    /// Check if the worker has stopped for good
    #[inline(always)]
    pub const fn is_finished(self) -> bool {
        matches!(self, WorkerState::Interrupted | WorkerState::Terminated)
    }
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkerState::Created => write!(f, "CREATED"),
            WorkerState::Running => write!(f, "RUNNING"),
            WorkerState::Blocked => write!(f, "BLOCKED"),
            WorkerState::Interrupted => write!(f, "INTERRUPTED"),
            WorkerState::Terminated => write!(f, "TERMINATED"),
        }
    }
}

/// Cancellation delivered to a worker at one of its blocking points
///
/// Workers propagate this with `?` so the crew can record the final
/// `Interrupted` state instead of `Terminated`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("worker {worker} interrupted")]
pub struct Interrupted {
    /// The worker that observed the interrupt
    pub worker: WorkerId,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_display() {
        assert_eq!(WorkerId::new(7).to_string(), "w7");
        assert_eq!(LockId::new(2).to_string(), "L2");
        assert_eq!(WorkerId::new(7).as_usize(), 7);
    }

    #[test]
    fn test_state_predicates() {
        assert!(WorkerState::Blocked.is_blocked());
        assert!(WorkerState::Blocked.is_alive());
        assert!(!WorkerState::Running.is_blocked());
        assert!(WorkerState::Created.is_alive());
        assert!(WorkerState::Interrupted.is_finished());
        assert!(WorkerState::Terminated.is_finished());
        assert!(!WorkerState::Terminated.is_alive());
    }

    #[test]
    fn test_interrupted_display() {
        let err = Interrupted { worker: WorkerId::new(1) };
        assert_eq!(err.to_string(), "worker w1 interrupted");
    }
}
