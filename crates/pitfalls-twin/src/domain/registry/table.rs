//! Worker Registry - The Harness's Own View of Threads and Locks
//!
//! # Overview
//!
//! Instead of reflecting over live OS threads, the harness keeps an explicit
//! table of the workers and locks it created. Locks report every ownership
//! and wait transition here while holding their internal state mutex, so
//! the per-lock view is always consistent. The introspector reads these
//! tables to build snapshots and the wait-for graph.
//!
//! ```text
//! Registry
//!   ├─ workers: DashMap<WorkerId, WorkerRecord>   (state, waiting_on)
//!   ├─ locks:   DashMap<LockId, LockRecord>       (holders, waiters)
//!   └─ recorder: Box<dyn ContentionRecorder>      (blocked-time accounting)
//! ```

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use dashmap::DashMap;
use tracing::trace;

use super::detailed::DetailedRecorder;
use super::noop::NoOpRecorder;
use super::recorder::{Accounting, Contention, ContentionRecorder};
use crate::domain::worker::{LockId, WorkerId, WorkerState};
use crate::error::{HarnessError, Result};

/// Kind of lock recorded in the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockKind {
    /// At most one holder
    Exclusive,
    /// Many readers or one writer
    ReadWrite,
}

/// Registry entry for one worker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerRecord {
    /// Display name (also the OS thread name)
    pub name: String,
    /// Scenario role, e.g. "reader" or "writer"
    pub role: String,
    /// Lifecycle state
    pub state: WorkerState,
    /// Lock the worker is currently waiting on
    pub waiting_on: Option<LockId>,
}

/// Registry entry for one lock
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockRecord {
    /// Display name
    pub name: String,
    /// Exclusive or read/write
    pub kind: LockKind,
    /// Current holders (one for exclusive locks and writers)
    pub holders: Vec<WorkerId>,
    /// Waiters in arrival order
    pub waiters: Vec<WorkerId>,
}

/// Per-run table of workers and locks
pub struct Registry {
    workers: DashMap<WorkerId, WorkerRecord>,
    locks: DashMap<LockId, LockRecord>,
    next_worker: AtomicUsize,
    next_lock: AtomicUsize,
    recorder: Box<dyn ContentionRecorder>,
}

impl Registry {
    /// Create a registry with the given accounting mode
    pub fn new(accounting: Accounting) -> Self {
        let recorder: Box<dyn ContentionRecorder> = match accounting {
            Accounting::Detailed => Box::new(DetailedRecorder::new()),
            Accounting::Disabled => Box::new(NoOpRecorder),
        };

        Self {
            workers: DashMap::new(),
            locks: DashMap::new(),
            next_worker: AtomicUsize::new(0),
            next_lock: AtomicUsize::new(0),
            recorder,
        }
    }

    /// Registry with blocked-time accounting
    pub fn detailed() -> Self {
        Self::new(Accounting::Detailed)
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Registration
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    /// Register a worker in state CREATED
    pub fn register_worker(&self, name: impl Into<String>, role: impl Into<String>) -> WorkerId {
        let id = WorkerId::new(self.next_worker.fetch_add(1, Ordering::Relaxed));
        self.workers.insert(
            id,
            WorkerRecord {
                name: name.into(),
                role: role.into(),
                state: WorkerState::Created,
                waiting_on: None,
            },
        );
        id
    }

    /// Register a lock with no holders
    pub fn register_lock(&self, name: impl Into<String>, kind: LockKind) -> LockId {
        let id = LockId::new(self.next_lock.fetch_add(1, Ordering::Relaxed));
        self.locks.insert(
            id,
            LockRecord {
                name: name.into(),
                kind,
                holders: Vec::new(),
                waiters: Vec::new(),
            },
        );
        id
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Transitions
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    /// Set a worker's lifecycle state
    ///
    /// Returns the previous state.
    pub fn set_state(&self, worker: WorkerId, state: WorkerState) -> Result<WorkerState> {
        let mut record = self
            .workers
            .get_mut(&worker)
            .ok_or(HarnessError::UnknownWorker(worker))?;
        let previous = record.state;
        record.state = state;
        if !state.is_blocked() {
            record.waiting_on = None;
        }
        trace!(%worker, from = %previous, to = %state, "worker state");
        Ok(previous)
    }

    /// Worker started waiting on `lock`
    pub fn on_wait(&self, lock: LockId, worker: WorkerId) {
        if let Some(mut record) = self.locks.get_mut(&lock) {
            if !record.waiters.contains(&worker) {
                record.waiters.push(worker);
            }
        }
        if let Some(mut record) = self.workers.get_mut(&worker) {
            record.state = WorkerState::Blocked;
            record.waiting_on = Some(lock);
        }
        self.recorder.on_blocked(worker, Instant::now());
    }

    /// Worker gave up waiting on `lock` without acquiring it
    pub fn on_wait_abandoned(&self, lock: LockId, worker: WorkerId) {
        self.remove_waiter(lock, worker);
    }

    /// Worker became a holder of `lock`
    pub fn on_acquire(&self, lock: LockId, worker: WorkerId) {
        if let Some(mut record) = self.locks.get_mut(&lock) {
            record.holders.push(worker);
        }
        self.remove_waiter(lock, worker);
    }

    /// Worker stopped holding `lock` (one hold is removed)
    pub fn on_release(&self, lock: LockId, worker: WorkerId) {
        if let Some(mut record) = self.locks.get_mut(&lock) {
            if let Some(pos) = record.holders.iter().position(|h| *h == worker) {
                record.holders.remove(pos);
            }
        }
    }

    fn remove_waiter(&self, lock: LockId, worker: WorkerId) {
        let was_waiting = match self.locks.get_mut(&lock) {
            Some(mut record) => {
                let before = record.waiters.len();
                record.waiters.retain(|w| *w != worker);
                before != record.waiters.len()
            }
            None => false,
        };

        if was_waiting {
            if let Some(mut record) = self.workers.get_mut(&worker) {
                if record.waiting_on == Some(lock) {
                    record.waiting_on = None;
                    if record.state.is_blocked() {
                        record.state = WorkerState::Running;
                    }
                }
            }
            self.recorder.on_unblocked(worker, Instant::now());
        }
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Queries
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    /// Copy of a worker's record
    pub fn worker(&self, worker: WorkerId) -> Option<WorkerRecord> {
        self.workers.get(&worker).map(|entry| entry.value().clone())
    }

    /// Copy of a lock's record
    pub fn lock(&self, lock: LockId) -> Option<LockRecord> {
        self.locks.get(&lock).map(|entry| entry.value().clone())
    }

    /// All worker records ordered by id
    pub fn workers(&self) -> Vec<(WorkerId, WorkerRecord)> {
        let mut all: Vec<_> = self
            .workers
            .iter()
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect();
        all.sort_by_key(|(id, _)| *id);
        all
    }

    /// All lock records ordered by id
    pub fn locks(&self) -> Vec<(LockId, LockRecord)> {
        let mut all: Vec<_> = self
            .locks
            .iter()
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect();
        all.sort_by_key(|(id, _)| *id);
        all
    }

    /// Number of registered workers
    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Contention statistics for a registered worker
    pub fn contention(&self, worker: WorkerId) -> Result<Contention> {
        if !self.workers.contains_key(&worker) {
            return Err(HarnessError::UnknownWorker(worker));
        }
        Ok(self.recorder.stats(worker))
    }

    /// Whether blocked-time accounting is active
    pub fn accounting(&self) -> Accounting {
        if self.recorder.is_supported() {
            Accounting::Detailed
        } else {
            Accounting::Disabled
        }
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::detailed()
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("workers", &self.workers.len())
            .field("locks", &self.locks.len())
            .field("accounting", &self.accounting())
            .finish()
    }
}
