//! Runtime Introspector
//!
//! Reads the registry of one scenario run and answers three questions:
//!
//! - what is every worker doing right now (`capture_snapshot`)
//! - is there a cycle in the wait-for graph (`detect_deadlock`)
//! - how long has a worker spent blocked (`lock_contention_stats`)
//!
//! All queries are read-only.

pub mod detector;
pub mod snapshot;

use std::sync::Arc;

use tracing::{debug, warn};

use crate::domain::registry::{Contention, Registry};
use crate::domain::worker::WorkerId;
use crate::error::Result;

pub use detector::{CycleLink, DeadlockCycle, DetectionResult, WaitForEdge};
pub use snapshot::{render_dump, ThreadSnapshot, DEFAULT_DUMP_LIMIT};

/// Read-only view over a [`Registry`]
#[derive(Debug, Clone)]
pub struct Introspector {
    registry: Arc<Registry>,
}

impl Introspector {
    /// Create an introspector for `registry`
    pub fn new(registry: Arc<Registry>) -> Self {
        Self { registry }
    }

    /// Underlying registry
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Snapshot every worker known to the registry, ordered by id
    pub fn capture_snapshot(&self) -> Vec<ThreadSnapshot> {
        self.registry
            .workers()
            .into_iter()
            .map(|(id, record)| {
                let lock = record
                    .waiting_on
                    .filter(|_| record.state.is_blocked())
                    .and_then(|lock| self.registry.lock(lock));
                ThreadSnapshot {
                    id,
                    name: record.name,
                    role: record.role,
                    state: record.state,
                    blocked_on: lock.as_ref().map(|l| l.name.clone()),
                    lock_owners: lock.map(|l| l.holders).unwrap_or_default(),
                }
            })
            .collect()
    }

    /// Snapshot rendered as text, at most `limit` rows
    pub fn render_dump(&self, limit: usize) -> String {
        render_dump(&self.capture_snapshot(), limit)
    }

    /// Current wait-for edges
    pub fn wait_for_edges(&self) -> Vec<WaitForEdge> {
        detector::wait_for_edges(&self.registry)
    }

    /// Build the wait-for graph and search it for a cycle
    pub fn detect_deadlock(&self) -> DetectionResult {
        let result = detector::detect(&self.registry);
        if let DetectionResult::Deadlock(cycle) = &result {
            debug!(%cycle, "wait-for cycle found");
        }
        result
    }

    /// Blocked count and cumulative blocked time of `worker`
    ///
    /// Reports `Contention::Unsupported` when the registry runs without
    /// accounting.
    pub fn lock_contention_stats(&self, worker: WorkerId) -> Result<Contention> {
        let stats = self.registry.contention(worker)?;
        if stats == Contention::Unsupported {
            warn!(%worker, "contention accounting unsupported for this run");
        }
        Ok(stats)
    }
}
