//! DetailedRecorder - Per-Worker Blocked-Time Accounting

use std::time::{Duration, Instant};

use dashmap::DashMap;

use super::recorder::{Contention, ContentionRecorder};
use crate::domain::worker::WorkerId;

#[derive(Debug, Default, Clone, Copy)]
struct BlockAccount {
    count: u64,
    total: Duration,
    since: Option<Instant>,
}

/// Recorder that keeps a blocked count and cumulative blocked time per
/// worker
#[derive(Debug, Default)]
pub struct DetailedRecorder {
    accounts: DashMap<WorkerId, BlockAccount>,
}

impl DetailedRecorder {
    /// Create an empty recorder
    pub fn new() -> Self {
        Self::default()
    }
}

impl ContentionRecorder for DetailedRecorder {
    fn on_blocked(&self, worker: WorkerId, at: Instant) {
        let mut account = self.accounts.entry(worker).or_default();
        // A wait already in progress is not counted twice.
        if account.since.is_none() {
            account.count += 1;
            account.since = Some(at);
        }
    }

    fn on_unblocked(&self, worker: WorkerId, at: Instant) {
        if let Some(mut account) = self.accounts.get_mut(&worker) {
            if let Some(since) = account.since.take() {
                account.total += at.saturating_duration_since(since);
            }
        }
    }

    fn stats(&self, worker: WorkerId) -> Contention {
        let account = self
            .accounts
            .get(&worker)
            .map(|entry| *entry.value())
            .unwrap_or_default();

        let in_progress = account
            .since
            .map(|since| since.elapsed())
            .unwrap_or_default();

        Contention::Measured {
            blocked_count: account.count,
            blocked_time: account.total + in_progress,
        }
    }

    #[inline(always)]
    fn is_supported(&self) -> bool {
        true
    }
}
