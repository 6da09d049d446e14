//! NoOpRecorder - Accounting Disabled

use std::time::Instant;

use super::recorder::{Contention, ContentionRecorder};
use crate::domain::worker::WorkerId;

/// Recorder with no accounting; every query reports `Unsupported`
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpRecorder;

impl ContentionRecorder for NoOpRecorder {
    #[inline(always)]
    fn on_blocked(&self, _worker: WorkerId, _at: Instant) {}

    #[inline(always)]
    fn on_unblocked(&self, _worker: WorkerId, _at: Instant) {}

    #[inline(always)]
    fn stats(&self, _worker: WorkerId) -> Contention {
        Contention::Unsupported
    }

    #[inline(always)]
    fn is_supported(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_noop_reports_unsupported() {
        let recorder = NoOpRecorder;
        recorder.on_blocked(WorkerId::new(0), Instant::now());
        recorder.on_unblocked(WorkerId::new(0), Instant::now());
        assert_eq!(recorder.stats(WorkerId::new(0)), Contention::Unsupported);
        assert!(!recorder.is_supported());
    }
}
