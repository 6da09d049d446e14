//! Worker Execution Context
//!
//! The handle a worker body receives: who it is and how to honour
//! interruption at its sleep points.

use std::sync::Arc;
use std::time::Duration;

use super::interrupt::InterruptToken;
use super::types::{Interrupted, WorkerId};

/// Identity and interrupt token of one running worker
#[derive(Debug, Clone)]
pub struct WorkerContext {
    id: WorkerId,
    name: Arc<str>,
    token: InterruptToken,
}

impl WorkerContext {
    /// Create a context; normally done by the crew when spawning
    pub fn new(id: WorkerId, name: impl Into<Arc<str>>) -> Self {
        Self {
            id,
            name: name.into(),
            token: InterruptToken::new(id),
        }
    }

    /// Worker identifier
    #[inline(always)]
    pub fn id(&self) -> WorkerId {
        self.id
    }

    /// Display name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Interrupt token shared with the crew
    pub fn token(&self) -> &InterruptToken {
        &self.token
    }

    /// Fail with `Interrupted` if an interrupt was requested
    #[inline]
    pub fn check(&self) -> Result<(), Interrupted> {
        self.token.check()
    }

    /// Interruptible sleep
    ///
    /// A zero duration yields the thread instead, which still widens race
    /// windows a little without costing a timer.
    pub fn sleep(&self, duration: Duration) -> Result<(), Interrupted> {
        if duration.is_zero() {
            self.token.check()?;
            std::thread::yield_now();
            return Ok(());
        }
        self.token.sleep(duration)
    }
}
