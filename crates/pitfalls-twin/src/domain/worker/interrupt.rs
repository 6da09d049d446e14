//! Cooperative Interruption
//!
//! Rust threads cannot be preempted from outside, so every blocking point in
//! the harness checks an [`InterruptToken`]. Sleeps park on a condvar and
//! wake the moment the token fires; lock waits poll it at a bounded interval.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use super::types::{Interrupted, WorkerId};

struct TokenInner {
    worker: WorkerId,
    fired: AtomicBool,
    gate: Mutex<()>,
    wake: Condvar,
}

/// Per-worker interrupt flag
///
/// Cloning is cheap; all clones observe the same flag.
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
/// use pitfalls_twin::domain::worker::{InterruptToken, WorkerId};
///
/// let token = InterruptToken::new(WorkerId::new(0));
/// assert!(token.sleep(Duration::from_millis(1)).is_ok());
///
/// token.interrupt();
/// assert!(token.check().is_err());
/// assert!(token.sleep(Duration::from_secs(60)).is_err());
/// ```
#[derive(Clone)]
pub struct InterruptToken {
    inner: Arc<TokenInner>,
}

impl InterruptToken {
    /// Create a token for `worker`
    pub fn new(worker: WorkerId) -> Self {
        Self {
            inner: Arc::new(TokenInner {
                worker,
                fired: AtomicBool::new(false),
                gate: Mutex::new(()),
                wake: Condvar::new(),
            }),
        }
    }

    /// Worker this token belongs to
    #[inline(always)]
    pub fn worker(&self) -> WorkerId {
        self.inner.worker
    }

    /// Request interruption and wake any sleeper
    pub fn interrupt(&self) {
        self.inner.fired.store(true, Ordering::SeqCst);
        let _gate = self.inner.gate.lock();
        self.inner.wake.notify_all();
    }

    /// Check whether interruption was requested
    #[inline]
    pub fn is_interrupted(&self) -> bool {
        self.inner.fired.load(Ordering::SeqCst)
    }

    /// Return `Err(Interrupted)` if interruption was requested
    #[inline]
    pub fn check(&self) -> Result<(), Interrupted> {
        if self.is_interrupted() {
            Err(Interrupted { worker: self.inner.worker })
        } else {
            Ok(())
        }
    }

    /// Sleep for `duration` unless interrupted first
    pub fn sleep(&self, duration: Duration) -> Result<(), Interrupted> {
        self.check()?;
        if duration.is_zero() {
            return Ok(());
        }

        let deadline = Instant::now() + duration;
        let mut gate = self.inner.gate.lock();
        loop {
            // Checked under the gate so a concurrent interrupt cannot slip
            // between the check and the wait.
            self.check()?;
            if self.inner.wake.wait_until(&mut gate, deadline).timed_out() {
                drop(gate);
                return self.check();
            }
        }
    }
}

impl std::fmt::Debug for InterruptToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InterruptToken")
            .field("worker", &self.inner.worker)
            .field("interrupted", &self.is_interrupted())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_sleep_completes_without_interrupt() {
        let token = InterruptToken::new(WorkerId::new(0));
        let start = Instant::now();
        token.sleep(Duration::from_millis(20)).unwrap();
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn test_interrupt_wakes_sleeper_promptly() {
        let token = InterruptToken::new(WorkerId::new(4));
        let sleeper = token.clone();

        let handle = thread::spawn(move || {
            let start = Instant::now();
            let result = sleeper.sleep(Duration::from_secs(30));
            (result, start.elapsed())
        });

        thread::sleep(Duration::from_millis(30));
        token.interrupt();

        let (result, elapsed) = handle.join().unwrap();
        assert_eq!(result, Err(Interrupted { worker: WorkerId::new(4) }));
        assert!(elapsed < Duration::from_secs(5));
    }

    #[test]
    fn test_interrupt_is_sticky() {
        let token = InterruptToken::new(WorkerId::new(1));
        token.interrupt();
        assert!(token.is_interrupted());
        assert!(token.sleep(Duration::ZERO).is_err());
        assert!(token.check().is_err());
    }
}
