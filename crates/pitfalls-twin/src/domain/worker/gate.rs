//! Interruptible Start Gate and Rendezvous
//!
//! Worker-side synchronization that honours the interrupt token. A
//! [`StartGate`] holds workers until the runner opens it; a [`Rendezvous`]
//! lets a fixed group step through rounds together.

use std::time::Duration;

use parking_lot::{Condvar, Mutex};

use super::context::WorkerContext;
use super::types::Interrupted;

/// Interval at which waiters re-check their interrupt token
const GATE_POLL: Duration = Duration::from_millis(5);

/// One-shot gate opened by the runner
#[derive(Debug, Default)]
pub struct StartGate {
    open: Mutex<bool>,
    opened: Condvar,
}

impl StartGate {
    /// Create a closed gate
    pub fn new() -> Self {
        Self::default()
    }

    /// Release every current and future waiter
    pub fn open(&self) {
        *self.open.lock() = true;
        self.opened.notify_all();
    }

    /// Whether the gate is open
    pub fn is_open(&self) -> bool {
        *self.open.lock()
    }

    /// Block until the gate opens or the worker is interrupted
    pub fn wait(&self, ctx: &WorkerContext) -> Result<(), Interrupted> {
        let mut open = self.open.lock();
        while !*open {
            ctx.check()?;
            self.opened.wait_for(&mut open, GATE_POLL);
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
struct RoundState {
    arrived: usize,
    round: u64,
}

/// Reusable meeting point for `parties` workers
#[derive(Debug)]
pub struct Rendezvous {
    parties: usize,
    state: Mutex<RoundState>,
    all_arrived: Condvar,
}

impl Rendezvous {
    /// Meeting point for `parties` workers (at least one)
    pub fn new(parties: usize) -> Self {
        Self {
            parties: parties.max(1),
            state: Mutex::new(RoundState::default()),
            all_arrived: Condvar::new(),
        }
    }

    /// Wait until every party has arrived for the current round
    ///
    /// An interrupted waiter withdraws its arrival.
    pub fn meet(&self, ctx: &WorkerContext) -> Result<(), Interrupted> {
        let mut st = self.state.lock();
        let round = st.round;
        st.arrived += 1;
        if st.arrived == self.parties {
            st.arrived = 0;
            st.round += 1;
            self.all_arrived.notify_all();
            return Ok(());
        }

        while st.round == round {
            if let Err(interrupted) = ctx.check() {
                st.arrived -= 1;
                return Err(interrupted);
            }
            self.all_arrived.wait_for(&mut st, GATE_POLL);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::worker::WorkerId;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;
    use std::thread;
    use std::time::Instant;

    #[test]
    fn test_gate_holds_until_opened() {
        let gate = Arc::new(StartGate::new());
        let ctx = WorkerContext::new(WorkerId::new(0), "waiter");

        let waiter = {
            let gate = Arc::clone(&gate);
            thread::spawn(move || gate.wait(&ctx))
        };
        thread::sleep(Duration::from_millis(20));
        assert!(!waiter.is_finished());

        gate.open();
        assert!(waiter.join().unwrap().is_ok());
        assert!(gate.is_open());
    }

    #[test]
    fn test_closed_gate_honours_interrupt() {
        let gate = Arc::new(StartGate::new());
        let ctx = WorkerContext::new(WorkerId::new(1), "waiter");
        let token = ctx.token().clone();

        let waiter = {
            let gate = Arc::clone(&gate);
            thread::spawn(move || gate.wait(&ctx))
        };
        token.interrupt();

        let start = Instant::now();
        assert!(waiter.join().unwrap().is_err());
        assert!(start.elapsed() < Duration::from_secs(5));
        assert!(!gate.is_open());
    }

    #[test]
    fn test_rendezvous_keeps_parties_in_step() {
        let meeting = Arc::new(Rendezvous::new(2));
        let rounds = Arc::new([AtomicU64::new(0), AtomicU64::new(0)]);

        let handles: Vec<_> = (0..2)
            .map(|idx| {
                let meeting = Arc::clone(&meeting);
                let rounds = Arc::clone(&rounds);
                thread::spawn(move || {
                    let ctx = WorkerContext::new(WorkerId::new(idx), format!("w{idx}"));
                    for _ in 0..100 {
                        meeting.meet(&ctx).unwrap();
                        let mine = rounds[idx].fetch_add(1, Ordering::SeqCst) + 1;
                        let theirs = rounds[1 - idx].load(Ordering::SeqCst);
                        assert!(mine.abs_diff(theirs) <= 1);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(rounds[0].load(Ordering::SeqCst), 100);
        assert_eq!(rounds[1].load(Ordering::SeqCst), 100);
    }

    #[test]
    fn test_interrupted_party_withdraws() {
        let meeting = Rendezvous::new(2);
        let ctx = WorkerContext::new(WorkerId::new(0), "alone");
        ctx.token().interrupt();
        assert!(meeting.meet(&ctx).is_err());
        assert_eq!(meeting.state.lock().arrived, 0);
    }
}
