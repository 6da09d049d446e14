//! Crew - Spawning, Interrupting and Joining Scenario Workers
//!
//! A crew owns the OS threads of one scenario run. Each worker body gets a
//! [`WorkerContext`] and returns `Result<(), Interrupted>`; the crew records
//! the final lifecycle state in the registry (`Terminated` or
//! `Interrupted`) so the driver can observe how each worker ended.
//!
//! Dropping a crew interrupts every worker still running, so an abandoned
//! scenario never leaves threads spinning forever.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::domain::registry::Registry;
use crate::domain::worker::{Interrupted, InterruptToken, WorkerContext, WorkerId, WorkerState};
use crate::error::{HarnessError, Result};

/// Poll interval of bounded joins
const JOIN_POLL: Duration = Duration::from_millis(1);

/// How a worker ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerExit {
    /// Body returned `Ok`
    Completed,
    /// Body returned `Err(Interrupted)`
    Interrupted,
}

/// Exit record of one joined worker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberExit {
    /// Worker identifier
    pub id: WorkerId,
    /// Display name
    pub name: String,
    /// How it ended
    pub exit: WorkerExit,
}

/// Result of a bounded join
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrewOutcome {
    /// Workers that finished and were joined
    pub exits: Vec<MemberExit>,
    /// Workers still running when the join bound expired
    pub stragglers: Vec<WorkerId>,
}

impl CrewOutcome {
    /// Check if every worker was joined
    pub fn all_joined(&self) -> bool {
        self.stragglers.is_empty()
    }

    /// Number of workers that ended by interruption
    pub fn interrupted_count(&self) -> usize {
        self.exits
            .iter()
            .filter(|m| m.exit == WorkerExit::Interrupted)
            .count()
    }

    /// Exit of a specific worker
    pub fn exit_of(&self, id: WorkerId) -> Option<WorkerExit> {
        self.exits.iter().find(|m| m.id == id).map(|m| m.exit)
    }
}

struct Member {
    id: WorkerId,
    name: String,
    token: InterruptToken,
    handle: Option<JoinHandle<std::result::Result<(), Interrupted>>>,
}

/// The workers of one scenario run
pub struct Crew {
    registry: Arc<Registry>,
    members: Vec<Member>,
}

impl Crew {
    /// Create an empty crew bound to `registry`
    pub fn new(registry: Arc<Registry>) -> Self {
        Self {
            registry,
            members: Vec::new(),
        }
    }

    /// Registry the crew reports to
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Identifiers of all members, in spawn order
    pub fn ids(&self) -> Vec<WorkerId> {
        self.members.iter().map(|m| m.id).collect()
    }

    /// Register a worker and start its thread
    ///
    /// The thread is named after the worker.
    ///
    /// # Errors
    ///
    /// `HarnessError::Spawn` if the OS refuses to create the thread.
    pub fn spawn<F>(&mut self, name: impl Into<String>, role: &str, body: F) -> Result<WorkerId>
    where
        F: FnOnce(&WorkerContext) -> std::result::Result<(), Interrupted> + Send + 'static,
    {
        let name = name.into();
        let id = self.registry.register_worker(name.clone(), role);
        let ctx = WorkerContext::new(id, name.as_str());
        let token = ctx.token().clone();
        let registry = Arc::clone(&self.registry);

        let handle = thread::Builder::new()
            .name(name.clone())
            .spawn(move || {
                let _ = registry.set_state(ctx.id(), WorkerState::Running);
                let result = body(&ctx);
                let final_state = match result {
                    Ok(()) => WorkerState::Terminated,
                    Err(_) => WorkerState::Interrupted,
                };
                let _ = registry.set_state(ctx.id(), final_state);
                debug!(worker = %ctx.id(), name = ctx.name(), state = %final_state, "worker finished");
                result
            })
            .map_err(|source| HarnessError::Spawn {
                name: name.clone(),
                source,
            })?;

        self.members.push(Member {
            id,
            name,
            token,
            handle: Some(handle),
        });
        Ok(id)
    }

    /// Interrupt one worker
    pub fn interrupt(&self, id: WorkerId) {
        if let Some(member) = self.members.iter().find(|m| m.id == id) {
            member.token.interrupt();
        }
    }

    /// Interrupt every worker
    pub fn interrupt_all(&self) {
        for member in &self.members {
            member.token.interrupt();
        }
    }

    /// Check if a worker's thread has returned
    pub fn is_finished(&self, id: WorkerId) -> bool {
        self.members
            .iter()
            .find(|m| m.id == id)
            .map_or(true, |m| m.handle.as_ref().map_or(true, JoinHandle::is_finished))
    }

    /// Check if every worker's thread has returned
    pub fn all_finished(&self) -> bool {
        self.members
            .iter()
            .all(|m| m.handle.as_ref().map_or(true, JoinHandle::is_finished))
    }

    /// Wait until every worker returned or `timeout` elapsed, then join the
    /// finished ones
    ///
    /// Unfinished workers are reported as stragglers and left interrupted;
    /// the join never blocks past the bound.
    ///
    /// # Errors
    ///
    /// `HarnessError::WorkerPanicked` if a worker body panicked.
    pub fn join_within(&mut self, timeout: Duration) -> Result<CrewOutcome> {
        let deadline = Instant::now() + timeout;
        while !self.all_finished() && Instant::now() < deadline {
            thread::sleep(JOIN_POLL);
        }

        let mut outcome = CrewOutcome::default();
        for member in &mut self.members {
            let Some(handle) = member.handle.take() else {
                continue;
            };

            if !handle.is_finished() {
                warn!(worker = %member.id, name = %member.name, "worker did not stop within the join bound");
                member.token.interrupt();
                outcome.stragglers.push(member.id);
                // Dropping the handle detaches the thread.
                continue;
            }

            let exit = match handle.join() {
                Ok(Ok(())) => WorkerExit::Completed,
                Ok(Err(_)) => WorkerExit::Interrupted,
                Err(_) => {
                    let _ = self.registry.set_state(member.id, WorkerState::Terminated);
                    return Err(HarnessError::WorkerPanicked(member.name.clone()));
                }
            };
            outcome.exits.push(MemberExit {
                id: member.id,
                name: member.name.clone(),
                exit,
            });
        }
        Ok(outcome)
    }
}

impl Drop for Crew {
    fn drop(&mut self) {
        self.interrupt_all();
    }
}
