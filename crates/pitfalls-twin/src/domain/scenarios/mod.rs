//! Scenario Runners
//!
//! Each runner builds a fresh registry, its locks and its shared state,
//! spawns a crew of workers, observes them through the introspector and
//! returns an outcome value. Induced hazards are outcomes, not errors.
//!
//! ```text
//! scenarios/
//! ├── crew.rs          spawning, interruption, bounded joins
//! ├── deadlock.rs      opposite-order lock acquisition
//! ├── livelock.rs      polite workers on shared flags
//! ├── race/            check-then-act, compound operation, TOCTOU
//! └── starvation.rs    writer vs. continuous readers
//! ```

pub mod crew;
pub mod deadlock;
pub mod livelock;
pub mod race;
pub mod starvation;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::locks::{LockConfig, ResourceLock, RwPolicy, RwResourceLock};
use crate::domain::registry::{Accounting, Registry};

pub use crew::{Crew, CrewOutcome, MemberExit, WorkerExit};
pub use deadlock::{DeadlockConfig, DeadlockOutcome};
pub use livelock::{LivelockConfig, LivelockOutcome, PoliteTally};
pub use race::{
    CheckThenActConfig, CheckThenActOutcome, CompoundConfig, CompoundOutcome, ToctouConfig,
    ToctouOutcome,
};
pub use starvation::{StarvationConfig, StarvationOutcome};

/// Join bound for workers that were already told to stop
pub(crate) const STOP_JOIN_BOUND: Duration = Duration::from_secs(1);

/// Environment shared by every scenario run
///
/// Each run builds a fresh registry from these options; nothing is shared
/// between runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RunOptions {
    /// Contention accounting mode of the run's registry
    pub accounting: Accounting,
    /// Lock tuning
    pub lock: LockConfig,
}

impl RunOptions {
    /// Fresh registry for one run
    pub fn registry(&self) -> Arc<Registry> {
        Arc::new(Registry::new(self.accounting))
    }

    /// Exclusive lock tuned by these options
    pub fn exclusive_lock(&self, registry: &Arc<Registry>, name: impl Into<String>) -> ResourceLock {
        ResourceLock::new(registry, name, self.lock.fairness).with_poll(self.lock.interrupt_poll)
    }

    /// Read/write lock tuned by these options
    pub fn rw_lock(
        &self,
        registry: &Arc<Registry>,
        name: impl Into<String>,
        policy: RwPolicy,
    ) -> RwResourceLock {
        RwResourceLock::new(registry, name, policy).with_poll(self.lock.interrupt_poll)
    }
}

/// Classification of a scenario run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Verdict {
    /// The hazard showed up
    HazardReproduced,
    /// The run finished and the hazard did not show up
    NoHazard,
    /// Neither finished nor reproduced within the bound
    Inconclusive,
}

impl Verdict {
    /// Check if the hazard was reproduced
    #[inline(always)]
    pub const fn is_reproduced(self) -> bool {
        matches!(self, Verdict::HazardReproduced)
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::HazardReproduced => write!(f, "hazard reproduced"),
            Verdict::NoHazard => write!(f, "no hazard"),
            Verdict::Inconclusive => write!(f, "inconclusive"),
        }
    }
}

/// Whether shared state is protected
///
/// `Unguarded` is the broken demonstration, `Guarded` the remedy:
/// a lock around race state, consistent lock ordering for deadlock,
/// asymmetric back-off for livelock, writer preference for starvation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Variant {
    /// Demonstrate the hazard
    #[default]
    Unguarded,
    /// Apply the remedy
    Guarded,
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Variant::Unguarded => write!(f, "unguarded"),
            Variant::Guarded => write!(f, "guarded"),
        }
    }
}

/// The scenarios the harness can run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScenarioKind {
    /// Two workers locking in opposite order
    Deadlock,
    /// Two polite workers yielding to each other forever
    Livelock,
    /// Bounded counter incremented without atomic check+act
    CheckThenAct,
    /// Two counters updated as a non-atomic pair
    Compound,
    /// Balance checked, then debited after a delay
    Toctou,
    /// Writer starved by continuous readers
    Starvation,
}

impl ScenarioKind {
    /// Every scenario, in harness order
    pub const ALL: [ScenarioKind; 6] = [
        ScenarioKind::Deadlock,
        ScenarioKind::Livelock,
        ScenarioKind::CheckThenAct,
        ScenarioKind::Compound,
        ScenarioKind::Toctou,
        ScenarioKind::Starvation,
    ];

    /// Stable short name
    pub const fn name(self) -> &'static str {
        match self {
            ScenarioKind::Deadlock => "deadlock",
            ScenarioKind::Livelock => "livelock",
            ScenarioKind::CheckThenAct => "check-then-act",
            ScenarioKind::Compound => "compound",
            ScenarioKind::Toctou => "toctou",
            ScenarioKind::Starvation => "starvation",
        }
    }
}

impl fmt::Display for ScenarioKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ScenarioKind {
    type Err = crate::error::HarnessError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ScenarioKind::ALL
            .into_iter()
            .find(|kind| kind.name() == s)
            .ok_or_else(|| crate::error::HarnessError::invalid(format!("unknown scenario '{s}'")))
    }
}
