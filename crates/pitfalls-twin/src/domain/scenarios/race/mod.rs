//! Race-Condition Scenarios
//!
//! Three shapes of the same mistake, each runnable against unprotected or
//! lock-protected shared state:
//!
//! - check-then-act: a bounded counter checked, then incremented
//! - compound operation: two counters that must move together
//! - TOCTOU: a balance checked, then debited after a delay
//!
//! Shared state is handed to workers explicitly through the traits in
//! [`shared`]; the unguarded and guarded implementations never mix.

pub mod check_then_act;
pub mod compound;
pub mod shared;
pub mod toctou;

use std::time::Duration;

use super::crew::CrewOutcome;
use super::Verdict;

pub use check_then_act::{CheckThenActConfig, CheckThenActOutcome};
pub use compound::{CompoundConfig, CompoundOutcome};
pub use shared::{
    Account, BoundedCounter, CounterPair, GuardedAccount, GuardedCounter, GuardedPair,
    UnguardedAccount, UnguardedCounter, UnguardedPair,
};
pub use toctou::{ToctouConfig, ToctouOutcome};

/// Join bound of race workers, which finish on their own
pub(crate) const RUN_BOUND: Duration = Duration::from_secs(60);

/// Verdict of a race run: stragglers make it inconclusive
pub(crate) fn classify(exits: &CrewOutcome, reproduced: bool) -> Verdict {
    if reproduced {
        Verdict::HazardReproduced
    } else if !exits.all_joined() {
        Verdict::Inconclusive
    } else {
        Verdict::NoHazard
    }
}
