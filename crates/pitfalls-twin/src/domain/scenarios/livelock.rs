//! Livelock Scenario
//!
//! Two polite workers share a pair of flags and no locks. They step through
//! rounds together: each round both raise their flag, wait `probe`, and
//! give way if the peer's flag is up too. Mirroring each other, they
//! collide and back off every round. Both stay RUNNABLE the whole time and
//! never block on a lock, yet neither gets any work done.
//!
//! The guarded variant adds a turn: on a collision only the worker whose
//! turn it is not gives way, and the turn passes to the peer after every
//! completed unit.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::crew::{Crew, CrewOutcome};
use super::{RunOptions, Variant, Verdict, STOP_JOIN_BOUND};
use crate::domain::introspect::Introspector;
use crate::domain::worker::{Interrupted, Rendezvous, WorkerContext, WorkerId};
use crate::error::{HarnessError, Result};
use crate::infrastructure::config::millis;

/// Back-offs per completed unit above which the pair counts as livelocked,
/// provided every worker gave way at least once
const WASTE_FACTOR: u64 = 2;

/// Livelock scenario parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LivelockConfig {
    /// How long the runner lets the workers go
    #[serde(with = "millis")]
    pub duration: Duration,
    /// Wait between raising the own flag and re-checking the peer's
    #[serde(with = "millis")]
    pub probe: Duration,
    /// Length of one unit of work
    #[serde(with = "millis")]
    pub work: Duration,
    /// Back-off after giving way; the guarded variant also uses it as the
    /// poll interval while the peer finishes its turn
    #[serde(with = "millis")]
    pub backoff: Duration,
    /// Snapshot sampling period
    #[serde(with = "millis")]
    pub sample_interval: Duration,
    /// Rounds per worker before it gives up
    pub max_rounds: u64,
}

impl Default for LivelockConfig {
    fn default() -> Self {
        Self {
            duration: Duration::from_secs(1),
            probe: Duration::from_millis(1),
            work: Duration::from_millis(5),
            backoff: Duration::from_millis(1),
            sample_interval: Duration::from_millis(10),
            max_rounds: 1_000_000,
        }
    }
}

impl LivelockConfig {
    /// Reject zero bounds
    pub fn validate(&self) -> Result<()> {
        if self.duration.is_zero() {
            return Err(HarnessError::invalid("livelock: duration must be positive"));
        }
        if self.sample_interval.is_zero() {
            return Err(HarnessError::invalid("livelock: sample_interval must be positive"));
        }
        if self.max_rounds == 0 {
            return Err(HarnessError::invalid("livelock: max_rounds must be positive"));
        }
        Ok(())
    }
}

/// Per-worker counters of one livelock run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoliteTally {
    /// Worker identifier
    pub id: WorkerId,
    /// Display name
    pub name: String,
    /// Units of work completed
    pub completed: u64,
    /// Times the worker gave way
    pub backoffs: u64,
    /// Rounds where both flags were up after the probe
    pub retries: u64,
}

/// Result of one livelock run
#[derive(Debug, Clone)]
pub struct LivelockOutcome {
    /// One tally per worker, in spawn order
    pub tallies: Vec<PoliteTally>,
    /// Whether any sample saw a worker in BLOCKED
    pub observed_blocked: bool,
    /// Number of snapshots taken
    pub samples: usize,
    /// Classification
    pub verdict: Verdict,
    /// How the workers ended
    pub exits: CrewOutcome,
    /// Wall time of the run
    pub elapsed: Duration,
}

impl LivelockOutcome {
    /// Fewest units completed by any worker
    pub fn min_completed(&self) -> u64 {
        self.tallies.iter().map(|t| t.completed).min().unwrap_or(0)
    }

    /// Units completed by all workers
    pub fn total_completed(&self) -> u64 {
        self.tallies.iter().map(|t| t.completed).sum()
    }

    /// Back-offs of all workers
    pub fn total_backoffs(&self) -> u64 {
        self.tallies.iter().map(|t| t.backoffs).sum()
    }

    /// Collisions of all workers
    pub fn total_retries(&self) -> u64 {
        self.tallies.iter().map(|t| t.retries).sum()
    }
}

/// Two flags, one per worker
#[derive(Debug, Default)]
struct PolitenessFlags([AtomicBool; 2]);

impl PolitenessFlags {
    fn is_raised(&self, idx: usize) -> bool {
        self.0[idx].load(Ordering::SeqCst)
    }

    fn raise(&self, idx: usize) -> RaisedFlag<'_> {
        self.0[idx].store(true, Ordering::SeqCst);
        RaisedFlag { flags: self, idx }
    }
}

/// Keeps a flag up until dropped
struct RaisedFlag<'a> {
    flags: &'a PolitenessFlags,
    idx: usize,
}

impl Drop for RaisedFlag<'_> {
    fn drop(&mut self) {
        self.flags.0[self.idx].store(false, Ordering::SeqCst);
    }
}

/// State shared by the polite workers
struct Hallway {
    flags: PolitenessFlags,
    /// Worker that goes first on a collision (guarded variant only)
    turn: AtomicUsize,
    rounds: Rendezvous,
}

impl Hallway {
    fn new(participants: usize) -> Self {
        Self {
            flags: PolitenessFlags::default(),
            turn: AtomicUsize::new(0),
            rounds: Rendezvous::new(participants),
        }
    }
}

#[derive(Debug, Default)]
struct TallyCell {
    completed: AtomicU64,
    backoffs: AtomicU64,
    retries: AtomicU64,
}

/// Run the livelock scenario with two polite workers
pub fn run(config: &LivelockConfig, variant: Variant, options: &RunOptions) -> Result<LivelockOutcome> {
    config.validate()?;
    info!(duration = ?config.duration, %variant, "livelock scenario started");
    let outcome = drive(config, variant, options, 2)?;
    info!(
        completed = outcome.total_completed(),
        backoffs = outcome.total_backoffs(),
        verdict = %outcome.verdict,
        "livelock scenario finished"
    );
    Ok(outcome)
}

/// Units one polite worker completes alone in `config.duration`
pub fn solo_baseline(config: &LivelockConfig, options: &RunOptions) -> Result<u64> {
    config.validate()?;
    let outcome = drive(config, Variant::Unguarded, options, 1)?;
    debug!(completed = outcome.total_completed(), "livelock solo baseline");
    Ok(outcome.total_completed())
}

fn drive(
    config: &LivelockConfig,
    variant: Variant,
    options: &RunOptions,
    participants: usize,
) -> Result<LivelockOutcome> {
    let registry = options.registry();
    let introspector = Introspector::new(Arc::clone(&registry));
    let hallway = Arc::new(Hallway::new(participants));
    let cells: Vec<Arc<TallyCell>> = (0..participants).map(|_| Arc::default()).collect();

    let start = Instant::now();
    let mut crew = Crew::new(Arc::clone(&registry));
    for (idx, cell) in cells.iter().enumerate() {
        let hallway = Arc::clone(&hallway);
        let cell = Arc::clone(cell);
        let config = config.clone();
        crew.spawn(format!("polite{}", idx + 1), "polite", move |ctx| {
            polite_loop(ctx, &config, variant, idx, &hallway, &cell)
        })?;
    }

    let stop_at = start + config.duration;
    let mut observed_blocked = false;
    let mut samples = 0;
    loop {
        let snapshot = introspector.capture_snapshot();
        samples += 1;
        observed_blocked |= snapshot.iter().any(|s| s.state.is_blocked());

        let now = Instant::now();
        if now >= stop_at || crew.all_finished() {
            break;
        }
        thread::sleep(config.sample_interval.min(stop_at - now));
    }

    crew.interrupt_all();
    let ids = crew.ids();
    let exits = crew.join_within(STOP_JOIN_BOUND)?;

    let tallies: Vec<PoliteTally> = ids
        .into_iter()
        .zip(&cells)
        .map(|(id, cell)| PoliteTally {
            id,
            name: registry.worker(id).map(|r| r.name).unwrap_or_default(),
            completed: cell.completed.load(Ordering::SeqCst),
            backoffs: cell.backoffs.load(Ordering::SeqCst),
            retries: cell.retries.load(Ordering::SeqCst),
        })
        .collect();

    let completed: u64 = tallies.iter().map(|t| t.completed).sum();
    let backoffs: u64 = tallies.iter().map(|t| t.backoffs).sum();
    let all_gave_way = tallies.iter().all(|t| t.backoffs > 0);
    let verdict = if all_gave_way && backoffs > WASTE_FACTOR * completed {
        Verdict::HazardReproduced
    } else {
        Verdict::NoHazard
    };

    Ok(LivelockOutcome {
        tallies,
        observed_blocked,
        samples,
        verdict,
        exits,
        elapsed: start.elapsed(),
    })
}

fn polite_loop(
    ctx: &WorkerContext,
    config: &LivelockConfig,
    variant: Variant,
    idx: usize,
    hallway: &Hallway,
    cell: &TallyCell,
) -> std::result::Result<(), Interrupted> {
    let peer = 1 - idx;
    let flags = &hallway.flags;

    for _ in 0..config.max_rounds {
        ctx.check()?;
        hallway.rounds.meet(ctx)?;

        let raised = flags.raise(idx);
        ctx.sleep(config.probe)?;
        if flags.is_raised(peer) {
            cell.retries.fetch_add(1, Ordering::Relaxed);
            let holds_turn =
                variant == Variant::Guarded && hallway.turn.load(Ordering::SeqCst) == idx;
            if !holds_turn {
                drop(raised);
                cell.backoffs.fetch_add(1, Ordering::Relaxed);
                ctx.sleep(config.backoff)?;
                if variant == Variant::Guarded {
                    // Sit out the peer's turn.
                    while flags.is_raised(peer) {
                        ctx.sleep(config.backoff)?;
                    }
                }
                continue;
            }
            while flags.is_raised(peer) {
                ctx.sleep(config.backoff)?;
            }
        }

        ctx.sleep(config.work)?;
        cell.completed.fetch_add(1, Ordering::Relaxed);
        if variant == Variant::Guarded {
            hallway.turn.store(peer, Ordering::SeqCst);
        }
        drop(raised);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::scenarios::WorkerExit;

    fn quick() -> LivelockConfig {
        LivelockConfig {
            duration: Duration::from_millis(200),
            ..LivelockConfig::default()
        }
    }

    #[test]
    fn test_raised_flag_lowers_on_drop() {
        let flags = PolitenessFlags::default();
        {
            let _raised = flags.raise(0);
            assert!(flags.is_raised(0));
            assert!(!flags.is_raised(1));
        }
        assert!(!flags.is_raised(0));
    }

    #[test]
    fn test_validate_rejects_zero_bounds() {
        let config = LivelockConfig {
            max_rounds: 0,
            ..LivelockConfig::default()
        };
        assert!(config.validate().is_err());
        assert!(LivelockConfig::default().validate().is_ok());
    }

    #[test]
    fn test_workers_never_block() {
        let outcome = run(&quick(), Variant::Unguarded, &RunOptions::default()).unwrap();
        assert_eq!(outcome.tallies.len(), 2);
        assert!(!outcome.observed_blocked);
        assert!(outcome.samples > 0);
        assert!(outcome.total_backoffs() > 0);
        assert!(outcome.exits.all_joined());
    }

    #[test]
    fn test_mirrored_workers_both_give_way() {
        let outcome = run(&quick(), Variant::Unguarded, &RunOptions::default()).unwrap();
        for tally in &outcome.tallies {
            assert!(tally.backoffs > 0, "{} never gave way", tally.name);
            assert!(tally.retries >= tally.backoffs);
        }
        assert!(outcome.total_backoffs() > WASTE_FACTOR * outcome.total_completed());
        assert_eq!(outcome.verdict, Verdict::HazardReproduced);
    }

    #[test]
    fn test_turn_alternates_between_workers() {
        let outcome = run(&quick(), Variant::Guarded, &RunOptions::default()).unwrap();
        let completed: Vec<u64> = outcome.tallies.iter().map(|t| t.completed).collect();
        assert!(completed.iter().all(|&c| c > 0), "completed {completed:?}");
        assert!(completed[0].abs_diff(completed[1]) <= completed[0].max(completed[1]) / 2 + 2);
        assert_eq!(outcome.verdict, Verdict::NoHazard);
    }

    #[test]
    fn test_solo_worker_makes_progress() {
        let completed = solo_baseline(&quick(), &RunOptions::default()).unwrap();
        assert!(completed > 0);
    }

    #[test]
    fn test_round_cap_ends_workers() {
        let config = LivelockConfig {
            duration: Duration::from_secs(5),
            probe: Duration::ZERO,
            work: Duration::ZERO,
            backoff: Duration::ZERO,
            max_rounds: 50,
            ..LivelockConfig::default()
        };
        let start = Instant::now();
        let outcome = run(&config, Variant::Unguarded, &RunOptions::default()).unwrap();
        assert!(start.elapsed() < Duration::from_secs(5));
        assert!(outcome.exits.exits.iter().all(|m| m.exit == WorkerExit::Completed));
    }
}
