//! Deadlock Scenario
//!
//! Workers acquire a set of locks in configurable orders, sleeping `dwell`
//! after each acquisition. With opposite orders (`[[0,1],[1,0]]`) each
//! worker ends up holding one lock while waiting for the other.
//!
//! The runner never relies on a timeout to call something a deadlock: it
//! polls the wait-for graph and only reports a cycle it saw twice in a row
//! with the same members. On detection it captures a thread dump and
//! interrupts every worker so the run always terminates.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::crew::{Crew, CrewOutcome};
use super::{RunOptions, Variant, Verdict};
use crate::domain::introspect::{DeadlockCycle, DetectionResult, Introspector, ThreadSnapshot};
use crate::domain::locks::ResourceLock;
use crate::error::{HarnessError, Result};
use crate::infrastructure::config::millis;

/// Minimum join bound once workers have been interrupted
const MIN_JOIN: Duration = Duration::from_millis(250);

/// Deadlock scenario parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeadlockConfig {
    /// Number of locks
    pub lock_count: usize,
    /// Per-worker acquisition order, as indices into the locks
    pub orders: Vec<Vec<usize>>,
    /// Hold time before requesting the next lock
    #[serde(with = "millis")]
    pub dwell: Duration,
    /// Wait before the first detection pass
    #[serde(with = "millis")]
    pub grace: Duration,
    /// Pause between detection passes
    #[serde(with = "millis")]
    pub detect_interval: Duration,
    /// Overall bound of the run
    #[serde(with = "millis")]
    pub timeout: Duration,
}

impl Default for DeadlockConfig {
    fn default() -> Self {
        Self {
            lock_count: 2,
            orders: vec![vec![0, 1], vec![1, 0]],
            dwell: Duration::from_millis(100),
            grace: Duration::from_millis(300),
            detect_interval: Duration::from_millis(10),
            timeout: Duration::from_secs(5),
        }
    }
}

impl DeadlockConfig {
    /// Default configuration with a consistent global lock order
    pub fn ordered() -> Self {
        Self::default().into_ordered()
    }

    /// Same configuration with every worker acquiring in ascending order
    pub fn into_ordered(mut self) -> Self {
        for order in &mut self.orders {
            order.sort_unstable();
        }
        self
    }

    /// Configuration the given variant actually runs
    pub fn for_variant(&self, variant: Variant) -> Self {
        match variant {
            Variant::Unguarded => self.clone(),
            Variant::Guarded => self.clone().into_ordered(),
        }
    }

    /// Reject malformed orders and zero intervals
    pub fn validate(&self) -> Result<()> {
        if self.lock_count == 0 {
            return Err(HarnessError::invalid("deadlock: lock_count must be at least 1"));
        }
        if self.orders.is_empty() {
            return Err(HarnessError::invalid("deadlock: orders must not be empty"));
        }
        for (worker, order) in self.orders.iter().enumerate() {
            if order.is_empty() {
                return Err(HarnessError::invalid(format!(
                    "deadlock: order of worker {worker} is empty"
                )));
            }
            let mut seen = vec![false; self.lock_count];
            for &idx in order {
                let slot = seen.get_mut(idx).ok_or_else(|| {
                    HarnessError::invalid(format!(
                        "deadlock: worker {worker} references lock {idx}, only {} exist",
                        self.lock_count
                    ))
                })?;
                if *slot {
                    return Err(HarnessError::invalid(format!(
                        "deadlock: worker {worker} acquires lock {idx} twice"
                    )));
                }
                *slot = true;
            }
        }
        if self.detect_interval.is_zero() {
            return Err(HarnessError::invalid("deadlock: detect_interval must be positive"));
        }
        if self.timeout.is_zero() {
            return Err(HarnessError::invalid("deadlock: timeout must be positive"));
        }
        Ok(())
    }
}

/// Result of one deadlock run
#[derive(Debug, Clone)]
pub struct DeadlockOutcome {
    /// Last detection result
    pub detection: DetectionResult,
    /// Classification
    pub verdict: Verdict,
    /// Thread snapshot taken before workers were interrupted
    pub dump: Vec<ThreadSnapshot>,
    /// How the workers ended
    pub exits: CrewOutcome,
    /// Names of the locks, in index order
    pub lock_names: Vec<String>,
    /// Wall time of the run
    pub elapsed: Duration,
}

impl DeadlockOutcome {
    /// Detected cycle, if any
    pub fn cycle(&self) -> Option<&DeadlockCycle> {
        self.detection.cycle()
    }
}

/// Run the deadlock scenario
///
/// `Variant::Guarded` runs the same workers with a consistent lock order.
pub fn run(config: &DeadlockConfig, variant: Variant, options: &RunOptions) -> Result<DeadlockOutcome> {
    let config = config.for_variant(variant);
    config.validate()?;

    let registry = options.registry();
    let introspector = Introspector::new(Arc::clone(&registry));
    let locks: Arc<Vec<ResourceLock>> = Arc::new(
        (0..config.lock_count)
            .map(|i| options.exclusive_lock(&registry, format!("lock-{}", i + 1)))
            .collect(),
    );
    let lock_names = locks.iter().map(|l| l.name().to_string()).collect();

    info!(
        workers = config.orders.len(),
        locks = config.lock_count,
        %variant,
        "deadlock scenario started"
    );
    let start = Instant::now();
    let deadline = start + config.timeout;

    let mut crew = Crew::new(Arc::clone(&registry));
    for (i, order) in config.orders.iter().enumerate() {
        let locks = Arc::clone(&locks);
        let order = order.clone();
        let dwell = config.dwell;
        crew.spawn(format!("method{}", i + 1), "locker", move |ctx| {
            let mut held = Vec::with_capacity(order.len());
            for idx in order {
                held.push(locks[idx].acquire(ctx)?);
                ctx.sleep(dwell)?;
            }
            while let Some(guard) = held.pop() {
                guard.release();
            }
            Ok(())
        })?;
    }

    thread::sleep(config.grace.min(config.timeout));

    let (verdict, cycle) = loop {
        if let Some(cycle) = confirmed_cycle(&introspector, config.detect_interval) {
            break (Verdict::HazardReproduced, Some(cycle));
        }
        if crew.all_finished() {
            break (Verdict::NoHazard, None);
        }
        if Instant::now() >= deadline {
            break (Verdict::Inconclusive, None);
        }
        thread::sleep(config.detect_interval);
    };

    let dump = if verdict == Verdict::NoHazard {
        Vec::new()
    } else {
        introspector.capture_snapshot()
    };

    crew.interrupt_all();
    let remaining = deadline.saturating_duration_since(Instant::now());
    let exits = crew.join_within(remaining.max(MIN_JOIN))?;

    let elapsed = start.elapsed();
    match (&cycle, verdict) {
        (Some(cycle), _) => info!(%cycle, ?elapsed, "deadlock detected"),
        (None, Verdict::Inconclusive) => {
            warn!(timeout = ?config.timeout, "deadlock scenario inconclusive")
        }
        _ => info!(?elapsed, "deadlock scenario finished without a cycle"),
    }

    Ok(DeadlockOutcome {
        detection: cycle.map_or(DetectionResult::NoDeadlock, DetectionResult::Deadlock),
        verdict,
        dump,
        exits,
        lock_names,
        elapsed,
    })
}

/// Detect a cycle and confirm it with a second pass one interval later
fn confirmed_cycle(introspector: &Introspector, interval: Duration) -> Option<DeadlockCycle> {
    let first = introspector.detect_deadlock();
    let first = first.cycle()?;

    thread::sleep(interval);
    match introspector.detect_deadlock() {
        DetectionResult::Deadlock(again) if same_members(first, &again) => Some(again),
        _ => None,
    }
}

fn same_members(a: &DeadlockCycle, b: &DeadlockCycle) -> bool {
    let mut left = a.workers();
    let mut right = b.workers();
    left.sort_unstable();
    right.sort_unstable();
    left == right
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = DeadlockConfig::default();
        assert_eq!(config.lock_count, 2);
        assert_eq!(config.orders, vec![vec![0, 1], vec![1, 0]]);
        assert_eq!(config.dwell, Duration::from_millis(100));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_ordered_sorts_every_order() {
        assert_eq!(DeadlockConfig::ordered().orders, vec![vec![0, 1], vec![0, 1]]);
        let guarded = DeadlockConfig::default().for_variant(Variant::Guarded);
        assert_eq!(guarded, DeadlockConfig::ordered());
    }

    #[test]
    fn test_malformed_orders_rejected() {
        let mut config = DeadlockConfig::default();
        config.orders = vec![];
        assert!(matches!(config.validate(), Err(HarnessError::InvalidConfig(_))));

        config.orders = vec![vec![0, 2]];
        assert!(config.validate().is_err());

        config.orders = vec![vec![1, 1]];
        assert!(config.validate().is_err());

        config.orders = vec![vec![0], vec![]];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_config_aborts_run() {
        let config = DeadlockConfig {
            lock_count: 0,
            ..DeadlockConfig::default()
        };
        let result = run(&config, Variant::Unguarded, &RunOptions::default());
        assert!(matches!(result, Err(HarnessError::InvalidConfig(_))));
    }

    #[test]
    fn test_single_worker_never_deadlocks() {
        let config = DeadlockConfig {
            orders: vec![vec![0, 1]],
            dwell: Duration::from_millis(5),
            grace: Duration::from_millis(5),
            ..DeadlockConfig::default()
        };
        let outcome = run(&config, Variant::Unguarded, &RunOptions::default()).unwrap();
        assert_eq!(outcome.verdict, Verdict::NoHazard);
        assert!(outcome.cycle().is_none());
        assert!(outcome.exits.all_joined());
    }
}
