//! Check-Then-Act
//!
//! Several workers increment a counter that must stop at `bound`. Between
//! the check (`value < bound`) and the increment each worker pauses
//! `window`, so near the bound several of them pass the check on the same
//! value and push the counter past it.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::info;

use super::shared::{BoundedCounter, GuardedCounter, UnguardedCounter};
use super::{classify, RUN_BOUND};
use crate::domain::scenarios::crew::{Crew, CrewOutcome};
use crate::domain::scenarios::{RunOptions, Variant, Verdict};
use crate::error::{HarnessError, Result};
use crate::infrastructure::config::millis;

/// Check-then-act parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckThenActConfig {
    /// Number of incrementing workers
    pub workers: usize,
    /// Attempts per worker
    pub iterations: u64,
    /// Value the counter must not exceed
    pub bound: u64,
    /// Pause between check and increment
    #[serde(with = "millis")]
    pub window: Duration,
}

impl Default for CheckThenActConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            iterations: 100,
            bound: 100,
            window: Duration::from_millis(1),
        }
    }
}

impl CheckThenActConfig {
    /// Reject parameters that cannot describe a run
    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(HarnessError::invalid("check-then-act: workers must be at least 1"));
        }
        if self.iterations == 0 {
            return Err(HarnessError::invalid("check-then-act: iterations must be at least 1"));
        }
        Ok(())
    }
}

/// Result of one check-then-act run
#[derive(Debug, Clone)]
pub struct CheckThenActOutcome {
    /// Counter value after all workers finished
    pub final_value: u64,
    /// Configured bound
    pub bound: u64,
    /// Increments the workers believe they performed
    pub increments: u64,
    /// Whether the counter ended above the bound
    pub overshoot: bool,
    /// Classification
    pub verdict: Verdict,
    /// How the workers ended
    pub exits: CrewOutcome,
    /// Wall time of the run
    pub elapsed: Duration,
}

impl CheckThenActOutcome {
    /// Increments that were overwritten by a concurrent store
    pub fn lost_updates(&self) -> u64 {
        self.increments.saturating_sub(self.final_value)
    }
}

/// Run the check-then-act scenario
pub fn run(
    config: &CheckThenActConfig,
    variant: Variant,
    options: &RunOptions,
) -> Result<CheckThenActOutcome> {
    config.validate()?;
    let registry = options.registry();
    let counter: Arc<dyn BoundedCounter> = match variant {
        Variant::Unguarded => Arc::new(UnguardedCounter::new(0)),
        Variant::Guarded => Arc::new(GuardedCounter::new(
            options.exclusive_lock(&registry, "counter-lock"),
            0,
        )),
    };
    let increments = Arc::new(AtomicU64::new(0));

    info!(workers = config.workers, bound = config.bound, %variant, "check-then-act scenario started");
    let start = Instant::now();
    let mut crew = Crew::new(Arc::clone(&registry));
    for i in 0..config.workers {
        let counter = Arc::clone(&counter);
        let increments = Arc::clone(&increments);
        let config = config.clone();
        crew.spawn(format!("incrementer{}", i + 1), "incrementer", move |ctx| {
            for _ in 0..config.iterations {
                ctx.check()?;
                if counter.increment_below(ctx, config.bound, config.window)? {
                    increments.fetch_add(1, Ordering::Relaxed);
                }
            }
            Ok(())
        })?;
    }
    let exits = crew.join_within(RUN_BOUND)?;

    let final_value = counter.value();
    let overshoot = final_value > config.bound;
    let verdict = classify(&exits, overshoot);
    info!(final_value, bound = config.bound, %verdict, "check-then-act scenario finished");

    Ok(CheckThenActOutcome {
        final_value,
        bound: config.bound,
        increments: increments.load(Ordering::Relaxed),
        overshoot,
        verdict,
        exits,
        elapsed: start.elapsed(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_worker_stops_at_bound() {
        let config = CheckThenActConfig {
            workers: 1,
            window: Duration::ZERO,
            ..CheckThenActConfig::default()
        };
        let outcome = run(&config, Variant::Unguarded, &RunOptions::default()).unwrap();
        assert_eq!(outcome.final_value, 100);
        assert_eq!(outcome.increments, 100);
        assert_eq!(outcome.verdict, Verdict::NoHazard);
    }

    #[test]
    fn test_guarded_counter_reaches_bound_exactly() {
        let config = CheckThenActConfig {
            window: Duration::ZERO,
            ..CheckThenActConfig::default()
        };
        let outcome = run(&config, Variant::Guarded, &RunOptions::default()).unwrap();
        assert_eq!(outcome.final_value, config.bound);
        assert!(!outcome.overshoot);
        assert_eq!(outcome.lost_updates(), 0);
    }

    #[test]
    fn test_zero_workers_rejected() {
        let config = CheckThenActConfig {
            workers: 0,
            ..CheckThenActConfig::default()
        };
        assert!(run(&config, Variant::Unguarded, &RunOptions::default()).is_err());
    }
}
