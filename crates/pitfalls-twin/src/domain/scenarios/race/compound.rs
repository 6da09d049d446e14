//! Compound Operation
//!
//! One worker bumps counter `a`, pauses `window`, then bumps counter `b`.
//! A second worker keeps reading the pair. Without a lock around both
//! steps the reader sees `a != b` whenever it lands inside the window.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::info;

use super::shared::{CounterPair, GuardedPair, UnguardedPair};
use super::{classify, RUN_BOUND};
use crate::domain::scenarios::crew::{Crew, CrewOutcome};
use crate::domain::scenarios::{RunOptions, Variant, Verdict};
use crate::error::{HarnessError, Result};
use crate::infrastructure::config::millis;

/// Compound-operation parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompoundConfig {
    /// Pair updates performed by the incrementer
    pub increments: u64,
    /// Pair reads performed by the checker
    pub checks: u64,
    /// Pause between the two halves of an update
    #[serde(with = "millis")]
    pub window: Duration,
    /// Pause between two reads of the checker
    #[serde(with = "millis")]
    pub check_pause: Duration,
}

impl Default for CompoundConfig {
    fn default() -> Self {
        Self {
            increments: 1000,
            checks: 1000,
            window: Duration::from_micros(50),
            check_pause: Duration::from_micros(50),
        }
    }
}

impl CompoundConfig {
    /// Reject parameters that cannot describe a run
    pub fn validate(&self) -> Result<()> {
        if self.increments == 0 || self.checks == 0 {
            return Err(HarnessError::invalid(
                "compound: increments and checks must be at least 1",
            ));
        }
        Ok(())
    }
}

/// Result of one compound-operation run
#[derive(Debug, Clone)]
pub struct CompoundOutcome {
    /// Final value of `a`
    pub a: u64,
    /// Final value of `b`
    pub b: u64,
    /// Reads performed
    pub checks: u64,
    /// Reads where `a != b`
    pub inconsistencies: u64,
    /// Classification
    pub verdict: Verdict,
    /// How the workers ended
    pub exits: CrewOutcome,
    /// Wall time of the run
    pub elapsed: Duration,
}

/// Run the compound-operation scenario
pub fn run(config: &CompoundConfig, variant: Variant, options: &RunOptions) -> Result<CompoundOutcome> {
    config.validate()?;
    let registry = options.registry();
    let pair: Arc<dyn CounterPair> = match variant {
        Variant::Unguarded => Arc::new(UnguardedPair::new()),
        Variant::Guarded => Arc::new(GuardedPair::new(options.exclusive_lock(&registry, "pair-lock"))),
    };
    let checks = Arc::new(AtomicU64::new(0));
    let inconsistencies = Arc::new(AtomicU64::new(0));

    info!(increments = config.increments, checks = config.checks, %variant, "compound scenario started");
    let start = Instant::now();
    let mut crew = Crew::new(Arc::clone(&registry));

    {
        let pair = Arc::clone(&pair);
        let config = config.clone();
        crew.spawn("incrementer", "incrementer", move |ctx| {
            for _ in 0..config.increments {
                ctx.check()?;
                pair.bump(ctx, config.window)?;
            }
            Ok(())
        })?;
    }
    {
        let pair = Arc::clone(&pair);
        let checks = Arc::clone(&checks);
        let inconsistencies = Arc::clone(&inconsistencies);
        let config = config.clone();
        crew.spawn("checker", "checker", move |ctx| {
            for _ in 0..config.checks {
                let (a, b) = pair.read(ctx)?;
                checks.fetch_add(1, Ordering::Relaxed);
                if a != b {
                    inconsistencies.fetch_add(1, Ordering::Relaxed);
                }
                ctx.sleep(config.check_pause)?;
            }
            Ok(())
        })?;
    }
    let exits = crew.join_within(RUN_BOUND)?;

    let seen = inconsistencies.load(Ordering::Relaxed);
    let verdict = classify(&exits, seen > 0);
    let (a, b) = pair.totals();
    info!(inconsistencies = seen, %verdict, "compound scenario finished");

    Ok(CompoundOutcome {
        a,
        b,
        checks: checks.load(Ordering::Relaxed),
        inconsistencies: seen,
        verdict,
        exits,
        elapsed: start.elapsed(),
    })
}
