//! Starvation Scenario
//!
//! Readers keep a read/write lock continuously read-held: after each read a
//! reader takes its next read hold before letting go of the current one.
//! Under the reader-preferred policy that overlapping hold is always
//! admitted, the reader count never drops to zero and a waiting writer
//! waits out the whole bound. The writer-preferred policy refuses new
//! read holds while the writer waits, so readers drain and the writer gets
//! through as soon as the current holds end.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::crew::{Crew, CrewOutcome};
use super::{RunOptions, Variant, Verdict, STOP_JOIN_BOUND};
use crate::domain::introspect::Introspector;
use crate::domain::locks::RwPolicy;
use crate::domain::registry::Contention;
use crate::error::{HarnessError, Result};
use crate::infrastructure::config::millis;

/// Poll interval of the runner waiting for the writer
const WRITER_POLL: Duration = Duration::from_millis(5);

/// Starvation scenario parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StarvationConfig {
    /// Number of reader workers
    pub readers: usize,
    /// Time each read hold lasts
    #[serde(with = "millis")]
    pub read_hold: Duration,
    /// Pause of a reader whose overlapping read was refused, before it
    /// queues for a read hold again
    #[serde(with = "millis")]
    pub read_pause: Duration,
    /// Time each write hold lasts
    #[serde(with = "millis")]
    pub write_hold: Duration,
    /// Delay before the writer starts
    #[serde(with = "millis")]
    pub writer_delay: Duration,
    /// Writes the writer must complete
    pub required_writes: u64,
    /// Overall bound of the run
    #[serde(with = "millis")]
    pub bound: Duration,
}

impl Default for StarvationConfig {
    fn default() -> Self {
        Self {
            readers: 4,
            read_hold: Duration::from_millis(20),
            read_pause: Duration::from_millis(1),
            write_hold: Duration::from_millis(1),
            writer_delay: Duration::from_millis(50),
            required_writes: 3,
            bound: Duration::from_secs(5),
        }
    }
}

impl StarvationConfig {
    /// Reject parameters that cannot describe a run
    pub fn validate(&self) -> Result<()> {
        if self.readers == 0 {
            return Err(HarnessError::invalid("starvation: readers must be at least 1"));
        }
        if self.required_writes == 0 {
            return Err(HarnessError::invalid("starvation: required_writes must be at least 1"));
        }
        if self.bound.is_zero() {
            return Err(HarnessError::invalid("starvation: bound must be positive"));
        }
        Ok(())
    }

    /// Policy the given variant runs with
    pub fn policy_for(variant: Variant) -> RwPolicy {
        match variant {
            Variant::Unguarded => RwPolicy::ReaderPreferred,
            Variant::Guarded => RwPolicy::WriterPreferred,
        }
    }
}

/// Result of one starvation run
#[derive(Debug, Clone)]
pub struct StarvationOutcome {
    /// Admission policy of the lock
    pub policy: RwPolicy,
    /// Whether the writer finished all its writes
    pub writer_completed: bool,
    /// Writes completed
    pub writes_done: u64,
    /// Writes required
    pub required_writes: u64,
    /// Reads completed by all readers
    pub reads_done: u64,
    /// Blocked count and time of the writer
    pub writer_contention: Contention,
    /// Classification
    pub verdict: Verdict,
    /// How the workers ended
    pub exits: CrewOutcome,
    /// Wall time of the run
    pub elapsed: Duration,
}

/// Run the starvation scenario
///
/// `Variant::Unguarded` uses a reader-preferred lock, `Variant::Guarded` a
/// writer-preferred one.
pub fn run(config: &StarvationConfig, variant: Variant, options: &RunOptions) -> Result<StarvationOutcome> {
    config.validate()?;
    let policy = StarvationConfig::policy_for(variant);
    let registry = options.registry();
    let introspector = Introspector::new(Arc::clone(&registry));
    let lock = Arc::new(options.rw_lock(&registry, "shared-data", policy));
    let reads = Arc::new(AtomicU64::new(0));
    let writes = Arc::new(AtomicU64::new(0));

    info!(readers = config.readers, %policy, "starvation scenario started");
    let start = Instant::now();
    let deadline = start + config.bound;
    let mut crew = Crew::new(Arc::clone(&registry));

    let stagger = config.read_hold / config.readers as u32;
    for i in 0..config.readers {
        let lock = Arc::clone(&lock);
        let reads = Arc::clone(&reads);
        let config = config.clone();
        let offset = stagger * i as u32;
        crew.spawn(format!("reader{}", i + 1), "reader", move |ctx| {
            ctx.sleep(offset)?;
            let mut guard = lock.acquire_read(ctx)?;
            loop {
                ctx.sleep(config.read_hold)?;
                reads.fetch_add(1, Ordering::Relaxed);
                match lock.try_acquire_read(ctx)? {
                    Some(next) => {
                        guard.release();
                        guard = next;
                    }
                    None => {
                        guard.release();
                        ctx.sleep(config.read_pause)?;
                        guard = lock.acquire_read(ctx)?;
                    }
                }
            }
        })?;
    }

    let writer = {
        let lock = Arc::clone(&lock);
        let writes = Arc::clone(&writes);
        let config = config.clone();
        crew.spawn("writer", "writer", move |ctx| {
            ctx.sleep(config.writer_delay)?;
            for _ in 0..config.required_writes {
                let guard = lock.acquire_write(ctx)?;
                ctx.sleep(config.write_hold)?;
                guard.release();
                writes.fetch_add(1, Ordering::Relaxed);
            }
            Ok(())
        })?
    };

    while !crew.is_finished(writer) && Instant::now() < deadline {
        thread::sleep(WRITER_POLL);
    }
    let writer_contention = introspector.lock_contention_stats(writer)?;

    crew.interrupt_all();
    let exits = crew.join_within(STOP_JOIN_BOUND)?;

    let writes_done = writes.load(Ordering::Relaxed);
    let writer_completed = writes_done >= config.required_writes;
    let verdict = if writer_completed {
        Verdict::NoHazard
    } else {
        warn!(writes_done, required = config.required_writes, "writer starved");
        Verdict::HazardReproduced
    };
    let elapsed = start.elapsed();
    info!(writer_completed, writes_done, ?elapsed, "starvation scenario finished");

    Ok(StarvationOutcome {
        policy,
        writer_completed,
        writes_done,
        required_writes: config.required_writes,
        reads_done: reads.load(Ordering::Relaxed),
        writer_contention,
        verdict,
        exits,
        elapsed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::registry::Accounting;

    #[test]
    fn test_policy_mapping() {
        assert_eq!(StarvationConfig::policy_for(Variant::Unguarded), RwPolicy::ReaderPreferred);
        assert_eq!(StarvationConfig::policy_for(Variant::Guarded), RwPolicy::WriterPreferred);
    }

    #[test]
    fn test_writer_preferred_completes() {
        let config = StarvationConfig {
            bound: Duration::from_secs(3),
            ..StarvationConfig::default()
        };
        let outcome = run(&config, Variant::Guarded, &RunOptions::default()).unwrap();
        assert!(outcome.writer_completed);
        assert_eq!(outcome.writes_done, 3);
        assert_eq!(outcome.verdict, Verdict::NoHazard);
        assert!(outcome.writer_contention.blocked_count().is_some());
        assert!(outcome.exits.all_joined());
    }

    #[test]
    fn test_reader_preferred_never_lets_writer_in() {
        let config = StarvationConfig {
            readers: 2,
            bound: Duration::from_millis(500),
            ..StarvationConfig::default()
        };
        let outcome = run(&config, Variant::Unguarded, &RunOptions::default()).unwrap();
        assert_eq!(outcome.writes_done, 0);
        assert_eq!(outcome.verdict, Verdict::HazardReproduced);
        assert!(outcome.reads_done > 0);
        assert!(outcome.exits.all_joined());
    }

    #[test]
    fn test_unsupported_accounting_is_reported() {
        let options = RunOptions {
            accounting: Accounting::Disabled,
            ..RunOptions::default()
        };
        let config = StarvationConfig {
            readers: 1,
            bound: Duration::from_secs(2),
            ..StarvationConfig::default()
        };
        let outcome = run(&config, Variant::Guarded, &options).unwrap();
        assert_eq!(outcome.writer_contention, Contention::Unsupported);
    }
}
