//! Concurrency Pitfalls Harness
//!
//! # Overview
//!
//! `pitfalls-twin` reproduces the four classic multithreading hazards on
//! real OS threads and observes them from the outside:
//!
//! - **Deadlock**: workers acquiring locks in opposite orders
//! - **Livelock**: polite workers that keep giving way to each other
//! - **Race conditions**: check-then-act, compound operations, TOCTOU
//! - **Starvation**: a writer shut out by continuous readers
//!
//! Every scenario also has a guarded variant that applies the textbook
//! remedy, so both sides can be compared run by run.
//!
//! # Trinity Architecture
//!
//! - **Domain**: workers, locks, registry, introspection, scenario runners
//! - **Infrastructure**: JSON configuration
//! - **Adapters**: the harness driver and its reports
//!
//! # Introspection
//!
//! Locks mirror each ownership and wait transition into a per-run
//! [`Registry`]. The [`Introspector`] reads it back to dump worker states,
//! report blocked-time statistics and find cycles in the wait-for graph.
//!
//! # Usage
//!
//! ```no_run
//! use pitfalls_twin::{Harness, HarnessConfig, ScenarioKind, Variant};
//!
//! let harness = Harness::new(HarnessConfig::default()).unwrap();
//! let report = harness.run(ScenarioKind::Deadlock, Variant::Unguarded).unwrap();
//! println!("{report}");
//! ```

#![warn(clippy::all)]

// Trinity Architecture Layers
pub mod adapters;
pub mod domain;
pub mod error;
pub mod infrastructure;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Re-export Primary Types
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

// Workers and locks
pub use domain::{
    Fairness, Interrupted, InterruptToken, LockConfig, LockId, ResourceLock, RwPolicy,
    RwResourceLock, WorkerContext, WorkerId, WorkerState,
};

// Registry and introspection
pub use domain::{
    Accounting, Contention, DeadlockCycle, DetectionResult, Introspector, Registry,
    ThreadSnapshot, WaitForEdge,
};

// Scenarios
pub use domain::{Crew, RunOptions, ScenarioKind, Variant, Verdict, WorkerExit};

// Driver
pub use adapters::{Harness, RepeatSummary, ScenarioReport};
pub use error::{HarnessError, Result};
pub use infrastructure::HarnessConfig;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
