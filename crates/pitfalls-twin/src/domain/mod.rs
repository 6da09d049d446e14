//! Domain Layer
//!
//! # Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Domain Layer                             │
//! ├─────────────────────────────────────────────────────────────┤
//! │                                                             │
//! │  Worker Module                 Registry Module              │
//! │  ├─ WorkerId / LockId          ├─ Registry (DashMap)        │
//! │  ├─ WorkerState                ├─ DetailedRecorder          │
//! │  ├─ InterruptToken             └─ NoOpRecorder              │
//! │  └─ StartGate / Rendezvous                                  │
//! │                                                             │
//! │  Locks Module                  Introspect Module            │
//! │  ├─ ResourceLock               ├─ ThreadSnapshot            │
//! │  └─ RwResourceLock             └─ wait-for cycle detection  │
//! │                                                             │
//! │                    Scenarios Module                         │
//! │                    ├─ Crew                                  │
//! │                    ├─ deadlock / livelock                   │
//! │                    ├─ race (check-then-act, compound,       │
//! │                    │        toctou)                         │
//! │                    └─ starvation                            │
//! │                                                             │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Locks report every transition to the registry; the introspector only
//! ever reads it.

pub mod introspect;
pub mod locks;
pub mod registry;
pub mod scenarios;
pub mod worker;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Re-exports
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub use introspect::{
    CycleLink, DeadlockCycle, DetectionResult, Introspector, ThreadSnapshot, WaitForEdge,
    DEFAULT_DUMP_LIMIT,
};
pub use locks::{
    Fairness, LockConfig, ReadGuard, ResourceGuard, ResourceLock, RwPolicy, RwResourceLock,
    WriteGuard,
};
pub use registry::{Accounting, Contention, ContentionRecorder, LockKind, Registry};
pub use scenarios::{Crew, RunOptions, ScenarioKind, Variant, Verdict, WorkerExit};
pub use worker::{
    Interrupted, InterruptToken, LockId, Rendezvous, StartGate, WorkerContext, WorkerId,
    WorkerState,
};
