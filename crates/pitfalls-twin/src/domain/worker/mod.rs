//! Worker Module
//!
//! Identifiers, lifecycle states, cooperative interruption and
//! interruptible start/round synchronization for the threads a scenario
//! spawns.

pub mod context;
pub mod gate;
pub mod interrupt;
pub mod types;

pub use context::WorkerContext;
pub use gate::{Rendezvous, StartGate};
pub use interrupt::InterruptToken;
pub use types::{Interrupted, LockId, WorkerId, WorkerState};
