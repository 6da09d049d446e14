//! Worker Registry & Contention Accounting
//!
//! # Architecture
//!
//! - `Registry`: per-run table of workers and locks (DashMap backed)
//! - `ContentionRecorder`: blocked-time accounting hooks
//!   - `DetailedRecorder`: counts waits and accumulates blocked time
//!   - `NoOpRecorder`: accounting disabled, queries report `Unsupported`

pub mod detailed;
pub mod noop;
pub mod recorder;
pub mod table;

pub use detailed::DetailedRecorder;
pub use noop::NoOpRecorder;
pub use recorder::{Accounting, Contention, ContentionRecorder};
pub use table::{LockKind, LockRecord, Registry, WorkerRecord};
