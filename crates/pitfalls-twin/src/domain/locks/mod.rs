//! Lock/Resource Primitives
//!
//! - `ResourceLock`: reentrant exclusive lock, fair (FIFO) or unfair
//! - `RwResourceLock`: read/write lock, reader- or writer-preferred
//!
//! Both block with interrupt polling and mirror every transition into the
//! worker registry.

pub mod exclusive;
pub mod rwlock;
pub mod types;

pub use exclusive::{ResourceGuard, ResourceLock};
pub use rwlock::{ReadGuard, RwResourceLock, WriteGuard};
pub use types::{Fairness, LockConfig, RwPolicy, DEFAULT_INTERRUPT_POLL};
