//! RwResourceLock - Read/Write Lock with a Configurable Admission Policy
//!
//! Invariant: either one writer holds the lock and there are no readers,
//! or any number of readers hold it and there is no writer.
//!
//! Not reentrant: a reader acquiring again adds a second read hold, and a
//! reader asking for the write lock waits for itself.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};
use tracing::trace;

use super::types::{RwPolicy, DEFAULT_INTERRUPT_POLL};
use crate::domain::registry::{LockKind, Registry};
use crate::domain::worker::{Interrupted, LockId, WorkerContext, WorkerId};

#[derive(Debug, Default)]
struct RwState {
    writer: Option<WorkerId>,
    readers: Vec<WorkerId>,
    waiting_writers: VecDeque<WorkerId>,
}

impl RwState {
    #[inline]
    fn admits_reader(&self, policy: RwPolicy) -> bool {
        self.writer.is_none()
            && match policy {
                RwPolicy::ReaderPreferred => true,
                RwPolicy::WriterPreferred => self.waiting_writers.is_empty(),
            }
    }

    #[inline]
    fn admits_writer(&self, worker: WorkerId) -> bool {
        self.writer.is_none()
            && self.readers.is_empty()
            && self.waiting_writers.front().map_or(true, |head| *head == worker)
    }
}

/// Named read/write lock
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use pitfalls_twin::domain::locks::{RwPolicy, RwResourceLock};
/// use pitfalls_twin::domain::registry::Registry;
/// use pitfalls_twin::domain::worker::WorkerContext;
///
/// let registry = Arc::new(Registry::detailed());
/// let lock = RwResourceLock::new(&registry, "table", RwPolicy::WriterPreferred);
///
/// let r1 = WorkerContext::new(registry.register_worker("r1", "reader"), "r1");
/// let r2 = WorkerContext::new(registry.register_worker("r2", "reader"), "r2");
///
/// let g1 = lock.acquire_read(&r1).unwrap();
/// let g2 = lock.acquire_read(&r2).unwrap();
/// assert_eq!(lock.reader_count(), 2);
/// drop((g1, g2));
/// assert_eq!(lock.reader_count(), 0);
/// ```
pub struct RwResourceLock {
    id: LockId,
    name: String,
    policy: RwPolicy,
    poll: Duration,
    state: Mutex<RwState>,
    changed: Condvar,
    registry: Arc<Registry>,
}

impl RwResourceLock {
    /// Create a lock and register it
    pub fn new(registry: &Arc<Registry>, name: impl Into<String>, policy: RwPolicy) -> Self {
        let name = name.into();
        let id = registry.register_lock(name.clone(), LockKind::ReadWrite);
        Self {
            id,
            name,
            policy,
            poll: DEFAULT_INTERRUPT_POLL,
            state: Mutex::new(RwState::default()),
            changed: Condvar::new(),
            registry: Arc::clone(registry),
        }
    }

    /// Override the interrupt poll interval
    pub fn with_poll(mut self, poll: Duration) -> Self {
        self.poll = poll.max(Duration::from_micros(100));
        self
    }

    /// Lock identifier
    #[inline(always)]
    pub fn id(&self) -> LockId {
        self.id
    }

    /// Display name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Admission policy
    pub fn policy(&self) -> RwPolicy {
        self.policy
    }

    /// Number of read holds
    pub fn reader_count(&self) -> usize {
        self.state.lock().readers.len()
    }

    /// Current writer, if any
    pub fn writer(&self) -> Option<WorkerId> {
        self.state.lock().writer
    }

    /// Block until a read hold is obtained
    pub fn acquire_read(&self, ctx: &WorkerContext) -> Result<ReadGuard<'_>, Interrupted> {
        ctx.check()?;
        let me = ctx.id();
        let mut st = self.state.lock();

        if !st.admits_reader(self.policy) {
            self.registry.on_wait(self.id, me);
            trace!(worker = %me, lock = %self.name, "reader waiting");
            loop {
                if let Err(interrupted) = ctx.check() {
                    self.registry.on_wait_abandoned(self.id, me);
                    return Err(interrupted);
                }
                if st.admits_reader(self.policy) {
                    break;
                }
                self.changed.wait_for(&mut st, self.poll);
            }
        }

        st.readers.push(me);
        self.registry.on_acquire(self.id, me);
        Ok(ReadGuard { lock: self, worker: me })
    }

    /// Take a read hold only if the policy admits one right now
    ///
    /// A worker may call this while it already holds a read hold, which
    /// lets a reader re-enter before it leaves.
    pub fn try_acquire_read(&self, ctx: &WorkerContext) -> Result<Option<ReadGuard<'_>>, Interrupted> {
        ctx.check()?;
        let me = ctx.id();
        let mut st = self.state.lock();
        if !st.admits_reader(self.policy) {
            return Ok(None);
        }
        st.readers.push(me);
        self.registry.on_acquire(self.id, me);
        Ok(Some(ReadGuard { lock: self, worker: me }))
    }

    /// Block until the write lock is obtained
    pub fn acquire_write(&self, ctx: &WorkerContext) -> Result<WriteGuard<'_>, Interrupted> {
        ctx.check()?;
        let me = ctx.id();
        let mut st = self.state.lock();

        if !st.admits_writer(me) {
            st.waiting_writers.push_back(me);
            self.registry.on_wait(self.id, me);
            trace!(worker = %me, lock = %self.name, readers = st.readers.len(), "writer waiting");
            loop {
                if let Err(interrupted) = ctx.check() {
                    st.waiting_writers.retain(|w| *w != me);
                    self.registry.on_wait_abandoned(self.id, me);
                    // Readers held back by this writer may proceed now.
                    self.changed.notify_all();
                    return Err(interrupted);
                }
                if st.admits_writer(me) {
                    st.waiting_writers.retain(|w| *w != me);
                    break;
                }
                self.changed.wait_for(&mut st, self.poll);
            }
        }

        st.writer = Some(me);
        self.registry.on_acquire(self.id, me);
        trace!(worker = %me, lock = %self.name, "writer acquired");
        Ok(WriteGuard { lock: self, worker: me })
    }

    fn release_read(&self, me: WorkerId) {
        let mut st = self.state.lock();
        if let Some(pos) = st.readers.iter().position(|r| *r == me) {
            st.readers.swap_remove(pos);
            self.registry.on_release(self.id, me);
            if st.readers.is_empty() {
                self.changed.notify_all();
            }
        }
    }

    fn release_write(&self, me: WorkerId) {
        let mut st = self.state.lock();
        if st.writer == Some(me) {
            st.writer = None;
            self.registry.on_release(self.id, me);
            self.changed.notify_all();
        }
    }
}

impl std::fmt::Debug for RwResourceLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RwResourceLock")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("policy", &self.policy)
            .finish()
    }
}

/// Read hold on an [`RwResourceLock`]; released on drop
#[must_use = "the read hold is released as soon as the guard is dropped"]
pub struct ReadGuard<'a> {
    lock: &'a RwResourceLock,
    worker: WorkerId,
}

impl ReadGuard<'_> {
    /// Release explicitly
    pub fn release(self) {
        drop(self);
    }
}

impl Drop for ReadGuard<'_> {
    fn drop(&mut self) {
        self.lock.release_read(self.worker);
    }
}

/// Write hold on an [`RwResourceLock`]; released on drop
#[must_use = "the write lock is released as soon as the guard is dropped"]
pub struct WriteGuard<'a> {
    lock: &'a RwResourceLock,
    worker: WorkerId,
}

impl WriteGuard<'_> {
    /// Release explicitly
    pub fn release(self) {
        drop(self);
    }
}

impl Drop for WriteGuard<'_> {
    fn drop(&mut self) {
        self.lock.release_write(self.worker);
    }
}
