//! ResourceLock - Reentrant Exclusive Lock
//!
//! # Design
//!
//! The logical lock state (owner, hold depth, FIFO queue) lives behind a
//! `parking_lot::Mutex` and waiters park on a `Condvar`. Waits are bounded
//! by the interrupt poll interval so a deadlocked waiter notices an
//! interrupt request without anyone having to release the lock it wants.
//!
//! Every transition is mirrored into the [`Registry`] while the state mutex
//! is held.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};
use tracing::trace;

use super::types::{Fairness, DEFAULT_INTERRUPT_POLL};
use crate::domain::registry::{LockKind, Registry};
use crate::domain::worker::{Interrupted, LockId, WorkerContext, WorkerId};

#[derive(Debug, Default)]
struct ExclusiveState {
    owner: Option<WorkerId>,
    depth: u32,
    queue: VecDeque<WorkerId>,
}

impl ExclusiveState {
    #[inline]
    fn can_take(&self, worker: WorkerId, fairness: Fairness) -> bool {
        self.owner.is_none()
            && match fairness {
                Fairness::Unfair => true,
                Fairness::Fair => self.queue.front().map_or(true, |head| *head == worker),
            }
    }
}

/// Named, reentrant, exclusive lock
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use pitfalls_twin::domain::locks::{Fairness, ResourceLock};
/// use pitfalls_twin::domain::registry::Registry;
/// use pitfalls_twin::domain::worker::WorkerContext;
///
/// let registry = Arc::new(Registry::detailed());
/// let lock = ResourceLock::new(&registry, "lock-1", Fairness::Fair);
///
/// let id = registry.register_worker("main", "demo");
/// let ctx = WorkerContext::new(id, "main");
///
/// let outer = lock.acquire(&ctx).unwrap();
/// let inner = lock.acquire(&ctx).unwrap(); // reentrant
/// assert_eq!(lock.holder(), Some(id));
/// drop(inner);
/// outer.release();
/// assert_eq!(lock.holder(), None);
/// ```
pub struct ResourceLock {
    id: LockId,
    name: String,
    fairness: Fairness,
    poll: Duration,
    state: Mutex<ExclusiveState>,
    available: Condvar,
    registry: Arc<Registry>,
}

impl ResourceLock {
    /// Create a lock and register it
    pub fn new(registry: &Arc<Registry>, name: impl Into<String>, fairness: Fairness) -> Self {
        let name = name.into();
        let id = registry.register_lock(name.clone(), LockKind::Exclusive);
        Self {
            id,
            name,
            fairness,
            poll: DEFAULT_INTERRUPT_POLL,
            state: Mutex::new(ExclusiveState::default()),
            available: Condvar::new(),
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

    /// Fairness policy
    pub fn fairness(&self) -> Fairness {
        self.fairness
    }

    /// Current owner, if any
    pub fn holder(&self) -> Option<WorkerId> {
        self.state.lock().owner
    }

    /// Reentrant hold depth of the current owner
    pub fn hold_count(&self) -> u32 {
        self.state.lock().depth
    }

    /// Number of queued waiters
    pub fn queue_len(&self) -> usize {
        self.state.lock().queue.len()
    }

    /// Block until the lock is obtained or the worker is interrupted
    ///
    /// # Errors
    ///
    /// `Interrupted` if the worker's token fires before or while waiting.
    /// The waiter is removed from the queue before returning.
    pub fn acquire(&self, ctx: &WorkerContext) -> Result<ResourceGuard<'_>, Interrupted> {
        ctx.check()?;
        let me = ctx.id();
        let mut st = self.state.lock();

        if st.owner == Some(me) {
            st.depth += 1;
            return Ok(ResourceGuard { lock: self, worker: me });
        }

        if st.can_take(me, self.fairness) {
            self.take(&mut st, me);
            return Ok(ResourceGuard { lock: self, worker: me });
        }

        st.queue.push_back(me);
        self.registry.on_wait(self.id, me);
        trace!(worker = %me, lock = %self.name, owner = ?st.owner, "waiting");

        loop {
            if let Err(interrupted) = ctx.check() {
                st.queue.retain(|w| *w != me);
                self.registry.on_wait_abandoned(self.id, me);
                // The queue head may have changed.
                self.available.notify_all();
                return Err(interrupted);
            }

            if st.can_take(me, self.fairness) {
                st.queue.retain(|w| *w != me);
                self.take(&mut st, me);
                return Ok(ResourceGuard { lock: self, worker: me });
            }

            self.available.wait_for(&mut st, self.poll);
        }
    }

    fn take(&self, st: &mut ExclusiveState, me: WorkerId) {
        st.owner = Some(me);
        st.depth = 1;
        self.registry.on_acquire(self.id, me);
        trace!(worker = %me, lock = %self.name, "acquired");
    }

    fn release_hold(&self, me: WorkerId) {
        let mut st = self.state.lock();
        if st.owner != Some(me) {
            return;
        }
        st.depth = st.depth.saturating_sub(1);
        if st.depth == 0 {
            st.owner = None;
            self.registry.on_release(self.id, me);
            trace!(worker = %me, lock = %self.name, "released");
            self.available.notify_all();
        }
    }
}

impl std::fmt::Debug for ResourceLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceLock")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("fairness", &self.fairness)
            .finish()
    }
}

/// One hold on a [`ResourceLock`]; released on drop
#[must_use = "the lock is released as soon as the guard is dropped"]
pub struct ResourceGuard<'a> {
    lock: &'a ResourceLock,
    worker: WorkerId,
}

impl ResourceGuard<'_> {
    /// Release this hold explicitly
    pub fn release(self) {
        drop(self);
    }

    /// Worker holding this guard
    pub fn worker(&self) -> WorkerId {
        self.worker
    }
}

impl Drop for ResourceGuard<'_> {
    fn drop(&mut self) {
        self.lock.release_hold(self.worker);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::worker::WorkerState;
    use std::thread;
    use std::time::Instant;

    fn context(registry: &Registry, name: &str) -> WorkerContext {
        let id = registry.register_worker(name, "test");
        WorkerContext::new(id, name)
    }

    #[test]
    fn test_reentrant_acquire() {
        let registry = Arc::new(Registry::detailed());
        let lock = ResourceLock::new(&registry, "lock", Fairness::Fair);
        let ctx = context(&registry, "a");

        let g1 = lock.acquire(&ctx).unwrap();
        let g2 = lock.acquire(&ctx).unwrap();
        assert_eq!(lock.hold_count(), 2);
        drop(g2);
        assert_eq!(lock.holder(), Some(ctx.id()));
        drop(g1);
        assert_eq!(lock.holder(), None);
        assert!(registry.lock(lock.id()).unwrap().holders.is_empty());
    }

    #[test]
    fn test_waiter_blocks_until_release() {
        let registry = Arc::new(Registry::detailed());
        let lock = Arc::new(ResourceLock::new(&registry, "lock", Fairness::Fair));
        let a = context(&registry, "a");
        let b = context(&registry, "b");
        let b_id = b.id();

        let guard = lock.acquire(&a).unwrap();

        let lock2 = Arc::clone(&lock);
        let handle = thread::spawn(move || {
            let g = lock2.acquire(&b).unwrap();
            g.worker()
        });

        // Wait for b to show up as blocked
        let start = Instant::now();
        while registry.worker(b_id).unwrap().state != WorkerState::Blocked {
            assert!(start.elapsed() < Duration::from_secs(5));
            thread::sleep(Duration::from_millis(1));
        }
        assert_eq!(lock.queue_len(), 1);

        drop(guard);
        assert_eq!(handle.join().unwrap(), b_id);
        assert_eq!(registry.worker(b_id).unwrap().waiting_on, None);
        assert_eq!(registry.contention(b_id).unwrap().blocked_count(), Some(1));
    }

    #[test]
    fn test_interrupt_unblocks_waiter() {
        let registry = Arc::new(Registry::detailed());
        let lock = Arc::new(ResourceLock::new(&registry, "lock", Fairness::Fair));
        let a = context(&registry, "a");
        let b = context(&registry, "b");
        let b_token = b.token().clone();

        let _guard = lock.acquire(&a).unwrap();

        let lock2 = Arc::clone(&lock);
        let handle = thread::spawn(move || lock2.acquire(&b).map(|g| g.worker()));

        thread::sleep(Duration::from_millis(20));
        b_token.interrupt();

        let result = handle.join().unwrap();
        assert!(result.is_err());
        assert_eq!(lock.queue_len(), 0);
        assert_eq!(lock.holder(), Some(a.id()));
    }

    #[test]
    fn test_fair_lock_serves_fifo() {
        let registry = Arc::new(Registry::detailed());
        let lock = Arc::new(ResourceLock::new(&registry, "lock", Fairness::Fair));
        let owner = context(&registry, "owner");
        let order = Arc::new(parking_lot::Mutex::new(Vec::new()));

        let guard = lock.acquire(&owner).unwrap();

        let mut handles = Vec::new();
        for i in 0..3 {
            let ctx = context(&registry, &format!("w{i}"));
            let worker_lock = Arc::clone(&lock);
            let order = Arc::clone(&order);
            handles.push(thread::spawn(move || {
                let _g = worker_lock.acquire(&ctx).unwrap();
                order.lock().push(i);
            }));
            // Let each waiter enqueue before the next one starts
            let start = Instant::now();
            while lock.queue_len() < i + 1 {
                assert!(start.elapsed() < Duration::from_secs(5));
                thread::sleep(Duration::from_millis(1));
            }
        }

        drop(guard);
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(*order.lock(), vec![0, 1, 2]);
    }

    #[test]
    fn test_unfair_newcomer_barges_past_queue() {
        let registry = Arc::new(Registry::detailed());
        let unfair = ResourceLock::new(&registry, "unfair", Fairness::Unfair);
        let fair = ResourceLock::new(&registry, "fair", Fairness::Fair);
        let queued = registry.register_worker("queued", "test");
        let newcomer = context(&registry, "newcomer");

        unfair.state.lock().queue.push_back(queued);
        fair.state.lock().queue.push_back(queued);
        assert!(!fair.state.lock().can_take(newcomer.id(), Fairness::Fair));

        let guard = unfair.acquire(&newcomer).unwrap();
        assert_eq!(unfair.holder(), Some(newcomer.id()));
        assert_eq!(unfair.queue_len(), 1);
        drop(guard);
        assert_eq!(unfair.holder(), None);
    }

    #[test]
    fn test_unfair_lock_still_excludes() {
        use std::sync::atomic::{AtomicU64, Ordering};

        let registry = Arc::new(Registry::detailed());
        let lock = Arc::new(ResourceLock::new(&registry, "lock", Fairness::Unfair));
        let count = Arc::new(AtomicU64::new(0));

        let handles: Vec<_> = (0..4)
            .map(|i| {
                let ctx = context(&registry, &format!("w{i}"));
                let lock = Arc::clone(&lock);
                let count = Arc::clone(&count);
                thread::spawn(move || {
                    for _ in 0..200 {
                        let _guard = lock.acquire(&ctx).unwrap();
                        let seen = count.load(Ordering::SeqCst);
                        thread::yield_now();
                        count.store(seen + 1, Ordering::SeqCst);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(count.load(Ordering::SeqCst), 800);
        assert_eq!(lock.holder(), None);
        assert_eq!(lock.queue_len(), 0);
    }
}
