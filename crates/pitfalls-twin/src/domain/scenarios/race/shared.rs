//! Shared State for Race Scenarios
//!
//! Every `Unguarded*` type reads and writes its atomics with a separate
//! load and store, never an atomic read-modify-write, so concurrent updates
//! can interleave exactly as unsynchronized code would. Every `Guarded*`
//! type wraps the same storage in a [`ResourceLock`] and performs the whole
//! check-and-act under it.

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::time::Duration;

use crate::domain::locks::ResourceLock;
use crate::domain::worker::{Interrupted, WorkerContext};

type Step<T> = std::result::Result<T, Interrupted>;

/// Non-atomic increment: read, then write back
#[inline]
fn racy_increment(cell: &AtomicU64) {
    let current = cell.load(Ordering::SeqCst);
    cell.store(current + 1, Ordering::SeqCst);
}

/// Non-atomic debit: read, then write back
///
/// Wraps on overflow; interleaved debits may undershoot any bound.
#[inline]
fn racy_debit(cell: &AtomicI64, amount: i64) {
    let current = cell.load(Ordering::SeqCst);
    cell.store(current.wrapping_sub(amount), Ordering::SeqCst);
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Check-Then-Act
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Counter that must never exceed a bound
pub trait BoundedCounter: Send + Sync {
    /// Increment if the value is below `bound`, pausing `window` between
    /// the check and the increment. Returns whether it incremented.
    fn increment_below(&self, ctx: &WorkerContext, bound: u64, window: Duration) -> Step<bool>;

    /// Current value
    fn value(&self) -> u64;
}

/// Bounded counter without synchronization
#[derive(Debug, Default)]
pub struct UnguardedCounter {
    value: AtomicU64,
}

impl UnguardedCounter {
    /// Counter starting at `initial`
    pub fn new(initial: u64) -> Self {
        Self {
            value: AtomicU64::new(initial),
        }
    }
}

impl BoundedCounter for UnguardedCounter {
    fn increment_below(&self, ctx: &WorkerContext, bound: u64, window: Duration) -> Step<bool> {
        if self.value.load(Ordering::SeqCst) >= bound {
            return Ok(false);
        }
        ctx.sleep(window)?;
        racy_increment(&self.value);
        Ok(true)
    }

    fn value(&self) -> u64 {
        self.value.load(Ordering::SeqCst)
    }
}

/// Bounded counter whose check and increment share one lock hold
#[derive(Debug)]
pub struct GuardedCounter {
    lock: ResourceLock,
    value: AtomicU64,
}

impl GuardedCounter {
    /// Counter starting at `initial`, guarded by `lock`
    pub fn new(lock: ResourceLock, initial: u64) -> Self {
        Self {
            lock,
            value: AtomicU64::new(initial),
        }
    }
}

impl BoundedCounter for GuardedCounter {
    fn increment_below(&self, ctx: &WorkerContext, bound: u64, window: Duration) -> Step<bool> {
        let _guard = self.lock.acquire(ctx)?;
        if self.value.load(Ordering::SeqCst) >= bound {
            return Ok(false);
        }
        ctx.sleep(window)?;
        racy_increment(&self.value);
        Ok(true)
    }

    fn value(&self) -> u64 {
        self.value.load(Ordering::SeqCst)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Compound Operation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Two counters that should always be equal
pub trait CounterPair: Send + Sync {
    /// Increment `a`, pause `window`, increment `b`
    fn bump(&self, ctx: &WorkerContext, window: Duration) -> Step<()>;

    /// Read `(a, b)`
    fn read(&self, ctx: &WorkerContext) -> Step<(u64, u64)>;

    /// Final `(a, b)` once every writer is done
    fn totals(&self) -> (u64, u64);
}

/// Counter pair without synchronization
#[derive(Debug, Default)]
pub struct UnguardedPair {
    a: AtomicU64,
    b: AtomicU64,
}

impl UnguardedPair {
    /// Pair starting at zero
    pub fn new() -> Self {
        Self::default()
    }
}

impl CounterPair for UnguardedPair {
    fn bump(&self, ctx: &WorkerContext, window: Duration) -> Step<()> {
        racy_increment(&self.a);
        ctx.sleep(window)?;
        racy_increment(&self.b);
        Ok(())
    }

    fn read(&self, _ctx: &WorkerContext) -> Step<(u64, u64)> {
        let a = self.a.load(Ordering::SeqCst);
        let b = self.b.load(Ordering::SeqCst);
        Ok((a, b))
    }

    fn totals(&self) -> (u64, u64) {
        (self.a.load(Ordering::SeqCst), self.b.load(Ordering::SeqCst))
    }
}

/// Counter pair updated and read under one lock
#[derive(Debug)]
pub struct GuardedPair {
    lock: ResourceLock,
    a: AtomicU64,
    b: AtomicU64,
}

impl GuardedPair {
    /// Pair starting at zero, guarded by `lock`
    pub fn new(lock: ResourceLock) -> Self {
        Self {
            lock,
            a: AtomicU64::new(0),
            b: AtomicU64::new(0),
        }
    }
}

impl CounterPair for GuardedPair {
    fn bump(&self, ctx: &WorkerContext, window: Duration) -> Step<()> {
        let _guard = self.lock.acquire(ctx)?;
        racy_increment(&self.a);
        ctx.sleep(window)?;
        racy_increment(&self.b);
        Ok(())
    }

    fn read(&self, ctx: &WorkerContext) -> Step<(u64, u64)> {
        let _guard = self.lock.acquire(ctx)?;
        let a = self.a.load(Ordering::SeqCst);
        let b = self.b.load(Ordering::SeqCst);
        Ok((a, b))
    }

    fn totals(&self) -> (u64, u64) {
        (self.a.load(Ordering::SeqCst), self.b.load(Ordering::SeqCst))
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Time-Of-Check to Time-Of-Use
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Account that must never go negative
pub trait Account: Send + Sync {
    /// Withdraw `amount` if funds suffice, spending `processing` between
    /// the check and the debit. Returns whether it withdrew.
    fn withdraw(&self, ctx: &WorkerContext, amount: i64, processing: Duration) -> Step<bool>;

    /// Current balance
    fn balance(&self) -> i64;
}

/// Account without synchronization
#[derive(Debug, Default)]
pub struct UnguardedAccount {
    balance: AtomicI64,
}

impl UnguardedAccount {
    /// Account holding `initial`
    pub fn new(initial: i64) -> Self {
        Self {
            balance: AtomicI64::new(initial),
        }
    }
}

impl Account for UnguardedAccount {
    fn withdraw(&self, ctx: &WorkerContext, amount: i64, processing: Duration) -> Step<bool> {
        if self.balance.load(Ordering::SeqCst) < amount {
            return Ok(false);
        }
        ctx.sleep(processing)?;
        racy_debit(&self.balance, amount);
        Ok(true)
    }

    fn balance(&self) -> i64 {
        self.balance.load(Ordering::SeqCst)
    }
}

/// Account whose check and debit share one lock hold
#[derive(Debug)]
pub struct GuardedAccount {
    lock: ResourceLock,
    balance: AtomicI64,
}

impl GuardedAccount {
    /// Account holding `initial`, guarded by `lock`
    pub fn new(lock: ResourceLock, initial: i64) -> Self {
        Self {
            lock,
            balance: AtomicI64::new(initial),
        }
    }
}

impl Account for GuardedAccount {
    fn withdraw(&self, ctx: &WorkerContext, amount: i64, processing: Duration) -> Step<bool> {
        let _guard = self.lock.acquire(ctx)?;
        if self.balance.load(Ordering::SeqCst) < amount {
            return Ok(false);
        }
        ctx.sleep(processing)?;
        racy_debit(&self.balance, amount);
        Ok(true)
    }

    fn balance(&self) -> i64 {
        self.balance.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::locks::Fairness;
    use crate::domain::registry::Registry;
    use std::sync::Arc;

    fn setup(name: &str) -> (Arc<Registry>, WorkerContext) {
        let registry = Arc::new(Registry::detailed());
        let id = registry.register_worker(name, "test");
        (registry, WorkerContext::new(id, name))
    }

    #[test]
    fn test_counters_respect_bound_sequentially() {
        let (registry, ctx) = setup("solo");
        let unguarded = UnguardedCounter::new(0);
        let guarded = GuardedCounter::new(ResourceLock::new(&registry, "counter", Fairness::Fair), 0);

        for counter in [&unguarded as &dyn BoundedCounter, &guarded] {
            for _ in 0..5 {
                counter.increment_below(&ctx, 3, Duration::ZERO).unwrap();
            }
            assert_eq!(counter.value(), 3);
        }
    }

    #[test]
    fn test_pairs_equal_when_quiescent() {
        let (registry, ctx) = setup("solo");
        let guarded = GuardedPair::new(ResourceLock::new(&registry, "pair", Fairness::Fair));
        let unguarded = UnguardedPair::new();

        for pair in [&unguarded as &dyn CounterPair, &guarded] {
            pair.bump(&ctx, Duration::ZERO).unwrap();
            pair.bump(&ctx, Duration::ZERO).unwrap();
            assert_eq!(pair.read(&ctx).unwrap(), (2, 2));
        }
    }

    #[test]
    fn test_accounts_refuse_overdraft_sequentially() {
        let (registry, ctx) = setup("solo");
        let unguarded = UnguardedAccount::new(500);
        let guarded = GuardedAccount::new(ResourceLock::new(&registry, "account", Fairness::Fair), 500);

        for account in [&unguarded as &dyn Account, &guarded] {
            assert!(account.withdraw(&ctx, 300, Duration::ZERO).unwrap());
            assert!(!account.withdraw(&ctx, 300, Duration::ZERO).unwrap());
            assert_eq!(account.balance(), 200);
        }
    }

    #[test]
    fn test_interrupted_withdraw_leaves_balance() {
        let (registry, ctx) = setup("solo");
        let account = GuardedAccount::new(ResourceLock::new(&registry, "account", Fairness::Fair), 500);
        ctx.token().interrupt();
        assert!(account.withdraw(&ctx, 300, Duration::from_millis(1)).is_err());
        assert_eq!(account.balance(), 500);
    }

    #[test]
    fn test_debit_wraps_instead_of_panicking() {
        let (_registry, ctx) = setup("spender");
        let account = UnguardedAccount::new(i64::MIN + 10);
        racy_debit(&account.balance, 20);
        assert_eq!(account.balance(), i64::MAX - 9);
        assert!(!account.withdraw(&ctx, i64::MAX, Duration::ZERO).unwrap());
    }
}
