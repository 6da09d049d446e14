//! Integration Test: Deadlock Reproduction and Detection
//!
//! Two workers lock `lock-1`/`lock-2` in opposite orders with a 100 ms
//! dwell. The detector must find the cycle almost every time, and the
//! consistently ordered variant must never produce one.

use std::sync::Arc;
use std::time::Duration;

use pitfalls_twin::domain::scenarios::deadlock::{self, DeadlockConfig};
use pitfalls_twin::domain::scenarios::WorkerExit;
use pitfalls_twin::{
    Accounting, Contention, DetectionResult, Fairness, HarnessError, Introspector, Registry,
    ResourceLock, RunOptions, Variant, Verdict, WorkerContext, WorkerId, WorkerState,
};

#[test]
fn test_opposite_orders_deadlock_reliably() {
    let config = DeadlockConfig::default();
    let options = RunOptions::default();
    let mut detected = 0;

    for _ in 0..20 {
        let outcome = deadlock::run(&config, Variant::Unguarded, &options).unwrap();
        if let Some(cycle) = outcome.cycle() {
            detected += 1;

            assert_eq!(cycle.len(), 2);
            let mut workers = cycle.workers();
            workers.sort();
            assert_eq!(workers, vec![WorkerId::new(0), WorkerId::new(1)]);

            let mut locks = cycle.lock_names();
            locks.sort_unstable();
            assert_eq!(locks, vec!["lock-1", "lock-2"]);
        }
    }

    println!("deadlock detected in {detected}/20 runs");
    assert!(detected >= 18, "only {detected}/20 runs deadlocked");
}

#[test]
fn test_ordered_acquisition_never_deadlocks() {
    let config = DeadlockConfig {
        dwell: Duration::from_millis(20),
        grace: Duration::from_millis(10),
        ..DeadlockConfig::default()
    };
    let options = RunOptions::default();

    for run in 0..20 {
        let outcome = deadlock::run(&config, Variant::Guarded, &options).unwrap();
        assert_eq!(outcome.verdict, Verdict::NoHazard, "run {run} did not finish cleanly");
        assert!(outcome.cycle().is_none());
        assert!(outcome
            .exits
            .exits
            .iter()
            .all(|m| m.exit == WorkerExit::Completed));
    }
}

#[test]
fn test_detection_captures_dump_and_stops_workers() {
    let outcome =
        deadlock::run(&DeadlockConfig::default(), Variant::Unguarded, &RunOptions::default())
            .unwrap();
    if outcome.verdict != Verdict::HazardReproduced {
        // Scheduling noise; covered statistically above.
        return;
    }

    assert_eq!(outcome.dump.len(), 2);
    for snap in &outcome.dump {
        assert_eq!(snap.state, WorkerState::Blocked);
        assert!(snap.blocked_on.is_some());
        assert_eq!(snap.lock_owners.len(), 1);
        assert_ne!(snap.lock_owners[0], snap.id);
    }

    assert!(outcome.exits.all_joined());
    assert_eq!(outcome.exits.interrupted_count(), 2);
}

#[test]
fn test_three_way_cycle() {
    let config = DeadlockConfig {
        lock_count: 3,
        orders: vec![vec![0, 1], vec![1, 2], vec![2, 0]],
        ..DeadlockConfig::default()
    };
    let mut found = None;
    for _ in 0..5 {
        let outcome = deadlock::run(&config, Variant::Unguarded, &RunOptions::default()).unwrap();
        if let Some(cycle) = outcome.cycle() {
            found = Some(cycle.clone());
            break;
        }
    }

    let cycle = found.expect("three-way cycle not detected in 5 runs");
    assert_eq!(cycle.len(), 3);
    assert_eq!(cycle.locks().len(), 3);
}

#[test]
fn test_detection_is_idempotent_without_side_effects() {
    let registry = Arc::new(Registry::detailed());
    let lock = ResourceLock::new(&registry, "lock-1", Fairness::Fair);
    let id = registry.register_worker("main", "holder");
    let ctx = WorkerContext::new(id, "main");
    let _guard = lock.acquire(&ctx).unwrap();

    let introspector = Introspector::new(Arc::clone(&registry));
    let before = registry.locks();
    for _ in 0..100 {
        assert_eq!(introspector.detect_deadlock(), DetectionResult::NoDeadlock);
    }
    assert_eq!(registry.locks(), before);
    assert_eq!(lock.holder(), Some(id));
    assert_eq!(lock.hold_count(), 1);
}

#[test]
fn test_contention_stats_unsupported_and_unknown() {
    let registry = Arc::new(Registry::new(Accounting::Disabled));
    let id = registry.register_worker("w", "test");
    let introspector = Introspector::new(Arc::clone(&registry));

    assert_eq!(introspector.lock_contention_stats(id).unwrap(), Contention::Unsupported);
    assert!(matches!(
        introspector.lock_contention_stats(WorkerId::new(99)),
        Err(HarnessError::UnknownWorker(_))
    ));
}
