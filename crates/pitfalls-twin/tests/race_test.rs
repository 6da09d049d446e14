//! Integration Test: Race Conditions
//!
//! Unguarded shared state shows each race at least once over repeated runs;
//! the guarded variant never does.

use std::time::Duration;

use pitfalls_twin::domain::scenarios::race::{
    check_then_act, compound, toctou, CheckThenActConfig, CompoundConfig, ToctouConfig,
};
use pitfalls_twin::{RunOptions, Variant, Verdict};

#[test]
fn test_check_then_act_overshoots_unguarded() {
    let config = CheckThenActConfig::default();
    let options = RunOptions::default();

    let overshoots = (0..20)
        .map(|_| check_then_act::run(&config, Variant::Unguarded, &options).unwrap())
        .take_while(|outcome| !outcome.overshoot)
        .count();
    assert!(overshoots < 20, "no overshoot in 20 runs");
}

#[test]
fn test_check_then_act_guarded_never_overshoots() {
    let config = CheckThenActConfig {
        workers: 4,
        iterations: 20,
        bound: 50,
        window: Duration::ZERO,
    };
    let options = RunOptions::default();

    for run in 0..1000 {
        let outcome = check_then_act::run(&config, Variant::Guarded, &options).unwrap();
        assert_eq!(outcome.final_value, 50, "run {run}");
        assert!(!outcome.overshoot);
    }
}

#[test]
fn test_compound_unguarded_sees_inconsistent_pair() {
    let config = CompoundConfig::default();
    let options = RunOptions::default();

    let mut seen = 0;
    for _ in 0..10 {
        let outcome = compound::run(&config, Variant::Unguarded, &options).unwrap();
        seen += outcome.inconsistencies;
        if seen > 0 {
            break;
        }
    }
    assert!(seen > 0, "checker never saw a != b");
}

#[test]
fn test_compound_guarded_is_always_consistent() {
    let outcome =
        compound::run(&CompoundConfig::default(), Variant::Guarded, &RunOptions::default())
            .unwrap();
    assert_eq!(outcome.checks, 1000);
    assert_eq!(outcome.inconsistencies, 0);
    assert_eq!(outcome.verdict, Verdict::NoHazard);
    assert_eq!((outcome.a, outcome.b), (1000, 1000));
}

#[test]
fn test_toctou_unguarded_goes_negative() {
    let config = ToctouConfig::default();
    let options = RunOptions::default();

    let negative = (0..20)
        .map(|_| toctou::run(&config, Variant::Unguarded, &options).unwrap())
        .any(|outcome| outcome.final_balance < 0);
    assert!(negative, "balance never went negative in 20 runs");
}

#[test]
fn test_toctou_guarded_never_negative() {
    let config = ToctouConfig {
        processing: Duration::ZERO,
        ..ToctouConfig::default()
    };
    let options = RunOptions::default();

    for run in 0..1000 {
        let outcome = toctou::run(&config, Variant::Guarded, &options).unwrap();
        assert!(outcome.final_balance >= 0, "run {run}: {}", outcome.final_balance);
        assert_eq!(outcome.successful_withdrawals, 1);
    }
}
