//! Time-Of-Check to Time-Of-Use
//!
//! Several workers released together through a start gate each try to withdraw `amount` from a
//! shared balance. A worker checks the funds, spends `processing` on the
//! request, then debits. Every worker checks before anyone debits, so all of
//! them succeed and the balance goes negative.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::info;

use super::shared::{Account, GuardedAccount, UnguardedAccount};
use super::{classify, RUN_BOUND};
use crate::domain::scenarios::crew::{Crew, CrewOutcome};
use crate::domain::scenarios::{RunOptions, Variant, Verdict};
use crate::domain::worker::StartGate;
use crate::error::{HarnessError, Result};
use crate::infrastructure::config::millis;

/// TOCTOU parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToctouConfig {
    /// Number of withdrawing workers
    pub workers: usize,
    /// Amount each worker withdraws
    pub amount: i64,
    /// Starting balance
    pub initial_balance: i64,
    /// Time between the funds check and the debit
    #[serde(with = "millis")]
    pub processing: Duration,
}

impl Default for ToctouConfig {
    fn default() -> Self {
        Self {
            workers: 3,
            amount: 300,
            initial_balance: 500,
            processing: Duration::from_millis(10),
        }
    }
}

impl ToctouConfig {
    /// Reject parameters that cannot describe a run
    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(HarnessError::invalid("toctou: workers must be at least 1"));
        }
        if self.amount <= 0 {
            return Err(HarnessError::invalid("toctou: amount must be positive"));
        }
        if self.initial_balance < 0 {
            return Err(HarnessError::invalid("toctou: initial_balance must not be negative"));
        }
        // Every withdrawal may succeed, so the lowest reachable balance must fit.
        let lowest = i64::try_from(self.workers)
            .ok()
            .and_then(|workers| workers.checked_mul(self.amount))
            .and_then(|total| self.initial_balance.checked_sub(total));
        if lowest.is_none() {
            return Err(HarnessError::invalid("toctou: workers * amount overflows the balance"));
        }
        Ok(())
    }
}

/// Result of one TOCTOU run
#[derive(Debug, Clone)]
pub struct ToctouOutcome {
    /// Starting balance
    pub initial_balance: i64,
    /// Balance after all workers finished
    pub final_balance: i64,
    /// Withdrawals that passed the funds check
    pub successful_withdrawals: u64,
    /// Withdrawals attempted
    pub attempts: u64,
    /// Classification
    pub verdict: Verdict,
    /// How the workers ended
    pub exits: CrewOutcome,
    /// Wall time of the run
    pub elapsed: Duration,
}

/// Run the TOCTOU scenario
pub fn run(config: &ToctouConfig, variant: Variant, options: &RunOptions) -> Result<ToctouOutcome> {
    config.validate()?;
    let registry = options.registry();
    let account: Arc<dyn Account> = match variant {
        Variant::Unguarded => Arc::new(UnguardedAccount::new(config.initial_balance)),
        Variant::Guarded => Arc::new(GuardedAccount::new(
            options.exclusive_lock(&registry, "account-lock"),
            config.initial_balance,
        )),
    };
    let successes = Arc::new(AtomicU64::new(0));
    let attempts = Arc::new(AtomicU64::new(0));
    let gate = Arc::new(StartGate::new());

    info!(
        workers = config.workers,
        amount = config.amount,
        balance = config.initial_balance,
        %variant,
        "toctou scenario started"
    );
    let start = Instant::now();
    let mut crew = Crew::new(Arc::clone(&registry));
    for i in 0..config.workers {
        let account = Arc::clone(&account);
        let successes = Arc::clone(&successes);
        let attempts = Arc::clone(&attempts);
        let gate = Arc::clone(&gate);
        let (amount, processing) = (config.amount, config.processing);
        crew.spawn(format!("customer{}", i + 1), "withdrawer", move |ctx| {
            gate.wait(ctx)?;
            attempts.fetch_add(1, Ordering::Relaxed);
            if account.withdraw(ctx, amount, processing)? {
                successes.fetch_add(1, Ordering::Relaxed);
            }
            Ok(())
        })?;
    }
    // Opened only once every customer exists; an early return leaves the
    // gate closed and the crew interrupts whoever is waiting on it.
    gate.open();
    let exits = crew.join_within(RUN_BOUND)?;

    let final_balance = account.balance();
    let verdict = classify(&exits, final_balance < 0);
    info!(final_balance, %verdict, "toctou scenario finished");

    Ok(ToctouOutcome {
        initial_balance: config.initial_balance,
        final_balance,
        successful_withdrawals: successes.load(Ordering::Relaxed),
        attempts: attempts.load(Ordering::Relaxed),
        verdict,
        exits,
        elapsed: start.elapsed(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guarded_allows_one_withdrawal() {
        let config = ToctouConfig {
            processing: Duration::from_millis(1),
            ..ToctouConfig::default()
        };
        let outcome = run(&config, Variant::Guarded, &RunOptions::default()).unwrap();
        assert_eq!(outcome.final_balance, 200);
        assert_eq!(outcome.successful_withdrawals, 1);
        assert_eq!(outcome.attempts, 3);
        assert_eq!(outcome.verdict, Verdict::NoHazard);
    }

    #[test]
    fn test_sufficient_funds_never_negative() {
        let config = ToctouConfig {
            initial_balance: 900,
            processing: Duration::from_millis(1),
            ..ToctouConfig::default()
        };
        let outcome = run(&config, Variant::Guarded, &RunOptions::default()).unwrap();
        assert_eq!(outcome.final_balance, 0);
        assert_eq!(outcome.successful_withdrawals, 3);
    }

    #[test]
    fn test_overflowing_withdrawals_rejected() {
        let config = ToctouConfig {
            amount: i64::MAX - 1,
            ..ToctouConfig::default()
        };
        assert!(matches!(config.validate(), Err(HarnessError::InvalidConfig(_))));

        let config = ToctouConfig {
            workers: 2,
            amount: i64::MAX / 2,
            initial_balance: 0,
            ..ToctouConfig::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_every_customer_passes_the_gate() {
        let config = ToctouConfig {
            workers: 8,
            amount: 100,
            initial_balance: 800,
            processing: Duration::ZERO,
        };
        let outcome = run(&config, Variant::Unguarded, &RunOptions::default()).unwrap();
        assert_eq!(outcome.attempts, 8);
        assert!(outcome.exits.all_joined());
    }

    #[test]
    fn test_invalid_amount_rejected() {
        let config = ToctouConfig {
            amount: 0,
            ..ToctouConfig::default()
        };
        assert!(matches!(
            run(&config, Variant::Unguarded, &RunOptions::default()),
            Err(HarnessError::InvalidConfig(_))
        ));
    }
}
