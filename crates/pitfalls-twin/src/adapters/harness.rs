//! Harness Driver
//!
//! Sequences scenario runs, maps the variant to each scenario's remedy and
//! turns outcomes into [`ScenarioReport`]s. Every run gets a fresh registry
//! built from the configured [`RunOptions`].

use tracing::info;

use super::report::{Outcome, RepeatSummary, ScenarioReport};
use crate::domain::scenarios::{
    deadlock, livelock, race, starvation, RunOptions, ScenarioKind, Variant,
};
use crate::error::{HarnessError, Result};
use crate::infrastructure::HarnessConfig;

/// Runs scenarios with one configuration
#[derive(Debug, Clone)]
pub struct Harness {
    config: HarnessConfig,
    options: RunOptions,
}

impl Default for Harness {
    fn default() -> Self {
        let config = HarnessConfig::default();
        let options = config.run_options();
        Self { config, options }
    }
}

impl Harness {
    /// Create a harness after validating `config`
    pub fn new(config: HarnessConfig) -> Result<Self> {
        config.validate()?;
        let options = config.run_options();
        Ok(Self { config, options })
    }

    /// Active configuration
    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    /// Run one scenario once
    pub fn run(&self, kind: ScenarioKind, variant: Variant) -> Result<ScenarioReport> {
        info!(scenario = %kind, %variant, "running scenario");
        let cfg = &self.config;
        let opts = &self.options;
        let report = match kind {
            ScenarioKind::Deadlock => {
                self.report(kind, variant, &deadlock::run(&cfg.deadlock, variant, opts)?)
            }
            ScenarioKind::Livelock => {
                self.report(kind, variant, &livelock::run(&cfg.livelock, variant, opts)?)
            }
            ScenarioKind::CheckThenAct => self.report(
                kind,
                variant,
                &race::check_then_act::run(&cfg.check_then_act, variant, opts)?,
            ),
            ScenarioKind::Compound => {
                self.report(kind, variant, &race::compound::run(&cfg.compound, variant, opts)?)
            }
            ScenarioKind::Toctou => {
                self.report(kind, variant, &race::toctou::run(&cfg.toctou, variant, opts)?)
            }
            ScenarioKind::Starvation => {
                self.report(kind, variant, &starvation::run(&cfg.starvation, variant, opts)?)
            }
        };
        info!(scenario = %kind, verdict = %report.verdict, "scenario finished");
        Ok(report)
    }

    /// Run every scenario once, in harness order
    pub fn run_all(&self, variant: Variant) -> Result<Vec<ScenarioReport>> {
        ScenarioKind::ALL
            .into_iter()
            .map(|kind| self.run(kind, variant))
            .collect()
    }

    /// Run one scenario `runs` times and count the verdicts
    pub fn run_repeated(
        &self,
        kind: ScenarioKind,
        variant: Variant,
        runs: usize,
    ) -> Result<RepeatSummary> {
        if runs == 0 {
            return Err(HarnessError::invalid("repeat count must be at least 1"));
        }
        let mut summary = RepeatSummary::new(kind, variant);
        for _ in 0..runs {
            summary.record(self.run(kind, variant)?.verdict);
        }
        info!(%summary, "repeated runs finished");
        Ok(summary)
    }

    fn report(&self, kind: ScenarioKind, variant: Variant, outcome: &impl Outcome) -> ScenarioReport {
        ScenarioReport::from_outcome(kind, variant, outcome, self.config.dump_limit)
    }
}
