//! Scenario Reports
//!
//! Turns scenario outcomes into uniform, printable reports. Each outcome
//! type implements [`Outcome`]; the harness never needs to know which
//! scenario produced a report.

use std::fmt;
use std::time::Duration;

use crate::domain::introspect::render_dump;
use crate::domain::scenarios::{
    CheckThenActOutcome, CompoundOutcome, DeadlockOutcome, LivelockOutcome, ScenarioKind,
    StarvationOutcome, ToctouOutcome, Variant, Verdict,
};

/// Common view of every scenario outcome
pub trait Outcome {
    /// Classification of the run
    fn verdict(&self) -> Verdict;

    /// One-line result, e.g. `final balance: -400`
    fn headline(&self) -> String;

    /// Further report lines; thread dumps are cut at `dump_limit` rows
    fn details(&self, dump_limit: usize) -> Vec<String>;

    /// Wall time of the run
    fn elapsed(&self) -> Duration;
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "yes"
    } else {
        "no"
    }
}

impl Outcome for DeadlockOutcome {
    fn verdict(&self) -> Verdict {
        self.verdict
    }

    fn headline(&self) -> String {
        match self.verdict {
            Verdict::HazardReproduced => "deadlock detected".into(),
            Verdict::NoHazard => "no deadlock".into(),
            Verdict::Inconclusive => "inconclusive".into(),
        }
    }

    fn details(&self, dump_limit: usize) -> Vec<String> {
        let mut lines = Vec::new();
        if let Some(cycle) = self.cycle() {
            lines.push(format!("cycle: {cycle}"));
            lines.push(format!("locks involved: {}", cycle.lock_names().join(", ")));
        }
        lines.push(format!("locks: {}", self.lock_names.join(", ")));
        if !self.dump.is_empty() {
            lines.push("thread dump:".into());
            lines.extend(render_dump(&self.dump, dump_limit).lines().map(|l| format!("  {l}")));
        }
        if !self.exits.all_joined() {
            lines.push(format!("stragglers: {}", self.exits.stragglers.len()));
        }
        lines
    }

    fn elapsed(&self) -> Duration {
        self.elapsed
    }
}

impl Outcome for LivelockOutcome {
    fn verdict(&self) -> Verdict {
        self.verdict
    }

    fn headline(&self) -> String {
        format!(
            "{} units completed, {} back-offs",
            self.total_completed(),
            self.total_backoffs()
        )
    }

    fn details(&self, _dump_limit: usize) -> Vec<String> {
        let mut lines: Vec<String> = self
            .tallies
            .iter()
            .map(|t| {
                format!(
                    "{} ({}): completed {}, back-offs {}, retries {}",
                    t.name, t.id, t.completed, t.backoffs, t.retries
                )
            })
            .collect();
        lines.push(format!(
            "blocked state observed: {} ({} samples)",
            yes_no(self.observed_blocked),
            self.samples
        ));
        lines
    }

    fn elapsed(&self) -> Duration {
        self.elapsed
    }
}

impl Outcome for CheckThenActOutcome {
    fn verdict(&self) -> Verdict {
        self.verdict
    }

    fn headline(&self) -> String {
        format!("final counter: {} (bound {})", self.final_value, self.bound)
    }

    fn details(&self, _dump_limit: usize) -> Vec<String> {
        vec![
            format!("overshoot: {}", yes_no(self.overshoot)),
            format!("increments performed: {}", self.increments),
            format!("lost updates: {}", self.lost_updates()),
        ]
    }

    fn elapsed(&self) -> Duration {
        self.elapsed
    }
}

impl Outcome for CompoundOutcome {
    fn verdict(&self) -> Verdict {
        self.verdict
    }

    fn headline(&self) -> String {
        format!("inconsistent reads: {} of {}", self.inconsistencies, self.checks)
    }

    fn details(&self, _dump_limit: usize) -> Vec<String> {
        vec![format!("final pair: a = {}, b = {}", self.a, self.b)]
    }

    fn elapsed(&self) -> Duration {
        self.elapsed
    }
}

impl Outcome for ToctouOutcome {
    fn verdict(&self) -> Verdict {
        self.verdict
    }

    fn headline(&self) -> String {
        format!("final balance: {}", self.final_balance)
    }

    fn details(&self, _dump_limit: usize) -> Vec<String> {
        vec![
            format!("initial balance: {}", self.initial_balance),
            format!(
                "successful withdrawals: {} of {}",
                self.successful_withdrawals, self.attempts
            ),
        ]
    }

    fn elapsed(&self) -> Duration {
        self.elapsed
    }
}

impl Outcome for StarvationOutcome {
    fn verdict(&self) -> Verdict {
        self.verdict
    }

    fn headline(&self) -> String {
        format!("writer completed: {}", yes_no(self.writer_completed))
    }

    fn details(&self, _dump_limit: usize) -> Vec<String> {
        vec![
            format!("policy: {}", self.policy),
            format!("writes done: {} of {}", self.writes_done, self.required_writes),
            format!("reads done: {}", self.reads_done),
            format!("writer contention: {}", self.writer_contention),
        ]
    }

    fn elapsed(&self) -> Duration {
        self.elapsed
    }
}

/// Printable result of one scenario run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScenarioReport {
    pub kind: ScenarioKind,
    pub variant: Variant,
    pub verdict: Verdict,
    pub headline: String,
    pub details: Vec<String>,
    pub elapsed: Duration,
}

impl ScenarioReport {
    /// Build a report from any outcome
    pub fn from_outcome(
        kind: ScenarioKind,
        variant: Variant,
        outcome: &impl Outcome,
        dump_limit: usize,
    ) -> Self {
        Self {
            kind,
            variant,
            verdict: outcome.verdict(),
            headline: outcome.headline(),
            details: outcome.details(dump_limit),
            elapsed: outcome.elapsed(),
        }
    }
}

impl fmt::Display for ScenarioReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "== {} ({}) ==", self.kind, self.variant)?;
        writeln!(f, "outcome: {}", self.headline)?;
        writeln!(f, "verdict: {}", self.verdict)?;
        for line in &self.details {
            writeln!(f, "  {line}")?;
        }
        write!(f, "elapsed: {:?}", self.elapsed)
    }
}

/// Verdict counts over repeated runs of one scenario
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepeatSummary {
    pub kind: ScenarioKind,
    pub variant: Variant,
    pub runs: usize,
    pub reproduced: usize,
    pub no_hazard: usize,
    pub inconclusive: usize,
}

impl RepeatSummary {
    /// Empty summary
    pub fn new(kind: ScenarioKind, variant: Variant) -> Self {
        Self {
            kind,
            variant,
            runs: 0,
            reproduced: 0,
            no_hazard: 0,
            inconclusive: 0,
        }
    }

    /// Count one run
    pub fn record(&mut self, verdict: Verdict) {
        self.runs += 1;
        match verdict {
            Verdict::HazardReproduced => self.reproduced += 1,
            Verdict::NoHazard => self.no_hazard += 1,
            Verdict::Inconclusive => self.inconclusive += 1,
        }
    }
}

impl fmt::Display for RepeatSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}): hazard reproduced in {}/{} runs ({} no hazard, {} inconclusive)",
            self.kind, self.variant, self.reproduced, self.runs, self.no_hazard, self.inconclusive
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::scenarios::CrewOutcome;

    fn toctou(final_balance: i64) -> ToctouOutcome {
        ToctouOutcome {
            initial_balance: 500,
            final_balance,
            successful_withdrawals: 3,
            attempts: 3,
            verdict: Verdict::HazardReproduced,
            exits: CrewOutcome::default(),
            elapsed: Duration::from_millis(12),
        }
    }

    #[test]
    fn test_report_display() {
        let report = ScenarioReport::from_outcome(
            ScenarioKind::Toctou,
            Variant::Unguarded,
            &toctou(-400),
            10,
        );
        let text = report.to_string();
        assert!(text.starts_with("== toctou (unguarded) =="));
        assert!(text.contains("outcome: final balance: -400"));
        assert!(text.contains("verdict: hazard reproduced"));
        assert!(text.contains("successful withdrawals: 3 of 3"));
    }

    #[test]
    fn test_repeat_summary_counts() {
        let mut summary = RepeatSummary::new(ScenarioKind::Deadlock, Variant::Guarded);
        summary.record(Verdict::NoHazard);
        summary.record(Verdict::NoHazard);
        summary.record(Verdict::Inconclusive);
        assert_eq!(summary.runs, 3);
        assert_eq!(summary.no_hazard, 2);
        assert_eq!(
            summary.to_string(),
            "deadlock (guarded): hazard reproduced in 0/3 runs (2 no hazard, 1 inconclusive)"
        );
    }
}
