use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use pitfalls_twin::{Harness, HarnessConfig, ScenarioKind, Variant};
use tracing::info;

/// Concurrency pitfalls harness
/// Reproduces and detects deadlock, livelock, races and starvation
#[derive(Parser)]
#[command(name = "pitfalls")]
#[command(about = "Concurrency pitfalls harness", version, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one scenario, or all of them
    Run {
        /// Scenario name (deadlock, livelock, check-then-act, compound,
        /// toctou, starvation) or `all`
        #[arg(value_parser = parse_targets)]
        target: Targets,
        /// Apply the remedy instead of demonstrating the hazard
        #[arg(long)]
        guarded: bool,
        /// Run the scenario N times and print verdict counts
        #[arg(long, value_name = "N")]
        repeat: Option<usize>,
        /// JSON configuration file
        #[arg(long, value_name = "FILE")]
        config: Option<PathBuf>,
        /// Rows shown in thread dumps
        #[arg(long, value_name = "N")]
        dump: Option<usize>,
    },
    /// Print the default configuration as JSON
    Config,
}

/// Scenarios selected on the command line, in harness order
#[derive(Debug, Clone, PartialEq, Eq)]
struct Targets(Vec<ScenarioKind>);

fn parse_targets(value: &str) -> std::result::Result<Targets, String> {
    if value == "all" {
        return Ok(Targets(ScenarioKind::ALL.to_vec()));
    }
    value
        .parse::<ScenarioKind>()
        .map(|kind| Targets(vec![kind]))
        .map_err(|err| err.to_string())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            target,
            guarded,
            repeat,
            config,
            dump,
        } => {
            let mut config = match config {
                Some(path) => HarnessConfig::load_from_file(&path)
                    .with_context(|| format!("loading {}", path.display()))?,
                None => HarnessConfig::default(),
            };
            if let Some(limit) = dump {
                config.dump_limit = limit;
            }
            let variant = if guarded {
                Variant::Guarded
            } else {
                Variant::Unguarded
            };
            let harness = Harness::new(config)?;
            info!(version = pitfalls_twin::VERSION, %variant, "pitfalls harness");

            for kind in target.0 {
                match repeat {
                    Some(runs) => {
                        let summary = harness
                            .run_repeated(kind, variant, runs)
                            .with_context(|| format!("running {kind} {runs} times"))?;
                        println!("{summary}");
                    }
                    None => {
                        let report = harness
                            .run(kind, variant)
                            .with_context(|| format!("running {kind}"))?;
                        println!("{report}\n");
                    }
                }
            }
        }
        Commands::Config => {
            println!("{}", serde_json::to_string_pretty(&HarnessConfig::default())?);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_targets_follow_scenario_names() {
        assert_eq!(parse_targets("toctou"), Ok(Targets(vec![ScenarioKind::Toctou])));
        assert_eq!(
            parse_targets("check-then-act"),
            Ok(Targets(vec![ScenarioKind::CheckThenAct]))
        );
        assert_eq!(parse_targets("all"), Ok(Targets(ScenarioKind::ALL.to_vec())));
        assert!(parse_targets("philosophers").is_err());
    }

    #[test]
    fn test_run_command_parses() {
        let cli = Cli::try_parse_from(["pitfalls", "run", "starvation", "--guarded", "--repeat", "3"])
            .unwrap();
        match cli.command {
            Commands::Run { target, guarded, repeat, .. } => {
                assert_eq!(target, Targets(vec![ScenarioKind::Starvation]));
                assert!(guarded);
                assert_eq!(repeat, Some(3));
            }
            Commands::Config => panic!("parsed the wrong subcommand"),
        }
        assert!(Cli::try_parse_from(["pitfalls", "run", "philosophers"]).is_err());
    }
}
