//! sluice-sim — replay reward-distribution scenarios.
//!
//! Loads a distributor configuration and a JSON scenario script, replays the
//! script against an in-memory distributor, and prints the event journal and
//! final balances.

mod scenario;

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::info;

use sluice_engine::{DistributorConfig, MemoryReserve, PositionBook};

use crate::scenario::{Scenario, replay};

/// Sluice scenario simulator.
#[derive(Parser, Debug)]
#[command(name = "sluice-sim", version, about = "Replay reward-distribution scenarios")]
struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    /// Log output format ("text" or "json")
    #[arg(long, default_value = "text", global = true)]
    log_format: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Replay a scenario and print its events and balances.
    Run(RunArgs),
    /// Print the resolved distributor configuration.
    Config {
        /// Configuration file (TOML or JSON).
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Configuration file (TOML or JSON). `SLUICE_*` variables override it.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Scenario script (JSON).
    #[arg(long)]
    scenario: PathBuf,

    /// Print the report as one JSON document instead of event lines.
    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level, &cli.log_format);

    match cli.command {
        Commands::Run(args) => run(args),
        Commands::Config { config } => {
            let loaded = DistributorConfig::load(config.as_deref()).context("loading configuration")?;
            println!("{}", serde_json::to_string_pretty(&loaded)?);
            Ok(())
        }
    }
}

fn run(args: RunArgs) -> Result<()> {
    let config = DistributorConfig::load(args.config.as_deref()).context("loading configuration")?;
    let raw = fs::read_to_string(&args.scenario)
        .with_context(|| format!("reading scenario {}", args.scenario.display()))?;
    let scenario: Scenario = serde_json::from_str(&raw)
        .with_context(|| format!("parsing scenario {}", args.scenario.display()))?;

    info!(variant = ?config.variant, steps = scenario.steps.len(), "replaying scenario");
    let mut distributor = config
        .build(PositionBook::new(), MemoryReserve::new())
        .context("building distributor")?;
    let report = replay(&mut distributor, &scenario)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    for event in &report.events {
        println!("{}", serde_json::to_string(event)?);
    }
    println!("--- balances at {} ---", report.finished_at);
    for balance in &report.balances {
        println!(
            "{} {} owed={} received={}",
            balance.user, balance.token, balance.owed, balance.received
        );
    }
    Ok(())
}

/// Initialize the tracing subscriber. `RUST_LOG` overrides `level_str`.
fn init_logging(level_str: &str, format: &str) {
    use tracing_subscriber::filter::EnvFilter;
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level_str));

    // Logs go to stderr so stdout stays machine-readable.
    if format == "json" {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_level(true).with_writer(std::io::stderr))
            .init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn run_requires_scenario() {
        assert!(Cli::try_parse_from(["sluice-sim", "run"]).is_err());
        let cli = Cli::try_parse_from(["sluice-sim", "run", "--scenario", "s.json", "--log-format", "json"]).unwrap();
        assert_eq!(cli.log_format, "json");
        assert!(matches!(cli.command, Commands::Run(RunArgs { json: false, .. })));
    }

    #[test]
    fn run_rejects_missing_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let args = RunArgs {
            config: Some(dir.path().join("nope.toml")),
            scenario: dir.path().join("nope.json"),
            json: false,
        };
        assert!(run(args).is_err());
    }
}
