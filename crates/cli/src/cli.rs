//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use ingestion::MockScenario;
use std::path::PathBuf;

/// Fuel Estimator - per-vehicle fuel level estimation for fleet telemetry
#[derive(Parser, Debug)]
#[command(
    name = "fuel-estimator",
    author,
    version,
    about = "Fleet fuel-level estimation pipeline",
    long_about = "Estimates true fuel level per vehicle from noisy tank sensors, ECU \n\
                  consumption counters and driving context. Reads recorded or synthetic \n\
                  telemetry, runs one Kalman estimator per vehicle, and writes estimates \n\
                  to the configured sinks."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "FUEL_ESTIMATOR_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "pretty",
        global = true,
        env = "FUEL_ESTIMATOR_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the estimation pipeline
    Run(RunArgs),

    /// Validate configuration file without running
    Validate(ValidateArgs),

    /// Display configuration information
    Info(InfoArgs),
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Path to configuration file (TOML or JSON)
    #[arg(short, long, default_value = "fleet.toml", env = "FUEL_ESTIMATOR_CONFIG")]
    pub config: PathBuf,

    /// Replay recorded ticks from a JSON-lines file
    #[arg(long, conflicts_with = "mock", env = "FUEL_ESTIMATOR_REPLAY")]
    pub replay: Option<PathBuf>,

    /// Replay speed relative to tick time (0 = as fast as possible)
    #[arg(long, default_value = "0", requires = "replay")]
    pub replay_speed: f64,

    /// Generate synthetic telemetry for every configured vehicle
    #[arg(long, value_parser = parse_scenario)]
    pub mock: Option<MockScenario>,

    /// Ticks per vehicle in mock mode (0 = until stopped)
    #[arg(long, default_value = "120", requires = "mock")]
    pub mock_ticks: usize,

    /// Seed for mock telemetry noise
    #[arg(long, default_value = "42", env = "FUEL_ESTIMATOR_SEED")]
    pub seed: u64,

    /// Only process ticks for this vehicle
    #[arg(long)]
    pub vehicle: Option<String>,

    /// Stop after this many ticks (0 = unlimited)
    #[arg(long, default_value = "0", env = "FUEL_ESTIMATOR_MAX_TICKS")]
    pub max_ticks: u64,

    /// Pipeline timeout in seconds (0 = no timeout)
    #[arg(long, default_value = "0", env = "FUEL_ESTIMATOR_TIMEOUT")]
    pub timeout: u64,

    /// Override the Prometheus port from configuration (0 = disabled)
    #[arg(long, env = "FUEL_ESTIMATOR_METRICS_PORT")]
    pub metrics_port: Option<u16>,

    /// Validate configuration and exit without running pipeline
    #[arg(long)]
    pub dry_run: bool,
}

fn parse_scenario(s: &str) -> Result<MockScenario, String> {
    s.parse().map_err(|e: ingestion::IngestionError| e.to_string())
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "fleet.toml", env = "FUEL_ESTIMATOR_CONFIG")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "fleet.toml", env = "FUEL_ESTIMATOR_CONFIG")]
    pub config: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// Show per-vehicle tank and calibration details
    #[arg(long)]
    pub vehicles: bool,

    /// Show sink configuration
    #[arg(long)]
    pub sinks: bool,
}

/// Log output format
#[derive(ValueEnum, Clone, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_args_parse() {
        let cli = Cli::try_parse_from([
            "fuel-estimator",
            "run",
            "--config",
            "f.toml",
            "--mock",
            "parked-theft",
            "--mock-ticks",
            "30",
            "--max-ticks",
            "10",
        ])
        .unwrap();

        let Commands::Run(args) = cli.command else {
            panic!("expected run command");
        };
        assert_eq!(args.mock, Some(MockScenario::ParkedTheft));
        assert_eq!(args.mock_ticks, 30);
        assert_eq!(args.max_ticks, 10);
        assert!(args.replay.is_none());
    }

    #[test]
    fn test_replay_conflicts_with_mock() {
        let result = Cli::try_parse_from([
            "fuel-estimator",
            "run",
            "--replay",
            "t.jsonl",
            "--mock",
            "highway",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_unknown_scenario_rejected() {
        let result = Cli::try_parse_from(["fuel-estimator", "run", "--mock", "offroad"]);
        assert!(result.is_err());
    }
}
