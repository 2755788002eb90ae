//! CLI argument parsing using clap

use clap::Parser;
use std::path::PathBuf;

use super::RunMode;
use crate::sampler::MAX_POINTS;

/// pigroup - Group-coordinated Monte Carlo estimation of pi
#[derive(Parser, Debug)]
#[command(name = "pigroup")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Run mode: one-shot or indefinite (prompted when omitted)
    #[arg(long, value_enum)]
    pub mode: Option<RunMode>,

    /// Global point budget per round (prompted when omitted)
    #[arg(short = 'p', long)]
    pub points: Option<u64>,

    /// Number of ranks, coordinator included (default: number of CPUs)
    #[arg(short = 'n', long)]
    pub ranks: Option<u32>,

    /// Stop an indefinite run after this many rounds
    #[arg(long)]
    pub max_rounds: Option<u64>,

    /// Pause between indefinite rounds in milliseconds (default: 500)
    #[arg(long)]
    pub round_delay_ms: Option<u64>,

    /// Base seed for reproducible runs
    #[arg(long)]
    pub seed: Option<u64>,

    /// Seconds of silence after which a participant is considered lost (default: 10)
    #[arg(long)]
    pub heartbeat_timeout_secs: Option<u64>,

    /// Seconds between heartbeats (default: 2)
    #[arg(long)]
    pub heartbeat_interval_secs: Option<u64>,

    /// TOML configuration file
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,

    /// Write a JSON run report to this file
    #[arg(long)]
    pub json_output: Option<PathBuf>,

    /// Write each round's points as CSV to this file
    #[arg(long)]
    pub points_output: Option<PathBuf>,

    /// Suppress per-round progress lines
    #[arg(short = 'q', long)]
    pub quiet: bool,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, env = "PIGROUP_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Enable debug output
    #[arg(long)]
    pub debug: bool,

    /// Validate configuration and exit
    #[arg(long)]
    pub dry_run: bool,
}

impl Cli {
    /// Parse CLI arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate CLI arguments
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.ranks == Some(0) {
            anyhow::bail!("ranks must be at least 1");
        }

        if self.points == Some(0) {
            anyhow::bail!("points must be a positive integer");
        }

        if let Some(points) = self.points.filter(|&p| p > MAX_POINTS) {
            anyhow::bail!("points ({}) must not exceed {} per round", points, MAX_POINTS);
        }

        if self.max_rounds == Some(0) {
            anyhow::bail!("max_rounds must be at least 1");
        }

        if self.heartbeat_interval_secs == Some(0) {
            anyhow::bail!("heartbeat_interval_secs must be at least 1");
        }

        if let (Some(timeout), Some(interval)) = (self.heartbeat_timeout_secs, self.heartbeat_interval_secs) {
            if interval >= timeout {
                anyhow::bail!(
                    "heartbeat_interval_secs ({}) must be lower than heartbeat_timeout_secs ({})",
                    interval,
                    timeout
                );
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("pigroup").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_cli_parsing() {
        let cli = parse(&["--mode", "one-shot", "-p", "1000000", "-n", "4", "--seed", "7"]);
        assert_eq!(cli.mode, Some(RunMode::OneShot));
        assert_eq!(cli.points, Some(1_000_000));
        assert_eq!(cli.ranks, Some(4));
        assert_eq!(cli.seed, Some(7));
        assert!(cli.validate().is_ok());
    }

    #[test]
    fn test_cli_defaults_leave_prompt_open() {
        let cli = parse(&[]);
        assert_eq!(cli.mode, None);
        assert_eq!(cli.points, None);
        assert!(!cli.dry_run);
        assert!(cli.validate().is_ok());
    }

    #[test]
    fn test_cli_rejects_unknown_mode() {
        assert!(Cli::try_parse_from(["pigroup", "--mode", "forever"]).is_err());
    }

    #[test]
    fn test_cli_validation() {
        assert!(parse(&["--points", "0"]).validate().is_err());
        assert!(parse(&["--points", "1000000000000", "-n", "1"]).validate().is_err());
        assert!(parse(&["--points", "100000000"]).validate().is_ok());
        assert!(parse(&["--ranks", "0"]).validate().is_err());
        assert!(parse(&["--max-rounds", "0"]).validate().is_err());
        assert!(parse(&["--heartbeat-interval-secs", "0"]).validate().is_err());
        assert!(parse(&["--heartbeat-timeout-secs", "2", "--heartbeat-interval-secs", "2"])
            .validate()
            .is_err());
    }
}
