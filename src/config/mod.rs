//! Configuration module
//!
//! Handles CLI argument parsing, TOML configuration files, and validation.

pub mod cli;
pub mod toml;
pub mod validator;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use crate::distributed::HeartbeatConfig;

/// Complete run configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub run: RunConfig,
    #[serde(default)]
    pub group: GroupConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub runtime: RuntimeConfig,
}

/// How many rounds a run performs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum RunMode {
    /// Sample the budget once and report
    OneShot,
    /// Repeat rounds until stopped
    Indefinite,
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunMode::OneShot => write!(f, "one-shot"),
            RunMode::Indefinite => write!(f, "indefinite"),
        }
    }
}

/// Run parameters; missing mode or points are asked for interactively
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    pub mode: Option<RunMode>,
    /// Global point budget per round
    pub points: Option<u64>,
    /// Base seed (wall clock when unset)
    pub seed: Option<u64>,
    /// Stop an indefinite run after this many rounds
    pub max_rounds: Option<u64>,
    /// Pause between indefinite rounds (milliseconds)
    #[serde(default = "default_round_delay_ms")]
    pub round_delay_ms: u64,
}

fn default_round_delay_ms() -> u64 {
    500
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            mode: None,
            points: None,
            seed: None,
            max_rounds: None,
            round_delay_ms: default_round_delay_ms(),
        }
    }
}

impl RunConfig {
    pub fn round_delay(&self) -> Duration {
        Duration::from_millis(self.round_delay_ms)
    }
}

/// Participant group configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupConfig {
    /// Number of ranks, coordinator included
    #[serde(default = "default_group_size")]
    pub size: u32,
    /// Silence after which a participant is considered lost (seconds)
    #[serde(default = "default_heartbeat_timeout_secs")]
    pub heartbeat_timeout_secs: u64,
    /// Period between heartbeats (seconds)
    #[serde(default = "default_heartbeat_interval_secs")]
    pub heartbeat_interval_secs: u64,
}

fn default_group_size() -> u32 {
    num_cpus::get() as u32
}

fn default_heartbeat_timeout_secs() -> u64 {
    10
}

fn default_heartbeat_interval_secs() -> u64 {
    2
}

impl Default for GroupConfig {
    fn default() -> Self {
        Self {
            size: default_group_size(),
            heartbeat_timeout_secs: default_heartbeat_timeout_secs(),
            heartbeat_interval_secs: default_heartbeat_interval_secs(),
        }
    }
}

impl GroupConfig {
    pub fn heartbeat(&self) -> HeartbeatConfig {
        HeartbeatConfig::new(
            Duration::from_secs(self.heartbeat_timeout_secs),
            Duration::from_secs(self.heartbeat_interval_secs),
        )
    }
}

/// Output configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutputConfig {
    /// JSON run report path
    pub json_output: Option<PathBuf>,
    /// CSV file receiving the latest round's points
    pub points_output: Option<PathBuf>,
    /// Suppress per-round progress lines
    #[serde(default)]
    pub quiet: bool,
}

/// Runtime behavior configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Dry run mode
    #[serde(default)]
    pub dry_run: bool,
    /// Enable debug output
    #[serde(default)]
    pub debug: bool,
    /// Log filter used when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            dry_run: false,
            debug: false,
            log_level: default_log_level(),
        }
    }
}
