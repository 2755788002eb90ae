//! TOML configuration file parsing

use super::*;
use crate::config::cli::Cli;
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

/// Parse TOML configuration file
pub fn parse_toml_file(path: &Path) -> Result<Config> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    parse_toml_string(&contents)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Parse TOML configuration from string
pub fn parse_toml_string(contents: &str) -> Result<Config> {
    let config: Config = ::toml::from_str(contents)
        .context("Failed to parse TOML configuration")?;

    Ok(config)
}

/// Merge CLI arguments with TOML configuration (CLI takes precedence)
pub fn merge_cli_with_config(cli: &Cli, mut config: Config) -> Config {
    if cli.mode.is_some() {
        config.run.mode = cli.mode;
    }
    if cli.points.is_some() {
        config.run.points = cli.points;
    }
    if cli.seed.is_some() {
        config.run.seed = cli.seed;
    }
    if cli.max_rounds.is_some() {
        config.run.max_rounds = cli.max_rounds;
    }
    if let Some(delay) = cli.round_delay_ms {
        config.run.round_delay_ms = delay;
    }

    if let Some(ranks) = cli.ranks {
        config.group.size = ranks;
    }
    if let Some(timeout) = cli.heartbeat_timeout_secs {
        config.group.heartbeat_timeout_secs = timeout;
    }
    if let Some(interval) = cli.heartbeat_interval_secs {
        config.group.heartbeat_interval_secs = interval;
    }

    if cli.json_output.is_some() {
        config.output.json_output = cli.json_output.clone();
    }
    if cli.points_output.is_some() {
        config.output.points_output = cli.points_output.clone();
    }
    config.output.quiet |= cli.quiet;

    if let Some(level) = &cli.log_level {
        config.runtime.log_level = level.clone();
    }
    config.runtime.debug |= cli.debug;
    config.runtime.dry_run |= cli.dry_run;

    config
}

/// Build the effective configuration: config file (if any) overlaid with CLI
pub fn build_config(cli: &Cli) -> Result<Config> {
    let config = match &cli.config {
        Some(path) => parse_toml_file(path)?,
        None => Config::default(),
    };

    Ok(merge_cli_with_config(cli, config))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const SAMPLE: &str = r#"
        [run]
        mode = "indefinite"
        points = 40000
        max_rounds = 5
        round_delay_ms = 100

        [group]
        size = 3
        heartbeat_timeout_secs = 6

        [output]
        points_output = "points.csv"
    "#;

    #[test]
    fn test_parse_toml_string() {
        let config = parse_toml_string(SAMPLE).unwrap();
        assert_eq!(config.run.mode, Some(RunMode::Indefinite));
        assert_eq!(config.run.points, Some(40_000));
        assert_eq!(config.run.max_rounds, Some(5));
        assert_eq!(config.group.size, 3);
        assert_eq!(config.group.heartbeat_timeout_secs, 6);
        // Unset fields keep their defaults
        assert_eq!(config.group.heartbeat_interval_secs, 2);
        assert_eq!(config.runtime.log_level, "info");
        assert_eq!(config.output.points_output, Some(PathBuf::from("points.csv")));
    }

    #[test]
    fn test_parse_empty_toml() {
        let config = parse_toml_string("").unwrap();
        assert!(config.run.mode.is_none());
        assert_eq!(config.run.round_delay_ms, 500);
    }

    #[test]
    fn test_parse_invalid_toml() {
        assert!(parse_toml_string("[run]\nmode = \"sometimes\"").is_err());
        assert!(parse_toml_string("[group]\nsize = -1").is_err());
    }

    #[test]
    fn test_cli_takes_precedence() {
        let config = parse_toml_string(SAMPLE).unwrap();
        let cli = Cli::try_parse_from(["pigroup", "--mode", "one-shot", "-n", "8", "--quiet"]).unwrap();
        let merged = merge_cli_with_config(&cli, config);

        assert_eq!(merged.run.mode, Some(RunMode::OneShot));
        assert_eq!(merged.run.points, Some(40_000));
        assert_eq!(merged.group.size, 8);
        assert_eq!(merged.group.heartbeat_timeout_secs, 6);
        assert!(merged.output.quiet);
    }

    #[test]
    fn test_build_config_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let path = file.path().to_str().unwrap();
        let cli = Cli::try_parse_from(["pigroup", "-c", path, "--seed", "11"]).unwrap();
        let config = build_config(&cli).unwrap();
        assert_eq!(config.run.seed, Some(11));
        assert_eq!(config.group.size, 3);
    }

    #[test]
    fn test_build_config_missing_file() {
        let cli = Cli::try_parse_from(["pigroup", "-c", "/nonexistent/pigroup.toml"]).unwrap();
        let err = build_config(&cli).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
