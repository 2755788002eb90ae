//! Configuration validation

use super::*;
use crate::sampler::MAX_POINTS;
use anyhow::Result;

/// Validate complete configuration
pub fn validate_config(config: &Config) -> Result<()> {
    validate_run(&config.run)?;
    validate_group(&config.group)?;
    validate_output(&config.output)?;

    Ok(())
}

/// Validate run configuration
pub fn validate_run(run: &RunConfig) -> Result<()> {
    if run.points == Some(0) {
        anyhow::bail!("points must be a positive integer");
    }

    if let Some(points) = run.points.filter(|&p| p > MAX_POINTS) {
        anyhow::bail!("points ({}) must not exceed {} per round", points, MAX_POINTS);
    }

    if run.max_rounds == Some(0) {
        anyhow::bail!("max_rounds must be at least 1");
    }

    Ok(())
}

/// Validate group configuration
pub fn validate_group(group: &GroupConfig) -> Result<()> {
    if group.size == 0 {
        anyhow::bail!("group size must be at least 1");
    }

    if group.heartbeat_interval_secs == 0 {
        anyhow::bail!("heartbeat_interval_secs must be at least 1");
    }

    if group.heartbeat_interval_secs >= group.heartbeat_timeout_secs {
        anyhow::bail!(
            "heartbeat_interval_secs ({}) must be lower than heartbeat_timeout_secs ({})",
            group.heartbeat_interval_secs,
            group.heartbeat_timeout_secs
        );
    }

    Ok(())
}

/// Validate output configuration
pub fn validate_output(output: &OutputConfig) -> Result<()> {
    if let (Some(json), Some(points)) = (&output.json_output, &output.points_output) {
        if json == points {
            anyhow::bail!(
                "json_output and points_output must be different files, both are {}",
                json.display()
            );
        }
    }

    Ok(())
}
