//! JSON run report
//!
//! Serializes a [`RunSummary`] together with the host it ran on and the time
//! the report was generated.

use serde::{Deserialize, Serialize};
use std::fs::File;
use std::path::Path;
use std::time::Duration;

use crate::config::RunMode;
use crate::run::StopReason;
use crate::stats::{RoundResult, RunSummary};
use crate::util::time::format_duration;
use crate::Result;

/// Duration with both microseconds and human-readable format
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonDuration {
    pub micros: u64,
    pub human: String,
}

impl JsonDuration {
    pub fn from_duration(d: Duration) -> Self {
        Self {
            micros: d.as_micros() as u64,
            human: format_duration(d),
        }
    }
}

/// Where and when the report was produced
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRunInfo {
    pub generated_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    pub version: String,
}

/// Agreed run parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonParameters {
    pub mode: RunMode,
    pub points: u64,
    pub seed: u64,
}

/// One round
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRound {
    pub iteration: u64,
    pub total_hits: u64,
    pub total_points: u64,
    pub contributors: u32,
    /// `null` when the round sampled nothing
    pub estimate: Option<f64>,
    /// Distance of `estimate` from pi
    pub error: Option<f64>,
    pub elapsed: JsonDuration,
}

impl From<&RoundResult> for JsonRound {
    fn from(round: &RoundResult) -> Self {
        Self {
            iteration: round.iteration,
            total_hits: round.total_hits,
            total_points: round.total_points,
            contributors: round.contributors,
            estimate: round.estimate,
            error: round.error(),
            elapsed: JsonDuration::from_duration(round.elapsed),
        }
    }
}

/// Group membership over the run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonGroup {
    pub launch_size: u32,
    pub final_size: u32,
    pub evicted: Vec<u32>,
}

/// Complete run report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRunReport {
    pub run_info: JsonRunInfo,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameters: Option<JsonParameters>,
    pub stop_reason: StopReason,
    pub group: JsonGroup,
    pub iterations: u64,
    pub total_hits: u64,
    pub total_points: u64,
    pub cumulative_estimate: Option<f64>,
    pub total_duration: JsonDuration,
    pub rounds: Vec<JsonRound>,
}

/// Build a report for `summary`, stamped with the current UTC time
pub fn build_run_report(summary: &RunSummary, host: Option<String>) -> JsonRunReport {
    JsonRunReport {
        run_info: JsonRunInfo {
            generated_at: chrono::Utc::now().to_rfc3339(),
            host,
            version: env!("CARGO_PKG_VERSION").to_string(),
        },
        parameters: summary.params.map(|p| JsonParameters {
            mode: p.mode,
            points: p.points,
            seed: p.seed,
        }),
        stop_reason: summary.stop_reason,
        group: JsonGroup {
            launch_size: summary.launch_size,
            final_size: summary.final_size,
            evicted: summary.evicted.clone(),
        },
        iterations: summary.iterations(),
        total_hits: summary.total_hits(),
        total_points: summary.total_points(),
        cumulative_estimate: summary.cumulative_estimate(),
        total_duration: JsonDuration::from_duration(summary.elapsed),
        rounds: summary.rounds.iter().map(JsonRound::from).collect(),
    }
}

/// Name of this host, if the OS reports one
pub fn local_hostname() -> Option<String> {
    hostname::get()
        .ok()
        .and_then(|name| name.into_string().ok())
}

/// Write JSON output to file
pub fn write_json_output(output_path: &Path, report: &JsonRunReport, pretty: bool) -> Result<()> {
    let file = File::create(output_path)?;

    if pretty {
        serde_json::to_writer_pretty(file, report)?;
    } else {
        serde_json::to_writer(file, report)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::run::RunParameters;
    use tempfile::TempDir;

    fn summary() -> RunSummary {
        let params = RunParameters::new(RunMode::Indefinite, 10, 7).unwrap();
        let mut summary = RunSummary::new(Some(params), 3);
        summary.record(RoundResult::new(1, 7, 3, 3, Duration::from_millis(3)));
        summary.record(RoundResult::new(2, 0, 0, 2, Duration::from_millis(1)));
        summary.final_size = 2;
        summary.evicted = vec![2];
        summary.stop_reason = StopReason::RoundLimit;
        summary.elapsed = Duration::from_secs(2);
        summary
    }

    #[test]
    fn test_report_contents() {
        let report = build_run_report(&summary(), Some("node-a".to_string()));
        assert_eq!(report.iterations, 2);
        assert_eq!(report.total_points, 9);
        assert_eq!(report.group.evicted, vec![2]);
        assert_eq!(report.rounds[1].estimate, None);
        assert_eq!(report.rounds[1].error, None);
        let error = report.rounds[0].error.unwrap();
        assert!((error - (4.0 * 7.0 / 9.0 - std::f64::consts::PI).abs()).abs() < 1e-12);
        assert_eq!(report.total_duration.human, "2.00s");
        assert!(chrono::DateTime::parse_from_rfc3339(&report.run_info.generated_at).is_ok());
    }

    #[test]
    fn test_write_json_output() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("report.json");
        let report = build_run_report(&summary(), None);
        write_json_output(&path, &report, true).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["stop_reason"], "round-limit");
        assert_eq!(value["parameters"]["mode"], "indefinite");
        assert_eq!(value["rounds"][0]["total_hits"], 7);
        assert!(value["rounds"][1]["estimate"].is_null());
        assert!(value["run_info"].get("host").is_none());
    }

    #[test]
    fn test_cancelled_run_has_no_parameters() {
        let mut summary = RunSummary::new(None, 4);
        summary.stop_reason = StopReason::CancelledBeforeStart;
        let report = build_run_report(&summary, None);
        assert!(report.parameters.is_none());
        assert!(report.rounds.is_empty());
        assert_eq!(report.cumulative_estimate, None);
    }
}
