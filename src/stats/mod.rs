//! Round and run statistics
//!
//! Aggregated results the coordinator computes after each round's reduction,
//! and the running summary of a whole run.
//!
//! # Example
//!
//! ```
//! use pigroup::stats::RoundResult;
//! use std::time::Duration;
//!
//! // 3 contributors sampled 3 points each, 7 of them were hits
//! let round = RoundResult::new(1, 7, 3, 3, Duration::from_millis(2));
//! assert_eq!(round.total_points, 9);
//! assert_eq!(round.estimate, Some(4.0 * 7.0 / 9.0));
//! ```

use std::collections::VecDeque;
use std::time::Duration;

use crate::run::{RunParameters, StopReason};
use crate::util::time::calculate_rate;

/// Estimate pi from a hit count over the points actually sampled
///
/// Undefined (`None`) when nothing was sampled.
pub fn estimate_pi(total_hits: u64, total_points: u64) -> Option<f64> {
    if total_points == 0 {
        return None;
    }
    Some(4.0 * total_hits as f64 / total_points as f64)
}

/// One round's aggregated values, as seen by the coordinator
#[derive(Debug, Clone, PartialEq)]
pub struct RoundResult {
    /// Round number, starting at 1
    pub iteration: u64,
    pub total_hits: u64,
    /// Points actually sampled across all contributors
    pub total_points: u64,
    /// Members that contributed to the reduction
    pub contributors: u32,
    pub estimate: Option<f64>,
    /// Sampling plus aggregation time at the coordinator
    pub elapsed: Duration,
}

impl RoundResult {
    pub fn new(
        iteration: u64,
        total_hits: u64,
        local_budget: u64,
        contributors: u32,
        elapsed: Duration,
    ) -> Self {
        let total_points = contributors as u64 * local_budget;
        Self {
            iteration,
            total_hits,
            total_points,
            contributors,
            estimate: estimate_pi(total_hits, total_points),
            elapsed,
        }
    }

    /// Distance from pi, when the estimate is defined
    pub fn error(&self) -> Option<f64> {
        self.estimate.map(|e| (e - std::f64::consts::PI).abs())
    }
}

/// Rounds kept in [`RunSummary::rounds`]; older rounds only count in the totals
pub const ROUND_HISTORY: usize = 1000;

/// Everything the coordinator learned over a run
#[derive(Debug, Clone)]
pub struct RunSummary {
    /// Agreed parameters; `None` when the run never started
    pub params: Option<RunParameters>,
    /// Group size at launch
    pub launch_size: u32,
    /// Group size at shutdown
    pub final_size: u32,
    /// Ranks evicted during the run, in eviction order
    pub evicted: Vec<u32>,
    /// The most recent rounds, oldest first, at most [`ROUND_HISTORY`]
    pub rounds: VecDeque<RoundResult>,
    pub stop_reason: StopReason,
    /// Wall-clock time from negotiation to shutdown
    pub elapsed: Duration,
    iterations: u64,
    total_hits: u64,
    total_points: u64,
}

impl RunSummary {
    pub fn new(params: Option<RunParameters>, launch_size: u32) -> Self {
        Self {
            params,
            launch_size,
            final_size: launch_size,
            evicted: Vec::new(),
            rounds: VecDeque::new(),
            stop_reason: StopReason::Completed,
            elapsed: Duration::ZERO,
            iterations: 0,
            total_hits: 0,
            total_points: 0,
        }
    }

    pub fn record(&mut self, round: RoundResult) {
        self.iterations += 1;
        self.total_hits += round.total_hits;
        self.total_points += round.total_points;

        if self.rounds.len() == ROUND_HISTORY {
            self.rounds.pop_front();
        }
        self.rounds.push_back(round);
    }

    /// Rounds completed
    pub fn iterations(&self) -> u64 {
        self.iterations
    }

    pub fn last_round(&self) -> Option<&RoundResult> {
        self.rounds.back()
    }

    pub fn total_hits(&self) -> u64 {
        self.total_hits
    }

    pub fn total_points(&self) -> u64 {
        self.total_points
    }

    /// Estimate over every point sampled in every round
    pub fn cumulative_estimate(&self) -> Option<f64> {
        estimate_pi(self.total_hits(), self.total_points())
    }

    /// Sampling rate over the whole run
    pub fn samples_per_second(&self) -> f64 {
        calculate_rate(self.total_points(), self.elapsed)
    }
}
