//! Run loop and participant roles
//!
//! This module binds the sampler and the group transport into the run
//! protocol every participant follows.
//!
//! # Phases
//!
//! ```text
//! Negotiating ──> Sampling ──> Aggregating ──> Reporting ──┬──> Stopping ──> Terminated
//!                    ^                                     │        ^
//!                    │                 (indefinite)        v        │
//!                    └─────────── running ─────────── Deciding ── stopped
//! ```
//!
//! - One-shot runs go from Reporting straight to Stopping.
//! - Only the coordinator decides; the decision reaches workers as a
//!   broadcast [`RunState`], the single authoritative stop signal.
//! - Stopping always ends in a barrier, so no participant exits while another
//!   is still inside a collective.
//!
//! # Modules
//!
//! - `negotiation`: Sources of operator intent (fixed values or prompt)
//! - `coordinator`: Coordinator-only duties (negotiation, reporting, deciding)
//! - `participant`: The per-participant state machine
//! - `launch`: Builds a group and runs one task per rank

pub mod coordinator;
pub mod launch;
pub mod negotiation;
pub mod participant;

pub use coordinator::{Coordinator, CoordinatorSettings};
pub use launch::{launch_group, LaunchOutcome, ParticipantFailure};
pub use negotiation::{FixedIntent, Intent, IntentSource, PromptIntent};
pub use participant::{run_participant, ParticipantReport, Role};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::watch;

use crate::config::RunMode;
use crate::sampler::MAX_POINTS;

/// Errors constructing run parameters
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParameterError {
    #[error("point budget must be positive")]
    ZeroPoints,

    #[error("point budget {points} exceeds the maximum of {max} per round")]
    TooManyPoints { points: u64, max: u64 },
}

/// Parameters agreed on during negotiation
///
/// Created once by the coordinator and immutable once broadcast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunParameters {
    pub mode: RunMode,
    /// Global point budget per round
    pub points: u64,
    /// Base seed every participant derives its sampling stream from
    pub seed: u64,
}

impl RunParameters {
    pub fn new(mode: RunMode, points: u64, seed: u64) -> Result<Self, ParameterError> {
        if points == 0 {
            return Err(ParameterError::ZeroPoints);
        }
        if points > MAX_POINTS {
            return Err(ParameterError::TooManyPoints {
                points,
                max: MAX_POINTS,
            });
        }
        Ok(Self { mode, points, seed })
    }
}

/// Continuation decision mirrored to every participant each round
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunState {
    pub running: bool,
    /// Rounds completed so far
    pub iteration: u64,
}

/// Phase of the run loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    Negotiating,
    Sampling,
    Aggregating,
    Reporting,
    Deciding,
    Stopping,
    Terminated,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Why a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StopReason {
    /// One-shot run finished its single pass
    Completed,
    /// The point view was closed by the operator
    ViewClosed,
    /// The configured round cap was reached
    RoundLimit,
    /// The operator interrupted the run
    Interrupted,
    /// The operator gave up before parameters were agreed
    CancelledBeforeStart,
    /// Obtaining the operator's intent failed
    NegotiationFailed,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            StopReason::Completed => "completed",
            StopReason::ViewClosed => "view closed",
            StopReason::RoundLimit => "round limit reached",
            StopReason::Interrupted => "interrupted",
            StopReason::CancelledBeforeStart => "cancelled before start",
            StopReason::NegotiationFailed => "negotiation failed",
        };
        f.write_str(text)
    }
}

/// Operator stop request, raised locally at the coordinator
#[derive(Debug, Clone)]
pub struct StopSignal {
    tx: Arc<watch::Sender<bool>>,
}

impl StopSignal {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    pub fn raise(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_raised(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolve once the signal is raised
    pub async fn raised(&self) {
        let mut rx = self.tx.subscribe();
        while !*rx.borrow_and_update() {
            if rx.changed().await.is_err() {
                return;
            }
        }
    }
}

impl Default for StopSignal {
    fn default() -> Self {
        Self::new()
    }
}
