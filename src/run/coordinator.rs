//! Coordinator duties
//!
//! Only rank 0 talks to the operator. It obtains the intent, turns it into
//! [`RunParameters`], reports every round and evaluates the continuation
//! predicate. Workers never see any of this directly; they only receive what
//! the coordinator broadcasts.

use anyhow::Context;
use std::time::{Duration, Instant};

use super::negotiation::IntentSource;
use super::{RunParameters, RunState, StopReason, StopSignal};
use crate::config::Config;
use crate::distributed::Communicator;
use crate::output::text;
use crate::sampler::{clock_seed, Point};
use crate::stats::{RoundResult, RunSummary};
use crate::view::PointView;
use crate::Result;

/// Coordinator knobs that never leave rank 0
#[derive(Debug, Clone, PartialEq)]
pub struct CoordinatorSettings {
    /// Base seed; the wall clock when `None`
    pub seed: Option<u64>,
    /// Round cap for indefinite runs
    pub max_rounds: Option<u64>,
    /// Pause between indefinite rounds
    pub round_delay: Duration,
    /// Print per-round progress
    pub progress: bool,
}

impl CoordinatorSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            seed: config.run.seed,
            max_rounds: config.run.max_rounds,
            round_delay: config.run.round_delay(),
            progress: !config.output.quiet,
        }
    }
}

impl Default for CoordinatorSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Outcome of the negotiation phase
pub(crate) struct Negotiation {
    pub params: Option<RunParameters>,
    /// Set when the intent could not be obtained; reported after shutdown
    pub failure: Option<anyhow::Error>,
}

/// The coordinator role
pub struct Coordinator {
    intent: Option<Box<dyn IntentSource>>,
    /// Absent only while a frame is being drawn
    view: Option<Box<dyn PointView>>,
    stop: StopSignal,
    settings: CoordinatorSettings,
    summary: Option<RunSummary>,
    started: Instant,
}

impl Coordinator {
    pub fn new(
        intent: Box<dyn IntentSource>,
        view: Box<dyn PointView>,
        stop: StopSignal,
        settings: CoordinatorSettings,
    ) -> Self {
        Self {
            intent: Some(intent),
            view: Some(view),
            stop,
            settings,
            summary: None,
            started: Instant::now(),
        }
    }

    /// Obtain the intent and share the resulting parameters with the group
    ///
    /// Heartbeats continue while the intent source blocks. A stop raised
    /// first cancels the run before it starts.
    pub(crate) async fn negotiate(&mut self, comm: &mut Communicator) -> Result<Negotiation> {
        self.started = Instant::now();
        let intent = self.intent.take().context("intent already consumed")?;
        let stop = self.stop.clone();

        let obtained = comm
            .while_busy(async move {
                let prompt = tokio::task::spawn_blocking(move || {
                    let mut intent = intent;
                    intent.obtain()
                });
                tokio::select! {
                    result = prompt => Some(result),
                    _ = stop.raised() => None,
                }
            })
            .await;

        let (params, failure, reason) = match obtained {
            None => (None, None, StopReason::CancelledBeforeStart),
            Some(Ok(Ok(intent))) => {
                let seed = self.settings.seed.unwrap_or_else(clock_seed);
                match RunParameters::new(intent.mode, intent.points, seed) {
                    Ok(params) => (Some(params), None, StopReason::Completed),
                    Err(e) => (None, Some(anyhow::Error::new(e)), StopReason::NegotiationFailed),
                }
            }
            Some(Ok(Err(e))) => (None, Some(e), StopReason::NegotiationFailed),
            Some(Err(e)) => (
                None,
                Some(anyhow::Error::new(e).context("intent prompt task failed")),
                StopReason::NegotiationFailed,
            ),
        };

        let mut summary = RunSummary::new(params, comm.size());
        summary.stop_reason = reason;
        self.summary = Some(summary);

        match &params {
            Some(p) => tracing::info!(mode = %p.mode, points = p.points, seed = p.seed, "run parameters agreed"),
            None => tracing::info!(%reason, "run will not start"),
        }

        let params = comm
            .broadcast(Some(params))
            .await
            .context("Failed to broadcast run parameters")?;

        Ok(Negotiation { params, failure })
    }

    /// Record and report one round
    ///
    /// `gathered` holds each member's points in rank order. The view draws on
    /// a blocking thread while the coordinator keeps heart-beating. A failing
    /// view is logged and the run continues.
    pub(crate) async fn report(
        &mut self,
        comm: &mut Communicator,
        params: &RunParameters,
        round: RoundResult,
        gathered: Vec<Vec<Point>>,
    ) -> Result<()> {
        if self.settings.progress {
            text::print_round(params, &round);
        }

        let mut view = self.view.take().context("point view unavailable")?;
        let frame = round.clone();
        let (view, updated) = comm
            .while_busy(tokio::task::spawn_blocking(move || {
                let points: Vec<Point> = gathered.into_iter().flatten().collect();
                let updated = view.update(&frame, &points);
                (view, updated)
            }))
            .await
            .context("point view task failed")?;
        self.view = Some(view);

        if let Err(e) = updated {
            tracing::warn!(iteration = round.iteration, "point view update failed: {:#}", e);
        }

        if let Some(summary) = self.summary.as_mut() {
            summary.record(round);
        }
        Ok(())
    }

    /// Evaluate the continuation predicate after `iteration` rounds
    pub(crate) fn decide(&mut self, iteration: u64) -> RunState {
        let reason = if !self.view.as_ref().is_some_and(|view| view.is_open()) {
            Some(StopReason::ViewClosed)
        } else if self.stop.is_raised() {
            Some(StopReason::Interrupted)
        } else if self.settings.max_rounds.is_some_and(|max| iteration >= max) {
            Some(StopReason::RoundLimit)
        } else {
            None
        };

        if let (Some(reason), Some(summary)) = (reason, self.summary.as_mut()) {
            summary.stop_reason = reason;
            tracing::info!(iteration, %reason, "stopping run");
        }

        RunState {
            running: reason.is_none(),
            iteration,
        }
    }

    pub(crate) fn round_delay(&self) -> Duration {
        self.settings.round_delay
    }

    /// Close out the run after the shutdown barrier
    pub(crate) fn finish(mut self, comm: &Communicator) -> RunSummary {
        let mut summary = self
            .summary
            .take()
            .unwrap_or_else(|| RunSummary::new(None, comm.size()));
        summary.final_size = comm.size();
        summary.evicted = comm.evicted().to_vec();
        summary.elapsed = self.started.elapsed();

        text::print_summary(&summary);
        summary
    }
}
