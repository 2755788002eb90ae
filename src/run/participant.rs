//! Participant state machine
//!
//! Every rank runs [`run_participant`], the coordinator included. The
//! sequence of collectives is identical on every rank:
//!
//! 1. broadcast `Option<RunParameters>` (Negotiating)
//! 2. per round: gather points, reduce hits, then in indefinite mode
//!    broadcast `RunState` (Deciding)
//! 3. broadcast `RunState { running: false }` unless it was already the
//!    round's decision, then barrier (Stopping)

use anyhow::Context;
use std::time::Instant;

use super::coordinator::{Coordinator, Negotiation};
use super::{Phase, RunParameters, RunState};
use crate::config::RunMode;
use crate::distributed::{Communicator, ParticipantContext};
use crate::sampler::{local_budget, sample, LocalSample, SeedMaterial};
use crate::stats::{RoundResult, RunSummary};
use crate::Result;

/// What a participant does besides sampling
pub enum Role {
    Coordinator(Box<Coordinator>),
    Worker,
}

/// How a participant's run ended
#[derive(Debug)]
pub struct ParticipantReport {
    pub rank: u32,
    /// Rounds this participant sampled
    pub rounds_sampled: u64,
    /// Last phase reached; `Terminated` after a clean shutdown
    pub phase: Phase,
    /// Present on the coordinator only
    pub summary: Option<RunSummary>,
}

struct PhaseTracker {
    rank: u32,
    phase: Phase,
}

impl PhaseTracker {
    fn new(rank: u32) -> Self {
        tracing::trace!(rank, phase = %Phase::Negotiating, "phase");
        Self {
            rank,
            phase: Phase::Negotiating,
        }
    }

    fn enter(&mut self, phase: Phase) {
        tracing::trace!(rank = self.rank, %phase, "phase");
        self.phase = phase;
    }
}

/// Run one participant from negotiation to termination
pub async fn run_participant(mut comm: Communicator, role: Role) -> Result<ParticipantReport> {
    let rank = comm.rank();
    let mut tracker = PhaseTracker::new(rank);

    let (mut coordinator, negotiation) = match role {
        Role::Coordinator(mut coordinator) => {
            let negotiation = coordinator.negotiate(&mut comm).await?;
            (Some(coordinator), negotiation)
        }
        Role::Worker => {
            let params = comm
                .broadcast::<Option<RunParameters>>(None)
                .await
                .with_context(|| format!("rank {} failed to receive run parameters", rank))?;
            (None, Negotiation { params, failure: None })
        }
    };

    let mut iteration = 0u64;
    let mut stop_announced = false;

    if let Some(params) = negotiation.params {
        loop {
            iteration += 1;

            tracker.enter(Phase::Sampling);
            let ctx = comm.context();
            let started = Instant::now();
            let LocalSample { hits, points } = sample_round(&mut comm, &params, ctx, iteration).await?;

            tracker.enter(Phase::Aggregating);
            let gathered = comm
                .gather(points)
                .await
                .with_context(|| format!("rank {} failed to gather round {}", rank, iteration))?;
            let total_hits = comm
                .reduce_sum(hits)
                .await
                .with_context(|| format!("rank {} failed to reduce round {}", rank, iteration))?;

            if let Some(coordinator) = coordinator.as_mut() {
                tracker.enter(Phase::Reporting);
                let round = RoundResult::new(
                    iteration,
                    total_hits.unwrap_or(0),
                    local_budget(params.points, ctx.group_size),
                    comm.size(),
                    started.elapsed(),
                );
                coordinator
                    .report(&mut comm, &params, round, gathered.unwrap_or_default())
                    .await?;
            }

            if params.mode == RunMode::OneShot {
                break;
            }

            tracker.enter(Phase::Deciding);
            let decision = coordinator.as_mut().map(|c| c.decide(iteration));
            let state = comm
                .broadcast(decision)
                .await
                .with_context(|| format!("rank {} failed to receive run state", rank))?;

            if !state.running {
                stop_announced = true;
                break;
            }

            let delay = coordinator.as_ref().map(|c| c.round_delay());
            if let Some(delay) = delay {
                comm.while_busy(tokio::time::sleep(delay)).await;
            }
        }
    }

    tracker.enter(Phase::Stopping);
    if !stop_announced {
        let state = coordinator.as_ref().map(|_| RunState {
            running: false,
            iteration,
        });
        comm.broadcast(state)
            .await
            .with_context(|| format!("rank {} failed to receive final run state", rank))?;
    }
    comm.barrier()
        .await
        .with_context(|| format!("rank {} failed to reach the shutdown barrier", rank))?;
    tracker.enter(Phase::Terminated);

    let summary = coordinator.map(|c| (*c).finish(&comm));
    if let Some(failure) = negotiation.failure {
        return Err(failure);
    }

    tracing::debug!(rank, rounds = iteration, "participant terminated");
    Ok(ParticipantReport {
        rank,
        rounds_sampled: iteration,
        phase: tracker.phase,
        summary,
    })
}

/// Sample this participant's share of one round on a blocking thread
async fn sample_round(
    comm: &mut Communicator,
    params: &RunParameters,
    ctx: ParticipantContext,
    round: u64,
) -> Result<LocalSample> {
    let budget = local_budget(params.points, ctx.group_size);
    let seed = SeedMaterial::new(params.seed, ctx.rank, round);

    comm.while_busy(tokio::task::spawn_blocking(move || sample(budget, seed)))
        .await
        .with_context(|| format!("rank {} sampling task failed", ctx.rank))
}
