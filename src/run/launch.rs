//! Group launcher
//!
//! Builds an in-process group and runs one task per rank. The coordinator's
//! outcome decides the outcome of the launch: worker failures (an evicted or
//! orphaned worker) are logged and returned alongside the summary.

use anyhow::Context;
use tokio::task::JoinHandle;

use super::coordinator::Coordinator;
use super::participant::{run_participant, ParticipantReport, Role};
use crate::distributed::{create_group, CollectiveError, HeartbeatConfig};
use crate::stats::RunSummary;
use crate::Result;

/// A worker that did not reach a clean shutdown
#[derive(Debug)]
pub struct ParticipantFailure {
    pub rank: u32,
    pub error: anyhow::Error,
}

/// Result of a completed launch
#[derive(Debug)]
pub struct LaunchOutcome {
    pub summary: RunSummary,
    /// Reports of every participant that terminated cleanly, in rank order
    pub participants: Vec<ParticipantReport>,
    pub failures: Vec<ParticipantFailure>,
}

/// Run a group of `size` participants with `coordinator` at rank 0
pub async fn launch_group(
    size: u32,
    heartbeat: HeartbeatConfig,
    coordinator: Coordinator,
) -> Result<LaunchOutcome> {
    if size == 0 {
        anyhow::bail!("a group needs at least one participant");
    }

    let mut comms = create_group(size, heartbeat).into_iter();
    let coordinator_comm = comms.next().context("group has no coordinator")?;

    let workers: Vec<(u32, JoinHandle<Result<ParticipantReport>>)> = comms
        .map(|comm| (comm.rank(), tokio::spawn(run_participant(comm, Role::Worker))))
        .collect();
    tracing::info!(size, "group launched");

    let coordinator = tokio::spawn(run_participant(
        coordinator_comm,
        Role::Coordinator(Box::new(coordinator)),
    ));

    let mut report = match coordinator.await {
        Ok(Ok(report)) => report,
        Ok(Err(e)) => {
            abort_all(&workers);
            return Err(e.context("coordinator failed"));
        }
        Err(e) => {
            abort_all(&workers);
            return Err(anyhow::Error::new(e).context("coordinator task panicked"));
        }
    };
    let summary = report
        .summary
        .take()
        .context("coordinator finished without a run summary")?;

    let mut participants = vec![report];
    let mut failures = Vec::new();
    for (rank, handle) in workers {
        match handle.await {
            Ok(Ok(report)) => participants.push(report),
            Ok(Err(error)) => {
                let left_group = error
                    .downcast_ref::<CollectiveError>()
                    .is_some_and(CollectiveError::is_membership_loss);
                if left_group {
                    tracing::warn!(rank, "participant left the group: {:#}", error);
                } else {
                    tracing::error!(rank, "participant failed: {:#}", error);
                }
                failures.push(ParticipantFailure { rank, error });
            }
            Err(e) => {
                tracing::warn!(rank, "participant task panicked: {}", e);
                failures.push(ParticipantFailure {
                    rank,
                    error: anyhow::Error::new(e),
                });
            }
        }
    }

    tracing::info!(
        rounds = summary.iterations(),
        final_size = summary.final_size,
        failed = failures.len(),
        "group finished"
    );

    Ok(LaunchOutcome {
        summary,
        participants,
        failures,
    })
}

fn abort_all(workers: &[(u32, JoinHandle<Result<ParticipantReport>>)]) {
    for (_, handle) in workers {
        handle.abort();
    }
}
