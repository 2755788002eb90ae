//! Collective operation errors

use thiserror::Error;

use super::protocol::CollectiveOp;

/// Errors raised by group collectives
#[derive(Debug, Error)]
pub enum CollectiveError {
    /// No message from the coordinator within the heartbeat timeout
    #[error("rank {rank}: coordinator silent for {timeout_ms}ms during {op}")]
    CoordinatorLost {
        rank: u32,
        op: CollectiveOp,
        timeout_ms: u128,
    },

    /// The coordinator removed this rank from the group
    #[error("rank {rank} was evicted from the group")]
    Evicted { rank: u32 },

    /// Participants entered different collectives at the same position
    #[error("rank {rank}: expected {expected} at sequence {seq}, peer sent {got}")]
    Mismatch {
        rank: u32,
        seq: u64,
        expected: CollectiveOp,
        got: CollectiveOp,
    },

    /// The coordinator called broadcast without a value
    #[error("broadcast on the coordinator requires a value")]
    MissingRootValue,

    /// Every sender to this participant's inbox is gone
    #[error("rank {rank}: group channels closed")]
    Disconnected { rank: u32 },

    /// The blocking task encoding or decoding a payload did not finish
    #[error("rank {rank}: payload codec task failed: {source}")]
    CodecTask {
        rank: u32,
        #[source]
        source: tokio::task::JoinError,
    },

    /// Payload encoding failed
    #[error("failed to encode collective payload: {0}")]
    Encode(#[from] rmp_serde::encode::Error),

    /// Payload decoding failed
    #[error("failed to decode collective payload: {0}")]
    Decode(#[from] rmp_serde::decode::Error),
}

impl CollectiveError {
    /// Whether the error means this participant can no longer take part in the run
    pub fn is_membership_loss(&self) -> bool {
        matches!(
            self,
            CollectiveError::CoordinatorLost { .. } | CollectiveError::Evicted { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_membership_loss() {
        let lost = CollectiveError::CoordinatorLost {
            rank: 2,
            op: CollectiveOp::Gather,
            timeout_ms: 10_000,
        };
        assert!(lost.is_membership_loss());
        assert!(CollectiveError::Evicted { rank: 1 }.is_membership_loss());
        assert!(!CollectiveError::MissingRootValue.is_membership_loss());
        assert_eq!(
            lost.to_string(),
            "rank 2: coordinator silent for 10000ms during gather"
        );
    }
}
