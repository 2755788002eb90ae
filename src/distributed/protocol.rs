//! Group transport protocol
//!
//! This module defines the envelopes exchanged between participants of a group.
//! Payloads are encoded with MessagePack (rmp-serde), so any serde value can be
//! broadcast, gathered or reduced without the transport knowing its type.
//!
//! # Collective Shape
//!
//! Every collective is a full-group rendezvous made of two phases addressed to
//! the coordinator (rank 0):
//!
//! ```text
//! Coordinator                     Worker (rank r)
//!     |                              |
//!     |<------ ARRIVE(seq, op) ------|   fan-in: contribution or empty
//!     |                              |
//!     |------ RELEASE(seq, op) ----->|   fan-out: result or empty, plus
//!     |                              |            current membership
//!     |                              |
//!     |<-------- HEARTBEAT ----------|   while busy or waiting
//!     |--------- HEARTBEAT --------->|
//!     |                              |
//!     |--------- EVICTED ----------->|   rank r went silent too long
//! ```
//!
//! No participant leaves a collective before every current member has arrived:
//! the coordinator only sends RELEASE once the fan-in is complete, and workers
//! only return after receiving RELEASE.
//!
//! # Sequencing
//!
//! Each participant numbers its collective calls. Envelopes carry that sequence
//! number and the operation kind, so a participant that entered a different
//! collective than its peers is detected instead of silently mis-matched.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::error::CollectiveError;

/// Rank of the coordinator in every group
pub const COORDINATOR_RANK: u32 = 0;

/// Kind of collective operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CollectiveOp {
    Broadcast,
    Gather,
    Reduce,
    Barrier,
}

impl fmt::Display for CollectiveOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CollectiveOp::Broadcast => "broadcast",
            CollectiveOp::Gather => "gather",
            CollectiveOp::Reduce => "reduce",
            CollectiveOp::Barrier => "barrier",
        };
        f.write_str(name)
    }
}

/// Envelope exchanged between participants
#[derive(Debug, Clone)]
pub enum Envelope {
    /// Fan-in (Worker → Coordinator)
    ///
    /// Signals that `src` entered collective `seq`, carrying its contribution
    /// for gather/reduce and nothing for broadcast/barrier.
    Arrive {
        seq: u64,
        op: CollectiveOp,
        src: u32,
        payload: Vec<u8>,
    },

    /// Fan-out (Coordinator → Worker)
    ///
    /// Completes collective `seq`. Carries the broadcast value (empty for the
    /// other operations) and the membership the group continues with.
    Release {
        seq: u64,
        op: CollectiveOp,
        members: Vec<u32>,
        payload: Vec<u8>,
    },

    /// Liveness beacon (both directions)
    Heartbeat { src: u32 },

    /// Eviction notice (Coordinator → evicted Worker)
    Evicted { seq: u64 },
}

impl Envelope {
    /// Rank that sent the envelope, when it names one
    ///
    /// Release and Evicted always come from the coordinator.
    pub fn sender(&self) -> u32 {
        match self {
            Envelope::Arrive { src, .. } | Envelope::Heartbeat { src } => *src,
            Envelope::Release { .. } | Envelope::Evicted { .. } => COORDINATOR_RANK,
        }
    }
}

/// Encode a collective payload
pub fn encode_payload<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, CollectiveError> {
    Ok(rmp_serde::to_vec(value)?)
}

/// Decode a collective payload
pub fn decode_payload<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, CollectiveError> {
    Ok(rmp_serde::from_slice(bytes)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_points_keep_order() {
        let points = vec![(0.5, -0.25), (-1.0, 1.0), (0.0, 0.0)];
        let bytes = encode_payload(&points).unwrap();
        let decoded: Vec<(f64, f64)> = decode_payload(&bytes).unwrap();
        assert_eq!(decoded, points);
    }

    #[test]
    fn test_decode_wrong_type_fails() {
        let bytes = encode_payload("not a number").unwrap();
        let result: Result<u64, _> = decode_payload(&bytes);
        assert!(matches!(result, Err(CollectiveError::Decode(_))));
    }

    #[test]
    fn test_envelope_sender() {
        let arrive = Envelope::Arrive {
            seq: 3,
            op: CollectiveOp::Gather,
            src: 2,
            payload: Vec::new(),
        };
        assert_eq!(arrive.sender(), 2);

        let release = Envelope::Release {
            seq: 3,
            op: CollectiveOp::Gather,
            members: vec![0, 1, 2],
            payload: Vec::new(),
        };
        assert_eq!(release.sender(), COORDINATOR_RANK);
        assert_eq!(Envelope::Heartbeat { src: 5 }.sender(), 5);
    }

    #[test]
    fn test_op_display() {
        assert_eq!(CollectiveOp::Barrier.to_string(), "barrier");
        assert_eq!(CollectiveOp::Reduce.to_string(), "reduce");
    }
}
