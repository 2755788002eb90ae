//! Group transport
//!
//! This module implements the collective-communication substrate the run loop
//! is built on.
//!
//! # Architecture
//!
//! - **Coordinator**: rank 0, the root of every collective
//! - **Workers**: ranks 1..N, contribute to and receive from the coordinator
//! - **Collectives**: broadcast, gather, reduce, barrier; each one a full-group
//!   rendezvous with heartbeat-bounded waits
//!
//! # Modules
//!
//! - `protocol`: Envelope definitions and payload encoding
//! - `group`: Group construction and the per-participant `Communicator`
//! - `error`: Collective failure taxonomy

pub mod error;
pub mod group;
pub mod protocol;

// Re-export key types
pub use error::CollectiveError;
pub use group::{
    create_group,
    Communicator,
    HeartbeatConfig,
    ParticipantContext,
    DEFAULT_HEARTBEAT_INTERVAL,
    DEFAULT_HEARTBEAT_TIMEOUT,
};
pub use protocol::{CollectiveOp, Envelope, COORDINATOR_RANK};
