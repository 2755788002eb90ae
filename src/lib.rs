//! pigroup - Group-coordinated Monte Carlo estimation of pi
//!
//! A fixed-size group of participants jointly estimates pi by independent
//! random sampling. Partial results are combined through group collectives
//! (broadcast, gather, reduce, barrier) rooted at a coordinator.
//!
//! # Architecture
//!
//! - **Sampler**: Pure per-participant sampling kernel
//! - **Group transport**: In-process collectives with heartbeat liveness
//! - **Run loop**: One-shot or indefinite rounds, stopped only by the coordinator
//! - **Outputs**: Console progress, point views, JSON run report

pub mod config;
pub mod distributed;
pub mod output;
pub mod run;
pub mod sampler;
pub mod stats;
pub mod util;
pub mod view;

// Re-export commonly used types
pub use config::Config;
pub use run::{RunParameters, RunState};

/// Result type used throughout pigroup
pub type Result<T> = anyhow::Result<T>;
