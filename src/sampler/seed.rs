//! Per-participant seed material
//!
//! Every participant draws from its own xoshiro256++ stream. The stream is
//! derived from the run's base seed (agreed on during negotiation), the
//! participant's rank and the round number, so a run with a fixed base seed is
//! reproducible rank by rank and round by round.

use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};

/// Golden-ratio increment used to spread ranks apart in seed space
const RANK_STRIDE: u64 = 0x9E37_79B9_7F4A_7C15;

/// Inputs a participant's sampling stream is derived from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedMaterial {
    /// Base seed shared by the whole run
    pub base: u64,
    /// Rank of the sampling participant
    pub rank: u32,
    /// Round number, starting at 1
    pub round: u64,
}

impl SeedMaterial {
    pub fn new(base: u64, rank: u32, round: u64) -> Self {
        Self { base, rank, round }
    }

    /// Collapse the material into a single 64-bit seed
    pub fn seed(&self) -> u64 {
        self.base
            .wrapping_add((self.rank as u64 + 1).wrapping_mul(RANK_STRIDE))
            .rotate_left(17)
            ^ self.round.wrapping_mul(RANK_STRIDE.rotate_left(32))
    }

    /// Fresh PRNG positioned at the start of this material's stream
    pub fn rng(&self) -> Xoshiro256PlusPlus {
        Xoshiro256PlusPlus::seed_from_u64(self.seed())
    }
}

/// Base seed taken from the wall clock, for runs without a configured seed
pub fn clock_seed() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0)
}
