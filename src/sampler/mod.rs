//! Monte Carlo sampling kernel
//!
//! This module provides the pure sampling function each participant runs on
//! its share of the point budget. Points are drawn uniformly from the square
//! `[-1, 1] x [-1, 1]`; a point is a hit when it falls inside the unit circle,
//! boundary included.
//!
//! # Partitioning
//!
//! A participant's share is `points / group_size` in integer division. The
//! remainder is dropped, so the total actually sampled can be lower than the
//! requested budget; the estimate is always computed against the total
//! actually sampled.
//!
//! # Example
//!
//! ```
//! use pigroup::sampler::{local_budget, sample, SeedMaterial};
//!
//! let budget = local_budget(10, 3);
//! assert_eq!(budget, 3);
//!
//! let local = sample(budget, SeedMaterial::new(1234, 0, 1));
//! assert_eq!(local.points.len(), 3);
//! assert!(local.hits <= 3);
//! ```

pub mod seed;

pub use seed::{clock_seed, SeedMaterial};

use rand::Rng;
use serde::{Deserialize, Serialize};

/// A sampled coordinate pair
pub type Point = (f64, f64);

/// Largest global point budget per round
///
/// The coordinator holds every point of a round at once, 16 bytes each plus
/// their encoded copies while gathering.
pub const MAX_POINTS: u64 = 100_000_000;

/// One participant's sample for one round
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LocalSample {
    /// Points inside the unit circle
    pub hits: u64,
    /// Every sampled point, in sampling order
    pub points: Vec<Point>,
}

/// Whether a point lies inside the unit circle (boundary inclusive)
#[inline(always)]
pub fn is_inside(point: Point) -> bool {
    let (x, y) = point;
    x * x + y * y <= 1.0
}

/// Per-participant share of a global budget
///
/// Returns 0 for an empty group.
pub fn local_budget(points: u64, group_size: u32) -> u64 {
    if group_size == 0 {
        return 0;
    }
    points / group_size as u64
}

/// Sample `budget` points from the stream described by `seed`
pub fn sample(budget: u64, seed: SeedMaterial) -> LocalSample {
    let mut rng = seed.rng();
    sample_with(budget, &mut rng)
}

/// Sample `budget` points from an existing random source
pub fn sample_with<R: Rng + ?Sized>(budget: u64, rng: &mut R) -> LocalSample {
    let mut points = Vec::with_capacity(budget as usize);
    let mut hits = 0u64;

    for _ in 0..budget {
        let point = (rng.gen_range(-1.0..=1.0), rng.gen_range(-1.0..=1.0));
        if is_inside(point) {
            hits += 1;
        }
        points.push(point);
    }

    LocalSample { hits, points }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256PlusPlus;

    #[test]
    fn test_boundary_counts_as_inside() {
        assert!(is_inside((1.0, 0.0)));
        assert!(is_inside((0.0, -1.0)));
        assert!(is_inside((-1.0, 0.0)));
        assert!(is_inside((0.0, 0.0)));
        assert!(!is_inside((1.0, 0.0001)));
        assert!(!is_inside((-0.8, -0.8)));
    }

    #[test]
    fn test_local_budget_truncates() {
        assert_eq!(local_budget(1_000_000, 4), 250_000);
        assert_eq!(local_budget(10, 3), 3);
        assert_eq!(local_budget(2, 4), 0);
        assert_eq!(local_budget(7, 1), 7);
        assert_eq!(local_budget(7, 0), 0);
    }

    #[test]
    fn test_sample_is_deterministic_for_seed() {
        let seed = SeedMaterial::new(99, 2, 5);
        let a = sample(500, seed);
        let b = sample(500, seed);
        assert_eq!(a, b);
    }

    #[test]
    fn test_sample_respects_budget_and_bounds() {
        let local = sample(1000, SeedMaterial::new(1, 0, 1));
        assert_eq!(local.points.len(), 1000);
        assert!(local.hits <= 1000);

        for &(x, y) in &local.points {
            assert!((-1.0..=1.0).contains(&x));
            assert!((-1.0..=1.0).contains(&y));
        }

        let counted = local.points.iter().filter(|&&p| is_inside(p)).count() as u64;
        assert_eq!(counted, local.hits);
    }

    #[test]
    fn test_zero_budget() {
        let local = sample(0, SeedMaterial::new(1, 0, 1));
        assert_eq!(local.hits, 0);
        assert!(local.points.is_empty());
    }

    #[test]
    fn test_sample_with_external_rng() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(12345);
        let local = sample_with(100, &mut rng);
        assert_eq!(local.points.len(), 100);
    }

    #[test]
    fn test_hit_ratio_close_to_quarter_pi() {
        let local = sample(200_000, SeedMaterial::new(2024, 0, 1));
        let estimate = 4.0 * local.hits as f64 / local.points.len() as f64;
        assert!((estimate - std::f64::consts::PI).abs() < 0.02, "estimate {}", estimate);
    }
}
