//! Deterministic RNG utilities for reproducible tests.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use reach_core::types::Bounds;

/// Create a deterministic `ChaCha8Rng` from a seed.
pub fn seeded_rng(seed: u64) -> ChaCha8Rng {
    ChaCha8Rng::seed_from_u64(seed)
}

/// `count` positions drawn uniformly inside `bounds`, reproducible per seed.
pub fn positions_in(bounds: &Bounds, count: usize, seed: u64) -> Vec<[f64; 3]> {
    let mut rng = seeded_rng(seed);
    (0..count)
        .map(|_| {
            let mut p = [0.0; 3];
            for (axis, value) in p.iter_mut().enumerate() {
                let (lo, hi) = (bounds.min[axis], bounds.max[axis]);
                *value = if hi > lo { rng.gen_range(lo..=hi) } else { lo };
            }
            p
        })
        .collect()
}

/// A uniformly distributed unit quaternion `[x, y, z, w]`.
pub fn random_orientation(rng: &mut impl Rng) -> [f64; 4] {
    use std::f64::consts::TAU;
    let (u1, u2, u3): (f64, f64, f64) = (rng.r#gen(), rng.r#gen(), rng.r#gen());
    let (a, b) = ((1.0 - u1).sqrt(), u1.sqrt());
    [
        a * (TAU * u2).sin(),
        a * (TAU * u2).cos(),
        b * (TAU * u3).sin(),
        b * (TAU * u3).cos(),
    ]
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
