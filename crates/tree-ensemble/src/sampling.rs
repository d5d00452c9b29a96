//! Row and Column Sampling

use rand::seq::index;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Seeded RNG when a seed is given, entropy-seeded otherwise
pub fn seeded_rng(seed: Option<u64>) -> ChaCha8Rng {
    match seed {
        Some(seed) => ChaCha8Rng::seed_from_u64(seed),
        None => ChaCha8Rng::from_entropy(),
    }
}

/// Draw `round(n * fraction)` distinct indices out of `0..n` (at least one)
pub fn subsample(rng: &mut ChaCha8Rng, n: usize, fraction: f64) -> Vec<usize> {
    if fraction >= 1.0 {
        return (0..n).collect();
    }
    let amount = ((n as f64 * fraction).round() as usize).clamp(1, n);
    let mut picked = index::sample(rng, n, amount).into_vec();
    picked.sort_unstable();
    picked
}

/// Draw `n` indices out of `0..n` with replacement
pub fn bootstrap(rng: &mut ChaCha8Rng, n: usize) -> Vec<usize> {
    (0..n).map(|_| rng.gen_range(0..n)).collect()
}
