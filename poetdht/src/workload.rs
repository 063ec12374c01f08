//! Benchmark access-pattern generation.
//!
//! Patterns are generated up front from a seeded PRNG so a rank's key
//! sequence is reproducible and the generator cost stays out of the
//! measured loop. Write payloads are drawn inline during measurement; they
//! are part of the operation being measured.

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Bernoulli, Distribution};

use crate::cell::{GridCell, NUM_SPECIES};

#[derive(Debug, Clone, Copy)]
pub struct AccessEntry {
    pub key: i32,
    pub is_read: bool,
}

/// Generate `pattern_len` uniform-random accesses over `[0, total_keys)`,
/// each a read with probability `read_ratio`.
pub fn generate_pattern(
    total_keys: usize,
    read_ratio: f64,
    pattern_len: usize,
    seed: u64,
) -> Vec<AccessEntry> {
    let mut rng = SmallRng::seed_from_u64(seed);
    let read = Bernoulli::new(read_ratio).expect("read ratio in [0, 1]");
    (0..pattern_len)
        .map(|_| AccessEntry {
            key: rng.random_range(0..total_keys as i32),
            is_read: read.sample(&mut rng),
        })
        .collect()
}

/// A payload with uniform-random concentrations in `[0, 1)`.
pub fn random_cell<R: Rng>(rng: &mut R) -> GridCell {
    let mut concentrations = [0.0; NUM_SPECIES];
    for c in &mut concentrations {
        *c = rng.random::<f64>();
    }
    GridCell::with_concentrations(concentrations)
}
