//! Candidate pool shuffling and per-run random sources.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use hexweave_host::InstanceId;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// In-place Fisher-Yates shuffle.
///
/// Walks `k` from `len - 1` down to 1 and swaps with a uniform index in
/// `[0, k]`, yielding a uniform permutation for a uniform `rng`.
pub fn shuffle<T, R: Rng + ?Sized>(items: &mut [T], rng: &mut R) {
    for k in (1..items.len()).rev() {
        let j = rng.random_range(0..=k);
        items.swap(k, j);
    }
}

/// Combine a configured seed with the instance id into a per-run seed.
pub fn derive_run_seed(seed: u64, instance: InstanceId) -> u64 {
    let mut hasher = DefaultHasher::new();
    seed.hash(&mut hasher);
    instance.hash(&mut hasher);
    hasher.finish()
}

/// Random source for one generation run.
///
/// Deterministic per `(seed, instance)` when a seed is given; otherwise
/// seeded from the thread RNG.
pub fn run_rng(seed: Option<u64>, instance: InstanceId) -> ChaCha8Rng {
    let base = seed.unwrap_or_else(|| rand::rng().random::<u64>());
    ChaCha8Rng::seed_from_u64(derive_run_seed(base, instance))
}
