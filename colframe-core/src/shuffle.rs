//! Seeded row permutations

use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Uniform random permutation of `[0, len)` by Fisher-Yates
pub(crate) fn permutation(len: usize, seed: u64) -> Arc<[usize]> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut order: Vec<usize> = (0..len).collect();
    for i in (1..len).rev() {
        let j = rng.gen_range(0..=i);
        order.swap(i, j);
    }
    order.into()
}

/// Map a logical position to its physical row
#[inline]
pub(crate) fn physical(order: Option<&[usize]>, position: usize) -> usize {
    order.map_or(position, |order| order[position])
}
