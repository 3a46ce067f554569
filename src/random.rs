//! Seeded draws from the distributions used by the samplers and simulators.
//!
//! Everything here is layered over [`tinyrand::Rand`], so any generator in that crate can be
//! substituted. Callers own their generators; nothing in this module holds state.

use std::f64::consts::PI;

use tinyrand::{Rand, Seeded, Wyrand};

const F64_MANTISSA_BITS: u32 = 53;

/// Creates a generator from a seed.
pub fn seeded(seed: u64) -> Wyrand {
    Wyrand::seed(seed)
}

/// Derives an independent seed for a numbered stream (a chain, a backtest unit, etc.) from a
/// root seed. Uses the SplitMix64 finaliser so that adjacent stream numbers are decorrelated.
pub fn derive_seed(root: u64, stream: u64) -> u64 {
    let mut z = root ^ stream.wrapping_add(1).wrapping_mul(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// A uniform draw in `[0, 1)`.
#[inline]
pub fn next_f64(rand: &mut impl Rand) -> f64 {
    (rand.next_u64() >> (64 - F64_MANTISSA_BITS)) as f64 / (1u64 << F64_MANTISSA_BITS) as f64
}

/// A uniform index in `0..len`.
#[inline]
pub fn next_index(rand: &mut impl Rand, len: usize) -> usize {
    debug_assert!(len > 0);
    usize::min((next_f64(rand) * len as f64) as usize, len - 1)
}

/// A standard normal draw (Box-Muller; the second variate is discarded).
#[inline]
pub fn next_std_normal(rand: &mut impl Rand) -> f64 {
    let u1 = 1.0 - next_f64(rand);
    let u2 = next_f64(rand);
    (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos()
}

#[inline]
pub fn next_normal(rand: &mut impl Rand, mean: f64, stdev: f64) -> f64 {
    mean + stdev * next_std_normal(rand)
}

/// A Bernoulli trial, returning 1.0 on success and 0.0 otherwise.
#[inline]
pub fn next_bernoulli(rand: &mut impl Rand, prob: f64) -> f64 {
    if next_f64(rand) < prob {
        1.0
    } else {
        0.0
    }
}

/// An unbiased coin flip.
#[inline]
pub fn coin_flip(rand: &mut impl Rand) -> bool {
    rand.next_u64() >> 63 == 1
}
