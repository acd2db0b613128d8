//! Module `math::fast_rng`.
//!
//! Implements reproducible pseudo-random streams and the Gaussian sequence generator
//! that hands each Monte Carlo sample exactly `dimension` standard normal draws.
//!
//! Key types and purpose: `FastRng` (seeded uniform source), `GaussianSequenceGenerator`
//! (per-sample normal vectors), `stream_seed` (independent substreams for parallel workers).
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, StandardNormal};
use serde::{Deserialize, Serialize};

use crate::math::fast_norm::inverse_normal_cdf;

/// Generator backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FastRngKind {
    /// Xoshiro256++ with inverse-CDF normals.
    #[default]
    Xoshiro256PlusPlus,
    /// `rand`'s standard generator with Ziggurat normals.
    StdRng,
}

#[derive(Debug, Clone)]
pub struct Xoshiro256PlusPlus {
    state: [u64; 4],
}

impl Xoshiro256PlusPlus {
    #[inline]
    pub fn seed_from_u64(seed: u64) -> Self {
        let mut sm = SplitMix64::new(seed);
        let mut state = [0_u64; 4];
        for item in &mut state {
            *item = sm.next_u64();
        }

        if state.iter().all(|&x| x == 0) {
            state[0] = 1;
        }

        Self { state }
    }

    #[inline]
    pub fn next_u64(&mut self) -> u64 {
        let result = (self.state[0].wrapping_add(self.state[3]))
            .rotate_left(23)
            .wrapping_add(self.state[0]);

        let t = self.state[1] << 17;

        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];

        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);

        result
    }

    #[inline]
    pub fn next_f64(&mut self) -> f64 {
        let x = self.next_u64() >> 11;
        x as f64 * (1.0 / ((1_u64 << 53) as f64))
    }
}

#[derive(Debug, Clone)]
pub enum FastRng {
    Xoshiro256PlusPlus(Xoshiro256PlusPlus),
    StdRng(StdRng),
}

impl FastRng {
    #[inline]
    pub fn from_seed(kind: FastRngKind, seed: u64) -> Self {
        match kind {
            FastRngKind::Xoshiro256PlusPlus => {
                Self::Xoshiro256PlusPlus(Xoshiro256PlusPlus::seed_from_u64(seed))
            }
            FastRngKind::StdRng => Self::StdRng(StdRng::seed_from_u64(seed)),
        }
    }

    #[inline]
    pub fn random_f64(&mut self) -> f64 {
        match self {
            Self::Xoshiro256PlusPlus(rng) => rng.next_f64(),
            Self::StdRng(rng) => rng.random::<f64>(),
        }
    }

    #[inline]
    pub fn random_u64(&mut self) -> u64 {
        match self {
            Self::Xoshiro256PlusPlus(rng) => rng.next_u64(),
            Self::StdRng(rng) => rng.random::<u64>(),
        }
    }

    #[inline]
    pub fn standard_normal(&mut self) -> f64 {
        match self {
            Self::Xoshiro256PlusPlus(rng) => inverse_normal_cdf(uniform_open01(rng.next_f64())),
            Self::StdRng(rng) => StandardNormal.sample(rng),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct SplitMix64 {
    state: u64,
}

impl SplitMix64 {
    #[inline]
    fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    #[inline]
    fn next_u64(&mut self) -> u64 {
        self.state = self.state.wrapping_add(0x9E37_79B9_7F4A_7C15);
        let mut z = self.state;
        z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
        z ^ (z >> 31)
    }
}

/// Seed of substream `stream_index` derived from `base_seed`.
#[inline]
pub fn stream_seed(base_seed: u64, stream_index: usize) -> u64 {
    base_seed.wrapping_add((stream_index as u64).wrapping_mul(7_919))
}

/// Maps [0, 1) → (ε, 1−ε) for safe inverse-CDF transformation.
#[inline(always)]
pub fn uniform_open01(u: f64) -> f64 {
    u.max(f64::EPSILON).min(1.0 - f64::EPSILON)
}

/// Draws fixed-length vectors of independent standard normals.
///
/// One call to [`next_sequence`](Self::next_sequence) supplies all the randomness a
/// single trajectory consumes.
#[derive(Debug, Clone)]
pub struct GaussianSequenceGenerator {
    rng: FastRng,
    sequence: Vec<f64>,
}

impl GaussianSequenceGenerator {
    pub fn new(kind: FastRngKind, dimension: usize, seed: u64) -> Self {
        Self {
            rng: FastRng::from_seed(kind, seed),
            sequence: vec![0.0; dimension],
        }
    }

    #[inline]
    pub fn dimension(&self) -> usize {
        self.sequence.len()
    }

    /// Refills and returns the next normal vector.
    #[inline]
    pub fn next_sequence(&mut self) -> &[f64] {
        for z in &mut self.sequence {
            *z = self.rng.standard_normal();
        }
        &self.sequence
    }
}
