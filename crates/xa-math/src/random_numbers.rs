//! Random number generation.
//!
//! [`MersenneTwisterUniformRng`] wraps `rand_mt`'s 64-bit Mersenne Twister
//! and implements [`rand::RngCore`], so it plugs into any `rand`
//! distribution. [`GaussianSequenceGenerator`] draws vectors of independent
//! standard normals by inverting the normal CDF on open-interval uniforms;
//! it is generic over the underlying generator.

use crate::distributions::normal_cdf_inverse;
use rand::distributions::Open01;
use rand::{Rng, RngCore};
use rand_mt::Mt19937GenRand64;
use xa_core::Real;

/// Uniform pseudo-random generator based on MT19937-64.
#[derive(Clone)]
pub struct MersenneTwisterUniformRng {
    rng: Mt19937GenRand64,
}

impl std::fmt::Debug for MersenneTwisterUniformRng {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("MersenneTwisterUniformRng")
    }
}

impl MersenneTwisterUniformRng {
    /// Create a new generator with the given seed.
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mt19937GenRand64::new(seed),
        }
    }

    /// Next uniform deviate in `[0, 1)`.
    pub fn next_real(&mut self) -> Real {
        // 53 random mantissa bits
        (self.rng.next_u64() >> 11) as Real * (1.0 / (1u64 << 53) as Real)
    }
}

impl RngCore for MersenneTwisterUniformRng {
    fn next_u32(&mut self) -> u32 {
        self.rng.next_u32()
    }

    fn next_u64(&mut self) -> u64 {
        self.rng.next_u64()
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        for chunk in dest.chunks_mut(8) {
            let bytes = self.rng.next_u64().to_le_bytes();
            chunk.copy_from_slice(&bytes[..chunk.len()]);
        }
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
        self.fill_bytes(dest);
        Ok(())
    }
}

/// Generator of `dimension`-sized vectors of independent standard normal
/// deviates.
#[derive(Debug, Clone)]
pub struct GaussianSequenceGenerator<R = MersenneTwisterUniformRng> {
    rng: R,
    dimension: usize,
}

impl GaussianSequenceGenerator<MersenneTwisterUniformRng> {
    /// Mersenne-Twister backed generator with the given seed.
    pub fn new(dimension: usize, seed: u64) -> Self {
        Self::with_rng(dimension, MersenneTwisterUniformRng::new(seed))
    }
}

impl<R: RngCore> GaussianSequenceGenerator<R> {
    /// Wrap an arbitrary uniform generator.
    pub fn with_rng(dimension: usize, rng: R) -> Self {
        Self { rng, dimension }
    }

    /// Length of the generated sequences.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Next standard normal deviate.
    pub fn next_normal(&mut self) -> Real {
        let u: Real = self.rng.sample(Open01);
        normal_cdf_inverse(u)
    }

    /// Fill `out` with standard normal deviates.
    pub fn fill(&mut self, out: &mut [Real]) {
        for v in out.iter_mut() {
            *v = self.next_normal();
        }
    }

    /// Next vector of `dimension` standard normal deviates.
    pub fn next_sequence(&mut self) -> Vec<Real> {
        let mut out = vec![0.0; self.dimension];
        self.fill(&mut out);
        out
    }
}
