//! Index ordering strategies for loaders.

use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

use histoxai_core::Seed;

/// Produces the visiting order of a pass over `n` samples.
pub trait Sampler {
    /// Get the indices for the next pass.
    fn sample(&mut self, n: usize) -> Vec<usize>;
}

/// Sequential sampler that iterates indices in order.
#[derive(Debug, Clone, Copy, Default)]
pub struct SequentialSampler;

impl Sampler for SequentialSampler {
    fn sample(&mut self, n: usize) -> Vec<usize> {
        (0..n).collect()
    }
}

/// Random sampler that shuffles indices on every pass.
///
/// Successive calls continue the same random stream, so two samplers built
/// from the same seed yield the same sequence of permutations.
#[derive(Debug, Clone)]
pub struct RandomSampler {
    rng: ChaCha8Rng,
}

impl RandomSampler {
    /// Create a new random sampler with a seed.
    #[must_use]
    pub fn new(seed: Seed) -> Self {
        Self { rng: seed.to_rng() }
    }
}

impl Sampler for RandomSampler {
    fn sample(&mut self, n: usize) -> Vec<usize> {
        let mut indices: Vec<usize> = (0..n).collect();
        indices.shuffle(&mut self.rng);
        indices
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequential_sampler() {
        let mut sampler = SequentialSampler;
        assert_eq!(sampler.sample(5), vec![0, 1, 2, 3, 4]);
        assert_eq!(sampler.sample(5), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_random_sampler_determinism() {
        let seed = Seed::new(42);
        let mut sampler1 = RandomSampler::new(seed);
        let mut sampler2 = RandomSampler::new(seed);

        assert_eq!(sampler1.sample(10), sampler2.sample(10));
        assert_eq!(sampler1.sample(10), sampler2.sample(10));
    }

    #[test]
    fn test_random_sampler_is_permutation() {
        let mut sampler = RandomSampler::new(Seed::new(42));
        let indices = sampler.sample(100);

        // Very unlikely to be in order
        let in_order: Vec<usize> = (0..100).collect();
        assert_ne!(indices, in_order);

        let mut sorted = indices;
        sorted.sort_unstable();
        assert_eq!(sorted, in_order);
    }
}
