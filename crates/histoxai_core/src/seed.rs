//! Deterministic random number generation utilities.

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// A seed for deterministic random number generation.
///
/// Every random decision in a run (split assignment, per-epoch shuffling,
/// parameter initialization order) is drawn from a stream derived from one
/// master seed, so a run is reproducible from its configuration alone.
///
/// # Example
///
/// ```rust
/// use histoxai_core::Seed;
/// use rand::Rng;
///
/// let mut rng = Seed::new(42).to_rng();
/// let mut rng2 = Seed::new(42).to_rng();
///
/// let val1: f32 = rng.gen();
/// let val2: f32 = rng2.gen();
/// assert_eq!(val1, val2);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Seed(u64);

impl Seed {
    /// Create a new seed with the given value.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Get the underlying seed value.
    #[must_use]
    pub const fn value(&self) -> u64 {
        self.0
    }

    /// Create a new random number generator from this seed.
    #[must_use]
    pub fn to_rng(&self) -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(self.0)
    }

    /// Derive a new seed from this seed using a key.
    ///
    /// Independent random streams (split assignment, loader shuffling) are
    /// derived from one master seed by key. The value is a 64-bit FNV-1a hash
    /// of the seed's little-endian bytes followed by the key's UTF-8 bytes,
    /// finished with the SplitMix64 mixer, so it never changes between
    /// platforms or toolchains.
    ///
    /// # Example
    ///
    /// ```rust
    /// use histoxai_core::Seed;
    ///
    /// let master = Seed::new(42);
    /// let split_seed = master.derive("split");
    /// let shuffle_seed = master.derive("train");
    ///
    /// assert_ne!(split_seed.value(), shuffle_seed.value());
    /// ```
    #[must_use]
    pub fn derive(&self, key: &str) -> Self {
        let hash = self
            .0
            .to_le_bytes()
            .iter()
            .chain(key.as_bytes())
            .fold(FNV_OFFSET_BASIS, |h, &byte| (h ^ u64::from(byte)).wrapping_mul(FNV_PRIME));
        Self(splitmix64(hash))
    }

    /// Seed for the shuffling order of one pass over a split.
    #[must_use]
    pub fn for_epoch(&self, epoch: usize) -> Self {
        self.derive(&format!("epoch-{epoch}"))
    }
}

const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0100_0000_01b3;

fn splitmix64(mut z: u64) -> u64 {
    z = z.wrapping_add(0x9e37_79b9_7f4a_7c15);
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}

impl Default for Seed {
    fn default() -> Self {
        Self::new(42)
    }
}

impl From<u64> for Seed {
    fn from(value: u64) -> Self {
        Self::new(value)
    }
}

impl From<Seed> for u64 {
    fn from(seed: Seed) -> Self {
        seed.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    #[test]
    fn test_seed_reproducibility() {
        let mut rng1 = Seed::new(42).to_rng();
        let mut rng2 = Seed::new(42).to_rng();

        for _ in 0..100 {
            let val1: f64 = rng1.gen();
            let val2: f64 = rng2.gen();
            assert_eq!(val1, val2);
        }
    }

    #[test]
    fn test_seed_derive() {
        let master = Seed::new(42);
        let derived1 = master.derive("split");
        let derived2 = master.derive("train");
        let derived1_again = master.derive("split");

        assert_ne!(derived1.value(), derived2.value());
        assert_eq!(derived1.value(), derived1_again.value());
    }

    #[test]
    fn test_derived_values_are_fixed() {
        // Persisted splits depend on these exact values.
        assert_eq!(Seed::new(42).derive("split").value(), 0x9705_55cc_2d8d_dcf8);
        assert_eq!(Seed::new(42).derive("train").value(), 0xea15_a0fc_fad5_0c0a);
        assert_eq!(Seed::new(0).derive("").value(), 0x5ba3_14b8_cfda_3b6b);
        assert_eq!(Seed::new(42).for_epoch(0).value(), 0xbf08_85da_c386_fde2);
    }

    #[test]
    fn test_epoch_seeds_differ() {
        let seed = Seed::new(7);
        assert_ne!(seed.for_epoch(0), seed.for_epoch(1));
        assert_eq!(seed.for_epoch(3), seed.for_epoch(3));
    }

    #[test]
    fn test_seed_serialization() {
        let seed = Seed::new(12345);
        let json = serde_json::to_string(&seed).unwrap();
        assert_eq!(json, "12345");
        let restored: Seed = serde_json::from_str(&json).unwrap();
        assert_eq!(seed, restored);
    }
}
