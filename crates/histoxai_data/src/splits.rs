//! Stratified dataset splitting.

use std::collections::BTreeMap;

use rand::prelude::*;
use serde::{Deserialize, Serialize};

use crate::dataset::{PatchDataset, PatchSplits};
use crate::error::{DataError, Result};
use histoxai_core::{Seed, Split};

/// Requested number of samples per split.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitSizes {
    /// Training samples.
    pub train: usize,
    /// Validation samples.
    pub valid: usize,
    /// Test samples.
    pub test: usize,
}

impl SplitSizes {
    /// Create split sizes from absolute counts.
    #[must_use]
    pub const fn new(train: usize, valid: usize, test: usize) -> Self {
        Self { train, valid, test }
    }

    /// Total number of requested samples.
    #[must_use]
    pub const fn total(&self) -> usize {
        self.train + self.valid + self.test
    }

    /// Requested size of one split.
    #[must_use]
    pub const fn get(&self, split: Split) -> usize {
        match split {
            Split::Train => self.train,
            Split::Valid => self.valid,
            Split::Test => self.test,
        }
    }
}

impl Default for SplitSizes {
    fn default() -> Self {
        Self::new(8000, 1000, 1000)
    }
}

/// Disjoint index sets into the original collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitIndices {
    /// Training indices.
    pub train: Vec<usize>,
    /// Validation indices.
    pub valid: Vec<usize>,
    /// Test indices.
    pub test: Vec<usize>,
}

impl SplitIndices {
    /// Index set of one split.
    #[must_use]
    pub fn get(&self, split: Split) -> &[usize] {
        match split {
            Split::Train => &self.train,
            Split::Valid => &self.valid,
            Split::Test => &self.test,
        }
    }

    fn get_mut(&mut self, split: Split) -> &mut Vec<usize> {
        match split {
            Split::Train => &mut self.train,
            Split::Valid => &mut self.valid,
            Split::Test => &mut self.test,
        }
    }
}

/// Partition labels into stratified train/valid/test index sets.
///
/// Each class is shuffled once, then every split takes its per-class quota
/// from the front of the remaining indices, so the sets are disjoint by
/// construction. The whole request is first apportioned over the collection's
/// class proportions, then each split in turn takes its share of whatever the
/// earlier splits left, both by largest remainder (ties go to the lower class).
/// No class is ever asked for more samples than it has.
///
/// # Errors
///
/// Returns [`DataError::InfeasibleSplit`] if the requested sizes exceed the
/// collection.
pub fn stratified_split_indices(labels: &[u8], sizes: SplitSizes, seed: Seed) -> Result<SplitIndices> {
    let n = labels.len();
    if sizes.total() > n {
        return Err(DataError::InfeasibleSplit(format!(
            "requested {} samples ({} / {} / {}) but the collection has {}",
            sizes.total(),
            sizes.train,
            sizes.valid,
            sizes.test,
            n
        )));
    }

    let mut by_class: BTreeMap<u8, Vec<usize>> = BTreeMap::new();
    for (idx, &label) in labels.iter().enumerate() {
        by_class.entry(label).or_default().push(idx);
    }

    let mut rng = seed.derive("split").to_rng();
    for indices in by_class.values_mut() {
        indices.shuffle(&mut rng);
    }

    let class_sizes: Vec<usize> = by_class.values().map(Vec::len).collect();
    let mut remaining = apportion(sizes.total(), &class_sizes, n);
    let mut quotas: Vec<Vec<usize>> = Vec::with_capacity(Split::ALL.len());
    for split in Split::ALL {
        let left: usize = remaining.iter().sum();
        let quota = apportion(sizes.get(split), &remaining, left);
        for (r, q) in remaining.iter_mut().zip(&quota) {
            *r -= q;
        }
        quotas.push(quota);
    }

    let mut result = SplitIndices {
        train: Vec::with_capacity(sizes.train),
        valid: Vec::with_capacity(sizes.valid),
        test: Vec::with_capacity(sizes.test),
    };
    let mut cursors = vec![0usize; by_class.len()];

    for (split, quota) in Split::ALL.iter().zip(&quotas) {
        let target = result.get_mut(*split);
        for (k, indices) in by_class.values().enumerate() {
            let start = cursors[k];
            target.extend_from_slice(&indices[start..start + quota[k]]);
            cursors[k] += quota[k];
        }
        target.shuffle(&mut rng);
    }

    Ok(result)
}

/// Split a dataset into stratified train/valid/test subsets.
///
/// # Example
///
/// ```rust,ignore
/// let splits = stratified_split(&dataset, SplitSizes::new(800, 100, 100), Seed::new(42))?;
/// splits.save("data/")?;
/// ```
pub fn stratified_split(dataset: &PatchDataset, sizes: SplitSizes, seed: Seed) -> Result<PatchSplits> {
    let [neg, pos] = dataset.class_counts();
    tracing::info!(samples = dataset.len(), negatives = neg, positives = pos, "splitting collection");

    let indices = stratified_split_indices(dataset.labels(), sizes, seed)?;

    let train = dataset.subset(&indices.train)?;
    let valid = dataset.subset(&indices.valid)?;
    let test = dataset.subset(&indices.test)?;

    for (split, ds) in [(Split::Train, &train), (Split::Valid, &valid), (Split::Test, &test)] {
        let [neg, pos] = ds.class_counts();
        tracing::info!(split = %split, negatives = neg, positives = pos, "class balance");
    }

    Ok(PatchSplits::new(train, valid, test).with_indices(indices))
}

/// Largest-remainder apportionment of `size` over class counts summing to `n`.
///
/// With `size <= n` no quota exceeds its class count.
fn apportion(size: usize, class_sizes: &[usize], n: usize) -> Vec<usize> {
    if n == 0 {
        return vec![0; class_sizes.len()];
    }

    let mut quotas: Vec<usize> = class_sizes.iter().map(|&c| size * c / n).collect();
    let assigned: usize = quotas.iter().sum();

    let mut order: Vec<usize> = (0..class_sizes.len()).collect();
    order.sort_by(|&a, &b| {
        let ra = size * class_sizes[a] % n;
        let rb = size * class_sizes[b] % n;
        rb.cmp(&ra).then(a.cmp(&b))
    });

    for &k in order.iter().take(size - assigned) {
        quotas[k] += 1;
    }

    quotas
}
