//! Streaming batch loaders over patch datasets.

use burn::prelude::*;

use crate::dataset::PatchDataset;
use crate::error::{DataError, Result};
use crate::sampler::{RandomSampler, Sampler, SequentialSampler};
use histoxai_core::{PatchBatch, Seed, Split};

/// A loader that produces normalized batches from a patch dataset.
///
/// Pixels stay as u8 in the dataset; each batch is rescaled to `[0, 1]` and
/// reordered to (N, C, H, W) only when it is yielded. Iteration is
/// restartable: every call to [`PatchLoader::iter_epoch`] starts a fresh
/// pass whose order depends only on the seed and the epoch number.
///
/// # Example
///
/// ```rust,ignore
/// use histoxai_data::{PatchDataset, PatchLoader};
/// use histoxai_core::Seed;
///
/// let loader = PatchLoader::builder(dataset)
///     .batch_size(64)
///     .shuffle(true)
///     .seed(Seed::new(42))
///     .build()?;
///
/// for batch in loader.iter_epoch::<B>(epoch, &device) {
///     let batch = batch?;
///     // process batch
/// }
/// ```
#[derive(Debug, Clone)]
pub struct PatchLoader {
    dataset: PatchDataset,
    batch_size: usize,
    shuffle: bool,
    drop_last: bool,
    seed: Seed,
    split: Split,
}

impl PatchLoader {
    /// Create a new loader builder.
    #[must_use]
    pub fn builder(dataset: PatchDataset) -> PatchLoaderBuilder {
        PatchLoaderBuilder::new(dataset)
    }

    /// Get the dataset.
    #[must_use]
    pub fn dataset(&self) -> &PatchDataset {
        &self.dataset
    }

    /// Get the batch size.
    #[must_use]
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Whether the order is reshuffled every pass.
    #[must_use]
    pub fn is_shuffled(&self) -> bool {
        self.shuffle
    }

    /// Get the number of batches per pass.
    #[must_use]
    pub fn n_batches(&self) -> usize {
        let n = self.dataset.len();
        if self.drop_last {
            n / self.batch_size
        } else {
            n.div_ceil(self.batch_size)
        }
    }

    /// Get the total number of samples.
    #[must_use]
    pub fn len(&self) -> usize {
        self.dataset.len()
    }

    /// Check if the loader is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.dataset.is_empty()
    }

    /// Get the data split type.
    #[must_use]
    pub fn split(&self) -> Split {
        self.split
    }

    /// Iterate one pass, ordered as epoch 0.
    #[must_use]
    pub fn iter<B: Backend>(&self, device: &B::Device) -> PatchLoaderIter<'_, B> {
        self.iter_epoch(0, device)
    }

    /// Iterate one pass for the given epoch.
    ///
    /// # Type Parameters
    ///
    /// * `B` - The Burn backend to use for tensors
    #[must_use]
    pub fn iter_epoch<B: Backend>(&self, epoch: usize, device: &B::Device) -> PatchLoaderIter<'_, B> {
        let n = self.dataset.len();
        let indices = if self.shuffle {
            RandomSampler::new(self.seed.for_epoch(epoch)).sample(n)
        } else {
            SequentialSampler.sample(n)
        };
        PatchLoaderIter::new(self, indices, device.clone())
    }
}

/// Builder for [`PatchLoader`].
#[derive(Debug, Clone)]
pub struct PatchLoaderBuilder {
    dataset: PatchDataset,
    batch_size: usize,
    shuffle: bool,
    drop_last: bool,
    seed: Seed,
    split: Split,
}

impl PatchLoaderBuilder {
    /// Create a new builder.
    #[must_use]
    pub fn new(dataset: PatchDataset) -> Self {
        Self {
            dataset,
            batch_size: 64,
            shuffle: false,
            drop_last: false,
            seed: Seed::default(),
            split: Split::Train,
        }
    }

    /// Set the batch size.
    #[must_use]
    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Enable or disable shuffling.
    #[must_use]
    pub fn shuffle(mut self, shuffle: bool) -> Self {
        self.shuffle = shuffle;
        self
    }

    /// Enable or disable dropping the last incomplete batch.
    #[must_use]
    pub fn drop_last(mut self, drop_last: bool) -> Self {
        self.drop_last = drop_last;
        self
    }

    /// Set the random seed for shuffling.
    #[must_use]
    pub fn seed(mut self, seed: Seed) -> Self {
        self.seed = seed;
        self
    }

    /// Set the data split type.
    #[must_use]
    pub fn split(mut self, split: Split) -> Self {
        self.split = split;
        self
    }

    /// Build the loader.
    ///
    /// # Errors
    ///
    /// Returns an error if the batch size is zero or the dataset is empty.
    pub fn build(self) -> Result<PatchLoader> {
        if self.batch_size == 0 {
            return Err(DataError::InvalidBatchSize(
                "Batch size must be greater than 0".to_string(),
            ));
        }

        if self.dataset.is_empty() {
            return Err(DataError::EmptyDataset);
        }

        Ok(PatchLoader {
            dataset: self.dataset,
            batch_size: self.batch_size,
            shuffle: self.shuffle,
            drop_last: self.drop_last,
            seed: self.seed,
            split: self.split,
        })
    }
}

/// Iterator over batches from a [`PatchLoader`].
pub struct PatchLoaderIter<'a, B: Backend> {
    loader: &'a PatchLoader,
    device: B::Device,
    indices: Vec<usize>,
    current_batch: usize,
    n_batches: usize,
}

impl<'a, B: Backend> PatchLoaderIter<'a, B> {
    fn new(loader: &'a PatchLoader, indices: Vec<usize>, device: B::Device) -> Self {
        Self {
            loader,
            device,
            indices,
            current_batch: 0,
            n_batches: loader.n_batches(),
        }
    }

    fn create_batch(&self, indices: &[usize]) -> Result<PatchBatch<B>> {
        let dataset = &self.loader.dataset;
        let batch_size = indices.len();
        let shape = dataset.image_shape();

        let pixels = dataset.normalized_batch(indices)?;
        let images = Tensor::<B, 1>::from_floats(pixels.as_slice(), &self.device)
            .reshape(shape.batched(batch_size));

        let targets: Vec<f32> = indices
            .iter()
            .map(|&i| dataset.label(i).map(f32::from))
            .collect::<Result<_>>()?;
        let labels = Tensor::<B, 1>::from_floats(targets.as_slice(), &self.device).reshape([batch_size, 1]);

        Ok(PatchBatch::new(images, labels, indices.to_vec())?)
    }
}

impl<B: Backend> Iterator for PatchLoaderIter<'_, B> {
    type Item = Result<PatchBatch<B>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.current_batch >= self.n_batches {
            return None;
        }

        let start = self.current_batch * self.loader.batch_size;
        let end = std::cmp::min(start + self.loader.batch_size, self.indices.len());
        self.current_batch += 1;

        tracing::trace!(split = %self.loader.split, start, end, "loading batch");
        Some(self.create_batch(&self.indices[start..end]))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.n_batches - self.current_batch;
        (remaining, Some(remaining))
    }
}

impl<B: Backend> ExactSizeIterator for PatchLoaderIter<'_, B> {}

/// Paired loaders for training and validation.
///
/// # Example
///
/// ```rust,ignore
/// let dls = PatchLoaders::builder(splits.train().clone(), splits.valid().clone())
///     .batch_size(64)
///     .seed(Seed::new(42))
///     .build()?;
/// ```
#[derive(Debug, Clone)]
pub struct PatchLoaders {
    train: PatchLoader,
    valid: PatchLoader,
}

impl PatchLoaders {
    /// Create a new builder.
    #[must_use]
    pub fn builder(train: PatchDataset, valid: PatchDataset) -> PatchLoadersBuilder {
        PatchLoadersBuilder::new(train, valid)
    }

    /// Get the training loader.
    #[must_use]
    pub fn train(&self) -> &PatchLoader {
        &self.train
    }

    /// Get the validation loader.
    #[must_use]
    pub fn valid(&self) -> &PatchLoader {
        &self.valid
    }

    /// Get the batch size.
    #[must_use]
    pub fn batch_size(&self) -> usize {
        self.train.batch_size()
    }
}

/// Builder for [`PatchLoaders`].
#[derive(Debug, Clone)]
pub struct PatchLoadersBuilder {
    train: PatchDataset,
    valid: PatchDataset,
    batch_size: usize,
    shuffle_train: bool,
    seed: Seed,
}

impl PatchLoadersBuilder {
    /// Create a new builder.
    #[must_use]
    pub fn new(train: PatchDataset, valid: PatchDataset) -> Self {
        Self {
            train,
            valid,
            batch_size: 64,
            shuffle_train: true,
            seed: Seed::default(),
        }
    }

    /// Set the batch size for both loaders.
    #[must_use]
    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Enable or disable shuffling for the training loader.
    #[must_use]
    pub fn shuffle_train(mut self, shuffle: bool) -> Self {
        self.shuffle_train = shuffle;
        self
    }

    /// Set the random seed.
    #[must_use]
    pub fn seed(mut self, seed: Seed) -> Self {
        self.seed = seed;
        self
    }

    /// Build the loaders.
    pub fn build(self) -> Result<PatchLoaders> {
        let train = PatchLoader::builder(self.train)
            .batch_size(self.batch_size)
            .shuffle(self.shuffle_train)
            .seed(self.seed.derive("train"))
            .split(Split::Train)
            .build()?;

        let valid = PatchLoader::builder(self.valid)
            .batch_size(self.batch_size)
            .shuffle(false)
            .split(Split::Valid)
            .build()?;

        Ok(PatchLoaders { train, valid })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use histoxai_core::backend::NdArray;
    use ndarray::Array4;

    type B = NdArray;

    fn create_test_dataset(n: usize) -> PatchDataset {
        let images = Array4::from_shape_fn((n, 4, 4, 3), |(i, _, _, c)| ((i * 3 + c) % 256) as u8);
        let labels = (0..n).map(|i| (i % 3 == 0) as u8).collect();
        PatchDataset::from_arrays(images, labels).unwrap()
    }

    #[test]
    fn test_loader_builder() {
        let loader = PatchLoader::builder(create_test_dataset(100))
            .batch_size(32)
            .shuffle(true)
            .build()
            .unwrap();

        assert_eq!(loader.batch_size(), 32);
        assert_eq!(loader.n_batches(), 4); // ceil(100/32) = 4
    }

    #[test]
    fn test_loader_rejects_bad_config() {
        let ds = create_test_dataset(4);
        assert!(matches!(
            PatchLoader::builder(ds).batch_size(0).build(),
            Err(DataError::InvalidBatchSize(_))
        ));

        let empty = PatchDataset::empty(histoxai_core::ImageShape::new(3, 4, 4));
        assert!(matches!(PatchLoader::builder(empty).build(), Err(DataError::EmptyDataset)));
    }

    #[test]
    fn test_loader_n_batches() {
        let ds = create_test_dataset(100);

        let loader = PatchLoader::builder(ds.clone()).batch_size(32).drop_last(false).build().unwrap();
        assert_eq!(loader.n_batches(), 4);

        let loader = PatchLoader::builder(ds).batch_size(32).drop_last(true).build().unwrap();
        assert_eq!(loader.n_batches(), 3);
    }

    #[test]
    fn test_batches_are_normalized_channel_first() {
        let device = Default::default();
        let ds = create_test_dataset(5);
        let loader = PatchLoader::builder(ds.clone()).batch_size(2).build().unwrap();

        let batches: Vec<PatchBatch<B>> = loader.iter::<B>(&device).map(|b| b.unwrap()).collect();
        assert_eq!(batches.len(), 3);
        assert_eq!(batches[0].images.dims(), [2, 3, 4, 4]);
        assert_eq!(batches[2].images.dims(), [1, 3, 4, 4]);

        let first: Vec<f32> = batches[1].images.clone().into_data().to_vec().unwrap();
        let expected: Vec<f32> = ds.normalized_image(2).unwrap().iter().copied().collect();
        assert_eq!(&first[..48], expected.as_slice());

        let labels: Vec<f32> = batches[0].labels.clone().into_data().to_vec().unwrap();
        assert_eq!(labels, vec![1.0, 0.0]);
        assert_eq!(batches[2].indices, vec![4]);
    }

    #[test]
    fn test_shuffle_is_restartable_per_epoch() {
        let device = Default::default();
        let loader = PatchLoader::builder(create_test_dataset(50))
            .batch_size(50)
            .shuffle(true)
            .seed(Seed::new(5))
            .build()
            .unwrap();

        let order = |epoch: usize| -> Vec<usize> {
            loader
                .iter_epoch::<B>(epoch, &device)
                .flat_map(|b| b.unwrap().indices)
                .collect()
        };

        assert_eq!(order(0), order(0));
        assert_ne!(order(0), order(1));

        let mut sorted = order(1);
        sorted.sort_unstable();
        assert_eq!(sorted, (0..50).collect::<Vec<_>>());
    }

    #[test]
    fn test_loaders_builder() {
        let dls = PatchLoaders::builder(create_test_dataset(100), create_test_dataset(20))
            .batch_size(32)
            .seed(Seed::new(42))
            .build()
            .unwrap();

        assert_eq!(dls.batch_size(), 32);
        assert_eq!(dls.train().len(), 100);
        assert_eq!(dls.valid().len(), 20);
        assert!(dls.train().is_shuffled());
        assert!(!dls.valid().is_shuffled());
        assert_eq!(dls.valid().split(), Split::Valid);
    }
}
