//! Image patch dataset types.

use std::path::Path;

use burn::prelude::*;
use ndarray::{Array3, Array4, ArrayView3, Axis};

use crate::error::{DataError, Result};
use crate::splits::SplitIndices;
use histoxai_core::{ImageShape, Split};

/// A labeled collection of image patches.
///
/// Pixels are stored as the raw `(N, H, W, C)` u8 container; normalization
/// to `[0, 1]` floats in channel-leading layout happens per batch, so the
/// float version of the whole collection is never held in memory.
///
/// # Example
///
/// ```rust,ignore
/// use histoxai_data::PatchDataset;
/// use ndarray::Array4;
///
/// let images = Array4::<u8>::zeros((100, 96, 96, 3));
/// let labels = vec![0u8; 100];
/// let dataset = PatchDataset::from_arrays(images, labels)?;
/// ```
#[derive(Debug, Clone)]
pub struct PatchDataset {
    /// Pixels (N, H, W, C).
    images: Array4<u8>,
    /// Binary labels, one per patch.
    labels: Vec<u8>,
}

impl PatchDataset {
    /// Create a new dataset from a pixel container and labels.
    ///
    /// # Errors
    ///
    /// Returns an error if the sample counts differ or a label is not 0/1.
    pub fn from_arrays(images: Array4<u8>, labels: Vec<u8>) -> Result<Self> {
        let n_samples = images.shape()[0];

        if labels.len() != n_samples {
            return Err(DataError::InvalidShape(format!(
                "images has {} samples but labels has {} entries",
                n_samples,
                labels.len()
            )));
        }

        if let Some((index, &label)) = labels.iter().enumerate().find(|(_, &l)| l > 1) {
            return Err(DataError::InvalidLabel {
                index,
                label: i64::from(label),
            });
        }

        Ok(Self { images, labels })
    }

    /// Create an empty dataset with the given patch shape.
    #[must_use]
    pub fn empty(shape: ImageShape) -> Self {
        Self {
            images: Array4::zeros((0, shape.height(), shape.width(), shape.channels())),
            labels: Vec::new(),
        }
    }

    /// Get the number of samples.
    #[must_use]
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// Check if the dataset is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Shape of one patch in channel-leading layout.
    #[must_use]
    pub fn image_shape(&self) -> ImageShape {
        let s = self.images.shape();
        ImageShape::new(s[3], s[1], s[2])
    }

    /// The raw pixel container (N, H, W, C).
    #[must_use]
    pub fn images(&self) -> &Array4<u8> {
        &self.images
    }

    /// All labels in row order.
    #[must_use]
    pub fn labels(&self) -> &[u8] {
        &self.labels
    }

    /// Get one label.
    pub fn label(&self, index: usize) -> Result<u8> {
        self.labels
            .get(index)
            .copied()
            .ok_or(DataError::IndexOutOfBounds {
                index,
                length: self.len(),
            })
    }

    /// Get one patch as stored (H, W, C).
    pub fn image(&self, index: usize) -> Result<ArrayView3<'_, u8>> {
        self.check_index(index)?;
        Ok(self.images.index_axis(Axis(0), index))
    }

    /// Number of negative and positive samples.
    #[must_use]
    pub fn class_counts(&self) -> [usize; 2] {
        let positives = self.labels.iter().filter(|&&l| l == 1).count();
        [self.len() - positives, positives]
    }

    /// Fraction of positive samples (0 for an empty dataset).
    #[must_use]
    pub fn positive_fraction(&self) -> f32 {
        if self.is_empty() {
            return 0.0;
        }
        self.class_counts()[1] as f32 / self.len() as f32
    }

    /// One patch rescaled to `[0, 1]` in (C, H, W) layout.
    pub fn normalized_image(&self, index: usize) -> Result<Array3<f32>> {
        let image = self.image(index)?;
        Ok(image
            .permuted_axes([2, 0, 1])
            .mapv(|v| f32::from(v) / 255.0)
            .as_standard_layout()
            .into_owned())
    }

    /// One normalized patch as a `(C, H, W)` tensor.
    pub fn image_tensor<B: Backend>(&self, index: usize, device: &B::Device) -> Result<Tensor<B, 3>> {
        let shape = self.image_shape();
        let data: Vec<f32> = self.normalized_image(index)?.iter().copied().collect();
        Ok(Tensor::<B, 1>::from_floats(data.as_slice(), device).reshape(shape.as_array()))
    }

    /// Normalized pixels of several patches, flattened in (N, C, H, W) order.
    pub(crate) fn normalized_batch(&self, indices: &[usize]) -> Result<Vec<f32>> {
        let mut out = Vec::with_capacity(indices.len() * self.image_shape().numel());
        for &idx in indices {
            let image = self.image(idx)?;
            out.extend(image.permuted_axes([2, 0, 1]).iter().map(|&v| f32::from(v) / 255.0));
        }
        Ok(out)
    }

    /// Get a subset of samples by indices, in the given order.
    pub fn subset(&self, indices: &[usize]) -> Result<Self> {
        for &idx in indices {
            self.check_index(idx)?;
        }

        let images = self.images.select(Axis(0), indices);
        let labels = indices.iter().map(|&i| self.labels[i]).collect();

        Ok(Self { images, labels })
    }

    fn check_index(&self, index: usize) -> Result<()> {
        if index >= self.len() {
            return Err(DataError::IndexOutOfBounds {
                index,
                length: self.len(),
            });
        }
        Ok(())
    }
}

/// The three persisted subsets of a patch collection.
///
/// # Example
///
/// ```rust,ignore
/// use histoxai_data::PatchSplits;
///
/// let splits = PatchSplits::load("data/")?;
/// println!("{} training patches", splits.train().len());
/// ```
#[derive(Debug, Clone)]
pub struct PatchSplits {
    train: PatchDataset,
    valid: PatchDataset,
    test: PatchDataset,
    indices: Option<SplitIndices>,
}

impl PatchSplits {
    /// Bundle three subsets.
    #[must_use]
    pub fn new(train: PatchDataset, valid: PatchDataset, test: PatchDataset) -> Self {
        Self {
            train,
            valid,
            test,
            indices: None,
        }
    }

    /// Attach the index sets the subsets were drawn with.
    #[must_use]
    pub fn with_indices(mut self, indices: SplitIndices) -> Self {
        self.indices = Some(indices);
        self
    }

    /// Get the training dataset.
    #[must_use]
    pub fn train(&self) -> &PatchDataset {
        &self.train
    }

    /// Get the validation dataset.
    #[must_use]
    pub fn valid(&self) -> &PatchDataset {
        &self.valid
    }

    /// Get the test dataset.
    #[must_use]
    pub fn test(&self) -> &PatchDataset {
        &self.test
    }

    /// Get a subset by kind.
    #[must_use]
    pub fn get(&self, split: Split) -> &PatchDataset {
        match split {
            Split::Train => &self.train,
            Split::Valid => &self.valid,
            Split::Test => &self.test,
        }
    }

    /// Index sets into the original collection, if known.
    #[must_use]
    pub fn indices(&self) -> Option<&SplitIndices> {
        self.indices.as_ref()
    }

    /// Write each subset to `<dir>/<split>.npz`, plus `splits.json` when
    /// the index sets are known.
    pub fn save(&self, dir: impl AsRef<Path>) -> Result<()> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;

        for split in Split::ALL {
            let path = dir.join(split.file_name());
            crate::io::write_patches(self.get(split), &path)?;
            tracing::info!(split = %split, path = %path.display(), samples = self.get(split).len(), "saved split");
        }

        if let Some(indices) = &self.indices {
            let path = dir.join(crate::SPLIT_INDEX_FILE);
            std::fs::write(&path, serde_json::to_string_pretty(indices)?)?;
        }

        Ok(())
    }

    /// Load subsets previously written by [`PatchSplits::save`].
    pub fn load(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        let read = |split: Split| -> Result<PatchDataset> {
            let path = dir.join(split.file_name());
            if !path.exists() {
                return Err(DataError::MissingFile(path));
            }
            crate::io::read_patches(&path)
        };

        let mut splits = Self::new(read(Split::Train)?, read(Split::Valid)?, read(Split::Test)?);

        // Every split must hold patches of the training shape.
        let shape = splits.train.image_shape();
        shape.check(splits.valid.image_shape().as_array())?;
        shape.check(splits.test.image_shape().as_array())?;

        let index_path = dir.join(crate::SPLIT_INDEX_FILE);
        if index_path.exists() {
            let json = std::fs::read_to_string(&index_path)?;
            splits.indices = Some(serde_json::from_str(&json)?);
        }

        Ok(splits)
    }
}
