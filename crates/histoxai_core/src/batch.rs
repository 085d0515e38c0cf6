//! Batches of normalized image patches.

use burn::prelude::*;

use crate::error::{CoreError, Result};
use crate::shape::ImageShape;

/// A batch of normalized patches with their binary labels.
///
/// Images are `(N, C, H, W)` floats in `[0, 1]`; labels are `(N, 1)` floats
/// holding `0.0` or `1.0`. `indices` records which dataset rows the batch
/// was drawn from.
#[derive(Debug, Clone)]
pub struct PatchBatch<B: Backend> {
    /// Input images (N, C, H, W).
    pub images: Tensor<B, 4>,
    /// Binary targets (N, 1).
    pub labels: Tensor<B, 2>,
    /// Dataset row of each sample.
    pub indices: Vec<usize>,
}

impl<B: Backend> PatchBatch<B> {
    /// Create a batch, checking that images, labels and indices agree on N.
    pub fn new(images: Tensor<B, 4>, labels: Tensor<B, 2>, indices: Vec<usize>) -> Result<Self> {
        let [n_images, ..] = images.dims();
        let [n_labels, label_width] = labels.dims();

        if label_width != 1 {
            return Err(CoreError::InvalidShape {
                expected: "(N, 1) labels".to_string(),
                got: format!("(N, {label_width})"),
            });
        }

        if n_images != n_labels || n_images != indices.len() {
            return Err(CoreError::ShapeMismatch(format!(
                "images batch size {} != labels batch size {} (indices: {})",
                n_images,
                n_labels,
                indices.len()
            )));
        }

        Ok(Self {
            images,
            labels,
            indices,
        })
    }

    /// Get the batch size.
    #[must_use]
    pub fn batch_size(&self) -> usize {
        self.indices.len()
    }

    /// Shape of one image in the batch.
    pub fn image_shape(&self) -> ImageShape {
        let [_, c, h, w] = self.images.dims();
        ImageShape::new(c, h, w)
    }

    /// Get the device.
    pub fn device(&self) -> B::Device {
        self.images.device()
    }
}

#[cfg(all(test, feature = "backend-ndarray"))]
mod tests {
    use super::*;
    use crate::backend::NdArray;

    #[test]
    fn test_batch_creation() {
        let device = Default::default();
        let images = Tensor::<NdArray, 4>::zeros([4, 3, 8, 8], &device);
        let labels = Tensor::<NdArray, 2>::ones([4, 1], &device);

        let batch = PatchBatch::new(images, labels, vec![0, 1, 2, 3]).unwrap();
        assert_eq!(batch.batch_size(), 4);
        assert_eq!(batch.image_shape(), ImageShape::new(3, 8, 8));
    }

    #[test]
    fn test_batch_size_mismatch() {
        let device = Default::default();
        let images = Tensor::<NdArray, 4>::zeros([4, 3, 8, 8], &device);
        let labels = Tensor::<NdArray, 2>::ones([3, 1], &device);

        assert!(PatchBatch::new(images, labels, vec![0, 1, 2, 3]).is_err());
    }

    #[test]
    fn test_batch_label_width() {
        let device = Default::default();
        let images = Tensor::<NdArray, 4>::zeros([2, 3, 8, 8], &device);
        let labels = Tensor::<NdArray, 2>::ones([2, 2], &device);

        assert!(PatchBatch::new(images, labels, vec![0, 1]).is_err());
    }
}
