//! Classifier traits used by evaluation and attribution.
//!
//! The forward pass is split at the last convolutional stage so callers can
//! hold on to the feature map (and re-track it for gradients) without
//! registering hooks on the model.

use burn::prelude::*;

/// Output of a frozen forward pass.
#[derive(Debug, Clone)]
pub struct ClassifierOutput<B: Backend> {
    /// Probability of the positive class, shape (N, 1).
    pub probs: Tensor<B, 2>,
    /// Activations of the last convolutional stage, shape (N, C, h, w).
    pub features: Tensor<B, 4>,
}

/// A single-output patch classifier in inference mode.
///
/// Implementations must be deterministic: no dropout, and normalization
/// layers use their stored statistics regardless of backend.
pub trait BinaryClassifier<B: Backend> {
    /// Run the convolutional trunk.
    ///
    /// # Arguments
    ///
    /// * `images` - Input tensor of shape (N, C, H, W)
    ///
    /// # Returns
    ///
    /// Feature map of the last convolutional stage, shape (N, C', h, w).
    fn features(&self, images: Tensor<B, 4>) -> Tensor<B, 4>;

    /// Map a feature map to positive-class probabilities of shape (N, 1).
    fn head(&self, features: Tensor<B, 4>) -> Tensor<B, 2>;

    /// Forward pass returning both the probability and the feature map.
    fn forward_with_features(&self, images: Tensor<B, 4>) -> ClassifierOutput<B> {
        let features = self.features(images);
        let probs = self.head(features.clone());
        ClassifierOutput { probs, features }
    }

    /// Forward pass returning probabilities only.
    fn predict_proba(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
        self.head(self.features(images))
    }
}

#[cfg(all(test, feature = "backend-ndarray"))]
mod tests {
    use super::*;
    use crate::backend::NdArray;

    /// Mean intensity squashed through a sigmoid.
    struct MeanProbe;

    impl<B: Backend> BinaryClassifier<B> for MeanProbe {
        fn features(&self, images: Tensor<B, 4>) -> Tensor<B, 4> {
            images
        }

        fn head(&self, features: Tensor<B, 4>) -> Tensor<B, 2> {
            let [n, c, h, w] = features.dims();
            let flat = features.reshape([n, c * h * w]);
            burn::tensor::activation::sigmoid(flat.mean_dim(1))
        }
    }

    #[test]
    fn test_forward_with_features_shapes() {
        let device = Default::default();
        let images = Tensor::<NdArray, 4>::zeros([2, 3, 4, 4], &device);

        let output = MeanProbe.forward_with_features(images.clone());
        assert_eq!(output.probs.dims(), [2, 1]);
        assert_eq!(output.features.dims(), [2, 3, 4, 4]);

        let probs: Vec<f32> = MeanProbe.predict_proba(images).into_data().to_vec().unwrap();
        assert!(probs.iter().all(|p| (p - 0.5).abs() < 1e-6));
    }
}
