//! Gradient-weighted Class Activation Mapping.
//!
//! Reference: Selvaraju et al., "Grad-CAM: Visual Explanations from Deep
//! Networks via Gradient-based Localization", ICCV 2017.

use burn::prelude::*;
use burn::tensor::activation::relu;
use burn::tensor::backend::AutodiffBackend;
use burn::tensor::module::interpolate;
use burn::tensor::ops::{InterpolateMode, InterpolateOptions};

use crate::attribution::{AttributionMap, AttributionMethod};
use crate::error::{ExplainError, Result};
use histoxai_core::BinaryClassifier;

/// Compute a Grad-CAM heatmap for one image.
///
/// The feature map returned by [`BinaryClassifier::features`] is detached
/// and re-tracked as a gradient leaf, the head is run on it and the output
/// probability is backpropagated. Channel weights are the spatial mean of the
/// gradients; the weighted channel sum is rectified, resized bilinearly to
/// the input resolution and min-max normalized.
///
/// # Arguments
///
/// * `model` - Frozen classifier on an autodiff backend
/// * `image` - Input of shape (C, H, W)
///
/// # Returns
///
/// A normalized (1, H, W) map on the inner backend.
pub fn grad_cam<B, M>(model: &M, image: Tensor<B, 3>) -> Result<AttributionMap<B::InnerBackend>>
where
    B: AutodiffBackend,
    M: BinaryClassifier<B>,
{
    let [c, h, w] = image.dims();
    let input = image.detach().reshape([1, c, h, w]);

    let features = model.features(input).detach().require_grad();
    let probs = model.head(features.clone());
    let grads = probs.sum().backward();

    let feature_grads = features
        .grad(&grads)
        .ok_or(ExplainError::MissingGradient("feature map"))?;
    let features = features.inner();

    // (1, K, h', w') -> (1, K, 1, 1)
    let weights = feature_grads.mean_dim(3).mean_dim(2);
    let cam = relu((features * weights).sum_dim(1));

    let cam = interpolate(cam, [h, w], InterpolateOptions::new(InterpolateMode::Bilinear));
    let map = AttributionMap::new(cam.reshape([1, h, w]), AttributionMethod::GradCam);

    Ok(map.normalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ramp_image, LogisticProbe, PooledProbe, AD};

    #[test]
    fn test_grad_cam_range_and_shape() {
        let device = Default::default();
        let model = PooledProbe::<AD>::new([1.0, 0.5, 2.0], &device);
        let image = ramp_image::<AD>(3, 8, 8, &device);

        let map = grad_cam(&model, image).unwrap();
        assert_eq!(map.shape(), [1, 8, 8]);
        assert_eq!(map.method, AttributionMethod::GradCam);

        let (min, max) = map.range();
        assert_eq!(min, 0.0);
        assert!((max - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_grad_cam_negative_evidence_is_rectified() {
        let device = Default::default();
        // Every channel pushes the output down, so all weights are negative
        // and the rectified map is constant zero.
        let model = PooledProbe::<AD>::new([-1.0, -1.0, -1.0], &device);
        let image = ramp_image::<AD>(3, 6, 6, &device);

        let map = grad_cam(&model, image).unwrap();
        let values: Vec<f32> = map.values.into_data().to_vec().unwrap();
        assert!(values.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_grad_cam_is_deterministic() {
        let device = Default::default();
        let model = LogisticProbe::<AD>::checkerboard(3, 6, 6, &device);
        let image = ramp_image::<AD>(3, 6, 6, &device);

        let a: Vec<f32> = grad_cam(&model, image.clone()).unwrap().values.into_data().to_vec().unwrap();
        let b: Vec<f32> = grad_cam(&model, image).unwrap().values.into_data().to_vec().unwrap();
        assert_eq!(a, b);
    }
}
