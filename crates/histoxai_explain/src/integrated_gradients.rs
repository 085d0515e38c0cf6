//! Integrated Gradients.
//!
//! Reference: Sundararajan et al., "Axiomatic Attribution for Deep Networks", ICML 2017.

use burn::prelude::*;
use burn::tensor::backend::AutodiffBackend;
use serde::{Deserialize, Serialize};

use crate::attribution::{AttributionMap, AttributionMethod};
use crate::error::{ExplainError, Result};
use histoxai_core::BinaryClassifier;

/// Configuration for Integrated Gradients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegratedGradientsConfig {
    /// Number of intervals on the straight-line path; N + 1 points are evaluated.
    pub n_steps: usize,
}

impl Default for IntegratedGradientsConfig {
    fn default() -> Self {
        Self { n_steps: 50 }
    }
}

impl IntegratedGradientsConfig {
    /// Create a config with the given number of steps.
    pub fn new(n_steps: usize) -> Self {
        Self { n_steps }
    }
}

/// Create a zero baseline of shape (C, H, W).
pub fn zero_baseline<B: Backend>(shape: [usize; 3], device: &B::Device) -> Tensor<B, 3> {
    Tensor::zeros(shape, device)
}

/// Compute Integrated Gradients for one image.
///
/// Builds the path `baseline + k/N · (image - baseline)` for `k = 0..=N`,
/// scores all N + 1 points in a single batched forward pass, backpropagates
/// the summed probabilities, averages the input gradients over the path and
/// multiplies by `image - baseline`.
///
/// The result keeps its sign and scale (it is not normalized), so its sum
/// approximates `f(image) - f(baseline)`.
///
/// # Arguments
///
/// * `model` - Frozen classifier on an autodiff backend
/// * `image` - Input of shape (C, H, W)
/// * `baseline` - Reference input of the same shape, typically zeros
/// * `config` - Number of path steps
///
/// # Returns
///
/// A signed (C, H, W) map on the inner backend.
pub fn integrated_gradients<B, M>(
    model: &M,
    image: Tensor<B, 3>,
    baseline: Tensor<B, 3>,
    config: &IntegratedGradientsConfig,
) -> Result<AttributionMap<B::InnerBackend>>
where
    B: AutodiffBackend,
    M: BinaryClassifier<B>,
{
    let [c, h, w] = image.dims();
    if baseline.dims() != [c, h, w] {
        return Err(ExplainError::ShapeMismatch(format!(
            "image {:?} vs baseline {:?}",
            [c, h, w],
            baseline.dims()
        )));
    }
    if config.n_steps == 0 {
        return Err(ExplainError::InvalidConfig("n_steps must be at least 1".to_string()));
    }

    let n_points = config.n_steps + 1;
    let device = image.device();
    let image = image.detach();
    let baseline = baseline.detach();
    let diff = image - baseline.clone();

    let alphas: Vec<f32> = (0..n_points).map(|k| k as f32 / config.n_steps as f32).collect();
    let alphas = Tensor::<B, 1>::from_floats(alphas.as_slice(), &device).reshape([n_points, 1, 1, 1]);

    let path = baseline.reshape([1, c, h, w]).repeat_dim(0, n_points)
        + diff.clone().reshape([1, c, h, w]).repeat_dim(0, n_points) * alphas;
    let path = path.detach().require_grad();

    let probs = model.predict_proba(path.clone());
    let grads = probs.sum().backward();
    let path_grads = path.grad(&grads).ok_or(ExplainError::MissingGradient("interpolation path"))?;

    let avg_grads = path_grads.mean_dim(0).reshape([c, h, w]);
    let values = diff.inner() * avg_grads;

    Ok(AttributionMap::new(values, AttributionMethod::IntegratedGradients))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ramp_image, LogisticProbe, AD};

    fn sum(map: &AttributionMap<<AD as AutodiffBackend>::InnerBackend>) -> f32 {
        map.values.clone().sum().into_scalar()
    }

    #[test]
    fn test_completeness() {
        let device = Default::default();
        let weights: Vec<f32> = (0..27).map(|i| ((i % 7) as f32 - 3.0) * 0.05).collect();
        let model = LogisticProbe::<AD>::new(weights, [3, 3, 3], -0.2, &device);
        let image = ramp_image::<AD>(3, 3, 3, &device);
        let baseline = zero_baseline::<AD>([3, 3, 3], &device);

        let map = integrated_gradients(&model, image.clone(), baseline.clone(), &IntegratedGradientsConfig::new(200))
            .unwrap();
        assert_eq!(map.shape(), [3, 3, 3]);

        let f_image: f32 = model.predict_proba(image.reshape([1, 3, 3, 3])).inner().into_scalar();
        let f_base: f32 = model.predict_proba(baseline.reshape([1, 3, 3, 3])).inner().into_scalar();
        assert!((sum(&map) - (f_image - f_base)).abs() < 1e-2);
    }

    #[test]
    fn test_zero_image_zero_baseline_is_zero() {
        let device = Default::default();
        let model = LogisticProbe::<AD>::checkerboard(3, 4, 4, &device);
        let zeros = zero_baseline::<AD>([3, 4, 4], &device);

        let map = integrated_gradients(&model, zeros.clone(), zeros, &IntegratedGradientsConfig::default()).unwrap();
        let values: Vec<f32> = map.values.into_data().to_vec().unwrap();
        assert!(values.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_result_keeps_sign() {
        let device = Default::default();
        let model = LogisticProbe::<AD>::checkerboard(1, 2, 2, &device);
        let image = Tensor::<AD, 1>::from_floats([1.0, 1.0, 1.0, 1.0], &device).reshape([1, 2, 2]);
        let baseline = zero_baseline::<AD>([1, 2, 2], &device);

        let map = integrated_gradients(&model, image, baseline, &IntegratedGradientsConfig::new(10)).unwrap();
        let values: Vec<f32> = map.values.into_data().to_vec().unwrap();
        assert!(values[0] > 0.0);
        assert!(values[1] < 0.0);
    }

    #[test]
    fn test_shape_mismatch() {
        let device = Default::default();
        let model = LogisticProbe::<AD>::checkerboard(3, 4, 4, &device);
        let image = ramp_image::<AD>(3, 4, 4, &device);
        let baseline = zero_baseline::<AD>([3, 4, 5], &device);

        let err = integrated_gradients(&model, image, baseline, &IntegratedGradientsConfig::default()).unwrap_err();
        assert!(matches!(err, ExplainError::ShapeMismatch(_)));
    }
}
