//! Vanilla gradient saliency.

use burn::prelude::*;
use burn::tensor::backend::AutodiffBackend;

use crate::attribution::{AttributionMap, AttributionMethod};
use crate::error::{ExplainError, Result};
use histoxai_core::BinaryClassifier;

/// Compute a saliency map: the absolute gradient of the output probability
/// with respect to each input pixel, maximized over channels and min-max
/// normalized.
///
/// # Arguments
///
/// * `model` - Frozen classifier on an autodiff backend
/// * `image` - Input of shape (C, H, W)
///
/// # Returns
///
/// A normalized (1, H, W) map on the inner backend.
pub fn saliency<B, M>(model: &M, image: Tensor<B, 3>) -> Result<AttributionMap<B::InnerBackend>>
where
    B: AutodiffBackend,
    M: BinaryClassifier<B>,
{
    let [c, h, w] = image.dims();
    let input = image.detach().reshape([1, c, h, w]).require_grad();

    let probs = model.predict_proba(input.clone());
    let grads = probs.sum().backward();
    let input_grads = input.grad(&grads).ok_or(ExplainError::MissingGradient("input image"))?;

    let values = input_grads.abs().max_dim(1).reshape([1, h, w]);
    Ok(AttributionMap::new(values, AttributionMethod::Saliency).normalize())
}
