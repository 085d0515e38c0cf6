//! Occlusion sensitivity.
//!
//! A square patch is slid over the image and zero-filled; every masked copy
//! is scored by the classifier and its raw positive-class confidence is
//! written over the patch region. Positions are visited row-major and later
//! writes overwrite earlier ones where patches overlap, so with
//! `stride < patch_size` each pixel holds the confidence of the last patch
//! covering it. Pixels no patch covers keep zero.

use burn::prelude::*;
use serde::{Deserialize, Serialize};

use crate::attribution::{AttributionMap, AttributionMethod};
use crate::error::{ExplainError, Result};
use histoxai_core::BinaryClassifier;

/// Configuration for occlusion sensitivity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OcclusionConfig {
    /// Side of the square occluding patch.
    pub patch_size: usize,
    /// Step between patch positions.
    pub stride: usize,
    /// Number of masked copies scored per forward pass.
    pub batch_size: usize,
}

impl Default for OcclusionConfig {
    fn default() -> Self {
        Self {
            patch_size: 16,
            stride: 8,
            batch_size: 64,
        }
    }
}

impl OcclusionConfig {
    /// Set the patch size.
    #[must_use]
    pub fn with_patch_size(mut self, patch_size: usize) -> Self {
        self.patch_size = patch_size;
        self
    }

    /// Set the stride.
    #[must_use]
    pub fn with_stride(mut self, stride: usize) -> Self {
        self.stride = stride;
        self
    }

    /// Set the forward batch size.
    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    fn validate(&self, h: usize, w: usize) -> Result<()> {
        if self.patch_size == 0 || self.stride == 0 || self.batch_size == 0 {
            return Err(ExplainError::InvalidConfig(format!(
                "patch_size, stride and batch_size must be positive, got {:?}",
                self
            )));
        }
        if self.patch_size > h || self.patch_size > w {
            return Err(ExplainError::InvalidConfig(format!(
                "patch size {} exceeds image {}x{}",
                self.patch_size, h, w
            )));
        }
        Ok(())
    }
}

/// Top-left corners of all patch positions, row-major.
///
/// Coordinates run `0, stride, 2·stride, …` up to `side - patch_size`.
pub fn occlusion_positions(h: usize, w: usize, patch_size: usize, stride: usize) -> Vec<(usize, usize)> {
    if patch_size == 0 || stride == 0 || patch_size > h || patch_size > w {
        return Vec::new();
    }

    let mut positions = Vec::new();
    for y in (0..=h - patch_size).step_by(stride) {
        for x in (0..=w - patch_size).step_by(stride) {
            positions.push((y, x));
        }
    }
    positions
}

/// Raw occlusion map of shape (H, W) before normalization.
///
/// # Arguments
///
/// * `model` - Frozen classifier
/// * `image` - Input of shape (C, H, W)
/// * `config` - Patch geometry and batching
pub fn occlusion_heatmap<B, M>(model: &M, image: Tensor<B, 3>, config: &OcclusionConfig) -> Result<Tensor<B, 2>>
where
    B: Backend,
    M: BinaryClassifier<B>,
{
    let [c, h, w] = image.dims();
    config.validate(h, w)?;

    let device = image.device();
    let positions = occlusion_positions(h, w, config.patch_size, config.stride);
    let p = config.patch_size;

    let mut confidences = Vec::with_capacity(positions.len());
    for chunk in positions.chunks(config.batch_size) {
        let n = chunk.len();

        let mut mask = vec![1.0f32; n * h * w];
        for (i, &(y0, x0)) in chunk.iter().enumerate() {
            let plane = &mut mask[i * h * w..(i + 1) * h * w];
            for y in y0..y0 + p {
                plane[y * w + x0..y * w + x0 + p].fill(0.0);
            }
        }

        let mask = Tensor::<B, 1>::from_floats(mask.as_slice(), &device).reshape([n, 1, h, w]);
        let masked = image.clone().reshape([1, c, h, w]).repeat_dim(0, n) * mask;

        let probs = model.predict_proba(masked);
        confidences.extend(probs.into_data().iter::<f32>());
        tracing::debug!(masked = n, done = confidences.len(), total = positions.len(), "occlusion chunk");
    }

    let mut heat = vec![0.0f32; h * w];
    for (&(y0, x0), &confidence) in positions.iter().zip(&confidences) {
        for y in y0..y0 + p {
            heat[y * w + x0..y * w + x0 + p].fill(confidence);
        }
    }

    Ok(Tensor::<B, 1>::from_floats(heat.as_slice(), &device).reshape([h, w]))
}

/// Compute a normalized occlusion sensitivity map of shape (1, H, W).
pub fn occlusion_sensitivity<B, M>(model: &M, image: Tensor<B, 3>, config: &OcclusionConfig) -> Result<AttributionMap<B>>
where
    B: Backend,
    M: BinaryClassifier<B>,
{
    let heat = occlusion_heatmap(model, image, config)?;
    let [h, w] = heat.dims();
    Ok(AttributionMap::new(heat.reshape([1, h, w]), AttributionMethod::Occlusion).normalize())
}
