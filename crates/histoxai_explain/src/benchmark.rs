//! Insertion/deletion benchmark for attribution maps.
//!
//! Pixels are ranked by attribution. At fraction `f` the top `round(f·H·W)`
//! pixels are highlighted; the insertion image keeps only those pixels over a
//! zero baseline and the deletion image zeroes them out. A faithful map makes
//! confidence rise quickly under insertion and fall quickly under deletion.

use burn::prelude::*;
use serde::{Deserialize, Serialize};

use crate::attribution::AttributionMap;
use crate::error::{ExplainError, Result};
use histoxai_core::BinaryClassifier;

/// Configuration for the insertion/deletion benchmark.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InsertionDeletionConfig {
    /// Number of fraction intervals; curves have `steps + 1` points.
    pub steps: usize,
    /// Number of masked images scored per forward pass.
    pub batch_size: usize,
}

impl Default for InsertionDeletionConfig {
    fn default() -> Self {
        Self {
            steps: 20,
            batch_size: 32,
        }
    }
}

/// Confidence curves of one attribution map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsertionDeletionCurves {
    /// Fractions `k / steps`.
    pub fractions: Vec<f32>,
    /// Confidence with only the top pixels kept.
    pub insertion: Vec<f32>,
    /// Confidence with the top pixels removed.
    pub deletion: Vec<f32>,
}

impl InsertionDeletionCurves {
    /// Trapezoidal area under the insertion curve.
    pub fn insertion_auc(&self) -> f32 {
        trapezoid(&self.fractions, &self.insertion)
    }

    /// Trapezoidal area under the deletion curve.
    pub fn deletion_auc(&self) -> f32 {
        trapezoid(&self.fractions, &self.deletion)
    }
}

fn trapezoid(x: &[f32], y: &[f32]) -> f32 {
    x.windows(2)
        .zip(y.windows(2))
        .map(|(xs, ys)| (xs[1] - xs[0]) * (ys[0] + ys[1]) / 2.0)
        .sum()
}

/// Pixel indices sorted by descending score; ties keep the lower index first.
fn rank_pixels(scores: &[f32]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));
    order
}

fn highlight_mask(order: &[usize], fraction: f32) -> Vec<f32> {
    let n = order.len();
    let k = ((fraction.clamp(0.0, 1.0) * n as f32).round() as usize).min(n);
    let mut mask = vec![0.0f32; n];
    for &idx in &order[..k] {
        mask[idx] = 1.0;
    }
    mask
}

/// Insertion and deletion images of one fraction.
///
/// # Arguments
///
/// * `image` - Input of shape (C, H, W)
/// * `heatmap` - Attribution scores of shape (H, W)
/// * `fraction` - Share of pixels to highlight, in `[0, 1]`
///
/// # Returns
///
/// `(insertion, deletion)`, both (C, H, W).
pub fn masked_images<B: Backend>(
    image: &Tensor<B, 3>,
    heatmap: &Tensor<B, 2>,
    fraction: f32,
) -> Result<(Tensor<B, 3>, Tensor<B, 3>)> {
    let [_, h, w] = image.dims();
    check_heatmap(heatmap, h, w)?;

    let scores: Vec<f32> = heatmap.clone().into_data().iter::<f32>().collect();
    let mask = highlight_mask(&rank_pixels(&scores), fraction);
    Ok(apply_mask(image, &mask, h, w))
}

fn apply_mask<B: Backend>(image: &Tensor<B, 3>, mask: &[f32], h: usize, w: usize) -> (Tensor<B, 3>, Tensor<B, 3>) {
    let keep = Tensor::<B, 1>::from_floats(mask, &image.device()).reshape([1, h, w]);
    let removed = keep.clone().neg().add_scalar(1.0);
    (image.clone() * keep, image.clone() * removed)
}

fn check_heatmap<B: Backend>(heatmap: &Tensor<B, 2>, h: usize, w: usize) -> Result<()> {
    if heatmap.dims() != [h, w] {
        return Err(ExplainError::ShapeMismatch(format!(
            "heatmap {:?} does not match image {}x{}",
            heatmap.dims(),
            h,
            w
        )));
    }
    Ok(())
}

/// Run the insertion/deletion benchmark for one map.
///
/// Multi-channel maps are ranked by their channel sum
/// ([`AttributionMap::heatmap`]).
pub fn insertion_deletion<B, M>(
    model: &M,
    image: Tensor<B, 3>,
    map: &AttributionMap<B>,
    config: &InsertionDeletionConfig,
) -> Result<InsertionDeletionCurves>
where
    B: Backend,
    M: BinaryClassifier<B>,
{
    if config.steps == 0 || config.batch_size == 0 {
        return Err(ExplainError::InvalidConfig(format!(
            "steps and batch_size must be positive, got {:?}",
            config
        )));
    }

    let [c, h, w] = image.dims();
    let heatmap = map.heatmap();
    check_heatmap(&heatmap, h, w)?;

    let scores: Vec<f32> = heatmap.into_data().iter::<f32>().collect();
    let order = rank_pixels(&scores);
    let fractions: Vec<f32> = (0..=config.steps).map(|k| k as f32 / config.steps as f32).collect();

    // Insertion and deletion image of each fraction, interleaved.
    let images: Vec<Tensor<B, 4>> = fractions
        .iter()
        .flat_map(|&f| {
            let (insertion, deletion) = apply_mask(&image, &highlight_mask(&order, f), h, w);
            [insertion.reshape([1, c, h, w]), deletion.reshape([1, c, h, w])]
        })
        .collect();

    let mut confidences = Vec::with_capacity(images.len());
    for chunk in images.chunks(config.batch_size) {
        let probs = model.predict_proba(Tensor::cat(chunk.to_vec(), 0));
        confidences.extend(probs.into_data().iter::<f32>());
    }

    let insertion = confidences.iter().step_by(2).copied().collect();
    let deletion = confidences.iter().skip(1).step_by(2).copied().collect();

    Ok(InsertionDeletionCurves {
        fractions,
        insertion,
        deletion,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attribution::AttributionMethod;
    use crate::testing::{ramp_image, ConstantProbe, PooledProbe, B};

    fn values(t: Tensor<B, 3>) -> Vec<f32> {
        t.into_data().to_vec().unwrap()
    }

    #[test]
    fn test_rank_pixels_ties_by_index() {
        assert_eq!(rank_pixels(&[0.5, 0.9, 0.5, 0.1]), vec![1, 0, 2, 3]);
    }

    #[test]
    fn test_masked_image_endpoints() {
        let device = Default::default();
        let image = ramp_image::<B>(3, 4, 4, &device);
        let heat = ramp_image::<B>(1, 4, 4, &device).reshape([4, 4]);

        let (ins0, del0) = masked_images(&image, &heat, 0.0).unwrap();
        assert!(values(ins0).iter().all(|&v| v == 0.0));
        assert_eq!(values(del0), values(image.clone()));

        let (ins1, del1) = masked_images(&image, &heat, 1.0).unwrap();
        assert_eq!(values(ins1), values(image.clone()));
        assert!(values(del1).iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_masked_image_takes_top_pixels() {
        let device = Default::default();
        let image = Tensor::<B, 3>::ones([1, 2, 2], &device);
        let heat = Tensor::<B, 1>::from_floats([0.1, 0.8, 0.3, 0.8], &device).reshape([2, 2]);

        let (ins, del) = masked_images(&image, &heat, 0.5).unwrap();
        assert_eq!(values(ins), vec![0.0, 1.0, 0.0, 1.0]);
        assert_eq!(values(del), vec![1.0, 0.0, 1.0, 0.0]);
    }

    #[test]
    fn test_curves_shape_and_endpoints() {
        let device = Default::default();
        let model = PooledProbe::<B>::new([2.0, 1.0, 1.0], &device);
        let image = ramp_image::<B>(3, 4, 4, &device);
        let heat = ramp_image::<B>(1, 4, 4, &device);
        let map = AttributionMap::new(heat, AttributionMethod::Saliency);
        let config = InsertionDeletionConfig { steps: 4, batch_size: 3 };

        let curves = insertion_deletion(&model, image.clone(), &map, &config).unwrap();
        assert_eq!(curves.fractions, vec![0.0, 0.25, 0.5, 0.75, 1.0]);
        assert_eq!(curves.insertion.len(), 5);
        assert_eq!(curves.deletion.len(), 5);

        let full: f32 = model.predict_proba(image.reshape([1, 3, 4, 4])).into_scalar();
        let empty: f32 = model.predict_proba(Tensor::zeros([1, 3, 4, 4], &device)).into_scalar();
        assert!((curves.deletion[0] - full).abs() < 1e-6);
        assert!((curves.insertion[4] - full).abs() < 1e-6);
        assert!((curves.insertion[0] - empty).abs() < 1e-6);
        assert!((curves.deletion[4] - empty).abs() < 1e-6);

        // Positive weights: keeping more pixels never lowers confidence.
        assert!(curves.insertion.windows(2).all(|p| p[1] >= p[0] - 1e-6));
        assert!(curves.insertion_auc() > curves.deletion_auc());
    }

    #[test]
    fn test_constant_model_flat_curves() {
        let device = Default::default();
        let image = ramp_image::<B>(3, 4, 4, &device);
        let map = AttributionMap::new(ramp_image::<B>(1, 4, 4, &device), AttributionMethod::Occlusion);

        let curves = insertion_deletion(&ConstantProbe(0.7), image, &map, &InsertionDeletionConfig::default()).unwrap();
        assert!(curves.insertion.iter().chain(&curves.deletion).all(|&c| (c - 0.7).abs() < 1e-6));
        assert!((curves.insertion_auc() - 0.7).abs() < 1e-5);
    }

    #[test]
    fn test_heatmap_shape_mismatch() {
        let device = Default::default();
        let image = ramp_image::<B>(3, 4, 4, &device);
        let heat = Tensor::<B, 2>::zeros([4, 5], &device);
        assert!(matches!(masked_images(&image, &heat, 0.5), Err(ExplainError::ShapeMismatch(_))));
    }
}
