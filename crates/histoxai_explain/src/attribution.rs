//! Attribution map type and min-max normalization.

use std::path::Path;

use burn::prelude::*;
use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::error::{ExplainError, Result};

/// Smallest range used as the normalization denominator.
pub const NORMALIZE_EPSILON: f32 = 1e-8;

/// Method for computing attribution maps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributionMethod {
    /// Gradient-weighted Class Activation Mapping.
    GradCam,
    /// Absolute input gradient.
    Saliency,
    /// Sliding-patch occlusion.
    Occlusion,
    /// Integrated Gradients.
    IntegratedGradients,
}

impl AttributionMethod {
    /// All methods, in reporting order.
    pub const ALL: [AttributionMethod; 4] = [
        AttributionMethod::GradCam,
        AttributionMethod::Saliency,
        AttributionMethod::Occlusion,
        AttributionMethod::IntegratedGradients,
    ];

    /// Short snake_case name, also used as the export file stem.
    pub const fn name(&self) -> &'static str {
        match self {
            AttributionMethod::GradCam => "gradcam",
            AttributionMethod::Saliency => "saliency",
            AttributionMethod::Occlusion => "occlusion",
            AttributionMethod::IntegratedGradients => "integrated_gradients",
        }
    }
}

impl std::fmt::Display for AttributionMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Attribution values over one image.
///
/// `values` has shape (channels, H, W): one channel for Grad-CAM, saliency
/// and occlusion, the input's channels for integrated gradients.
#[derive(Debug, Clone)]
pub struct AttributionMap<B: Backend> {
    /// The attribution values.
    pub values: Tensor<B, 3>,
    /// The method used.
    pub method: AttributionMethod,
}

impl<B: Backend> AttributionMap<B> {
    /// Create a new attribution map.
    pub fn new(values: Tensor<B, 3>, method: AttributionMethod) -> Self {
        Self { values, method }
    }

    /// Get the shape of the attribution map.
    pub fn shape(&self) -> [usize; 3] {
        self.values.dims()
    }

    /// Smallest and largest value.
    pub fn range(&self) -> (f32, f32) {
        let min_val: f32 = self.values.clone().min().into_scalar().elem();
        let max_val: f32 = self.values.clone().max().into_scalar().elem();
        (min_val, max_val)
    }

    /// Min-max normalize to `[0, 1]`.
    ///
    /// The denominator is clamped to [`NORMALIZE_EPSILON`], so a constant map
    /// becomes all zeros instead of NaN.
    pub fn normalize(&self) -> Self {
        let (min_val, max_val) = self.range();
        let range = max_val - min_val;
        if range < NORMALIZE_EPSILON {
            tracing::warn!(method = %self.method, min_val, max_val, "constant attribution map");
        }

        Self {
            values: self
                .values
                .clone()
                .sub_scalar(min_val)
                .div_scalar(range.max(NORMALIZE_EPSILON)),
            method: self.method,
        }
    }

    /// Min-max normalize, failing on a constant map.
    pub fn try_normalize(&self) -> Result<Self> {
        let (min, max) = self.range();
        if !(max - min >= NORMALIZE_EPSILON) {
            return Err(ExplainError::DegenerateRange { min, max });
        }
        Ok(self.normalize())
    }

    /// Collapse channels by summation into an (H, W) map.
    pub fn heatmap(&self) -> Tensor<B, 2> {
        let [_, h, w] = self.shape();
        self.values.clone().sum_dim(0).reshape([h, w])
    }

    /// The channel-summed heatmap as a host array.
    pub fn to_array(&self) -> Result<Array2<f32>> {
        let [_, h, w] = self.shape();
        let data: Vec<f32> = self.heatmap().into_data().iter::<f32>().collect();
        Array2::from_shape_vec((h, w), data).map_err(|e| ExplainError::ShapeMismatch(e.to_string()))
    }

    /// Write the channel-summed heatmap as a float32 `.npy` file.
    pub fn save_npy(&self, path: impl AsRef<Path>) -> Result<()> {
        use ndarray_npy::WriteNpyExt;

        let array = self.to_array()?;
        let file = std::io::BufWriter::new(std::fs::File::create(path)?);
        array.write_npy(file).map_err(|e| ExplainError::Npy(e.to_string()))
    }
}
