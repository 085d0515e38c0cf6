//! # histoxai_explain
//!
//! Attribution methods for binary patch classifiers and a faithfulness
//! benchmark to compare them.
//!
//! This crate provides:
//! - Grad-CAM on the last convolutional feature map
//! - Vanilla gradient saliency
//! - Occlusion sensitivity with a sliding zero patch
//! - Integrated Gradients along a straight-line path
//! - Insertion/deletion curves and their areas
//!
//! Gradient methods run on an autodiff backend and return maps on its inner
//! backend. Occlusion and the benchmark only need forward passes and work on
//! any backend.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

mod attribution;
mod benchmark;
mod error;
mod grad_cam;
mod integrated_gradients;
mod occlusion;
mod saliency;

#[cfg(test)]
mod testing;

pub use attribution::{AttributionMap, AttributionMethod, NORMALIZE_EPSILON};
pub use benchmark::{insertion_deletion, masked_images, InsertionDeletionConfig, InsertionDeletionCurves};
pub use error::{ExplainError, Result};
pub use grad_cam::grad_cam;
pub use integrated_gradients::{integrated_gradients, zero_baseline, IntegratedGradientsConfig};
pub use occlusion::{occlusion_heatmap, occlusion_positions, occlusion_sensitivity, OcclusionConfig};
pub use saliency::saliency;
