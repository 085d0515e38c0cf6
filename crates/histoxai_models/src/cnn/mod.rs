//! Convolutional patch classifiers.

mod patch_cnn;

pub use patch_cnn::{ConvStage, PatchCnn, PatchCnnConfig};
