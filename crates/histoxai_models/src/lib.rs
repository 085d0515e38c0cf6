//! # histoxai_models
//!
//! Classifier architecture for histopathology patches.
//!
//! - [`PatchCnn`] - four-stage CNN with a single-logit head, implementing
//!   [`histoxai_core::BinaryClassifier`]
//! - [`ModelCheckpoint`] - save/load of weights with Burn's recorder

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod checkpoint;
pub mod cnn;

pub use checkpoint::{checkpoint_file, CheckpointError, CheckpointMetadata, ModelCheckpoint};
pub use cnn::{ConvStage, PatchCnn, PatchCnnConfig};
