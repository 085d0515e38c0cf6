//! Model checkpointing.
//!
//! Weights are stored with Burn's named MessagePack recorder at full
//! precision; the recorder always writes the `.mpk` extension. A small JSON
//! sidecar ([`CheckpointMetadata`]) records which epoch produced the weights.
//!
//! # Example
//!
//! ```rust,ignore
//! use histoxai_models::{ModelCheckpoint, PatchCnnConfig};
//!
//! let config = PatchCnnConfig::default();
//! let model = config.init::<NdArray>(&device);
//! model.save_checkpoint("runs/best_model")?;
//!
//! let restored = config.init::<NdArray>(&device).load_checkpoint("runs/best_model", &device)?;
//! ```

use std::path::{Path, PathBuf};

use burn::module::Module;
use burn::prelude::*;
use burn::record::{FullPrecisionSettings, NamedMpkFileRecorder};
use serde::{Deserialize, Serialize};

use crate::cnn::PatchCnnConfig;

/// Extension written by the checkpoint recorder.
pub const CHECKPOINT_EXTENSION: &str = "mpk";

/// Result type for checkpoint operations.
pub type Result<T> = std::result::Result<T, CheckpointError>;

/// Checkpoint-related errors.
#[derive(Debug, thiserror::Error)]
pub enum CheckpointError {
    /// Error saving checkpoint.
    #[error("Failed to save checkpoint: {0}")]
    Save(String),

    /// Error loading checkpoint.
    #[error("Failed to load checkpoint: {0}")]
    Load(String),

    /// No checkpoint at the expected location.
    #[error("Checkpoint not found: {0}")]
    Missing(PathBuf),
}

/// Path the recorder reads and writes for `path`.
#[must_use]
pub fn checkpoint_file(path: impl AsRef<Path>) -> PathBuf {
    path.as_ref().with_extension(CHECKPOINT_EXTENSION)
}

fn recorder() -> NamedMpkFileRecorder<FullPrecisionSettings> {
    NamedMpkFileRecorder::<FullPrecisionSettings>::new()
}

/// Extension trait for models to add checkpoint methods.
pub trait ModelCheckpoint<B: Backend>: Module<B> {
    /// Save the model weights.
    fn save_checkpoint(&self, path: impl AsRef<Path>) -> Result<PathBuf> {
        let file = checkpoint_file(path);
        if let Some(parent) = file.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| CheckpointError::Save(e.to_string()))?;
        }

        self.clone()
            .save_file(file.clone(), &recorder())
            .map_err(|e| CheckpointError::Save(e.to_string()))?;

        tracing::debug!(path = %file.display(), "saved checkpoint");
        Ok(file)
    }

    /// Load weights from a checkpoint into a copy of this model.
    fn load_checkpoint(&self, path: impl AsRef<Path>, device: &B::Device) -> Result<Self>
    where
        Self: Sized,
    {
        let file = checkpoint_file(path);
        if !file.exists() {
            return Err(CheckpointError::Missing(file));
        }

        self.clone()
            .load_file(file, &recorder(), device)
            .map_err(|e| CheckpointError::Load(e.to_string()))
    }
}

// Implement for all modules
impl<B: Backend, M: Module<B>> ModelCheckpoint<B> for M {}

/// Metadata written next to a checkpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointMetadata {
    /// Model architecture name.
    pub arch: String,
    /// Model configuration.
    pub config: PatchCnnConfig,
    /// Epoch that produced the weights (0-based).
    pub epoch: Option<usize>,
    /// Validation loss at that epoch.
    pub valid_loss: Option<f32>,
    /// Validation accuracy at that epoch.
    pub valid_acc: Option<f32>,
}

impl CheckpointMetadata {
    /// Create new metadata for a patch CNN.
    pub fn new(config: PatchCnnConfig) -> Self {
        Self {
            arch: "PatchCnn".to_string(),
            config,
            epoch: None,
            valid_loss: None,
            valid_acc: None,
        }
    }

    /// Set the training epoch.
    #[must_use]
    pub fn with_epoch(mut self, epoch: usize) -> Self {
        self.epoch = Some(epoch);
        self
    }

    /// Set the validation loss.
    #[must_use]
    pub fn with_valid_loss(mut self, loss: f32) -> Self {
        self.valid_loss = Some(loss);
        self
    }

    /// Set the validation accuracy.
    #[must_use]
    pub fn with_valid_acc(mut self, acc: f32) -> Self {
        self.valid_acc = Some(acc);
        self
    }

    /// Save metadata to a JSON file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self).map_err(|e| CheckpointError::Save(e.to_string()))?;
        std::fs::write(path, json).map_err(|e| CheckpointError::Save(e.to_string()))?;
        Ok(())
    }

    /// Load metadata from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(CheckpointError::Missing(path.to_path_buf()));
        }
        let json = std::fs::read_to_string(path).map_err(|e| CheckpointError::Load(e.to_string()))?;
        serde_json::from_str(&json).map_err(|e| CheckpointError::Load(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use histoxai_core::backend::NdArray;
    use histoxai_core::BinaryClassifier;

    type B = NdArray;

    fn small_config() -> PatchCnnConfig {
        PatchCnnConfig::new(3)
            .with_channels([4, 4, 8, 8])
            .with_pooled_size(2)
            .with_hidden(8)
    }

    #[test]
    fn test_checkpoint_file_extension() {
        assert_eq!(checkpoint_file("runs/best_model"), PathBuf::from("runs/best_model.mpk"));
        assert_eq!(checkpoint_file("runs/best_model.mpk"), PathBuf::from("runs/best_model.mpk"));
    }

    #[test]
    fn test_save_and_load_restores_weights() {
        let dir = tempfile::tempdir().unwrap();
        let device = Default::default();
        let config = small_config();

        let model = config.init::<B>(&device);
        let written = model.save_checkpoint(dir.path().join("best_model")).unwrap();
        assert!(written.exists());

        let fresh = config.init::<B>(&device);
        let restored = fresh.load_checkpoint(dir.path().join("best_model"), &device).unwrap();

        let x = Tensor::<B, 4>::ones([1, 3, 8, 8], &device);
        let a: Vec<f32> = model.predict_proba(x.clone()).into_data().to_vec().unwrap();
        let b: Vec<f32> = restored.predict_proba(x).into_data().to_vec().unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_load_missing_checkpoint() {
        let dir = tempfile::tempdir().unwrap();
        let device = Default::default();
        let model = small_config().init::<B>(&device);

        let err = model.load_checkpoint(dir.path().join("nope"), &device).unwrap_err();
        assert!(matches!(err, CheckpointError::Missing(_)));
    }

    #[test]
    fn test_checkpoint_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("best_model.json");

        let meta = CheckpointMetadata::new(small_config())
            .with_epoch(3)
            .with_valid_loss(0.25)
            .with_valid_acc(0.92);
        meta.save(&path).unwrap();

        let loaded = CheckpointMetadata::load(&path).unwrap();
        assert_eq!(loaded, meta);
        assert_eq!(loaded.arch, "PatchCnn");
        assert_eq!(loaded.epoch, Some(3));
    }
}
