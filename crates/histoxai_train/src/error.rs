//! Error types for training.

use thiserror::Error;

/// Result type alias for training operations.
pub type Result<T> = std::result::Result<T, TrainError>;

/// Errors that can occur during training and evaluation.
#[derive(Error, Debug)]
pub enum TrainError {
    /// Invalid trainer configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The loss became NaN or infinite.
    #[error("Non-finite {phase} loss at epoch {epoch}")]
    NonFiniteLoss {
        /// `train` or `valid`.
        phase: &'static str,
        /// Epoch index (0-based).
        epoch: usize,
    },

    /// Checkpoint error.
    #[error("Checkpoint error: {0}")]
    Checkpoint(#[from] histoxai_models::CheckpointError),

    /// Data error.
    #[error("Data error: {0}")]
    Data(#[from] histoxai_data::DataError),

    /// Core error.
    #[error("Core error: {0}")]
    Core(#[from] histoxai_core::CoreError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
