//! Error types for attribution.

use thiserror::Error;

/// Result type alias using [`ExplainError`].
pub type Result<T> = std::result::Result<T, ExplainError>;

/// Errors that can occur while computing or exporting attributions.
#[derive(Error, Debug)]
pub enum ExplainError {
    /// Input shapes do not agree.
    #[error("Shape mismatch: {0}")]
    ShapeMismatch(String),

    /// The backward pass produced no gradient for a tracked tensor.
    #[error("No gradient reached the {0}")]
    MissingGradient(&'static str),

    /// Invalid method configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Min-max normalization of a constant map.
    #[error("Degenerate attribution range: min {min}, max {max}")]
    DegenerateRange {
        /// Smallest value.
        min: f32,
        /// Largest value.
        max: f32,
    },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// `.npy` export failed.
    #[error("Failed to write npy: {0}")]
    Npy(String),
}
