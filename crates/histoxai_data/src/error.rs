//! Error types for histoxai_data.

use thiserror::Error;

/// Result type alias using [`DataError`].
pub type Result<T> = std::result::Result<T, DataError>;

/// Errors that can occur in data operations.
#[derive(Error, Debug)]
pub enum DataError {
    /// Invalid data shape.
    #[error("Invalid shape: {0}")]
    InvalidShape(String),

    /// Empty dataset.
    #[error("Dataset is empty")]
    EmptyDataset,

    /// Index out of bounds.
    #[error("Index {index} out of bounds for length {length}")]
    IndexOutOfBounds {
        /// The requested index.
        index: usize,
        /// The length of the collection.
        length: usize,
    },

    /// A label outside `{0, 1}`.
    #[error("Invalid label {label} at index {index}: labels must be 0 or 1")]
    InvalidLabel {
        /// Offending row.
        index: usize,
        /// Offending value.
        label: i64,
    },

    /// Batch size error.
    #[error("Invalid batch size: {0}")]
    InvalidBatchSize(String),

    /// Requested split sizes cannot be met with class balance preserved.
    #[error("Infeasible split: {0}")]
    InfeasibleSplit(String),

    /// File format error.
    #[error("File format error: {0}")]
    FormatError(String),

    /// A persisted split is missing from its directory.
    #[error("Missing split file: {0}")]
    MissingFile(std::path::PathBuf),

    /// I/O error.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Split index (de)serialization failed.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Core error.
    #[error("Core error: {0}")]
    CoreError(#[from] histoxai_core::CoreError),
}
