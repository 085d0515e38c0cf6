//! # histoxai_core
//!
//! Core types and traits shared by the histoxai crates.
//!
//! This crate provides:
//! - [`Seed`] for deterministic random number generation
//! - [`ImageShape`] for image tensor shape metadata
//! - [`PatchBatch`] for batches of normalized image patches
//! - [`RunContext`] holding the device and master seed of a training run
//! - [`BinaryClassifier`] implemented by explainable patch classifiers
//! - Error types and common utilities
//!
//! ## Shape Convention
//!
//! Image batches follow the channel-leading convention `(N, C, H, W)`:
//! - `N`: Batch size (number of patches)
//! - `C`: Color channels
//! - `H`, `W`: Patch height and width
//!
//! ## Example
//!
//! ```rust,ignore
//! use histoxai_core::{ImageShape, RunContext, Seed};
//!
//! let ctx = RunContext::<NdArray>::new(Default::default(), Seed::new(42));
//! let shape = ImageShape::new(3, 96, 96);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

mod batch;
mod context;
mod error;
mod model_trait;
mod seed;
mod shape;
mod split;

pub use batch::PatchBatch;
pub use context::RunContext;
pub use error::{CoreError, Result};
pub use model_trait::{BinaryClassifier, ClassifierOutput};
pub use seed::Seed;
pub use shape::ImageShape;
pub use split::Split;

/// Backend type aliases for convenience
pub mod backend {
    pub use burn_autodiff::Autodiff;

    #[cfg(feature = "backend-ndarray")]
    pub use burn_ndarray::{NdArray, NdArrayDevice};
}
