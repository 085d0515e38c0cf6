//! # histoxai_data
//!
//! Dataset, splitting and loading for histopathology image patches.
//!
//! This crate provides:
//! - [`PatchDataset`] for storing u8 patches with binary labels
//! - [`PatchSplits`] for the persisted train/valid/test subsets
//! - [`stratified_split`] for reproducible, class-balanced partitioning
//! - [`PatchLoader`] for lazy, shuffled, normalized batch iteration
//! - NPZ container I/O
//!
//! ## Example
//!
//! ```rust,ignore
//! use histoxai_data::{read_patches, stratified_split, PatchLoaders, SplitSizes};
//! use histoxai_core::Seed;
//!
//! let dataset = read_patches("pcam.npz")?;
//! let splits = stratified_split(&dataset, SplitSizes::new(8000, 1000, 1000), Seed::new(42))?;
//! splits.save("data/")?;
//!
//! let dls = PatchLoaders::builder(splits.train().clone(), splits.valid().clone())
//!     .batch_size(64)
//!     .seed(Seed::new(42))
//!     .build()?;
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

mod dataset;
mod error;
mod io;
mod loader;
mod sampler;
mod splits;

pub use dataset::{PatchDataset, PatchSplits};
pub use error::{DataError, Result};
pub use io::{read_patches, write_patches};
pub use loader::{PatchLoader, PatchLoaderBuilder, PatchLoaderIter, PatchLoaders, PatchLoadersBuilder};
pub use sampler::{RandomSampler, Sampler, SequentialSampler};
pub use splits::{stratified_split, stratified_split_indices, SplitIndices, SplitSizes};

/// File holding the split index sets next to the persisted subsets.
pub const SPLIT_INDEX_FILE: &str = "splits.json";
