//! # histoxai
//!
//! Binary tumor classification on histopathology image patches, with
//! post-hoc explanations of individual predictions.
//!
//! - **Data**: NPZ patch collections, stratified train/valid/test splits, shuffled loaders
//! - **Model**: a four-stage convolutional classifier with a single logit output
//! - **Training**: Adam, early stopping on validation loss, best-model checkpoints
//! - **Evaluation**: confusion matrix, per-class report, ROC AUC
//! - **Explainability**: Grad-CAM, saliency, occlusion sensitivity, integrated
//!   gradients, and insertion/deletion curves to compare them
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use histoxai::prelude::*;
//!
//! let dataset = read_patches("pcam.npz")?;
//! let splits = stratified_split(&dataset, SplitSizes::default(), Seed::new(42))?;
//!
//! let dls = PatchLoaders::builder(splits.train().clone(), splits.valid().clone())
//!     .batch_size(64)
//!     .build()?;
//!
//! let model = PatchCnnConfig::default().init::<Autodiff<NdArray>>(&device);
//! let trainer = Trainer::new(TrainerConfig::default(), device);
//! let output = trainer.fit_with_forward(model, &dls, |m, x| m.forward(x), |m, x| m.forward(x))?;
//!
//! let image = splits.test().image_tensor(0, &device)?;
//! let cam = grad_cam(&output.model, image)?;
//! ```
//!
//! ## Feature Flags
//!
//! - `backend-ndarray` (default): CPU backend using ndarray

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

// Re-export all crates
pub use histoxai_core as core;
pub use histoxai_data as data;
pub use histoxai_explain as explain;
pub use histoxai_models as models;
pub use histoxai_train as train;

/// Prelude module for convenient imports.
///
/// ```rust,ignore
/// use histoxai::prelude::*;
/// ```
pub mod prelude {
    // Core types
    pub use histoxai_core::backend;
    pub use histoxai_core::{BinaryClassifier, ImageShape, PatchBatch, RunContext, Seed, Split};

    // Data
    pub use histoxai_data::{
        read_patches, stratified_split, write_patches, PatchDataset, PatchLoader, PatchLoaders, PatchSplits,
        SplitSizes,
    };

    // Models
    pub use histoxai_models::{CheckpointMetadata, ModelCheckpoint, PatchCnn, PatchCnnConfig};

    // Training
    pub use histoxai_train::{
        evaluate_binary, BceWithLogitsLoss, BinaryConfusionMatrix, EarlyStopping, EvaluationResult, Trainer,
        TrainerConfig, TrainingHistory,
    };

    // Explain
    pub use histoxai_explain::{
        grad_cam, insertion_deletion, integrated_gradients, occlusion_sensitivity, saliency, zero_baseline,
        AttributionMap, AttributionMethod, InsertionDeletionConfig, InsertionDeletionCurves,
        IntegratedGradientsConfig, OcclusionConfig,
    };
}
