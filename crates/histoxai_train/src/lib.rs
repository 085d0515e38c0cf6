//! # histoxai_train
//!
//! Training loop, early stopping and evaluation for binary patch classifiers.
//!
//! This crate provides:
//! - [`Trainer`] with a fixed-rate Adam optimizer, checkpoint-on-improve and
//!   best-model restoration
//! - [`EarlyStopping`] on validation loss
//! - [`BceWithLogitsLoss`], numerically stable binary cross-entropy
//! - [`TrainingHistory`], per-epoch metrics serialized as JSON
//! - [`evaluate_binary`] and [`BinaryConfusionMatrix`]
//!
//! ## Example
//!
//! ```rust,ignore
//! use histoxai_train::{Trainer, TrainerConfig};
//!
//! let trainer = Trainer::<Autodiff<NdArray>>::new(TrainerConfig::default(), device);
//! let output = trainer.fit_with_forward(model, &dls, |m, x| m.forward(x), |m, x| m.forward(x))?;
//! output.history.save("runs/history.json")?;
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod early_stopping;
pub mod error;
pub mod evaluation;
pub mod history;
pub mod losses;
pub mod training;

pub use early_stopping::{EarlyStopping, EpochDecision};
pub use error::{Result, TrainError};
pub use evaluation::{evaluate_binary, BinaryConfusionMatrix, EvaluationResult, DECISION_THRESHOLD};
pub use history::{EpochMetrics, TrainingHistory};
pub use losses::{count_correct, BceWithLogitsLoss};
pub use training::{Trainer, TrainerConfig, TrainingOutput, BEST_MODEL_FILE};
