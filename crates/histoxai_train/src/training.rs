//! Training loop implementation.
//!
//! Each epoch runs a training phase over the shuffled training loader, a
//! validation phase on the inner backend, and an early stopping decision.
//! Whenever validation loss improves the parameters are checkpointed; when
//! training ends the best parameters are restored.

use std::path::PathBuf;
use std::time::Instant;

use burn::module::AutodiffModule;
use burn::optim::{AdamConfig, GradientsParams, Optimizer};
use burn::prelude::*;
use burn::tensor::backend::AutodiffBackend;
use serde::{Deserialize, Serialize};

use crate::early_stopping::{EarlyStopping, EpochDecision};
use crate::error::{Result, TrainError};
use crate::history::{EpochMetrics, TrainingHistory};
use crate::losses::{count_correct, BceWithLogitsLoss};
use histoxai_data::{PatchLoader, PatchLoaders};
use histoxai_models::ModelCheckpoint;

/// File stem of the best-model checkpoint inside the checkpoint directory.
pub const BEST_MODEL_FILE: &str = "best_model";

/// Configuration for the trainer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainerConfig {
    /// Maximum number of epochs.
    pub n_epochs: usize,
    /// Fixed Adam learning rate.
    pub lr: f64,
    /// Epochs without improvement before stopping (0 = disabled).
    pub patience: usize,
    /// Minimum decrease of validation loss that counts as improvement.
    pub min_delta: f32,
    /// Where to write `best_model.mpk`; kept in memory only when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checkpoint_dir: Option<PathBuf>,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            n_epochs: 20,
            lr: 1e-3,
            patience: 5,
            min_delta: 0.0,
            checkpoint_dir: None,
        }
    }
}

impl TrainerConfig {
    /// Path of the best-model checkpoint, if a directory is configured.
    pub fn best_model_path(&self) -> Option<PathBuf> {
        self.checkpoint_dir.as_ref().map(|dir| dir.join(BEST_MODEL_FILE))
    }

    fn validate(&self) -> Result<()> {
        if self.n_epochs == 0 {
            return Err(TrainError::InvalidConfig("n_epochs must be at least 1".to_string()));
        }
        if !(self.lr.is_finite() && self.lr > 0.0) {
            return Err(TrainError::InvalidConfig(format!("lr must be positive, got {}", self.lr)));
        }
        if self.min_delta < 0.0 {
            return Err(TrainError::InvalidConfig(format!(
                "min_delta must be non-negative, got {}",
                self.min_delta
            )));
        }
        Ok(())
    }
}

/// Training output with history and the restored best model.
#[derive(Debug)]
pub struct TrainingOutput<M> {
    /// Model holding the best parameters seen.
    pub model: M,
    /// Per-epoch metrics.
    pub history: TrainingHistory,
    /// Epoch (0-based) of the best validation loss.
    pub best_epoch: Option<usize>,
    /// Best validation loss.
    pub best_valid_loss: f32,
    /// Whether early stopping ended training.
    pub stopped_early: bool,
    /// Total training time in seconds.
    pub training_time_secs: f64,
}

/// Trainer for single-logit binary classifiers.
///
/// # Example
///
/// ```rust,ignore
/// let trainer = Trainer::<Autodiff<NdArray>>::new(config, device);
/// let output = trainer.fit_with_forward(
///     model,
///     &dls,
///     |m, x| m.forward(x),
///     |m, x| m.forward(x),
/// )?;
/// ```
pub struct Trainer<B: AutodiffBackend> {
    config: TrainerConfig,
    device: B::Device,
}

impl<B: AutodiffBackend> Trainer<B> {
    /// Create a new trainer.
    pub fn new(config: TrainerConfig, device: B::Device) -> Self {
        Self { config, device }
    }

    /// Get the configuration.
    pub fn config(&self) -> &TrainerConfig {
        &self.config
    }

    /// Train a model using forward closures returning logits of shape (N, 1).
    ///
    /// `forward_fn` runs with training semantics on the autodiff backend;
    /// `valid_forward_fn` runs on the inner module.
    pub fn fit_with_forward<M, F, G>(
        &self,
        model: M,
        dls: &PatchLoaders,
        forward_fn: F,
        valid_forward_fn: G,
    ) -> Result<TrainingOutput<M>>
    where
        M: AutodiffModule<B> + Clone,
        F: Fn(&M, Tensor<B, 4>) -> Tensor<B, 2>,
        G: Fn(&M::InnerModule, Tensor<B::InnerBackend, 4>) -> Tensor<B::InnerBackend, 2>,
    {
        self.config.validate()?;
        let start_time = Instant::now();

        let mut optim = AdamConfig::new().init::<B, M>();
        let mut stopper = EarlyStopping::new(self.config.patience, self.config.min_delta);
        let mut history = TrainingHistory::new();

        let best_path = self.config.best_model_path();
        // Records own their tensors; module clones share BatchNorm running stats.
        let mut best_record = model.clone().into_record();
        let mut best_epoch = None;
        let mut stopped_early = false;
        let mut current_model = model;

        for epoch in 0..self.config.n_epochs {
            let (train_loss, train_acc) =
                self.train_epoch(&mut current_model, &mut optim, dls.train(), epoch, &forward_fn)?;
            let (valid_loss, valid_acc) = self.valid_epoch(&current_model, dls.valid(), &valid_forward_fn)?;

            if !valid_loss.is_finite() {
                return Err(TrainError::NonFiniteLoss { phase: "valid", epoch });
            }

            history.push_epoch(EpochMetrics {
                train_loss,
                train_acc,
                valid_loss,
                valid_acc,
            });

            let decision = stopper.observe(valid_loss);
            tracing::info!(
                "Epoch {:3}/{}: train_loss={:.4}, train_acc={:.2}%, valid_loss={:.4}, valid_acc={:.2}%{}",
                epoch + 1,
                self.config.n_epochs,
                train_loss,
                train_acc * 100.0,
                valid_loss,
                valid_acc * 100.0,
                if decision == EpochDecision::Improved { " *" } else { "" }
            );

            match decision {
                EpochDecision::Improved => {
                    best_epoch = Some(epoch);
                    if let Some(path) = &best_path {
                        let file = current_model.save_checkpoint(path)?;
                        tracing::debug!(path = %file.display(), epoch, "checkpointed best model");
                    }
                    best_record = current_model.clone().into_record();
                }
                EpochDecision::Waiting => {}
                EpochDecision::Stop => {
                    stopped_early = true;
                    break;
                }
            }
        }

        let model = match (&best_path, best_epoch) {
            (Some(path), Some(_)) => current_model.load_checkpoint(path, &self.device)?,
            _ => current_model.load_record(best_record),
        };

        let training_time_secs = start_time.elapsed().as_secs_f64();
        tracing::info!(
            "Training complete in {:.1}s, best valid_loss={:.4} at epoch {}",
            training_time_secs,
            stopper.best_loss(),
            best_epoch.map_or(0, |e| e + 1)
        );

        Ok(TrainingOutput {
            model,
            history,
            best_epoch,
            best_valid_loss: stopper.best_loss(),
            stopped_early,
            training_time_secs,
        })
    }

    fn train_epoch<M, O, F>(
        &self,
        model: &mut M,
        optim: &mut O,
        loader: &PatchLoader,
        epoch: usize,
        forward_fn: &F,
    ) -> Result<(f32, f32)>
    where
        M: AutodiffModule<B> + Clone,
        O: Optimizer<M, B>,
        F: Fn(&M, Tensor<B, 4>) -> Tensor<B, 2>,
    {
        let loss_fn = BceWithLogitsLoss::new();
        let mut total_loss = 0.0f32;
        let mut correct = 0usize;
        let mut total = 0usize;

        for batch_result in loader.iter_epoch::<B>(epoch, &self.device) {
            let batch = batch_result?;
            let batch_size = batch.batch_size();

            let logits = forward_fn(model, batch.images);
            let loss = loss_fn.forward(logits.clone(), batch.labels.clone());
            let loss_value = loss.clone().into_scalar().elem::<f32>();
            if !loss_value.is_finite() {
                return Err(TrainError::NonFiniteLoss { phase: "train", epoch });
            }

            total_loss += loss_value * batch_size as f32;
            correct += count_correct(logits.inner(), batch.labels.inner());
            total += batch_size;

            let grads = loss.backward();
            let grads = GradientsParams::from_grads(grads, model);
            *model = optim.step(self.config.lr, model.clone(), grads);

            tracing::trace!(epoch, loss = loss_value, "train batch");
        }

        Ok(mean_and_accuracy(total_loss, correct, total))
    }

    fn valid_epoch<M, G>(&self, model: &M, loader: &PatchLoader, valid_forward_fn: &G) -> Result<(f32, f32)>
    where
        M: AutodiffModule<B>,
        G: Fn(&M::InnerModule, Tensor<B::InnerBackend, 4>) -> Tensor<B::InnerBackend, 2>,
    {
        let inner_model = model.clone().valid();
        let inner_device = self.device.clone();
        let loss_fn = BceWithLogitsLoss::new();

        let mut total_loss = 0.0f32;
        let mut correct = 0usize;
        let mut total = 0usize;

        for batch_result in loader.iter::<B::InnerBackend>(&inner_device) {
            let batch = batch_result?;
            let batch_size = batch.batch_size();

            let logits = valid_forward_fn(&inner_model, batch.images);
            let loss = loss_fn.forward(logits.clone(), batch.labels.clone());
            total_loss += loss.into_scalar().elem::<f32>() * batch_size as f32;
            correct += count_correct(logits, batch.labels);
            total += batch_size;
        }

        Ok(mean_and_accuracy(total_loss, correct, total))
    }
}

fn mean_and_accuracy(total_loss: f32, correct: usize, total: usize) -> (f32, f32) {
    if total == 0 {
        return (0.0, 0.0);
    }
    (total_loss / total as f32, correct as f32 / total as f32)
}
