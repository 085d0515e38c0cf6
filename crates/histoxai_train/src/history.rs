//! Per-epoch metric history.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Training loss metric name.
pub const TRAIN_LOSS: &str = "train_loss";
/// Training accuracy metric name.
pub const TRAIN_ACC: &str = "train_acc";
/// Validation loss metric name.
pub const VALID_LOSS: &str = "valid_loss";
/// Validation accuracy metric name.
pub const VALID_ACC: &str = "valid_acc";

/// Metrics of one finished epoch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EpochMetrics {
    /// Mean training loss.
    pub train_loss: f32,
    /// Training accuracy.
    pub train_acc: f32,
    /// Mean validation loss.
    pub valid_loss: f32,
    /// Validation accuracy.
    pub valid_acc: f32,
}

/// Append-only mapping from metric name to one value per epoch.
///
/// Serializes as a plain JSON object, e.g.
/// `{"train_loss": [0.61, 0.48], "valid_loss": [0.55, 0.51], ...}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrainingHistory {
    metrics: BTreeMap<String, Vec<f32>>,
}

impl TrainingHistory {
    /// Create an empty history.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one value to a metric.
    pub fn push(&mut self, name: &str, value: f32) {
        self.metrics.entry(name.to_string()).or_default().push(value);
    }

    /// Append all metrics of one epoch.
    pub fn push_epoch(&mut self, epoch: EpochMetrics) {
        self.push(TRAIN_LOSS, epoch.train_loss);
        self.push(TRAIN_ACC, epoch.train_acc);
        self.push(VALID_LOSS, epoch.valid_loss);
        self.push(VALID_ACC, epoch.valid_acc);
    }

    /// Values of a metric.
    pub fn get(&self, name: &str) -> Option<&[f32]> {
        self.metrics.get(name).map(Vec::as_slice)
    }

    /// Names of all recorded metrics, sorted.
    pub fn metric_names(&self) -> Vec<&str> {
        self.metrics.keys().map(String::as_str).collect()
    }

    /// Number of recorded epochs.
    pub fn n_epochs(&self) -> usize {
        self.metrics.values().map(Vec::len).max().unwrap_or(0)
    }

    /// Epoch with the lowest validation loss.
    pub fn best_epoch(&self) -> Option<usize> {
        self.get(VALID_LOSS)?
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| a.total_cmp(b))
            .map(|(i, _)| i)
    }

    /// Write the history as JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Read a history written by [`TrainingHistory::save`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn epoch(valid_loss: f32) -> EpochMetrics {
        EpochMetrics {
            train_loss: 0.5,
            train_acc: 0.75,
            valid_loss,
            valid_acc: 0.7,
        }
    }

    #[test]
    fn test_push_epoch() {
        let mut history = TrainingHistory::new();
        history.push_epoch(epoch(0.6));
        history.push_epoch(epoch(0.4));
        history.push_epoch(epoch(0.5));

        assert_eq!(history.n_epochs(), 3);
        assert_eq!(history.get(VALID_LOSS), Some(&[0.6, 0.4, 0.5][..]));
        assert_eq!(history.best_epoch(), Some(1));
        assert_eq!(history.metric_names(), vec![TRAIN_ACC, TRAIN_LOSS, VALID_ACC, VALID_LOSS]);
        assert!(history.get("lr").is_none());
    }

    #[test]
    fn test_json_layout() {
        let mut history = TrainingHistory::new();
        history.push(TRAIN_LOSS, 0.25);

        let json = serde_json::to_string(&history).unwrap();
        assert_eq!(json, r#"{"train_loss":[0.25]}"#);
    }

    #[test]
    fn test_save_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.json");

        let mut history = TrainingHistory::new();
        history.push_epoch(epoch(0.3));
        history.save(&path).unwrap();

        assert_eq!(TrainingHistory::load(&path).unwrap(), history);
    }
}
