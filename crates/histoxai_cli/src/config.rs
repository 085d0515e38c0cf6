//! Experiment configuration file.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use histoxai_core::Seed;
use histoxai_data::SplitSizes;
use histoxai_explain::{InsertionDeletionConfig, IntegratedGradientsConfig, OcclusionConfig};
use histoxai_models::PatchCnnConfig;
use histoxai_train::TrainerConfig;

/// Name of the configuration file written into every run directory.
pub const CONFIG_FILE: &str = "config.json";

/// Every setting of a run, as read from and written to JSON.
///
/// Missing top-level sections fall back to their defaults, so a config file
/// only needs the sections it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentConfig {
    pub seed: Seed,
    pub split: SplitSizes,
    pub batch_size: usize,
    pub trainer: TrainerConfig,
    pub model: PatchCnnConfig,
    pub occlusion: OcclusionConfig,
    pub integrated_gradients: IntegratedGradientsConfig,
    pub benchmark: InsertionDeletionConfig,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            seed: Seed::default(),
            split: SplitSizes::default(),
            batch_size: 64,
            trainer: TrainerConfig::default(),
            model: PatchCnnConfig::default(),
            occlusion: OcclusionConfig::default(),
            integrated_gradients: IntegratedGradientsConfig::default(),
            benchmark: InsertionDeletionConfig::default(),
        }
    }
}

impl ExperimentConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).with_context(|| format!("Failed to read config {}", path.display()))?;
        serde_json::from_str(&json).with_context(|| format!("Failed to parse config {}", path.display()))
    }

    /// Load `path` if given, otherwise start from defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).with_context(|| format!("Failed to write config {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);

        let mut config = ExperimentConfig::default();
        config.seed = Seed::new(7);
        config.trainer.n_epochs = 3;
        config.occlusion = OcclusionConfig::default().with_stride(16);
        config.save(&path).unwrap();

        assert_eq!(ExperimentConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: ExperimentConfig = serde_json::from_str(r#"{ "seed": 9, "batch_size": 16 }"#).unwrap();
        assert_eq!(config.seed, Seed::new(9));
        assert_eq!(config.batch_size, 16);
        assert_eq!(config.model, PatchCnnConfig::default());
        assert_eq!(config.benchmark.steps, 20);
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(ExperimentConfig::load(dir.path().join("nope.json")).is_err());
        assert_eq!(ExperimentConfig::load_or_default(None).unwrap(), ExperimentConfig::default());
    }
}
