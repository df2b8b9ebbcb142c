//! Training run configuration loaded from TOML.

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{ensure, Context, Result};
use serde::{Deserialize, Serialize};

use crate::{artifacts::ArtifactPaths, forest::ForestParams};

/// Everything a training run needs. Unset keys take the defaults below.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// Labeled CSV input.
    pub data_path: PathBuf,
    /// Target column name.
    pub target_column: String,
    /// Held-out fraction.
    pub test_ratio: f64,
    /// Seed for both the split and the forest.
    pub seed: u64,
    /// Classifier artifact.
    pub model_path: PathBuf,
    /// Encoder artifact.
    pub encoders_path: PathBuf,
    /// Held-out predictions CSV.
    pub predictions_path: PathBuf,
    /// JSON-lines run log.
    pub log_path: PathBuf,
    /// Forest hyper-parameters.
    pub forest: ForestParams,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        let artifacts = ArtifactPaths::default();
        Self {
            data_path: PathBuf::from("data/mushrooms.csv"),
            target_column: "class".into(),
            test_ratio: 0.2,
            seed: 42,
            model_path: artifacts.model,
            encoders_path: artifacts.encoders,
            predictions_path: PathBuf::from("data/predictions.csv"),
            log_path: PathBuf::from("logs/mushroom_classification.log"),
            forest: ForestParams::default(),
        }
    }
}

impl TrainingConfig {
    /// Loads a TOML file; relative paths resolve against the file's directory.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .with_context(|| format!("reading training config {}", path.display()))?;
        let mut config: Self =
            toml::from_str(&raw).with_context(|| format!("parsing {}", path.display()))?;
        let base = path
            .parent()
            .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
        for slot in [
            &mut config.data_path,
            &mut config.model_path,
            &mut config.encoders_path,
            &mut config.predictions_path,
            &mut config.log_path,
        ] {
            if slot.is_relative() {
                *slot = base.join(&*slot);
            }
        }
        config.validate()?;
        Ok(config)
    }

    /// Checks value ranges.
    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.test_ratio > 0.0 && self.test_ratio < 1.0,
            "test_ratio must be between 0 and 1 (exclusive), got {}",
            self.test_ratio
        );
        ensure!(self.forest.n_trees > 0, "forest.n_trees must be positive");
        ensure!(
            !self.target_column.trim().is_empty(),
            "target_column must not be empty"
        );
        Ok(())
    }

    /// Artifact locations for this run.
    #[must_use]
    pub fn artifact_paths(&self) -> ArtifactPaths {
        ArtifactPaths {
            model: self.model_path.clone(),
            encoders: self.encoders_path.clone(),
        }
    }
}
