//! Persistence of the fitted model and encoder set as a pair of binary files.

use std::{
    fs, io,
    path::{Path, PathBuf},
};

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;

use crate::{
    encoder::{EncodeError, EncoderSet},
    forest::{ForestError, RandomForestClassifier},
};

/// Locations of the two artifact files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactPaths {
    /// Serialized classifier.
    pub model: PathBuf,
    /// Serialized encoder set.
    pub encoders: PathBuf,
}

impl ArtifactPaths {
    /// Conventional file names inside `dir`.
    #[must_use]
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            model: dir.join("mushroom_classifier.bin"),
            encoders: dir.join("encoders.bin"),
        }
    }
}

impl Default for ArtifactPaths {
    fn default() -> Self {
        Self::in_dir("models")
    }
}

/// Model and encoders loaded as one unit. Never mutated after construction.
#[derive(Debug, Clone)]
pub struct ModelBundle {
    /// Fitted classifier.
    pub model: RandomForestClassifier,
    /// Encoders and feature layout.
    pub encoders: EncoderSet,
}

impl ModelBundle {
    /// Pairs a model with its encoders after checking both structures and that
    /// their widths agree.
    pub fn new(model: RandomForestClassifier, encoders: EncoderSet) -> Result<Self, ArtifactError> {
        model.validate()?;
        encoders.validate()?;
        if model.n_features() != encoders.schema().len() {
            return Err(ArtifactError::SchemaMismatch {
                model: model.n_features(),
                schema: encoders.schema().len(),
            });
        }
        Ok(Self { model, encoders })
    }
}

/// Writes both artifacts, replacing earlier ones.
pub fn save_artifacts(bundle: &ModelBundle, paths: &ArtifactPaths) -> Result<(), ArtifactError> {
    write_blob(&paths.model, &bundle.model)?;
    write_blob(&paths.encoders, &bundle.encoders)
}

/// Reads both artifacts; either one missing or corrupt fails the whole load.
pub fn load_artifacts(paths: &ArtifactPaths) -> Result<ModelBundle, ArtifactError> {
    let model: RandomForestClassifier = read_blob(&paths.model)?;
    let encoders: EncoderSet = read_blob(&paths.encoders)?;
    ModelBundle::new(model, encoders)
}

fn write_blob<T: Serialize>(path: &Path, value: &T) -> Result<(), ArtifactError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|source| ArtifactError::io(parent, source))?;
    }
    let bytes = bincode::serialize(value).map_err(|err| ArtifactError::Encode {
        path: path.to_path_buf(),
        message: err.to_string(),
    })?;
    fs::write(path, bytes).map_err(|source| ArtifactError::io(path, source))
}

fn read_blob<T: DeserializeOwned>(path: &Path) -> Result<T, ArtifactError> {
    let bytes = fs::read(path).map_err(|source| ArtifactError::io(path, source))?;
    bincode::deserialize(&bytes).map_err(|err| ArtifactError::Decode {
        path: path.to_path_buf(),
        message: err.to_string(),
    })
}

/// Artifact persistence failures.
#[derive(Debug, Error)]
pub enum ArtifactError {
    /// Filesystem failure.
    #[error("artifact io at {path}: {source}")]
    Io {
        /// Affected path.
        path: PathBuf,
        /// Underlying error.
        source: io::Error,
    },
    /// Serialization failure.
    #[error("encoding artifact {path}: {message}")]
    Encode {
        /// Affected path.
        path: PathBuf,
        /// Serializer message.
        message: String,
    },
    /// File present but unreadable as the expected artifact.
    #[error("corrupt artifact {path}: {message}")]
    Decode {
        /// Affected path.
        path: PathBuf,
        /// Deserializer message.
        message: String,
    },
    /// Model width differs from the encoder schema.
    #[error("model expects {model} features but encoder schema has {schema}")]
    SchemaMismatch {
        /// Model feature count.
        model: usize,
        /// Schema feature count.
        schema: usize,
    },
    /// Model decoded but its trees cannot be evaluated.
    #[error("invalid model artifact: {0}")]
    InvalidModel(#[from] ForestError),
    /// Encoders decoded but are inconsistent.
    #[error("invalid encoder artifact: {0}")]
    InvalidEncoders(#[from] EncodeError),
}

impl ArtifactError {
    fn io(path: &Path, source: io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}
