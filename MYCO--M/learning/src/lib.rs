#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    missing_docs,
    rust_2018_idioms
)]

//! Myco learning stack: tabular loading, label encoding, random forest training,
//! evaluation, artifact persistence and the inference contract used by the service.

/// CSV dataset loading.
pub mod dataset;

/// Label encoders and the feature schema.
pub mod encoder;

/// Seeded train/test split.
pub mod split;

/// Random forest classifier.
pub mod forest;

/// Accuracy and classification report.
pub mod metrics;

/// Model/encoder artifact persistence.
pub mod artifacts;

/// Held-out predictions table.
pub mod predictions;

/// Request validation and prediction.
pub mod inference;

/// Training configuration.
pub mod config;

/// Telemetry helpers for structured logging.
pub mod telemetry;

/// Training pipeline orchestration.
pub mod pipeline;

pub use artifacts::{load_artifacts, save_artifacts, ArtifactError, ArtifactPaths, ModelBundle};
pub use config::TrainingConfig;
pub use dataset::{Column, ColumnKind, Dataset, DatasetError};
pub use encoder::{EncodeError, EncoderSet, FeatureSchema, FeatureSpec, LabelEncoder};
pub use forest::{ForestError, ForestParams, MaxFeatures, RandomForestClassifier};
pub use inference::{FeatureRequest, PredictError, Prediction, Predictor, Verdict};
pub use metrics::{accuracy, ClassificationReport};
pub use pipeline::{Evaluation, TrainingOutcome, TrainingPipeline};
pub use predictions::{
    read_predictions, records_from, write_predictions, MushroomPartition, PredictionRecord,
    PredictionsError,
};
pub use telemetry::{LearningTelemetry, LearningTelemetryBuilder};
