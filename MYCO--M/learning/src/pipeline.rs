//! Offline training run: load, encode, split, fit, evaluate, persist.

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use shared_logging::LogLevel;
use uuid::Uuid;

use crate::{
    artifacts::{save_artifacts, ArtifactPaths, ModelBundle},
    config::TrainingConfig,
    dataset::Dataset,
    encoder::EncoderSet,
    forest::RandomForestClassifier,
    metrics::{accuracy, ClassificationReport},
    predictions::{records_from, write_predictions, PredictionRecord},
    split::{select, train_test_split, SplitIndices},
    telemetry::LearningTelemetry,
};

/// Model fitted and scored in memory, before anything touches the disk.
#[derive(Debug, Clone)]
pub struct Evaluation {
    /// Model plus encoders.
    pub bundle: ModelBundle,
    /// Row indices of each side.
    pub split: SplitIndices,
    /// Held-out actual/predicted pairs in test order.
    pub records: Vec<PredictionRecord>,
    /// Held-out accuracy.
    pub accuracy: f64,
    /// Per-class report.
    pub report: ClassificationReport,
}

/// Summary of a completed run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingOutcome {
    /// Run identifier.
    pub run_id: String,
    /// Start time.
    pub started_at: DateTime<Utc>,
    /// Completion time.
    pub finished_at: DateTime<Utc>,
    /// Rows used for fitting.
    pub train_rows: usize,
    /// Held-out rows.
    pub test_rows: usize,
    /// Held-out accuracy.
    pub accuracy: f64,
    /// Per-class report.
    pub report: ClassificationReport,
    /// Where the artifacts were written.
    pub artifacts: ArtifactPaths,
    /// Where the predictions table was written.
    pub predictions_path: PathBuf,
}

/// Batch training pipeline.
#[derive(Debug, Clone)]
pub struct TrainingPipeline {
    config: TrainingConfig,
    telemetry: Option<LearningTelemetry>,
}

impl TrainingPipeline {
    /// Creates a pipeline without telemetry.
    #[must_use]
    pub const fn new(config: TrainingConfig) -> Self {
        Self {
            config,
            telemetry: None,
        }
    }

    /// Attaches telemetry.
    #[must_use]
    pub fn with_telemetry(mut self, telemetry: LearningTelemetry) -> Self {
        self.telemetry = Some(telemetry);
        self
    }

    /// Run configuration.
    #[must_use]
    pub const fn config(&self) -> &TrainingConfig {
        &self.config
    }

    /// Runs every stage and writes the artifacts and predictions table.
    pub fn run(&self) -> Result<TrainingOutcome> {
        self.run_with_id(format!("run-{}", Uuid::new_v4()))
    }

    /// Same as [`Self::run`] with a caller-chosen run id.
    pub fn run_with_id(&self, run_id: String) -> Result<TrainingOutcome> {
        let started_at = Utc::now();
        let config = &self.config;

        self.log(
            LogLevel::Info,
            &format!("Loading data from {}...", config.data_path.display()),
            json!({ "run_id": run_id }),
        );
        let dataset = Dataset::from_csv(&config.data_path, &config.target_column)
            .with_context(|| format!("loading dataset {}", config.data_path.display()))?;
        self.log(
            LogLevel::Debug,
            "dataset loaded",
            json!({ "rows": dataset.len(), "columns": dataset.columns().count() }),
        );

        let evaluation = self.fit_and_evaluate(&dataset)?;

        self.log(LogLevel::Info, "Saving model and encoders...", json!({}));
        let artifacts = config.artifact_paths();
        save_artifacts(&evaluation.bundle, &artifacts).context("saving artifacts")?;
        write_predictions(&config.predictions_path, &evaluation.records).with_context(|| {
            format!(
                "writing predictions {}",
                config.predictions_path.display()
            )
        })?;
        self.log(
            LogLevel::Info,
            "Script execution completed.",
            json!({
                "run_id": run_id,
                "model": artifacts.model,
                "encoders": artifacts.encoders,
                "predictions": config.predictions_path,
            }),
        );

        Ok(TrainingOutcome {
            run_id,
            started_at,
            finished_at: Utc::now(),
            train_rows: evaluation.split.train.len(),
            test_rows: evaluation.split.test.len(),
            accuracy: evaluation.accuracy,
            report: evaluation.report,
            artifacts,
            predictions_path: config.predictions_path.clone(),
        })
    }

    /// Encodes, splits, fits and scores a dataset without writing anything.
    pub fn fit_and_evaluate(&self, dataset: &Dataset) -> Result<Evaluation> {
        let config = &self.config;

        self.log(LogLevel::Info, "Preprocessing data...", json!({}));
        let (encoders, encoded) = EncoderSet::fit(dataset).context("encoding dataset")?;
        for (column, encoder) in encoders.iter() {
            self.log(
                LogLevel::Info,
                &format!("Encoding column: {column}"),
                json!({ "classes": encoder.len() }),
            );
        }
        self.log(LogLevel::Info, "Data preprocessing completed.", json!({}));

        self.log(
            LogLevel::Info,
            "Splitting data into training and testing sets...",
            json!({ "test_ratio": config.test_ratio, "seed": config.seed }),
        );
        let split = train_test_split(dataset.len(), config.test_ratio, config.seed)?;
        let train_x = select(&encoded.features, &split.train);
        let train_y = select(&encoded.labels, &split.train);
        let test_x = select(&encoded.features, &split.test);
        let test_y = select(&encoded.labels, &split.test);

        self.log(
            LogLevel::Info,
            "Training the model...",
            json!({ "trees": config.forest.n_trees, "train_rows": train_x.len() }),
        );
        let model = RandomForestClassifier::fit(&config.forest, config.seed, &train_x, &train_y)
            .context("fitting random forest")?;

        self.log(LogLevel::Info, "Evaluating the model...", json!({}));
        let predicted = model.predict(&test_x).context("scoring held-out rows")?;
        let accuracy = accuracy(&test_y, &predicted);
        let labels = encoders.target_encoder()?.classes().to_vec();
        let report = ClassificationReport::compute(&test_y, &predicted, &labels);
        self.log(
            LogLevel::Info,
            &format!("Accuracy: {accuracy}"),
            json!({ "accuracy": accuracy, "test_rows": test_y.len() }),
        );
        self.log(
            LogLevel::Info,
            "Classification Report:",
            json!({ "report": report.to_string() }),
        );

        let bundle = ModelBundle::new(model, encoders)?;
        Ok(Evaluation {
            bundle,
            split,
            records: records_from(&test_y, &predicted),
            accuracy,
            report,
        })
    }

    fn log(&self, level: LogLevel, message: &str, metadata: Value) {
        if let Some(telemetry) = self.telemetry.as_ref() {
            let _ = telemetry.log(level, message, metadata);
        }
    }
}
