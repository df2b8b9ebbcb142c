use std::{fs, path::Path, sync::Arc};

use myco_learning::{
    load_artifacts, read_predictions, Dataset, ForestParams, LearningTelemetry, MushroomPartition,
    Predictor, TrainingConfig, TrainingPipeline, Verdict,
};
use serde_json::json;
use shared_logging::JsonLogger;
use tempfile::tempdir;

const ODORS: [&str; 5] = ["a", "f", "n", "p", "l"];
const SHAPES: [&str; 4] = ["x", "b", "f", "k"];

/// Mushroom-shaped fixture: foul (`f`) and pungent (`p`) odors are poisonous.
fn write_fixture(path: &Path, rows: usize) {
    let mut csv = String::from("class,cap-shape,bruises,odor,gill-size\n");
    for i in 0..rows {
        let odor = ODORS[i % ODORS.len()];
        let class = if matches!(odor, "f" | "p") { "p" } else { "e" };
        let shape = SHAPES[(i / 5) % SHAPES.len()];
        let bruises = if (i / 3) % 2 == 0 { "t" } else { "f" };
        let gill = if i % 7 < 3 { "b" } else { "n" };
        csv.push_str(&format!("{class},{shape},{bruises},{odor},{gill}\n"));
    }
    fs::write(path, csv).unwrap();
}

fn config_in(dir: &Path) -> TrainingConfig {
    TrainingConfig {
        data_path: dir.join("data/mushrooms.csv"),
        model_path: dir.join("models/mushroom_classifier.bin"),
        encoders_path: dir.join("models/encoders.bin"),
        predictions_path: dir.join("data/predictions.csv"),
        log_path: dir.join("logs/mushroom_classification.log"),
        forest: ForestParams {
            n_trees: 20,
            ..ForestParams::default()
        },
        ..TrainingConfig::default()
    }
}

#[test]
fn run_writes_artifacts_predictions_and_log() {
    let dir = tempdir().unwrap();
    let config = config_in(dir.path());
    fs::create_dir_all(dir.path().join("data")).unwrap();
    write_fixture(&config.data_path, 200);

    let telemetry = LearningTelemetry::builder("trainer")
        .log_path(&config.log_path)
        .build()
        .unwrap();
    let outcome = TrainingPipeline::new(config.clone())
        .with_telemetry(telemetry)
        .run()
        .unwrap();

    assert_eq!(outcome.test_rows, 40);
    assert_eq!(outcome.train_rows, 160);
    assert!(outcome.accuracy >= 0.9, "accuracy {}", outcome.accuracy);
    assert!(config.model_path.exists());
    assert!(config.encoders_path.exists());

    let records = read_predictions(&config.predictions_path).unwrap();
    assert_eq!(records.len(), 40);
    let partition = MushroomPartition::from_records(&records);
    assert_eq!(partition.poisonous_count() + partition.edible_count(), 40);

    let messages: Vec<String> = JsonLogger::read_records(&config.log_path)
        .unwrap()
        .into_iter()
        .map(|record| record.message)
        .collect();
    for expected in [
        "Preprocessing data...",
        "Encoding column: odor",
        "Splitting data into training and testing sets...",
        "Training the model...",
        "Evaluating the model...",
        "Saving model and encoders...",
        "Script execution completed.",
    ] {
        assert!(messages.iter().any(|m| m == expected), "missing log {expected}");
    }
    assert!(messages.iter().any(|m| m.starts_with("Accuracy: ")));
}

#[test]
fn repeated_runs_are_identical() {
    let dir = tempdir().unwrap();
    let config = config_in(dir.path());
    fs::create_dir_all(dir.path().join("data")).unwrap();
    write_fixture(&config.data_path, 150);
    let dataset = Dataset::from_csv(&config.data_path, "class").unwrap();

    let pipeline = TrainingPipeline::new(config);
    let first = pipeline.fit_and_evaluate(&dataset).unwrap();
    let second = pipeline.fit_and_evaluate(&dataset).unwrap();
    assert_eq!(first.split, second.split);
    assert_eq!(first.records, second.records);
    assert!((first.accuracy - second.accuracy).abs() < f64::EPSILON);
}

#[test]
fn persisted_bundle_serves_predictions() {
    let dir = tempdir().unwrap();
    let config = config_in(dir.path());
    fs::create_dir_all(dir.path().join("data")).unwrap();
    write_fixture(&config.data_path, 200);
    TrainingPipeline::new(config.clone()).run().unwrap();

    let bundle = load_artifacts(&config.artifact_paths()).unwrap();
    let predictor = Predictor::new(Arc::new(bundle));
    assert_eq!(
        predictor.required_features(),
        vec!["cap-shape", "bruises", "odor", "gill-size"]
    );
    let verdict = predictor
        .predict_value(&json!({
            "cap-shape": "x", "bruises": "t", "odor": "f", "gill-size": "b"
        }))
        .unwrap()
        .prediction;
    assert!(matches!(verdict, Verdict::Poisonous | Verdict::Edible));
}

#[test]
fn missing_dataset_fails_the_run() {
    let dir = tempdir().unwrap();
    let err = TrainingPipeline::new(config_in(dir.path())).run().unwrap_err();
    assert!(format!("{err:#}").contains("mushrooms.csv"));
}
