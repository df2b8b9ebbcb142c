use std::{
    fs::{self, File, OpenOptions},
    io::{BufRead, BufReader, Write},
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use myco_learning::{
    load_artifacts, ArtifactPaths, LearningTelemetry, TrainingConfig, TrainingOutcome,
    TrainingPipeline,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use shared_logging::{JsonLogger, LogLevel, LogRecord};
use uuid::Uuid;

const DEFAULT_MANIFEST: &str = "logs/runs/index.jsonl";

#[derive(Parser, Debug)]
#[command(name = "trn", version, about = "Mushroom classifier training runner")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Trains, evaluates and persists a model.
    Run(RunArgs),
    /// Lists most recent runs.
    List {
        /// Number of entries to display.
        #[arg(long, default_value_t = 10)]
        limit: usize,
        #[arg(long, default_value = DEFAULT_MANIFEST)]
        manifest: PathBuf,
    },
    /// Shows a run by id.
    Status {
        run_id: String,
        #[arg(long, default_value = DEFAULT_MANIFEST)]
        manifest: PathBuf,
    },
    /// Prints the encoder classes stored next to a model.
    Inspect {
        #[arg(long, default_value = "models")]
        models_dir: PathBuf,
    },
}

#[derive(Parser, Debug, Default)]
struct RunArgs {
    /// TOML config; defaults apply when omitted.
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    data: Option<PathBuf>,
    #[arg(long)]
    seed: Option<u64>,
    #[arg(long)]
    test_ratio: Option<f64>,
    #[arg(long)]
    trees: Option<usize>,
    /// Directory receiving both artifact files.
    #[arg(long)]
    models_dir: Option<PathBuf>,
    #[arg(long)]
    predictions: Option<PathBuf>,
    #[arg(long)]
    log_file: Option<PathBuf>,
    #[arg(long, default_value = DEFAULT_MANIFEST)]
    manifest: PathBuf,
    /// Do not mirror log records to stderr.
    #[arg(long)]
    quiet: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
struct RunManifestEntry {
    run_id: String,
    submitted_at: DateTime<Utc>,
    #[serde(default)]
    finished_at: Option<DateTime<Utc>>,
    data_path: PathBuf,
    seed: u64,
    log_path: PathBuf,
    status: String,
    #[serde(default)]
    accuracy: Option<f64>,
}

impl RunManifestEntry {
    fn new(config: &TrainingConfig) -> Self {
        Self {
            run_id: format!("run-{}", Uuid::new_v4()),
            submitted_at: Utc::now(),
            finished_at: None,
            data_path: config.data_path.clone(),
            seed: config.seed,
            log_path: config.log_path.clone(),
            status: "pending".into(),
            accuracy: None,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Run(args) => handle_run(args),
        Commands::List { limit, manifest } => {
            let entries = read_manifest(&manifest)?;
            for entry in entries.into_iter().rev().take(limit) {
                let accuracy = entry
                    .accuracy
                    .map_or_else(|| "-".to_string(), |acc| format!("{acc:.4}"));
                println!(
                    "{} | {} | {} | seed={} | accuracy={}",
                    entry.run_id, entry.status, entry.submitted_at, entry.seed, accuracy
                );
            }
            Ok(())
        }
        Commands::Status { run_id, manifest } => {
            let entries = read_manifest(&manifest)?;
            if let Some(entry) = entries.into_iter().find(|e| e.run_id == run_id) {
                println!("{}", serde_json::to_string_pretty(&entry)?);
            } else {
                println!("run {run_id} not found");
            }
            Ok(())
        }
        Commands::Inspect { models_dir } => {
            let bundle = load_artifacts(&ArtifactPaths::in_dir(&models_dir))
                .with_context(|| format!("loading artifacts from {}", models_dir.display()))?;
            println!(
                "target={} features={} trees={}",
                bundle.encoders.target(),
                bundle.encoders.schema().len(),
                bundle.model.trees().len()
            );
            for (column, encoder) in bundle.encoders.iter() {
                let classes: Vec<String> = encoder
                    .classes()
                    .iter()
                    .enumerate()
                    .map(|(code, class)| format!("{class}={code}"))
                    .collect();
                println!("{column}: {}", classes.join(", "));
            }
            Ok(())
        }
    }
}

fn resolve_config(args: &RunArgs) -> Result<TrainingConfig> {
    let mut config = match &args.config {
        Some(path) => TrainingConfig::load(path)?,
        None => TrainingConfig::default(),
    };
    if let Some(data) = &args.data {
        config.data_path.clone_from(data);
    }
    if let Some(seed) = args.seed {
        config.seed = seed;
    }
    if let Some(ratio) = args.test_ratio {
        config.test_ratio = ratio;
    }
    if let Some(trees) = args.trees {
        config.forest.n_trees = trees;
    }
    if let Some(dir) = &args.models_dir {
        let paths = ArtifactPaths::in_dir(dir);
        config.model_path = paths.model;
        config.encoders_path = paths.encoders;
    }
    if let Some(predictions) = &args.predictions {
        config.predictions_path.clone_from(predictions);
    }
    if let Some(log_file) = &args.log_file {
        config.log_path.clone_from(log_file);
    }
    config.validate()?;
    Ok(config)
}

fn handle_run(args: RunArgs) -> Result<()> {
    let config = resolve_config(&args)?;
    let mut entry = RunManifestEntry::new(&config);
    entry.status = "running".into();
    append_manifest(&args.manifest, &entry)?;

    let telemetry = LearningTelemetry::builder("trn")
        .log_path(&config.log_path)
        .console(!args.quiet)
        .build()?;
    let pipeline = TrainingPipeline::new(config).with_telemetry(telemetry);

    match pipeline.run_with_id(entry.run_id.clone()) {
        Ok(outcome) => {
            finish_run(&args.manifest, &entry.run_id, "completed", Some(&outcome))?;
            println!("{}", serde_json::to_string_pretty(&summary(&outcome))?);
            Ok(())
        }
        Err(err) => {
            finish_run(&args.manifest, &entry.run_id, "failed", None)?;
            log_run_event(
                &entry.log_path,
                LogLevel::Error,
                "run failed",
                json!({ "run_id": entry.run_id, "error": format!("{err:#}") }),
            )?;
            Err(err)
        }
    }
}

fn summary(outcome: &TrainingOutcome) -> Value {
    json!({
        "run_id": outcome.run_id,
        "accuracy": outcome.accuracy,
        "train_rows": outcome.train_rows,
        "test_rows": outcome.test_rows,
        "model": outcome.artifacts.model,
        "encoders": outcome.artifacts.encoders,
        "predictions": outcome.predictions_path,
        "duration_ms": (outcome.finished_at - outcome.started_at).num_milliseconds(),
    })
}

fn append_manifest(path: &Path, entry: &RunManifestEntry) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("opening manifest {}", path.display()))?;
    serde_json::to_writer(&mut file, entry)?;
    file.write_all(b"\n")?;
    Ok(())
}

fn read_manifest(path: &Path) -> Result<Vec<RunManifestEntry>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let file = File::open(path)?;
    let reader = BufReader::new(file);
    let mut entries = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        entries.push(serde_json::from_str(&line)?);
    }
    Ok(entries)
}

fn finish_run(
    path: &Path,
    run_id: &str,
    status: &str,
    outcome: Option<&TrainingOutcome>,
) -> Result<()> {
    let mut entries = read_manifest(path)?;
    let Some(entry) = entries.iter_mut().find(|entry| entry.run_id == run_id) else {
        return Ok(());
    };
    entry.status = status.to_string();
    entry.finished_at = Some(outcome.map_or_else(Utc::now, |o| o.finished_at));
    entry.accuracy = outcome.map(|o| o.accuracy);

    let mut file = File::create(path)?;
    for entry in entries {
        serde_json::to_writer(&mut file, &entry)?;
        file.write_all(b"\n")?;
    }
    Ok(())
}

fn log_run_event(path: &Path, level: LogLevel, message: &str, metadata: Value) -> Result<()> {
    let logger = JsonLogger::new(path)?;
    logger.log(&LogRecord::new("trn", level, message).with_metadata(metadata))
}
