#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    missing_docs,
    rust_2018_idioms
)]

//! Structured JSON-lines logging shared by the training pipeline and its tools.
//!
//! Every record lands in an append-only JSON-lines file. A logger can also
//! mirror records to stderr in a human readable form so that batch runs show
//! progress on the console while keeping the machine readable trail on disk.

use std::{
    fmt,
    fs::{self, File},
    io::{self, Write},
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Log severity level.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    /// Debug information.
    Debug,
    /// Informational events.
    Info,
    /// Warning indicator.
    Warn,
    /// Error indicator.
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Warn => "WARN",
            Self::Error => "ERROR",
        };
        f.write_str(label)
    }
}

/// Structured log record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogRecord {
    /// Timestamp in ISO8601.
    pub timestamp: DateTime<Utc>,
    /// Module emitting the log.
    pub module: String,
    /// Severity.
    pub level: LogLevel,
    /// Human-readable message.
    pub message: String,
    /// Arbitrary JSON fields attached to the record.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
}

impl LogRecord {
    /// Creates a record stamped with the current time.
    #[must_use]
    pub fn new(module: impl Into<String>, level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            module: module.into(),
            level,
            message: message.into(),
            metadata: Map::new(),
        }
    }

    /// Attaches metadata when `value` is a JSON object; other values are ignored.
    #[must_use]
    pub fn with_metadata(mut self, value: Value) -> Self {
        if let Value::Object(map) = value {
            self.metadata = map;
        }
        self
    }

    /// Renders the `<ts> - <module> - <LEVEL> - <message>` console form.
    #[must_use]
    pub fn console_line(&self) -> String {
        format!(
            "{} - {} - {} - {}",
            self.timestamp.format("%Y-%m-%d %H:%M:%S%.3f"),
            self.module,
            self.level,
            self.message
        )
    }
}

/// Thread-safe JSON-lines logger with an optional stderr mirror.
#[derive(Debug)]
pub struct JsonLogger {
    path: PathBuf,
    writer: Mutex<File>,
    console: bool,
}

impl JsonLogger {
    /// Creates or opens a logger at the desired path, creating parent directories.
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating log directory {}", parent.display()))?;
        }
        let file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("opening log file {}", path.display()))?;
        Ok(Self {
            path,
            writer: Mutex::new(file),
            console: false,
        })
    }

    /// Enables or disables mirroring records to stderr.
    #[must_use]
    pub const fn with_console(mut self, enabled: bool) -> Self {
        self.console = enabled;
        self
    }

    /// Writes a record as one JSON line and mirrors it when enabled.
    pub fn log(&self, record: &LogRecord) -> Result<()> {
        {
            let mut writer = self.writer.lock();
            serde_json::to_writer(&mut *writer, record)?;
            writer.write_all(b"\n")?;
            writer.flush()?;
        }
        if self.console {
            let mut stderr = io::stderr().lock();
            writeln!(stderr, "{}", record.console_line())?;
            if let Some(Value::String(block)) = record.metadata.get("report") {
                writeln!(stderr, "{block}")?;
            }
        }
        Ok(())
    }

    /// Returns the underlying file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads every record back from a log file, skipping blank lines.
    pub fn read_records(path: impl AsRef<Path>) -> Result<Vec<LogRecord>> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .with_context(|| format!("reading log file {}", path.display()))?;
        raw.lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| serde_json::from_str(line).context("decoding log record"))
            .collect()
    }
}
