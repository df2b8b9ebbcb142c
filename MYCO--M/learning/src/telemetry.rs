//! Structured logging handle shared by the training stages.

use std::{fmt, path::PathBuf, sync::Arc};

use anyhow::Result;
use serde_json::Value;
use shared_logging::{JsonLogger, LogLevel, LogRecord};

/// Builder configuring telemetry for training runs.
#[derive(Debug)]
pub struct LearningTelemetryBuilder {
    module: String,
    log_path: Option<PathBuf>,
    console: bool,
}

impl LearningTelemetryBuilder {
    /// Creates a new builder.
    #[must_use]
    pub fn new(module: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            log_path: None,
            console: false,
        }
    }

    /// Sets the JSON log path.
    #[must_use]
    pub fn log_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_path = Some(path.into());
        self
    }

    /// Mirrors records to stderr.
    #[must_use]
    pub const fn console(mut self, enabled: bool) -> Self {
        self.console = enabled;
        self
    }

    /// Finalizes the builder.
    pub fn build(self) -> Result<LearningTelemetry> {
        let logger = match self.log_path {
            Some(path) => Some(JsonLogger::new(path)?.with_console(self.console)),
            None => None,
        };
        Ok(LearningTelemetry {
            inner: Arc::new(TelemetryInner {
                module: self.module,
                logger,
            }),
        })
    }
}

/// Telemetry handle shared by pipeline stages.
#[derive(Clone)]
pub struct LearningTelemetry {
    inner: Arc<TelemetryInner>,
}

impl fmt::Debug for LearningTelemetry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LearningTelemetry")
            .field("module", &self.inner.module)
            .finish()
    }
}

struct TelemetryInner {
    module: String,
    logger: Option<JsonLogger>,
}

impl LearningTelemetry {
    /// Returns a builder for this telemetry helper.
    #[must_use]
    pub fn builder(module: impl Into<String>) -> LearningTelemetryBuilder {
        LearningTelemetryBuilder::new(module)
    }

    /// Logs a structured record.
    pub fn log(&self, level: LogLevel, message: &str, metadata: Value) -> Result<()> {
        if let Some(logger) = &self.inner.logger {
            let record = LogRecord::new(&self.inner.module, level, message).with_metadata(metadata);
            logger.log(&record)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    #[test]
    fn telemetry_writes_records() {
        let dir = tempdir().unwrap();
        let log_path = dir.path().join("mushroom_classification.log");
        let telemetry = LearningTelemetry::builder("trainer")
            .log_path(&log_path)
            .build()
            .unwrap();
        telemetry
            .log(LogLevel::Info, "Training the model...", json!({ "trees": 3 }))
            .unwrap();
        let records = JsonLogger::read_records(&log_path).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].module, "trainer");
        assert_eq!(records[0].metadata["trees"], 3);
    }

    #[test]
    fn telemetry_without_sink_is_silent() {
        let telemetry = LearningTelemetry::builder("trainer").build().unwrap();
        telemetry.log(LogLevel::Debug, "noop", json!({})).unwrap();
    }
}
