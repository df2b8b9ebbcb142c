//! Environment-driven server settings.

use std::{env, net::SocketAddr, path::PathBuf};

use anyhow::{Context, Result};
use myco_learning::{ArtifactPaths, TrainingConfig};

/// Bind address plus the files the service reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Interface to bind.
    pub host: String,
    /// TCP port.
    pub port: u16,
    /// Model and encoder artifacts loaded at startup.
    pub artifacts: ArtifactPaths,
    /// Predictions table read on every list request.
    pub predictions_path: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        let training = TrainingConfig::default();
        Self {
            host: "127.0.0.1".into(),
            port: 5000,
            artifacts: training.artifact_paths(),
            predictions_path: training.predictions_path,
        }
    }
}

impl ServerConfig {
    /// Reads `HOST`, `PORT`, `MODEL_PATH`, `ENCODERS_PATH` and `PREDICTIONS_PATH`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as [`Self::from_env`] over an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();
        if let Some(host) = lookup("HOST") {
            config.host = host;
        }
        if let Some(port) = lookup("PORT") {
            config.port = port
                .trim()
                .parse()
                .with_context(|| format!("PORT must be a valid port number, got '{port}'"))?;
        }
        if let Some(model) = lookup("MODEL_PATH") {
            config.artifacts.model = model.into();
        }
        if let Some(encoders) = lookup("ENCODERS_PATH") {
            config.artifacts.encoders = encoders.into();
        }
        if let Some(predictions) = lookup("PREDICTIONS_PATH") {
            config.predictions_path = predictions.into();
        }
        Ok(config)
    }

    /// Socket address built from host and port.
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("invalid HOST:PORT {}:{}", self.host, self.port))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn defaults_listen_on_port_5000() {
        let config = ServerConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.port, 5000);
        assert_eq!(config.socket_addr().unwrap().to_string(), "127.0.0.1:5000");
        assert_eq!(config.predictions_path, PathBuf::from("data/predictions.csv"));
        assert_eq!(
            config.artifacts.model,
            PathBuf::from("models/mushroom_classifier.bin")
        );
    }

    #[test]
    fn variables_override_defaults() {
        let config = ServerConfig::from_lookup(lookup(&[
            ("HOST", "0.0.0.0"),
            ("PORT", "8080"),
            ("MODEL_PATH", "/srv/model.bin"),
            ("PREDICTIONS_PATH", "/srv/predictions.csv"),
        ]))
        .unwrap();
        assert_eq!(config.socket_addr().unwrap().to_string(), "0.0.0.0:8080");
        assert_eq!(config.artifacts.model, PathBuf::from("/srv/model.bin"));
        assert_eq!(config.artifacts.encoders, PathBuf::from("models/encoders.bin"));
        assert_eq!(config.predictions_path, PathBuf::from("/srv/predictions.csv"));
    }

    #[test]
    fn bad_port_is_rejected() {
        let err = ServerConfig::from_lookup(lookup(&[("PORT", "five")])).unwrap_err();
        assert!(err.to_string().contains("PORT"));
    }
}
