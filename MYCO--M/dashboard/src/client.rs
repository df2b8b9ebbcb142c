//! HTTP client for the prediction service.

use myco_learning::MushroomPartition;
use reqwest::{header::CONTENT_TYPE, Client, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

/// Default service address.
pub const DEFAULT_API: &str = "http://127.0.0.1:5000";

/// Prediction as returned by the service.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PredictionReply {
    /// Class label.
    pub prediction: String,
    /// Explanation text, if the service sent one.
    #[serde(default)]
    pub explanation: Option<String>,
}

/// Client failures.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Transport or decoding failure.
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// Service answered with a non-success status.
    #[error("service returned {status}: {message}")]
    Api {
        /// Response status.
        status: StatusCode,
        /// `error` field of the body, or the raw body.
        message: String,
    },
}

/// Thin wrapper over `reqwest` bound to one base URL.
#[derive(Debug, Clone)]
pub struct DashboardClient {
    client: Client,
    base: String,
}

impl DashboardClient {
    /// Builds a client for `base` (e.g. `http://127.0.0.1:5000`).
    pub fn new(base: impl Into<String>) -> Result<Self, ClientError> {
        let client = Client::builder().build()?;
        Ok(Self {
            client,
            base: base.into().trim_end_matches('/').to_owned(),
        })
    }

    /// Base URL without a trailing slash.
    #[must_use]
    pub fn base(&self) -> &str {
        &self.base
    }

    /// Posts `raw_json` verbatim to `/predict`.
    pub async fn predict(&self, raw_json: &str) -> Result<PredictionReply, ClientError> {
        let response = self
            .client
            .post(format!("{}/predict", self.base))
            .header(CONTENT_TYPE, "application/json")
            .body(raw_json.to_owned())
            .send()
            .await?;
        Self::decode(response).await
    }

    /// Fetches the poisonous/edible row lists.
    pub async fn mushrooms(&self) -> Result<MushroomPartition, ClientError> {
        let response = self
            .client
            .get(format!("{}/get_mushrooms", self.base))
            .send()
            .await?;
        Self::decode(response).await
    }

    async fn decode<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ClientError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response.json().await?);
        }
        let text = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<Value>(&text)
            .ok()
            .and_then(|body| body.get("error").and_then(Value::as_str).map(str::to_owned))
            .unwrap_or(text);
        Err(ClientError::Api { status, message })
    }
}
