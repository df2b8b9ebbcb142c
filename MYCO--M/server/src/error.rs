//! Handler errors rendered as `{"error": ...}` bodies.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use myco_learning::{PredictError, PredictionsError};
use serde_json::json;
use thiserror::Error;

/// Everything a handler can fail with.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Prediction rejected or failed.
    #[error(transparent)]
    Predict(#[from] PredictError),
    /// Predictions table missing or unreadable.
    #[error(transparent)]
    Predictions(#[from] PredictionsError),
}

impl ApiError {
    /// HTTP status for this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Predict(err) if err.is_client_error() => StatusCode::BAD_REQUEST,
            Self::Predict(_) | Self::Predictions(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::warn!(error = %self, "rejected request");
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
