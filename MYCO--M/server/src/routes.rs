//! Route handlers.

use std::{io, sync::Arc};

use axum::{body::Bytes, extract::State, Json};
use myco_learning::{MushroomPartition, PredictError, Prediction, PredictionsError};
use serde_json::Value;

use crate::{error::ApiError, AppState};

/// Liveness text.
pub const LIVENESS: &str = "Mushroom Classification API is running.";

/// `GET /`
pub async fn index() -> &'static str {
    LIVENESS
}

/// `POST /predict`
///
/// The raw body is parsed here rather than through the `Json` extractor so
/// that malformed JSON and non-object bodies share one error response.
pub async fn predict(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<Prediction>, ApiError> {
    let value: Value =
        serde_json::from_slice(&body).map_err(|_| PredictError::InvalidFormat)?;
    let prediction = state.predictor.predict_value(&value)?;
    tracing::debug!(prediction = prediction.prediction.label(), "classified request");
    Ok(Json(prediction))
}

/// `GET /get_mushrooms`
///
/// Re-reads the predictions table on every call.
pub async fn get_mushrooms(
    State(state): State<AppState>,
) -> Result<Json<MushroomPartition>, ApiError> {
    let path = Arc::clone(&state.predictions_path);
    let partition = tokio::task::spawn_blocking(move || MushroomPartition::load(path.as_path()))
        .await
        .map_err(|join| PredictionsError::Io {
            path: state.predictions_path.to_path_buf(),
            source: io::Error::other(join),
        })??;
    Ok(Json(partition))
}
