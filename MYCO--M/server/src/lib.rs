#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    missing_docs,
    rust_2018_idioms
)]

//! Mushroom classification HTTP service: a predictor built once at startup
//! and shared read-only across requests, plus the held-out prediction lists.

use std::{path::PathBuf, sync::Arc};

use axum::{
    routing::{get, post},
    Router,
};
use myco_learning::{ModelBundle, Predictor};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

/// Environment configuration.
pub mod config;

/// Error responses.
pub mod error;

/// Route handlers.
pub mod routes;

pub use config::ServerConfig;
pub use error::ApiError;

/// State shared by every handler.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Predictor over the loaded bundle.
    pub predictor: Predictor,
    /// Predictions table served by the list endpoint.
    pub predictions_path: Arc<PathBuf>,
}

impl AppState {
    /// Wraps a loaded bundle.
    #[must_use]
    pub fn new(bundle: ModelBundle, predictions_path: impl Into<PathBuf>) -> Self {
        Self {
            predictor: Predictor::new(Arc::new(bundle)),
            predictions_path: Arc::new(predictions_path.into()),
        }
    }
}

/// Routes without middleware.
#[must_use]
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(routes::index))
        .route("/predict", post(routes::predict))
        .route("/get_mushrooms", get(routes::get_mushrooms))
        .with_state(state)
}

/// Routes wrapped in request tracing and permissive CORS.
#[must_use]
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);
    router(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
