#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    missing_docs,
    rust_2018_idioms
)]

//! Terminal dashboard for the mushroom classifier: dataset statistics,
//! an ad-hoc prediction and the held-out poisonous/edible lists.

/// Prediction service client.
pub mod client;

/// Text rendering.
pub mod render;

/// Dataset statistics.
pub mod summary;

pub use client::{ClientError, DashboardClient, PredictionReply, DEFAULT_API};
pub use render::{render_mushrooms, render_prediction, render_summary};
pub use summary::{value_counts, ColumnSummary, DatasetSummary, ValueCounts};
