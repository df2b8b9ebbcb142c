//! Plain-text sections of the dashboard.

use std::fmt::Write as _;

use myco_learning::MushroomPartition;

use crate::{
    client::{ClientError, PredictionReply},
    summary::{ColumnSummary, DatasetSummary},
};

/// Shown when the service rejects or fails a prediction.
pub const PREDICTION_ERROR: &str = "Error in prediction.";
/// Shown when the row lists cannot be fetched.
pub const LISTS_ERROR: &str = "Error in fetching mushroom lists.";
const NO_EXPLANATION: &str = "No explanation provided.";

/// Summary statistics, class distribution and highlighted feature counts.
#[must_use]
pub fn render_summary(summary: &DatasetSummary) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "== Summary Statistics ({} rows) ==", summary.rows);
    for column in &summary.columns {
        let _ = match column {
            ColumnSummary::Categorical {
                name,
                count,
                unique,
                top,
                freq,
            } => writeln!(
                out,
                "{name:<26} count={count} unique={unique} top={top} freq={freq}"
            ),
            ColumnSummary::Numeric {
                name,
                count,
                mean,
                min,
                max,
            } => writeln!(
                out,
                "{name:<26} count={count} mean={mean:.3} min={min} max={max}"
            ),
        };
    }
    let _ = writeln!(out, "\n== Class Distribution ({}) ==", summary.target);
    write_counts(&mut out, &summary.class_distribution);
    for (feature, counts) in &summary.feature_counts {
        let _ = writeln!(out, "\n== {feature} ==");
        write_counts(&mut out, counts);
    }
    out
}

fn write_counts(out: &mut String, counts: &[(String, usize)]) {
    for (value, count) in counts {
        let _ = writeln!(out, "{value:<12} {count}");
    }
}

/// Prediction headline and explanation, or the generic error line.
#[must_use]
pub fn render_prediction(result: &Result<PredictionReply, ClientError>) -> String {
    match result {
        Ok(reply) => format!(
            "The mushroom is {}.\n{}\n",
            reply.prediction,
            reply.explanation.as_deref().unwrap_or(NO_EXPLANATION)
        ),
        Err(_) => format!("{PREDICTION_ERROR}\n"),
    }
}

/// Counts, class shares and the row lists.
#[must_use]
pub fn render_mushrooms(result: &Result<MushroomPartition, ClientError>) -> String {
    let Ok(partition) = result else {
        return format!("{LISTS_ERROR}\n");
    };
    let poisonous = partition.poisonous_count();
    let edible = partition.edible_count();
    let mut out = String::new();
    let _ = writeln!(out, "== Mushroom Class Distribution ==");
    let _ = writeln!(out, "Poisonous {:>6.2}%", share(poisonous, poisonous + edible));
    let _ = writeln!(out, "Edible    {:>6.2}%", share(edible, poisonous + edible));
    let _ = writeln!(out, "\n== Count of Poisonous Mushrooms ==\nCount: {poisonous}");
    let _ = writeln!(out, "\n== Count of Edible Mushrooms ==\nCount: {edible}");
    let _ = writeln!(out, "\n== Poisonous Mushrooms (row numbers) ==");
    let _ = writeln!(out, "{}", join(&partition.poisonous));
    let _ = writeln!(out, "\n== Edible Mushrooms (row numbers) ==");
    let _ = writeln!(out, "{}", join(&partition.edible));
    out
}

#[allow(clippy::cast_precision_loss)]
fn share(part: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 * 100.0 / total as f64
    }
}

fn join(rows: &[usize]) -> String {
    rows.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
