//! Held-out evaluation: accuracy and a per-class precision/recall/F1 report.

use std::{collections::BTreeSet, fmt};

use serde::{Deserialize, Serialize};

/// Fraction of positions where `actual` and `predicted` agree.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn accuracy(actual: &[u32], predicted: &[u32]) -> f64 {
    if actual.is_empty() || actual.len() != predicted.len() {
        return 0.0;
    }
    let hits = actual
        .iter()
        .zip(predicted)
        .filter(|(truth, guess)| truth == guess)
        .count();
    hits as f64 / actual.len() as f64
}

/// Scores for one class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassMetrics {
    /// Decoded class name.
    pub label: String,
    /// Precision.
    pub precision: f64,
    /// Recall.
    pub recall: f64,
    /// Harmonic mean of precision and recall.
    pub f1: f64,
    /// Rows whose true class is this one.
    pub support: usize,
}

/// Averaged scores across classes.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct AverageMetrics {
    /// Precision.
    pub precision: f64,
    /// Recall.
    pub recall: f64,
    /// F1 score.
    pub f1: f64,
}

/// Classification report over every class seen in either label list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationReport {
    /// Per-class rows ordered by code.
    pub classes: Vec<ClassMetrics>,
    /// Overall accuracy.
    pub accuracy: f64,
    /// Unweighted mean across classes.
    pub macro_avg: AverageMetrics,
    /// Support-weighted mean across classes.
    pub weighted_avg: AverageMetrics,
    /// Number of evaluated rows.
    pub total: usize,
}

#[allow(clippy::cast_precision_loss)]
fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

impl ClassificationReport {
    /// Builds the report; `labels[code]` names each class, falling back to the code itself.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn compute(actual: &[u32], predicted: &[u32], labels: &[String]) -> Self {
        let codes: BTreeSet<u32> = actual.iter().chain(predicted).copied().collect();
        let pairs: Vec<(u32, u32)> = actual.iter().copied().zip(predicted.iter().copied()).collect();
        let classes: Vec<ClassMetrics> = codes
            .into_iter()
            .map(|code| {
                let true_positive = pairs.iter().filter(|(t, p)| *t == code && *p == code).count();
                let predicted_positive = pairs.iter().filter(|(_, p)| *p == code).count();
                let support = pairs.iter().filter(|(t, _)| *t == code).count();
                let precision = ratio(true_positive, predicted_positive);
                let recall = ratio(true_positive, support);
                let f1 = if precision + recall > 0.0 {
                    2.0 * precision * recall / (precision + recall)
                } else {
                    0.0
                };
                let label = usize::try_from(code)
                    .ok()
                    .and_then(|idx| labels.get(idx))
                    .cloned()
                    .unwrap_or_else(|| code.to_string());
                ClassMetrics {
                    label,
                    precision,
                    recall,
                    f1,
                    support,
                }
            })
            .collect();

        let count = classes.len().max(1) as f64;
        let macro_avg = AverageMetrics {
            precision: classes.iter().map(|c| c.precision).sum::<f64>() / count,
            recall: classes.iter().map(|c| c.recall).sum::<f64>() / count,
            f1: classes.iter().map(|c| c.f1).sum::<f64>() / count,
        };
        let total = pairs.len();
        let weight = total.max(1) as f64;
        let weighted_avg = AverageMetrics {
            precision: classes
                .iter()
                .map(|c| c.precision * c.support as f64)
                .sum::<f64>()
                / weight,
            recall: classes
                .iter()
                .map(|c| c.recall * c.support as f64)
                .sum::<f64>()
                / weight,
            f1: classes
                .iter()
                .map(|c| c.f1 * c.support as f64)
                .sum::<f64>()
                / weight,
        };
        Self {
            classes,
            accuracy: accuracy(actual, predicted),
            macro_avg,
            weighted_avg,
            total,
        }
    }
}

impl fmt::Display for ClassificationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = self
            .classes
            .iter()
            .map(|c| c.label.len())
            .chain(std::iter::once("weighted avg".len()))
            .max()
            .unwrap_or(12);
        writeln!(
            f,
            "{:>width$} {:>9} {:>9} {:>9} {:>9}",
            "", "precision", "recall", "f1-score", "support"
        )?;
        writeln!(f)?;
        for class in &self.classes {
            writeln!(
                f,
                "{:>width$} {:>9.2} {:>9.2} {:>9.2} {:>9}",
                class.label, class.precision, class.recall, class.f1, class.support
            )?;
        }
        writeln!(f)?;
        writeln!(
            f,
            "{:>width$} {:>9} {:>9} {:>9.2} {:>9}",
            "accuracy", "", "", self.accuracy, self.total
        )?;
        for (name, avg) in [("macro avg", self.macro_avg), ("weighted avg", self.weighted_avg)] {
            writeln!(
                f,
                "{:>width$} {:>9.2} {:>9.2} {:>9.2} {:>9}",
                name, avg.precision, avg.recall, avg.f1, self.total
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels() -> Vec<String> {
        vec!["e".into(), "p".into()]
    }

    #[test]
    fn accuracy_counts_matches() {
        assert!((accuracy(&[1, 0, 0, 1], &[1, 0, 1, 1]) - 0.75).abs() < 1e-12);
        assert!(accuracy(&[], &[]).abs() < f64::EPSILON);
    }

    #[test]
    fn report_scores_each_class() {
        let report = ClassificationReport::compute(&[1, 0, 0, 1], &[1, 0, 1, 1], &labels());
        assert_eq!(report.classes.len(), 2);
        let edible = &report.classes[0];
        assert_eq!(edible.label, "e");
        assert!((edible.precision - 1.0).abs() < 1e-12);
        assert!((edible.recall - 0.5).abs() < 1e-12);
        assert_eq!(edible.support, 2);
        let poisonous = &report.classes[1];
        assert!((poisonous.precision - 2.0 / 3.0).abs() < 1e-12);
        assert!((poisonous.recall - 1.0).abs() < 1e-12);
        assert!((poisonous.f1 - 0.8).abs() < 1e-12);
        assert!((report.accuracy - 0.75).abs() < 1e-12);
    }

    #[test]
    fn class_without_predictions_scores_zero() {
        let report = ClassificationReport::compute(&[0, 1], &[0, 0], &labels());
        let poisonous = &report.classes[1];
        assert!(poisonous.precision.abs() < f64::EPSILON);
        assert!(poisonous.f1.abs() < f64::EPSILON);
    }

    #[test]
    fn display_renders_table() {
        let report = ClassificationReport::compute(&[1, 0], &[1, 0], &labels());
        let text = report.to_string();
        assert!(text.contains("precision"));
        assert!(text.contains("accuracy"));
        assert!(text.contains("weighted avg"));
        assert!(text.lines().any(|line| line.trim_start().starts_with("p ")));
    }

    #[test]
    fn unknown_codes_fall_back_to_numbers() {
        let report = ClassificationReport::compute(&[3], &[3], &labels());
        assert_eq!(report.classes[0].label, "3");
    }
}
