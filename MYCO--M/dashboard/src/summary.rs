//! Descriptive statistics over the raw training dataset.

use indexmap::IndexMap;
use myco_learning::{Column, Dataset};
use serde::Serialize;

/// Features whose value counts the dashboard always shows.
pub const HIGHLIGHTED_FEATURES: [&str; 5] =
    ["cap-shape", "cap-surface", "cap-color", "bruises", "odor"];

/// Value counts, most frequent first; ties keep first-seen order.
pub type ValueCounts = Vec<(String, usize)>;

/// Per-column statistics in the spirit of a `describe` table.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ColumnSummary {
    /// String column.
    Categorical {
        /// Column name.
        name: String,
        /// Non-empty values.
        count: usize,
        /// Distinct values.
        unique: usize,
        /// Most frequent value.
        top: String,
        /// Frequency of `top`.
        freq: usize,
    },
    /// Numeric column.
    Numeric {
        /// Column name.
        name: String,
        /// Number of values.
        count: usize,
        /// Arithmetic mean.
        mean: f64,
        /// Smallest value.
        min: f64,
        /// Largest value.
        max: f64,
    },
}

impl ColumnSummary {
    /// Column name.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Categorical { name, .. } | Self::Numeric { name, .. } => name,
        }
    }
}

/// Everything the statistics section shows.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatasetSummary {
    /// Row count.
    pub rows: usize,
    /// Target column name.
    pub target: String,
    /// Value counts of the target.
    pub class_distribution: ValueCounts,
    /// One entry per column, file order.
    pub columns: Vec<ColumnSummary>,
    /// Value counts for the highlighted features present in the data.
    pub feature_counts: IndexMap<String, ValueCounts>,
}

impl DatasetSummary {
    /// Computes the summary in one pass per column.
    #[must_use]
    pub fn from_dataset(dataset: &Dataset) -> Self {
        let class_distribution = dataset
            .column(dataset.target())
            .map(column_counts)
            .unwrap_or_default();
        let columns = dataset
            .columns()
            .map(|(name, column)| summarize(name, column))
            .collect();
        let feature_counts = HIGHLIGHTED_FEATURES
            .iter()
            .filter_map(|feature| {
                dataset
                    .column(feature)
                    .map(|column| ((*feature).to_owned(), column_counts(column)))
            })
            .collect();
        Self {
            rows: dataset.len(),
            target: dataset.target().to_owned(),
            class_distribution,
            columns,
            feature_counts,
        }
    }
}

/// Counts each distinct value.
#[must_use]
pub fn value_counts<'a>(values: impl IntoIterator<Item = &'a str>) -> ValueCounts {
    let mut counts: IndexMap<&str, usize> = IndexMap::new();
    for value in values {
        *counts.entry(value).or_default() += 1;
    }
    let mut counts: ValueCounts = counts
        .into_iter()
        .map(|(value, count)| (value.to_owned(), count))
        .collect();
    counts.sort_by(|a, b| b.1.cmp(&a.1));
    counts
}

fn column_counts(column: &Column) -> ValueCounts {
    match column {
        Column::Categorical(values) => value_counts(values.iter().map(String::as_str)),
        Column::Numeric(values) => {
            let text: Vec<String> = values.iter().map(ToString::to_string).collect();
            value_counts(text.iter().map(String::as_str))
        }
    }
}

#[allow(clippy::cast_precision_loss)]
fn summarize(name: &str, column: &Column) -> ColumnSummary {
    match column {
        Column::Categorical(values) => {
            let counts = value_counts(values.iter().map(String::as_str));
            let (top, freq) = counts.first().cloned().unwrap_or_default();
            ColumnSummary::Categorical {
                name: name.to_owned(),
                count: values.len(),
                unique: counts.len(),
                top,
                freq,
            }
        }
        Column::Numeric(values) => {
            let count = values.len();
            let mean = if count == 0 {
                0.0
            } else {
                values.iter().sum::<f64>() / count as f64
            };
            ColumnSummary::Numeric {
                name: name.to_owned(),
                count,
                mean,
                min: values.iter().copied().fold(f64::INFINITY, f64::min),
                max: values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "class,cap-shape,odor,rings\n\
        p,x,f,1\n\
        e,x,n,2\n\
        e,b,n,1\n\
        p,x,f,4\n\
        e,f,a,2\n";

    fn summary() -> DatasetSummary {
        DatasetSummary::from_dataset(&Dataset::from_reader(SAMPLE.as_bytes(), "class").unwrap())
    }

    #[test]
    fn class_distribution_counts_target_values() {
        let summary = summary();
        assert_eq!(summary.rows, 5);
        assert_eq!(
            summary.class_distribution,
            vec![("e".to_owned(), 3), ("p".to_owned(), 2)]
        );
    }

    #[test]
    fn describes_categorical_and_numeric_columns() {
        let summary = summary();
        assert_eq!(
            summary.columns[1],
            ColumnSummary::Categorical {
                name: "cap-shape".into(),
                count: 5,
                unique: 3,
                top: "x".into(),
                freq: 3,
            }
        );
        let ColumnSummary::Numeric { mean, min, max, .. } = summary.columns[3] else {
            panic!("rings should be numeric");
        };
        assert!((mean - 2.0).abs() < 1e-12);
        assert!((min - 1.0).abs() < f64::EPSILON);
        assert!((max - 4.0).abs() < f64::EPSILON);
    }

    #[test]
    fn highlights_only_present_features() {
        let summary = summary();
        let names: Vec<&str> = summary.feature_counts.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["cap-shape", "odor"]);
        assert_eq!(
            summary.feature_counts["odor"],
            vec![("f".to_owned(), 2), ("n".to_owned(), 2), ("a".to_owned(), 1)]
        );
    }
}
