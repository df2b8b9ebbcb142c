//! Tabular dataset loaded from CSV with per-column type inference.

use std::{
    fs::File,
    io::{self, Read},
    path::{Path, PathBuf},
};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Kind of values held by a column.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ColumnKind {
    /// String values that require label encoding.
    Categorical,
    /// Values that all parse as floating point numbers.
    Numeric,
}

/// Column storage.
#[derive(Debug, Clone, PartialEq)]
pub enum Column {
    /// Raw string values.
    Categorical(Vec<String>),
    /// Parsed numeric values.
    Numeric(Vec<f64>),
}

impl Column {
    /// Builds a column from raw cells, choosing numeric storage only when every cell parses.
    #[must_use]
    pub fn infer(cells: Vec<String>) -> Self {
        if cells.is_empty() {
            return Self::Categorical(cells);
        }
        let parsed: Option<Vec<f64>> = cells.iter().map(|cell| cell.parse().ok()).collect();
        parsed.map_or(Self::Categorical(cells), Self::Numeric)
    }

    /// Number of values in the column.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Categorical(values) => values.len(),
            Self::Numeric(values) => values.len(),
        }
    }

    /// Whether the column holds no values.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Column value kind.
    #[must_use]
    pub const fn kind(&self) -> ColumnKind {
        match self {
            Self::Categorical(_) => ColumnKind::Categorical,
            Self::Numeric(_) => ColumnKind::Numeric,
        }
    }
}

/// Immutable table of named columns plus the name of the target column.
#[derive(Debug, Clone)]
pub struct Dataset {
    columns: IndexMap<String, Column>,
    target: String,
    rows: usize,
}

impl Dataset {
    /// Loads a CSV file whose header contains `target`.
    pub fn from_csv(path: impl AsRef<Path>, target: &str) -> Result<Self, DatasetError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| DatasetError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_reader(file, target)
    }

    /// Parses CSV text from any reader.
    pub fn from_reader<R: Read>(reader: R, target: &str) -> Result<Self, DatasetError> {
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);
        let headers: Vec<String> = reader.headers()?.iter().map(str::to_owned).collect();
        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record?;
            rows.push(record.iter().map(str::to_owned).collect());
        }
        Self::from_rows(headers, rows, target)
    }

    /// Builds a dataset from a header and row-major string cells.
    pub fn from_rows(
        headers: Vec<String>,
        rows: Vec<Vec<String>>,
        target: &str,
    ) -> Result<Self, DatasetError> {
        if rows.is_empty() {
            return Err(DatasetError::Empty);
        }
        if !headers.iter().any(|name| name == target) {
            return Err(DatasetError::MissingTarget(target.to_owned()));
        }
        let mut cells: Vec<Vec<String>> = vec![Vec::with_capacity(rows.len()); headers.len()];
        for (line, row) in rows.into_iter().enumerate() {
            if row.len() != headers.len() {
                return Err(DatasetError::RaggedRow {
                    row: line,
                    expected: headers.len(),
                    found: row.len(),
                });
            }
            for (column, cell) in cells.iter_mut().zip(row) {
                column.push(cell);
            }
        }
        let rows = cells.first().map_or(0, Vec::len);
        let mut columns = IndexMap::with_capacity(headers.len());
        for (name, values) in headers.into_iter().zip(cells) {
            if columns.contains_key(&name) {
                return Err(DatasetError::DuplicateColumn(name));
            }
            columns.insert(name, Column::infer(values));
        }
        Ok(Self {
            columns,
            target: target.to_owned(),
            rows,
        })
    }

    /// Name of the target column.
    #[must_use]
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Number of rows.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.rows
    }

    /// Whether the dataset has no rows. Always false for a loaded dataset.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.rows == 0
    }

    /// Looks up a column by name.
    #[must_use]
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.get(name)
    }

    /// Iterates columns in file order.
    pub fn columns(&self) -> impl Iterator<Item = (&str, &Column)> {
        self.columns.iter().map(|(name, column)| (name.as_str(), column))
    }

    /// Names of all non-target columns in file order.
    #[must_use]
    pub fn feature_names(&self) -> Vec<&str> {
        self.columns
            .keys()
            .filter(|name| **name != self.target)
            .map(String::as_str)
            .collect()
    }
}

/// Errors raised while loading a dataset.
#[derive(Debug, Error)]
pub enum DatasetError {
    /// File could not be opened.
    #[error("reading dataset {path}: {source}")]
    Io {
        /// Path that failed.
        path: PathBuf,
        /// Underlying error.
        source: io::Error,
    },
    /// CSV syntax or record error.
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    /// No data rows after the header.
    #[error("dataset contains no rows")]
    Empty,
    /// Target column absent from the header.
    #[error("target column '{0}' not found in header")]
    MissingTarget(String),
    /// Header repeats a column name.
    #[error("duplicate column '{0}' in header")]
    DuplicateColumn(String),
    /// Row width differs from the header.
    #[error("row {row} has {found} fields, expected {expected}")]
    RaggedRow {
        /// Zero-based data row index.
        row: usize,
        /// Header width.
        expected: usize,
        /// Row width.
        found: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    const SAMPLE: &str = "class,odor,stalk-root,rings\np,f,?,1\ne,n,b,2\ne,a,c,1\n";

    #[test]
    fn infers_column_kinds() {
        let dataset = Dataset::from_reader(SAMPLE.as_bytes(), "class").unwrap();
        assert_eq!(dataset.len(), 3);
        assert_eq!(
            dataset.column("odor").unwrap().kind(),
            ColumnKind::Categorical
        );
        assert_eq!(
            dataset.column("stalk-root").unwrap().kind(),
            ColumnKind::Categorical
        );
        assert_eq!(
            dataset.column("rings").unwrap(),
            &Column::Numeric(vec![1.0, 2.0, 1.0])
        );
        assert_eq!(dataset.feature_names(), vec!["odor", "stalk-root", "rings"]);
    }

    #[test]
    fn missing_target_is_rejected() {
        let err = Dataset::from_reader(SAMPLE.as_bytes(), "label").unwrap_err();
        assert!(matches!(err, DatasetError::MissingTarget(name) if name == "label"));
    }

    #[test]
    fn header_only_file_is_empty() {
        let err = Dataset::from_reader("class,odor\n".as_bytes(), "class").unwrap_err();
        assert!(matches!(err, DatasetError::Empty));
    }

    #[test]
    fn ragged_rows_fail_to_parse() {
        let err = Dataset::from_reader("class,odor\np,f\ne\n".as_bytes(), "class").unwrap_err();
        assert!(matches!(err, DatasetError::Csv(_)));
    }

    #[test]
    fn missing_file_reports_path() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("absent.csv");
        let err = Dataset::from_csv(&path, "class").unwrap_err();
        assert!(err.to_string().contains("absent.csv"));
    }

    #[test]
    fn loads_from_disk() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("mushrooms.csv");
        fs::write(&path, SAMPLE).unwrap();
        let dataset = Dataset::from_csv(&path, "class").unwrap();
        assert_eq!(dataset.target(), "class");
        assert_eq!(dataset.columns().count(), 4);
    }
}
