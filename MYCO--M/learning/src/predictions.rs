//! Held-out predictions table and its partition into poisonous/edible row lists.

use std::{
    fs, io,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::inference::Verdict;

/// One held-out row: encoded true label and encoded prediction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PredictionRecord {
    /// Encoded true label.
    pub actual: u32,
    /// Encoded predicted label.
    pub predicted: u32,
}

/// Pairs up actual and predicted codes.
#[must_use]
pub fn records_from(actual: &[u32], predicted: &[u32]) -> Vec<PredictionRecord> {
    actual
        .iter()
        .zip(predicted)
        .map(|(&actual, &predicted)| PredictionRecord { actual, predicted })
        .collect()
}

/// Writes the table as CSV with an `actual,predicted` header, replacing any previous file.
pub fn write_predictions(
    path: impl AsRef<Path>,
    records: &[PredictionRecord],
) -> Result<(), PredictionsError> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|source| PredictionsError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    let mut writer = csv::Writer::from_path(path)?;
    for record in records {
        writer.serialize(record)?;
    }
    writer.flush().map_err(|source| PredictionsError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(())
}

/// Reads the whole table from disk.
pub fn read_predictions(path: impl AsRef<Path>) -> Result<Vec<PredictionRecord>, PredictionsError> {
    let path = path.as_ref();
    let file = fs::File::open(path).map_err(|source| PredictionsError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut reader = csv::Reader::from_reader(file);
    reader
        .deserialize()
        .collect::<Result<Vec<PredictionRecord>, _>>()
        .map_err(PredictionsError::from)
}

/// Row indices of the predictions table grouped by predicted class.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MushroomPartition {
    /// Rows predicted poisonous.
    #[serde(rename = "poisonous_mushrooms")]
    pub poisonous: Vec<usize>,
    /// Rows predicted edible.
    #[serde(rename = "edible_mushrooms")]
    pub edible: Vec<usize>,
}

impl MushroomPartition {
    /// Groups rows by predicted code; codes other than the two known ones land in neither list.
    #[must_use]
    pub fn from_records(records: &[PredictionRecord]) -> Self {
        let mut partition = Self::default();
        for (row, record) in records.iter().enumerate() {
            match Verdict::from_code(record.predicted) {
                Some(Verdict::Poisonous) => partition.poisonous.push(row),
                Some(Verdict::Edible) => partition.edible.push(row),
                None => {}
            }
        }
        partition
    }

    /// Reads the predictions file and partitions it.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, PredictionsError> {
        read_predictions(path).map(|records| Self::from_records(&records))
    }

    /// Number of rows predicted poisonous.
    #[must_use]
    pub fn poisonous_count(&self) -> usize {
        self.poisonous.len()
    }

    /// Number of rows predicted edible.
    #[must_use]
    pub fn edible_count(&self) -> usize {
        self.edible.len()
    }
}

/// Predictions table failures.
#[derive(Debug, Error)]
pub enum PredictionsError {
    /// Filesystem failure.
    #[error("predictions io at {path}: {source}")]
    Io {
        /// Affected path.
        path: PathBuf,
        /// Underlying error.
        source: io::Error,
    },
    /// CSV read or write failure.
    #[error("predictions csv error: {0}")]
    Csv(#[from] csv::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn partitions_the_documented_scenario() {
        let records = records_from(&[1, 0, 0], &[1, 0, 1]);
        let partition = MushroomPartition::from_records(&records);
        assert_eq!(partition.poisonous, vec![0, 2]);
        assert_eq!(partition.edible, vec![1]);
    }

    #[test]
    fn partition_covers_every_row_once() {
        let predicted: Vec<u32> = (0..50).map(|i| u32::from(i % 3 == 0)).collect();
        let records = records_from(&vec![0; 50], &predicted);
        let partition = MushroomPartition::from_records(&records);
        let mut all: Vec<usize> = partition
            .poisonous
            .iter()
            .chain(&partition.edible)
            .copied()
            .collect();
        all.sort_unstable();
        assert_eq!(all, (0..50).collect::<Vec<_>>());
        assert_eq!(partition.poisonous_count() + partition.edible_count(), 50);
    }

    #[test]
    fn file_round_trip_uses_documented_header() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data/predictions.csv");
        let records = records_from(&[1, 0, 0], &[1, 0, 1]);
        write_predictions(&path, &records).unwrap();

        let raw = fs::read_to_string(&path).unwrap();
        assert_eq!(raw.lines().next(), Some("actual,predicted"));
        assert_eq!(read_predictions(&path).unwrap(), records);

        write_predictions(&path, &records[..1]).unwrap();
        assert_eq!(read_predictions(&path).unwrap().len(), 1);
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = tempdir().unwrap();
        let err = MushroomPartition::load(dir.path().join("predictions.csv")).unwrap_err();
        assert!(matches!(err, PredictionsError::Io { .. }));
    }

    #[test]
    fn serializes_with_endpoint_keys() {
        let partition = MushroomPartition {
            poisonous: vec![0],
            edible: vec![1, 2],
        };
        let value = serde_json::to_value(&partition).unwrap();
        assert_eq!(value["poisonous_mushrooms"], serde_json::json!([0]));
        assert_eq!(value["edible_mushrooms"], serde_json::json!([1, 2]));
    }
}
