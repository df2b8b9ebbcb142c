//! Seeded train/test partitioning.

use rand::{seq::SliceRandom, SeedableRng};
use rand_chacha::ChaCha8Rng;
use thiserror::Error;

/// Row indices assigned to each side of the split.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitIndices {
    /// Rows used for fitting.
    pub train: Vec<usize>,
    /// Held-out rows, in the order they appear in the predictions file.
    pub test: Vec<usize>,
}

/// Shuffles `0..rows` with a seeded generator and holds out `ceil(rows * test_ratio)` rows.
pub fn train_test_split(
    rows: usize,
    test_ratio: f64,
    seed: u64,
) -> Result<SplitIndices, SplitError> {
    if !(test_ratio > 0.0 && test_ratio < 1.0) {
        return Err(SplitError::InvalidRatio(test_ratio));
    }
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    let test_rows = (rows as f64 * test_ratio).ceil() as usize;
    if test_rows == 0 || test_rows >= rows {
        return Err(SplitError::TooFewRows { rows, test_ratio });
    }

    let mut order: Vec<usize> = (0..rows).collect();
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    order.shuffle(&mut rng);
    let train = order.split_off(test_rows);
    Ok(SplitIndices { train, test: order })
}

/// Copies the selected items in index order.
#[must_use]
pub fn select<T: Clone>(items: &[T], indices: &[usize]) -> Vec<T> {
    indices.iter().map(|&idx| items[idx].clone()).collect()
}

/// Invalid split requests.
#[derive(Debug, Error, PartialEq)]
pub enum SplitError {
    /// Ratio outside the open interval (0, 1).
    #[error("test ratio {0} must be between 0 and 1 (exclusive)")]
    InvalidRatio(f64),
    /// Not enough rows to populate both sides.
    #[error("{rows} rows cannot be split with test ratio {test_ratio}")]
    TooFewRows {
        /// Available rows.
        rows: usize,
        /// Requested ratio.
        test_ratio: f64,
    },
}
