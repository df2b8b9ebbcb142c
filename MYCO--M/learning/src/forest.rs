//! Random forest classifier built from bagged CART trees.

use rand::{seq::SliceRandom, Rng, RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// How many features a node considers when searching for a split.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaxFeatures {
    /// Square root of the feature count.
    Sqrt,
    /// Base-2 logarithm of the feature count.
    Log2,
    /// Every feature.
    All,
    /// Fixed number of features.
    Count(usize),
}

impl MaxFeatures {
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    fn resolve(self, n_features: usize) -> usize {
        let k = match self {
            Self::Sqrt => (n_features as f64).sqrt() as usize,
            Self::Log2 => (n_features as f64).log2() as usize,
            Self::All => n_features,
            Self::Count(count) => count,
        };
        k.clamp(1, n_features.max(1))
    }
}

/// Forest hyper-parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForestParams {
    /// Number of trees.
    pub n_trees: usize,
    /// Depth limit; `None` grows until leaves are pure.
    pub max_depth: Option<usize>,
    /// Minimum samples a node needs before it may split.
    pub min_samples_split: usize,
    /// Per-node feature sampling.
    pub max_features: MaxFeatures,
    /// Whether each tree is fitted on a bootstrap resample.
    pub bootstrap: bool,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_trees: 100,
            max_depth: None,
            min_samples_split: 2,
            max_features: MaxFeatures::Sqrt,
            bootstrap: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
enum Node {
    Leaf {
        distribution: Vec<f64>,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

/// Single CART tree using Gini impurity; nodes live in a flat arena.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTree {
    nodes: Vec<Node>,
}

struct TreeBuilder<'a> {
    features: &'a [Vec<f64>],
    labels: &'a [u32],
    n_classes: usize,
    max_features: usize,
    max_depth: Option<usize>,
    min_samples_split: usize,
    nodes: Vec<Node>,
}

struct BestSplit {
    feature: usize,
    threshold: f64,
    impurity: f64,
}

impl TreeBuilder<'_> {
    fn counts(&self, samples: &[usize]) -> Vec<usize> {
        let mut counts = vec![0; self.n_classes];
        for &idx in samples {
            counts[self.labels[idx] as usize] += 1;
        }
        counts
    }

    #[allow(clippy::cast_precision_loss)]
    fn leaf(&mut self, counts: &[usize], total: usize) -> usize {
        let distribution = counts
            .iter()
            .map(|&count| count as f64 / total as f64)
            .collect();
        self.nodes.push(Node::Leaf { distribution });
        self.nodes.len() - 1
    }

    fn grow(&mut self, samples: &[usize], depth: usize, rng: &mut ChaCha8Rng) -> usize {
        let counts = self.counts(samples);
        let pure = counts.iter().filter(|&&count| count > 0).count() <= 1;
        let depth_reached = self.max_depth.is_some_and(|limit| depth >= limit);
        if pure || depth_reached || samples.len() < self.min_samples_split {
            return self.leaf(&counts, samples.len());
        }
        let Some(best) = self.best_split(samples, &counts, rng) else {
            return self.leaf(&counts, samples.len());
        };

        let (left, right): (Vec<usize>, Vec<usize>) = samples
            .iter()
            .partition(|&&idx| self.features[idx][best.feature] <= best.threshold);
        if left.is_empty() || right.is_empty() {
            return self.leaf(&counts, samples.len());
        }
        let slot = self.nodes.len();
        self.nodes.push(Node::Leaf {
            distribution: Vec::new(),
        });
        let left = self.grow(&left, depth + 1, rng);
        let right = self.grow(&right, depth + 1, rng);
        self.nodes[slot] = Node::Split {
            feature: best.feature,
            threshold: best.threshold,
            left,
            right,
        };
        slot
    }

    /// Visits features in random order until `max_features` non-constant ones were scored.
    fn best_split(
        &self,
        samples: &[usize],
        counts: &[usize],
        rng: &mut ChaCha8Rng,
    ) -> Option<BestSplit> {
        let n_features = self.features[samples[0]].len();
        let mut order: Vec<usize> = (0..n_features).collect();
        order.shuffle(rng);

        let mut best: Option<BestSplit> = None;
        let mut scored = 0;
        let mut sorted = samples.to_vec();
        for feature in order {
            if scored >= self.max_features {
                break;
            }
            sorted.sort_by(|&a, &b| self.features[a][feature].total_cmp(&self.features[b][feature]));
            let first = self.features[sorted[0]][feature];
            let last = self.features[sorted[sorted.len() - 1]][feature];
            if first.total_cmp(&last).is_eq() {
                continue;
            }
            scored += 1;
            if let Some(candidate) = self.scan_feature(feature, &sorted, counts) {
                if best
                    .as_ref()
                    .map_or(true, |current| candidate.impurity < current.impurity)
                {
                    best = Some(candidate);
                }
            }
        }
        best
    }

    /// Sweeps thresholds between consecutive distinct values of a sorted column.
    #[allow(clippy::cast_precision_loss)]
    fn scan_feature(&self, feature: usize, sorted: &[usize], counts: &[usize]) -> Option<BestSplit> {
        let total = sorted.len();
        let mut left_counts = vec![0usize; self.n_classes];
        let mut best: Option<BestSplit> = None;
        for position in 1..total {
            let previous = sorted[position - 1];
            left_counts[self.labels[previous] as usize] += 1;
            let lower = self.features[previous][feature];
            let upper = self.features[sorted[position]][feature];
            if lower.total_cmp(&upper).is_eq() {
                continue;
            }
            let right_counts: Vec<usize> = counts
                .iter()
                .zip(&left_counts)
                .map(|(all, left)| all - left)
                .collect();
            let impurity = (position as f64 * gini(&left_counts, position)
                + (total - position) as f64 * gini(&right_counts, total - position))
                / total as f64;
            if best
                .as_ref()
                .map_or(true, |current| impurity < current.impurity)
            {
                best = Some(BestSplit {
                    feature,
                    threshold: midpoint(lower, upper),
                    impurity,
                });
            }
        }
        best
    }
}

/// Threshold strictly below `upper`; adjacent doubles round their midpoint up.
fn midpoint(lower: f64, upper: f64) -> f64 {
    let mid = lower + (upper - lower) / 2.0;
    if mid >= upper {
        lower
    } else {
        mid
    }
}

#[allow(clippy::cast_precision_loss)]
fn gini(counts: &[usize], total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let total = total as f64;
    1.0 - counts
        .iter()
        .map(|&count| {
            let p = count as f64 / total;
            p * p
        })
        .sum::<f64>()
}

impl DecisionTree {
    fn distribution(&self, row: &[f64]) -> &[f64] {
        let mut cursor = 0;
        loop {
            match &self.nodes[cursor] {
                Node::Leaf { distribution } => return distribution,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    cursor = if row[*feature] <= *threshold {
                        *left
                    } else {
                        *right
                    };
                }
            }
        }
    }

    /// Number of nodes in the tree.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Checks the arena so that `distribution` can neither panic nor loop.
    fn check(&self, n_features: usize, n_classes: usize) -> Result<(), String> {
        if self.nodes.is_empty() {
            return Err("tree has no nodes".to_owned());
        }
        for (index, node) in self.nodes.iter().enumerate() {
            match node {
                Node::Leaf { distribution } => {
                    if distribution.len() != n_classes {
                        return Err(format!(
                            "leaf {index} has {} class weights, expected {n_classes}",
                            distribution.len()
                        ));
                    }
                }
                Node::Split {
                    feature,
                    left,
                    right,
                    ..
                } => {
                    if *feature >= n_features {
                        return Err(format!(
                            "node {index} splits on feature {feature} of {n_features}"
                        ));
                    }
                    // Children are stored after their parent.
                    for child in [*left, *right] {
                        if child <= index || child >= self.nodes.len() {
                            return Err(format!("node {index} points at node {child}"));
                        }
                    }
                }
            }
        }
        Ok(())
    }
}

/// Bagged ensemble of decision trees voting by averaged class probabilities.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForestClassifier {
    trees: Vec<DecisionTree>,
    n_features: usize,
    n_classes: usize,
}

impl RandomForestClassifier {
    /// Fits a forest; the same `seed` and inputs always yield the same forest.
    pub fn fit(
        params: &ForestParams,
        seed: u64,
        features: &[Vec<f64>],
        labels: &[u32],
    ) -> Result<Self, ForestError> {
        if params.n_trees == 0 {
            return Err(ForestError::NoTrees);
        }
        if features.is_empty() {
            return Err(ForestError::EmptyTrainingSet);
        }
        if features.len() != labels.len() {
            return Err(ForestError::LabelCountMismatch {
                rows: features.len(),
                labels: labels.len(),
            });
        }
        let n_features = features[0].len();
        if let Some(row) = features.iter().position(|row| row.len() != n_features) {
            return Err(ForestError::FeatureMismatch {
                expected: n_features,
                found: features[row].len(),
            });
        }
        let n_classes = labels.iter().max().map_or(0, |&max| max as usize + 1);

        let mut master = ChaCha8Rng::seed_from_u64(seed);
        let mut trees = Vec::with_capacity(params.n_trees);
        for _ in 0..params.n_trees {
            let mut rng = ChaCha8Rng::seed_from_u64(master.next_u64());
            let samples: Vec<usize> = if params.bootstrap {
                (0..features.len())
                    .map(|_| rng.gen_range(0..features.len()))
                    .collect()
            } else {
                (0..features.len()).collect()
            };
            let mut builder = TreeBuilder {
                features,
                labels,
                n_classes,
                max_features: params.max_features.resolve(n_features),
                max_depth: params.max_depth,
                min_samples_split: params.min_samples_split.max(2),
                nodes: Vec::new(),
            };
            builder.grow(&samples, 0, &mut rng);
            trees.push(DecisionTree {
                nodes: builder.nodes,
            });
        }
        Ok(Self {
            trees,
            n_features,
            n_classes,
        })
    }

    /// Width of the feature vectors the forest was fitted on.
    #[must_use]
    pub const fn n_features(&self) -> usize {
        self.n_features
    }

    /// Number of target classes.
    #[must_use]
    pub const fn n_classes(&self) -> usize {
        self.n_classes
    }

    /// Fitted trees.
    #[must_use]
    pub fn trees(&self) -> &[DecisionTree] {
        &self.trees
    }

    /// Structural check for forests that did not come from `fit`, e.g. decoded artifacts.
    pub fn validate(&self) -> Result<(), ForestError> {
        if self.trees.is_empty() {
            return Err(ForestError::NoTrees);
        }
        if self.n_classes == 0 {
            return Err(ForestError::CorruptTree {
                tree: 0,
                reason: "forest has no classes".to_owned(),
            });
        }
        for (tree, nodes) in self.trees.iter().enumerate() {
            nodes
                .check(self.n_features, self.n_classes)
                .map_err(|reason| ForestError::CorruptTree { tree, reason })?;
        }
        Ok(())
    }

    /// Class probabilities averaged across trees.
    #[allow(clippy::cast_precision_loss)]
    pub fn predict_proba(&self, row: &[f64]) -> Result<Vec<f64>, ForestError> {
        if row.len() != self.n_features {
            return Err(ForestError::FeatureMismatch {
                expected: self.n_features,
                found: row.len(),
            });
        }
        let mut totals = vec![0.0; self.n_classes];
        for tree in &self.trees {
            for (total, p) in totals.iter_mut().zip(tree.distribution(row)) {
                *total += p;
            }
        }
        let trees = self.trees.len() as f64;
        for total in &mut totals {
            *total /= trees;
        }
        Ok(totals)
    }

    /// Most probable class; the lowest code wins ties.
    #[allow(clippy::cast_possible_truncation)]
    pub fn predict_one(&self, row: &[f64]) -> Result<u32, ForestError> {
        let proba = self.predict_proba(row)?;
        let mut best = 0;
        for (class, p) in proba.iter().enumerate() {
            if *p > proba[best] {
                best = class;
            }
        }
        Ok(best as u32)
    }

    /// Predicts every row.
    pub fn predict(&self, rows: &[Vec<f64>]) -> Result<Vec<u32>, ForestError> {
        rows.iter().map(|row| self.predict_one(row)).collect()
    }
}

/// Fitting and prediction failures.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ForestError {
    /// Forest configured with zero trees.
    #[error("forest needs at least one tree")]
    NoTrees,
    /// No rows to fit on.
    #[error("training set is empty")]
    EmptyTrainingSet,
    /// Rows and labels differ in length.
    #[error("{rows} feature rows but {labels} labels")]
    LabelCountMismatch {
        /// Feature rows.
        rows: usize,
        /// Labels.
        labels: usize,
    },
    /// Feature vector width differs from the fitted width.
    #[error("expected {expected} features, found {found}")]
    FeatureMismatch {
        /// Fitted width.
        expected: usize,
        /// Supplied width.
        found: usize,
    },
    /// Tree arena that prediction cannot walk safely.
    #[error("tree {tree} is corrupt: {reason}")]
    CorruptTree {
        /// Index of the tree in the forest.
        tree: usize,
        /// What failed the check.
        reason: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Class is 1 exactly when feature 0 equals 2; feature 1 is noise.
    fn toy() -> (Vec<Vec<f64>>, Vec<u32>) {
        let mut features = Vec::new();
        let mut labels = Vec::new();
        for i in 0..60u32 {
            let key = f64::from(i % 3);
            let noise = f64::from((i * 7) % 5);
            features.push(vec![key, noise]);
            labels.push(u32::from(i % 3 == 2));
        }
        (features, labels)
    }

    #[test]
    fn learns_a_separable_rule() {
        let (features, labels) = toy();
        let params = ForestParams {
            n_trees: 15,
            bootstrap: false,
            ..ForestParams::default()
        };
        let forest = RandomForestClassifier::fit(&params, 42, &features, &labels).unwrap();
        let predictions = forest.predict(&features).unwrap();
        assert_eq!(predictions, labels);
        assert_eq!(forest.predict_one(&[2.0, 0.0]).unwrap(), 1);
        assert_eq!(forest.n_classes(), 2);
        assert_eq!(forest.trees().len(), 15);
    }

    #[test]
    fn fitting_is_deterministic_for_a_seed() {
        let (features, labels) = toy();
        let params = ForestParams {
            n_trees: 5,
            ..ForestParams::default()
        };
        let a = RandomForestClassifier::fit(&params, 9, &features, &labels).unwrap();
        let b = RandomForestClassifier::fit(&params, 9, &features, &labels).unwrap();
        for row in &features {
            assert_eq!(a.predict_proba(row).unwrap(), b.predict_proba(row).unwrap());
        }
    }

    #[test]
    fn probabilities_sum_to_one() {
        let (features, labels) = toy();
        let forest =
            RandomForestClassifier::fit(&ForestParams::default(), 1, &features, &labels).unwrap();
        let proba = forest.predict_proba(&[1.0, 3.0]).unwrap();
        assert!((proba.iter().sum::<f64>() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn depth_limit_yields_stumps() {
        let (features, labels) = toy();
        let params = ForestParams {
            n_trees: 3,
            max_depth: Some(1),
            bootstrap: false,
            max_features: MaxFeatures::All,
            ..ForestParams::default()
        };
        let forest = RandomForestClassifier::fit(&params, 3, &features, &labels).unwrap();
        assert!(forest.trees().iter().all(|tree| tree.node_count() <= 3));
    }

    #[test]
    fn constant_features_produce_a_single_leaf() {
        let features = vec![vec![1.0]; 4];
        let labels = vec![0, 1, 0, 1];
        let params = ForestParams {
            n_trees: 1,
            bootstrap: false,
            ..ForestParams::default()
        };
        let forest = RandomForestClassifier::fit(&params, 0, &features, &labels).unwrap();
        assert_eq!(forest.trees()[0].node_count(), 1);
        assert_eq!(forest.predict_one(&[1.0]).unwrap(), 0);
    }

    #[test]
    fn rejects_bad_shapes() {
        let params = ForestParams::default();
        assert_eq!(
            RandomForestClassifier::fit(&params, 0, &[], &[]).unwrap_err(),
            ForestError::EmptyTrainingSet
        );
        assert_eq!(
            RandomForestClassifier::fit(&params, 0, &[vec![1.0]], &[0, 1]).unwrap_err(),
            ForestError::LabelCountMismatch { rows: 1, labels: 2 }
        );
        let (features, labels) = toy();
        let forest = RandomForestClassifier::fit(&params, 0, &features, &labels).unwrap();
        assert_eq!(
            forest.predict_one(&[1.0]).unwrap_err(),
            ForestError::FeatureMismatch {
                expected: 2,
                found: 1
            }
        );
    }

    #[test]
    fn max_features_resolution() {
        assert_eq!(MaxFeatures::Sqrt.resolve(22), 4);
        assert_eq!(MaxFeatures::Log2.resolve(22), 4);
        assert_eq!(MaxFeatures::Count(50).resolve(22), 22);
        assert_eq!(MaxFeatures::All.resolve(1), 1);
    }

    #[test]
    fn adjacent_doubles_split_without_recursing_forever() {
        let lower = 0.1_f64;
        let upper = f64::from_bits(lower.to_bits() + 1);
        assert!(midpoint(lower, upper) < upper);
        assert!(midpoint(lower, upper) >= lower);

        let features = vec![vec![lower], vec![upper], vec![lower], vec![upper]];
        let labels = vec![0, 1, 0, 1];
        let params = ForestParams {
            n_trees: 1,
            bootstrap: false,
            ..ForestParams::default()
        };
        let forest = RandomForestClassifier::fit(&params, 0, &features, &labels).unwrap();
        assert_eq!(forest.trees()[0].node_count(), 3);
        assert_eq!(forest.predict(&features).unwrap(), labels);
    }

    #[test]
    fn fitted_forest_passes_validation() {
        let (features, labels) = toy();
        let forest =
            RandomForestClassifier::fit(&ForestParams::default(), 5, &features, &labels).unwrap();
        assert_eq!(forest.validate(), Ok(()));
    }

    #[test]
    fn validation_catches_broken_arenas() {
        let (features, labels) = toy();
        let params = ForestParams {
            n_trees: 2,
            bootstrap: false,
            ..ForestParams::default()
        };
        let fitted = RandomForestClassifier::fit(&params, 5, &features, &labels).unwrap();
        let corrupt = |edit: &dyn Fn(&mut Vec<Node>)| {
            let mut forest = fitted.clone();
            edit(&mut forest.trees[1].nodes);
            forest.validate().unwrap_err()
        };

        let err = corrupt(&|nodes| nodes.clear());
        assert!(matches!(err, ForestError::CorruptTree { tree: 1, .. }));

        let err = corrupt(&|nodes| {
            if let Node::Split { feature, .. } = &mut nodes[0] {
                *feature = 7;
            }
        });
        assert!(matches!(err, ForestError::CorruptTree { tree: 1, .. }));

        let err = corrupt(&|nodes| {
            let len = nodes.len();
            if let Node::Split { right, .. } = &mut nodes[0] {
                *right = len;
            }
        });
        assert!(matches!(err, ForestError::CorruptTree { tree: 1, .. }));

        // A self-loop would never reach a leaf.
        let err = corrupt(&|nodes| {
            if let Node::Split { left, .. } = &mut nodes[0] {
                *left = 0;
            }
        });
        assert!(matches!(err, ForestError::CorruptTree { tree: 1, .. }));

        let err = corrupt(&|nodes| {
            for node in nodes.iter_mut() {
                if let Node::Leaf { distribution } = node {
                    distribution.pop();
                }
            }
        });
        assert!(matches!(err, ForestError::CorruptTree { tree: 1, .. }));

        let mut empty = fitted.clone();
        empty.trees.clear();
        assert_eq!(empty.validate(), Err(ForestError::NoTrees));
    }
}
