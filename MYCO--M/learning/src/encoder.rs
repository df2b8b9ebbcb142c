//! Label encoders for categorical columns and the encoded feature matrix.

use std::collections::BTreeSet;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::dataset::{Column, ColumnKind, Dataset};

/// Bijection between the distinct values of a column and `0..n` codes.
///
/// Classes are kept in lexicographic order, so the code of a value is its
/// position in the sorted class list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelEncoder {
    classes: Vec<String>,
}

impl LabelEncoder {
    /// Fits an encoder over every observed value.
    pub fn fit<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let distinct: BTreeSet<String> = values
            .into_iter()
            .map(|value| value.as_ref().to_owned())
            .collect();
        Self {
            classes: distinct.into_iter().collect(),
        }
    }

    /// Sorted class values.
    #[must_use]
    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    /// Number of classes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.classes.len()
    }

    /// Whether the encoder was fitted on nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// Code for `value`, or `None` when it was not seen during fitting.
    #[must_use]
    pub fn transform(&self, value: &str) -> Option<u32> {
        self.classes
            .binary_search_by(|class| class.as_str().cmp(value))
            .ok()
            .and_then(|idx| u32::try_from(idx).ok())
    }

    /// Codes for a batch; `None` if any value is unseen.
    pub fn transform_many<I, S>(&self, values: I) -> Option<Vec<u32>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        values
            .into_iter()
            .map(|value| self.transform(value.as_ref()))
            .collect()
    }

    /// Whether classes are strictly ascending, which `transform` relies on.
    #[must_use]
    pub fn is_sorted(&self) -> bool {
        self.classes.windows(2).all(|pair| pair[0] < pair[1])
    }

    /// Value for `code`, or `None` when out of range.
    #[must_use]
    pub fn inverse_transform(&self, code: u32) -> Option<&str> {
        usize::try_from(code)
            .ok()
            .and_then(|idx| self.classes.get(idx))
            .map(String::as_str)
    }
}

/// One input column of the classifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureSpec {
    /// Column name.
    pub name: String,
    /// Value kind.
    pub kind: ColumnKind,
}

/// Ordered list of classifier inputs (every non-target column).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureSchema {
    features: Vec<FeatureSpec>,
}

impl FeatureSchema {
    /// Features in vector order.
    #[must_use]
    pub fn features(&self) -> &[FeatureSpec] {
        &self.features
    }

    /// Feature names in vector order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.features.iter().map(|spec| spec.name.as_str())
    }

    /// Width of the feature vector.
    #[must_use]
    pub fn len(&self) -> usize {
        self.features.len()
    }

    /// Whether there are no features.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

/// Encoders for every categorical column keyed by column name, plus the feature order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncoderSet {
    target: String,
    encoders: IndexMap<String, LabelEncoder>,
    schema: FeatureSchema,
}

/// Dataset after encoding: row-major features and target codes.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedDataset {
    /// One feature vector per row in schema order.
    pub features: Vec<Vec<f64>>,
    /// Target code per row.
    pub labels: Vec<u32>,
}

impl EncoderSet {
    /// Fits one encoder per categorical column and encodes the whole dataset.
    pub fn fit(dataset: &Dataset) -> Result<(Self, EncodedDataset), EncodeError> {
        let target = dataset.target().to_owned();
        let mut encoders = IndexMap::new();
        let mut schema = FeatureSchema::default();
        let mut feature_columns: Vec<Vec<f64>> = Vec::new();
        let mut labels = Vec::new();

        for (name, column) in dataset.columns() {
            let (encoder, values) = match column {
                Column::Categorical(values) => {
                    let encoder = LabelEncoder::fit(values);
                    let codes = values
                        .iter()
                        .map(|value| {
                            encoder
                                .transform(value)
                                .ok_or_else(|| EncodeError::unseen(name, value))
                        })
                        .collect::<Result<Vec<u32>, _>>()?;
                    (encoder, codes)
                }
                Column::Numeric(_) if name == target => {
                    return Err(EncodeError::NumericTarget(name.to_owned()));
                }
                Column::Numeric(values) => {
                    schema.features.push(FeatureSpec {
                        name: name.to_owned(),
                        kind: ColumnKind::Numeric,
                    });
                    feature_columns.push(values.clone());
                    continue;
                }
            };
            if name == target {
                labels = values;
            } else {
                schema.features.push(FeatureSpec {
                    name: name.to_owned(),
                    kind: ColumnKind::Categorical,
                });
                feature_columns.push(values.into_iter().map(f64::from).collect());
            }
            encoders.insert(name.to_owned(), encoder);
        }

        let features = (0..dataset.len())
            .map(|row| feature_columns.iter().map(|column| column[row]).collect())
            .collect();
        Ok((
            Self {
                target,
                encoders,
                schema,
            },
            EncodedDataset { features, labels },
        ))
    }

    /// Target column name.
    #[must_use]
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Classifier input layout.
    #[must_use]
    pub const fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    /// Encoder for a column.
    #[must_use]
    pub fn get(&self, column: &str) -> Option<&LabelEncoder> {
        self.encoders.get(column)
    }

    /// Encoders in column order, target included.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &LabelEncoder)> {
        self.encoders
            .iter()
            .map(|(name, encoder)| (name.as_str(), encoder))
    }

    /// Names of encoded feature columns, target excluded.
    pub fn feature_names(&self) -> impl Iterator<Item = &str> {
        self.encoders
            .keys()
            .filter(|name| **name != self.target)
            .map(String::as_str)
    }

    /// Encoder for the target column.
    pub fn target_encoder(&self) -> Result<&LabelEncoder, EncodeError> {
        self.encoders
            .get(&self.target)
            .ok_or_else(|| EncodeError::UnknownColumn(self.target.clone()))
    }

    /// Checks a decoded set: sorted classes, a target encoder and one encoder
    /// per categorical feature.
    pub fn validate(&self) -> Result<(), EncodeError> {
        self.target_encoder()?;
        if let Some((name, _)) = self.encoders.iter().find(|(_, encoder)| !encoder.is_sorted()) {
            return Err(EncodeError::UnsortedClasses(name.clone()));
        }
        for spec in &self.schema.features {
            if spec.kind == ColumnKind::Categorical && !self.encoders.contains_key(&spec.name) {
                return Err(EncodeError::UnknownColumn(spec.name.clone()));
            }
        }
        Ok(())
    }

    /// Encodes one value of `column`.
    pub fn encode(&self, column: &str, value: &str) -> Result<u32, EncodeError> {
        let encoder = self
            .encoders
            .get(column)
            .ok_or_else(|| EncodeError::UnknownColumn(column.to_owned()))?;
        encoder
            .transform(value)
            .ok_or_else(|| EncodeError::unseen(column, value))
    }

    /// Decodes one code of `column`.
    pub fn decode(&self, column: &str, code: u32) -> Result<&str, EncodeError> {
        let encoder = self
            .encoders
            .get(column)
            .ok_or_else(|| EncodeError::UnknownColumn(column.to_owned()))?;
        encoder
            .inverse_transform(code)
            .ok_or_else(|| EncodeError::UnknownCode {
                column: column.to_owned(),
                code,
            })
    }
}

/// Encoding failures.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EncodeError {
    /// Value was not present when the encoder was fitted.
    #[error("unseen value '{value}' for column '{column}'")]
    UnseenCategory {
        /// Column name.
        column: String,
        /// Offending value.
        value: String,
    },
    /// Code outside the encoder range.
    #[error("code {code} is out of range for column '{column}'")]
    UnknownCode {
        /// Column name.
        column: String,
        /// Offending code.
        code: u32,
    },
    /// No encoder exists for the column.
    #[error("no encoder for column '{0}'")]
    UnknownColumn(String),
    /// The target column parsed as numbers; a categorical target is required.
    #[error("target column '{0}' is numeric, expected categorical labels")]
    NumericTarget(String),
    /// Encoder classes are out of order, so lookups would miss.
    #[error("classes of column '{0}' are not sorted")]
    UnsortedClasses(String),
}

impl EncodeError {
    fn unseen(column: &str, value: &str) -> Self {
        Self::UnseenCategory {
            column: column.to_owned(),
            value: value.to_owned(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dataset() -> Dataset {
        Dataset::from_reader(
            "class,cap-shape,odor,rings\np,x,f,1\ne,b,n,2\ne,x,a,1\np,f,f,3\n".as_bytes(),
            "class",
        )
        .unwrap()
    }

    #[test]
    fn encoder_codes_follow_sorted_order() {
        let encoder = LabelEncoder::fit(["p", "e", "p", "e"]);
        assert_eq!(encoder.classes(), ["e", "p"]);
        assert_eq!(encoder.transform("e"), Some(0));
        assert_eq!(encoder.transform("p"), Some(1));
        assert_eq!(encoder.transform("x"), None);
        assert_eq!(encoder.inverse_transform(2), None);
        assert_eq!(encoder.transform_many(["p", "e"]), Some(vec![1, 0]));
        assert_eq!(encoder.transform_many(["p", "x"]), None);
    }

    #[test]
    fn every_fitted_value_round_trips() {
        let dataset = dataset();
        let (encoders, _) = EncoderSet::fit(&dataset).unwrap();
        for (name, column) in dataset.columns() {
            if let Column::Categorical(values) = column {
                for value in values {
                    let code = encoders.encode(name, value).unwrap();
                    assert_eq!(encoders.decode(name, code).unwrap(), value);
                }
            }
        }
    }

    #[test]
    fn fit_builds_schema_and_matrix() {
        let (encoders, encoded) = EncoderSet::fit(&dataset()).unwrap();
        let names: Vec<&str> = encoders.schema().names().collect();
        assert_eq!(names, vec!["cap-shape", "odor", "rings"]);
        assert_eq!(
            encoders.feature_names().collect::<Vec<_>>(),
            vec!["cap-shape", "odor"]
        );
        assert_eq!(encoded.labels, vec![1, 0, 0, 1]);
        // cap-shape classes: b, f, x; odor classes: a, f, n
        assert_eq!(encoded.features[0], vec![2.0, 1.0, 1.0]);
        assert_eq!(encoded.features[1], vec![0.0, 2.0, 2.0]);
        assert!(encoders.get("rings").is_none());
    }

    #[test]
    fn unseen_value_is_a_named_error() {
        let (encoders, _) = EncoderSet::fit(&dataset()).unwrap();
        let err = encoders.encode("odor", "z").unwrap_err();
        assert_eq!(
            err,
            EncodeError::UnseenCategory {
                column: "odor".into(),
                value: "z".into()
            }
        );
    }

    #[test]
    fn numeric_target_is_rejected() {
        let dataset = Dataset::from_reader("class,odor\n1,f\n0,n\n".as_bytes(), "class").unwrap();
        let err = EncoderSet::fit(&dataset).unwrap_err();
        assert_eq!(err, EncodeError::NumericTarget("class".into()));
    }

    #[test]
    fn reordered_classes_fail_validation() {
        let (mut encoders, _) = EncoderSet::fit(&dataset()).unwrap();
        assert_eq!(encoders.validate(), Ok(()));

        encoders.encoders["odor"].classes.reverse();
        assert!(!encoders.encoders["odor"].is_sorted());
        assert_eq!(
            encoders.validate(),
            Err(EncodeError::UnsortedClasses("odor".into()))
        );

        let (mut encoders, _) = EncoderSet::fit(&dataset()).unwrap();
        encoders.encoders.shift_remove("cap-shape");
        assert_eq!(
            encoders.validate(),
            Err(EncodeError::UnknownColumn("cap-shape".into()))
        );
    }
}
