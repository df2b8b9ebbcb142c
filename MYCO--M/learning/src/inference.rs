//! Request validation, feature encoding and single-row prediction over a loaded bundle.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::{
    artifacts::ModelBundle,
    dataset::ColumnKind,
    encoder::{EncodeError, FeatureSchema},
    forest::ForestError,
};

/// Encoded target code for poisonous mushrooms.
pub const POISONOUS_CODE: u32 = 1;
/// Encoded target code for edible mushrooms.
pub const EDIBLE_CODE: u32 = 0;

/// The two classes the service reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    /// Predicted poisonous.
    Poisonous,
    /// Predicted edible.
    Edible,
}

impl Verdict {
    /// Maps a known target code; other codes map to `None`.
    #[must_use]
    pub const fn from_code(code: u32) -> Option<Self> {
        match code {
            POISONOUS_CODE => Some(Self::Poisonous),
            EDIBLE_CODE => Some(Self::Edible),
            _ => None,
        }
    }

    /// Maps a model output: the poisonous code is poisonous, anything else edible.
    #[must_use]
    pub const fn from_prediction(code: u32) -> Self {
        if code == POISONOUS_CODE {
            Self::Poisonous
        } else {
            Self::Edible
        }
    }

    /// Lowercase label used in responses.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Poisonous => "poisonous",
            Self::Edible => "edible",
        }
    }

    /// Fixed explanation text; depends only on the class.
    #[must_use]
    pub const fn explanation(self) -> &'static str {
        match self {
            Self::Poisonous => {
                "The mushroom is poisonous because it has a foul odor and bruises easily."
            }
            Self::Edible => "The mushroom is edible.",
        }
    }
}

/// Prediction response body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prediction {
    /// Predicted class.
    pub prediction: Verdict,
    /// Canned explanation for the class.
    pub explanation: String,
}

impl From<Verdict> for Prediction {
    fn from(verdict: Verdict) -> Self {
        Self {
            prediction: verdict,
            explanation: verdict.explanation().to_owned(),
        }
    }
}

/// A validated raw feature value.
#[derive(Debug, Clone, PartialEq)]
pub enum FeatureValue {
    /// Text to look up in an encoder.
    Text(String),
    /// Number passed through or compared by its text form.
    Number(f64),
}

/// Feature values in schema order, validated for shape and completeness.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRequest {
    values: Vec<(String, FeatureValue)>,
}

impl FeatureRequest {
    /// Validates an untyped body against the schema.
    ///
    /// Non-object bodies are rejected outright. Features are checked in
    /// schema order and the first absent one is reported. Extra keys are
    /// ignored.
    pub fn from_value(body: &Value, schema: &FeatureSchema) -> Result<Self, PredictError> {
        let Value::Object(map) = body else {
            return Err(PredictError::InvalidFormat);
        };
        let mut values = Vec::with_capacity(schema.len());
        for spec in schema.features() {
            let raw = map
                .get(&spec.name)
                .ok_or_else(|| PredictError::MissingFeature(spec.name.clone()))?;
            let value = match (raw, spec.kind) {
                (Value::String(text), ColumnKind::Categorical) => FeatureValue::Text(text.clone()),
                (Value::Number(number), ColumnKind::Categorical) => {
                    FeatureValue::Text(number.to_string())
                }
                (Value::Bool(flag), ColumnKind::Categorical) => FeatureValue::Text(flag.to_string()),
                (Value::Number(number), ColumnKind::Numeric) => FeatureValue::Number(
                    number
                        .as_f64()
                        .ok_or_else(|| PredictError::invalid(&spec.name, "not a finite number"))?,
                ),
                (Value::String(text), ColumnKind::Numeric) => {
                    FeatureValue::Number(text.trim().parse().map_err(|_| {
                        PredictError::invalid(&spec.name, "expected a numeric value")
                    })?)
                }
                (other, _) => {
                    return Err(PredictError::invalid(
                        &spec.name,
                        &format!("unsupported JSON type {}", json_type(other)),
                    ));
                }
            };
            values.push((spec.name.clone(), value));
        }
        Ok(Self { values })
    }

    /// Values in schema order.
    #[must_use]
    pub fn values(&self) -> &[(String, FeatureValue)] {
        &self.values
    }
}

const fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Shared, read-only predictor over a loaded bundle.
#[derive(Debug, Clone)]
pub struct Predictor {
    bundle: Arc<ModelBundle>,
}

impl Predictor {
    /// Wraps a loaded bundle.
    #[must_use]
    pub const fn new(bundle: Arc<ModelBundle>) -> Self {
        Self { bundle }
    }

    /// Underlying bundle.
    #[must_use]
    pub fn bundle(&self) -> &ModelBundle {
        &self.bundle
    }

    /// Feature names a request must supply, in vector order.
    #[must_use]
    pub fn required_features(&self) -> Vec<&str> {
        self.bundle.encoders.schema().names().collect()
    }

    /// Validates, encodes and classifies an untyped request body.
    pub fn predict_value(&self, body: &Value) -> Result<Prediction, PredictError> {
        let request = FeatureRequest::from_value(body, self.bundle.encoders.schema())?;
        self.predict(&request)
    }

    /// Encodes a validated request and classifies it.
    pub fn predict(&self, request: &FeatureRequest) -> Result<Prediction, PredictError> {
        let row = self.encode(request)?;
        let code = self.bundle.model.predict_one(&row)?;
        Ok(Verdict::from_prediction(code).into())
    }

    /// Builds the feature vector for a validated request.
    pub fn encode(&self, request: &FeatureRequest) -> Result<Vec<f64>, PredictError> {
        request
            .values()
            .iter()
            .map(|(name, value)| match value {
                FeatureValue::Number(number) => Ok(*number),
                FeatureValue::Text(text) => self
                    .bundle
                    .encoders
                    .encode(name, text)
                    .map(f64::from)
                    .map_err(PredictError::from),
            })
            .collect()
    }
}

/// Prediction failures. All but `Model` and `Encoding` are caused by the request.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PredictError {
    /// Body was not a JSON object.
    #[error("Invalid input format. Expected a JSON object.")]
    InvalidFormat,
    /// A required feature key is absent.
    #[error("Missing feature: {0}")]
    MissingFeature(String),
    /// A categorical value was never seen during training.
    #[error("Unknown value '{value}' for feature '{feature}'")]
    UnseenCategory {
        /// Feature name.
        feature: String,
        /// Offending value.
        value: String,
    },
    /// Value has the wrong JSON type or cannot be parsed.
    #[error("Invalid value for feature '{feature}': {reason}")]
    InvalidValue {
        /// Feature name.
        feature: String,
        /// What was wrong.
        reason: String,
    },
    /// Encoder set inconsistent with the schema.
    #[error("encoding failed: {0}")]
    Encoding(EncodeError),
    /// Classifier rejected the vector.
    #[error("model error: {0}")]
    Model(#[from] ForestError),
}

impl PredictError {
    fn invalid(feature: &str, reason: &str) -> Self {
        Self::InvalidValue {
            feature: feature.to_owned(),
            reason: reason.to_owned(),
        }
    }

    /// Whether the request itself is at fault.
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidFormat
                | Self::MissingFeature(_)
                | Self::UnseenCategory { .. }
                | Self::InvalidValue { .. }
        )
    }
}

impl From<EncodeError> for PredictError {
    fn from(err: EncodeError) -> Self {
        match err {
            EncodeError::UnseenCategory { column, value } => Self::UnseenCategory {
                feature: column,
                value,
            },
            other => Self::Encoding(other),
        }
    }
}
