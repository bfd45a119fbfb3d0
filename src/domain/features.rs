//! Feature schemas and ordered feature vectors.
//!
//! Scalers and classifiers were fit on a specific column order. A
//! `FeatureVector` is always laid out in its domain's schema order, so the
//! order can only be wrong if an artifact was fit on a different schema.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Diabetes schema (Pima layout).
pub const DIABETES_FEATURES: [&str; 8] = [
    "Pregnancies",
    "Glucose",
    "BloodPressure",
    "SkinThickness",
    "Insulin",
    "BMI",
    "DiabetesPedigreeFunction",
    "Age",
];

/// Heart-disease schema (Cleveland layout).
pub const HEART_FEATURES: [&str; 13] = [
    "age", "sex", "cp", "trestbps", "chol", "fbs", "restecg", "thalach", "exang", "oldpeak",
    "slope", "ca", "thal",
];

/// Disease domain served by one scaled predictor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Domain {
    Diabetes,
    HeartDisease,
}

impl Domain {
    /// Both domains, in reporting order.
    pub const ALL: [Domain; 2] = [Domain::Diabetes, Domain::HeartDisease];

    /// Field names in the exact order the models were trained on.
    #[must_use]
    pub fn feature_names(self) -> &'static [&'static str] {
        match self {
            Self::Diabetes => &DIABETES_FEATURES,
            Self::HeartDisease => &HEART_FEATURES,
        }
    }

    /// Name of the schema field holding the patient's age.
    #[must_use]
    pub fn age_field(self) -> &'static str {
        match self {
            Self::Diabetes => "Age",
            Self::HeartDisease => "age",
        }
    }

    /// Name of the pedigree field, if the domain has one.
    #[must_use]
    pub fn pedigree_field(self) -> Option<&'static str> {
        match self {
            Self::Diabetes => Some("DiabetesPedigreeFunction"),
            Self::HeartDisease => None,
        }
    }

    /// Stable identifier used for artifact file names and table names.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Diabetes => "diabetes",
            Self::HeartDisease => "heart_disease",
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Domain {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "diabetes" => Ok(Self::Diabetes),
            "heart_disease" | "heart" => Ok(Self::HeartDisease),
            other => Err(format!("unknown domain '{other}'")),
        }
    }
}

/// One slot of a feature vector.
///
/// Missing and non-numeric values are carried through normalization and
/// rejected only when the vector is handed to a scaler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FeatureValue {
    Number(f64),
    Missing,
    NonNumeric(String),
}

impl FeatureValue {
    /// Coerce a raw JSON value.
    #[must_use]
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => Self::Missing,
            Value::Number(n) => n
                .as_f64()
                .filter(|x| x.is_finite())
                .map_or_else(|| Self::NonNumeric(n.to_string()), Self::Number),
            Value::Bool(b) => Self::Number(if *b { 1.0 } else { 0.0 }),
            Value::String(s) => match s.trim().parse::<f64>() {
                Ok(x) if x.is_finite() => Self::Number(x),
                _ => Self::NonNumeric(s.clone()),
            },
            other => Self::NonNumeric(other.to_string()),
        }
    }

    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(x) => Some(*x),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_missing(&self) -> bool {
        matches!(self, Self::Missing)
    }
}

/// Ordered, domain-tagged feature vector.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector {
    domain: Domain,
    values: Vec<FeatureValue>,
}

impl FeatureVector {
    /// Build a vector from slot values already in schema order.
    ///
    /// # Errors
    /// Returns an error if the number of values does not match the schema.
    pub fn from_values(domain: Domain, values: Vec<FeatureValue>) -> Result<Self, String> {
        let expected = domain.feature_names().len();
        if values.len() != expected {
            return Err(format!(
                "Expected {expected} {domain} features, got {}",
                values.len()
            ));
        }
        Ok(Self { domain, values })
    }

    /// Build a vector from plain numbers already in schema order.
    ///
    /// # Errors
    /// Returns an error if the number of values does not match the schema.
    pub fn from_numbers(domain: Domain, numbers: &[f64]) -> Result<Self, String> {
        Self::from_values(
            domain,
            numbers.iter().copied().map(FeatureValue::Number).collect(),
        )
    }

    #[must_use]
    pub fn domain(&self) -> Domain {
        self.domain
    }

    #[must_use]
    pub fn names(&self) -> &'static [&'static str] {
        self.domain.feature_names()
    }

    #[must_use]
    pub fn values(&self) -> &[FeatureValue] {
        &self.values
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Value stored under a schema field name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&FeatureValue> {
        self.names()
            .iter()
            .position(|n| *n == name)
            .map(|i| &self.values[i])
    }

    /// `(name, value)` pairs in schema order.
    pub fn fields(&self) -> impl Iterator<Item = (&'static str, &FeatureValue)> {
        self.names().iter().copied().zip(self.values.iter())
    }

    /// Keyed JSON object for persistence and responses.
    #[must_use]
    pub fn to_json(&self) -> Value {
        let map: Map<String, Value> = self
            .fields()
            .map(|(name, value)| {
                let json = match value {
                    FeatureValue::Number(x) => serde_json::json!(x),
                    FeatureValue::Missing => Value::Null,
                    FeatureValue::NonNumeric(s) => Value::String(s.clone()),
                };
                (name.to_string(), json)
            })
            .collect();
        Value::Object(map)
    }

    /// Rebuild a vector from a keyed object written by [`FeatureVector::to_json`].
    #[must_use]
    pub fn from_json(domain: Domain, object: &Map<String, Value>) -> Self {
        let values = domain
            .feature_names()
            .iter()
            .map(|name| {
                object
                    .get(*name)
                    .map_or(FeatureValue::Missing, FeatureValue::from_json)
            })
            .collect();
        Self { domain, values }
    }
}
