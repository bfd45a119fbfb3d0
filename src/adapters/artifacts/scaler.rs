//! Fitted scaler artifacts (StandardScaler / MinMaxScaler exports).

use serde::{Deserialize, Serialize};

use crate::ports::{ModelError, Scaler};

/// Scaler parameters as exported after fitting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScalerArtifact {
    /// `(x - mean) / scale`
    Standard {
        feature_names: Vec<String>,
        mean: Vec<f64>,
        scale: Vec<f64>,
    },
    /// `x * scale + min`
    MinMax {
        feature_names: Vec<String>,
        min: Vec<f64>,
        scale: Vec<f64>,
    },
}

impl ScalerArtifact {
    /// Check that every parameter vector matches the feature count.
    ///
    /// # Errors
    /// Returns a description of the first inconsistency.
    pub fn validate(&self) -> Result<(), String> {
        let (names, a, b) = match self {
            Self::Standard {
                feature_names,
                mean,
                scale,
            } => (feature_names, mean, scale),
            Self::MinMax {
                feature_names,
                min,
                scale,
            } => (feature_names, min, scale),
        };

        if names.is_empty() {
            return Err("scaler has no features".into());
        }
        if a.len() != names.len() || b.len() != names.len() {
            return Err(format!(
                "scaler parameter lengths ({}, {}) do not match {} feature names",
                a.len(),
                b.len(),
                names.len()
            ));
        }
        if a.iter().chain(b.iter()).any(|x| !x.is_finite()) {
            return Err("scaler parameters must be finite".into());
        }
        Ok(())
    }
}

impl Scaler for ScalerArtifact {
    fn feature_names(&self) -> &[String] {
        match self {
            Self::Standard { feature_names, .. } | Self::MinMax { feature_names, .. } => {
                feature_names
            }
        }
    }

    fn transform(&self, values: &[f64]) -> Result<Vec<f64>, ModelError> {
        let expected = self.feature_names().len();
        if values.len() != expected {
            return Err(ModelError::UnscaledInput(format!(
                "scaler expects {expected} features, got {}",
                values.len()
            )));
        }

        let scaled = match self {
            Self::Standard { mean, scale, .. } => values
                .iter()
                .zip(mean.iter().zip(scale))
                .map(|(x, (m, s))| {
                    // sklearn leaves constant columns unscaled
                    let s = if *s == 0.0 { 1.0 } else { *s };
                    (x - m) / s
                })
                .collect(),
            Self::MinMax { min, scale, .. } => values
                .iter()
                .zip(min.iter().zip(scale))
                .map(|(x, (m, s))| x * s + m)
                .collect(),
        };
        Ok(scaled)
    }
}
