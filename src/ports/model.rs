//! Model port: the (scaler, classifier) capability pair behind each family.
//!
//! Artifact formats live in the adapters; the predictor only sees these traits.

/// Errors raised while scaling or classifying a feature vector.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ModelError {
    #[error("Feature vector does not match the fitted schema: {0}")]
    UnscaledInput(String),

    #[error("Feature '{field}' is not numeric: {value}")]
    TypeConversion { field: String, value: String },
}

/// Fitted feature transform, applied before its paired classifier.
pub trait Scaler: Send + Sync {
    /// Column names, in the order the scaler was fit on.
    fn feature_names(&self) -> &[String];

    /// Apply the fitted transform.
    ///
    /// # Errors
    /// Returns `ModelError::UnscaledInput` if the width does not match.
    fn transform(&self, values: &[f64]) -> Result<Vec<f64>, ModelError>;
}

/// Fitted binary classifier operating on scaled features.
pub trait Classifier: Send + Sync {
    /// Number of features the classifier expects.
    fn n_features(&self) -> usize;

    /// Top label (0 or 1) for one scaled row.
    ///
    /// # Errors
    /// Returns `ModelError::UnscaledInput` if the width does not match.
    fn predict_label(&self, scaled: &[f64]) -> Result<u8, ModelError>;
}
