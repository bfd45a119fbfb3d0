//! Scaled predictor: three (scaler, classifier) pairs per domain.
//!
//! Each model family owns its own fitted scaler; a vector is scaled
//! separately for every family before that family's classifier votes.

use std::collections::BTreeMap;
use std::path::Path;

use crate::adapters::artifacts::ArtifactLoader;
use crate::domain::{Domain, FeatureValue, FeatureVector, ModelTag, Votes};
use crate::ports::{Classifier, ModelError, Scaler};
use crate::GlimpseError;

/// Immutable (scaler, classifier) binding for one model family.
pub struct ModelPair {
    scaler: Box<dyn Scaler>,
    classifier: Box<dyn Classifier>,
}

impl ModelPair {
    #[must_use]
    pub fn new(scaler: Box<dyn Scaler>, classifier: Box<dyn Classifier>) -> Self {
        Self { scaler, classifier }
    }

    /// Scale `vector` with this pair's scaler and return the classifier's label.
    ///
    /// # Errors
    /// `UnscaledInput` when the scaler was fit on other columns (or another
    /// order) or the classifier expects another width; `TypeConversion` when a
    /// slot is missing or non-numeric.
    pub fn predict(&self, vector: &FeatureVector) -> Result<u8, ModelError> {
        let fitted = self.scaler.feature_names();
        let names = vector.names();
        if fitted.len() != names.len() || fitted.iter().zip(names).any(|(f, n)| f != n) {
            return Err(ModelError::UnscaledInput(format!(
                "scaler fit on [{}], vector has [{}]",
                fitted.join(", "),
                names.join(", ")
            )));
        }

        let raw = vector
            .fields()
            .map(|(name, value)| match value {
                FeatureValue::Number(x) => Ok(*x),
                FeatureValue::Missing => Err(ModelError::TypeConversion {
                    field: name.to_string(),
                    value: "missing".to_string(),
                }),
                FeatureValue::NonNumeric(s) => Err(ModelError::TypeConversion {
                    field: name.to_string(),
                    value: s.clone(),
                }),
            })
            .collect::<Result<Vec<f64>, _>>()?;

        let scaled = self.scaler.transform(&raw)?;
        if scaled.len() != self.classifier.n_features() {
            return Err(ModelError::UnscaledInput(format!(
                "classifier expects {} features, scaler produced {}",
                self.classifier.n_features(),
                scaled.len()
            )));
        }

        Ok(u8::from(self.classifier.predict_label(&scaled)? != 0))
    }
}

impl std::fmt::Debug for ModelPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelPair")
            .field("features", &self.scaler.feature_names().len())
            .finish_non_exhaustive()
    }
}

/// Ensemble of model pairs for one domain.
#[derive(Debug)]
pub struct ScaledPredictor {
    domain: Domain,
    pairs: BTreeMap<ModelTag, ModelPair>,
}

impl ScaledPredictor {
    #[must_use]
    pub fn new(domain: Domain) -> Self {
        Self {
            domain,
            pairs: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_pair(mut self, tag: ModelTag, pair: ModelPair) -> Self {
        self.pairs.insert(tag, pair);
        self
    }

    #[must_use]
    pub fn domain(&self) -> Domain {
        self.domain
    }

    /// One vote per family, in tag order. Any family failing fails the whole
    /// prediction.
    ///
    /// # Errors
    /// `ModelNotLoaded` if a family has no pair; `Model` errors from the pairs.
    pub fn predict(&self, vector: &FeatureVector) -> Result<Votes, GlimpseError> {
        if vector.domain() != self.domain {
            return Err(ModelError::UnscaledInput(format!(
                "{} vector given to the {} predictor",
                vector.domain(),
                self.domain
            ))
            .into());
        }

        let mut votes = Votes::new();
        for tag in ModelTag::ALL {
            let pair = self.pairs.get(&tag).ok_or_else(|| {
                GlimpseError::ModelNotLoaded(format!("{} model for {}", tag, self.domain))
            })?;
            let label = pair.predict(vector)?;
            tracing::debug!(domain = %self.domain, family = %tag, label, "Family vote");
            votes.insert(tag, label);
        }
        Ok(votes)
    }
}

/// Predictors for every domain, loaded once at startup.
#[derive(Debug, Default)]
pub struct ModelRegistry {
    diabetes: Option<ScaledPredictor>,
    heart_disease: Option<ScaledPredictor>,
}

impl ModelRegistry {
    /// Registry with no predictors; every lookup fails with `ModelNotLoaded`.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Install (or replace) the predictor for its domain.
    #[must_use]
    pub fn with_predictor(mut self, predictor: ScaledPredictor) -> Self {
        match predictor.domain() {
            Domain::Diabetes => self.diabetes = Some(predictor),
            Domain::HeartDisease => self.heart_disease = Some(predictor),
        }
        self
    }

    /// Load both domains from a model directory.
    ///
    /// # Errors
    /// Returns `Artifact` if any file is absent, corrupt or fails its digest.
    pub fn load(dir: &Path, require_manifest: bool) -> Result<Self, GlimpseError> {
        tracing::info!("Loading model artifacts from {:?}", dir);
        let loader = ArtifactLoader::open(dir, require_manifest)?;

        let mut registry = Self::empty();
        for domain in Domain::ALL {
            let predictor = loader
                .load_domain(domain)?
                .into_iter()
                .fold(ScaledPredictor::new(domain), |p, loaded| {
                    p.with_pair(loaded.tag, ModelPair::new(loaded.scaler, loaded.classifier))
                });
            tracing::info!(%domain, families = predictor.pairs.len(), "Predictor ready");
            registry = registry.with_predictor(predictor);
        }
        Ok(registry)
    }

    /// Predictor for `domain`.
    ///
    /// # Errors
    /// Returns `ModelNotLoaded` if the domain was never loaded.
    pub fn predictor(&self, domain: Domain) -> Result<&ScaledPredictor, GlimpseError> {
        let slot = match domain {
            Domain::Diabetes => &self.diabetes,
            Domain::HeartDisease => &self.heart_disease,
        };
        slot.as_ref()
            .ok_or_else(|| GlimpseError::ModelNotLoaded(format!("no predictor for {domain}")))
    }
}
