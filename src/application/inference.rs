//! Inference service: normalize, predict, aggregate, and optionally record.
//!
//! This service coordinates:
//! - Feature normalization of the raw request body
//! - The three-family ensemble for the request's domain
//! - Risk aggregation
//! - Storage persistence (recorded route only)

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use serde_json::{Map, Value};

use crate::application::normalizer::normalize;
use crate::application::predictor::ModelRegistry;
use crate::domain::{Assessment, Domain, PredictionRecord, UserId};
use crate::ports::{PredictionPage, PredictionStore};
use crate::GlimpseError;

/// Largest page the history listing will return.
pub const MAX_PAGE_SIZE: usize = 100;

/// Service for running ensemble inference.
pub struct InferenceService<S>
where
    S: PredictionStore,
{
    models: Arc<ModelRegistry>,
    storage: Arc<S>,
}

impl<S> InferenceService<S>
where
    S: PredictionStore,
    S::Error: Into<crate::adapters::StorageError>,
{
    /// Create a new inference service.
    pub fn new(models: Arc<ModelRegistry>, storage: Arc<S>) -> Self {
        Self { models, storage }
    }

    /// Assess a raw record against today's date (UTC).
    ///
    /// # Errors
    /// Returns error if normalization or any model family fails.
    pub fn assess(&self, domain: Domain, raw: &Map<String, Value>) -> Result<Assessment, GlimpseError> {
        self.assess_at(domain, raw, Utc::now().date_naive())
    }

    /// Assess a raw record, deriving age relative to `reference`.
    ///
    /// # Errors
    /// Returns error if normalization or any model family fails.
    pub fn assess_at(
        &self,
        domain: Domain,
        raw: &Map<String, Value>,
        reference: NaiveDate,
    ) -> Result<Assessment, GlimpseError> {
        self.run(domain, raw, reference).map(|(_, assessment)| assessment)
    }

    fn run(
        &self,
        domain: Domain,
        raw: &Map<String, Value>,
        reference: NaiveDate,
    ) -> Result<(crate::domain::FeatureVector, Assessment), GlimpseError> {
        let predictor = self.models.predictor(domain)?;

        tracing::debug!(%domain, "Normalizing input...");
        let vector = normalize(raw, domain, reference)?;

        tracing::debug!(%domain, "Running ensemble...");
        let votes = predictor.predict(&vector)?;
        let assessment = Assessment::from_votes(votes);

        tracing::info!(
            %domain,
            positive = assessment.votes.total(),
            risk = %assessment.risk,
            "Assessment complete"
        );
        Ok((vector, assessment))
    }

    /// Assess and append the result to `user`'s history.
    ///
    /// # Errors
    /// Returns error if assessment fails or the record cannot be stored.
    pub fn assess_and_record(
        &self,
        user: UserId,
        domain: Domain,
        raw: &Map<String, Value>,
    ) -> Result<PredictionRecord, GlimpseError> {
        let (vector, assessment) = self.run(domain, raw, Utc::now().date_naive())?;
        let record = PredictionRecord::new(user, vector, assessment);

        self.storage
            .record(&record)
            .map_err(|e| GlimpseError::Storage(e.into()))?;

        tracing::info!(user = %user, %domain, "Prediction recorded");
        Ok(record)
    }

    /// Page through `user`'s records, newest first.
    ///
    /// # Errors
    /// Returns `InvalidRequest` for a zero limit or an offset past `i64::MAX`,
    /// or a storage error.
    pub fn history(
        &self,
        user: UserId,
        domain: Option<Domain>,
        offset: usize,
        limit: usize,
    ) -> Result<PredictionPage, GlimpseError> {
        if limit == 0 {
            return Err(GlimpseError::InvalidRequest("limit must be positive".into()));
        }
        if i64::try_from(offset).is_err() {
            return Err(GlimpseError::InvalidRequest("offset out of range".into()));
        }
        self.storage
            .history_page(user, domain, offset, limit.min(MAX_PAGE_SIZE))
            .map_err(|e| GlimpseError::Storage(e.into()))
    }
}
