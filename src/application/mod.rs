//! Application layer: Use cases and services.
//!
//! This module orchestrates domain logic with ports to implement
//! the core use cases of the application.

mod analytics;
mod auth;
mod inference;
pub mod normalizer;
mod predictor;

pub use analytics::{reduce, AnalyticsReport, AnalyticsService, PerDomain, RiskCounts, TrendPoint};
pub use auth::{token_from_header, AuthService};
pub use inference::{InferenceService, MAX_PAGE_SIZE};
pub use normalizer::normalize;
pub use predictor::{ModelPair, ModelRegistry, ScaledPredictor};

#[cfg(test)]
pub(crate) use predictor::test_support;
