//! # Glimpse
//!
//! Diabetes and heart-disease risk service.
//!
//! Each prediction request is normalized into a fixed-order feature vector,
//! scored by three independently trained classifiers (each with its own fitted
//! scaler), and the three binary votes are reduced to a low/medium/high risk
//! level. Authenticated predictions are stored per user and summarized into
//! risk distributions and monthly trends.
//!
//! ## Architecture
//!
//! The crate follows Hexagonal Architecture:
//! - `domain`: Core types (feature vectors, votes, risk levels, accounts)
//! - `ports`: Trait definitions for models and storage
//! - `adapters`: Concrete implementations (JSON model artifacts, SQLite, log sanitization)
//! - `application`: Use cases (normalization, scaled prediction, inference, analytics, auth)
//! - `server`: HTTP surface (axum)
//! - `config`: Environment-driven configuration

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
pub mod server;

pub use domain::{Assessment, Domain, FeatureVector, ModelTag, RiskLevel, Votes};

/// Result type for Glimpse operations
pub type Result<T> = std::result::Result<T, GlimpseError>;

/// Main error type for Glimpse
#[derive(Debug, thiserror::Error)]
pub enum GlimpseError {
    #[error("Invalid input: {0}")]
    Validation(#[from] domain::ValidationError),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Model(#[from] ports::ModelError),

    #[error("Model not loaded: {0}")]
    ModelNotLoaded(String),

    #[error("Model artifacts could not be loaded: {0}")]
    Artifact(#[from] adapters::ArtifactError),

    #[error("Session token missing or invalid")]
    Unauthenticated,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Email already used")]
    EmailTaken,

    #[error("Password error: {0}")]
    Password(#[from] domain::PasswordError),

    #[error("Storage operation failed: {0}")]
    Storage(#[from] adapters::StorageError),

    #[error("Background task failed: {0}")]
    Worker(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
