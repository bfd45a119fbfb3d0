//! Ports layer: Trait definitions for external operations.
//!
//! Following Hexagonal Architecture, these traits define the boundaries
//! between the application and external systems (model artifacts, storage).

mod model;
mod storage;

pub use model::{Classifier, ModelError, Scaler};
pub use storage::{AccountStore, PredictionPage, PredictionStore};
