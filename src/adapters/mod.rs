//! Adapters layer: Concrete implementations of ports.
//!
//! - `artifacts`: JSON scaler/classifier artifacts and their SHA-256 manifest
//! - `sqlite`: SQLite for accounts and prediction history
//! - `sanitize`: PII filtering for logs

pub mod artifacts;
pub mod sanitize;
pub mod sqlite;

pub use artifacts::ArtifactError;
pub use sqlite::StorageError;
