//! Domain layer: Core business types and logic.
//!
//! Pure types and functions: feature schemas, derived fields, ensemble votes
//! and the risk rule. No I/O happens here.

mod account;
pub mod derived;
mod features;
pub mod password;
mod prediction;

pub use account::{Account, NewAccount, SessionToken, UserId};
pub use derived::ValidationError;
pub use features::{Domain, FeatureValue, FeatureVector, DIABETES_FEATURES, HEART_FEATURES};
pub use password::{PasswordError, PasswordPolicy};
pub use prediction::{
    aggregate, classify_risk, Assessment, ModelTag, PredictionRecord, RiskLevel, Votes,
};
