use std::sync::Arc;

use crate::adapters::sqlite::SqliteStorage;
use crate::application::{AnalyticsService, AuthService, InferenceService, ModelRegistry};
use crate::domain::PasswordPolicy;

/// Shared handler state: services over one SQLite store and one model registry.
pub struct AppState {
    pub inference: InferenceService<SqliteStorage>,
    pub analytics: AnalyticsService<SqliteStorage>,
    pub auth: AuthService<SqliteStorage>,
}

impl AppState {
    pub fn new(models: ModelRegistry, storage: SqliteStorage, policy: PasswordPolicy) -> Arc<Self> {
        let models = Arc::new(models);
        let storage = Arc::new(storage);

        Arc::new(Self {
            inference: InferenceService::new(models, Arc::clone(&storage)),
            analytics: AnalyticsService::new(Arc::clone(&storage)),
            auth: AuthService::new(storage, policy),
        })
    }
}
