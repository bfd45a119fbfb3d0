//! HTTP mapping for `GlimpseError`: status code plus `{"error": "..."}`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::ports::ModelError;
use crate::GlimpseError;

impl GlimpseError {
    /// Status code returned to HTTP clients.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_)
            | Self::InvalidRequest(_)
            | Self::EmailTaken
            | Self::Model(ModelError::TypeConversion { .. }) => StatusCode::BAD_REQUEST,
            Self::Unauthenticated | Self::InvalidCredentials => StatusCode::UNAUTHORIZED,
            Self::ModelNotLoaded(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Model(_)
            | Self::Artifact(_)
            | Self::Password(_)
            | Self::Storage(_)
            | Self::Worker(_)
            | Self::Io(_)
            | Self::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for GlimpseError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = if status.is_server_error() && status != StatusCode::SERVICE_UNAVAILABLE {
            tracing::error!("Request failed: {self}");
            "Internal server error".to_string()
        } else {
            tracing::debug!(status = status.as_u16(), "Request rejected: {self}");
            self.to_string()
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::StorageError;
    use crate::domain::ValidationError;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            GlimpseError::Validation(ValidationError::MalformedNationalId).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            GlimpseError::Model(ModelError::TypeConversion {
                field: "Glucose".into(),
                value: "missing".into()
            })
            .status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            GlimpseError::Model(ModelError::UnscaledInput("x".into())).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            GlimpseError::ModelNotLoaded("x".into()).status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(GlimpseError::EmailTaken.status(), StatusCode::BAD_REQUEST);
        assert_eq!(GlimpseError::InvalidCredentials.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            GlimpseError::Storage(StorageError::Serialization("x".into())).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
