// src/middleware/error_handler.rs - API error taxonomy and response mapping
use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

use fraudguard_model::ModelError;
use fraudguard_store::StoreError;

/// Application-wide error types with detailed context
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Not found: {resource}")]
    NotFound { resource: String },

    #[error("KV store unavailable: {0}")]
    Store(#[from] StoreError),

    #[error("Model persistence failed: {0}")]
    Model(#[from] ModelError),

    #[error("Request deadline exceeded after {millis} ms")]
    Timeout { millis: u64 },

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
        }
    }

    /// Convert error to HTTP status code
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation { .. } => StatusCode::BAD_REQUEST,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::Store(_) | Self::Model(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Timeout { .. } => StatusCode::REQUEST_TIMEOUT,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get error code for client identification
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "VALIDATION_ERROR",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::Store(_) => "STORE_UNAVAILABLE",
            Self::Model(_) => "MODEL_UNAVAILABLE",
            Self::Timeout { .. } => "REQUEST_TIMEOUT",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Check if error should be logged as an error vs warning
    pub fn should_log_as_error(&self) -> bool {
        match self {
            // Client errors - log as warnings
            Self::Validation { .. } | Self::NotFound { .. } => false,
            // Infrastructure errors - log as errors
            Self::Store(_) | Self::Model(_) | Self::Timeout { .. } | Self::Internal(_) => true,
        }
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut fields: Vec<String> = errors
            .field_errors()
            .into_iter()
            .map(|(field, errs)| {
                let detail = errs
                    .first()
                    .and_then(|e| e.message.as_ref())
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| "invalid value".to_string());
                format!("{field}: {detail}")
            })
            .collect();
        fields.sort();
        Self::Validation {
            message: fields.join("; "),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_id = Uuid::new_v4();

        if self.should_log_as_error() {
            tracing::error!(
                error_id = %error_id,
                error_code = self.error_code(),
                error = %self,
                "API Error occurred"
            );
        } else {
            tracing::warn!(
                error_id = %error_id,
                error_code = self.error_code(),
                error = %self,
                "API Warning"
            );
        }

        let body = Json(json!({
            "error": {
                "id": error_id,
                "code": self.error_code(),
                "message": self.to_string(),
                "timestamp": chrono::Utc::now().to_rfc3339(),
            }
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_follow_the_taxonomy() {
        assert_eq!(
            ApiError::validation("bad").status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::not_found("transaction").status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::Store(StoreError::Backend("down".into())).status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            ApiError::Timeout { millis: 5000 }.status_code(),
            StatusCode::REQUEST_TIMEOUT
        );
    }

    #[test]
    fn client_errors_log_as_warnings() {
        assert!(!ApiError::validation("bad").should_log_as_error());
        assert!(!ApiError::not_found("tx").should_log_as_error());
        assert!(ApiError::Internal("boom".into()).should_log_as_error());
    }
}
