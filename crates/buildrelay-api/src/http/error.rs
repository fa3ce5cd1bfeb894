//! Application error type mapping relay errors to HTTP responses.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use buildrelay_types::error::RelayError;

/// Application-level error that maps to HTTP responses.
#[derive(Debug)]
pub enum AppError {
    /// Submission or callback failures from the relay.
    Relay(RelayError),
    /// Request body that could not be read or parsed as JSON.
    Body(JsonRejection),
}

impl From<RelayError> for AppError {
    fn from(e: RelayError) -> Self {
        AppError::Relay(e)
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Body(rejection)
    }
}

impl AppError {
    fn parts(&self) -> (StatusCode, &'static str, String, Option<&'static str>) {
        match self {
            AppError::Relay(e @ (RelayError::MissingField(_) | RelayError::InvalidField { .. })) => {
                (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", e.to_string(), e.field())
            }
            AppError::Relay(e @ RelayError::PayloadTooLarge { .. }) => {
                (StatusCode::PAYLOAD_TOO_LARGE, "PAYLOAD_TOO_LARGE", e.to_string(), None)
            }
            AppError::Relay(e @ (RelayError::Dependency { .. } | RelayError::Registry(_))) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "DEPENDENCY_ERROR", e.to_string(), None)
            }
            AppError::Body(rejection) => {
                let status = rejection.status();
                let code = if status == StatusCode::PAYLOAD_TOO_LARGE {
                    "PAYLOAD_TOO_LARGE"
                } else {
                    "VALIDATION_ERROR"
                };
                (status, code, rejection.body_text(), None)
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message, field) = self.parts();

        if status.is_server_error() {
            tracing::error!(code, error = %message, "request failed");
        } else {
            tracing::debug!(code, error = %message, "request rejected");
        }

        let body = json!({
            "error": message,
            "code": code,
            "field": field,
        });
        (status, Json(body)).into_response()
    }
}
