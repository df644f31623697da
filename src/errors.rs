use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use miette::Diagnostic;
use serde_json::json;
use thiserror::Error;

/// Failures of a single request. Startup failures are reported through
/// miette before the server binds.
#[derive(Debug, Error, Diagnostic)]
pub enum GateError {
    #[error("Serialization error: {0}")]
    #[diagnostic(code(attrgate::serde))]
    Serde(#[from] serde_json::Error),

    #[error("Bad request: {0}")]
    #[diagnostic(code(attrgate::bad_request))]
    BadRequest(String),

    #[error("State information lost; the request may have expired or been used already")]
    #[diagnostic(code(attrgate::state_lost))]
    StateLost,

    #[error("Forbidden: {0}")]
    #[diagnostic(code(attrgate::forbidden))]
    Forbidden(String),
}

impl IntoResponse for GateError {
    fn into_response(self) -> Response {
        let status = match &self {
            GateError::BadRequest(_) | GateError::StateLost => StatusCode::BAD_REQUEST,
            GateError::Forbidden(_) => StatusCode::FORBIDDEN,
            GateError::Serde(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        }
        let body = json!({ "error": self.to_string() });
        (status, Json(body)).into_response()
    }
}
