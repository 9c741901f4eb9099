//! Error responses of the HTTP API
//!
//! Every failed request answers with a JSON body `{"code", "message"}`. The
//! status code is chosen from the [`ErrorKind`] of the ledger error.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tracing::error;

use crate::types::{ErrorKind, LedgerError};

/// JSON error body
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApiError {
    /// Machine-readable code, e.g. `CARD_NOT_FOUND`
    pub code: String,

    /// Human-readable description
    pub message: String,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

/// Error body together with its HTTP status
#[derive(Debug, Clone)]
pub struct ApiErrorResponse {
    pub status: StatusCode,
    pub error: ApiError,
}

impl ApiErrorResponse {
    pub fn new(status: StatusCode, error: ApiError) -> Self {
        Self { status, error }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::BAD_REQUEST,
            ApiError::new("INVALID_REQUEST", message),
        )
    }
}

impl IntoResponse for ApiErrorResponse {
    fn into_response(self) -> Response {
        (self.status, Json(self.error)).into_response()
    }
}

/// HTTP status for an error kind
///
/// Risk and transient settlement outcomes are recorded as failed
/// transactions and never reach a handler as errors; should one surface it
/// is reported as unprocessable.
pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Validation | ErrorKind::Serialization => StatusCode::BAD_REQUEST,
        ErrorKind::Conflict => StatusCode::CONFLICT,
        ErrorKind::RiskRejected | ErrorKind::Transient => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorKind::Storage => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<LedgerError> for ApiErrorResponse {
    fn from(e: LedgerError) -> Self {
        let status = status_for(e.kind());
        if status.is_server_error() {
            error!(code = e.code(), error = %e, "request failed");
        }
        Self::new(status, ApiError::new(e.code(), e.to_string()))
    }
}

impl From<JsonRejection> for ApiErrorResponse {
    fn from(rejection: JsonRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiErrorResponse {
    fn from(rejection: QueryRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}
