//! API error type and JSON error body.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tracing::error;

use crate::domain::foundation::{DomainError, ErrorCode, ValidationError};
use crate::domain::payment::ReconciliationError;

/// Error body: `{ "code": "...", "message": "..." }`.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
}

impl ErrorResponse {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

/// Converts coordinator and port errors to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    Reconciliation(ReconciliationError),
    Domain(DomainError),
    Forbidden(String),
}

impl From<ReconciliationError> for ApiError {
    fn from(err: ReconciliationError) -> Self {
        Self::Reconciliation(err)
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        Self::Domain(err)
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        Self::Reconciliation(err.into())
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Reconciliation(err) => match err {
                ReconciliationError::InvalidTransition { .. }
                | ReconciliationError::ConcurrentUpdate { .. } => StatusCode::CONFLICT,
                ReconciliationError::PaymentMismatch { .. } => StatusCode::UNPROCESSABLE_ENTITY,
                ReconciliationError::Interrupted(_) => StatusCode::INTERNAL_SERVER_ERROR,
                ReconciliationError::ExternalVerificationFailed { .. } => {
                    StatusCode::PAYMENT_REQUIRED
                }
                ReconciliationError::CompletionUnverified { .. }
                | ReconciliationError::ExternalVerificationUnavailable(_)
                | ReconciliationError::StorageUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
                ReconciliationError::NotPaymentOwner { .. } => StatusCode::FORBIDDEN,
                ReconciliationError::Validation(_) => StatusCode::BAD_REQUEST,
            },
            ApiError::Domain(err) => match err.code {
                ErrorCode::ValidationFailed | ErrorCode::EmptyField | ErrorCode::InvalidFormat => {
                    StatusCode::BAD_REQUEST
                }
                ErrorCode::PaymentNotFound | ErrorCode::ContentNotFound => StatusCode::NOT_FOUND,
                ErrorCode::InvalidStateTransition | ErrorCode::ConcurrentModification => {
                    StatusCode::CONFLICT
                }
                ErrorCode::Unauthorized => StatusCode::UNAUTHORIZED,
                ErrorCode::Forbidden => StatusCode::FORBIDDEN,
                ErrorCode::StorageUnavailable
                | ErrorCode::DatabaseError
                | ErrorCode::VerificationUnavailable => StatusCode::SERVICE_UNAVAILABLE,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
        }
    }

    fn body(&self) -> ErrorResponse {
        match self {
            ApiError::Reconciliation(err) => ErrorResponse::new(err.code().to_string(), err.to_string()),
            ApiError::Domain(err) => ErrorResponse::new(err.code.to_string(), err.message.clone()),
            ApiError::Forbidden(message) => {
                ErrorResponse::new(ErrorCode::Forbidden.to_string(), message.clone())
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(status = %status, error = ?self, "Request failed");
        }
        (status, Json(self.body())).into_response()
    }
}
