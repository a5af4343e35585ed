//! API error types.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;
use vgen_ledger::LedgerError;
use vgen_worker::WorkerError;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Insufficient credits: required {required}, available {available}")]
    PaymentRequired { required: i64, available: i64 },

    #[error("Service unavailable: {0}")]
    Unavailable(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) | ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::PaymentRequired { .. } => StatusCode::PAYMENT_REQUIRED,
            ApiError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<WorkerError> for ApiError {
    fn from(err: WorkerError) -> Self {
        match err {
            WorkerError::Validation(msg) => ApiError::Validation(msg),
            WorkerError::InsufficientCredits { required, available } => {
                ApiError::PaymentRequired { required, available }
            }
            WorkerError::JobNotFound(id) => ApiError::not_found(format!("job {}", id)),
            WorkerError::ShuttingDown => ApiError::Unavailable("service is shutting down".into()),
            WorkerError::Ledger(e) => e.into(),
            other => ApiError::internal(other.to_string()),
        }
    }
}

impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::InsufficientCredits { required, available } => {
                ApiError::PaymentRequired { required, available }
            }
            LedgerError::InvalidAmount(amount) => {
                ApiError::bad_request(format!("amount must be positive, got {}", amount))
            }
            LedgerError::NotFound(what) => ApiError::NotFound(what),
            LedgerError::WalletUnavailable(msg) => ApiError::Unavailable(msg),
            other => ApiError::internal(other.to_string()),
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    detail: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // Don't expose internal error details in production
        let detail = match &self {
            ApiError::Internal(_) => {
                if std::env::var("ENVIRONMENT").unwrap_or_default() == "production" {
                    "An internal error occurred".to_string()
                } else {
                    self.to_string()
                }
            }
            _ => self.to_string(),
        };

        (status, Json(ErrorResponse { detail })).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_worker_errors_map_to_status() {
        let cases = [
            (WorkerError::validation("duration out of range"), StatusCode::BAD_REQUEST),
            (
                WorkerError::InsufficientCredits {
                    required: 100,
                    available: 40,
                },
                StatusCode::PAYMENT_REQUIRED,
            ),
            (WorkerError::JobNotFound("job-9".into()), StatusCode::NOT_FOUND),
            (WorkerError::ShuttingDown, StatusCode::SERVICE_UNAVAILABLE),
            (WorkerError::assembly("boom"), StatusCode::INTERNAL_SERVER_ERROR),
        ];

        for (err, expected) in cases {
            assert_eq!(ApiError::from(err).status_code(), expected);
        }
    }

    #[test]
    fn test_ledger_invalid_amount_is_bad_request() {
        let err = ApiError::from(LedgerError::InvalidAmount(-5));
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert!(err.to_string().contains("-5"));
    }
}
