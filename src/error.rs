//! Error handling module
//!
//! HTTP-facing error type and its response conversion.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::{json, Value};

use crate::domain::LedgerError;

/// Application-wide Result type
pub type AppResult<T> = Result<T, AppError>;

/// Application error types
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    // Client errors (4xx)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Invalid header {name}: {reason}")]
    InvalidHeader { name: &'static str, reason: String },

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::InvalidRequest(rejection.body_text())
    }
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub error_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

fn ledger_status(err: &LedgerError) -> (StatusCode, Option<Value>) {
    match err {
        // 400 Bad Request
        LedgerError::InvalidArgument(msg) => (StatusCode::BAD_REQUEST, Some(json!(msg))),
        LedgerError::InsufficientFunds {
            account_number,
            current_balance,
            requested_amount,
            deficiency,
        } => (
            StatusCode::BAD_REQUEST,
            Some(json!({
                "account_number": account_number,
                "current_balance": current_balance,
                "requested_amount": requested_amount,
                "deficiency": deficiency,
            })),
        ),

        // 404 Not Found
        LedgerError::AccountNotFound(number) => (StatusCode::NOT_FOUND, Some(json!(number))),

        // 409 Conflict
        LedgerError::ConcurrentModification { account_number } => {
            (StatusCode::CONFLICT, Some(json!(account_number)))
        }
        LedgerError::IdempotencyConflict(key) => (StatusCode::CONFLICT, Some(json!(key))),

        // 500 Internal Server Error
        LedgerError::GenerationExhausted { .. } => {
            tracing::error!(error = %err, "Account number generation failed");
            (StatusCode::INTERNAL_SERVER_ERROR, None)
        }
        LedgerError::StorageFailure(msg) => {
            tracing::error!("Storage failure: {}", msg);
            (StatusCode::INTERNAL_SERVER_ERROR, None)
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_code, details) = match &self {
            AppError::InvalidRequest(msg) => {
                (StatusCode::BAD_REQUEST, "invalid_request", Some(json!(msg)))
            }
            AppError::InvalidHeader { name, .. } => {
                (StatusCode::BAD_REQUEST, "invalid_header", Some(json!(name)))
            }
            AppError::Ledger(err) => {
                if err.is_client_error() {
                    tracing::debug!(error_code = err.code(), error = %err, "Request rejected");
                }
                let (status, details) = ledger_status(err);
                (status, err.code(), details)
            }
        };

        // server-side failures are not described to the caller
        let error = if status.is_server_error() {
            "Internal server error".to_string()
        } else {
            self.to_string()
        };

        let body = ErrorResponse {
            error,
            error_code: error_code.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (LedgerError::invalid("bad"), StatusCode::BAD_REQUEST),
            (
                LedgerError::insufficient_funds("ACC1", dec!(1), dec!(2)),
                StatusCode::BAD_REQUEST,
            ),
            (LedgerError::AccountNotFound("ACC1".into()), StatusCode::NOT_FOUND),
            (
                LedgerError::ConcurrentModification {
                    account_number: "ACC1".into(),
                },
                StatusCode::CONFLICT,
            ),
            (
                LedgerError::IdempotencyConflict(uuid::Uuid::new_v4()),
                StatusCode::CONFLICT,
            ),
            (
                LedgerError::GenerationExhausted { attempts: 5 },
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                LedgerError::StorageFailure("down".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, status) in cases {
            let response = AppError::from(err).into_response();
            assert_eq!(response.status(), status);
        }
    }

    #[test]
    fn test_request_errors_are_bad_request() {
        for err in [
            AppError::InvalidRequest("Invalid amount: x".into()),
            AppError::InvalidHeader {
                name: "idempotency-key",
                reason: "expected a UUID".into(),
            },
        ] {
            assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
        }
    }

    #[test]
    fn test_insufficient_funds_details() {
        let (_, details) = ledger_status(&LedgerError::insufficient_funds(
            "ACC1",
            dec!(100.00),
            dec!(200.00),
        ));
        let details = details.unwrap();
        assert_eq!(details["deficiency"], "100.00");
        assert_eq!(details["current_balance"], "100.00");
    }
}
