//! Unified error handling for the store server.
//!
//! Classification follows one rule: validation failures and lost stock
//! races are client-caused (the order cannot be fulfilled right now);
//! unexpected storage failures are server-caused and never leak detail.
//! Notification failures never appear here at all; they are swallowed at
//! the dispatch boundary and live in the ledger.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::db::RepositoryError;
use crate::services::checkout::{CheckoutError, LineRejection, StatusUpdateError};
use crate::services::notifications::RetryError;

/// Application-level error type for the store server.
#[derive(Debug, Error)]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Checkout was rejected; carries the offending line and reason.
    #[error("Checkout rejected: {0}")]
    CheckoutRejected(LineRejection),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Request conflicts with current state (e.g., an illegal transition).
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<CheckoutError> for AppError {
    fn from(e: CheckoutError) -> Self {
        match e {
            CheckoutError::Rejected(rejection) => Self::CheckoutRejected(rejection),
            CheckoutError::EmptyOrder => {
                Self::BadRequest("checkout requires at least one line item".to_string())
            }
            CheckoutError::Storage(e) => Self::Database(e),
        }
    }
}

impl From<StatusUpdateError> for AppError {
    fn from(e: StatusUpdateError) -> Self {
        match e {
            StatusUpdateError::NotFound(id) => Self::NotFound(format!("order {id}")),
            StatusUpdateError::InvalidTransition { .. } | StatusUpdateError::Conflict(_) => {
                Self::Conflict(e.to_string())
            }
            StatusUpdateError::Storage(e) => Self::Database(e),
        }
    }
}

impl From<RetryError> for AppError {
    fn from(e: RetryError) -> Self {
        match e {
            RetryError::AttemptNotFound(id) => Self::NotFound(format!("notification attempt {id}")),
            RetryError::OrderMissing(_) => Self::NotFound(e.to_string()),
            RetryError::NotRetryable { .. } => Self::Conflict(e.to_string()),
            RetryError::Storage(e) => Self::Database(e),
        }
    }
}

/// JSON error body returned to clients.
#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    rejection: Option<LineRejection>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Log server errors with Sentry
        if matches!(self, Self::Database(_) | Self::Internal(_)) {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Store request error"
            );
        }

        let status = match &self {
            Self::Database(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::CheckoutRejected(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
        };

        // Don't expose internal error details to clients
        let body = match self {
            Self::Database(_) | Self::Internal(_) => ErrorBody {
                error: "Internal server error".to_string(),
                rejection: None,
            },
            Self::CheckoutRejected(rejection) => ErrorBody {
                error: rejection.to_string(),
                rejection: Some(rejection),
            },
            other => ErrorBody {
                error: other.to_string(),
                rejection: None,
            },
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use mercadito_core::ProductId;

    use super::*;
    use crate::services::checkout::RejectReason;

    fn get_status(err: AppError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn test_app_error_status_codes() {
        assert_eq!(
            get_status(AppError::NotFound("order 1".to_string())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(AppError::Conflict("bad transition".to_string())),
            StatusCode::CONFLICT
        );
        assert_eq!(
            get_status(AppError::BadRequest("nope".to_string())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(AppError::Internal("boom".to_string())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_checkout_rejection_is_client_class() {
        let rejection = LineRejection {
            line: 1,
            product_id: ProductId::new(9),
            reason: RejectReason::InsufficientStock,
        };
        assert_eq!(
            get_status(AppError::CheckoutRejected(rejection)),
            StatusCode::UNPROCESSABLE_ENTITY
        );
    }

    #[test]
    fn test_database_errors_are_opaque() {
        let err = AppError::Database(RepositoryError::DataCorruption("secret detail".to_string()));
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
