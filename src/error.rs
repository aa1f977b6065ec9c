use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::domain::DomainError;
use crate::ports::RepositoryError;

/// Failures of a ledger call itself. Business outcomes such as insufficient
/// funds are not errors; they end up on the transaction record.
#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Could not allocate a free transaction id after {0} attempts")]
    IdAllocation(usize),

    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("Repository error: {0}")]
    Repository(RepositoryError),
}

impl From<RepositoryError> for LedgerError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound(what) => LedgerError::NotFound(what),
            other => LedgerError::Repository(other),
        }
    }
}

impl From<crate::validation::ValidationError> for LedgerError {
    fn from(err: crate::validation::ValidationError) -> Self {
        LedgerError::Validation(err.to_string())
    }
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),
}

impl AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
        }
    }
}

impl From<LedgerError> for AppError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::Validation(msg) => AppError::Validation(msg),
            LedgerError::NotFound(what) => AppError::NotFound(what),
            LedgerError::Domain(e @ DomainError::InvalidTransition { .. }) => {
                AppError::Conflict(e.to_string())
            }
            LedgerError::Domain(e) => AppError::Validation(e.to_string()),
            LedgerError::Repository(RepositoryError::Conflict(msg)) => AppError::Conflict(msg),
            other => AppError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        }
        let body = Json(json!({
            "error": self.to_string(),
            "status": status.as_u16(),
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_status_code() {
        let error = AppError::Validation("Invalid input".to_string());
        assert_eq!(error.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_not_found_error_status_code() {
        let error = AppError::NotFound("Resource not found".to_string());
        assert_eq!(error.status_code(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_unauthorized_error_status_code() {
        let error = AppError::Unauthorized("missing x-user-id".to_string());
        assert_eq!(error.status_code(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_repository_not_found_becomes_ledger_not_found() {
        let err = LedgerError::from(RepositoryError::NotFound("tx-1".to_string()));
        assert!(matches!(err, LedgerError::NotFound(ref id) if id == "tx-1"));
    }

    #[test]
    fn test_invalid_transition_maps_to_conflict() {
        let err = LedgerError::Domain(DomainError::InvalidTransition {
            from: crate::domain::TransactionState::Success,
            to: crate::domain::TransactionState::Cancel,
        });
        assert_eq!(AppError::from(err).status_code(), StatusCode::CONFLICT);
    }

    #[test]
    fn test_store_failure_maps_to_internal() {
        let err = LedgerError::Repository(RepositoryError::Database("timeout".to_string()));
        assert_eq!(
            AppError::from(err).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn test_not_found_error_response() {
        let error = AppError::NotFound("Transaction not found".to_string());
        let response = error.into_response();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_internal_error_response() {
        let error = AppError::Internal("Something went wrong".to_string());
        let response = error.into_response();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
