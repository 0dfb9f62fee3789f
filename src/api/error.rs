//! Mapping of store and domain failures onto HTTP status codes and the
//! `{"error": {...}, "request_id": ...}` body

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::buckets::BucketError;
use crate::domain::ValidationError;
use crate::import::ImportError;
use crate::report::ReportError;
use crate::tables::TableError;
use crate::vault::VaultError;

#[derive(Error, Debug)]
pub enum ApiError {
    /// Record failed required-field or value validation
    #[error("Validation error: {0}")]
    Validation(ValidationError),

    /// Malformed request (bad query parameter, unknown format, ...)
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Missing or wrong bearer token
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    #[error("Vault error: {0}")]
    Vault(#[from] VaultError),

    #[error("Table error: {0}")]
    Table(TableError),

    #[error("Bucket error: {0}")]
    Bucket(BucketError),

    #[error("Report error: {0}")]
    Report(#[from] ReportError),

    #[error("Import error: {0}")]
    Import(#[from] ImportError),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        ApiError::Validation(err)
    }
}

impl From<TableError> for ApiError {
    fn from(err: TableError) -> Self {
        match err {
            TableError::NotFound { table, id } => {
                ApiError::NotFound(format!("Record {} not found in {}", id, table))
            }
            TableError::Conflict { table, id } => {
                ApiError::Conflict(format!("Record {} already exists in {}", id, table))
            }
            TableError::InvalidRow(msg) => ApiError::BadRequest(msg),
            other => ApiError::Table(other),
        }
    }
}

impl From<BucketError> for ApiError {
    fn from(err: BucketError) -> Self {
        match err {
            BucketError::UnknownBucket(name) => {
                ApiError::NotFound(format!("Bucket '{}' does not exist", name))
            }
            BucketError::NotFound(path) => {
                ApiError::NotFound(format!("Object '{}' does not exist", path))
            }
            BucketError::InvalidPath(path) => {
                ApiError::BadRequest(format!("Invalid object path: {}", path))
            }
            BucketError::TooLarge { size, limit } => ApiError::PayloadTooLarge(format!(
                "{} bytes exceeds the {} byte object limit",
                size, limit
            )),
            other => ApiError::Bucket(other),
        }
    }
}

/// Error response body
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
    pub request_id: String,
}

/// Error details
#[derive(Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::Validation(_) => (StatusCode::UNPROCESSABLE_ENTITY, "VALIDATION_ERROR"),
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            ApiError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            ApiError::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
            ApiError::PayloadTooLarge(_) => (StatusCode::PAYLOAD_TOO_LARGE, "PAYLOAD_TOO_LARGE"),
            ApiError::Vault(e) => match e {
                VaultError::InvalidKey(_) => (StatusCode::BAD_REQUEST, "INVALID_KEY"),
                VaultError::KeyNotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
                VaultError::QuotaExceeded { .. } => {
                    (StatusCode::PAYLOAD_TOO_LARGE, "QUOTA_EXCEEDED")
                }
                _ => (StatusCode::INTERNAL_SERVER_ERROR, "STORAGE_ERROR"),
            },
            ApiError::Table(_) => (StatusCode::INTERNAL_SERVER_ERROR, "TABLE_ERROR"),
            ApiError::Bucket(_) => (StatusCode::INTERNAL_SERVER_ERROR, "BUCKET_ERROR"),
            ApiError::Report(ReportError::UnknownFormat(_)) => {
                (StatusCode::BAD_REQUEST, "UNKNOWN_FORMAT")
            }
            ApiError::Report(_) => (StatusCode::INTERNAL_SERVER_ERROR, "REPORT_ERROR"),
            ApiError::Import(_) => (StatusCode::BAD_REQUEST, "IMPORT_ERROR"),
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
            ApiError::Io(_) => (StatusCode::INTERNAL_SERVER_ERROR, "IO_ERROR"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        let request_id = uuid::Uuid::new_v4().to_string();

        if status.is_server_error() {
            tracing::error!(
                request_id = %request_id,
                error_code = %code,
                error_message = %self,
                "API error occurred"
            );
        } else {
            tracing::debug!(
                request_id = %request_id,
                error_code = %code,
                error_message = %self,
                "Request rejected"
            );
        }

        let details = match &self {
            ApiError::Validation(v) => serde_json::to_value(v).ok(),
            _ => None,
        };

        let body = ErrorResponse {
            error: ErrorBody {
                code: code.to_string(),
                message: self.to_string(),
                details,
            },
            request_id,
        };

        (status, Json(body)).into_response()
    }
}

/// Result type for API operations
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_not_found_maps_to_404() {
        let err: ApiError = TableError::NotFound {
            table: "clients".to_string(),
            id: "x".to_string(),
        }
        .into();
        assert_eq!(err.status_and_code().0, StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_bucket_errors() {
        let err: ApiError = BucketError::InvalidPath("../etc".to_string()).into();
        assert_eq!(err.status_and_code(), (StatusCode::BAD_REQUEST, "BAD_REQUEST"));

        let err: ApiError = BucketError::TooLarge { size: 10, limit: 5 }.into();
        assert_eq!(err.status_and_code().0, StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[test]
    fn test_validation_status() {
        let mut v = ValidationError::default();
        v.missing.push("email".to_string());
        let err = ApiError::from(v);
        assert_eq!(
            err.status_and_code(),
            (StatusCode::UNPROCESSABLE_ENTITY, "VALIDATION_ERROR")
        );
    }
}
