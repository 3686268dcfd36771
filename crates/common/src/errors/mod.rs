//! Error types for PaperVault
//!
//! Provides a comprehensive error handling system with:
//! - Distinct error types for each ingestion failure mode
//! - HTTP status code mapping
//! - Structured error responses
//! - Error codes for client handling

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

/// Error codes for machine-readable error identification
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Validation errors (1xxx)
    ValidationError,
    UnsupportedMediaType,
    PayloadTooLarge,

    // Authentication errors (2xxx)
    Unauthorized,
    InvalidCredentials,
    ExpiredToken,

    // Resource errors (4xxx)
    NotFound,

    // Conflict errors (5xxx)
    Conflict,
    DuplicateFilename,

    // Rate limiting (6xxx)
    RateLimited,

    // Storage errors (7xxx)
    DatabaseError,
    PersistenceError,
    StorageWriteError,
    CompensationFailure,

    // Internal errors (9xxx)
    InternalError,
    ConfigurationError,
}

impl ErrorCode {
    /// Get the numeric code for this error
    pub fn as_code(&self) -> u16 {
        match self {
            ErrorCode::ValidationError => 1001,
            ErrorCode::UnsupportedMediaType => 1002,
            ErrorCode::PayloadTooLarge => 1003,

            ErrorCode::Unauthorized => 2001,
            ErrorCode::InvalidCredentials => 2002,
            ErrorCode::ExpiredToken => 2003,

            ErrorCode::NotFound => 4001,

            ErrorCode::Conflict => 5001,
            ErrorCode::DuplicateFilename => 5002,

            ErrorCode::RateLimited => 6001,

            ErrorCode::DatabaseError => 7001,
            ErrorCode::PersistenceError => 7002,
            ErrorCode::StorageWriteError => 7003,
            ErrorCode::CompensationFailure => 7004,

            ErrorCode::InternalError => 9001,
            ErrorCode::ConfigurationError => 9002,
        }
    }
}

/// Why the metadata store refused a record
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PersistenceFailure {
    /// The generated filename is already taken
    DuplicateFilename,
    /// Any other schema constraint (NOT NULL, foreign key, ...)
    ConstraintViolation,
    /// Connectivity or backend failure
    Backend,
}

impl fmt::Display for PersistenceFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            PersistenceFailure::DuplicateFilename => "duplicate filename",
            PersistenceFailure::ConstraintViolation => "constraint violation",
            PersistenceFailure::Backend => "backend failure",
        };
        f.write_str(label)
    }
}

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Validation errors
    #[error("Validation failed: {message}")]
    Validation {
        message: String,
        field: Option<String>,
    },

    #[error("Unsupported media type: {filename} (only PDF files are accepted)")]
    UnsupportedMediaType { filename: String },

    #[error("Payload too large: request body exceeds limit of {limit} bytes")]
    PayloadTooLarge { limit: usize },

    // Authentication errors
    #[error("Unauthorized: {message}")]
    Unauthorized { message: String },

    #[error("Invalid username or password")]
    InvalidCredentials,

    #[error("Token expired")]
    ExpiredToken,

    // Resource errors
    #[error("Resource not found: {resource_type} {id}")]
    NotFound { resource_type: String, id: String },

    // Conflict errors
    #[error("Duplicate resource: {message}")]
    Duplicate { message: String },

    // Rate limiting
    #[error("Rate limit exceeded: {limit} requests per second")]
    RateLimited { limit: u32 },

    // Storage errors
    #[error("File store write failed: {message}")]
    StorageWrite { message: String },

    #[error("Persistence failed ({kind}): {message}")]
    Persistence {
        kind: PersistenceFailure,
        message: String,
    },

    #[error("Compensating delete of {filename} failed: {message}")]
    CompensationFailure { filename: String, message: String },

    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    // Internal errors
    #[error("Internal server error: {message}")]
    Internal { message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    // Generic
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl AppError {
    /// Shorthand for a validation error tied to one field
    pub fn invalid_field(field: &str, message: impl Into<String>) -> Self {
        AppError::Validation {
            message: message.into(),
            field: Some(field.to_string()),
        }
    }

    /// Get the error code for this error
    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::Validation { .. } => ErrorCode::ValidationError,
            AppError::UnsupportedMediaType { .. } => ErrorCode::UnsupportedMediaType,
            AppError::PayloadTooLarge { .. } => ErrorCode::PayloadTooLarge,
            AppError::Unauthorized { .. } => ErrorCode::Unauthorized,
            AppError::InvalidCredentials => ErrorCode::InvalidCredentials,
            AppError::ExpiredToken => ErrorCode::ExpiredToken,
            AppError::NotFound { .. } => ErrorCode::NotFound,
            AppError::Duplicate { .. } => ErrorCode::Conflict,
            AppError::RateLimited { .. } => ErrorCode::RateLimited,
            AppError::StorageWrite { .. } => ErrorCode::StorageWriteError,
            AppError::Persistence {
                kind: PersistenceFailure::DuplicateFilename,
                ..
            } => ErrorCode::DuplicateFilename,
            AppError::Persistence { .. } => ErrorCode::PersistenceError,
            AppError::CompensationFailure { .. } => ErrorCode::CompensationFailure,
            AppError::Database(_) => ErrorCode::DatabaseError,
            AppError::Internal { .. } => ErrorCode::InternalError,
            AppError::Configuration { .. } => ErrorCode::ConfigurationError,
            AppError::Other(_) => ErrorCode::InternalError,
        }
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            // 400 Bad Request
            AppError::Validation { .. } => StatusCode::BAD_REQUEST,

            // 401 Unauthorized
            AppError::Unauthorized { .. }
            | AppError::InvalidCredentials
            | AppError::ExpiredToken => StatusCode::UNAUTHORIZED,

            // 404 Not Found
            AppError::NotFound { .. } => StatusCode::NOT_FOUND,

            // 409 Conflict
            AppError::Duplicate { .. }
            | AppError::Persistence {
                kind: PersistenceFailure::DuplicateFilename,
                ..
            } => StatusCode::CONFLICT,

            // 413 Payload Too Large
            AppError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,

            // 415 Unsupported Media Type
            AppError::UnsupportedMediaType { .. } => StatusCode::UNSUPPORTED_MEDIA_TYPE,

            // 429 Too Many Requests
            AppError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,

            // 500 Internal Server Error
            AppError::StorageWrite { .. }
            | AppError::Persistence { .. }
            | AppError::CompensationFailure { .. }
            | AppError::Database(_)
            | AppError::Internal { .. }
            | AppError::Configuration { .. }
            | AppError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// True for the persistence family (store refused the record)
    pub fn is_persistence(&self) -> bool {
        matches!(self, AppError::Persistence { .. })
    }

    /// Check if this error should be logged at error level
    pub fn is_server_error(&self) -> bool {
        self.status_code().is_server_error()
    }

    /// Check if this error is a client error
    pub fn is_client_error(&self) -> bool {
        self.status_code().is_client_error()
    }
}

/// Structured error response for API
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorDetails,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetails {
    pub code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.code();
        let message = self.to_string();

        // Log based on severity
        if self.is_server_error() {
            tracing::error!(
                error = %message,
                code = ?code,
                status = status.as_u16(),
                "Server error"
            );
        } else if self.is_client_error() {
            tracing::warn!(
                error = %message,
                code = ?code,
                status = status.as_u16(),
                "Client error"
            );
        }

        let details = match &self {
            AppError::Validation {
                field: Some(field), ..
            } => Some(serde_json::json!({ "field": field })),
            AppError::Persistence { kind, .. } => Some(serde_json::json!({ "kind": kind })),
            _ => None,
        };

        let body = ErrorResponse {
            error: ErrorDetails {
                code,
                message,
                details,
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Internal {
            message: err.to_string(),
        }
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Configuration {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_mapping() {
        let err = AppError::NotFound {
            resource_type: "file".into(),
            id: "x.pdf".into(),
        };
        assert_eq!(err.code(), ErrorCode::NotFound);
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_validation_error() {
        let err = AppError::invalid_field("exam_year", "Expected 4-digit year");
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert!(!err.is_server_error());
        assert!(err.is_client_error());
    }

    #[test]
    fn test_unsupported_media_type() {
        let err = AppError::UnsupportedMediaType {
            filename: "notes.docx".into(),
        };
        assert_eq!(err.status_code(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
        assert_eq!(err.code().as_code(), 1002);
    }

    #[test]
    fn test_persistence_kinds() {
        let duplicate = AppError::Persistence {
            kind: PersistenceFailure::DuplicateFilename,
            message: "taken".into(),
        };
        assert!(duplicate.is_persistence());
        assert_eq!(duplicate.code(), ErrorCode::DuplicateFilename);
        assert_eq!(duplicate.status_code(), StatusCode::CONFLICT);

        let backend = AppError::Persistence {
            kind: PersistenceFailure::Backend,
            message: "pool closed".into(),
        };
        assert_eq!(backend.code(), ErrorCode::PersistenceError);
        assert!(backend.is_server_error());
    }

    #[test]
    fn test_storage_errors_are_server_errors() {
        let err = AppError::StorageWrite {
            message: "disk full".into(),
        };
        assert!(err.is_server_error());
        assert!(!err.is_persistence());
    }
}
