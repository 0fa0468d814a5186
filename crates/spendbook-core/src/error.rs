//! Error types for spendbook-core
//!
//! Services report [`ServiceError`]s with a code and a severity. List
//! controllers see a single failure kind, [`FetchError`], whatever the
//! underlying cause. Editors reject invalid input with [`FormError`].

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error codes for programmatic error handling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Record not found
    NotFound,
    /// Rejected input
    ValidationError,
    /// Backend answered with a failure
    BackendError,
    /// Backend could not be reached
    Unavailable,
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorCode::NotFound => write!(f, "NOT_FOUND"),
            ErrorCode::ValidationError => write!(f, "VALIDATION_ERROR"),
            ErrorCode::BackendError => write!(f, "BACKEND_ERROR"),
            ErrorCode::Unavailable => write!(f, "UNAVAILABLE"),
        }
    }
}

/// Error severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorSeverity {
    /// Informational
    Info,
    /// Operation may be retried by the user
    Warning,
    /// Operation failed
    Error,
}

impl std::fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorSeverity::Info => write!(f, "info"),
            ErrorSeverity::Warning => write!(f, "warning"),
            ErrorSeverity::Error => write!(f, "error"),
        }
    }
}

/// Failure of a category or expense service call
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ServiceError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Backend error: {message}")]
    Backend { message: String },

    #[error("Backend unavailable")]
    Unavailable,
}

impl ServiceError {
    /// Get the error code
    pub fn code(&self) -> ErrorCode {
        match self {
            ServiceError::NotFound { .. } => ErrorCode::NotFound,
            ServiceError::Validation { .. } => ErrorCode::ValidationError,
            ServiceError::Backend { .. } => ErrorCode::BackendError,
            ServiceError::Unavailable => ErrorCode::Unavailable,
        }
    }

    /// Get the severity level
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            ServiceError::NotFound { .. } => ErrorSeverity::Info,
            ServiceError::Validation { .. } => ErrorSeverity::Warning,
            ServiceError::Backend { .. } => ErrorSeverity::Error,
            ServiceError::Unavailable => ErrorSeverity::Error,
        }
    }

    pub fn not_found(entity: &str, id: &str) -> Self {
        ServiceError::NotFound {
            entity: entity.to_string(),
            id: id.to_string(),
        }
    }
}

/// Result type with ServiceError
pub type ServiceResult<T> = Result<T, ServiceError>;

/// Failure of a page fetch. The list controller does not distinguish causes.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{message}")]
pub struct FetchError {
    pub message: String,
    #[source]
    pub cause: Option<ServiceError>,
}

impl FetchError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            cause: None,
        }
    }
}

impl From<ServiceError> for FetchError {
    fn from(err: ServiceError) -> Self {
        Self {
            message: err.to_string(),
            cause: Some(err),
        }
    }
}

/// Rejected form input
#[derive(Error, Debug, Clone, PartialEq)]
#[error("Invalid {field}: {reason}")]
pub struct FormError {
    pub field: String,
    pub reason: String,
}

impl FormError {
    pub fn new(field: &str, reason: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<FormError> for ServiceError {
    fn from(err: FormError) -> Self {
        ServiceError::Validation {
            message: err.to_string(),
        }
    }
}
