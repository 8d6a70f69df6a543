//! Error types for the statement reconciler
//!
//! This module defines all error types that can occur while accepting,
//! decoding, storing and reconciling statements.
//!
//! # Error Categories
//!
//! Every error belongs to one [`ErrorKind`] and carries a stable [`ErrorCode`]
//! that is distinct from its human-readable message:
//!
//! - **Validation**: bad input shape (missing upload id, bad pagination,
//!   malformed statement data)
//! - **Business**: domain-rule violations (duplicate upload, unknown upload)
//! - **Server**: unexpected internal faults (missing collaborators, closed
//!   bus, cancellation, timeouts, I/O)

use std::fmt;
use thiserror::Error;

/// High-level error bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Business,
    Server,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "ERROR_TYPE_VALIDATION",
            ErrorKind::Business => "ERROR_TYPE_BUSINESS",
            ErrorKind::Server => "ERROR_TYPE_SERVER",
        }
    }
}

/// Stable machine-readable error code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    Internal,
    InvalidInput,
    NotFound,
    Conflict,
    Timeout,
    Canceled,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::Internal => "ERROR_CODE_INTERNAL",
            ErrorCode::InvalidInput => "ERROR_CODE_INVALID_INPUT",
            ErrorCode::NotFound => "ERROR_CODE_NOT_FOUND",
            ErrorCode::Conflict => "ERROR_CODE_CONFLICT",
            ErrorCode::Timeout => "ERROR_CODE_TIMEOUT",
            ErrorCode::Canceled => "ERROR_CODE_CANCELED",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Main error type for the statement reconciler
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StatementError {
    /// Caller supplied an unusable argument (empty id, bad pagination, bad filter)
    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    /// Upload identity is unknown
    #[error("Upload {upload_id} not found")]
    UploadNotFound { upload_id: String },

    /// Upload identity is already registered
    #[error("Upload {upload_id} already exists")]
    UploadConflict { upload_id: String },

    /// A required collaborator was not wired in
    #[error("Missing dependency: {name}")]
    MissingDependency { name: String },

    /// A single statement line could not be decoded
    ///
    /// This is a recoverable error - the line is counted and skipped.
    #[error("Statement parse error at line {line}: {message}")]
    ParseError { line: u64, message: String },

    /// The statement container itself could not be decoded
    ///
    /// This is fatal for the upload; results accumulated so far are kept.
    #[error("Statement decode error{}: {message}", line.map(|l| format!(" at line {}", l)).unwrap_or_default())]
    DecodeError { line: Option<u64>, message: String },

    #[error("I/O error: {message}")]
    IoError { message: String },

    /// Publish attempted on a closed event bus
    #[error("Event bus is closed")]
    BusClosed,

    /// The governing cancellation token fired
    #[error("Operation canceled")]
    Canceled,

    #[error("Timed out after {millis}ms waiting for {operation}")]
    Timeout { operation: String, millis: u64 },

    /// A reconciliation handler rejected an event
    #[error("Reconciliation of event '{event_id}' failed: {message}")]
    ReconciliationFailed { event_id: String, message: String },

    #[error("Configuration error: {message}")]
    ConfigError { message: String },
}

impl StatementError {
    /// High-level bucket of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            StatementError::InvalidInput { .. }
            | StatementError::ParseError { .. }
            | StatementError::DecodeError { .. }
            | StatementError::ConfigError { .. } => ErrorKind::Validation,
            StatementError::UploadNotFound { .. } | StatementError::UploadConflict { .. } => {
                ErrorKind::Business
            }
            StatementError::MissingDependency { .. }
            | StatementError::IoError { .. }
            | StatementError::BusClosed
            | StatementError::Canceled
            | StatementError::Timeout { .. }
            | StatementError::ReconciliationFailed { .. } => ErrorKind::Server,
        }
    }

    /// Stable code of this error
    pub fn code(&self) -> ErrorCode {
        match self {
            StatementError::InvalidInput { .. }
            | StatementError::ParseError { .. }
            | StatementError::DecodeError { .. }
            | StatementError::ConfigError { .. } => ErrorCode::InvalidInput,
            StatementError::UploadNotFound { .. } => ErrorCode::NotFound,
            StatementError::UploadConflict { .. } => ErrorCode::Conflict,
            StatementError::Timeout { .. } => ErrorCode::Timeout,
            StatementError::Canceled => ErrorCode::Canceled,
            StatementError::MissingDependency { .. }
            | StatementError::IoError { .. }
            | StatementError::BusClosed
            | StatementError::ReconciliationFailed { .. } => ErrorCode::Internal,
        }
    }
}

// Conversion from io::Error to StatementError
impl From<std::io::Error> for StatementError {
    fn from(error: std::io::Error) -> Self {
        StatementError::IoError {
            message: error.to_string(),
        }
    }
}

// Conversion from csv_async::Error (statement decoding)
impl From<csv_async::Error> for StatementError {
    fn from(error: csv_async::Error) -> Self {
        StatementError::DecodeError {
            line: None,
            message: error.to_string(),
        }
    }
}

// Conversion from csv::Error (report writing)
impl From<csv::Error> for StatementError {
    fn from(error: csv::Error) -> Self {
        StatementError::IoError {
            message: error.to_string(),
        }
    }
}

// Helper functions for creating common errors

impl StatementError {
    /// Create an InvalidInput error
    pub fn invalid_input(message: impl Into<String>) -> Self {
        StatementError::InvalidInput {
            message: message.into(),
        }
    }

    /// Create an UploadNotFound error
    pub fn upload_not_found(upload_id: &str) -> Self {
        StatementError::UploadNotFound {
            upload_id: upload_id.to_string(),
        }
    }

    /// Create an UploadConflict error
    pub fn upload_conflict(upload_id: &str) -> Self {
        StatementError::UploadConflict {
            upload_id: upload_id.to_string(),
        }
    }

    /// Create a MissingDependency error
    pub fn missing_dependency(name: &str) -> Self {
        StatementError::MissingDependency {
            name: name.to_string(),
        }
    }

    /// Create a ParseError for a statement line
    pub fn parse_error(line: u64, message: impl Into<String>) -> Self {
        StatementError::ParseError {
            line,
            message: message.into(),
        }
    }

    /// Create a Timeout error
    pub fn timeout(operation: &str, millis: u64) -> Self {
        StatementError::Timeout {
            operation: operation.to_string(),
            millis,
        }
    }

    /// Create a ReconciliationFailed error
    pub fn reconciliation_failed(event_id: &str, message: impl Into<String>) -> Self {
        StatementError::ReconciliationFailed {
            event_id: event_id.to_string(),
            message: message.into(),
        }
    }
}

/// Aggregate of task failures collected by the task runner
///
/// Displays one error per line, in the order the tasks finished.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{}", self.errors.iter().map(ToString::to_string).collect::<Vec<_>>().join("\n"))]
pub struct TaskErrors {
    pub errors: Vec<StatementError>,
}
