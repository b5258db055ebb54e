//! Domain error types
//!
//! This module defines the validation errors raised by domain newtypes and
//! the error taxonomy shared by the differencer, the reconciliation driver
//! and every remote adapter.

use std::fmt::{self, Display, Formatter};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur while constructing or validating domain values
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A local path is not contained in the tree it is being translated from
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// Invalid remote path format
    #[error("Invalid remote path: {0}")]
    InvalidRemotePath(String),

    /// Invalid hash format (expected 32 hex digits of MD5)
    #[error("Invalid hash format: {0}")]
    InvalidHash(String),

    /// An exclusion pattern did not compile
    #[error("Invalid exclusion pattern: {0}")]
    InvalidPattern(String),

    /// Generic validation failure
    #[error("Validation failed: {0}")]
    ValidationFailed(String),
}

// ============================================================================
// Error taxonomy
// ============================================================================

/// Classification of every failure the sync core can observe
///
/// The first six kinds mirror the HTTP failures of the remote store; the
/// rest are raised by the core itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The remote entity does not exist (HTTP 404)
    NotFound,
    /// Credentials were rejected (HTTP 401)
    Unauthorized,
    /// Access to the entity is not allowed (HTTP 403)
    Forbidden,
    /// Requested range not satisfiable (HTTP 416)
    RangeInvalid,
    /// Server-side failure (HTTP 5xx); the only retryable kind
    ServerError,
    /// The request was malformed (HTTP 400)
    BadRequest,
    /// The local file does not match the hash of an incomplete upload
    HashMismatch,
    /// The remote path exists but is not a folder
    PathMismatch,
    /// Local I/O failed
    FilesystemError,
    /// The run was interrupted before the action started
    Cancelled,
    /// Any remote failure outside the taxonomy above
    Other,
}

impl ErrorKind {
    /// Stable lowercase name, as used in reports and the error file
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::Unauthorized => "unauthorized",
            Self::Forbidden => "forbidden",
            Self::RangeInvalid => "range_invalid",
            Self::ServerError => "server_error",
            Self::BadRequest => "bad_request",
            Self::HashMismatch => "hash_mismatch",
            Self::PathMismatch => "path_mismatch",
            Self::FilesystemError => "filesystem_error",
            Self::Cancelled => "cancelled",
            Self::Other => "other",
        }
    }

    /// Maps an HTTP status code onto the taxonomy
    #[must_use]
    pub fn from_http_status(status: u16) -> Self {
        match status {
            400 => Self::BadRequest,
            401 => Self::Unauthorized,
            403 => Self::Forbidden,
            404 => Self::NotFound,
            416 => Self::RangeInvalid,
            500..=599 => Self::ServerError,
            _ => Self::Other,
        }
    }

    /// Whether an operation failing with this kind may succeed when repeated
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::ServerError)
    }
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure reported by a Remote Tree Accessor
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{kind} on {path}: {message}")]
pub struct RemoteError {
    /// Classification of the failure
    pub kind: ErrorKind,
    /// Remote path the request targeted
    pub path: String,
    /// Server or transport message
    pub message: String,
}

impl RemoteError {
    /// Creates a new remote error
    pub fn new(kind: ErrorKind, path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Failure raised while diffing or reconciling a single path
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{kind} on {path}: {message}")]
pub struct SyncError {
    /// Classification of the failure
    pub kind: ErrorKind,
    /// Local or remote path the failure belongs to
    pub path: String,
    /// Human-readable explanation
    pub message: String,
}

impl SyncError {
    /// Creates a new sync error
    pub fn new(kind: ErrorKind, path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            path: path.into(),
            message: message.into(),
        }
    }

    /// Wraps a local I/O failure
    pub fn filesystem(path: impl Into<String>, err: &std::io::Error) -> Self {
        Self::new(ErrorKind::FilesystemError, path, err.to_string())
    }

    /// The remote path exists but is not a folder
    pub fn path_mismatch(path: impl Into<String>, found: &str) -> Self {
        Self::new(
            ErrorKind::PathMismatch,
            path,
            format!("expected a folder, found {found}"),
        )
    }

    /// The local file differs from the one an incomplete upload was started with
    pub fn hash_mismatch(path: impl Into<String>, expected: &str, actual: &str) -> Self {
        Self::new(
            ErrorKind::HashMismatch,
            path,
            format!("MD5 hashes don't match (remote {expected}, local {actual}); refusing to resume"),
        )
    }
}

impl From<RemoteError> for SyncError {
    fn from(err: RemoteError) -> Self {
        Self {
            kind: err.kind,
            path: err.path,
            message: err.message,
        }
    }
}
