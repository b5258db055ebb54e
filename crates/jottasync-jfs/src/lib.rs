//! jottasync JFS - JottaCloud file system adapter
//!
//! Implements the `IRemoteTree` port against the JFS HTTP API:
//! - Metadata lookups that parse XML listings into the `RemoteEntry` variants
//! - Streaming multipart uploads, fresh or resumed from an offset
//! - File and folder deletion (tombstoning)
//!
//! ## Modules
//!
//! - [`client`] - Authenticated HTTP client and URL construction
//! - [`request`] - Pure request-building helpers (headers, multipart framing)
//! - [`xml`] - Response parsing
//! - [`provider`] - `IRemoteTree` implementation

pub mod client;
pub mod provider;
pub mod request;
pub mod xml;

use jottasync_core::domain::{ErrorKind, RemoteError};
use thiserror::Error;

pub use client::{Credentials, JfsClient};
pub use provider::JfsRemoteTree;

/// Errors that can occur when talking to the JFS API
#[derive(Debug, Error)]
pub enum JfsError {
    /// The server answered with a non-success status
    #[error("HTTP {status}: {message}")]
    Status {
        /// HTTP status code (or the `<code>` of an `<error>` document)
        status: u16,
        /// Server-provided message
        message: String,
    },

    /// A network-level error occurred
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The response body could not be parsed
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// The local file being uploaded could not be read
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// No username or password was supplied
    #[error("Missing credentials: {0}")]
    MissingCredentials(String),

    /// A request URL could not be built
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

impl JfsError {
    /// Classifies the error into the shared taxonomy
    ///
    /// Connection failures and timeouts count as server errors so they are
    /// retried like a 5xx.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Status { status, .. } => ErrorKind::from_http_status(*status),
            Self::Network(e) if e.is_timeout() || e.is_connect() => ErrorKind::ServerError,
            Self::Network(e) => match e.status() {
                Some(status) => ErrorKind::from_http_status(status.as_u16()),
                None => ErrorKind::Other,
            },
            Self::Io(_) => ErrorKind::FilesystemError,
            Self::InvalidResponse(_) | Self::MissingCredentials(_) | Self::InvalidUrl(_) => {
                ErrorKind::Other
            }
        }
    }

    /// Converts into the port-level error for `path`
    #[must_use]
    pub fn into_remote(self, path: &str) -> RemoteError {
        let kind = self.kind();
        RemoteError::new(kind, path, self.to_string())
    }
}
