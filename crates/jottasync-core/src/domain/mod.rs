//! Domain entities
//!
//! This module contains the core domain types for jottasync:
//! - Newtypes for validated remote paths and content hashes
//! - The remote entity model (folders, files, devices, mount points)
//! - Per-directory diff results
//! - Run summaries
//! - Domain-specific error types

pub mod diff;
pub mod errors;
pub mod newtypes;
pub mod remote;
pub mod report;

// Re-export commonly used types
pub use diff::{ActionKind, DirectoryDiff, SyncFile};
pub use errors::{DomainError, ErrorKind, RemoteError, SyncError};
pub use newtypes::*;
pub use remote::{RemoteChild, RemoteEntry, RemoteFile, RemoteFileState, RemoteFolder};
pub use report::{Failure, SummaryReport};
