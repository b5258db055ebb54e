//! Remote tree port (driven/secondary port)
//!
//! The interface the sync core needs from the remote object store. An
//! implementation owns the wire protocol, authentication and response
//! parsing; the core only sees [`RemoteEntry`] values and classified
//! [`RemoteError`]s.
//!
//! ## Design Notes
//!
//! - Errors are typed rather than `anyhow` because the reconciliation
//!   driver branches on [`ErrorKind`](crate::domain::errors::ErrorKind).
//! - Upload content is described by an [`UploadSource`] pointing at the
//!   local file; adapters stream it in bounded chunks.

use std::path::PathBuf;

use chrono::{DateTime, Utc};

use crate::domain::errors::RemoteError;
use crate::domain::newtypes::{FileHash, RemotePath};
use crate::domain::remote::{RemoteEntry, RemoteFile};

/// Local content to be sent to the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadSource {
    /// File to stream from
    pub local_path: PathBuf,
    /// Full content length in bytes
    pub size: u64,
    /// MD5 of the full content
    pub hash: FileHash,
    /// Local modification time
    pub modified: DateTime<Utc>,
}

/// Port trait for remote store operations
#[async_trait::async_trait]
pub trait IRemoteTree: Send + Sync {
    /// Looks up a path
    ///
    /// A missing path is `Ok(RemoteEntry::Absent)`, not an error.
    async fn stat(&self, path: &RemotePath) -> Result<RemoteEntry, RemoteError>;

    /// Uploads the full content as a new file or a new revision
    async fn upload(
        &self,
        path: &RemotePath,
        source: &UploadSource,
    ) -> Result<RemoteFile, RemoteError>;

    /// Continues an interrupted upload, sending bytes from `offset` onward
    async fn resume_upload(
        &self,
        path: &RemotePath,
        source: &UploadSource,
        offset: u64,
    ) -> Result<RemoteFile, RemoteError>;

    /// Tombstones a file; returns whether the store reports it deleted
    async fn delete(&self, path: &RemotePath) -> Result<bool, RemoteError>;

    /// Tombstones a folder and, server side, its contents
    async fn delete_folder(&self, path: &RemotePath) -> Result<bool, RemoteError>;
}
