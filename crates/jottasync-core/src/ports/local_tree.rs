//! Local tree port (driven/secondary port)
//!
//! Everything the differencer and the driver read from the local disk goes
//! through [`ILocalTree`]. Names are decoded to Unicode at this boundary;
//! paths stay in their literal on-disk form.

use std::path::{Path, PathBuf};

use crate::domain::errors::SyncError;
use crate::domain::newtypes::FileHash;

use super::fingerprint::FileStamp;

/// One immediate child of a listed directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalEntry {
    /// Decoded, NFC-normalized name used for comparison
    pub name: String,
    /// Literal on-disk path
    pub path: PathBuf,
    /// Whether the entry itself is a symbolic link
    pub is_symlink: bool,
}

/// Immediate children of a directory, split by type
///
/// Symlinks to directories appear in `dirs`; dangling symlinks and symlinks
/// to files appear in `files`. Other special files are omitted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocalDirListing {
    pub files: Vec<LocalEntry>,
    pub dirs: Vec<LocalEntry>,
}

/// Resolution of a path that may be a symbolic link
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkStatus {
    /// A regular entry
    NotALink,
    /// A link whose target exists
    Target(PathBuf),
    /// A link whose target cannot be resolved
    Dangling,
}

/// Port trait for local filesystem reads
#[async_trait::async_trait]
pub trait ILocalTree: Send + Sync {
    /// Lists the immediate children of `dir`
    async fn list_dir(&self, dir: &Path) -> Result<LocalDirListing, SyncError>;

    /// Size and modification time of a file (links followed)
    async fn stat(&self, path: &Path) -> Result<FileStamp, SyncError>;

    /// Resolves `path` if it is a symbolic link
    async fn link_status(&self, path: &Path) -> Result<LinkStatus, SyncError>;

    /// Absolute path with every link resolved
    async fn canonicalize(&self, path: &Path) -> Result<PathBuf, SyncError>;

    /// Streaming MD5 of the full file content
    async fn compute_hash(&self, path: &Path) -> Result<FileHash, SyncError>;
}
