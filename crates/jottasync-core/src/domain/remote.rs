//! Remote entity model
//!
//! A remote stat resolves to exactly one [`RemoteEntry`] variant, decided
//! once when the response is parsed. Use sites match exhaustively instead of
//! probing the entity for capabilities.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::newtypes::FileHash;

/// Result of looking up a remote path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteEntry {
    /// Nothing exists at the path
    Absent,
    /// A regular folder
    Folder(RemoteFolder),
    /// A file with its revision state
    File(RemoteFile),
    /// A device; its mount points are listed as child folders
    Device(RemoteFolder),
    /// A mount point (top-level folder of a device)
    MountPoint(RemoteFolder),
}

impl RemoteEntry {
    /// Returns the child listing for every folder-like variant
    #[must_use]
    pub fn as_container(&self) -> Option<&RemoteFolder> {
        match self {
            Self::Folder(folder) | Self::Device(folder) | Self::MountPoint(folder) => Some(folder),
            Self::Absent | Self::File(_) => None,
        }
    }

    /// Short name of the variant, used in mismatch diagnostics
    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Absent => "nothing",
            Self::Folder(_) => "folder",
            Self::File(_) => "file",
            Self::Device(_) => "device",
            Self::MountPoint(_) => "mount point",
        }
    }
}

/// Whether a child entry is a file or a folder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChildKind {
    File,
    Folder,
}

/// One entry of a folder listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteChild {
    /// Entry name as reported by the store
    pub name: String,
    /// File or folder
    pub kind: ChildKind,
    /// Soft-deleted (tombstoned) entries are still listed by the store
    pub deleted: bool,
}

impl RemoteChild {
    pub fn file(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: ChildKind::File,
            deleted: false,
        }
    }

    pub fn folder(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: ChildKind::Folder,
            deleted: false,
        }
    }

    #[must_use]
    pub fn tombstoned(mut self) -> Self {
        self.deleted = true;
        self
    }
}

/// Listing of a folder-like remote entity
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteFolder {
    /// Folder name
    pub name: String,
    /// Whether the folder itself is tombstoned
    pub deleted: bool,
    /// Immediate children, tombstones included
    pub children: Vec<RemoteChild>,
}

impl RemoteFolder {
    /// Creates an empty, live folder listing
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            deleted: false,
            children: Vec::new(),
        }
    }

    /// Builder-style helper to append a child
    #[must_use]
    pub fn with_child(mut self, child: RemoteChild) -> Self {
        self.children.push(child);
        self
    }

    /// Names of live (not tombstoned) child files
    #[must_use]
    pub fn live_file_names(&self) -> BTreeSet<&str> {
        self.live_names(ChildKind::File)
    }

    /// Names of live (not tombstoned) child folders
    #[must_use]
    pub fn live_folder_names(&self) -> BTreeSet<&str> {
        self.live_names(ChildKind::Folder)
    }

    fn live_names(&self, kind: ChildKind) -> BTreeSet<&str> {
        self.children
            .iter()
            .filter(|c| c.kind == kind && !c.deleted)
            .map(|c| c.name.as_str())
            .collect()
    }
}

/// Revision state of a remote file
///
/// Only `Completed` guarantees a hash. An `Incomplete` upload usually
/// records the hash of the content it was started with, and the number of
/// bytes the store has received so far.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteFileState {
    /// The latest revision was fully uploaded
    Completed { hash: FileHash },
    /// An upload was interrupted before reaching its declared size
    Incomplete {
        hash: Option<FileHash>,
        uploaded_bytes: u64,
    },
    /// The store flagged the revision as corrupt
    Corrupt { hash: Option<FileHash> },
    /// The file is tombstoned
    Deleted,
}

impl RemoteFileState {
    /// Short name of the state, as written by the store
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Completed { .. } => "COMPLETED",
            Self::Incomplete { .. } => "INCOMPLETE",
            Self::Corrupt { .. } => "CORRUPT",
            Self::Deleted => "DELETED",
        }
    }
}

/// A remote file with its latest revision
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFile {
    /// File name
    pub name: String,
    /// Revision state
    pub state: RemoteFileState,
    /// Size of the revision in bytes, when reported
    pub size: Option<u64>,
    /// Content modification time recorded with the revision
    pub modified: Option<DateTime<Utc>>,
}

impl RemoteFile {
    /// The recorded content hash, if the state carries one
    #[must_use]
    pub fn hash(&self) -> Option<&FileHash> {
        match &self.state {
            RemoteFileState::Completed { hash } => Some(hash),
            RemoteFileState::Incomplete { hash, .. } | RemoteFileState::Corrupt { hash } => {
                hash.as_ref()
            }
            RemoteFileState::Deleted => None,
        }
    }
}
