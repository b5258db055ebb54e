//! Per-directory comparison results
//!
//! [`DirectoryDiff::partition`] is the set arithmetic at the heart of the
//! tree differencer: given the (already filtered and normalized) names on
//! both sides of one directory, it produces four disjoint buckets of
//! [`SyncFile`]s in name order.
//!
//! Files and folders are partitioned separately, so a local file may share
//! its name with a remote-only folder. The driver removes such a folder
//! before uploading the file.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{self, Display, Formatter};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::errors::DomainError;
use super::newtypes::RemotePath;

/// Two-sided identity of one file or folder
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncFile {
    /// Literal on-disk path (may not exist for remote-only entries)
    pub local_path: PathBuf,
    /// Remote path; the store's literal name when the entry exists remotely
    pub remote_path: RemotePath,
}

impl SyncFile {
    pub fn new(local_path: PathBuf, remote_path: RemotePath) -> Self {
        Self {
            local_path,
            remote_path,
        }
    }
}

impl Display for SyncFile {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.local_path.display(), self.remote_path)
    }
}

/// Result of comparing one local directory with its remote counterpart
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryDiff {
    /// The local directory that was walked
    pub local_dir: PathBuf,
    /// Remote folder the directory maps to
    pub remote_dir: Option<RemotePath>,
    /// Files present locally, absent (or tombstoned) remotely
    pub only_local: Vec<SyncFile>,
    /// Files present remotely, absent locally
    pub only_remote: Vec<SyncFile>,
    /// Files present on both sides; content is compared during reconciliation
    pub both: Vec<SyncFile>,
    /// Remote subfolders without a local counterpart
    pub only_remote_folders: Vec<SyncFile>,
}

impl DirectoryDiff {
    /// Splits the names of one directory into the four result buckets
    ///
    /// `local_files` maps each normalized local file name to its literal
    /// on-disk path; `remote_files` and `remote_folders` map each normalized
    /// remote name to the name the store reported. Membership is exact
    /// string equality on the normalized keys. Entries that exist remotely
    /// get a remote path built from the store's name, local-only entries one
    /// built from the normalized name.
    ///
    /// # Errors
    /// Returns error if a name cannot be appended to `remote_dir`
    pub fn partition(
        local_dir: &Path,
        remote_dir: &RemotePath,
        local_files: &BTreeMap<String, PathBuf>,
        local_folders: &BTreeSet<String>,
        remote_files: &BTreeMap<String, String>,
        remote_folders: &BTreeMap<String, String>,
    ) -> Result<Self, DomainError> {
        let mut diff = Self {
            local_dir: local_dir.to_path_buf(),
            remote_dir: Some(remote_dir.clone()),
            ..Self::default()
        };

        for (name, path) in local_files {
            match remote_files.get(name) {
                Some(literal) => diff
                    .both
                    .push(SyncFile::new(path.clone(), remote_dir.join(literal)?)),
                None => diff
                    .only_local
                    .push(SyncFile::new(path.clone(), remote_dir.join(name)?)),
            }
        }

        for (name, literal) in remote_files {
            if !local_files.contains_key(name) {
                diff.only_remote
                    .push(SyncFile::new(local_dir.join(name), remote_dir.join(literal)?));
            }
        }

        for (name, literal) in remote_folders {
            if !local_folders.contains(name) {
                diff.only_remote_folders
                    .push(SyncFile::new(local_dir.join(name), remote_dir.join(literal)?));
            }
        }

        Ok(diff)
    }

    /// True when no action would be taken for this directory
    #[must_use]
    pub fn is_in_sync(&self) -> bool {
        self.only_local.is_empty()
            && self.only_remote.is_empty()
            && self.only_remote_folders.is_empty()
    }

    /// Total number of entries across the four buckets
    #[must_use]
    pub fn len(&self) -> usize {
        self.only_local.len()
            + self.only_remote.len()
            + self.both.len()
            + self.only_remote_folders.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The four reconciliation actions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    /// Upload a local-only file
    Create,
    /// Delete a remote-only file
    Delete,
    /// Compare a file present on both sides and upload if it changed
    ConditionalReplace,
    /// Delete a remote-only folder
    DeleteFolder,
}

impl Display for ActionKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Create => "create",
            Self::Delete => "delete",
            Self::ConditionalReplace => "conditional_replace",
            Self::DeleteFolder => "delete_folder",
        };
        f.write_str(name)
    }
}
