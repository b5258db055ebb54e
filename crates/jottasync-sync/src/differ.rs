//! Tree differencer
//!
//! Walks the local tree depth-first and, for every directory, compares the
//! immediate children with those of the matching remote folder. Results are
//! produced lazily, one [`DirectoryDiff`] per directory, in a deterministic
//! order: a directory is yielded before any of its subdirectories, and
//! siblings are visited in name order.
//!
//! The walk keeps no state between runs. [`TreeDiffer::restart`] starts a
//! fresh comparison from the root.
//!
//! ## Failure behavior
//!
//! - A local directory that cannot be listed yields a `FilesystemError` for
//!   that directory only; its subtree is skipped, siblings continue.
//! - A remote path that exists but is not a folder yields `PathMismatch` and
//!   its subtree is skipped. Callers are expected to stop.
//! - A missing remote folder compares as an empty one.
//!
//! ## Remote names
//!
//! Names are compared in NFC on both sides, but remote paths keep the
//! spelling the store reported. A subdirectory matched against a remote
//! folder is visited under that folder's literal name; only the root and
//! directories without a remote counterpart use the normalized name.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures_util::Stream;
use jottasync_core::{
    domain::{DirectoryDiff, DomainError, ErrorKind, RemoteEntry, RemotePath, SyncError},
    exclusion::ExclusionFilter,
    filename,
    path::translate,
    ports::{ILocalTree, IRemoteTree, LocalEntry},
};
use tracing::{debug, info, instrument, warn};

/// Walk options
#[derive(Debug, Clone, Default)]
pub struct DifferOptions {
    /// Entries whose full path matches are ignored on both sides
    pub exclude: ExclusionFilter,
    /// Descend into symlinked directories
    pub follow_links: bool,
}

/// Lazy per-directory comparison of a local tree with its remote mirror
pub struct TreeDiffer {
    local: Arc<dyn ILocalTree>,
    remote: Arc<dyn IRemoteTree>,
    local_root: PathBuf,
    remote_root: RemotePath,
    options: DifferOptions,
    /// Directories still to visit with their remote folder; `None` marks the root
    pending: Vec<(PathBuf, Option<RemotePath>)>,
    visited: HashSet<PathBuf>,
}

impl TreeDiffer {
    pub fn new(
        local: Arc<dyn ILocalTree>,
        remote: Arc<dyn IRemoteTree>,
        local_root: impl Into<PathBuf>,
        remote_root: RemotePath,
        options: DifferOptions,
    ) -> Self {
        let local_root = local_root.into();
        Self {
            local,
            remote,
            pending: vec![(local_root.clone(), None)],
            local_root,
            remote_root,
            options,
            visited: HashSet::new(),
        }
    }

    /// Rewinds the walk to the root
    pub fn restart(&mut self) {
        self.pending = vec![(self.local_root.clone(), None)];
        self.visited.clear();
    }

    /// Compares the next directory, or `None` once the walk is exhausted
    pub async fn next_diff(&mut self) -> Option<Result<DirectoryDiff, SyncError>> {
        let (dir, remote_dir) = self.pending.pop()?;
        Some(self.diff_directory(&dir, remote_dir).await)
    }

    /// Turns the walk into a stream
    pub fn into_stream(self) -> impl Stream<Item = Result<DirectoryDiff, SyncError>> + Send {
        futures_util::stream::unfold(self, |mut differ| async move {
            let item = differ.next_diff().await?;
            Some((item, differ))
        })
    }

    #[instrument(skip(self, remote_dir), fields(dir = %dir.display()))]
    async fn diff_directory(
        &mut self,
        dir: &Path,
        remote_dir: Option<RemotePath>,
    ) -> Result<DirectoryDiff, SyncError> {
        if self.options.follow_links && self.visited.is_empty() {
            let root = self.local.canonicalize(&self.local_root).await?;
            self.visited.insert(root);
        }

        let listing = self.local.list_dir(dir).await?;

        let mut local_files: BTreeMap<String, PathBuf> = BTreeMap::new();
        for entry in self.visible(dir, listing.files) {
            if let Some(previous) = local_files.insert(entry.name.clone(), entry.path.clone()) {
                warn!(
                    name = %entry.name,
                    kept = %entry.path.display(),
                    dropped = %previous.display(),
                    "two local names normalize to the same name"
                );
            }
        }
        let subdirs = self.visible(dir, listing.dirs);
        let local_folders: BTreeSet<String> = subdirs.iter().map(|e| e.name.clone()).collect();

        let remote_dir = match remote_dir {
            Some(remote_dir) => remote_dir,
            None => translate(&self.local_root, dir, &self.remote_root)
                .map_err(|e| domain_error(dir, e))?,
        };
        let entry = self.remote.stat(&remote_dir).await?;

        let (remote_files, remote_folders) = match &entry {
            RemoteEntry::Absent => {
                debug!(remote = %remote_dir, "remote folder absent, comparing as empty");
                (BTreeMap::new(), BTreeMap::new())
            }
            RemoteEntry::File(_) => {
                return Err(SyncError::path_mismatch(
                    remote_dir.as_str(),
                    entry.kind_name(),
                ));
            }
            RemoteEntry::Folder(folder)
            | RemoteEntry::Device(folder)
            | RemoteEntry::MountPoint(folder) => (
                self.remote_names(dir, folder.live_file_names()),
                self.remote_names(dir, folder.live_folder_names()),
            ),
        };

        let diff = DirectoryDiff::partition(
            dir,
            &remote_dir,
            &local_files,
            &local_folders,
            &remote_files,
            &remote_folders,
        )
        .map_err(|e| domain_error(dir, e))?;

        let mut children = Vec::with_capacity(subdirs.len());
        for entry in subdirs {
            let name = remote_folders.get(&entry.name).unwrap_or(&entry.name);
            let remote = remote_dir.join(name).map_err(|e| domain_error(dir, e))?;
            children.push((entry, remote));
        }
        self.schedule(children).await;

        info!(
            remote = %remote_dir,
            only_local = diff.only_local.len(),
            only_remote = diff.only_remote.len(),
            both = diff.both.len(),
            only_remote_folders = diff.only_remote_folders.len(),
            "directory compared"
        );
        Ok(diff)
    }

    /// Drops excluded entries
    fn visible(&self, dir: &Path, entries: Vec<LocalEntry>) -> Vec<LocalEntry> {
        entries
            .into_iter()
            .filter(|entry| {
                let excluded = self.options.exclude.is_path_excluded(&dir.join(&entry.name));
                if excluded {
                    debug!(path = %entry.path.display(), "excluded");
                }
                !excluded
            })
            .collect()
    }

    /// Maps each visible remote name's NFC form to the name as stored
    fn remote_names(&self, dir: &Path, names: BTreeSet<&str>) -> BTreeMap<String, String> {
        names
            .into_iter()
            .map(|name| (filename::normalize(name), name.to_string()))
            .filter(|(key, _)| !self.options.exclude.is_path_excluded(&dir.join(key)))
            .collect()
    }

    /// Queues subdirectories so the first in name order is visited next
    async fn schedule(&mut self, subdirs: Vec<(LocalEntry, RemotePath)>) {
        let mut queue = Vec::with_capacity(subdirs.len());
        for (entry, remote) in subdirs {
            if entry.is_symlink && !self.options.follow_links {
                debug!(path = %entry.path.display(), "not following directory link");
                continue;
            }
            if self.options.follow_links {
                match self.local.canonicalize(&entry.path).await {
                    Ok(real) if !self.visited.insert(real.clone()) => {
                        warn!(
                            path = %entry.path.display(),
                            target = %real.display(),
                            "directory already visited, skipping link loop"
                        );
                        continue;
                    }
                    Ok(_) => {}
                    Err(err) => {
                        warn!(path = %entry.path.display(), error = %err, "cannot resolve directory");
                        continue;
                    }
                }
            }
            queue.push((entry.path, Some(remote)));
        }
        self.pending.extend(queue.into_iter().rev());
    }
}

fn domain_error(dir: &Path, err: DomainError) -> SyncError {
    SyncError::new(ErrorKind::Other, dir.display().to_string(), err.to_string())
}
