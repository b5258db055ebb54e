//! In-memory remote store for tests
//!
//! Keeps files and folders in maps keyed by remote path, creates parent
//! folders implicitly on upload the way the real store does, and records
//! every call so tests can assert on what was (not) sent.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use jottasync_core::domain::{
    ErrorKind, FileHash, RemoteChild, RemoteEntry, RemoteError, RemoteFile, RemoteFileState,
    RemoteFolder, RemotePath,
};
use jottasync_core::ports::{FileStamp, IFingerprintCache, IRemoteTree, UploadSource};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Call {
    Stat(String),
    Upload(String),
    Resume(String, u64),
    Delete(String),
    DeleteFolder(String),
}

impl Call {
    fn is_mutation(&self) -> bool {
        !matches!(self, Call::Stat(_))
    }
}

#[derive(Default)]
struct Tree {
    files: BTreeMap<String, RemoteFile>,
    tombstones: BTreeSet<String>,
    folders: BTreeSet<String>,
}

impl Tree {
    fn ensure_parents(&mut self, path: &str) {
        let mut current = RemotePath::new(path.to_string()).ok().and_then(|p| p.parent());
        while let Some(parent) = current {
            if parent.as_str() == "/" {
                break;
            }
            self.folders.insert(parent.as_str().to_string());
            current = parent.parent();
        }
    }
}

#[derive(Default)]
pub(crate) struct FakeRemote {
    tree: Mutex<Tree>,
    calls: Mutex<Vec<Call>>,
    failures: Mutex<HashMap<String, ErrorKind>>,
    refuse_delete: Mutex<BTreeSet<String>>,
}

pub(crate) fn md5_of(content: &[u8]) -> FileHash {
    FileHash::from_digest(md5::compute(content).0)
}

fn parent_of(path: &str) -> Option<&str> {
    path.rfind('/').map(|i| if i == 0 { "/" } else { &path[..i] })
}

fn name_of(path: &str) -> String {
    path.rsplit('/').next().unwrap_or_default().to_string()
}

impl FakeRemote {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn add_folder(&self, path: &str) {
        let mut tree = self.tree.lock().unwrap();
        tree.ensure_parents(path);
        tree.folders.insert(path.to_string());
    }

    pub(crate) fn add_file(&self, path: &str, state: RemoteFileState, size: u64) {
        let mut tree = self.tree.lock().unwrap();
        tree.ensure_parents(path);
        tree.files.insert(
            path.to_string(),
            RemoteFile {
                name: name_of(path),
                state,
                size: Some(size),
                modified: None,
            },
        );
    }

    pub(crate) fn add_completed(&self, path: &str, content: &[u8]) {
        self.add_file(
            path,
            RemoteFileState::Completed {
                hash: md5_of(content),
            },
            content.len() as u64,
        );
    }

    pub(crate) fn add_tombstoned_file(&self, path: &str) {
        let mut tree = self.tree.lock().unwrap();
        tree.ensure_parents(path);
        tree.tombstones.insert(path.to_string());
    }

    /// Makes every mutation on `path` fail with `kind`
    pub(crate) fn fail_on(&self, path: &str, kind: ErrorKind) {
        self.failures
            .lock()
            .unwrap()
            .insert(path.to_string(), kind);
    }

    /// Makes deletes of `path` report "not deleted"
    pub(crate) fn refuse_delete(&self, path: &str) {
        self.refuse_delete.lock().unwrap().insert(path.to_string());
    }

    pub(crate) fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn mutation_count(&self) -> usize {
        self.calls().iter().filter(|c| c.is_mutation()).count()
    }

    pub(crate) fn file(&self, path: &str) -> Option<RemoteFile> {
        self.tree.lock().unwrap().files.get(path).cloned()
    }

    pub(crate) fn has_folder(&self, path: &str) -> bool {
        self.tree.lock().unwrap().folders.contains(path)
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    fn check_failure(&self, path: &RemotePath) -> Result<(), RemoteError> {
        match self.failures.lock().unwrap().get(path.as_str()) {
            Some(kind) => Err(RemoteError::new(*kind, path.as_str(), "injected failure")),
            None => Ok(()),
        }
    }

    fn store(&self, path: &RemotePath, source: &UploadSource) -> RemoteFile {
        let file = RemoteFile {
            name: name_of(path.as_str()),
            state: RemoteFileState::Completed {
                hash: source.hash.clone(),
            },
            size: Some(source.size),
            modified: Some(source.modified),
        };
        let mut tree = self.tree.lock().unwrap();
        tree.ensure_parents(path.as_str());
        tree.tombstones.remove(path.as_str());
        tree.files.insert(path.as_str().to_string(), file.clone());
        file
    }
}

#[async_trait::async_trait]
impl IRemoteTree for FakeRemote {
    async fn stat(&self, path: &RemotePath) -> Result<RemoteEntry, RemoteError> {
        self.record(Call::Stat(path.as_str().to_string()));
        let tree = self.tree.lock().unwrap();
        let key = path.as_str();

        if let Some(file) = tree.files.get(key) {
            return Ok(RemoteEntry::File(file.clone()));
        }
        if !tree.folders.contains(key) {
            return Ok(RemoteEntry::Absent);
        }

        let mut folder = RemoteFolder::new(name_of(key));
        for child in tree.folders.iter().filter(|p| parent_of(p) == Some(key)) {
            folder = folder.with_child(RemoteChild::folder(name_of(child)));
        }
        for child in tree.files.keys().filter(|p| parent_of(p) == Some(key)) {
            folder = folder.with_child(RemoteChild::file(name_of(child)));
        }
        for child in tree.tombstones.iter().filter(|p| parent_of(p) == Some(key)) {
            folder = folder.with_child(RemoteChild::file(name_of(child)).tombstoned());
        }
        Ok(RemoteEntry::Folder(folder))
    }

    async fn upload(
        &self,
        path: &RemotePath,
        source: &UploadSource,
    ) -> Result<RemoteFile, RemoteError> {
        self.record(Call::Upload(path.as_str().to_string()));
        self.check_failure(path)?;
        Ok(self.store(path, source))
    }

    async fn resume_upload(
        &self,
        path: &RemotePath,
        source: &UploadSource,
        offset: u64,
    ) -> Result<RemoteFile, RemoteError> {
        self.record(Call::Resume(path.as_str().to_string(), offset));
        self.check_failure(path)?;
        Ok(self.store(path, source))
    }

    async fn delete(&self, path: &RemotePath) -> Result<bool, RemoteError> {
        self.record(Call::Delete(path.as_str().to_string()));
        self.check_failure(path)?;
        if self.refuse_delete.lock().unwrap().contains(path.as_str()) {
            return Ok(false);
        }
        let mut tree = self.tree.lock().unwrap();
        match tree.files.remove(path.as_str()) {
            Some(_) => {
                tree.tombstones.insert(path.as_str().to_string());
                Ok(true)
            }
            None => Err(RemoteError::new(ErrorKind::NotFound, path.as_str(), "no such file")),
        }
    }

    async fn delete_folder(&self, path: &RemotePath) -> Result<bool, RemoteError> {
        self.record(Call::DeleteFolder(path.as_str().to_string()));
        self.check_failure(path)?;
        let mut tree = self.tree.lock().unwrap();
        if !tree.folders.remove(path.as_str()) {
            return Err(RemoteError::new(ErrorKind::NotFound, path.as_str(), "no such folder"));
        }
        let prefix = format!("{}/", path.as_str());
        tree.folders.retain(|p| !p.starts_with(&prefix));
        tree.files.retain(|p, _| !p.starts_with(&prefix));
        Ok(true)
    }
}

/// Fingerprint store that ignores stamps on lookup and counts writes
#[derive(Default)]
pub(crate) struct MapFingerprints {
    entries: Mutex<HashMap<PathBuf, (FileStamp, FileHash)>>,
    stores: Mutex<usize>,
}

impl MapFingerprints {
    pub(crate) fn store_count(&self) -> usize {
        *self.stores.lock().unwrap()
    }

    pub(crate) fn get(&self, path: &Path) -> Option<FileHash> {
        self.entries.lock().unwrap().get(path).map(|e| e.1.clone())
    }

    pub(crate) fn stamp(&self, path: &Path) -> Option<FileStamp> {
        self.entries.lock().unwrap().get(path).map(|e| e.0)
    }
}

#[async_trait::async_trait]
impl IFingerprintCache for MapFingerprints {
    async fn lookup(&self, path: &Path, _stamp: FileStamp) -> Option<FileHash> {
        self.get(path)
    }

    async fn store(&self, path: &Path, stamp: FileStamp, hash: &FileHash) -> anyhow::Result<()> {
        *self.stores.lock().unwrap() += 1;
        self.entries
            .lock()
            .unwrap()
            .insert(path.to_path_buf(), (stamp, hash.clone()));
        Ok(())
    }

    fn name(&self) -> &'static str {
        "map"
    }
}
