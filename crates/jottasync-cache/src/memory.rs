//! Process-lifetime fingerprint map
//!
//! Backed by a sharded concurrent map, so transfer workers hashing
//! different files never contend on a single lock.

use std::path::{Path, PathBuf};

use dashmap::DashMap;
use jottasync_core::domain::FileHash;
use jottasync_core::ports::{FileStamp, IFingerprintCache};
use tracing::trace;

#[derive(Debug, Default)]
pub struct MemoryFingerprintCache {
    entries: DashMap<PathBuf, (FileStamp, FileHash)>,
}

impl MemoryFingerprintCache {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait::async_trait]
impl IFingerprintCache for MemoryFingerprintCache {
    async fn lookup(&self, path: &Path, stamp: FileStamp) -> Option<FileHash> {
        let hit = self
            .entries
            .get(path)
            .filter(|entry| entry.0 == stamp)
            .map(|entry| entry.1.clone());
        if hit.is_none() && self.entries.remove(path).is_some() {
            trace!(path = %path.display(), "stale fingerprint dropped");
        }
        hit
    }

    async fn store(&self, path: &Path, stamp: FileStamp, hash: &FileHash) -> anyhow::Result<()> {
        self.entries
            .insert(path.to_path_buf(), (stamp, hash.clone()));
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
