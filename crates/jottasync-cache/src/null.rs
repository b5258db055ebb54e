//! Backend that never remembers anything

use std::path::Path;

use jottasync_core::domain::FileHash;
use jottasync_core::ports::{FileStamp, IFingerprintCache};

/// Always misses; every lookup leads to a fresh hash
#[derive(Debug, Clone, Copy, Default)]
pub struct NullFingerprintCache;

#[async_trait::async_trait]
impl IFingerprintCache for NullFingerprintCache {
    async fn lookup(&self, _path: &Path, _stamp: FileStamp) -> Option<FileHash> {
        None
    }

    async fn store(
        &self,
        _path: &Path,
        _stamp: FileStamp,
        _hash: &FileHash,
    ) -> anyhow::Result<()> {
        Ok(())
    }

    fn name(&self) -> &'static str {
        "none"
    }
}
