//! Fingerprint cache port
//!
//! A fingerprint is a content hash together with the `(size, mtime)` pair
//! observed when it was computed. Implementations must treat any change of
//! either value as a miss: returning a stale hash for a modified file would
//! let a changed file pass as unchanged.
//!
//! Callers pass the stamp they observed before reading the file, so a write
//! that lands while the hash is computed never gets recorded against the new
//! stamp. Implementations must tolerate concurrent calls for different paths.

use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::domain::newtypes::FileHash;

/// Observed size and modification time of a file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FileStamp {
    /// Length in bytes
    pub size: u64,
    /// Modification time in nanoseconds since the Unix epoch
    pub mtime_ns: i64,
}

impl FileStamp {
    pub fn new(size: u64, mtime_ns: i64) -> Self {
        Self { size, mtime_ns }
    }

    /// Builds a stamp from filesystem metadata
    #[must_use]
    pub fn from_metadata(metadata: &std::fs::Metadata) -> Self {
        let mtime_ns = metadata.modified().map(system_time_ns).unwrap_or(0);
        Self {
            size: metadata.len(),
            mtime_ns,
        }
    }

    /// Modification time as a UTC timestamp
    #[must_use]
    pub fn modified(&self) -> chrono::DateTime<chrono::Utc> {
        chrono::DateTime::from_timestamp_nanos(self.mtime_ns)
    }
}

fn system_time_ns(time: SystemTime) -> i64 {
    match time.duration_since(UNIX_EPOCH) {
        Ok(after) => i64::try_from(after.as_nanos()).unwrap_or(i64::MAX),
        Err(before) => -i64::try_from(before.duration().as_nanos()).unwrap_or(i64::MAX),
    }
}

/// Port trait for hash caches
#[async_trait::async_trait]
pub trait IFingerprintCache: Send + Sync {
    /// Returns the stored hash if it was recorded against `stamp`
    ///
    /// A record under any other stamp is stale and may be dropped.
    async fn lookup(&self, path: &Path, stamp: FileStamp) -> Option<FileHash>;

    /// Records `hash` as the content of `path` at `stamp`
    ///
    /// Backends without storage capability return `Ok(())` and keep missing.
    async fn store(&self, path: &Path, stamp: FileStamp, hash: &FileHash) -> anyhow::Result<()>;

    /// Backend name for logs
    fn name(&self) -> &'static str;
}
