//! SQLite-backed fingerprint cache
//!
//! One row per local path in the `fingerprints` table. The path is stored as
//! raw bytes so names that are not valid UTF-8 keep distinct keys.

use std::path::Path;

use chrono::Utc;
use jottasync_core::domain::FileHash;
use jottasync_core::ports::{FileStamp, IFingerprintCache};
use sqlx::{Row, SqlitePool};
use tracing::{debug, instrument, trace};

use crate::CacheError;

/// Fingerprints persisted in a local database
#[derive(Debug, Clone)]
pub struct SqliteFingerprintCache {
    pool: SqlitePool,
}

#[cfg(unix)]
fn path_key(path: &Path) -> Vec<u8> {
    use std::os::unix::ffi::OsStrExt;
    path.as_os_str().as_bytes().to_vec()
}

#[cfg(not(unix))]
fn path_key(path: &Path) -> Vec<u8> {
    path.to_string_lossy().into_owned().into_bytes()
}

impl SqliteFingerprintCache {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Reads the stored record for `path` without checking the file
    pub async fn get_record(&self, path: &Path) -> Result<Option<(FileStamp, FileHash)>, CacheError> {
        let row = sqlx::query("SELECT size, mtime_ns, hash FROM fingerprints WHERE path = ?")
            .bind(path_key(path))
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let size: i64 = row.try_get("size")?;
        let mtime_ns: i64 = row.try_get("mtime_ns")?;
        let hash: String = row.try_get("hash")?;

        let size = u64::try_from(size)
            .map_err(|_| CacheError::SerializationError(format!("negative size {size}")))?;
        let hash = FileHash::new(hash).map_err(|e| CacheError::SerializationError(e.to_string()))?;
        Ok(Some((FileStamp::new(size, mtime_ns), hash)))
    }

    /// Writes a record for `path`
    pub async fn put_record(
        &self,
        path: &Path,
        stamp: FileStamp,
        hash: &FileHash,
    ) -> Result<(), CacheError> {
        let size = i64::try_from(stamp.size)
            .map_err(|_| CacheError::SerializationError(format!("size {} too large", stamp.size)))?;
        sqlx::query(
            "INSERT INTO fingerprints (path, size, mtime_ns, hash, updated_at) \
             VALUES (?, ?, ?, ?, ?) \
             ON CONFLICT(path) DO UPDATE SET \
             size = excluded.size, mtime_ns = excluded.mtime_ns, \
             hash = excluded.hash, updated_at = excluded.updated_at",
        )
        .bind(path_key(path))
        .bind(size)
        .bind(stamp.mtime_ns)
        .bind(hash.as_str())
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Removes the record for `path`
    pub async fn forget(&self, path: &Path) -> Result<bool, CacheError> {
        let result = sqlx::query("DELETE FROM fingerprints WHERE path = ?")
            .bind(path_key(path))
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Number of stored records
    pub async fn count(&self) -> Result<u64, CacheError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM fingerprints")
            .fetch_one(&self.pool)
            .await?;
        Ok(count.max(0) as u64)
    }
}

#[async_trait::async_trait]
impl IFingerprintCache for SqliteFingerprintCache {
    #[instrument(skip(self), fields(path = %path.display()))]
    async fn lookup(&self, path: &Path, current: FileStamp) -> Option<FileHash> {
        let (stored, hash) = match self.get_record(path).await {
            Ok(Some(record)) => record,
            Ok(None) => return None,
            Err(err) => {
                debug!(error = %err, "fingerprint lookup failed");
                return None;
            }
        };

        if stored == current {
            return Some(hash);
        }
        trace!("stale fingerprint");
        if let Err(err) = self.forget(path).await {
            debug!(error = %err, "stale fingerprint not removed");
        }
        None
    }

    #[instrument(skip(self, hash), fields(path = %path.display()))]
    async fn store(&self, path: &Path, stamp: FileStamp, hash: &FileHash) -> anyhow::Result<()> {
        self.put_record(path, stamp, hash).await?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "sqlite"
    }
}
