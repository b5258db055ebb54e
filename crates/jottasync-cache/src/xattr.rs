//! Extended-attribute fingerprint cache
//!
//! Records the fingerprint on the file itself:
//!
//! | attribute                 | value                          |
//! |---------------------------|--------------------------------|
//! | `user.jottasync.md5`      | 32 lowercase hex digits        |
//! | `user.jottasync.size`     | decimal byte count             |
//! | `user.jottasync.mtime_ns` | decimal nanoseconds since epoch|
//!
//! A lookup whose recorded size or mtime differs from the caller's stamp
//! removes the attributes and misses. Filesystems without user
//! attributes (and non-Linux platforms) always miss and accept stores
//! silently.

use std::path::Path;

use jottasync_core::domain::FileHash;
use jottasync_core::ports::{FileStamp, IFingerprintCache};
use tracing::{debug, trace};

pub const MD5_ATTR: &str = "user.jottasync.md5";
pub const SIZE_ATTR: &str = "user.jottasync.size";
pub const MTIME_ATTR: &str = "user.jottasync.mtime_ns";

/// Fingerprints stored in `user.jottasync.*` attributes
#[derive(Debug, Clone, Copy, Default)]
pub struct XattrFingerprintCache;

impl XattrFingerprintCache {
    pub fn new() -> Self {
        Self
    }

    /// Whether the filesystem holding `path` accepts user attributes
    pub async fn is_supported(path: &Path) -> bool {
        let path = path.to_path_buf();
        tokio::task::spawn_blocking(move || sys::supported(&path))
            .await
            .unwrap_or(false)
    }
}

/// Outcome of reading the stored fingerprint
#[derive(Debug, PartialEq, Eq)]
enum Stored {
    Missing,
    Record(FileStamp, FileHash),
}

fn read_record(path: &Path) -> std::io::Result<Stored> {
    let Some(md5) = sys::get(path, MD5_ATTR)? else {
        return Ok(Stored::Missing);
    };
    let (Some(size), Some(mtime)) = (sys::get(path, SIZE_ATTR)?, sys::get(path, MTIME_ATTR)?)
    else {
        return Ok(Stored::Missing);
    };

    let parsed = (|| {
        let hash = FileHash::new(String::from_utf8(md5).ok()?).ok()?;
        let size = String::from_utf8(size).ok()?.parse::<u64>().ok()?;
        let mtime = String::from_utf8(mtime).ok()?.parse::<i64>().ok()?;
        Some(Stored::Record(FileStamp::new(size, mtime), hash))
    })();
    Ok(parsed.unwrap_or(Stored::Missing))
}

fn clear_record(path: &Path) {
    for name in [MD5_ATTR, SIZE_ATTR, MTIME_ATTR] {
        if let Err(err) = sys::remove(path, name) {
            trace!(path = %path.display(), attr = name, error = %err, "attribute not removed");
        }
    }
}

fn write_record(path: &Path, stamp: FileStamp, hash: &FileHash) -> std::io::Result<()> {
    sys::set(path, MD5_ATTR, hash.as_str().as_bytes())?;
    sys::set(path, SIZE_ATTR, stamp.size.to_string().as_bytes())?;
    sys::set(path, MTIME_ATTR, stamp.mtime_ns.to_string().as_bytes())?;
    Ok(())
}

#[async_trait::async_trait]
impl IFingerprintCache for XattrFingerprintCache {
    async fn lookup(&self, path: &Path, current: FileStamp) -> Option<FileHash> {
        let owned = path.to_path_buf();
        let stored = tokio::task::spawn_blocking(move || {
            let stored = read_record(&owned);
            if let Ok(Stored::Record(stamp, _)) = &stored {
                if *stamp != current {
                    clear_record(&owned);
                    return Ok(Stored::Missing);
                }
            }
            stored
        })
        .await
        .ok()?;

        match stored {
            Ok(Stored::Record(_, hash)) => Some(hash),
            Ok(Stored::Missing) => None,
            Err(err) => {
                debug!(path = %path.display(), error = %err, "fingerprint attributes unreadable");
                None
            }
        }
    }

    async fn store(&self, path: &Path, stamp: FileStamp, hash: &FileHash) -> anyhow::Result<()> {
        let owned = path.to_path_buf();
        let hash = hash.clone();
        let result = tokio::task::spawn_blocking(move || write_record(&owned, stamp, &hash)).await?;
        match result {
            Ok(()) => Ok(()),
            Err(err) if sys::is_unsupported(&err) => {
                trace!(path = %path.display(), "user attributes unsupported");
                Ok(())
            }
            Err(err) => Err(err.into()),
        }
    }

    fn name(&self) -> &'static str {
        "xattr"
    }
}

#[cfg(target_os = "linux")]
mod sys {
    use std::ffi::CString;
    use std::io;
    use std::os::unix::ffi::OsStrExt;
    use std::path::Path;

    /// Stored values are short; anything larger is not ours
    const MAX_VALUE: usize = 64;

    fn c_path(path: &Path) -> io::Result<CString> {
        CString::new(path.as_os_str().as_bytes())
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))
    }

    fn c_name(name: &str) -> io::Result<CString> {
        CString::new(name).map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))
    }

    pub(super) fn is_unsupported(err: &io::Error) -> bool {
        matches!(err.raw_os_error(), Some(libc::ENOTSUP))
    }

    fn is_absent(err: &io::Error) -> bool {
        matches!(
            err.raw_os_error(),
            Some(libc::ENODATA) | Some(libc::ENOTSUP) | Some(libc::ERANGE)
        )
    }

    pub(super) fn get(path: &Path, name: &str) -> io::Result<Option<Vec<u8>>> {
        let path = c_path(path)?;
        let name = c_name(name)?;
        let mut buffer = vec![0u8; MAX_VALUE];
        // SAFETY: both strings are NUL-terminated and the buffer length is passed
        let len = unsafe {
            libc::getxattr(
                path.as_ptr(),
                name.as_ptr(),
                buffer.as_mut_ptr().cast(),
                buffer.len(),
            )
        };
        if len < 0 {
            let err = io::Error::last_os_error();
            return if is_absent(&err) { Ok(None) } else { Err(err) };
        }
        buffer.truncate(len as usize);
        Ok(Some(buffer))
    }

    pub(super) fn set(path: &Path, name: &str, value: &[u8]) -> io::Result<()> {
        let path = c_path(path)?;
        let name = c_name(name)?;
        // SAFETY: both strings are NUL-terminated and the value length is passed
        let rc = unsafe {
            libc::setxattr(
                path.as_ptr(),
                name.as_ptr(),
                value.as_ptr().cast(),
                value.len(),
                0,
            )
        };
        if rc < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    pub(super) fn remove(path: &Path, name: &str) -> io::Result<()> {
        let path = c_path(path)?;
        let name = c_name(name)?;
        // SAFETY: both strings are NUL-terminated
        let rc = unsafe { libc::removexattr(path.as_ptr(), name.as_ptr()) };
        if rc < 0 {
            let err = io::Error::last_os_error();
            if is_absent(&err) {
                return Ok(());
            }
            return Err(err);
        }
        Ok(())
    }

    pub(super) fn supported(path: &Path) -> bool {
        const CHECK: &str = "user.jottasync.check";
        match set(path, CHECK, b"1") {
            Ok(()) => {
                let _ = remove(path, CHECK);
                true
            }
            Err(_) => false,
        }
    }
}

#[cfg(not(target_os = "linux"))]
mod sys {
    use std::io;
    use std::path::Path;

    fn unsupported() -> io::Error {
        io::Error::new(io::ErrorKind::Unsupported, "extended attributes unavailable")
    }

    pub(super) fn is_unsupported(err: &io::Error) -> bool {
        err.kind() == io::ErrorKind::Unsupported
    }

    pub(super) fn get(_path: &Path, _name: &str) -> io::Result<Option<Vec<u8>>> {
        Ok(None)
    }

    pub(super) fn set(_path: &Path, _name: &str, _value: &[u8]) -> io::Result<()> {
        Err(unsupported())
    }

    pub(super) fn remove(_path: &Path, _name: &str) -> io::Result<()> {
        Ok(())
    }

    pub(super) fn supported(_path: &Path) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, SystemTime};

    use super::*;

    fn hash(c: char) -> FileHash {
        FileHash::new(c.to_string().repeat(32)).unwrap()
    }

    fn stamp_of(path: &Path) -> FileStamp {
        FileStamp::from_metadata(&std::fs::metadata(path).unwrap())
    }

    #[tokio::test]
    async fn test_roundtrip_and_invalidation() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("f.txt");
        std::fs::write(&path, b"content").unwrap();
        if !XattrFingerprintCache::is_supported(&path).await {
            return;
        }

        let cache = XattrFingerprintCache::new();
        let stamp = stamp_of(&path);
        cache.store(&path, stamp, &hash('a')).await.unwrap();
        assert_eq!(cache.lookup(&path, stamp).await, Some(hash('a')));
        // recording the attributes leaves the mtime alone
        assert_eq!(stamp_of(&path), stamp);

        let file = std::fs::OpenOptions::new().write(true).open(&path).unwrap();
        file.set_modified(SystemTime::now() + Duration::from_secs(3600))
            .unwrap();
        drop(file);

        assert_eq!(cache.lookup(&path, stamp_of(&path)).await, None);
        // the stale attributes were removed
        let owned = path.clone();
        let stored = tokio::task::spawn_blocking(move || read_record(&owned))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored, Stored::Missing);
    }

    #[tokio::test]
    async fn test_missing_file_misses() {
        let cache = XattrFingerprintCache::new();
        let stamp = FileStamp::new(1, 1);
        assert_eq!(cache.lookup(Path::new("/nonexistent/file"), stamp).await, None);
        assert!(cache
            .store(Path::new("/nonexistent/file"), stamp, &hash('b'))
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_file_without_attributes_misses() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("plain");
        std::fs::write(&path, b"x").unwrap();
        assert_eq!(
            XattrFingerprintCache::new()
                .lookup(&path, stamp_of(&path))
                .await,
            None
        );
    }
}
