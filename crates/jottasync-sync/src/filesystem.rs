//! Local filesystem adapter (secondary/driven adapter)
//!
//! Implements [`ILocalTree`] using `tokio::fs` for async file operations.
//!
//! ## Design Decisions
//!
//! - **Decoding at the boundary**: raw name bytes go through
//!   [`filename::comparable_name`] once, here. Paths are kept verbatim.
//! - **No implicit link following**: listing uses `file_type()` of the entry
//!   itself; a symlink is classified by what it points at and flagged.
//! - **Bounded hashing**: MD5 is computed over 64 KiB reads, never loading
//!   a whole file.

use std::path::{Path, PathBuf};

use jottasync_core::{
    domain::{FileHash, SyncError},
    filename,
    ports::{FileStamp, ILocalTree, LinkStatus, LocalDirListing, LocalEntry},
};
use tokio::io::AsyncReadExt;
use tracing::{debug, instrument, warn};

/// Read size for streaming hashes
const HASH_CHUNK_SIZE: usize = 64 * 1024;

// ============================================================================
// LocalFileSystemAdapter struct
// ============================================================================

/// Adapter that bridges the [`ILocalTree`] port to the real filesystem.
///
/// This is a zero-sized struct because all operations derive their context
/// from the path arguments.
#[derive(Debug, Clone, Default)]
pub struct LocalFileSystemAdapter;

impl LocalFileSystemAdapter {
    /// Create a new `LocalFileSystemAdapter`.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[cfg(unix)]
fn entry_name(raw: &std::ffi::OsStr) -> String {
    use std::os::unix::ffi::OsStrExt;
    filename::comparable_name(raw.as_bytes())
}

#[cfg(not(unix))]
fn entry_name(raw: &std::ffi::OsStr) -> String {
    filename::normalize(&raw.to_string_lossy())
}

fn fs_error(path: &Path, err: &std::io::Error) -> SyncError {
    SyncError::filesystem(path.display().to_string(), err)
}

/// Computes the MD5 of a file with bounded memory
pub async fn md5_file(path: &Path) -> std::io::Result<FileHash> {
    let mut file = tokio::fs::File::open(path).await?;
    let mut context = md5::Context::new();
    let mut buffer = vec![0u8; HASH_CHUNK_SIZE];
    loop {
        let read = file.read(&mut buffer).await?;
        if read == 0 {
            break;
        }
        context.consume(&buffer[..read]);
    }
    Ok(FileHash::from_digest(context.compute().0))
}

// ============================================================================
// ILocalTree implementation
// ============================================================================

#[async_trait::async_trait]
impl ILocalTree for LocalFileSystemAdapter {
    #[instrument(skip(self), fields(dir = %dir.display()))]
    async fn list_dir(&self, dir: &Path) -> Result<LocalDirListing, SyncError> {
        let mut reader = tokio::fs::read_dir(dir)
            .await
            .map_err(|e| fs_error(dir, &e))?;
        let mut listing = LocalDirListing::default();

        while let Some(entry) = reader.next_entry().await.map_err(|e| fs_error(dir, &e))? {
            let path = entry.path();
            let file_type = match entry.file_type().await {
                Ok(file_type) => file_type,
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "cannot read entry type, skipping");
                    continue;
                }
            };
            let name = entry_name(&entry.file_name());

            if file_type.is_symlink() {
                let local = LocalEntry {
                    name,
                    path: path.clone(),
                    is_symlink: true,
                };
                match tokio::fs::metadata(&path).await {
                    Ok(target) if target.is_dir() => listing.dirs.push(local),
                    Ok(target) if target.is_file() => listing.files.push(local),
                    Ok(_) => debug!(path = %path.display(), "link to special file ignored"),
                    Err(_) => listing.files.push(local),
                }
            } else if file_type.is_dir() {
                listing.dirs.push(LocalEntry {
                    name,
                    path,
                    is_symlink: false,
                });
            } else if file_type.is_file() {
                listing.files.push(LocalEntry {
                    name,
                    path,
                    is_symlink: false,
                });
            } else {
                debug!(path = %path.display(), "special file ignored");
            }
        }

        listing.files.sort_by(|a, b| a.name.cmp(&b.name));
        listing.dirs.sort_by(|a, b| a.name.cmp(&b.name));
        debug!(
            files = listing.files.len(),
            dirs = listing.dirs.len(),
            "directory listed"
        );
        Ok(listing)
    }

    #[instrument(skip(self), fields(path = %path.display()))]
    async fn stat(&self, path: &Path) -> Result<FileStamp, SyncError> {
        let metadata = tokio::fs::metadata(path)
            .await
            .map_err(|e| fs_error(path, &e))?;
        Ok(FileStamp::from_metadata(&metadata))
    }

    #[instrument(skip(self), fields(path = %path.display()))]
    async fn link_status(&self, path: &Path) -> Result<LinkStatus, SyncError> {
        let metadata = tokio::fs::symlink_metadata(path)
            .await
            .map_err(|e| fs_error(path, &e))?;
        if !metadata.file_type().is_symlink() {
            return Ok(LinkStatus::NotALink);
        }
        match tokio::fs::canonicalize(path).await {
            Ok(target) => Ok(LinkStatus::Target(target)),
            Err(err) => {
                debug!(error = %err, "dangling link");
                Ok(LinkStatus::Dangling)
            }
        }
    }

    async fn canonicalize(&self, path: &Path) -> Result<PathBuf, SyncError> {
        tokio::fs::canonicalize(path)
            .await
            .map_err(|e| fs_error(path, &e))
    }

    #[instrument(skip(self), fields(path = %path.display()))]
    async fn compute_hash(&self, path: &Path) -> Result<FileHash, SyncError> {
        debug!("computing md5");
        let hash = md5_file(path).await.map_err(|e| fs_error(path, &e))?;
        debug!(hash = %hash, "hash computed");
        Ok(hash)
    }
}

#[cfg(test)]
mod tests {
    use jottasync_core::domain::ErrorKind;
    use tempfile::TempDir;

    use super::*;

    fn names(entries: &[LocalEntry]) -> Vec<&str> {
        entries.iter().map(|e| e.name.as_str()).collect()
    }

    #[tokio::test]
    async fn test_list_dir_splits_files_and_dirs() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("b.txt"), b"b").unwrap();
        std::fs::write(dir.path().join("a.txt"), b"a").unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();

        let listing = LocalFileSystemAdapter::new()
            .list_dir(dir.path())
            .await
            .unwrap();

        assert_eq!(names(&listing.files), vec!["a.txt", "b.txt"]);
        assert_eq!(names(&listing.dirs), vec!["sub"]);
        assert_eq!(listing.files[0].path, dir.path().join("a.txt"));
        assert!(!listing.files[0].is_symlink);
    }

    #[tokio::test]
    async fn test_list_missing_dir_is_filesystem_error() {
        let dir = TempDir::new().unwrap();
        let err = LocalFileSystemAdapter::new()
            .list_dir(&dir.path().join("gone"))
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::FilesystemError);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_symlinks_are_flagged() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("real")).unwrap();
        std::fs::write(dir.path().join("file"), b"x").unwrap();
        std::os::unix::fs::symlink(dir.path().join("real"), dir.path().join("dirlink")).unwrap();
        std::os::unix::fs::symlink(dir.path().join("file"), dir.path().join("filelink")).unwrap();
        std::os::unix::fs::symlink(dir.path().join("nowhere"), dir.path().join("dangling"))
            .unwrap();

        let fs = LocalFileSystemAdapter::new();
        let listing = fs.list_dir(dir.path()).await.unwrap();

        assert_eq!(names(&listing.dirs), vec!["dirlink", "real"]);
        assert!(listing.dirs[0].is_symlink);
        assert_eq!(names(&listing.files), vec!["dangling", "file", "filelink"]);

        assert_eq!(
            fs.link_status(&dir.path().join("dangling")).await.unwrap(),
            LinkStatus::Dangling
        );
        assert_eq!(
            fs.link_status(&dir.path().join("file")).await.unwrap(),
            LinkStatus::NotALink
        );
        let target = fs.link_status(&dir.path().join("filelink")).await.unwrap();
        assert_eq!(
            target,
            LinkStatus::Target(std::fs::canonicalize(dir.path().join("file")).unwrap())
        );
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_non_utf8_names_are_decoded() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let dir = TempDir::new().unwrap();
        let raw = OsStr::from_bytes(&[0x62, 0x6c, 0xe5, 0x62, 0xe6, 0x72]);
        std::fs::write(dir.path().join(raw), b"x").unwrap();

        let listing = LocalFileSystemAdapter::new()
            .list_dir(dir.path())
            .await
            .unwrap();
        assert_eq!(listing.files[0].name, "blåbær");
        assert_eq!(listing.files[0].path, dir.path().join(raw));
    }

    #[tokio::test]
    async fn test_compute_hash_known_values() {
        let dir = TempDir::new().unwrap();
        let fs = LocalFileSystemAdapter::new();

        let empty = dir.path().join("empty");
        std::fs::write(&empty, b"").unwrap();
        assert_eq!(
            fs.compute_hash(&empty).await.unwrap().as_str(),
            "d41d8cd98f00b204e9800998ecf8427e"
        );

        let hello = dir.path().join("hello");
        std::fs::write(&hello, b"hello world").unwrap();
        assert_eq!(
            fs.compute_hash(&hello).await.unwrap().as_str(),
            "5eb63bbbe01eeed093cb22bb8f5acdc3"
        );
    }

    #[tokio::test]
    async fn test_compute_hash_spans_chunks() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("big");
        let data = vec![7u8; HASH_CHUNK_SIZE * 2 + 17];
        std::fs::write(&path, &data).unwrap();

        let hash = LocalFileSystemAdapter::new()
            .compute_hash(&path)
            .await
            .unwrap();
        assert_eq!(hash, FileHash::from_digest(md5::compute(&data).0));
    }

    #[tokio::test]
    async fn test_stat_reports_size() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("f");
        std::fs::write(&path, b"12345").unwrap();

        let stamp = LocalFileSystemAdapter::new().stat(&path).await.unwrap();
        assert_eq!(stamp.size, 5);
    }
}
