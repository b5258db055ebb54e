//! Local to remote path translation
//!
//! The remote location of a local directory `D` under the walked root `R`
//! is `remote_root / basename(R) / relpath(D, R)`. Translation is purely
//! lexical: no filesystem access, no symlink resolution.

use std::path::{Component, Path, PathBuf};

#[cfg(unix)]
use std::os::unix::ffi::OsStrExt;

use crate::domain::errors::DomainError;
use crate::domain::newtypes::RemotePath;
use crate::filename;

/// Maps a local directory onto its remote path
///
/// Every appended segment is decoded and NFC-normalized the same way the
/// local walk normalizes names, so translated paths line up with diff keys.
///
/// # Errors
/// Returns [`DomainError::InvalidPath`] if `local_dir` is not inside
/// `local_root`, or [`DomainError::InvalidRemotePath`] if a segment cannot
/// be represented remotely.
pub fn translate(
    local_root: &Path,
    local_dir: &Path,
    remote_root: &RemotePath,
) -> Result<RemotePath, DomainError> {
    let root = lexical_normalize(local_root);
    let dir = lexical_normalize(local_dir);

    let relative = dir.strip_prefix(&root).map_err(|_| {
        DomainError::InvalidPath(format!(
            "{} is not inside {}",
            local_dir.display(),
            local_root.display()
        ))
    })?;

    let mut remote = remote_root.clone();
    if let Some(base) = root.file_name() {
        remote = remote.join(&segment(base))?;
    }

    for component in relative.components() {
        if let Component::Normal(part) = component {
            remote = remote.join(&segment(part))?;
        }
    }

    Ok(remote)
}

#[cfg(unix)]
fn segment(part: &std::ffi::OsStr) -> String {
    filename::comparable_name(part.as_bytes())
}

#[cfg(not(unix))]
fn segment(part: &std::ffi::OsStr) -> String {
    filename::normalize(&part.to_string_lossy())
}

/// Removes `.` components and folds `..` into the preceding component
fn lexical_normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push(component);
                }
            }
            other => out.push(other),
        }
    }
    out
}
