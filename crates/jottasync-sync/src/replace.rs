//! Replace-if-changed state machine
//!
//! A file present on both sides starts in [`ReplaceState::NeedsHash`]. Once
//! the local content hash is known, [`ReplaceState::resolve`] moves it to a
//! terminal state based on the remote file's state:
//!
//! | remote state                 | hashes   | next state      |
//! |------------------------------|----------|-----------------|
//! | `Completed`                  | equal    | `Unchanged`     |
//! | `Completed`                  | differ   | `NeedsReplace`  |
//! | `Incomplete` with a hash     | equal    | `NeedsResume`   |
//! | `Incomplete` with a hash     | differ   | error           |
//! | `Incomplete` without a hash  | -        | `NeedsReplace`  |
//! | `Corrupt` / `Deleted`        | -        | `NeedsReplace`  |
//!
//! Hash comparison is exact equality of the MD5 digests.

use std::fmt;

use jottasync_core::domain::{FileHash, RemoteFileState};

/// Position of one file in the replace-if-changed flow
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplaceState {
    /// The local content hash has not been obtained yet
    NeedsHash,
    /// Content already matches; no transfer
    Unchanged,
    /// Continue the interrupted upload at `offset`
    NeedsResume { offset: u64 },
    /// Upload the full content as a new revision
    NeedsReplace,
}

/// The local file is not the one the incomplete upload was started with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResumeMismatch {
    pub expected: FileHash,
    pub actual: FileHash,
}

impl ReplaceState {
    /// Resolves `NeedsHash` against the remote state and the local hash
    ///
    /// # Errors
    /// Returns [`ResumeMismatch`] when the remote holds an incomplete upload
    /// of different content. Resuming would splice two files together.
    pub fn resolve(remote: &RemoteFileState, local: &FileHash) -> Result<Self, ResumeMismatch> {
        match remote {
            RemoteFileState::Completed { hash } if hash == local => Ok(Self::Unchanged),
            RemoteFileState::Completed { .. } => Ok(Self::NeedsReplace),
            RemoteFileState::Incomplete {
                hash: Some(hash),
                uploaded_bytes,
            } => {
                if hash == local {
                    Ok(Self::NeedsResume {
                        offset: *uploaded_bytes,
                    })
                } else {
                    Err(ResumeMismatch {
                        expected: hash.clone(),
                        actual: local.clone(),
                    })
                }
            }
            RemoteFileState::Incomplete { hash: None, .. }
            | RemoteFileState::Corrupt { .. }
            | RemoteFileState::Deleted => Ok(Self::NeedsReplace),
        }
    }

    /// Whether no further transition is possible
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::NeedsHash)
    }

    /// Whether the state results in a transfer
    #[must_use]
    pub fn needs_transfer(&self) -> bool {
        matches!(self, Self::NeedsResume { .. } | Self::NeedsReplace)
    }
}

impl fmt::Display for ReplaceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NeedsHash => f.write_str("needs_hash"),
            Self::Unchanged => f.write_str("unchanged"),
            Self::NeedsResume { offset } => write!(f, "needs_resume@{offset}"),
            Self::NeedsReplace => f.write_str("needs_replace"),
        }
    }
}
