//! Reconciliation run summary

use serde::{Deserialize, Serialize};

use super::errors::{ErrorKind, SyncError};

/// One recorded per-item failure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Failure {
    /// Path of the item whose action failed
    pub path: String,
    /// Classification of the cause
    pub kind: ErrorKind,
    /// Human-readable cause
    pub message: String,
}

impl From<&SyncError> for Failure {
    fn from(err: &SyncError) -> Self {
        Self {
            path: err.path.clone(),
            kind: err.kind,
            message: err.message.clone(),
        }
    }
}

/// Summary of a complete reconciliation pass
///
/// Counts are per action outcome. A dry run fills the same counters with
/// what a real run would have done.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryReport {
    /// Local-only files uploaded as new
    pub created: u64,
    /// Remote-only files deleted
    pub deleted: u64,
    /// Changed files uploaded as a new revision
    pub replaced: u64,
    /// Incomplete uploads continued
    pub resumed: u64,
    /// Files whose content matched the remote hash
    pub unchanged: u64,
    /// Remote-only folders deleted
    pub folders_deleted: u64,
    /// Local entries deliberately not acted on (symlinks)
    pub skipped: u64,
    /// Directories visited
    pub directories: u64,
    /// Payload bytes sent to the store
    pub bytes_uploaded: u64,
    /// Every item that failed, with its cause
    pub failures: Vec<Failure>,
    /// Whether mutations were suppressed
    pub dry_run: bool,
    /// Whether the run stopped early on user request
    pub cancelled: bool,
    /// Wall-clock duration of the run
    pub duration_ms: u64,
}

impl SummaryReport {
    pub fn new(dry_run: bool) -> Self {
        Self {
            dry_run,
            ..Self::default()
        }
    }

    /// Records a failed item
    pub fn record_failure(&mut self, err: &SyncError) {
        self.failures.push(Failure::from(err));
    }

    /// Items that completed an action (including `unchanged`)
    #[must_use]
    pub fn processed(&self) -> u64 {
        self.created
            + self.deleted
            + self.replaced
            + self.resumed
            + self.unchanged
            + self.folders_deleted
    }

    /// Items that changed the remote tree
    #[must_use]
    pub fn mutations(&self) -> u64 {
        self.created + self.deleted + self.replaced + self.resumed + self.folders_deleted
    }

    #[must_use]
    pub fn failure_count(&self) -> usize {
        self.failures.len()
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failures.is_empty() && !self.cancelled
    }
}
