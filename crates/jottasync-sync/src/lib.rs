//! jottasync Sync - Tree differencer and reconciliation driver
//!
//! Provides:
//! - A lazy per-directory comparison of a local tree with its remote mirror
//! - Idempotent create / delete / replace / folder-delete actions
//! - Resumption of interrupted uploads
//! - Bounded parallel transfers with cooperative cancellation
//!
//! ## Modules
//!
//! - [`filesystem`] - Local filesystem adapter (directory listing, streaming MD5)
//! - [`differ`] - Depth-first tree differencer producing [`DirectoryDiff`]s
//! - [`replace`] - Replace-if-changed state machine
//! - [`reconcile`] - Reconciliation driver turning diffs into remote mutations
//! - [`retry`] - Exponential backoff for transient remote failures
//! - [`progress`] - Throughput accounting and byte formatting
//!
//! [`DirectoryDiff`]: jottasync_core::domain::DirectoryDiff

pub mod differ;
pub mod filesystem;
pub mod progress;
pub mod reconcile;
pub mod replace;
pub mod retry;

#[cfg(test)]
pub(crate) mod testing;

use jottasync_core::domain::{SummaryReport, SyncError};
use thiserror::Error;

/// A reconciliation run that stopped before the diff stream was exhausted
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// The walk hit a remote path of the wrong type; the partial report is attached
    #[error("reconciliation aborted: {source}")]
    Aborted {
        #[source]
        source: SyncError,
        report: Box<SummaryReport>,
    },
}

impl ReconcileError {
    /// The report accumulated before the abort
    #[must_use]
    pub fn report(&self) -> &SummaryReport {
        match self {
            Self::Aborted { report, .. } => report,
        }
    }

    /// The error that stopped the run
    #[must_use]
    pub fn cause(&self) -> &SyncError {
        match self {
            Self::Aborted { source, .. } => source,
        }
    }
}
