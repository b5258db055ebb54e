//! Reconciliation driver
//!
//! The [`Reconciler`] consumes a stream of [`DirectoryDiff`]s and, for each
//! directory, runs the four actions in a fixed order:
//!
//! 1. **Create**: upload every local-only file (symbolic links whose target
//!    is excluded or missing are skipped)
//! 2. **Delete**: remove remote-only files (when pruning files)
//! 3. **ConditionalReplace**: resolve every file present on both sides
//!    through the replace-if-changed state machine
//! 4. **DeleteFolder**: remove remote-only folders (when pruning folders)
//!
//! A remote-only folder named like a local-only file is deleted ahead of
//! step 1 so the upload does not land on a folder.
//!
//! ## Fingerprints
//!
//! A local file is stat'ed before its hash is looked up or computed, and the
//! hash is recorded and uploaded against that stamp. When the stamp changes
//! while the file is hashed, the action fails for that file and nothing is
//! recorded.
//!
//! Each action is isolated: its failure is recorded against the path and
//! the run moves on. Only a `PathMismatch` from the diff stream stops the
//! run, because every later classification under that folder would be wrong.
//!
//! ## Concurrency
//!
//! With one worker every action runs inline, so all actions for a directory
//! are attempted before any subdirectory is diffed. With more workers,
//! uploads (creates and replaces) are spawned onto a bounded pool while
//! deletes stay inline; all transfers of a directory are joined before the
//! next diff is requested.
//!
//! ## Dry run
//!
//! Classification, hashing and logging are identical to a real run; no
//! upload or delete call reaches the remote tree.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::{Stream, StreamExt};
use jottasync_core::{
    config::{SyncConfig, TransferConfig},
    domain::{
        ActionKind, DirectoryDiff, ErrorKind, FileHash, RemoteEntry, RemoteFile, RemoteFileState,
        SummaryReport, SyncError, SyncFile,
    },
    exclusion::ExclusionFilter,
    filename,
    ports::{FileStamp, IFingerprintCache, ILocalTree, IRemoteTree, LinkStatus, UploadSource},
};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::progress::{humanize_bytes, Throughput};
use crate::replace::ReplaceState;
use crate::retry::{with_retry, RetryPolicy};
use crate::ReconcileError;

// ============================================================================
// Policy and options
// ============================================================================

/// What the driver is allowed to do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconcilePolicy {
    /// Delete remote-only files
    pub prune_files: bool,
    /// Delete remote-only folders
    pub prune_folders: bool,
    /// Suppress every remote mutation
    pub dry_run: bool,
}

impl Default for ReconcilePolicy {
    fn default() -> Self {
        Self {
            prune_files: true,
            prune_folders: true,
            dry_run: false,
        }
    }
}

impl From<&SyncConfig> for ReconcilePolicy {
    fn from(config: &SyncConfig) -> Self {
        Self {
            prune_files: config.prune_files,
            prune_folders: config.prune_folders,
            dry_run: config.dry_run,
        }
    }
}

/// Transfer pool sizing and retry behavior
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferOptions {
    /// Concurrent uploads; `1` runs every action inline
    pub workers: usize,
    pub retry: RetryPolicy,
}

impl Default for TransferOptions {
    fn default() -> Self {
        Self {
            workers: 1,
            retry: RetryPolicy::default(),
        }
    }
}

impl From<&TransferConfig> for TransferOptions {
    fn from(config: &TransferConfig) -> Self {
        Self {
            workers: config.workers.max(1) as usize,
            retry: RetryPolicy::new(
                config.max_retries,
                Duration::from_millis(config.retry_base_delay_ms),
            ),
        }
    }
}

/// Successful result of one action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Created { bytes: u64 },
    Deleted,
    Replaced { bytes: u64 },
    Resumed { bytes: u64 },
    Unchanged,
    FolderDeleted,
    Skipped,
}

// ============================================================================
// Reconciler
// ============================================================================

/// Turns directory diffs into remote mutations
pub struct Reconciler {
    ctx: Arc<ActionContext>,
    workers: usize,
    permits: Arc<Semaphore>,
    cancel: CancellationToken,
}

impl Reconciler {
    pub fn new(
        remote: Arc<dyn IRemoteTree>,
        local: Arc<dyn ILocalTree>,
        fingerprints: Arc<dyn IFingerprintCache>,
        exclude: ExclusionFilter,
        policy: ReconcilePolicy,
        transfer: TransferOptions,
    ) -> Self {
        let workers = transfer.workers.max(1);
        Self {
            ctx: Arc::new(ActionContext {
                remote,
                local,
                fingerprints,
                exclude,
                policy,
                retry: transfer.retry,
            }),
            workers,
            permits: Arc::new(Semaphore::new(workers)),
            cancel: CancellationToken::new(),
        }
    }

    /// Uses an externally owned cancellation token
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Token that stops the run when cancelled
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Reconciles every diff of the stream
    ///
    /// # Errors
    /// Returns [`ReconcileError::Aborted`] with the partial report when the
    /// stream yields a `PathMismatch`.
    pub async fn reconcile<S>(&self, diffs: S) -> Result<SummaryReport, ReconcileError>
    where
        S: Stream<Item = Result<DirectoryDiff, SyncError>>,
    {
        let started = Instant::now();
        let policy = self.ctx.policy;
        let mut report = SummaryReport::new(policy.dry_run);
        futures_util::pin_mut!(diffs);

        info!(
            dry_run = policy.dry_run,
            prune_files = policy.prune_files,
            prune_folders = policy.prune_folders,
            workers = self.workers,
            fingerprints = self.ctx.fingerprints.name(),
            "Reconciliation started"
        );

        loop {
            if self.cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }
            let next = tokio::select! {
                biased;
                () = self.cancel.cancelled() => {
                    report.cancelled = true;
                    break;
                }
                next = diffs.next() => next,
            };

            match next {
                None => break,
                Some(Ok(diff)) => self.reconcile_directory(diff, &mut report).await,
                Some(Err(err)) if err.kind == ErrorKind::PathMismatch => {
                    error!(path = %err.path, error = %err.message, "Remote layout does not match, aborting");
                    report.record_failure(&err);
                    report.duration_ms = elapsed_ms(started);
                    return Err(ReconcileError::Aborted {
                        source: err,
                        report: Box::new(report),
                    });
                }
                Some(Err(err)) => {
                    warn!(path = %err.path, kind = %err.kind, error = %err.message, "Directory skipped");
                    report.record_failure(&err);
                }
            }
        }

        report.duration_ms = elapsed_ms(started);
        if report.cancelled {
            warn!("Reconciliation cancelled, report is partial");
        }
        info!(
            created = report.created,
            deleted = report.deleted,
            replaced = report.replaced,
            resumed = report.resumed,
            unchanged = report.unchanged,
            folders_deleted = report.folders_deleted,
            skipped = report.skipped,
            failures = report.failure_count(),
            uploaded = %humanize_bytes(report.bytes_uploaded),
            duration_ms = report.duration_ms,
            "Reconciliation finished"
        );
        Ok(report)
    }

    #[instrument(skip_all, fields(dir = %diff.local_dir.display()))]
    async fn reconcile_directory(&self, diff: DirectoryDiff, report: &mut SummaryReport) {
        let policy = self.ctx.policy;
        report.directories += 1;
        info!(
            remote = diff.remote_dir.as_ref().map(|p| p.as_str()).unwrap_or_default(),
            dry_run = policy.dry_run,
            "Entering directory"
        );

        let mut throughput = Throughput::start();
        let mut transfers: JoinSet<(SyncFile, ActionKind, Result<Outcome, SyncError>)> =
            JoinSet::new();

        let mut plan: Vec<(ActionKind, SyncFile)> = Vec::with_capacity(diff.len());
        let mut folder_deletes = Vec::new();
        if policy.prune_folders {
            let uploads: HashSet<String> = diff
                .only_local
                .iter()
                .filter_map(|f| f.remote_path.file_name())
                .map(filename::normalize)
                .collect();
            for folder in diff.only_remote_folders {
                let blocks_upload = folder
                    .remote_path
                    .file_name()
                    .is_some_and(|name| uploads.contains(&filename::normalize(name)));
                if blocks_upload {
                    plan.push((ActionKind::DeleteFolder, folder));
                } else {
                    folder_deletes.push(folder);
                }
            }
        }
        plan.extend(diff.only_local.into_iter().map(|f| (ActionKind::Create, f)));
        if policy.prune_files {
            plan.extend(diff.only_remote.into_iter().map(|f| (ActionKind::Delete, f)));
        }
        plan.extend(
            diff.both
                .into_iter()
                .map(|f| (ActionKind::ConditionalReplace, f)),
        );
        plan.extend(
            folder_deletes
                .into_iter()
                .map(|f| (ActionKind::DeleteFolder, f)),
        );

        for (kind, file) in plan {
            if self.cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }

            let spawnable = matches!(kind, ActionKind::Create | ActionKind::ConditionalReplace);
            if self.workers > 1 && spawnable {
                let permit = tokio::select! {
                    biased;
                    () = self.cancel.cancelled() => {
                        report.cancelled = true;
                        break;
                    }
                    permit = self.permits.clone().acquire_owned() => permit,
                };
                let Ok(permit) = permit else {
                    break;
                };
                let ctx = Arc::clone(&self.ctx);
                transfers.spawn(async move {
                    let _permit = permit;
                    let result = ctx.run(kind, &file).await;
                    (file, kind, result)
                });
            } else {
                let result = self.ctx.run(kind, &file).await;
                tally(report, &mut throughput, &file, kind, result);
            }
        }

        while let Some(joined) = transfers.join_next().await {
            match joined {
                Ok((file, kind, result)) => tally(report, &mut throughput, &file, kind, result),
                Err(err) => {
                    let failure = SyncError::new(
                        ErrorKind::Other,
                        diff.local_dir.display().to_string(),
                        format!("transfer task failed: {err}"),
                    );
                    warn!(error = %err, "Transfer task failed");
                    report.record_failure(&failure);
                }
            }
        }

        if let Some(rate) = throughput.rate() {
            info!(
                uploaded = %humanize_bytes(throughput.bytes()),
                rate = %rate,
                "Directory uploaded"
            );
        }
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

/// Folds one action result into the report
fn tally(
    report: &mut SummaryReport,
    throughput: &mut Throughput,
    file: &SyncFile,
    kind: ActionKind,
    result: Result<Outcome, SyncError>,
) {
    match result {
        Ok(outcome) => {
            debug!(action = %kind, path = %file.remote_path, ?outcome, "Action done");
            match outcome {
                Outcome::Created { bytes } => {
                    report.created += 1;
                    report.bytes_uploaded += bytes;
                    throughput.add(bytes);
                }
                Outcome::Replaced { bytes } => {
                    report.replaced += 1;
                    report.bytes_uploaded += bytes;
                    throughput.add(bytes);
                }
                Outcome::Resumed { bytes } => {
                    report.resumed += 1;
                    report.bytes_uploaded += bytes;
                    throughput.add(bytes);
                }
                Outcome::Deleted => report.deleted += 1,
                Outcome::FolderDeleted => report.folders_deleted += 1,
                Outcome::Unchanged => report.unchanged += 1,
                Outcome::Skipped => report.skipped += 1,
            }
        }
        Err(err) => {
            warn!(
                action = %kind,
                path = %err.path,
                kind = %err.kind,
                error = %err.message,
                "Action failed"
            );
            report.record_failure(&err);
        }
    }
}

// ============================================================================
// Actions
// ============================================================================

/// Everything an action needs, shared with spawned transfers
struct ActionContext {
    remote: Arc<dyn IRemoteTree>,
    local: Arc<dyn ILocalTree>,
    fingerprints: Arc<dyn IFingerprintCache>,
    exclude: ExclusionFilter,
    policy: ReconcilePolicy,
    retry: RetryPolicy,
}

impl ActionContext {
    async fn run(&self, kind: ActionKind, file: &SyncFile) -> Result<Outcome, SyncError> {
        match kind {
            ActionKind::Create => self.create(file).await,
            ActionKind::Delete => self.delete(file).await,
            ActionKind::ConditionalReplace => self.replace(file).await,
            ActionKind::DeleteFolder => self.delete_folder(file).await,
        }
    }

    #[instrument(skip_all, fields(remote = %file.remote_path))]
    async fn create(&self, file: &SyncFile) -> Result<Outcome, SyncError> {
        match self.local.link_status(&file.local_path).await? {
            LinkStatus::Dangling => {
                info!(local = %file.local_path.display(), "Skipping dangling link");
                return Ok(Outcome::Skipped);
            }
            LinkStatus::Target(target) if self.exclude.is_path_excluded(&target) => {
                info!(
                    local = %file.local_path.display(),
                    target = %target.display(),
                    "Skipping link to excluded path"
                );
                return Ok(Outcome::Skipped);
            }
            LinkStatus::Target(_) | LinkStatus::NotALink => {}
        }
        self.upload_new(file).await
    }

    async fn upload_new(&self, file: &SyncFile) -> Result<Outcome, SyncError> {
        info!(dry_run = self.policy.dry_run, "Upload new file");
        if self.policy.dry_run {
            return Ok(Outcome::Created { bytes: 0 });
        }
        let (stamp, hash) = self.local_fingerprint(&file.local_path).await?;
        let source = upload_source(&file.local_path, stamp, hash);
        let uploaded = with_retry("upload", self.retry, || {
            self.remote.upload(&file.remote_path, &source)
        })
        .await?;
        self.verify(file, &source, &uploaded)?;
        self.remember(&file.local_path, stamp, &source.hash).await;
        Ok(Outcome::Created { bytes: source.size })
    }

    #[instrument(skip_all, fields(remote = %file.remote_path))]
    async fn replace(&self, file: &SyncFile) -> Result<Outcome, SyncError> {
        let entry = with_retry("stat", self.retry, || self.remote.stat(&file.remote_path)).await?;
        let remote = match entry {
            RemoteEntry::File(remote) => remote,
            RemoteEntry::Absent => {
                debug!("Remote file vanished since listing");
                return self.upload_new(file).await;
            }
            other => {
                return Err(SyncError::new(
                    ErrorKind::PathMismatch,
                    file.remote_path.as_str(),
                    format!("expected a file, found {}", other.kind_name()),
                ));
            }
        };

        let (stamp, hash) = self.local_fingerprint(&file.local_path).await?;
        let state = ReplaceState::resolve(&remote.state, &hash).map_err(|mismatch| {
            SyncError::hash_mismatch(
                file.local_path.display().to_string(),
                mismatch.expected.as_str(),
                mismatch.actual.as_str(),
            )
        })?;
        debug!(remote_state = remote.state.name(), next = %state, "Replace state resolved");

        match state {
            ReplaceState::Unchanged => {
                self.remember(&file.local_path, stamp, &hash).await;
                Ok(Outcome::Unchanged)
            }
            ReplaceState::NeedsReplace => {
                info!(dry_run = self.policy.dry_run, "Upload new revision");
                if self.policy.dry_run {
                    return Ok(Outcome::Replaced { bytes: 0 });
                }
                let source = upload_source(&file.local_path, stamp, hash);
                let uploaded = with_retry("upload", self.retry, || {
                    self.remote.upload(&file.remote_path, &source)
                })
                .await?;
                self.verify(file, &source, &uploaded)?;
                self.remember(&file.local_path, stamp, &source.hash).await;
                Ok(Outcome::Replaced { bytes: source.size })
            }
            ReplaceState::NeedsResume { offset } => {
                info!(offset, dry_run = self.policy.dry_run, "Resume incomplete upload");
                if self.policy.dry_run {
                    return Ok(Outcome::Resumed { bytes: 0 });
                }
                let source = upload_source(&file.local_path, stamp, hash);
                let uploaded = with_retry("resume_upload", self.retry, || {
                    self.remote.resume_upload(&file.remote_path, &source, offset)
                })
                .await?;
                self.verify(file, &source, &uploaded)?;
                self.remember(&file.local_path, stamp, &source.hash).await;
                Ok(Outcome::Resumed {
                    bytes: source.size.saturating_sub(offset),
                })
            }
            ReplaceState::NeedsHash => Err(SyncError::new(
                ErrorKind::Other,
                file.remote_path.as_str(),
                "replace state did not resolve",
            )),
        }
    }

    #[instrument(skip_all, fields(remote = %file.remote_path))]
    async fn delete(&self, file: &SyncFile) -> Result<Outcome, SyncError> {
        info!(dry_run = self.policy.dry_run, "Delete remote file");
        if self.policy.dry_run {
            return Ok(Outcome::Deleted);
        }
        let deleted =
            with_retry("delete", self.retry, || self.remote.delete(&file.remote_path)).await?;
        if deleted {
            Ok(Outcome::Deleted)
        } else {
            Err(not_confirmed(file))
        }
    }

    #[instrument(skip_all, fields(remote = %file.remote_path))]
    async fn delete_folder(&self, file: &SyncFile) -> Result<Outcome, SyncError> {
        info!(dry_run = self.policy.dry_run, "Delete remote folder");
        if self.policy.dry_run {
            return Ok(Outcome::FolderDeleted);
        }
        let deleted = with_retry("delete_folder", self.retry, || {
            self.remote.delete_folder(&file.remote_path)
        })
        .await?;
        if deleted {
            Ok(Outcome::FolderDeleted)
        } else {
            Err(not_confirmed(file))
        }
    }

    /// Stamp of the file and its hash at that stamp
    ///
    /// The hash comes from the fingerprint cache when one was recorded at
    /// the same stamp and is computed otherwise.
    async fn local_fingerprint(&self, path: &Path) -> Result<(FileStamp, FileHash), SyncError> {
        let stamp = self.local.stat(path).await?;
        if let Some(hash) = self.fingerprints.lookup(path, stamp).await {
            debug!(path = %path.display(), "Fingerprint hit");
            return Ok((stamp, hash));
        }
        let hash = self.local.compute_hash(path).await?;
        let after = self.local.stat(path).await?;
        if after != stamp {
            return Err(SyncError::new(
                ErrorKind::FilesystemError,
                path.display().to_string(),
                "file changed while it was being hashed",
            ));
        }
        self.remember(path, stamp, &hash).await;
        Ok((stamp, hash))
    }

    async fn remember(&self, path: &Path, stamp: FileStamp, hash: &FileHash) {
        if self.policy.dry_run {
            return;
        }
        if let Err(err) = self.fingerprints.store(path, stamp, hash).await {
            debug!(path = %path.display(), error = %err, "Fingerprint not stored");
        }
    }

    /// Rejects an upload the store recorded with different content
    fn verify(
        &self,
        file: &SyncFile,
        source: &UploadSource,
        uploaded: &RemoteFile,
    ) -> Result<(), SyncError> {
        match &uploaded.state {
            RemoteFileState::Completed { hash } if *hash != source.hash => Err(SyncError::new(
                ErrorKind::HashMismatch,
                file.remote_path.as_str(),
                format!(
                    "store recorded {hash} after upload, local content is {}",
                    source.hash
                ),
            )),
            _ => Ok(()),
        }
    }
}

fn upload_source(path: &Path, stamp: FileStamp, hash: FileHash) -> UploadSource {
    UploadSource {
        local_path: path.to_path_buf(),
        size: stamp.size,
        hash,
        modified: stamp.modified(),
    }
}

fn not_confirmed(file: &SyncFile) -> SyncError {
    SyncError::new(
        ErrorKind::Other,
        file.remote_path.as_str(),
        "store did not confirm the deletion",
    )
}
