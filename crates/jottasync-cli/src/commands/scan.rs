//! Scan command - Mirror a local tree into JottaCloud
//!
//! Provides the `jottasync scan` CLI command which:
//! 1. Loads configuration and applies command-line overrides
//! 2. Builds the JFS, filesystem and fingerprint adapters
//! 3. Streams directory diffs into the reconciliation driver
//! 4. Prints the summary and appends failures to the error file

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context as _, Result};
use clap::Args;
use jottasync_core::config::Config;
use jottasync_core::domain::SummaryReport;
use jottasync_sync::differ::{DifferOptions, TreeDiffer};
use jottasync_sync::filesystem::LocalFileSystemAdapter;
use jottasync_sync::progress::humanize_bytes;
use jottasync_sync::reconcile::Reconciler;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::{connect_remote, ensure_valid, resolve_local_root, shutdown_signal, Context};
use crate::errorfile::append_failures;
use crate::output::{format_duration, plural, OutputFormatter};

#[derive(Debug, Args)]
pub struct ScanCommand {
    /// Local directory to mirror
    pub local: PathBuf,

    /// Remote folder mirroring the directory (default: sync.remote_root)
    pub remote: Option<String>,

    /// Regular expression of paths to ignore (repeatable)
    #[arg(long, value_name = "REGEX")]
    pub exclude: Vec<String>,

    /// Show what would be done without making changes
    #[arg(long)]
    pub dry_run: bool,

    /// Keep remote files that no longer exist locally
    #[arg(long)]
    pub no_prune_files: bool,

    /// Keep remote folders that no longer exist locally
    #[arg(long)]
    pub no_prune_folders: bool,

    /// Concurrent uploads
    #[arg(long)]
    pub workers: Option<u32>,

    /// Append failures to this file as JSON lines
    #[arg(long, value_name = "PATH")]
    pub errorfile: Option<PathBuf>,

    /// Fingerprint cache backend (xattr, sqlite, memory, none)
    #[arg(long, value_name = "BACKEND")]
    pub fingerprint: Option<String>,

    /// Descend into symlinked directories
    #[arg(long)]
    pub follow_links: bool,
}

impl ScanCommand {
    pub async fn execute(&self, ctx: &Context) -> Result<()> {
        let formatter = ctx.formatter();

        let mut config = ctx.load_config();
        self.apply_overrides(&mut config);
        ensure_valid(&config)?;

        let local_root = resolve_local_root(&self.local).await?;
        let remote_root = config.remote_root()?;
        let exclude = config.exclusion_filter()?;

        let remote = connect_remote(&config)?;
        let local = Arc::new(LocalFileSystemAdapter::new());
        let fingerprints = jottasync_cache::open_backend(&config.fingerprint)
            .await
            .context("Failed to open fingerprint cache")?;

        let differ = TreeDiffer::new(
            local.clone(),
            remote.clone(),
            local_root.clone(),
            remote_root.clone(),
            DifferOptions {
                exclude: exclude.clone(),
                follow_links: config.sync.follow_links,
            },
        );

        let cancel = CancellationToken::new();
        let reconciler = Reconciler::new(
            remote,
            local,
            fingerprints,
            exclude,
            (&config.sync).into(),
            (&config.transfer).into(),
        )
        .with_cancellation(cancel.clone());
        tokio::spawn(shutdown_signal(cancel));

        if config.sync.dry_run {
            formatter.info("Dry run mode - no changes will be made");
        }
        formatter.info(&format!(
            "Scanning {} -> {}",
            local_root.display(),
            remote_root
        ));
        info!(local = %local_root.display(), remote = %remote_root, "Starting scan");

        let (report, aborted) = match reconciler.reconcile(differ.into_stream()).await {
            Ok(report) => (report, None),
            Err(e) => (e.report().clone(), Some(e.cause().clone())),
        };

        if let Some(path) = &config.logging.error_file {
            if let Err(e) = append_failures(path, &report.failures) {
                warn!(error = %e, "Failed to write error file");
                formatter.warn(&format!("Could not write {}: {e:#}", path.display()));
            }
        }

        if ctx.is_json() {
            let mut json =
                serde_json::to_value(&report).context("Failed to serialize report to JSON")?;
            if let (Some(cause), Some(object)) = (&aborted, json.as_object_mut()) {
                object.insert("aborted".into(), serde_json::json!(cause.to_string()));
            }
            formatter.print_json(&json);
        } else {
            print_summary(formatter.as_ref(), &report);
        }

        if let Some(cause) = aborted {
            anyhow::bail!("Scan aborted: {cause}");
        }
        if report.cancelled {
            anyhow::bail!("Scan cancelled");
        }
        if !report.failures.is_empty() {
            anyhow::bail!(
                "{} failed",
                plural(report.failure_count() as u64, "item")
            );
        }
        Ok(())
    }

    /// Command-line flags take precedence over the config file
    fn apply_overrides(&self, config: &mut Config) {
        if let Some(remote) = &self.remote {
            config.sync.remote_root = remote.clone();
        }
        config.sync.exclude.extend(self.exclude.iter().cloned());
        config.sync.dry_run |= self.dry_run;
        config.sync.follow_links |= self.follow_links;
        if self.no_prune_files {
            config.sync.prune_files = false;
        }
        if self.no_prune_folders {
            config.sync.prune_folders = false;
        }
        if let Some(workers) = self.workers {
            config.transfer.workers = workers;
        }
        if let Some(backend) = &self.fingerprint {
            config.fingerprint.backend = backend.clone();
        }
        if let Some(path) = &self.errorfile {
            config.logging.error_file = Some(path.clone());
        }
    }
}

fn print_summary(formatter: &dyn OutputFormatter, report: &SummaryReport) {
    let duration = format_duration(report.duration_ms);
    if report.cancelled {
        formatter.warn(&format!("Scan cancelled after {duration}"));
    } else if report.mutations() == 0 && report.is_success() {
        formatter.success(&format!("Already up to date ({duration})"));
    } else if report.dry_run {
        formatter.success(&format!("Dry run completed in {duration}"));
    } else {
        formatter.success(&format!("Scan completed in {duration}"));
    }

    let lines = [
        ("Created:", report.created, "file"),
        ("Replaced:", report.replaced, "file"),
        ("Resumed:", report.resumed, "file"),
        ("Deleted:", report.deleted, "file"),
        ("Pruned:", report.folders_deleted, "folder"),
        ("Skipped:", report.skipped, "link"),
    ];
    for (label, count, noun) in lines {
        if count > 0 {
            formatter.info(&format!("{label:<11}{}", plural(count, noun)));
        }
    }
    formatter.info(&format!(
        "{:<11}{} in {}",
        "Checked:",
        plural(report.processed(), "file"),
        plural(report.directories, "folder")
    ));
    if report.bytes_uploaded > 0 {
        formatter.info(&format!(
            "{:<11}{}",
            "Uploaded:",
            humanize_bytes(report.bytes_uploaded)
        ));
    }

    if !report.failures.is_empty() {
        formatter.error(&format!(
            "{} occurred:",
            plural(report.failure_count() as u64, "error")
        ));
        for failure in &report.failures {
            formatter.info(&format!(
                "  {} [{}] {}",
                failure.path, failure.kind, failure.message
            ));
        }
    }
}
