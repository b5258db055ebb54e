//! Diff command - Show how a local tree differs from its remote mirror
//!
//! Walks the same directory stream `scan` consumes but never mutates the
//! remote. Human output lists only directories that are out of sync; `--json`
//! emits every directory as one JSON object per line.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context as _, Result};
use clap::Args;
use futures_util::StreamExt;
use jottasync_core::domain::{DirectoryDiff, SyncFile};
use jottasync_sync::differ::{DifferOptions, TreeDiffer};
use jottasync_sync::filesystem::LocalFileSystemAdapter;
use tracing::warn;

use super::{connect_remote, ensure_valid, resolve_local_root, Context};
use crate::output::{plural, OutputFormatter};

#[derive(Debug, Args)]
pub struct DiffCommand {
    /// Local directory to compare
    pub local: PathBuf,

    /// Remote folder mirroring the directory (default: sync.remote_root)
    pub remote: Option<String>,

    /// Regular expression of paths to ignore (repeatable)
    #[arg(long, value_name = "REGEX")]
    pub exclude: Vec<String>,

    /// Descend into symlinked directories
    #[arg(long)]
    pub follow_links: bool,

    /// Also list files present on both sides
    #[arg(long)]
    pub all: bool,
}

/// Totals over every directory of the walk
#[derive(Debug, Default, PartialEq, Eq)]
struct DiffTotals {
    directories: u64,
    out_of_sync: u64,
    only_local: u64,
    only_remote: u64,
    only_remote_folders: u64,
    errors: u64,
}

impl DiffTotals {
    fn add(&mut self, diff: &DirectoryDiff) {
        self.directories += 1;
        if !diff.is_in_sync() {
            self.out_of_sync += 1;
        }
        self.only_local += diff.only_local.len() as u64;
        self.only_remote += diff.only_remote.len() as u64;
        self.only_remote_folders += diff.only_remote_folders.len() as u64;
    }
}

impl DiffCommand {
    pub async fn execute(&self, ctx: &Context) -> Result<()> {
        let formatter = ctx.formatter();

        let mut config = ctx.load_config();
        if let Some(remote) = &self.remote {
            config.sync.remote_root = remote.clone();
        }
        config.sync.exclude.extend(self.exclude.iter().cloned());
        config.sync.follow_links |= self.follow_links;
        ensure_valid(&config)?;

        let local_root = resolve_local_root(&self.local).await?;
        let remote_root = config.remote_root()?;
        let differ = TreeDiffer::new(
            Arc::new(LocalFileSystemAdapter::new()),
            connect_remote(&config)?,
            local_root,
            remote_root,
            DifferOptions {
                exclude: config.exclusion_filter()?,
                follow_links: config.sync.follow_links,
            },
        );

        let mut totals = DiffTotals::default();
        let stream = differ.into_stream();
        futures_util::pin_mut!(stream);
        while let Some(item) = stream.next().await {
            match item {
                Ok(diff) => {
                    totals.add(&diff);
                    if ctx.is_json() {
                        let json = serde_json::to_value(&diff)
                            .context("Failed to serialize directory diff")?;
                        formatter.print_json_line(&json);
                    } else {
                        print_directory(formatter.as_ref(), &diff, self.all);
                    }
                }
                Err(e) => {
                    totals.errors += 1;
                    warn!(path = %e.path, kind = %e.kind, "Directory could not be compared");
                    formatter.warn(&e.to_string());
                }
            }
        }

        if !ctx.is_json() {
            print_totals(formatter.as_ref(), &totals);
        }
        if totals.errors > 0 {
            anyhow::bail!(
                "{} could not be compared",
                plural(totals.errors, "path")
            );
        }
        Ok(())
    }
}

fn file_name(file: &SyncFile) -> &str {
    file.remote_path.file_name().unwrap_or_default()
}

fn print_directory(formatter: &dyn OutputFormatter, diff: &DirectoryDiff, all: bool) {
    if diff.is_in_sync() && !all {
        return;
    }
    let remote = diff
        .remote_dir
        .as_ref()
        .map_or_else(|| "-".to_string(), ToString::to_string);
    formatter.info(&format!("{} -> {}", diff.local_dir.display(), remote));

    for file in &diff.only_local {
        formatter.info(&format!("  + {}", file_name(file)));
    }
    for file in &diff.only_remote {
        formatter.info(&format!("  - {}", file_name(file)));
    }
    for folder in &diff.only_remote_folders {
        formatter.info(&format!("  - {}/", file_name(folder)));
    }
    if all {
        for file in &diff.both {
            formatter.info(&format!("  = {}", file_name(file)));
        }
    }
}

fn print_totals(formatter: &dyn OutputFormatter, totals: &DiffTotals) {
    if totals.out_of_sync == 0 && totals.errors == 0 {
        formatter.success(&format!(
            "In sync ({} compared)",
            plural(totals.directories, "folder")
        ));
        return;
    }
    formatter.success(&format!(
        "{} of {} differ",
        totals.out_of_sync,
        plural(totals.directories, "folder")
    ));
    formatter.info(&format!("Local only:  {}", plural(totals.only_local, "file")));
    formatter.info(&format!("Remote only: {}", plural(totals.only_remote, "file")));
    if totals.only_remote_folders > 0 {
        formatter.info(&format!(
            "Remote only: {}",
            plural(totals.only_remote_folders, "folder")
        ));
    }
}
