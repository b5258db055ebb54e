//! Append-only failure log
//!
//! Each recorded failure becomes one JSON object on its own line, so a
//! monitoring job can tail the file across runs.

use std::fs::OpenOptions;
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};
use jottasync_core::domain::Failure;

/// Appends `failures` to `path`, creating the file and its parent directory if needed
pub fn append_failures(path: &Path, failures: &[Failure]) -> Result<()> {
    if failures.is_empty() {
        return Ok(());
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open error file {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    for failure in failures {
        serde_json::to_writer(&mut writer, failure).context("Failed to serialize failure")?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;
    Ok(())
}
