//! Subcommands and the wiring they share

pub mod config;
pub mod diff;
pub mod scan;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context as _, Result};
use jottasync_core::config::Config;
use jottasync_jfs::{Credentials, JfsClient, JfsRemoteTree};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::output::{get_formatter, OutputFormat, OutputFormatter};

/// Global options every subcommand receives
#[derive(Debug, Clone)]
pub struct Context {
    pub format: OutputFormat,
    pub quiet: bool,
    pub config_path: PathBuf,
}

impl Context {
    pub fn formatter(&self) -> Box<dyn OutputFormatter> {
        get_formatter(self.format, self.quiet)
    }

    pub fn is_json(&self) -> bool {
        matches!(self.format, OutputFormat::Json)
    }

    /// Loads the config file, falling back to defaults when it is absent
    pub fn load_config(&self) -> Config {
        let config = Config::load_or_default(&self.config_path);
        info!(config_path = %self.config_path.display(), "Loaded configuration");
        config
    }
}

/// Canonical form of the directory to walk
pub async fn resolve_local_root(path: &Path) -> Result<PathBuf> {
    let root = tokio::fs::canonicalize(path)
        .await
        .with_context(|| format!("Cannot access {}", path.display()))?;
    let metadata = tokio::fs::metadata(&root).await?;
    if !metadata.is_dir() {
        anyhow::bail!("{} is not a directory", root.display());
    }
    Ok(root)
}

/// Remote accessor authenticated from the config file and environment
pub fn connect_remote(config: &Config) -> Result<Arc<JfsRemoteTree>> {
    let credentials = Credentials::from_env(config.remote.username.as_deref())
        .context("JottaCloud credentials are not configured")?;
    let client =
        JfsClient::new(&config.remote, credentials).context("Failed to build JFS client")?;
    info!(
        user = %client.username(),
        device = %client.device_name(),
        "Connected to JottaCloud"
    );
    Ok(Arc::new(JfsRemoteTree::new(client)))
}

/// Fails with every validation problem when the effective config is unusable
pub fn ensure_valid(config: &Config) -> Result<()> {
    let errors = config.validate();
    if errors.is_empty() {
        return Ok(());
    }
    let details: Vec<String> = errors.iter().map(ToString::to_string).collect();
    anyhow::bail!("Invalid configuration: {}", details.join("; "))
}

/// Cancels `token` on SIGINT or SIGTERM
pub async fn shutdown_signal(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT (Ctrl+C)"),
        _ = terminate => info!("Received SIGTERM"),
    }

    token.cancel();
}
