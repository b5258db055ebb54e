//! Configuration module for jottasync.
//!
//! Provides typed configuration structs that map to the YAML configuration file,
//! with loading, validation, defaults, and a builder pattern for programmatic use.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::domain::errors::DomainError;
use crate::domain::newtypes::RemotePath;
use crate::exclusion::ExclusionFilter;

// ---------------------------------------------------------------------------
// Config struct with sub-sections
// ---------------------------------------------------------------------------

/// Top-level configuration for jottasync.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub sync: SyncConfig,
    pub transfer: TransferConfig,
    pub fingerprint: FingerprintConfig,
    pub remote: RemoteConfig,
    pub logging: LoggingConfig,
}

/// Tree comparison and reconciliation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Delete remote files that no longer exist locally.
    pub prune_files: bool,
    /// Delete remote folders that no longer exist locally.
    pub prune_folders: bool,
    /// Compute and log every action without changing the remote tree.
    pub dry_run: bool,
    /// Descend into symlinked directories.
    pub follow_links: bool,
    /// Regular expressions searched against full candidate paths.
    pub exclude: Vec<String>,
    /// Remote folder the walked root is mirrored under.
    pub remote_root: String,
}

/// Upload concurrency and retry settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferConfig {
    /// Concurrent uploads per directory; `1` runs actions strictly in order.
    pub workers: u32,
    /// Retries for transient server errors.
    pub max_retries: u32,
    /// Base delay for exponential backoff, in milliseconds.
    pub retry_base_delay_ms: u64,
}

/// Hash cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FingerprintConfig {
    /// Backend: `xattr`, `sqlite`, `memory`, or `none`.
    pub backend: String,
    /// Database file for the `sqlite` backend.
    pub db_path: PathBuf,
}

/// Remote store endpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// Base URL for metadata and delete requests.
    pub base_url: String,
    /// Base URL for content uploads.
    pub upload_url: String,
    /// Value of the `X-JottaAPIVersion` header.
    pub api_version: String,
    /// Device name sent with uploads.
    pub device_name: String,
    /// Account name. `None` falls back to `JOTTACLOUD_USERNAME`.
    pub username: Option<String>,
}

/// Logging / tracing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: `trace`, `debug`, `info`, `warn`, or `error`.
    pub level: String,
    /// When set, failures are appended here as JSON lines.
    pub error_file: Option<PathBuf>,
}

// ---------------------------------------------------------------------------
// Config::load()
// ---------------------------------------------------------------------------

impl Config {
    /// Load configuration from a YAML file at `path`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Try to load from `path`; fall back to [`Config::default`] on any error.
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_default()
    }

    /// Platform-appropriate default path for the configuration file.
    ///
    /// Typically `$XDG_CONFIG_HOME/jottasync/config.yaml` on Linux.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("jottasync")
            .join("config.yaml")
    }

    /// Compiles `sync.exclude`.
    pub fn exclusion_filter(&self) -> Result<ExclusionFilter, DomainError> {
        ExclusionFilter::new(&self.sync.exclude)
    }

    /// Parses `sync.remote_root`.
    pub fn remote_root(&self) -> Result<RemotePath, DomainError> {
        RemotePath::new(self.sync.remote_root.clone())
    }
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            prune_files: true,
            prune_folders: true,
            dry_run: false,
            follow_links: false,
            exclude: Vec::new(),
            remote_root: "/Jotta/Sync".to_string(),
        }
    }
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            workers: 1,
            max_retries: 3,
            retry_base_delay_ms: 1000,
        }
    }
}

impl Default for FingerprintConfig {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("~/.local/share"))
            .join("jottasync");
        Self {
            backend: "xattr".to_string(),
            db_path: data_dir.join("fingerprints.db"),
        }
    }
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            base_url: "https://www.jottacloud.com/jfs".to_string(),
            upload_url: "https://up.jottacloud.com/jfs".to_string(),
            api_version: "2.2".to_string(),
            device_name: "Jotta".to_string(),
            username: None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            error_file: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Config::validate()
// ---------------------------------------------------------------------------

/// A single validation error found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path to the offending field, e.g. `"transfer.workers"`.
    pub field: String,
    /// Human-readable explanation.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Valid values for `logging.level`.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Valid values for `fingerprint.backend`.
pub const VALID_FINGERPRINT_BACKENDS: &[&str] = &["xattr", "sqlite", "memory", "none"];

/// Upper bound for `transfer.workers`.
pub const MAX_WORKERS: u32 = 32;

impl Config {
    /// Validate the configuration and return all errors found.
    ///
    /// An empty vector means the configuration is valid.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        // --- sync ---
        for pattern in &self.sync.exclude {
            if let Err(e) = ExclusionFilter::new(&[pattern]) {
                errors.push(ValidationError {
                    field: "sync.exclude".into(),
                    message: e.to_string(),
                });
            }
        }
        if let Err(e) = self.remote_root() {
            errors.push(ValidationError {
                field: "sync.remote_root".into(),
                message: e.to_string(),
            });
        }

        // --- transfer ---
        if self.transfer.workers == 0 || self.transfer.workers > MAX_WORKERS {
            errors.push(ValidationError {
                field: "transfer.workers".into(),
                message: format!("must be in range 1..={MAX_WORKERS}"),
            });
        }

        // --- fingerprint ---
        if !VALID_FINGERPRINT_BACKENDS.contains(&self.fingerprint.backend.as_str()) {
            errors.push(ValidationError {
                field: "fingerprint.backend".into(),
                message: format!(
                    "invalid backend '{}'; valid options: {}",
                    self.fingerprint.backend,
                    VALID_FINGERPRINT_BACKENDS.join(", ")
                ),
            });
        }

        // --- remote ---
        if self.remote.base_url.trim().is_empty() {
            errors.push(ValidationError {
                field: "remote.base_url".into(),
                message: "must not be empty".into(),
            });
        }
        if self.remote.upload_url.trim().is_empty() {
            errors.push(ValidationError {
                field: "remote.upload_url".into(),
                message: "must not be empty".into(),
            });
        }
        if self.remote.device_name.trim().is_empty() {
            errors.push(ValidationError {
                field: "remote.device_name".into(),
                message: "must not be empty".into(),
            });
        }

        // --- logging ---
        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            errors.push(ValidationError {
                field: "logging.level".into(),
                message: format!(
                    "invalid level '{}'; valid options: {}",
                    self.logging.level,
                    VALID_LOG_LEVELS.join(", ")
                ),
            });
        }

        errors
    }
}

// ---------------------------------------------------------------------------
// ConfigBuilder
// ---------------------------------------------------------------------------

/// Builder for constructing a [`Config`] programmatically.
///
/// Starts from [`Config::default`] and allows selective overrides.
///
/// # Example
///
/// ```rust,no_run
/// use jottasync_core::config::ConfigBuilder;
///
/// let config = ConfigBuilder::new()
///     .sync_exclude(vec![r"\.tmp$".to_string()])
///     .transfer_workers(4)
///     .logging_level("debug")
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new builder initialised with [`Config::default`] values.
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    // --- sync ---

    pub fn sync_prune_files(mut self, prune: bool) -> Self {
        self.config.sync.prune_files = prune;
        self
    }

    pub fn sync_prune_folders(mut self, prune: bool) -> Self {
        self.config.sync.prune_folders = prune;
        self
    }

    pub fn sync_dry_run(mut self, dry_run: bool) -> Self {
        self.config.sync.dry_run = dry_run;
        self
    }

    pub fn sync_follow_links(mut self, follow: bool) -> Self {
        self.config.sync.follow_links = follow;
        self
    }

    pub fn sync_exclude(mut self, patterns: Vec<String>) -> Self {
        self.config.sync.exclude = patterns;
        self
    }

    pub fn sync_remote_root(mut self, root: impl Into<String>) -> Self {
        self.config.sync.remote_root = root.into();
        self
    }

    // --- transfer ---

    pub fn transfer_workers(mut self, workers: u32) -> Self {
        self.config.transfer.workers = workers;
        self
    }

    pub fn transfer_max_retries(mut self, retries: u32) -> Self {
        self.config.transfer.max_retries = retries;
        self
    }

    pub fn transfer_retry_base_delay_ms(mut self, ms: u64) -> Self {
        self.config.transfer.retry_base_delay_ms = ms;
        self
    }

    // --- fingerprint ---

    pub fn fingerprint_backend(mut self, backend: impl Into<String>) -> Self {
        self.config.fingerprint.backend = backend.into();
        self
    }

    pub fn fingerprint_db_path(mut self, path: PathBuf) -> Self {
        self.config.fingerprint.db_path = path;
        self
    }

    // --- remote ---

    pub fn remote_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.remote.base_url = url.into();
        self
    }

    pub fn remote_upload_url(mut self, url: impl Into<String>) -> Self {
        self.config.remote.upload_url = url.into();
        self
    }

    pub fn remote_username(mut self, username: impl Into<String>) -> Self {
        self.config.remote.username = Some(username.into());
        self
    }

    // --- logging ---

    pub fn logging_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    pub fn logging_error_file(mut self, path: PathBuf) -> Self {
        self.config.logging.error_file = Some(path);
        self
    }

    // --- build ---

    /// Consume the builder and return the finished [`Config`].
    pub fn build(self) -> Config {
        self.config
    }

    /// Build and validate in one step. Returns `Err` with the list of
    /// validation errors if the configuration is invalid.
    pub fn build_validated(self) -> Result<Config, Vec<ValidationError>> {
        let config = self.build();
        let errors = config.validate();
        if errors.is_empty() {
            Ok(config)
        } else {
            Err(errors)
        }
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
