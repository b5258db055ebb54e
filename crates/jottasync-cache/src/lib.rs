//! jottasync Cache - Fingerprint stores
//!
//! Implementations of the `IFingerprintCache` port from `jottasync-core`.
//! Every backend maps a local path to the content hash observed at a given
//! `(size, mtime)` stamp and reports a miss as soon as the caller's stamp
//! differs.
//!
//! ## Key Components
//!
//! - [`XattrFingerprintCache`] - Stores the fingerprint on the file itself
//!   in `user.jottasync.*` extended attributes
//! - [`SqliteFingerprintCache`] - A table in a local SQLite database
//! - [`MemoryFingerprintCache`] - Process-lifetime concurrent map
//! - [`NullFingerprintCache`] - Always misses
//! - [`open_backend`] - Builds the backend named in the configuration
//!
//! ## Usage
//!
//! ```no_run
//! use jottasync_cache::open_backend;
//! use jottasync_core::config::Config;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = Config::default();
//! let cache = open_backend(&config.fingerprint).await?;
//! println!("using {} fingerprints", cache.name());
//! # Ok(())
//! # }
//! ```

pub mod memory;
pub mod null;
pub mod pool;
pub mod sqlite;
pub mod xattr;

use std::sync::Arc;

use jottasync_core::config::FingerprintConfig;
use jottasync_core::ports::IFingerprintCache;

pub use memory::MemoryFingerprintCache;
pub use null::NullFingerprintCache;
pub use pool::DatabasePool;
pub use sqlite::SqliteFingerprintCache;
pub use xattr::XattrFingerprintCache;

/// Errors that can occur during cache operations
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// Failed to establish a database connection
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// A database query failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Schema migration failed
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// A stored value could not be decoded
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// The configured backend name is not known
    #[error("Unknown fingerprint backend: {0}")]
    UnknownBackend(String),
}

impl From<sqlx::Error> for CacheError {
    fn from(e: sqlx::Error) -> Self {
        CacheError::QueryFailed(e.to_string())
    }
}

/// Builds the fingerprint backend selected by `config.backend`
///
/// # Errors
///
/// Returns `CacheError::UnknownBackend` for an unrecognized name, or the
/// database error when the `sqlite` backend cannot be opened.
pub async fn open_backend(
    config: &FingerprintConfig,
) -> Result<Arc<dyn IFingerprintCache>, CacheError> {
    let cache: Arc<dyn IFingerprintCache> = match config.backend.as_str() {
        "xattr" => Arc::new(XattrFingerprintCache::new()),
        "sqlite" => {
            let db = DatabasePool::new(&config.db_path).await?;
            Arc::new(SqliteFingerprintCache::new(db.pool().clone()))
        }
        "memory" => Arc::new(MemoryFingerprintCache::new()),
        "none" => Arc::new(NullFingerprintCache),
        other => return Err(CacheError::UnknownBackend(other.to_string())),
    };
    tracing::debug!(backend = cache.name(), "Fingerprint cache ready");
    Ok(cache)
}
