//! Port definitions (hexagonal architecture interfaces)
//!
//! This module defines the port traits that form the boundaries of the
//! sync core. The differencer and the reconciliation driver depend only on
//! these traits; implementations live in adapter crates.
//!
//! ## Ports Overview
//!
//! - [`IRemoteTree`] - Stat, upload, resume and delete against the remote store
//! - [`ILocalTree`] - Directory listing, stat, link resolution and hashing
//! - [`IFingerprintCache`] - Side-channel store of known content hashes

pub mod fingerprint;
pub mod local_tree;
pub mod remote_tree;

pub use fingerprint::{FileStamp, IFingerprintCache};
pub use local_tree::{ILocalTree, LinkStatus, LocalDirListing, LocalEntry};
pub use remote_tree::{IRemoteTree, UploadSource};
