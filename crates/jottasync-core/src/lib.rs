//! jottasync Core - Domain types and contracts for tree synchronization
//!
//! This crate contains the hexagonal architecture core with:
//! - **Domain types** - `SyncFile`, `DirectoryDiff`, `RemoteEntry`, `SummaryReport`
//! - **Error taxonomy** - `ErrorKind`, `SyncError`, `RemoteError`
//! - **Port definitions** - Traits for adapters: `IRemoteTree`, `ILocalTree`, `IFingerprintCache`
//! - **Pure helpers** - path translation, exclusion filtering, filename decoding
//!
//! # Architecture
//!
//! The domain module holds plain data with no I/O. Ports define the trait
//! interfaces that the sync engine consumes and that adapter crates
//! (`jottasync-jfs`, `jottasync-cache`, `jottasync-sync`) implement.

pub mod config;
pub mod domain;
pub mod exclusion;
pub mod filename;
pub mod path;
pub mod ports;
