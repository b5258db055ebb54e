//! Integration tests for jottasync-jfs
//!
//! Uses wiremock to simulate the JFS API and verifies end-to-end behavior
//! of metadata lookups, uploads, resumed uploads and deletions through the
//! `IRemoteTree` port.

mod common;

mod test_delete;
mod test_stat;
mod test_upload;
