//! Shared test helpers for JFS integration tests
//!
//! Provides a wiremock server and a `JfsRemoteTree` pointed at it, plus
//! canned XML documents shaped like real JFS responses.

use std::path::Path;

use chrono::{TimeZone, Utc};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use jottasync_core::domain::{FileHash, RemotePath};
use jottasync_core::ports::UploadSource;
use jottasync_jfs::{Credentials, JfsClient, JfsRemoteTree};

pub const USER: &str = "alice";

/// Starts a mock server and returns it with a tree accessor using it
pub async fn setup_jfs_mock() -> (MockServer, JfsRemoteTree) {
    let server = MockServer::start().await;
    let client = JfsClient::with_base_url(Credentials::new(USER, "secret"), server.uri())
        .expect("mock server URI parses");
    (server, JfsRemoteTree::new(client))
}

pub fn remote(p: &str) -> RemotePath {
    RemotePath::new(p.to_string()).unwrap()
}

/// URL path the server sees for a remote path
pub fn server_path(remote_path: &str) -> String {
    format!("/{USER}{remote_path}")
}

pub fn md5_of(content: &[u8]) -> FileHash {
    FileHash::from_digest(md5::compute(content).0)
}

pub fn upload_source(local: &Path, content: &[u8]) -> UploadSource {
    UploadSource {
        local_path: local.to_path_buf(),
        size: content.len() as u64,
        hash: md5_of(content),
        modified: Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
    }
}

pub fn completed_file_xml(name: &str, size: u64, md5: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<file name="{name}" uuid="37530f11-d55b-4f31-acf4-27854813cd34" time="2024-03-01-T12:00:01Z" host="dn-029.site-000.jotta.no">
  <path xml:space="preserve">/{USER}/Jotta/Sync</path>
  <abspath xml:space="preserve">/{USER}/Jotta/Sync</abspath>
  <currentRevision>
    <number>1</number>
    <state>COMPLETED</state>
    <created>2024-03-01-T12:00:00Z</created>
    <modified>2024-03-01-T12:00:00Z</modified>
    <mime>application/octet-stream</mime>
    <mstyle>APPLICATION_OCTET_STREAM</mstyle>
    <size>{size}</size>
    <md5>{md5}</md5>
    <updated>2024-03-01-T12:00:01Z</updated>
  </currentRevision>
</file>"#
    )
}

pub fn error_xml(code: u16, message: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<error>
  <code>{code}</code>
  <message>{message}</message>
  <reason>Error</reason>
  <cause></cause>
  <hostname>dn-093</hostname>
  <x-id>260045935716</x-id>
</error>"#
    )
}

/// Mounts a GET answering `status` with `body` for `remote_path`
pub async fn mount_get(server: &MockServer, remote_path: &str, status: u16, body: String) {
    Mock::given(method("GET"))
        .and(path(server_path(remote_path)))
        .respond_with(ResponseTemplate::new(status).set_body_string(body))
        .mount(server)
        .await;
}
