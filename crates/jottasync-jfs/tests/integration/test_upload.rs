//! Integration tests for uploads and resumed uploads

use jottasync_core::domain::{ErrorKind, RemoteFileState};
use jottasync_core::ports::IRemoteTree;
use tempfile::TempDir;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

use crate::common::{self, remote, server_path};

fn write_local(dir: &TempDir, name: &str, content: &[u8]) -> std::path::PathBuf {
    let local = dir.path().join(name);
    std::fs::write(&local, content).unwrap();
    local
}

async fn only_request(server: &MockServer) -> Request {
    let mut requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    requests.remove(0)
}

fn header_value<'a>(request: &'a Request, name: &str) -> &'a str {
    request
        .headers
        .get(name)
        .unwrap_or_else(|| panic!("missing header {name}"))
        .to_str()
        .unwrap()
}

#[tokio::test]
async fn test_upload_sends_metadata_headers() {
    let (server, tree) = common::setup_jfs_mock().await;
    let dir = TempDir::new().unwrap();
    let local = write_local(&dir, "a.txt", b"hello");
    let source = common::upload_source(&local, b"hello");

    Mock::given(method("POST"))
        .and(path(server_path("/Jotta/Sync/a.txt")))
        .and(query_param("cphash", "5d41402abc4b2a76b9719d911017c592"))
        .and(header("JMd5", "5d41402abc4b2a76b9719d911017c592"))
        .and(header("JSize", "5"))
        .and(header("X-Jfs-DeviceName", "Jotta"))
        .and(header("JModified", "2024-03-01T12:00:00Z"))
        .respond_with(ResponseTemplate::new(201).set_body_string(common::completed_file_xml(
            "a.txt",
            5,
            "5d41402abc4b2a76b9719d911017c592",
        )))
        .expect(1)
        .mount(&server)
        .await;

    let file = tree
        .upload(&remote("/Jotta/Sync/a.txt"), &source)
        .await
        .unwrap();
    assert_eq!(file.name, "a.txt");
    assert_eq!(
        file.state,
        RemoteFileState::Completed {
            hash: common::md5_of(b"hello")
        }
    );
}

#[tokio::test]
async fn test_upload_multipart_body() {
    let (server, tree) = common::setup_jfs_mock().await;
    let dir = TempDir::new().unwrap();
    let local = write_local(&dir, "blåbær.txt", b"hello world");
    let source = common::upload_source(&local, b"hello world");

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(201))
        .mount(&server)
        .await;

    tree.upload(&remote("/Jotta/Sync/blåbær.txt"), &source)
        .await
        .unwrap();

    let request = only_request(&server).await;
    let body = String::from_utf8(request.body.clone()).unwrap();
    let content_type = header_value(&request, "content-type");
    let boundary = content_type
        .strip_prefix("multipart/form-data; boundary=")
        .expect("multipart content type");

    assert!(body.contains("filename=\"blåbær.txt\""));
    assert!(!body.contains("filename*="));
    assert!(body.contains("name=\"md5\"\r\n\r\n5eb63bbbe01eeed093cb22bb8f5acdc3\r\n"));
    assert!(body.contains("\r\n\r\nhello world\r\n"));
    assert!(body.ends_with(&format!("\r\n--{boundary}--\r\n")));
    assert_eq!(
        header_value(&request, "content-length"),
        request.body.len().to_string()
    );
}

#[tokio::test]
async fn test_upload_empty_response_is_synthesized() {
    let (server, tree) = common::setup_jfs_mock().await;
    let dir = TempDir::new().unwrap();
    let local = write_local(&dir, "empty.txt", b"");
    let source = common::upload_source(&local, b"");

    Mock::given(method("POST"))
        .and(path(server_path("/Jotta/Sync/empty.txt")))
        .respond_with(ResponseTemplate::new(201))
        .mount(&server)
        .await;

    let file = tree
        .upload(&remote("/Jotta/Sync/empty.txt"), &source)
        .await
        .unwrap();
    assert_eq!(file.name, "empty.txt");
    assert_eq!(file.size, Some(0));
    assert_eq!(
        file.state,
        RemoteFileState::Completed {
            hash: common::md5_of(b"")
        }
    );
}

#[tokio::test]
async fn test_resume_sends_only_the_tail() {
    let (server, tree) = common::setup_jfs_mock().await;
    let dir = TempDir::new().unwrap();
    let local = write_local(&dir, "big.bin", b"hello world");
    let source = common::upload_source(&local, b"hello world");

    Mock::given(method("POST"))
        .and(path(server_path("/Jotta/Sync/big.bin")))
        .and(header("Range", "bytes=6-"))
        .and(header("JSize", "11"))
        .and(header("JMd5", "5eb63bbbe01eeed093cb22bb8f5acdc3"))
        .respond_with(ResponseTemplate::new(201).set_body_string(common::completed_file_xml(
            "big.bin",
            11,
            "5eb63bbbe01eeed093cb22bb8f5acdc3",
        )))
        .expect(1)
        .mount(&server)
        .await;

    let file = tree
        .resume_upload(&remote("/Jotta/Sync/big.bin"), &source, 6)
        .await
        .unwrap();
    assert_eq!(file.size, Some(11));

    let request = only_request(&server).await;
    let body = String::from_utf8(request.body.clone()).unwrap();
    assert!(body.contains("\r\n\r\nworld\r\n"));
    assert!(!body.contains("hello world"));
}

#[tokio::test]
async fn test_upload_without_range_on_fresh_upload() {
    let (server, tree) = common::setup_jfs_mock().await;
    let dir = TempDir::new().unwrap();
    let local = write_local(&dir, "a.txt", b"hello");

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(201))
        .mount(&server)
        .await;

    tree.upload(
        &remote("/Jotta/Sync/a.txt"),
        &common::upload_source(&local, b"hello"),
    )
    .await
    .unwrap();

    let request = only_request(&server).await;
    assert!(request.headers.get("range").is_none());
}

#[tokio::test]
async fn test_resume_range_rejected() {
    let (server, tree) = common::setup_jfs_mock().await;
    let dir = TempDir::new().unwrap();
    let local = write_local(&dir, "big.bin", b"hello world");

    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(416)
                .set_body_string(common::error_xml(416, "Requested Range Not Satisfiable")),
        )
        .mount(&server)
        .await;

    let err = tree
        .resume_upload(
            &remote("/Jotta/Sync/big.bin"),
            &common::upload_source(&local, b"hello world"),
            6,
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::RangeInvalid);
    assert_eq!(err.path, "/Jotta/Sync/big.bin");
}

#[tokio::test]
async fn test_upload_server_error() {
    let (server, tree) = common::setup_jfs_mock().await;
    let dir = TempDir::new().unwrap();
    let local = write_local(&dir, "a.txt", b"hello");

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let err = tree
        .upload(
            &remote("/Jotta/Sync/a.txt"),
            &common::upload_source(&local, b"hello"),
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::ServerError);
    assert!(err.kind.is_transient());
}

#[tokio::test]
async fn test_upload_missing_local_file() {
    let (server, tree) = common::setup_jfs_mock().await;
    let dir = TempDir::new().unwrap();
    let local = dir.path().join("vanished.txt");

    let err = tree
        .upload(
            &remote("/Jotta/Sync/vanished.txt"),
            &common::upload_source(&local, b"hello"),
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::FilesystemError);
    assert!(server.received_requests().await.unwrap().is_empty());
}
