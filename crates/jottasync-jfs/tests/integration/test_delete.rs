//! Integration tests for file and folder deletion

use jottasync_core::domain::ErrorKind;
use jottasync_core::ports::IRemoteTree;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, ResponseTemplate};

use crate::common::{self, remote, server_path};

#[tokio::test]
async fn test_delete_file_uses_dl_action() {
    let (server, tree) = common::setup_jfs_mock().await;
    let body = r#"<file name="a.txt" deleted="2024-03-01-T12:00:00Z"><currentRevision>
        <state>COMPLETED</state><md5>5d41402abc4b2a76b9719d911017c592</md5>
        </currentRevision></file>"#;

    Mock::given(method("POST"))
        .and(path(server_path("/Jotta/Sync/a.txt")))
        .and(query_param("dl", "true"))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .expect(1)
        .mount(&server)
        .await;

    assert!(tree.delete(&remote("/Jotta/Sync/a.txt")).await.unwrap());
}

#[tokio::test]
async fn test_delete_folder_uses_dldir_action() {
    let (server, tree) = common::setup_jfs_mock().await;

    Mock::given(method("POST"))
        .and(path(server_path("/Jotta/Sync/old")))
        .and(query_param("dlDir", "true"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<folder name="old" deleted="2024-03-01-T12:00:00Z"><folders/><files/></folder>"#,
        ))
        .expect(1)
        .mount(&server)
        .await;

    assert!(tree.delete_folder(&remote("/Jotta/Sync/old")).await.unwrap());
}

#[tokio::test]
async fn test_delete_not_confirmed() {
    let (server, tree) = common::setup_jfs_mock().await;

    Mock::given(method("POST"))
        .and(query_param("dl", "true"))
        .respond_with(ResponseTemplate::new(200).set_body_string(common::completed_file_xml(
            "a.txt",
            5,
            "5d41402abc4b2a76b9719d911017c592",
        )))
        .mount(&server)
        .await;

    assert!(!tree.delete(&remote("/Jotta/Sync/a.txt")).await.unwrap());
}

#[tokio::test]
async fn test_delete_empty_body_counts_as_deleted() {
    let (server, tree) = common::setup_jfs_mock().await;

    Mock::given(method("POST"))
        .and(query_param("dlDir", "true"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    assert!(tree.delete_folder(&remote("/Jotta/Sync/x")).await.unwrap());
}

#[tokio::test]
async fn test_delete_missing_file_is_not_found() {
    let (server, tree) = common::setup_jfs_mock().await;

    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(404).set_body_string(common::error_xml(404, "no such file")),
        )
        .mount(&server)
        .await;

    let err = tree.delete(&remote("/Jotta/Sync/gone.txt")).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::NotFound);
    assert!(!err.kind.is_transient());
    assert!(err.message.contains("no such file"));
}
