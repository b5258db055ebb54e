//! Integration tests for metadata lookups

use jottasync_core::domain::{ErrorKind, RemoteEntry, RemoteFileState};
use jottasync_core::ports::IRemoteTree;
use wiremock::matchers::{header, header_exists, method, path};
use wiremock::{Mock, ResponseTemplate};

use crate::common::{self, remote, server_path};

const SYNC_FOLDER: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<folder name="photos" time="2024-03-01-T00:16:31Z" host="dn-097.site-000.jotta.no">
  <path xml:space="preserve">/alice/Jotta/Sync</path>
  <abspath xml:space="preserve">/alice/Jotta/Sync</abspath>
  <folders>
    <folder name="2023"/>
    <folder name="trash" deleted="2024-01-01-T10:00:00Z"/>
  </folders>
  <files>
    <file name="cat.jpg" uuid="9ebcfe1a-98b1-4e38-a73e-f498555da865">
      <currentRevision>
        <number>5</number>
        <state>COMPLETED</state>
        <size>1816221</size>
        <md5>125073533339a616b99bc53efc509561</md5>
      </currentRevision>
    </file>
    <file name="old.jpg" uuid="1caec763-2ed0-4e88-9d3c-650f3babecc4" deleted="2024-02-01-T10:00:00Z">
      <currentRevision>
        <number>1</number>
        <state>COMPLETED</state>
        <md5>138396327a51ea6bf20caa72cf6d6667</md5>
      </currentRevision>
    </file>
  </files>
  <metadata first="" max="" total="4" num_folders="2" num_files="2"/>
</folder>"#;

#[tokio::test]
async fn test_stat_folder_listing() {
    let (server, tree) = common::setup_jfs_mock().await;
    common::mount_get(&server, "/Jotta/Sync/photos", 200, SYNC_FOLDER.to_string()).await;

    let entry = tree.stat(&remote("/Jotta/Sync/photos")).await.unwrap();
    let RemoteEntry::Folder(folder) = entry else {
        panic!("expected a folder, got {entry:?}");
    };

    assert_eq!(folder.name, "photos");
    let files: Vec<_> = folder.live_file_names().into_iter().collect();
    let folders: Vec<_> = folder.live_folder_names().into_iter().collect();
    assert_eq!(files, vec!["cat.jpg"]);
    assert_eq!(folders, vec!["2023"]);
}

#[tokio::test]
async fn test_stat_sends_auth_and_api_version() {
    let (server, tree) = common::setup_jfs_mock().await;
    Mock::given(method("GET"))
        .and(path(server_path("/Jotta/Sync")))
        .and(header("X-JottaAPIVersion", "2.2"))
        .and(header_exists("authorization"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(r#"<folder name="Sync"><folders/><files/></folder>"#),
        )
        .expect(1)
        .mount(&server)
        .await;

    let entry = tree.stat(&remote("/Jotta/Sync")).await.unwrap();
    assert!(matches!(entry, RemoteEntry::Folder(_)));
}

#[tokio::test]
async fn test_stat_missing_path_is_absent() {
    let (server, tree) = common::setup_jfs_mock().await;
    common::mount_get(
        &server,
        "/Jotta/Sync/nope",
        404,
        common::error_xml(
            404,
            "no.jotta.backup.errors.NoSuchPathException: Directory /alice/Jotta/Sync/nope",
        ),
    )
    .await;

    let entry = tree.stat(&remote("/Jotta/Sync/nope")).await.unwrap();
    assert_eq!(entry, RemoteEntry::Absent);
}

#[tokio::test]
async fn test_stat_completed_file() {
    let (server, tree) = common::setup_jfs_mock().await;
    common::mount_get(
        &server,
        "/Jotta/Sync/a.txt",
        200,
        common::completed_file_xml("a.txt", 5, "5d41402abc4b2a76b9719d911017c592"),
    )
    .await;

    let RemoteEntry::File(file) = tree.stat(&remote("/Jotta/Sync/a.txt")).await.unwrap() else {
        panic!("expected a file");
    };
    assert_eq!(file.name, "a.txt");
    assert_eq!(file.size, Some(5));
    assert_eq!(
        file.state,
        RemoteFileState::Completed {
            hash: common::md5_of(b"hello")
        }
    );
}

#[tokio::test]
async fn test_stat_incomplete_file() {
    let (server, tree) = common::setup_jfs_mock().await;
    let body = r#"<file name="big.bin"><latestRevision>
        <number>1</number><state>INCOMPLETE</state><size>5</size>
        <md5>5eb63bbbe01eeed093cb22bb8f5acdc3</md5></latestRevision></file>"#;
    common::mount_get(&server, "/Jotta/Sync/big.bin", 200, body.to_string()).await;

    let RemoteEntry::File(file) = tree.stat(&remote("/Jotta/Sync/big.bin")).await.unwrap() else {
        panic!("expected a file");
    };
    assert_eq!(
        file.state,
        RemoteFileState::Incomplete {
            hash: Some(common::md5_of(b"hello world")),
            uploaded_bytes: 5,
        }
    );
}

#[tokio::test]
async fn test_stat_mount_point_and_device() {
    let (server, tree) = common::setup_jfs_mock().await;
    common::mount_get(
        &server,
        "/Jotta",
        200,
        r#"<device><name xml:space="preserve">Jotta</name><type>JOTTA</type>
           <mountPoints><mountPoint><name xml:space="preserve">Sync</name></mountPoint>
           <mountPoint><name xml:space="preserve">Archive</name></mountPoint></mountPoints></device>"#
            .to_string(),
    )
    .await;
    common::mount_get(
        &server,
        "/Jotta/Sync",
        200,
        r#"<mountPoint><name xml:space="preserve">Sync</name><folders><folder name="docs"/></folders><files/></mountPoint>"#
            .to_string(),
    )
    .await;

    let device = tree.stat(&remote("/Jotta")).await.unwrap();
    let RemoteEntry::Device(listing) = &device else {
        panic!("expected a device");
    };
    let mounts: Vec<_> = listing.live_folder_names().into_iter().collect();
    assert_eq!(mounts, vec!["Archive", "Sync"]);

    let mount = tree.stat(&remote("/Jotta/Sync")).await.unwrap();
    assert!(matches!(mount, RemoteEntry::MountPoint(_)));
    assert!(mount.as_container().is_some());
}

#[tokio::test]
async fn test_stat_unicode_path_is_encoded() {
    let (server, tree) = common::setup_jfs_mock().await;
    Mock::given(method("GET"))
        .and(path(format!(
            "/{}/Jotta/Sync/bl%C3%A5b%C3%A6r%20og%20kaffe",
            common::USER
        )))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(r#"<folder name="blåbær og kaffe"><folders/><files/></folder>"#),
        )
        .mount(&server)
        .await;

    let RemoteEntry::Folder(folder) = tree
        .stat(&remote("/Jotta/Sync/blåbær og kaffe"))
        .await
        .unwrap()
    else {
        panic!("expected a folder");
    };
    assert_eq!(folder.name, "blåbær og kaffe");
}

#[tokio::test]
async fn test_stat_status_mapping() {
    let cases = [
        (401, ErrorKind::Unauthorized),
        (403, ErrorKind::Forbidden),
        (400, ErrorKind::BadRequest),
        (500, ErrorKind::ServerError),
        (502, ErrorKind::ServerError),
    ];
    for (status, kind) in cases {
        let (server, tree) = common::setup_jfs_mock().await;
        common::mount_get(&server, "/Jotta/Sync", status, common::error_xml(status, "boom")).await;

        let err = tree.stat(&remote("/Jotta/Sync")).await.unwrap_err();
        assert_eq!(err.kind, kind, "status {status}");
        assert_eq!(err.path, "/Jotta/Sync");
        assert!(err.message.contains("boom"));
    }
}

#[tokio::test]
async fn test_stat_error_document_with_ok_status() {
    let (server, tree) = common::setup_jfs_mock().await;
    common::mount_get(&server, "/Jotta/Sync", 200, common::error_xml(403, "locked")).await;

    let err = tree.stat(&remote("/Jotta/Sync")).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::Forbidden);
}

#[tokio::test]
async fn test_stat_garbage_body_is_other() {
    let (server, tree) = common::setup_jfs_mock().await;
    common::mount_get(&server, "/Jotta/Sync", 200, "<html>maintenance</html>".to_string()).await;

    let err = tree.stat(&remote("/Jotta/Sync")).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::Other);
}
