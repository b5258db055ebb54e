//! JfsRemoteTree - `IRemoteTree` implementation for the JFS API
//!
//! ## Design Notes
//!
//! - `stat` maps a 404 to `RemoteEntry::Absent`; every other failure is a
//!   `RemoteError` classified by [`JfsError::kind`].
//! - Uploads stream the local file through a multipart body whose length is
//!   known up front, so memory use does not grow with file size.
//! - A resumed upload sends only bytes `[offset, size)` but declares the
//!   hash and size of the whole file, plus `Range: bytes=<offset>-`.
//! - Some upload responses carry no body; the stored file is then
//!   described from what was sent.

use std::io::SeekFrom;
use std::time::{SystemTime, UNIX_EPOCH};

use bytes::Bytes;
use futures_util::stream::{self, StreamExt};
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE, RANGE};
use reqwest::{Body, Method};
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio_util::io::ReaderStream;
use tracing::{debug, info, instrument};

use jottasync_core::domain::{
    RemoteEntry, RemoteError, RemoteFile, RemoteFileState, RemotePath,
};
use jottasync_core::ports::{IRemoteTree, UploadSource};

use crate::client::JfsClient;
use crate::request::{self, Action, MultipartFrame};
use crate::xml;
use crate::JfsError;

/// Remote Tree Accessor backed by a JFS account
#[derive(Debug, Clone)]
pub struct JfsRemoteTree {
    client: JfsClient,
}

impl JfsRemoteTree {
    pub fn new(client: JfsClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &JfsClient {
        &self.client
    }

    async fn stat_inner(&self, path: &RemotePath) -> Result<RemoteEntry, JfsError> {
        match self.client.get_document(path).await {
            Ok(body) => xml::parse_entry(&body),
            Err(JfsError::Status { status: 404, .. }) => Ok(RemoteEntry::Absent),
            Err(err) => Err(err),
        }
    }

    async fn upload_inner(
        &self,
        path: &RemotePath,
        source: &UploadSource,
        offset: u64,
    ) -> Result<RemoteFile, JfsError> {
        let filename = path.file_name().unwrap_or_default();
        let frame = MultipartFrame::new(
            request::boundary_for(&source.hash, nonce()),
            filename,
            &source.hash,
            source.modified,
        );

        let content_len = source.size.saturating_sub(offset);
        let mut file = tokio::fs::File::open(&source.local_path).await?;
        if offset > 0 {
            file.seek(SeekFrom::Start(offset)).await?;
        }
        let content = ReaderStream::new(file.take(content_len));

        let body_len = frame.body_len(content_len);
        let content_type = frame.content_type();
        let head = Bytes::from(frame.head);
        let tail = Bytes::from(frame.tail);
        let body = stream::once(async move { Ok::<_, std::io::Error>(head) })
            .chain(content)
            .chain(stream::once(async move { Ok(tail) }));

        let mut url = self.client.upload_url(path)?;
        url.query_pairs_mut()
            .append_pair(request::QUERY_CPHASH, source.hash.as_str());

        let mut builder = self
            .client
            .request(Method::POST, url)
            .header(CONTENT_TYPE, content_type)
            .header(CONTENT_LENGTH, body_len);
        for (name, value) in request::upload_headers(
            &source.hash,
            source.size,
            source.modified,
            self.client.device_name(),
        ) {
            builder = builder.header(name, value);
        }
        if offset > 0 {
            builder = builder.header(RANGE, request::range_header(offset));
        }

        let response = self
            .client
            .send(builder.body(Body::wrap_stream(body)))
            .await?;
        let text = response.text().await?;
        if text.trim().is_empty() {
            debug!(path = %path, "empty upload response, describing file from request");
            return Ok(RemoteFile {
                name: filename.to_string(),
                state: RemoteFileState::Completed {
                    hash: source.hash.clone(),
                },
                size: Some(source.size),
                modified: Some(source.modified),
            });
        }

        match xml::parse_entry(&text)? {
            RemoteEntry::File(file) => Ok(file),
            other => Err(JfsError::InvalidResponse(format!(
                "upload answered with a {}",
                other.kind_name()
            ))),
        }
    }

    async fn act(&self, path: &RemotePath, action: Action) -> Result<bool, JfsError> {
        let mut url = self.client.metadata_url(path)?;
        let (key, value) = action.query();
        url.query_pairs_mut().append_pair(key, value);

        let response = self.client.send(self.client.request(Method::POST, url)).await?;
        let text = response.text().await?;
        if text.trim().is_empty() {
            return Ok(true);
        }

        Ok(match xml::parse_entry(&text)? {
            RemoteEntry::File(file) => file.state == RemoteFileState::Deleted,
            RemoteEntry::Folder(folder) => folder.deleted,
            RemoteEntry::Absent => true,
            RemoteEntry::Device(_) | RemoteEntry::MountPoint(_) => false,
        })
    }
}

/// Per-request boundary nonce
fn nonce() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default()
}

#[async_trait::async_trait]
impl IRemoteTree for JfsRemoteTree {
    #[instrument(skip(self), fields(path = %path))]
    async fn stat(&self, path: &RemotePath) -> Result<RemoteEntry, RemoteError> {
        self.stat_inner(path)
            .await
            .map_err(|e| e.into_remote(path.as_str()))
    }

    #[instrument(skip(self, source), fields(path = %path, size = source.size))]
    async fn upload(
        &self,
        path: &RemotePath,
        source: &UploadSource,
    ) -> Result<RemoteFile, RemoteError> {
        let file = self
            .upload_inner(path, source, 0)
            .await
            .map_err(|e| e.into_remote(path.as_str()))?;
        info!(hash = %source.hash, "Uploaded");
        Ok(file)
    }

    #[instrument(skip(self, source), fields(path = %path, size = source.size))]
    async fn resume_upload(
        &self,
        path: &RemotePath,
        source: &UploadSource,
        offset: u64,
    ) -> Result<RemoteFile, RemoteError> {
        let file = self
            .upload_inner(path, source, offset)
            .await
            .map_err(|e| e.into_remote(path.as_str()))?;
        info!(offset, "Resumed upload completed");
        Ok(file)
    }

    #[instrument(skip(self), fields(path = %path))]
    async fn delete(&self, path: &RemotePath) -> Result<bool, RemoteError> {
        self.act(path, Action::DeleteFile)
            .await
            .map_err(|e| e.into_remote(path.as_str()))
    }

    #[instrument(skip(self), fields(path = %path))]
    async fn delete_folder(&self, path: &RemotePath) -> Result<bool, RemoteError> {
        self.act(path, Action::DeleteFolder)
            .await
            .map_err(|e| e.into_remote(path.as_str()))
    }
}
