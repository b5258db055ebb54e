//! Request building
//!
//! Pure functions computing everything an upload or action request carries
//! besides the file content: the `J*` metadata headers, the multipart
//! framing around the streamed bytes, the resume `Range` header and the
//! action query strings.
//!
//! The JFS upload endpoint rejects the RFC 5987 `filename*=` parameter, so
//! the file part always carries a plain quoted `filename="..."`, with UTF-8
//! names written as-is.

use chrono::{DateTime, SecondsFormat, Utc};
use jottasync_core::domain::FileHash;

pub const HEADER_MD5: &str = "JMd5";
pub const HEADER_SIZE: &str = "JSize";
pub const HEADER_CREATED: &str = "JCreated";
pub const HEADER_MODIFIED: &str = "JModified";
pub const HEADER_DEVICE: &str = "X-Jfs-DeviceName";
pub const HEADER_API_VERSION: &str = "X-JottaAPIVersion";

/// Query parameter carrying the content hash on uploads
pub const QUERY_CPHASH: &str = "cphash";

// ============================================================================
// Actions
// ============================================================================

/// Mutating actions addressed by query string on the entity URL
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Tombstone a file
    DeleteFile,
    /// Tombstone a folder and everything below it
    DeleteFolder,
}

impl Action {
    /// The `(key, value)` query pair selecting the action
    #[must_use]
    pub fn query(self) -> (&'static str, &'static str) {
        match self {
            Self::DeleteFile => ("dl", "true"),
            Self::DeleteFolder => ("dlDir", "true"),
        }
    }
}

// ============================================================================
// Upload headers
// ============================================================================

/// Formats a timestamp the way upload headers and form fields expect it
#[must_use]
pub fn format_timestamp(time: DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Metadata headers for an upload of the whole file
///
/// `size` and `hash` always describe the complete content, also when a
/// resumed upload only sends a tail of it.
#[must_use]
pub fn upload_headers(
    hash: &FileHash,
    size: u64,
    modified: DateTime<Utc>,
    device: &str,
) -> Vec<(&'static str, String)> {
    let timestamp = format_timestamp(modified);
    vec![
        (HEADER_MD5, hash.as_str().to_string()),
        (HEADER_SIZE, size.to_string()),
        (HEADER_CREATED, timestamp.clone()),
        (HEADER_MODIFIED, timestamp),
        (HEADER_DEVICE, device.to_string()),
    ]
}

/// `Range` header value resuming from `offset`
#[must_use]
pub fn range_header(offset: u64) -> String {
    format!("bytes={offset}-")
}

// ============================================================================
// Multipart framing
// ============================================================================

/// Escapes a form-data parameter value
///
/// Quotes and line breaks are percent-encoded; everything else, including
/// non-ASCII, is kept verbatim.
#[must_use]
pub fn escape_param(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '"' => out.push_str("%22"),
            '\r' => out.push_str("%0D"),
            '\n' => out.push_str("%0A"),
            other => out.push(other),
        }
    }
    out
}

/// `Content-Disposition` line of the file part
#[must_use]
pub fn file_disposition(filename: &str) -> String {
    format!(
        "Content-Disposition: form-data; name=\"file\"; filename=\"{}\"",
        escape_param(filename)
    )
}

/// Everything of a multipart body except the file bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultipartFrame {
    /// Boundary string, without the leading dashes
    pub boundary: String,
    /// Form fields followed by the file part header
    pub head: Vec<u8>,
    /// Closing delimiter after the file bytes
    pub tail: Vec<u8>,
}

impl MultipartFrame {
    /// Frames a file upload
    ///
    /// The form carries the hash and timestamps as plain fields before the
    /// file part, matching the metadata headers.
    #[must_use]
    pub fn new(
        boundary: impl Into<String>,
        filename: &str,
        hash: &FileHash,
        modified: DateTime<Utc>,
    ) -> Self {
        let boundary = boundary.into();
        let timestamp = format_timestamp(modified);

        let mut head = String::new();
        for (name, value) in [
            ("md5", hash.as_str()),
            ("modified", timestamp.as_str()),
            ("created", timestamp.as_str()),
        ] {
            head.push_str(&format!(
                "--{boundary}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            ));
        }
        head.push_str(&format!(
            "--{boundary}\r\n{}\r\nContent-Type: application/octet-stream\r\n\r\n",
            file_disposition(filename)
        ));

        let tail = format!("\r\n--{boundary}--\r\n");

        Self {
            boundary,
            head: head.into_bytes(),
            tail: tail.into_bytes(),
        }
    }

    /// `Content-Type` header value
    #[must_use]
    pub fn content_type(&self) -> String {
        format!("multipart/form-data; boundary={}", self.boundary)
    }

    /// Total body length when `content_len` file bytes are sent
    #[must_use]
    pub fn body_len(&self, content_len: u64) -> u64 {
        self.head.len() as u64 + content_len + self.tail.len() as u64
    }
}

/// Boundary unlikely to occur in the content it frames
#[must_use]
pub fn boundary_for(hash: &FileHash, nonce: u128) -> String {
    format!("jottasync-{}-{nonce:x}", hash.as_str())
}
