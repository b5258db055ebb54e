//! JFS response parsing
//!
//! Every metadata response is a single XML document whose root element
//! names the entity: `<folder>`, `<mountPoint>`, `<device>`, `<file>` or
//! `<error>`. The variant is decided here, once, from that root.
//!
//! Folder-like documents list children under `<folders>` and `<files>`
//! (devices under `<mountPoints>`); a `deleted` attribute marks a
//! tombstone. Files describe their revision in `<currentRevision>` when
//! one completed, otherwise in `<latestRevision>`.

use chrono::{DateTime, NaiveDateTime, Utc};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use jottasync_core::domain::{
    FileHash, RemoteChild, RemoteEntry, RemoteFile, RemoteFileState, RemoteFolder,
};

use crate::JfsError;

/// JFS timestamps look like `2015-07-26-T22:26:54Z`
const JFS_TIME_FORMAT: &str = "%Y-%m-%d-T%H:%M:%SZ";

/// Parses a JFS timestamp, accepting RFC 3339 as well
#[must_use]
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(value, JFS_TIME_FORMAT)
        .map(|naive| naive.and_utc())
        .ok()
        .or_else(|| {
            DateTime::parse_from_rfc3339(value)
                .ok()
                .map(|t| t.with_timezone(&Utc))
        })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Root {
    Folder,
    MountPoint,
    Device,
    File,
    Error,
}

impl Root {
    fn from_tag(tag: &[u8]) -> Option<Self> {
        match tag {
            b"folder" => Some(Self::Folder),
            b"mountPoint" => Some(Self::MountPoint),
            b"device" => Some(Self::Device),
            b"file" => Some(Self::File),
            b"error" => Some(Self::Error),
            _ => None,
        }
    }
}

#[derive(Debug, Default)]
struct Revision {
    state: Option<String>,
    size: Option<u64>,
    md5: Option<String>,
    modified: Option<DateTime<Utc>>,
}

#[derive(Debug, Default)]
struct Document {
    root: Option<Root>,
    name: Option<String>,
    deleted: bool,
    children: Vec<RemoteChild>,
    current: Option<Revision>,
    latest: Option<Revision>,
    error_code: Option<u16>,
    error_message: Option<String>,
}

fn xml_error(err: impl std::fmt::Display) -> JfsError {
    JfsError::InvalidResponse(format!("malformed XML: {err}"))
}

/// Reads the `name` and `deleted` attributes of an element
fn name_and_deleted(element: &BytesStart<'_>) -> Result<(Option<String>, bool), JfsError> {
    let mut name = None;
    let mut deleted = false;
    for attribute in element.attributes() {
        let attribute = attribute.map_err(xml_error)?;
        match attribute.key.as_ref() {
            b"name" => name = Some(attribute.unescape_value().map_err(xml_error)?.into_owned()),
            b"deleted" => deleted = true,
            _ => {}
        }
    }
    Ok((name, deleted))
}

impl Document {
    /// Handles an opening (or self-closing) tag; `stack` holds its ancestors
    fn open(&mut self, stack: &[Vec<u8>], element: &BytesStart<'_>) -> Result<(), JfsError> {
        let tag = element.name();
        let tag = tag.as_ref();

        if stack.is_empty() {
            let root = Root::from_tag(tag).ok_or_else(|| {
                JfsError::InvalidResponse(format!(
                    "unexpected root element <{}>",
                    String::from_utf8_lossy(tag)
                ))
            })?;
            let (name, deleted) = name_and_deleted(element)?;
            self.root = Some(root);
            self.name = name;
            self.deleted = deleted;
            return Ok(());
        }

        let parent = stack.last().map(Vec::as_slice);
        match (stack.len(), parent, tag) {
            (2, Some(b"folders"), b"folder") => {
                let (name, deleted) = name_and_deleted(element)?;
                if let Some(name) = name {
                    let child = RemoteChild::folder(name);
                    self.children
                        .push(if deleted { child.tombstoned() } else { child });
                }
            }
            (2, Some(b"files"), b"file") => {
                let (name, deleted) = name_and_deleted(element)?;
                if let Some(name) = name {
                    let child = RemoteChild::file(name);
                    self.children
                        .push(if deleted { child.tombstoned() } else { child });
                }
            }
            (1, _, b"currentRevision") => self.current = Some(Revision::default()),
            (1, _, b"latestRevision") => self.latest = Some(Revision::default()),
            _ => {}
        }
        Ok(())
    }

    /// Handles element text; `stack` ends with the enclosing element
    fn text(&mut self, stack: &[Vec<u8>], text: &str) {
        let path: Vec<&[u8]> = stack.iter().map(Vec::as_slice).collect();
        match (self.root, path.as_slice()) {
            (Some(Root::Folder | Root::MountPoint | Root::Device), [_, b"name"]) => {
                self.name.get_or_insert_with(|| text.to_string());
            }
            (Some(Root::Device), [_, b"mountPoints", b"mountPoint", b"name"]) => {
                self.children.push(RemoteChild::folder(text));
            }
            (Some(Root::File), [_, revision, field]) => {
                let target = match *revision {
                    b"currentRevision" => self.current.as_mut(),
                    b"latestRevision" => self.latest.as_mut(),
                    _ => None,
                };
                if let Some(target) = target {
                    match *field {
                        b"state" => target.state = Some(text.to_string()),
                        b"size" => target.size = text.parse().ok(),
                        b"md5" => target.md5 = Some(text.to_string()),
                        b"modified" => target.modified = parse_timestamp(text),
                        _ => {}
                    }
                }
            }
            (Some(Root::Error), [_, b"code"]) => self.error_code = text.parse().ok(),
            (Some(Root::Error), [_, b"message"]) => {
                self.error_message = Some(text.to_string());
            }
            (Some(Root::Error), [_, b"reason"]) => {
                self.error_message.get_or_insert_with(|| text.to_string());
            }
            _ => {}
        }
    }

    fn finish(self) -> Result<RemoteEntry, JfsError> {
        let root = self
            .root
            .ok_or_else(|| JfsError::InvalidResponse("empty document".to_string()))?;

        let folder = |name: Option<String>, deleted, children| RemoteFolder {
            name: name.unwrap_or_default(),
            deleted,
            children,
        };

        match root {
            Root::Folder => Ok(RemoteEntry::Folder(folder(
                self.name,
                self.deleted,
                self.children,
            ))),
            Root::MountPoint => Ok(RemoteEntry::MountPoint(folder(
                self.name,
                self.deleted,
                self.children,
            ))),
            Root::Device => Ok(RemoteEntry::Device(folder(
                self.name,
                self.deleted,
                self.children,
            ))),
            Root::File => {
                let name = self.name.unwrap_or_default();
                file_entry(name, self.deleted, self.current, self.latest).map(RemoteEntry::File)
            }
            Root::Error => Err(JfsError::Status {
                status: self.error_code.unwrap_or(0),
                message: self
                    .error_message
                    .unwrap_or_else(|| "unspecified error".to_string()),
            }),
        }
    }
}

fn parse_hash(name: &str, md5: Option<String>) -> Result<Option<FileHash>, JfsError> {
    md5.filter(|h| !h.is_empty())
        .map(|h| {
            FileHash::new(h)
                .map_err(|e| JfsError::InvalidResponse(format!("{name}: {e}")))
        })
        .transpose()
}

fn file_entry(
    name: String,
    deleted: bool,
    current: Option<Revision>,
    latest: Option<Revision>,
) -> Result<RemoteFile, JfsError> {
    let from_current = current.is_some();
    let revision = current
        .or(latest)
        .ok_or_else(|| JfsError::InvalidResponse(format!("{name}: file without revision")))?;

    let hash = parse_hash(&name, revision.md5)?;
    let state = if deleted {
        RemoteFileState::Deleted
    } else {
        match revision.state.as_deref() {
            Some("COMPLETED") => RemoteFileState::Completed {
                hash: hash.ok_or_else(|| {
                    JfsError::InvalidResponse(format!("{name}: completed revision without md5"))
                })?,
            },
            Some("INCOMPLETE") => RemoteFileState::Incomplete {
                hash,
                uploaded_bytes: revision.size.unwrap_or(0),
            },
            Some("CORRUPT") => RemoteFileState::Corrupt { hash },
            Some("DELETED") => RemoteFileState::Deleted,
            None if from_current => RemoteFileState::Completed {
                hash: hash.ok_or_else(|| {
                    JfsError::InvalidResponse(format!("{name}: completed revision without md5"))
                })?,
            },
            other => {
                return Err(JfsError::InvalidResponse(format!(
                    "{name}: unsupported revision state {other:?}"
                )))
            }
        }
    };

    Ok(RemoteFile {
        name,
        state,
        size: revision.size,
        modified: revision.modified,
    })
}

/// Parses a metadata document into a remote entry
///
/// An `<error>` document becomes `JfsError::Status` with its code.
///
/// # Errors
///
/// Returns `JfsError::InvalidResponse` for malformed XML, an unknown root
/// element or a file revision that cannot be classified.
pub fn parse_entry(xml: &str) -> Result<RemoteEntry, JfsError> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut document = Document::default();
    let mut stack: Vec<Vec<u8>> = Vec::new();

    loop {
        match reader.read_event().map_err(xml_error)? {
            Event::Start(element) => {
                document.open(&stack, &element)?;
                stack.push(element.name().as_ref().to_vec());
            }
            Event::Empty(element) => document.open(&stack, &element)?,
            Event::End(_) => {
                stack.pop();
            }
            Event::Text(text) => {
                let text = text.unescape().map_err(xml_error)?;
                document.text(&stack, text.trim());
            }
            Event::CData(data) => {
                let text = String::from_utf8_lossy(&data).into_owned();
                document.text(&stack, text.trim());
            }
            Event::Eof => break,
            _ => {}
        }
    }

    document.finish()
}

/// Extracts the message of an `<error>` document, if `body` is one
#[must_use]
pub fn error_message(body: &str) -> Option<String> {
    match parse_entry(body) {
        Err(JfsError::Status { message, .. }) => Some(message),
        _ => None,
    }
}
