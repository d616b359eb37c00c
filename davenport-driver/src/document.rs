//! Value types describing documents, attachments, security metadata, and
//! database statistics.
//!
//! All types here are plain, independently owned snapshots with no
//! back-references; nothing mutates them after a backend populates them, so
//! they are safe to pass across tasks.

use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;
use std::fmt;

use crate::error::Result;
use crate::row::PayloadReader;

/// A fetched document.
///
/// The body is raw, un-decoded JSON; this layer never parses it. As with
/// [`crate::row::Row`], a streaming reader takes precedence over the raw-bytes
/// form.
#[derive(Default)]
pub struct Document {
    /// The current revision of the document.
    pub rev: String,
    /// The size of the document body in bytes, or -1 if unknown.
    pub content_length: i64,
    /// Streamed access to the raw body. Takes priority over `body`.
    pub body_reader: Option<PayloadReader>,
    /// The raw, un-decoded JSON body.
    pub body: Option<Box<RawValue>>,
}

impl Document {
    /// Reads the document body, honoring reader-over-bytes precedence.
    pub async fn read_body(&mut self) -> Result<Option<Vec<u8>>> {
        if let Some(mut reader) = self.body_reader.take() {
            let mut buf = Vec::new();
            futures::io::AsyncReadExt::read_to_end(&mut reader, &mut buf).await?;
            return Ok(Some(buf));
        }
        Ok(self.body.as_ref().map(|b| b.get().as_bytes().to_vec()))
    }
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("rev", &self.rev)
            .field("content_length", &self.content_length)
            .field("body_reader", &self.body_reader.is_some())
            .field("body", &self.body.as_ref().map(|b| b.get()))
            .finish()
    }
}

/// A file attachment on a document.
///
/// `content` is only populated when the attachment body was downloaded;
/// metadata-only retrieval (see
/// [`crate::db::AttachmentMetaGetter`]) leaves it `None` and sets `stub`.
#[derive(Default)]
pub struct Attachment {
    /// The filename of the attachment.
    pub filename: String,
    /// The media type of the attachment content.
    pub content_type: String,
    /// The content hash digest as reported by the backend.
    pub digest: String,
    /// The revision number at which the attachment was added.
    pub rev_pos: i64,
    /// The attachment size in bytes, or -1 if unknown.
    pub size: i64,
    /// True when this value carries metadata only.
    pub stub: bool,
    /// The attachment content.
    pub content: Option<PayloadReader>,
}

impl fmt::Debug for Attachment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Attachment")
            .field("filename", &self.filename)
            .field("content_type", &self.content_type)
            .field("digest", &self.digest)
            .field("rev_pos", &self.rev_pos)
            .field("size", &self.size)
            .field("stub", &self.stub)
            .field("content", &self.content.is_some())
            .finish()
    }
}

/// Database-level security metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Security {
    /// Users and roles with administrative access.
    #[serde(default)]
    pub admins: Members,
    /// Users and roles with member access.
    #[serde(default)]
    pub members: Members,
}

/// One side of a security object: a set of user names and role names.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Members {
    /// User names.
    #[serde(default)]
    pub names: Vec<String>,
    /// Role names.
    #[serde(default)]
    pub roles: Vec<String>,
}

/// A point-in-time statistics snapshot for a database.
#[derive(Default)]
pub struct DbStats {
    /// The database name.
    pub name: String,
    /// True if the database is currently being compacted.
    pub compact_running: bool,
    /// The number of live documents.
    pub doc_count: i64,
    /// The number of deleted documents.
    pub deleted_count: i64,
    /// The database's current update sequence.
    pub update_seq: String,
    /// Total bytes on disk.
    pub disk_size: i64,
    /// Bytes of live data on disk.
    pub active_size: i64,
    /// Uncompressed bytes of user data.
    pub external_size: i64,
    /// The raw backend response, for forward-compatible fields.
    pub raw_response: Option<Box<RawValue>>,
}

impl fmt::Debug for DbStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DbStats")
            .field("name", &self.name)
            .field("compact_running", &self.compact_running)
            .field("doc_count", &self.doc_count)
            .field("deleted_count", &self.deleted_count)
            .field("update_seq", &self.update_seq)
            .field("disk_size", &self.disk_size)
            .field("active_size", &self.active_size)
            .field("external_size", &self.external_size)
            .finish()
    }
}
