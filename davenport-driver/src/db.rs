//! The backend driver capability surface.
//!
//! This module defines the core contract that abstracts over interchangeable
//! document-database backends (an HTTP engine, an in-process engine, a test
//! double), allowing one client API to drive any of them.
//!
//! # Overview
//!
//! The [`Database`] trait is the mandatory contract every backend must satisfy
//! for a logical database handle: document CRUD, bulk listing, view queries,
//! security metadata, compaction triggers, attachments, and the changes feed.
//!
//! Everything else is an *optional* capability: a separate trait a backend may
//! additionally implement, surfaced through an accessor hook on [`Database`]
//! that defaults to `None`. The set of optional capabilities can grow over the
//! system's lifetime without breaking existing backends, and a minimal backend
//! implements only the mandatory surface. Runtime detection and caching live in
//! [`crate::capabilities`].
//!
//! # Cancellation
//!
//! All methods are async; dropping the returned future cancels the in-flight
//! operation. There is no separate context parameter.
//!
//! # Error Handling
//!
//! Operations return [`Result<T>`](crate::error::Result). Invoking an optional
//! capability the backend lacks is reported by the client layer as
//! [`Error::Unsupported`](crate::error::Error::Unsupported), never a crash.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt::Debug;

use crate::changes::Changes;
use crate::document::{Attachment, DbStats, Document, Security};
use crate::error::{Error, Result};
use crate::options::Options;
use crate::partition::Partitioned;
use crate::row::Rows;

/// The mandatory contract for a logical database handle.
///
/// Implementations must be thread-safe (`Send + Sync`); the exact concurrency
/// model is implementation-specific. Iterators returned from listing
/// operations are single-consumer — see [`Rows`] and [`Changes`].
#[async_trait]
pub trait Database: Send + Sync + Debug {
    /// Lists all documents in the database through the [`Rows`] protocol.
    async fn all_docs(&self, options: Options) -> Result<Box<dyn Rows>>;

    /// Fetches a single document by ID.
    async fn get(&self, doc_id: &str, options: Options) -> Result<Document>;

    /// Creates a new document with a backend-assigned ID.
    ///
    /// Returns the new document's ID and revision.
    async fn create_doc(&self, doc: Value, options: Options) -> Result<(String, String)>;

    /// Creates or updates the document with the given ID.
    ///
    /// Returns the new revision.
    async fn put(&self, doc_id: &str, doc: Value, options: Options) -> Result<String>;

    /// Marks the given revision of a document as deleted.
    ///
    /// This is a soft delete; the tombstone remains. See [`Purger`] for
    /// permanent removal. Returns the new revision.
    async fn delete(&self, doc_id: &str, rev: &str, options: Options) -> Result<String>;

    /// Returns a statistics snapshot for the database.
    async fn stats(&self) -> Result<DbStats>;

    /// Triggers compaction of the database.
    async fn compact(&self) -> Result<()>;

    /// Triggers compaction of the named design document's view indexes.
    async fn compact_view(&self, ddoc_id: &str) -> Result<()>;

    /// Removes view index files no longer required by any design document.
    async fn view_cleanup(&self) -> Result<()>;

    /// Returns the database's security metadata.
    async fn security(&self) -> Result<Security>;

    /// Replaces the database's security metadata.
    async fn set_security(&self, security: Security) -> Result<()>;

    /// Opens the changes feed. Depending on `options` the feed may be finite
    /// or continuous; see [`Changes`].
    async fn changes(&self, options: Options) -> Result<Box<dyn Changes>>;

    /// Uploads an attachment to the given document revision.
    ///
    /// Returns the new revision.
    async fn put_attachment(
        &self,
        doc_id: &str,
        rev: &str,
        attachment: Attachment,
        options: Options,
    ) -> Result<String>;

    /// Downloads an attachment.
    async fn get_attachment(
        &self,
        doc_id: &str,
        filename: &str,
        options: Options,
    ) -> Result<Attachment>;

    /// Removes an attachment from the given document revision.
    ///
    /// Returns the new revision.
    async fn delete_attachment(
        &self,
        doc_id: &str,
        rev: &str,
        filename: &str,
        options: Options,
    ) -> Result<String>;

    /// Executes a view query through the [`Rows`] protocol.
    async fn query(&self, ddoc: &str, view: &str, options: Options) -> Result<Box<dyn Rows>>;

    /// Hook for the [`Finder`] capability.
    ///
    /// A well-formed backend implements at most one of `finder` and
    /// `opts_finder`; [`crate::capabilities::Capabilities::probe`] validates
    /// the convention.
    fn finder(&self) -> Option<&dyn Finder> {
        None
    }

    /// Hook for the [`OptsFinder`] capability.
    fn opts_finder(&self) -> Option<&dyn OptsFinder> {
        None
    }

    /// Hook for the [`Flusher`] capability.
    fn flusher(&self) -> Option<&dyn Flusher> {
        None
    }

    /// Hook for the [`Copier`] capability.
    fn copier(&self) -> Option<&dyn Copier> {
        None
    }

    /// Hook for the [`MetaGetter`] capability.
    fn meta_getter(&self) -> Option<&dyn MetaGetter> {
        None
    }

    /// Hook for the [`BulkGetter`] capability.
    fn bulk_getter(&self) -> Option<&dyn BulkGetter> {
        None
    }

    /// Hook for the [`BulkDocer`] capability.
    fn bulk_docer(&self) -> Option<&dyn BulkDocer> {
        None
    }

    /// Hook for the [`RevsDiffer`] capability.
    fn revs_differ(&self) -> Option<&dyn RevsDiffer> {
        None
    }

    /// Hook for the [`DatabaseCloser`] capability.
    fn closer(&self) -> Option<&dyn DatabaseCloser> {
        None
    }

    /// Hook for the [`Purger`] capability.
    fn purger(&self) -> Option<&dyn Purger> {
        None
    }

    /// Hook for the [`DesignDocer`] capability.
    fn design_docer(&self) -> Option<&dyn DesignDocer> {
        None
    }

    /// Hook for the [`LocalDocer`] capability.
    fn local_docer(&self) -> Option<&dyn LocalDocer> {
        None
    }

    /// Hook for the [`AttachmentMetaGetter`] capability.
    fn attachment_meta_getter(&self) -> Option<&dyn AttachmentMetaGetter> {
        None
    }

    /// Hook for the [`Partitioned`] capability.
    fn partitioned(&self) -> Option<&dyn Partitioned> {
        None
    }
}

/// Optional capability: secondary-index management and query-by-selector.
///
/// Mutually exclusive with [`OptsFinder`] by convention; the variant without
/// per-call options exists for backends whose find endpoint takes none.
#[async_trait]
pub trait Finder: Send + Sync {
    /// Creates a secondary index.
    async fn create_index(&self, ddoc: &str, name: &str, index: Value) -> Result<()>;

    /// Deletes a secondary index.
    async fn delete_index(&self, ddoc: &str, name: &str) -> Result<()>;

    /// Queries documents by selector through the [`Rows`] protocol.
    async fn find(&self, query: Value) -> Result<Box<dyn Rows>>;

    /// Lists the database's secondary indexes.
    async fn get_indexes(&self) -> Result<Vec<Index>>;

    /// Explains how the backend would execute the given selector query.
    async fn explain(&self, query: Value) -> Result<QueryPlan>;
}

/// Optional capability: [`Finder`] with a per-call options map on every
/// operation. Mutually exclusive with [`Finder`] by convention.
#[async_trait]
pub trait OptsFinder: Send + Sync {
    /// Creates a secondary index.
    async fn create_index(
        &self,
        ddoc: &str,
        name: &str,
        index: Value,
        options: Options,
    ) -> Result<()>;

    /// Deletes a secondary index.
    async fn delete_index(&self, ddoc: &str, name: &str, options: Options) -> Result<()>;

    /// Queries documents by selector through the [`Rows`] protocol.
    async fn find(&self, query: Value, options: Options) -> Result<Box<dyn Rows>>;

    /// Lists the database's secondary indexes.
    async fn get_indexes(&self, options: Options) -> Result<Vec<Index>>;

    /// Explains how the backend would execute the given selector query.
    async fn explain(&self, query: Value, options: Options) -> Result<QueryPlan>;
}

/// Optional capability: explicit flush of the backend's durability buffer.
#[async_trait]
pub trait Flusher: Send + Sync {
    /// Forces any uncommitted writes to durable storage.
    async fn flush(&self) -> Result<()>;
}

/// Optional capability: document copy-by-reference, without a full
/// read/write round trip through the client.
#[async_trait]
pub trait Copier: Send + Sync {
    /// Copies `source` to `target` inside the backend.
    ///
    /// Returns the new revision of the target.
    async fn copy(&self, target: &str, source: &str, options: Options) -> Result<String>;
}

/// Optional capability: lightweight metadata-only document check, bypassing
/// full document retrieval.
#[async_trait]
pub trait MetaGetter: Send + Sync {
    /// Returns the size and current revision of a document without its body.
    async fn get_meta(&self, doc_id: &str, options: Options) -> Result<(i64, String)>;
}

/// Optional capability: fetch many documents by ID and revision in one round
/// trip.
///
/// Results stream through the [`Rows`] protocol; an entry that cannot be
/// fetched yields a row with [`Row::error`](crate::row::Row::error) set, and
/// iteration continues to the remaining entries. This is the canonical use of
/// row-level errors.
#[async_trait]
pub trait BulkGetter: Send + Sync {
    /// Fetches the referenced documents.
    async fn bulk_get(&self, refs: &[BulkGetReference], options: Options)
        -> Result<Box<dyn Rows>>;
}

/// Optional capability: create or update many documents in one round trip.
///
/// Outcomes are reported per document: an entry that fails yields a
/// [`BulkResult`] with `error` set, and the remaining entries are still
/// attempted. The call itself only fails for batch-level faults.
#[async_trait]
pub trait BulkDocer: Send + Sync {
    /// Writes the given documents.
    async fn bulk_docs(&self, docs: &[Value], options: Options) -> Result<Vec<BulkResult>>;
}

/// Optional capability: given a candidate revision map, report which revisions
/// the backend is missing, via the [`Rows`] protocol.
#[async_trait]
pub trait RevsDiffer: Send + Sync {
    /// Compares `rev_map` (document ID to candidate revisions) against the
    /// backend's contents.
    async fn revs_diff(&self, rev_map: Value) -> Result<Box<dyn Rows>>;
}

/// Optional capability: explicit teardown of a database handle, distinct from
/// per-operation cleanup.
#[async_trait]
pub trait DatabaseCloser: Send + Sync {
    /// Releases resources held by the handle.
    async fn close(&self) -> Result<()>;
}

/// Optional capability: permanent removal of specific revisions, distinct from
/// the soft delete performed by [`Database::delete`].
#[async_trait]
pub trait Purger: Send + Sync {
    /// Purges the given revisions, keyed by document ID.
    async fn purge(&self, doc_revs: &HashMap<String, Vec<String>>) -> Result<PurgeResult>;
}

/// Optional capability: design-document listing via the [`Rows`] protocol.
#[async_trait]
pub trait DesignDocer: Send + Sync {
    /// Lists the database's design documents.
    async fn design_docs(&self, options: Options) -> Result<Box<dyn Rows>>;
}

/// Optional capability: local (non-replicating) document listing via the
/// [`Rows`] protocol.
#[async_trait]
pub trait LocalDocer: Send + Sync {
    /// Lists the database's local documents.
    async fn local_docs(&self, options: Options) -> Result<Box<dyn Rows>>;
}

/// Optional capability: attachment metadata retrieval without downloading the
/// attachment content.
#[async_trait]
pub trait AttachmentMetaGetter: Send + Sync {
    /// Returns attachment metadata. The returned value has `stub` set and no
    /// content.
    async fn attachment_meta(
        &self,
        doc_id: &str,
        filename: &str,
        options: Options,
    ) -> Result<Attachment>;
}

/// A secondary index definition, as reported by [`Finder::get_indexes`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Index {
    /// The design document the index lives in. Empty for built-in indexes.
    #[serde(default, rename = "ddoc")]
    pub design_doc: String,
    /// The index name.
    #[serde(default)]
    pub name: String,
    /// The index type, e.g. "json" or "special".
    #[serde(default, rename = "type")]
    pub kind: String,
    /// The raw index definition.
    #[serde(default)]
    pub definition: Value,
}

/// The backend's plan for executing a selector query, as reported by
/// [`Finder::explain`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryPlan {
    /// The database the plan applies to.
    #[serde(default)]
    pub dbname: String,
    /// The index selected for the query.
    #[serde(default)]
    pub index: Value,
    /// The normalized selector.
    #[serde(default)]
    pub selector: Value,
    /// Query options in effect.
    #[serde(default)]
    pub opts: Value,
    /// The result limit.
    #[serde(default)]
    pub limit: i64,
    /// The number of results to skip.
    #[serde(default)]
    pub skip: i64,
    /// The fields projected from each result.
    #[serde(default)]
    pub fields: Vec<Value>,
    /// The key range scanned by the chosen index.
    #[serde(default)]
    pub range: Value,
}

/// One document reference in a [`BulkGetter::bulk_get`] request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkGetReference {
    /// The document ID.
    pub id: String,
    /// The revision to fetch; empty means the winning revision.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub rev: String,
    /// Only return attachments added since this revision.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub atts_since: String,
}

/// The outcome of one document in a [`BulkDocer::bulk_docs`] request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BulkResult {
    /// The document ID.
    pub id: String,
    /// The new revision, when the write succeeded.
    pub rev: String,
    /// The failure for this document, if any. A per-document failure does not
    /// abort the batch.
    pub error: Option<Error>,
}

/// The outcome of a [`Purger::purge`] request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PurgeResult {
    /// The purge sequence after the operation.
    pub seq: i64,
    /// The revisions actually purged, keyed by document ID.
    pub purged: HashMap<String, Vec<String>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bulk_get_reference_serialization() {
        let r = BulkGetReference {
            id: "a".to_string(),
            rev: "1-x".to_string(),
            atts_since: String::new(),
        };
        assert_eq!(serde_json::to_string(&r).unwrap(), r#"{"id":"a","rev":"1-x"}"#);

        let bare = BulkGetReference { id: "b".to_string(), ..Default::default() };
        assert_eq!(serde_json::to_string(&bare).unwrap(), r#"{"id":"b"}"#);
    }

    #[test]
    fn index_kind_rename() {
        let idx: Index = serde_json::from_str(
            r#"{"ddoc":"_design/a","name":"by-kind","type":"json","definition":{}}"#,
        )
        .unwrap();
        assert_eq!(idx.design_doc, "_design/a");
        assert_eq!(idx.kind, "json");
        assert_eq!(idx.name, "by-kind");
    }
}
