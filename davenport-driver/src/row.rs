//! Query result rows and the pull-based result iterator protocol.
//!
//! Every listing operation on a backend (views, all-docs, find, bulk-get,
//! design/local doc listings) yields its results through the [`Rows`] protocol:
//! a single-consumer cursor that produces [`Row`] values lazily, so a backend
//! may still be receiving or decoding upstream data while the consumer pulls.
//!
//! # Termination
//!
//! `next` returns `Ok(None)` once the result set is exhausted; any other failure
//! is an [`Error`]. Both outcomes are terminal: no later `next` call yields more
//! rows, but `close` remains safe to call.
//!
//! # Optional side channels
//!
//! A concrete iterator may additionally implement [`RowsWarner`], [`Bookmarker`],
//! or [`QueryIndexer`]. Consumers discover these through the accessor hooks on
//! [`Rows`], which default to `None`.

use async_trait::async_trait;
use futures::io::{AsyncRead, AsyncReadExt};
use serde::Deserialize;
use serde_json::value::RawValue;
use std::fmt;
use std::pin::Pin;

use crate::error::{Error, Result};

/// A streamed, raw JSON payload attached to a row or document.
pub type PayloadReader = Pin<Box<dyn AsyncRead + Send>>;

/// A generic view result row.
///
/// `key`, `value` and `doc` hold raw, un-decoded JSON; this layer never parses
/// them. When a streaming reader is supplied alongside the raw-bytes form, the
/// reader takes precedence — use [`Row::read_value`] and [`Row::read_doc`],
/// which encode that rule.
#[derive(Default, Deserialize)]
pub struct Row {
    /// The document ID of the result. Empty for reduce-view rows.
    #[serde(default)]
    pub id: String,
    /// The raw view key of the result. For built-in listings this is the
    /// document ID encoded as JSON.
    #[serde(default)]
    pub key: Option<Box<RawValue>>,
    /// Streamed access to the raw value. Takes priority over `value`.
    #[serde(skip)]
    pub value_reader: Option<PayloadReader>,
    /// The raw, un-decoded JSON value.
    #[serde(default)]
    pub value: Option<Box<RawValue>>,
    /// Streamed access to the raw document. Takes priority over `doc`.
    #[serde(skip)]
    pub doc_reader: Option<PayloadReader>,
    /// The raw, un-decoded JSON document. Only populated when the operation
    /// requested document inclusion.
    #[serde(default)]
    pub doc: Option<Box<RawValue>>,
    /// The error for a row that could not be fetched, usually a not-found in a
    /// bulk-get. A row-level error does not terminate the iterator.
    #[serde(skip)]
    pub error: Option<Error>,
}

impl Row {
    /// Reads the row's value payload, honoring reader-over-bytes precedence.
    ///
    /// Drains `value_reader` if one is present, otherwise copies the raw
    /// `value` field. Returns `None` when the row carries no value at all.
    pub async fn read_value(&mut self) -> Result<Option<Vec<u8>>> {
        read_payload(&mut self.value_reader, self.value.as_deref()).await
    }

    /// Reads the row's document payload, honoring reader-over-bytes precedence.
    ///
    /// Drains `doc_reader` if one is present, otherwise copies the raw `doc`
    /// field. Returns `None` when no document was included.
    pub async fn read_doc(&mut self) -> Result<Option<Vec<u8>>> {
        read_payload(&mut self.doc_reader, self.doc.as_deref()).await
    }
}

async fn read_payload(
    reader: &mut Option<PayloadReader>,
    raw: Option<&RawValue>,
) -> Result<Option<Vec<u8>>> {
    if let Some(mut r) = reader.take() {
        let mut buf = Vec::new();
        r.read_to_end(&mut buf).await?;
        return Ok(Some(buf));
    }
    Ok(raw.map(|v| v.get().as_bytes().to_vec()))
}

impl fmt::Debug for Row {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Row")
            .field("id", &self.id)
            .field("key", &self.key.as_ref().map(|k| k.get()))
            .field("value", &self.value.as_ref().map(|v| v.get()))
            .field("value_reader", &self.value_reader.is_some())
            .field("doc", &self.doc.as_ref().map(|d| d.get()))
            .field("doc_reader", &self.doc_reader.is_some())
            .field("error", &self.error)
            .finish()
    }
}

/// A single-consumer, stateful cursor over an ordered sequence of rows.
///
/// One task pulls with `next` until exhaustion or error; concurrent `next`
/// calls on the same iterator are undefined and must be prevented by the
/// caller. `close` is the sanctioned cancellation mechanism and is safe to
/// invoke from another task while a `next` call is blocked.
#[async_trait]
pub trait Rows: Send + Sync {
    /// Produces the next row in the result set.
    ///
    /// Returns `Ok(None)` when the sequence is exhausted. After end-of-stream
    /// or an error, subsequent calls keep reporting the terminal state.
    async fn next(&self) -> Result<Option<Row>>;

    /// Releases the underlying connection or buffer.
    ///
    /// Idempotent: calling it twice, before the first `next`, or after natural
    /// exhaustion must succeed. Must unblock a concurrently blocked `next`
    /// promptly.
    async fn close(&self) -> Result<()>;

    /// The database's update sequence as of when the result set was computed,
    /// or an empty string if not requested or unavailable.
    fn update_seq(&self) -> String;

    /// The offset where the result set starts. Sentinel semantics for
    /// "unknown" are backend-defined but consistent within one backend.
    fn offset(&self) -> i64;

    /// The number of documents in the database or view.
    fn total_rows(&self) -> i64;

    /// Hook for the non-fatal warning side channel.
    fn warner(&self) -> Option<&dyn RowsWarner> {
        None
    }

    /// Hook for the paging bookmark side channel.
    fn bookmarker(&self) -> Option<&dyn Bookmarker> {
        None
    }

    /// Hook for the multi-query index side channel.
    fn query_indexer(&self) -> Option<&dyn QueryIndexer> {
        None
    }
}

/// Optional side channel for a non-fatal diagnostic generated by a query,
/// e.g. "no matching index found, falling back to full scan". A warning
/// coexists with normal row delivery and is never a terminal error.
pub trait RowsWarner: Send + Sync {
    /// Returns the warning generated by the query, if any.
    fn warning(&self) -> String;
}

/// Optional side channel for an opaque paging continuation token.
///
/// The client treats the bookmark as an opaque string and never parses it.
pub trait Bookmarker: Send + Sync {
    /// Returns the bookmark for resuming a paged query.
    fn bookmark(&self) -> String;
}

/// Optional side channel identifying which sub-query of a multi-query batch
/// produced this row sequence.
pub trait QueryIndexer: Send + Sync {
    /// Returns the index of the originating sub-query.
    fn query_index(&self) -> i64;
}
