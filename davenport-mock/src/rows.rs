//! A fixture-backed implementation of the `Rows` iterator protocol.

use async_trait::async_trait;
use mea::mutex::Mutex;
use std::collections::VecDeque;

use davenport_driver::error::{Error, Result};
use davenport_driver::row::{Bookmarker, QueryIndexer, Row, Rows, RowsWarner};

/// Internal cursor state, guarded by one async mutex.
struct Cursor {
    queue: VecDeque<Result<Row>>,
    /// Sticky fatal error; repeated after the first failing `next`.
    failed: Option<Error>,
    /// Set once a `next` call observed natural end-of-stream.
    exhausted: bool,
    closed: bool,
}

/// A `Rows` iterator that replays a scripted sequence of rows and faults.
///
/// Exhaustion yields `Ok(None)` on every subsequent `next`; an injected fatal
/// error is sticky; `close` is idempotent and terminal. Side-channel values
/// (warning, bookmark, query index) are only exposed through the optional
/// interfaces when configured on the builder.
pub struct MockRows {
    cursor: Mutex<Cursor>,
    update_seq: String,
    offset: i64,
    total_rows: i64,
    warning: Option<String>,
    bookmark: Option<String>,
    query_index: Option<i64>,
}

impl MockRows {
    /// Creates a builder with an empty fixture.
    pub fn builder() -> MockRowsBuilder {
        MockRowsBuilder::default()
    }

    /// Creates an iterator over the given rows with no metadata.
    pub fn from_rows(rows: Vec<Row>) -> Self {
        rows.into_iter()
            .fold(Self::builder(), MockRowsBuilder::row)
            .build()
    }
}

#[async_trait]
impl Rows for MockRows {
    async fn next(&self) -> Result<Option<Row>> {
        let mut cursor = self.cursor.lock().await;
        if cursor.closed {
            // Closing after natural end-of-stream does not change the
            // terminal state; closing mid-iteration is a cancellation.
            return if cursor.exhausted {
                Ok(None)
            } else {
                Err(Error::Cancelled)
            };
        }
        if let Some(err) = &cursor.failed {
            return Err(err.clone());
        }
        match cursor.queue.pop_front() {
            Some(Ok(row)) => Ok(Some(row)),
            Some(Err(err)) => {
                cursor.failed = Some(err.clone());
                Err(err)
            }
            None => {
                cursor.exhausted = true;
                Ok(None)
            }
        }
    }

    async fn close(&self) -> Result<()> {
        let mut cursor = self.cursor.lock().await;
        cursor.closed = true;
        cursor.queue.clear();
        Ok(())
    }

    fn update_seq(&self) -> String {
        self.update_seq.clone()
    }

    fn offset(&self) -> i64 {
        self.offset
    }

    fn total_rows(&self) -> i64 {
        self.total_rows
    }

    fn warner(&self) -> Option<&dyn RowsWarner> {
        self.warning.as_ref().map(|_| self as &dyn RowsWarner)
    }

    fn bookmarker(&self) -> Option<&dyn Bookmarker> {
        self.bookmark.as_ref().map(|_| self as &dyn Bookmarker)
    }

    fn query_indexer(&self) -> Option<&dyn QueryIndexer> {
        self.query_index.map(|_| self as &dyn QueryIndexer)
    }
}

impl RowsWarner for MockRows {
    fn warning(&self) -> String {
        self.warning.clone().unwrap_or_default()
    }
}

impl Bookmarker for MockRows {
    fn bookmark(&self) -> String {
        self.bookmark.clone().unwrap_or_default()
    }
}

impl QueryIndexer for MockRows {
    fn query_index(&self) -> i64 {
        self.query_index.unwrap_or_default()
    }
}

/// Builder assembling a [`MockRows`] fixture.
#[derive(Default)]
pub struct MockRowsBuilder {
    items: Vec<Result<Row>>,
    update_seq: String,
    offset: i64,
    total_rows: i64,
    warning: Option<String>,
    bookmark: Option<String>,
    query_index: Option<i64>,
}

impl MockRowsBuilder {
    /// Appends a row to the fixture.
    pub fn row(mut self, row: Row) -> Self {
        self.items.push(Ok(row));
        self
    }

    /// Appends a fatal iterator error to the fixture. Rows scripted after it
    /// are unreachable.
    pub fn error(mut self, err: Error) -> Self {
        self.items.push(Err(err));
        self
    }

    /// Sets the update sequence reported by the iterator.
    pub fn update_seq(mut self, seq: impl Into<String>) -> Self {
        self.update_seq = seq.into();
        self
    }

    /// Sets the paging offset.
    pub fn offset(mut self, offset: i64) -> Self {
        self.offset = offset;
        self
    }

    /// Sets the total row count.
    pub fn total_rows(mut self, total: i64) -> Self {
        self.total_rows = total;
        self
    }

    /// Exposes the warning side channel with the given diagnostic.
    pub fn warning(mut self, warning: impl Into<String>) -> Self {
        self.warning = Some(warning.into());
        self
    }

    /// Exposes the bookmark side channel with the given token.
    pub fn bookmark(mut self, bookmark: impl Into<String>) -> Self {
        self.bookmark = Some(bookmark.into());
        self
    }

    /// Exposes the query-index side channel with the given index.
    pub fn query_index(mut self, index: i64) -> Self {
        self.query_index = Some(index);
        self
    }

    /// Builds the iterator.
    pub fn build(self) -> MockRows {
        MockRows {
            cursor: Mutex::new(Cursor {
                queue: self.items.into(),
                failed: None,
                exhausted: false,
                closed: false,
            }),
            update_seq: self.update_seq,
            offset: self.offset,
            total_rows: self.total_rows,
            warning: self.warning,
            bookmark: self.bookmark,
            query_index: self.query_index,
        }
    }
}
