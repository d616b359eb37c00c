//! Change-feed events and the pull-based change feed iterator protocol.
//!
//! The changes feed is structurally the same pull model as [`crate::row::Rows`],
//! specialized for a stream that may be unbounded: a live, continuous feed only
//! ends when the consumer closes it.

use async_trait::async_trait;
use serde::{Deserialize, Deserializer};
use serde_json::value::RawValue;
use std::fmt;
use std::ops::Deref;

use crate::error::Result;

/// The changes to a single document.
#[derive(Default, Deserialize)]
pub struct Change {
    /// The document ID to which the change relates.
    #[serde(default)]
    pub id: String,
    /// The update sequence for this change. Opaque and backend-defined;
    /// sequences are not globally comparable as integers.
    #[serde(default)]
    pub seq: String,
    /// True if this change represents a deletion.
    #[serde(default)]
    pub deleted: bool,
    /// The document's current leaf revisions.
    #[serde(default)]
    pub changes: ChangedRevs,
    /// The raw, un-decoded JSON document. Only populated when document
    /// inclusion was requested.
    #[serde(default)]
    pub doc: Option<Box<RawValue>>,
}

impl fmt::Debug for Change {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Change")
            .field("id", &self.id)
            .field("seq", &self.seq)
            .field("deleted", &self.deleted)
            .field("changes", &self.changes)
            .field("doc", &self.doc.as_ref().map(|d| d.get()))
            .finish()
    }
}

/// The ordered list of leaf revision identifiers in a change event.
///
/// On the wire this is a list of records each carrying a single `rev` field;
/// decoding flattens it to the revision strings, preserving input order and
/// length exactly. A record without a `rev` field decodes to an empty string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangedRevs(pub Vec<String>);

impl<'de> Deserialize<'de> for ChangedRevs {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct LeafRev {
            #[serde(default)]
            rev: String,
        }

        let leaves = Vec::<LeafRev>::deserialize(deserializer)?;
        Ok(Self(leaves.into_iter().map(|leaf| leaf.rev).collect()))
    }
}

impl Deref for ChangedRevs {
    type Target = [String];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<Vec<String>> for ChangedRevs {
    fn from(revs: Vec<String>) -> Self {
        Self(revs)
    }
}

/// A single-consumer cursor over the database changes feed.
///
/// The same pull contract as [`crate::row::Rows`] applies, with one
/// distinction: `Ok(None)` from `next` specifically means the feed ended *by
/// request* — a client-initiated `close`, or a finite feed completing. Any
/// other failure is an error, and this layer never retries it; retry policy
/// belongs to the concrete backend or the caller.
#[async_trait]
pub trait Changes: Send + Sync {
    /// Produces the next change in the feed.
    ///
    /// For a continuous feed this may block indefinitely awaiting new events;
    /// `close` from another task must unblock it promptly.
    async fn next(&self) -> Result<Option<Change>>;

    /// Terminates the feed. For a continuous feed this is the only way the
    /// consumer stops consumption. Idempotent.
    async fn close(&self) -> Result<()>;

    /// The most recent update sequence observed, used to resume a future feed
    /// from this point.
    fn last_seq(&self) -> String;

    /// The backend's estimate of remaining unread changes. Zero or negative
    /// means unknown, backend-defined.
    fn pending(&self) -> i64;

    /// The unquoted cache-validation tag for a static feed snapshot, or an
    /// empty string if not applicable.
    fn etag(&self) -> String;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn changed_revs_order_and_length() {
        let revs: ChangedRevs = serde_json::from_str(r#"[{"rev":"1-a"},{"rev":"2-b"}]"#).unwrap();
        assert_eq!(&*revs, &["1-a".to_string(), "2-b".to_string()]);
    }

    #[test]
    fn changed_revs_empty_list() {
        let revs: ChangedRevs = serde_json::from_str("[]").unwrap();
        assert_eq!(revs, ChangedRevs::default());
        assert_eq!(revs.len(), 0);
    }

    #[test]
    fn changed_revs_missing_rev_field() {
        // A record without "rev" still occupies its slot, as an empty string.
        let revs: ChangedRevs =
            serde_json::from_str(r#"[{"rev":"1-a"},{"other":true},{"rev":"3-c"}]"#).unwrap();
        assert_eq!(&*revs, &["1-a".to_string(), String::new(), "3-c".to_string()]);
    }

    #[test]
    fn changed_revs_malformed_json() {
        assert!(serde_json::from_str::<ChangedRevs>(r#"{"rev":"1-a"}"#).is_err());
        assert!(serde_json::from_str::<ChangedRevs>("[{").is_err());
    }

    #[test]
    fn deserialize_change() {
        let change: Change = serde_json::from_str(
            r#"{"id":"doc1","seq":"3-g1A","deleted":true,"changes":[{"rev":"3-z"}],"doc":{"_deleted":true}}"#,
        )
        .unwrap();
        assert_eq!(change.id, "doc1");
        assert_eq!(change.seq, "3-g1A");
        assert!(change.deleted);
        assert_eq!(&*change.changes, &["3-z".to_string()]);
        assert_eq!(change.doc.unwrap().get(), r#"{"_deleted":true}"#);
    }
}
