//! Partition statistics for backends supporting data partitioning.

use async_trait::async_trait;
use serde_json::value::RawValue;
use std::fmt;

use crate::error::Result;

/// Optional capability: per-partition storage accounting.
#[async_trait]
pub trait Partitioned: Send + Sync {
    /// Returns a statistics snapshot for the named partition.
    async fn partition_stats(&self, name: &str) -> Result<PartitionStats>;
}

/// A read-only snapshot of one partition's storage accounting.
///
/// Constructed fresh per query and discarded after use by the caller; nothing
/// mutates it.
#[derive(Default)]
pub struct PartitionStats {
    /// The database name.
    pub db_name: String,
    /// The number of live documents in the partition.
    pub doc_count: i64,
    /// The number of deleted documents in the partition.
    pub deleted_doc_count: i64,
    /// The partition name.
    pub partition: String,
    /// Bytes of live data on disk.
    pub active_size: i64,
    /// Uncompressed bytes of user data.
    pub external_size: i64,
    /// The raw backend response, for forward-compatible fields.
    pub raw_response: Option<Box<RawValue>>,
}

impl fmt::Debug for PartitionStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PartitionStats")
            .field("db_name", &self.db_name)
            .field("doc_count", &self.doc_count)
            .field("deleted_doc_count", &self.deleted_doc_count)
            .field("partition", &self.partition)
            .field("active_size", &self.active_size)
            .field("external_size", &self.external_size)
            .finish()
    }
}
