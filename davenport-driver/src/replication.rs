//! Long-lived handles for replication tasks.
//!
//! A [`Replication`] represents one replication between a source and a target
//! database. This layer threads the backend-reported state string through
//! without interpreting it; common values are "triggered", "completed" and
//! "error", but the vocabulary is backend-defined.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::{Error, Result};

/// A handle to one replication task.
#[async_trait]
pub trait Replication: Send + Sync {
    /// The stable identifier of the replication.
    fn replication_id(&self) -> String;

    /// The source database identifier.
    fn source(&self) -> String;

    /// The target database identifier.
    fn target(&self) -> String;

    /// When the replication started.
    fn start_time(&self) -> DateTime<Utc>;

    /// When the replication ended, if it has.
    fn end_time(&self) -> Option<DateTime<Utc>>;

    /// The backend-reported state string, uninterpreted.
    fn state(&self) -> String;

    /// The most recent error reported for the replication, if any.
    fn err(&self) -> Option<Error>;

    /// Cancels and deletes the replication.
    async fn delete(&self) -> Result<()>;

    /// Refreshes the mutable replication-info fields in place.
    async fn update(&self, info: &mut ReplicationInfo) -> Result<()>;
}

/// The mutable progress counters of a replication task.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ReplicationInfo {
    /// Documents read from the source.
    pub docs_read: i64,
    /// Documents written to the target.
    pub docs_written: i64,
    /// Document writes that failed.
    pub doc_write_failures: i64,
    /// Completion estimate in percent.
    pub progress: f64,
}
