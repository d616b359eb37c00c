//! A scriptable replication handle.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Mutex as StdMutex;
use std::sync::atomic::{AtomicBool, Ordering};

use davenport_driver::error::{Error, Result};
use davenport_driver::replication::{Replication, ReplicationInfo};

/// A `Replication` handle with every reported field scripted up front.
///
/// Source and target default to `<id>-source` and `<id>-target` when not set,
/// so most fixtures only need an ID. `delete` is modeled as terminal: a second
/// delete reports the replication as not found.
pub struct MockReplication {
    id: String,
    source: Option<String>,
    target: Option<String>,
    start_time: DateTime<Utc>,
    end_time: Option<DateTime<Utc>>,
    state: String,
    err: Option<Error>,
    info: StdMutex<ReplicationInfo>,
    deleted: AtomicBool,
}

impl MockReplication {
    /// Creates a builder for a replication with the given ID.
    pub fn builder(id: impl Into<String>) -> MockReplicationBuilder {
        MockReplicationBuilder {
            id: id.into(),
            source: None,
            target: None,
            start_time: Utc::now(),
            end_time: None,
            state: String::new(),
            err: None,
            info: ReplicationInfo::default(),
        }
    }
}

#[async_trait]
impl Replication for MockReplication {
    fn replication_id(&self) -> String {
        self.id.clone()
    }

    fn source(&self) -> String {
        match &self.source {
            Some(source) => source.clone(),
            None => format!("{}-source", self.id),
        }
    }

    fn target(&self) -> String {
        match &self.target {
            Some(target) => target.clone(),
            None => format!("{}-target", self.id),
        }
    }

    fn start_time(&self) -> DateTime<Utc> {
        self.start_time
    }

    fn end_time(&self) -> Option<DateTime<Utc>> {
        self.end_time
    }

    fn state(&self) -> String {
        self.state.clone()
    }

    fn err(&self) -> Option<Error> {
        self.err.clone()
    }

    async fn delete(&self) -> Result<()> {
        if self.deleted.swap(true, Ordering::AcqRel) {
            return Err(Error::NotFound(self.id.clone()));
        }
        Ok(())
    }

    async fn update(&self, info: &mut ReplicationInfo) -> Result<()> {
        if self.deleted.load(Ordering::Acquire) {
            return Err(Error::NotFound(self.id.clone()));
        }
        *info = *self
            .info
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Ok(())
    }
}

/// Builder assembling a [`MockReplication`] fixture.
pub struct MockReplicationBuilder {
    id: String,
    source: Option<String>,
    target: Option<String>,
    start_time: DateTime<Utc>,
    end_time: Option<DateTime<Utc>>,
    state: String,
    err: Option<Error>,
    info: ReplicationInfo,
}

impl MockReplicationBuilder {
    /// Sets the source database identifier.
    pub fn source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Sets the target database identifier.
    pub fn target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    /// Sets the start timestamp. Defaults to the build time.
    pub fn start_time(mut self, at: DateTime<Utc>) -> Self {
        self.start_time = at;
        self
    }

    /// Sets the end timestamp.
    pub fn end_time(mut self, at: DateTime<Utc>) -> Self {
        self.end_time = Some(at);
        self
    }

    /// Sets the reported state string.
    pub fn state(mut self, state: impl Into<String>) -> Self {
        self.state = state.into();
        self
    }

    /// Sets the reported replication error.
    pub fn error(mut self, err: Error) -> Self {
        self.err = Some(err);
        self
    }

    /// Sets the progress counters reported by `update`.
    pub fn info(mut self, info: ReplicationInfo) -> Self {
        self.info = info;
        self
    }

    /// Builds the handle.
    pub fn build(self) -> MockReplication {
        MockReplication {
            id: self.id,
            source: self.source,
            target: self.target,
            start_time: self.start_time,
            end_time: self.end_time,
            state: self.state,
            err: self.err,
            info: StdMutex::new(self.info),
            deleted: AtomicBool::new(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn source_and_target_default_from_id() {
        let rep = MockReplication::builder("rep1").build();
        assert_eq!(rep.replication_id(), "rep1");
        assert_eq!(rep.source(), "rep1-source");
        assert_eq!(rep.target(), "rep1-target");

        let rep = MockReplication::builder("rep2")
            .source("db-a")
            .target("db-b")
            .build();
        assert_eq!(rep.source(), "db-a");
        assert_eq!(rep.target(), "db-b");
    }

    #[tokio::test]
    async fn update_copies_scripted_info() {
        let rep = MockReplication::builder("rep1")
            .state("triggered")
            .info(ReplicationInfo {
                docs_read: 10,
                docs_written: 9,
                doc_write_failures: 1,
                progress: 90.0,
            })
            .build();

        let mut info = ReplicationInfo::default();
        rep.update(&mut info).await.unwrap();
        assert_eq!(info.docs_written, 9);
        assert_eq!(info.progress, 90.0);
        assert_eq!(rep.state(), "triggered");
        assert!(rep.err().is_none());
        assert!(rep.end_time().is_none());
    }

    #[tokio::test]
    async fn second_delete_reports_not_found() {
        let rep = MockReplication::builder("rep1").build();
        rep.delete().await.unwrap();
        assert!(matches!(rep.delete().await, Err(Error::NotFound(_))));

        let mut info = ReplicationInfo::default();
        assert!(matches!(rep.update(&mut info).await, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn error_state_round_trip() {
        let rep = MockReplication::builder("rep1")
            .state("error")
            .error(Error::Backend("target unreachable".to_string()))
            .end_time(Utc::now())
            .build();
        assert_eq!(rep.state(), "error");
        assert!(matches!(rep.err(), Some(Error::Backend(_))));
        assert!(rep.end_time().is_some());
    }
}
