//! A channel-driven implementation of the `Changes` feed protocol.
//!
//! Finite fixtures replay a scripted list of events and then end. Live feeds
//! stay open: `next` blocks until an event arrives through the [`FeedHandle`]
//! or the feed is closed, which mirrors a continuous changes feed.

use async_trait::async_trait;
use futures::StreamExt;
use futures::channel::mpsc::{self, UnboundedReceiver, UnboundedSender};
use mea::mutex::Mutex;
use std::sync::Mutex as StdMutex;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};

use davenport_driver::changes::{Change, Changes};
use davenport_driver::error::{Error, Result};

enum Item {
    Event(Change),
    Fault(Error),
}

/// A `Changes` iterator fed through an unbounded channel.
///
/// `close` works from the sender side of the channel, so it never contends
/// with a `next` call blocked on the receiver; a blocked `next` wakes promptly
/// with `Ok(None)`.
pub struct MockChanges {
    rx: Mutex<UnboundedReceiver<Item>>,
    tx: UnboundedSender<Item>,
    closed: AtomicBool,
    failed: StdMutex<Option<Error>>,
    last_seq: StdMutex<String>,
    pending: AtomicI64,
    etag: String,
}

impl MockChanges {
    /// Creates a builder with an empty fixture.
    pub fn builder() -> MockChangesBuilder {
        MockChangesBuilder::default()
    }

    /// Creates a finite feed over the given events.
    pub fn from_changes(changes: Vec<Change>) -> Self {
        changes
            .into_iter()
            .fold(Self::builder(), MockChangesBuilder::change)
            .build()
    }

    fn lock_poison_safe<'a, T>(mutex: &'a StdMutex<T>) -> std::sync::MutexGuard<'a, T> {
        mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl Changes for MockChanges {
    async fn next(&self) -> Result<Option<Change>> {
        if let Some(err) = Self::lock_poison_safe(&self.failed).clone() {
            return Err(err);
        }
        if self.closed.load(Ordering::Acquire) {
            return Ok(None);
        }
        let mut rx = self.rx.lock().await;
        match rx.next().await {
            Some(Item::Event(change)) => {
                *Self::lock_poison_safe(&self.last_seq) = change.seq.clone();
                // Strictly decreasing while known; 0 stays at the unknown
                // sentinel.
                let _ = self.pending.fetch_update(
                    Ordering::AcqRel,
                    Ordering::Acquire,
                    |pending| (pending > 0).then(|| pending - 1),
                );
                Ok(Some(change))
            }
            Some(Item::Fault(err)) => {
                *Self::lock_poison_safe(&self.failed) = Some(err.clone());
                Err(err)
            }
            None => Ok(None),
        }
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::Release);
        self.tx.close_channel();
        Ok(())
    }

    fn last_seq(&self) -> String {
        Self::lock_poison_safe(&self.last_seq).clone()
    }

    fn pending(&self) -> i64 {
        self.pending.load(Ordering::Acquire)
    }

    fn etag(&self) -> String {
        self.etag.clone()
    }
}

/// The sender side of a live [`MockChanges`] feed.
#[derive(Clone)]
pub struct FeedHandle {
    tx: UnboundedSender<Item>,
}

impl FeedHandle {
    /// Delivers one change event to the feed. Returns false if the feed has
    /// already been closed.
    pub fn send(&self, change: Change) -> bool {
        self.tx.unbounded_send(Item::Event(change)).is_ok()
    }

    /// Injects a fatal feed error.
    pub fn fault(&self, err: Error) -> bool {
        self.tx.unbounded_send(Item::Fault(err)).is_ok()
    }

    /// Ends the feed cleanly, as a finite "until" feed completing would.
    pub fn end(&self) {
        self.tx.close_channel();
    }
}

/// Builder assembling a [`MockChanges`] fixture.
#[derive(Default)]
pub struct MockChangesBuilder {
    items: Vec<Item>,
    last_seq: String,
    pending: Option<i64>,
    etag: String,
}

impl MockChangesBuilder {
    /// Appends a change event to the fixture.
    pub fn change(mut self, change: Change) -> Self {
        self.items.push(Item::Event(change));
        self
    }

    /// Appends a fatal feed error to the fixture.
    pub fn error(mut self, err: Error) -> Self {
        self.items.push(Item::Fault(err));
        self
    }

    /// Sets the last sequence reported before any event is consumed.
    pub fn last_seq(mut self, seq: impl Into<String>) -> Self {
        self.last_seq = seq.into();
        self
    }

    /// Overrides the initial pending estimate. Defaults to the number of
    /// scripted events for finite feeds and 0 (unknown) for live feeds.
    pub fn pending(mut self, pending: i64) -> Self {
        self.pending = Some(pending);
        self
    }

    /// Sets the unquoted cache-validation tag.
    pub fn etag(mut self, etag: impl Into<String>) -> Self {
        self.etag = etag.into();
        self
    }

    /// Builds a finite feed: the scripted events are delivered, then
    /// end-of-stream.
    pub fn build(self) -> MockChanges {
        let (feed, handle) = self.build_live();
        handle.end();
        feed
    }

    /// Builds a live feed plus the handle that feeds it. The feed only ends
    /// when the handle ends it or the consumer closes it.
    pub fn build_live(self) -> (MockChanges, FeedHandle) {
        let pending = self.pending.unwrap_or_else(|| {
            self.items
                .iter()
                .filter(|item| matches!(item, Item::Event(_)))
                .count() as i64
        });
        let (tx, rx) = mpsc::unbounded();
        for item in self.items {
            // Receiver is alive, the send cannot fail.
            let _ = tx.unbounded_send(item);
        }
        let feed = MockChanges {
            rx: Mutex::new(rx),
            tx: tx.clone(),
            closed: AtomicBool::new(false),
            failed: StdMutex::new(None),
            last_seq: StdMutex::new(self.last_seq),
            pending: AtomicI64::new(pending),
            etag: self.etag,
        };
        (feed, FeedHandle { tx })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use davenport_driver::changes::ChangedRevs;
    use std::sync::Arc;
    use std::time::Duration;

    fn event(id: &str, seq: &str) -> Change {
        Change {
            id: id.to_string(),
            seq: seq.to_string(),
            changes: ChangedRevs::from(vec![format!("1-{id}")]),
            ..Change::default()
        }
    }

    #[tokio::test]
    async fn finite_feed_yields_all_events() {
        let feed = MockChanges::from_changes(vec![
            event("a", "1"),
            event("b", "2"),
            event("c", "3"),
        ]);

        let mut seen = 0;
        let mut last_pending = feed.pending();
        while let Some(change) = feed.next().await.unwrap() {
            seen += 1;
            assert_eq!(feed.last_seq(), change.seq);
            let pending = feed.pending();
            assert!(pending < last_pending || pending <= 0);
            last_pending = pending;
        }
        assert_eq!(seen, 3);
        assert_eq!(feed.last_seq(), "3");
        assert_eq!(feed.pending(), 0);
        // End-of-stream repeats.
        assert!(feed.next().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn close_is_idempotent() {
        let feed = MockChanges::from_changes(vec![event("a", "1")]);
        feed.close().await.unwrap();
        feed.close().await.unwrap();
        assert!(feed.next().await.unwrap().is_none());
        feed.close().await.unwrap();
    }

    #[tokio::test]
    async fn close_unblocks_blocked_next() {
        let (feed, _handle) = MockChanges::builder().build_live();
        let feed = Arc::new(feed);

        let consumer = {
            let feed = Arc::clone(&feed);
            tokio::spawn(async move { feed.next().await })
        };
        // Let the consumer block on the empty feed before closing.
        tokio::time::sleep(Duration::from_millis(20)).await;
        feed.close().await.unwrap();

        let outcome = tokio::time::timeout(Duration::from_secs(1), consumer)
            .await
            .expect("blocked next was not unblocked by close")
            .unwrap();
        assert!(outcome.unwrap().is_none());
    }

    #[tokio::test]
    async fn live_feed_delivers_then_ends() {
        let (feed, handle) = MockChanges::builder().last_seq("0").build_live();
        assert!(handle.send(event("a", "1")));
        handle.end();

        assert_eq!(feed.next().await.unwrap().unwrap().id, "a");
        assert!(feed.next().await.unwrap().is_none());
        assert_eq!(feed.last_seq(), "1");
        // The sender side is gone.
        assert!(!handle.send(event("b", "2")));
    }

    #[tokio::test]
    async fn fault_is_sticky() {
        let feed = MockChanges::builder()
            .change(event("a", "1"))
            .error(Error::Io("stream reset".to_string()))
            .build();

        assert_eq!(feed.next().await.unwrap().unwrap().id, "a");
        for _ in 0..2 {
            match feed.next().await {
                Err(Error::Io(msg)) => assert_eq!(msg, "stream reset"),
                other => panic!("expected sticky Io error, got {other:?}"),
            }
        }
        feed.close().await.unwrap();
    }

    #[tokio::test]
    async fn etag_and_unknown_pending() {
        let feed = MockChanges::builder().etag("abc123").pending(-1).build();
        assert_eq!(feed.etag(), "abc123");
        assert_eq!(feed.pending(), -1);
        assert!(feed.next().await.unwrap().is_none());
        // The unknown sentinel is left alone.
        assert_eq!(feed.pending(), -1);
    }
}
