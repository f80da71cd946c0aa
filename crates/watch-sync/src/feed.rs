//! Snapshot and stats publication
//!
//! Both feeds are level signals backed by `tokio::sync::watch`: a slow
//! subscriber skips intermediate revisions and always observes the latest
//! value. When the publishing session ends the sender is dropped and every
//! subscription completes, while the last published value stays readable.

use crate::stats::{self, Stats};
use crate::table::{TableSnapshot, WatcherTable};
use tokio::sync::watch;

/// Publisher side, owned by the sync session.
#[derive(Debug)]
pub struct TableFeed {
    snapshots: watch::Sender<TableSnapshot>,
    stats: watch::Sender<Stats>,
}

impl TableFeed {
    /// Start a feed from the table's current contents.
    ///
    /// `initial_stats` (typically the REST `/stats` answer) is only used
    /// while the table is still empty; otherwise stats come from the rows.
    pub fn new(table: &WatcherTable, initial_stats: Option<Stats>) -> Self {
        let snapshot = table.snapshot();
        let stats = match initial_stats {
            Some(initial) if table.is_empty() => initial,
            _ => stats::compute(snapshot.rows()),
        };
        let (snapshots, _) = watch::channel(snapshot);
        let (stats, _) = watch::channel(stats);
        Self { snapshots, stats }
    }

    /// Publish the table after a successful apply.
    pub fn publish(&self, table: &WatcherTable) {
        let snapshot = table.snapshot();
        let stats = stats::compute(snapshot.rows());
        self.snapshots.send_replace(snapshot);
        self.stats.send_if_modified(|current| {
            if *current == stats {
                false
            } else {
                *current = stats;
                true
            }
        });
    }

    pub fn subscribe_snapshots(&self) -> FeedSubscription<TableSnapshot> {
        FeedSubscription::new(self.snapshots.subscribe())
    }

    pub fn subscribe_stats(&self) -> FeedSubscription<Stats> {
        FeedSubscription::new(self.stats.subscribe())
    }
}

/// Subscriber side of a feed.
#[derive(Debug, Clone)]
pub struct FeedSubscription<T> {
    rx: watch::Receiver<T>,
}

impl<T: Clone> FeedSubscription<T> {
    pub(crate) fn new(rx: watch::Receiver<T>) -> Self {
        Self { rx }
    }

    /// Wait for a value newer than the last one seen.
    ///
    /// Returns `None` once the publisher is gone and nothing unseen remains.
    pub async fn next(&mut self) -> Option<T> {
        self.rx.changed().await.ok()?;
        Some(self.rx.borrow_and_update().clone())
    }

    /// Most recent value, seen or not. Still available after completion.
    pub fn latest(&self) -> T {
        self.rx.borrow().clone()
    }

    /// Treat the current value as seen, so `next` waits for a newer one.
    pub fn mark_seen(&mut self) {
        self.rx.borrow_and_update();
    }

    /// Whether the publisher has gone away.
    pub fn is_closed(&self) -> bool {
        self.rx.has_changed().is_err()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{WatcherEvent, WatcherKey, WatcherState};

    fn running_pod() -> WatcherEvent {
        WatcherEvent::Snapshot(WatcherState {
            running: true,
            ..WatcherState::new(WatcherKey::cluster("v1.Pod"))
        })
    }

    #[test]
    fn test_initial_stats_used_only_for_empty_table() {
        let initial = Stats {
            total: 9,
            running: 4,
            stopped: 5,
        };

        let empty = TableFeed::new(&WatcherTable::new(), Some(initial));
        assert_eq!(empty.subscribe_stats().latest(), initial);

        let mut table = WatcherTable::new();
        table.apply(running_pod()).unwrap();
        let populated = TableFeed::new(&table, Some(initial));
        assert_eq!(
            populated.subscribe_stats().latest(),
            Stats {
                total: 1,
                running: 1,
                stopped: 0
            }
        );
    }

    #[tokio::test]
    async fn test_publish_reaches_subscribers_and_coalesces() {
        let mut table = WatcherTable::new();
        let feed = TableFeed::new(&table, None);
        let mut snapshots = feed.subscribe_snapshots();

        table.apply(running_pod()).unwrap();
        feed.publish(&table);
        table
            .apply(WatcherEvent::Removed(WatcherKey::cluster("v1.Pod")))
            .unwrap();
        feed.publish(&table);

        // Only the latest revision is delivered to a lagging subscriber.
        let latest = snapshots.next().await.unwrap();
        assert_eq!(latest.revision, 2);
        assert!(latest.rows().is_empty());
    }

    #[tokio::test]
    async fn test_subscriptions_complete_when_feed_dropped() {
        let mut table = WatcherTable::new();
        let feed = TableFeed::new(&table, None);
        let mut snapshots = feed.subscribe_snapshots();
        let mut stats = feed.subscribe_stats();

        table.apply(running_pod()).unwrap();
        feed.publish(&table);
        drop(feed);

        // The unseen value is still delivered, then the stream completes.
        assert_eq!(snapshots.next().await.unwrap().revision, 1);
        assert!(snapshots.next().await.is_none());
        assert!(snapshots.is_closed());
        assert_eq!(snapshots.latest().revision, 1);

        assert_eq!(stats.next().await.unwrap().running, 1);
        assert!(stats.next().await.is_none());
    }
}
