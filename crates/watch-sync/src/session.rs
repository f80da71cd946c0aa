//! Sync session
//!
//! One session is the lifetime of one link as seen by the watcher table:
//! a task that exclusively owns the [`WatcherTable`], pulls frames from its
//! inbound subscription, decodes them, applies the resulting events and
//! publishes snapshots and stats.
//!
//! Bad frames and refused events are logged and skipped. The session ends
//! only when the link does, and hands the table back untouched in its
//! [`SessionReport`] so the last known state survives a disconnect.

use crate::codec;
use crate::error::SyncError;
use crate::feed::{FeedSubscription, TableFeed};
use crate::stats::Stats;
use crate::table::{TableSnapshot, WatcherTable};
use crate::transport::{FrameSubscription, Transport};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Why a session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEnd {
    /// The transport was closed by its owner
    Closed,
    /// The connection dropped unexpectedly
    Lost(String),
}

/// Final state of a finished session.
#[derive(Debug)]
pub struct SessionReport {
    /// The table as it was when the session ended
    pub table: WatcherTable,
    pub end: SessionEnd,
    /// Frames received, including ones that failed to decode
    pub frames: u64,
    pub decode_errors: u64,
    /// Events refused by the table (unknown keys, counter regressions)
    pub refused: u64,
}

/// A running sync session.
#[derive(Debug)]
pub struct SyncSession {
    link_id: u64,
    snapshots: FeedSubscription<TableSnapshot>,
    stats: FeedSubscription<Stats>,
    task: JoinHandle<SessionReport>,
}

impl SyncSession {
    /// Subscribe to the transport's live link and start applying frames to `table`.
    ///
    /// Fails with `NotConnected` if `connect()` has not been called.
    pub async fn start(
        transport: &Transport,
        table: WatcherTable,
        initial_stats: Option<Stats>,
    ) -> Result<Self, SyncError> {
        let frames = transport.subscribe().await?;
        Ok(Self::from_subscription(frames, table, initial_stats))
    }

    /// Start a session over an existing inbound subscription.
    pub fn from_subscription(
        frames: FrameSubscription,
        table: WatcherTable,
        initial_stats: Option<Stats>,
    ) -> Self {
        let link_id = frames.link_id();
        let feed = TableFeed::new(&table, initial_stats);
        let snapshots = feed.subscribe_snapshots();
        let stats = feed.subscribe_stats();

        info!(link = link_id, rows = table.len(), "Starting sync session");
        let task = tokio::spawn(run(frames, table, feed));

        Self {
            link_id,
            snapshots,
            stats,
            task,
        }
    }

    pub fn link_id(&self) -> u64 {
        self.link_id
    }

    /// New subscription to table snapshots. Completes when the session ends.
    pub fn snapshots(&self) -> FeedSubscription<TableSnapshot> {
        self.snapshots.clone()
    }

    /// New subscription to stats. Completes when the session ends.
    pub fn stats(&self) -> FeedSubscription<Stats> {
        self.stats.clone()
    }

    /// Wait for the session to end and take back its table.
    pub async fn finished(self) -> Result<SessionReport, SyncError> {
        self.task
            .await
            .map_err(|e| SyncError::Session(e.to_string()))
    }
}

async fn run(mut frames: FrameSubscription, mut table: WatcherTable, feed: TableFeed) -> SessionReport {
    let link_id = frames.link_id();
    let mut received = 0_u64;
    let mut decode_errors = 0_u64;
    let mut refused = 0_u64;

    let end = loop {
        let frame = match frames.next().await {
            Some(Ok(frame)) => frame,
            Some(Err(SyncError::ConnectionLost(reason))) => break SessionEnd::Lost(reason),
            Some(Err(e)) => break SessionEnd::Lost(e.to_string()),
            None => break SessionEnd::Closed,
        };
        received += 1;

        let event = match codec::decode_frame(&frame) {
            Ok(event) => event,
            Err(e) => {
                decode_errors += 1;
                warn!(link = link_id, bytes = frame.byte_len(), "Dropping malformed frame: {}", e);
                continue;
            }
        };

        let kind = event.kind();
        let key = event.key().clone();
        match table.apply(event) {
            Ok(applied) => {
                debug!(link = link_id, %key, kind, ?applied, "Watcher event applied");
                feed.publish(&table);
            }
            Err(warning) => {
                refused += 1;
                warn!(link = link_id, kind, "Dropping watcher event: {}", warning);
            }
        }
    };

    match &end {
        SessionEnd::Closed => info!(link = link_id, frames = received, "Sync session closed"),
        SessionEnd::Lost(reason) => {
            warn!(link = link_id, frames = received, "Sync session lost its connection: {}", reason)
        }
    }

    // Dropping the feed completes every snapshot and stats subscription.
    drop(feed);

    SessionReport {
        table,
        end,
        frames: received,
        decode_errors,
        refused,
    }
}
