//! Log renderer
//!
//! Follows a session's snapshot and stats feeds and writes them to the log.
//! Only rows that changed since the previous snapshot are logged at `info`;
//! the full table goes to `debug`.

use chrono::{DateTime, Utc};
use tracing::{debug, info};
use watch_sync::{FeedSubscription, Stats, TableSnapshot, WatcherKey, WatcherState};

/// One watcher row as a single log line.
pub fn format_row(row: &WatcherState, now: DateTime<Utc>) -> String {
    let last_event = match row.last_event_at {
        Some(at) => format!("{}s ago", (now - at).num_seconds().max(0)),
        None => "never".to_string(),
    };
    format!(
        "{:<20} {:<40} {:<8} queue={:<5} handled={} unhandled={} events={} last={}",
        row.key.display_namespace(),
        row.key.resource,
        if row.running { "running" } else { "stopped" },
        row.queue_non_empty,
        row.handled_event_count,
        row.unhandled_event_count,
        row.total_event_count(),
        last_event
    )
}

pub fn format_stats(stats: &Stats) -> String {
    format!(
        "watchers: {} total, {} running, {} stopped",
        stats.total, stats.running, stats.stopped
    )
}

/// Rows that are new or different in `next`, and keys that disappeared.
pub fn diff<'a>(
    previous: &TableSnapshot,
    next: &'a TableSnapshot,
) -> (Vec<&'a WatcherState>, Vec<WatcherKey>) {
    let changed = next
        .rows()
        .iter()
        .filter(|row| previous.get(&row.key) != Some(*row))
        .collect();
    let removed = previous
        .rows()
        .iter()
        .filter(|row| next.get(&row.key).is_none())
        .map(|row| row.key.clone())
        .collect();
    (changed, removed)
}

/// Log snapshot changes until the feed completes.
pub async fn render_snapshots(mut snapshots: FeedSubscription<TableSnapshot>) {
    let mut previous = snapshots.latest();
    log_table(&previous);

    while let Some(snapshot) = snapshots.next().await {
        let now = Utc::now();
        let (changed, removed) = diff(&previous, &snapshot);
        for row in changed {
            info!("{}", format_row(row, now));
        }
        for key in removed {
            info!("Watcher {} removed", key);
        }
        log_table(&snapshot);
        previous = snapshot;
    }
    debug!("Snapshot feed completed");
}

/// Log stats changes until the feed completes.
pub async fn render_stats(mut stats: FeedSubscription<Stats>) {
    info!("{}", format_stats(&stats.latest()));
    while let Some(current) = stats.next().await {
        info!("{}", format_stats(&current));
    }
    debug!("Stats feed completed");
}

fn log_table(snapshot: &TableSnapshot) {
    debug!(revision = snapshot.revision, rows = snapshot.rows().len(), "Watcher table");
    let now = Utc::now();
    for row in snapshot.rows() {
        debug!("  {}", format_row(row, now));
    }
}
