//! Watcher table
//!
//! The single source of truth for watcher rows. Events are applied one at a
//! time by the owning sync session; each successful apply produces a new
//! consistent table that is republished as an immutable [`TableSnapshot`].
//!
//! Per key the table moves `Absent -> Active` on a snapshot, stays `Active`
//! across deltas, and returns to `Absent` on removal. A snapshot for an
//! active key is an explicit reset: counters take the snapshot's values even
//! when lower. Between resets, deltas may not move the handled or total
//! counters backwards.

use crate::error::TableWarning;
use crate::model::{WatcherDelta, WatcherEvent, WatcherKey, WatcherState};
use crate::stats::{self, Stats};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// What a successful `apply` did to the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    /// Snapshot for a key that had no row
    Inserted,
    /// Snapshot replaced an existing row (counters reset)
    Replaced,
    /// Delta merged into an existing row
    Updated,
    /// Row deleted
    Removed,
}

/// In-memory keyed store of watcher rows, ordered by key.
#[derive(Debug, Clone, Default)]
pub struct WatcherTable {
    rows: BTreeMap<WatcherKey, WatcherState>,
    revision: u64,
}

impl WatcherTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a table from a published snapshot, keeping its revision.
    pub fn from_snapshot(snapshot: &TableSnapshot) -> Self {
        Self {
            rows: snapshot
                .rows()
                .iter()
                .map(|row| (row.key.clone(), row.clone()))
                .collect(),
            revision: snapshot.revision,
        }
    }

    /// Apply one event.
    ///
    /// On `Err` the table is untouched and the revision does not advance.
    pub fn apply(&mut self, event: WatcherEvent) -> Result<Applied, TableWarning> {
        let applied = match event {
            WatcherEvent::Snapshot(state) => {
                match self.rows.insert(state.key.clone(), state) {
                    Some(_) => Applied::Replaced,
                    None => Applied::Inserted,
                }
            }
            WatcherEvent::Delta { key, fields } => {
                let Some(current) = self.rows.get(&key) else {
                    return Err(TableWarning::UnknownKey(key));
                };
                // Build the whole row before touching the map so readers never
                // see a half-applied delta.
                let next = merge(current, &fields)?;
                self.rows.insert(key, next);
                Applied::Updated
            }
            WatcherEvent::Removed(key) => {
                if self.rows.remove(&key).is_none() {
                    return Err(TableWarning::UnknownKey(key));
                }
                Applied::Removed
            }
        };

        self.revision += 1;
        debug!(revision = self.revision, ?applied, rows = self.rows.len(), "Applied watcher event");
        Ok(applied)
    }

    pub fn get(&self, key: &WatcherKey) -> Option<&WatcherState> {
        self.rows.get(key)
    }

    pub fn contains(&self, key: &WatcherKey) -> bool {
        self.rows.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Number of successful applies so far.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Current rows in key order (namespace, then resource).
    pub fn snapshot_all(&self) -> Vec<WatcherState> {
        self.rows.values().cloned().collect()
    }

    /// Immutable view of the current rows, safe to hand to other tasks.
    pub fn snapshot(&self) -> TableSnapshot {
        TableSnapshot {
            revision: self.revision,
            rows: Arc::from(self.snapshot_all()),
        }
    }
}

fn merge(current: &WatcherState, fields: &WatcherDelta) -> Result<WatcherState, TableWarning> {
    let key = &current.key;
    let handled = fields
        .handled_event_count
        .unwrap_or(current.handled_event_count);
    let unhandled = fields
        .unhandled_event_count
        .unwrap_or(current.unhandled_event_count);

    if handled < current.handled_event_count {
        return Err(TableWarning::CounterRegression {
            key: key.clone(),
            field: "handledEventCount",
            current: current.handled_event_count,
            proposed: handled,
        });
    }

    let total = handled
        .checked_add(unhandled)
        .ok_or_else(|| TableWarning::CountOverflow(key.clone()))?;

    // Backlog may drain, but only into the handled counter.
    if total < current.total_event_count() {
        return Err(TableWarning::CounterRegression {
            key: key.clone(),
            field: "events",
            current: current.total_event_count(),
            proposed: total,
        });
    }

    if let Some(events) = fields.total_event_count {
        if events != total {
            return Err(TableWarning::InconsistentCounts {
                key: key.clone(),
                handled,
                unhandled,
                events,
            });
        }
    }

    Ok(WatcherState {
        key: key.clone(),
        running: fields.running.unwrap_or(current.running),
        queue_non_empty: fields.queue_non_empty.unwrap_or(current.queue_non_empty),
        handled_event_count: handled,
        unhandled_event_count: unhandled,
        last_event_at: fields.last_event_at.or(current.last_event_at),
    })
}

/// Published view of the table at one revision.
///
/// Cloning is cheap; the rows are shared and cannot be mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSnapshot {
    pub revision: u64,
    pub rows: Arc<[WatcherState]>,
}

impl TableSnapshot {
    pub fn empty() -> Self {
        Self {
            revision: 0,
            rows: Arc::from(Vec::new()),
        }
    }

    pub fn rows(&self) -> &[WatcherState] {
        &self.rows
    }

    /// Look up a row; rows are key-sorted so this is a binary search.
    pub fn get(&self, key: &WatcherKey) -> Option<&WatcherState> {
        self.rows
            .binary_search_by(|row| row.key.cmp(key))
            .ok()
            .map(|index| &self.rows[index])
    }

    pub fn stats(&self) -> Stats {
        stats::compute(&self.rows)
    }
}

impl Default for TableSnapshot {
    fn default() -> Self {
        Self::empty()
    }
}

#[cfg(test)]
#[path = "table_test.rs"]
mod table_test;
