//! Stats aggregator
//!
//! Summary counters derived from the watcher table. Stats carry no identity
//! and are never mutated on their own: they are recomputed from the rows on
//! every table publish.

use crate::model::WatcherState;
use serde::{Deserialize, Serialize};

/// Rolled-up watcher health, as served by `GET /stats`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
    pub total: u64,
    pub running: u64,
    pub stopped: u64,
}

/// Fold a table snapshot into stats. Pure and O(n).
pub fn compute(rows: &[WatcherState]) -> Stats {
    let total = rows.len() as u64;
    let running = rows.iter().filter(|row| row.running).count() as u64;
    Stats {
        total,
        running,
        stopped: total - running,
    }
}
