//! Watcher table data model
//!
//! Types shared by the decoder, the watcher table and the command sender.
//! Wire representations live in [`crate::codec`]; these are the validated,
//! strongly typed forms that flow through the engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Namespace label used when displaying cluster-scoped watchers.
pub const ALL_NAMESPACES_LABEL: &str = "All";

/// Identifies one watcher: a resource kind within one namespace scope.
///
/// An empty namespace means the watcher is cluster scoped. Keys order by
/// namespace first, then resource, which is also the order rows are
/// returned from the table.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct WatcherKey {
    #[serde(default)]
    pub namespace: String,
    pub resource: String,
}

impl WatcherKey {
    /// Create a key for a namespaced (or cluster-scoped, if `namespace` is empty) watcher
    pub fn new(namespace: impl Into<String>, resource: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            resource: resource.into(),
        }
    }

    /// Create a key for a cluster-scoped watcher
    pub fn cluster(resource: impl Into<String>) -> Self {
        Self::new(String::new(), resource)
    }

    pub fn is_cluster_scoped(&self) -> bool {
        self.namespace.is_empty()
    }

    /// Namespace as shown to users: `"All"` for cluster-scoped watchers.
    pub fn display_namespace(&self) -> &str {
        display_namespace(&self.namespace)
    }
}

impl fmt::Display for WatcherKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.display_namespace(), self.resource)
    }
}

/// Normalize a raw namespace for display.
pub fn display_namespace(namespace: &str) -> &str {
    if namespace.is_empty() {
        ALL_NAMESPACES_LABEL
    } else {
        namespace
    }
}

/// One row of the watcher table.
///
/// The total event count is derived from the handled and unhandled
/// counters, so `total == handled + unhandled` cannot be violated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatcherState {
    pub key: WatcherKey,
    /// Whether the underlying watch loop is active
    pub running: bool,
    /// Whether unprocessed events are buffered upstream
    pub queue_non_empty: bool,
    pub handled_event_count: u64,
    /// Events received upstream but not yet applied (backlog)
    pub unhandled_event_count: u64,
    pub last_event_at: Option<DateTime<Utc>>,
}

impl WatcherState {
    /// A stopped watcher with no events.
    pub fn new(key: WatcherKey) -> Self {
        Self {
            key,
            running: false,
            queue_non_empty: false,
            handled_event_count: 0,
            unhandled_event_count: 0,
            last_event_at: None,
        }
    }

    pub fn total_event_count(&self) -> u64 {
        self.handled_event_count
            .saturating_add(self.unhandled_event_count)
    }
}

/// Field-level update for an existing watcher row.
///
/// `None` leaves the field untouched. `total_event_count` is never stored;
/// when present it must agree with the merged handled and unhandled counts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WatcherDelta {
    pub running: Option<bool>,
    pub queue_non_empty: Option<bool>,
    pub handled_event_count: Option<u64>,
    pub unhandled_event_count: Option<u64>,
    pub total_event_count: Option<u64>,
    pub last_event_at: Option<DateTime<Utc>>,
}

impl WatcherDelta {
    pub fn is_empty(&self) -> bool {
        self.running.is_none()
            && self.queue_non_empty.is_none()
            && self.handled_event_count.is_none()
            && self.unhandled_event_count.is_none()
            && self.total_event_count.is_none()
            && self.last_event_at.is_none()
    }
}

/// A decoded inbound event, consumed exactly once by the watcher table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatcherEvent {
    /// Full state for one key (initial sync or watcher restart)
    Snapshot(WatcherState),
    /// Partial update for an already known key
    Delta { key: WatcherKey, fields: WatcherDelta },
    /// The watcher no longer exists
    Removed(WatcherKey),
}

impl WatcherEvent {
    pub fn key(&self) -> &WatcherKey {
        match self {
            WatcherEvent::Snapshot(state) => &state.key,
            WatcherEvent::Delta { key, .. } | WatcherEvent::Removed(key) => key,
        }
    }

    /// Variant tag as it appears on the wire.
    pub fn kind(&self) -> &'static str {
        match self {
            WatcherEvent::Snapshot(_) => "snapshot",
            WatcherEvent::Delta { .. } => "delta",
            WatcherEvent::Removed(_) => "removed",
        }
    }
}

/// Action requested of the producer for one watcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ControlAction {
    Start,
    Stop,
}

impl ControlAction {
    /// The `running` flag a watcher should eventually report after this action.
    pub fn expected_running(self) -> bool {
        matches!(self, ControlAction::Start)
    }
}

impl fmt::Display for ControlAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControlAction::Start => write!(f, "start"),
            ControlAction::Stop => write!(f, "stop"),
        }
    }
}

/// Outbound control message: `{"action": "start"|"stop", "key": {...}}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlMessage {
    pub action: ControlAction,
    pub key: WatcherKey,
}

impl ControlMessage {
    pub fn new(action: ControlAction, key: WatcherKey) -> Self {
        Self { action, key }
    }
}
