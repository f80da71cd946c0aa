//! Engine error types
//!
//! `SyncError` covers connection-level failures that reach callers.
//! `DecodeError` and `TableWarning` describe a single dropped frame or
//! event; the sync session logs them and keeps the stream alive.

use crate::model::WatcherKey;
use std::time::Duration;
use thiserror::Error;
use tokio_tungstenite::tungstenite;

/// Errors surfaced by the transport, the command sender and sync sessions.
#[derive(Debug, Error)]
pub enum SyncError {
    /// No live channel to the event source; call `connect()` first
    #[error("not connected to the event channel")]
    NotConnected,

    /// Websocket handshake failed
    #[error("failed to connect to {url}: {source}")]
    Connect {
        url: String,
        #[source]
        source: Box<tungstenite::Error>,
    },

    /// Websocket handshake did not complete in time
    #[error("timed out after {timeout:?} connecting to {url}")]
    ConnectTimeout { url: String, timeout: Duration },

    /// The channel dropped without the owner closing it
    #[error("connection lost: {0}")]
    ConnectionLost(String),

    /// Writing an outbound frame failed
    #[error("failed to send control message: {0}")]
    Send(String),

    /// Serialization error for an outbound message
    #[error("failed to encode control message: {0}")]
    Encode(#[from] serde_json::Error),

    /// The sync session task panicked or was aborted
    #[error("sync session failed: {0}")]
    Session(String),
}

/// A raw inbound frame that could not be turned into a `WatcherEvent`.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("frame is not valid UTF-8: {0}")]
    InvalidUtf8(#[from] std::str::Utf8Error),

    #[error("frame is not valid JSON: {0}")]
    InvalidJson(#[source] serde_json::Error),

    #[error("frame is not a JSON object")]
    NotAnObject,

    #[error("frame has no \"type\" tag")]
    MissingTag,

    #[error("unknown event type: {0}")]
    UnknownVariant(String),

    #[error("invalid {variant} payload: {source}")]
    InvalidPayload {
        variant: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid watcher key: {0}")]
    InvalidKey(String),

    #[error("delta for {0} carries no fields")]
    EmptyDelta(WatcherKey),

    #[error(
        "inconsistent counts for {key}: handled {handled} + unhandled {unhandled} != events {events}"
    )]
    InconsistentCounts {
        key: WatcherKey,
        handled: u64,
        unhandled: u64,
        events: u64,
    },

    #[error("event counts for {0} overflow")]
    CountOverflow(WatcherKey),
}

/// An event the watcher table refused to apply. The table is left unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TableWarning {
    /// Delta or removal for a key with no prior snapshot
    #[error("unknown watcher {0}: no snapshot received yet")]
    UnknownKey(WatcherKey),

    /// A delta tried to move a monotonic counter backwards
    #[error("{field} for {key} would decrease from {current} to {proposed}")]
    CounterRegression {
        key: WatcherKey,
        field: &'static str,
        current: u64,
        proposed: u64,
    },

    #[error(
        "inconsistent counts for {key}: handled {handled} + unhandled {unhandled} != events {events}"
    )]
    InconsistentCounts {
        key: WatcherKey,
        handled: u64,
        unhandled: u64,
        events: u64,
    },

    #[error("event counts for {0} overflow")]
    CountOverflow(WatcherKey),
}

impl TableWarning {
    pub fn key(&self) -> &WatcherKey {
        match self {
            TableWarning::UnknownKey(key) | TableWarning::CountOverflow(key) => key,
            TableWarning::CounterRegression { key, .. }
            | TableWarning::InconsistentCounts { key, .. } => key,
        }
    }
}
