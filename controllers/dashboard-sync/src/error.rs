//! Monitor error types.
//!
//! Errors of the `dashboard-sync` binary that are not covered by the
//! engine or REST client errors.

use dashboard_client::ApiError;
use thiserror::Error;
use watch_sync::SyncError;

/// Errors that can occur in the dashboard monitor.
#[derive(Debug, Error)]
pub enum MonitorError {
    /// Event channel error
    #[error("Event channel error: {0}")]
    Sync(#[from] SyncError),

    /// Dashboard REST API error
    #[error("Dashboard API error: {0}")]
    Api(#[from] ApiError),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A stdin line that is not a valid command
    #[error("Invalid command: {0}")]
    InvalidCommand(String),

    /// Reading stdin failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A background task panicked
    #[error("Task failed: {0}")]
    Task(String),
}
