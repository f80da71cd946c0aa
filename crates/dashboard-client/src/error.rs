//! Dashboard client errors

use thiserror::Error;

/// Errors that can occur when querying the dashboard REST API
#[derive(Debug, Error)]
pub enum ApiError {
    /// HTTP request/response error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The API answered with a non-success status, or a body we could not decode
    #[error("Dashboard API error: {0}")]
    Api(String),

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Endpoint not found (producer too old, wrong base URL)
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid request (e.g., malformed base URL)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}
