//! Monitor configuration
//!
//! All settings come from environment variables, read once at start-up.

use crate::error::MonitorError;
use std::env;
use std::time::Duration;
use watch_sync::{AckPolicy, DEFAULT_CONNECT_TIMEOUT, ReconnectPolicy};

/// Runtime configuration of the monitor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorConfig {
    /// Event channel URL (`ws://` or `wss://`)
    pub ws_url: String,
    /// REST base URL for `/resources` and `/stats`
    pub api_url: String,
    pub reconnect: ReconnectPolicy,
    pub ack: AckPolicy,
    pub http_timeout: Duration,
    /// Bound on the websocket handshake
    pub connect_timeout: Duration,
}

impl MonitorConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, MonitorError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration through `lookup`, which returns a variable's value if set.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, MonitorError> {
        let ws_url = required(&lookup, "DASHBOARD_WS_URL")?;
        if !(ws_url.starts_with("ws://") || ws_url.starts_with("wss://")) {
            return Err(MonitorError::InvalidConfig(format!(
                "DASHBOARD_WS_URL must start with ws:// or wss://, got {}",
                ws_url
            )));
        }
        let api_url = required(&lookup, "DASHBOARD_API_URL")?;

        let defaults = ReconnectPolicy::default();
        let reconnect = ReconnectPolicy {
            enabled: flag(&lookup, "RECONNECT_ENABLED", defaults.enabled)?,
            min_delay: seconds(&lookup, "RECONNECT_MIN_SECONDS")?.unwrap_or(defaults.min_delay),
            max_delay: seconds(&lookup, "RECONNECT_MAX_SECONDS")?.unwrap_or(defaults.max_delay),
        };
        if reconnect.min_delay.is_zero() {
            return Err(MonitorError::InvalidConfig(
                "RECONNECT_MIN_SECONDS must be greater than 0".to_string(),
            ));
        }
        if reconnect.max_delay < reconnect.min_delay {
            return Err(MonitorError::InvalidConfig(format!(
                "RECONNECT_MAX_SECONDS ({:?}) is below RECONNECT_MIN_SECONDS ({:?})",
                reconnect.max_delay, reconnect.min_delay
            )));
        }

        let ack = match seconds(&lookup, "COMMAND_ACK_TIMEOUT_SECONDS")? {
            Some(timeout) if !timeout.is_zero() => AckPolicy::AwaitEffect(timeout),
            _ => AckPolicy::FireAndForget,
        };

        let http_timeout =
            seconds(&lookup, "HTTP_TIMEOUT_SECONDS")?.unwrap_or(dashboard_client::DEFAULT_TIMEOUT);

        let connect_timeout =
            seconds(&lookup, "CONNECT_TIMEOUT_SECONDS")?.unwrap_or(DEFAULT_CONNECT_TIMEOUT);
        if connect_timeout.is_zero() {
            return Err(MonitorError::InvalidConfig(
                "CONNECT_TIMEOUT_SECONDS must be greater than 0".to_string(),
            ));
        }

        Ok(Self {
            ws_url,
            api_url,
            reconnect,
            ack,
            http_timeout,
            connect_timeout,
        })
    }
}

fn required(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Result<String, MonitorError> {
    match lookup(name) {
        Some(value) if !value.trim().is_empty() => Ok(value.trim().to_string()),
        _ => Err(MonitorError::InvalidConfig(format!(
            "{} environment variable is required",
            name
        ))),
    }
}

fn flag(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
    default: bool,
) -> Result<bool, MonitorError> {
    let Some(value) = lookup(name) else {
        return Ok(default);
    };
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(MonitorError::InvalidConfig(format!(
            "{} must be a boolean, got {:?}",
            name, other
        ))),
    }
}

fn seconds(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
) -> Result<Option<Duration>, MonitorError> {
    let Some(value) = lookup(name) else {
        return Ok(None);
    };
    value
        .trim()
        .parse::<u64>()
        .map(|secs| Some(Duration::from_secs(secs)))
        .map_err(|e| {
            MonitorError::InvalidConfig(format!(
                "{} must be a whole number of seconds, got {:?}: {}",
                name, value, e
            ))
        })
}
