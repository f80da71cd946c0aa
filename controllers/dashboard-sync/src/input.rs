//! Operator commands from stdin
//!
//! One command per line:
//!
//! ```text
//! start <namespace> <resource>
//! stop  <namespace> <resource>
//! ```
//!
//! `All` or `-` as namespace selects the cluster-scoped watcher. Blank lines
//! and lines starting with `#` are ignored.

use crate::error::MonitorError;
use watch_sync::{ALL_NAMESPACES_LABEL, ControlAction, WatcherKey};

/// A parsed start/stop request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Intent {
    pub action: ControlAction,
    pub key: WatcherKey,
}

/// Parse one input line. `Ok(None)` for lines that carry no command.
pub fn parse_line(line: &str) -> Result<Option<Intent>, MonitorError> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }

    let parts: Vec<&str> = line.split_whitespace().collect();
    let [action, namespace, resource] = parts.as_slice() else {
        return Err(MonitorError::InvalidCommand(format!(
            "expected \"start|stop <namespace> <resource>\", got {:?}",
            line
        )));
    };

    let action = match action.to_ascii_lowercase().as_str() {
        "start" => ControlAction::Start,
        "stop" => ControlAction::Stop,
        other => {
            return Err(MonitorError::InvalidCommand(format!(
                "unknown action {:?}, expected start or stop",
                other
            )));
        }
    };

    let namespace = if *namespace == "-" || namespace.eq_ignore_ascii_case(ALL_NAMESPACES_LABEL) {
        ""
    } else {
        *namespace
    };

    Ok(Some(Intent {
        action,
        key: WatcherKey::new(namespace, *resource),
    }))
}
