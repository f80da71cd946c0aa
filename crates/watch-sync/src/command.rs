//! Command sender
//!
//! Turns start/stop intents into control messages on the transport. A
//! command has no direct effect on the watcher table; its result, if any,
//! arrives later as an ordinary event for the same key.

use crate::error::SyncError;
use crate::feed::FeedSubscription;
use crate::model::{ControlAction, ControlMessage, WatcherKey};
use crate::table::TableSnapshot;
use crate::transport::Transport;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// How long to follow up on a sent command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AckPolicy {
    /// Return as soon as the message is written
    #[default]
    FireAndForget,
    /// Watch the snapshot feed for the expected `running` flag, up to the timeout
    AwaitEffect(Duration),
}

/// Result of a command that was sent successfully.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOutcome {
    /// Written to the transport, effect not observed
    Sent,
    /// The key's row reports the expected `running` flag
    Acknowledged,
    /// No matching row within the timeout. Not an error: the producer may
    /// still apply the command later, or never report it.
    NoVisibleEffect,
}

/// Sends start/stop control messages for watchers.
#[derive(Debug, Clone)]
pub struct CommandSender {
    transport: Arc<Transport>,
}

impl CommandSender {
    pub fn new(transport: Arc<Transport>) -> Self {
        Self { transport }
    }

    /// Ask the producer to start the watcher for `key`.
    pub async fn start(&self, key: &WatcherKey) -> Result<(), SyncError> {
        self.send(ControlAction::Start, key).await
    }

    /// Ask the producer to stop the watcher for `key`.
    pub async fn stop(&self, key: &WatcherKey) -> Result<(), SyncError> {
        self.send(ControlAction::Stop, key).await
    }

    pub async fn start_acknowledged(
        &self,
        key: &WatcherKey,
        snapshots: &mut FeedSubscription<TableSnapshot>,
        policy: AckPolicy,
    ) -> Result<CommandOutcome, SyncError> {
        self.send_acknowledged(ControlAction::Start, key, snapshots, policy)
            .await
    }

    pub async fn stop_acknowledged(
        &self,
        key: &WatcherKey,
        snapshots: &mut FeedSubscription<TableSnapshot>,
        policy: AckPolicy,
    ) -> Result<CommandOutcome, SyncError> {
        self.send_acknowledged(ControlAction::Stop, key, snapshots, policy)
            .await
    }

    async fn send(&self, action: ControlAction, key: &WatcherKey) -> Result<(), SyncError> {
        let message = ControlMessage::new(action, key.clone());
        match self.transport.send(&message).await {
            Ok(()) => {
                info!("Sent {} for watcher {}", action, key);
                Ok(())
            }
            Err(e) => {
                warn!("Failed to send {} for watcher {}: {}", action, key, e);
                Err(e)
            }
        }
    }

    async fn send_acknowledged(
        &self,
        action: ControlAction,
        key: &WatcherKey,
        snapshots: &mut FeedSubscription<TableSnapshot>,
        policy: AckPolicy,
    ) -> Result<CommandOutcome, SyncError> {
        let AckPolicy::AwaitEffect(timeout) = policy else {
            self.send(action, key).await?;
            return Ok(CommandOutcome::Sent);
        };

        snapshots.mark_seen();
        self.send(action, key).await?;
        let outcome = await_effect(snapshots, key, action.expected_running(), timeout).await;
        match outcome {
            CommandOutcome::Acknowledged => debug!("Watcher {} acknowledged {}", key, action),
            _ => warn!("No visible effect of {} for watcher {} after {:?}", action, key, timeout),
        }
        Ok(outcome)
    }
}

/// Wait until the row for `key` reports `running == expected`.
async fn await_effect(
    snapshots: &mut FeedSubscription<TableSnapshot>,
    key: &WatcherKey,
    expected: bool,
    timeout: Duration,
) -> CommandOutcome {
    let matches = |snapshot: &TableSnapshot| {
        snapshot
            .get(key)
            .is_some_and(|row| row.running == expected)
    };

    if matches(&snapshots.latest()) {
        return CommandOutcome::Acknowledged;
    }

    let deadline = Instant::now() + timeout;
    loop {
        match tokio::time::timeout_at(deadline, snapshots.next()).await {
            Ok(Some(snapshot)) if matches(&snapshot) => return CommandOutcome::Acknowledged,
            Ok(Some(_)) => {}
            // Feed completed (session ended) or deadline passed
            Ok(None) | Err(_) => return CommandOutcome::NoVisibleEffect,
        }
    }
}
