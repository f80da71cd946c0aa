//! Reconnect supervisor
//!
//! The transport never reconnects by itself. `Reconnector` is the optional
//! policy layer on top: it runs one sync session per connection, carries the
//! watcher table from one session into the next, and waits out a Fibonacci
//! backoff between attempts.

use crate::backoff::ReconnectPolicy;
use crate::error::SyncError;
use crate::session::{SessionEnd, SyncSession};
use crate::stats::Stats;
use crate::table::WatcherTable;
use crate::transport::Transport;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info, warn};

/// Runs sync sessions back to back until shutdown or a final disconnect.
#[derive(Debug)]
pub struct Reconnector {
    transport: Arc<Transport>,
    policy: ReconnectPolicy,
}

impl Reconnector {
    pub fn new(transport: Arc<Transport>, policy: ReconnectPolicy) -> Self {
        Self { transport, policy }
    }

    pub fn policy(&self) -> &ReconnectPolicy {
        &self.policy
    }

    /// Keep the table in sync until `shutdown` flips to `true` (or its sender
    /// is dropped), the transport is closed by its owner, or a connection is
    /// lost with reconnects disabled. Returns the last known table.
    ///
    /// Shutdown during a session closes the transport.
    ///
    /// Shutdown while connecting abandons the handshake.
    ///
    /// `on_session` is called for every new session as soon as it has
    /// started. Its feeds may already hold applied frames by then; a
    /// subscription taken in the callback still yields the latest snapshot.
    pub async fn run<F>(
        &self,
        mut table: WatcherTable,
        initial_stats: Option<Stats>,
        mut shutdown: watch::Receiver<bool>,
        mut on_session: F,
    ) -> WatcherTable
    where
        F: FnMut(&SyncSession),
    {
        let mut backoff = self.policy.backoff();
        let mut initial_stats = initial_stats;

        loop {
            if *shutdown.borrow() {
                return table;
            }

            let started = tokio::select! {
                started = self.start_session(&table, initial_stats) => started,
                () = shutdown_requested(&mut shutdown) => {
                    info!("Shutdown requested while connecting");
                    return table;
                }
            };
            let session = match started {
                Ok(session) => session,
                Err(e) => {
                    error!("Failed to start sync session: {}", e);
                    if !self.policy.enabled {
                        return table;
                    }
                    let delay = backoff.next_backoff();
                    info!("Retrying event channel in {:?}", delay);
                    if wait_or_shutdown(delay, &mut shutdown).await {
                        return table;
                    }
                    continue;
                }
            };
            // REST stats only seed the very first session.
            initial_stats = None;

            on_session(&session);
            let last_published = session.snapshots();

            let finished = session.finished();
            tokio::pin!(finished);
            let outcome = tokio::select! {
                outcome = &mut finished => outcome,
                () = shutdown_requested(&mut shutdown) => {
                    info!("Shutdown requested, closing event channel");
                    self.transport.close().await;
                    finished.await
                }
            };

            let report = match outcome {
                Ok(report) => report,
                Err(e) => {
                    error!("Sync session ended abnormally: {}", e);
                    table = WatcherTable::from_snapshot(&last_published.latest());
                    if !self.policy.enabled || wait_or_shutdown(backoff.next_backoff(), &mut shutdown).await {
                        return table;
                    }
                    continue;
                }
            };

            let healthy = report.frames > 0;
            table = report.table;

            match report.end {
                SessionEnd::Closed => {
                    info!("Event channel closed by owner, stopping sync");
                    return table;
                }
                SessionEnd::Lost(reason) => {
                    if !self.policy.enabled {
                        warn!("Event channel lost and reconnect is disabled: {}", reason);
                        return table;
                    }
                    if healthy {
                        backoff.reset();
                    }
                    let delay = backoff.next_backoff();
                    warn!("Event channel lost ({}), reconnecting in {:?}", reason, delay);
                    if wait_or_shutdown(delay, &mut shutdown).await {
                        return table;
                    }
                }
            }
        }
    }

    async fn start_session(
        &self,
        table: &WatcherTable,
        initial_stats: Option<Stats>,
    ) -> Result<SyncSession, SyncError> {
        let link = self.transport.connect().await?;
        let frames = link.subscribe()?;
        Ok(SyncSession::from_subscription(frames, table.clone(), initial_stats))
    }
}

/// Completes once shutdown is requested. A dropped sender counts too.
async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    // The returned guard must not outlive this call.
    let _ = shutdown.wait_for(|stop| *stop).await;
}

/// Sleep for `delay`; `true` if shutdown was requested meanwhile.
async fn wait_or_shutdown(delay: Duration, shutdown: &mut watch::Receiver<bool>) -> bool {
    let interrupted = tokio::select! {
        () = tokio::time::sleep(delay) => false,
        () = shutdown_requested(shutdown) => true,
    };
    interrupted || *shutdown.borrow()
}
