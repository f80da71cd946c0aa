//! Main monitor implementation.
//!
//! The `Monitor` bootstraps from the REST API, then keeps the watcher
//! table in sync over the event channel while forwarding operator commands
//! from stdin:
//! - a reconnector task owns the sync sessions and the table
//! - renderer tasks follow each session's snapshot and stats feeds
//! - an input task turns stdin lines into start/stop commands

use crate::config::MonitorConfig;
use crate::error::MonitorError;
use crate::input::{self, Intent};
use crate::render;
use dashboard_client::{DashboardClientTrait, ResourceCatalog, Stats};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use watch_sync::{
    CommandOutcome, CommandSender, ControlAction, FeedSubscription, Reconnector, TableSnapshot,
    Transport, WatcherTable,
};

/// What the REST API told us before the event channel opened.
#[derive(Debug, Clone, Default)]
pub struct Bootstrap {
    pub catalog: ResourceCatalog,
    pub stats: Option<Stats>,
}

/// Dashboard monitor.
pub struct Monitor {
    config: MonitorConfig,
    client: Arc<dyn DashboardClientTrait>,
    transport: Arc<Transport>,
    commands: CommandSender,
}

impl std::fmt::Debug for Monitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Monitor")
            .field("config", &self.config)
            .field("api", &self.client.base_url())
            .finish_non_exhaustive()
    }
}

impl Monitor {
    /// Creates a new monitor. Nothing is connected yet.
    pub fn new(config: MonitorConfig, client: Arc<dyn DashboardClientTrait>) -> Self {
        let transport = Arc::new(
            Transport::new(config.ws_url.clone()).with_connect_timeout(config.connect_timeout),
        );
        let commands = CommandSender::new(transport.clone());
        Self {
            config,
            client,
            transport,
            commands,
        }
    }

    /// Fetch the resource catalog and initial stats.
    ///
    /// The REST API is a convenience: failures are logged and the monitor
    /// carries on with the event channel alone.
    pub async fn bootstrap(&self) -> Bootstrap {
        info!("Fetching resource catalog from {}", self.client.base_url());

        let catalog = match self.client.get_catalog().await {
            Ok(catalog) => {
                info!(
                    "Resource catalog: {} cluster-scoped, {} namespaced kinds",
                    catalog.cluster.len(),
                    catalog.namespaced.len()
                );
                for resource in catalog.unwatchable() {
                    warn!(
                        "No list/watch access to {} ({})",
                        resource.watcher_resource(),
                        resource.api_version()
                    );
                }
                catalog
            }
            Err(e) => {
                warn!("Failed to fetch resource catalog: {}", e);
                ResourceCatalog::default()
            }
        };

        let stats = match self.client.get_stats().await {
            Ok(stats) => {
                info!("Initial {}", render::format_stats(&stats));
                Some(stats)
            }
            Err(e) => {
                warn!("Failed to fetch initial stats: {}", e);
                None
            }
        };

        Bootstrap { catalog, stats }
    }

    /// Run until Ctrl-C, or until the event channel is gone for good.
    pub async fn run(self) -> Result<(), MonitorError> {
        let Bootstrap { catalog, stats } = self.bootstrap().await;

        let (shutdown_tx, shutdown) = watch::channel(false);
        let (current_tx, current) = watch::channel::<Option<FeedSubscription<TableSnapshot>>>(None);

        let reconnector = Reconnector::new(self.transport.clone(), self.config.reconnect);
        let mut sync_task: JoinHandle<WatcherTable> = tokio::spawn(async move {
            reconnector
                .run(WatcherTable::new(), stats, shutdown, |session| {
                    info!("Following sync session on link {}", session.link_id());
                    tokio::spawn(render::render_snapshots(session.snapshots()));
                    tokio::spawn(render::render_stats(session.stats()));
                    current_tx.send_replace(Some(session.snapshots()));
                })
                .await
        });

        let input_task = tokio::spawn(read_commands(
            self.commands.clone(),
            self.config.ack,
            catalog,
            current,
        ));

        info!("Dashboard monitor running, type \"start|stop <namespace> <resource>\"");

        let table = tokio::select! {
            result = &mut sync_task => {
                result.map_err(|e| MonitorError::Task(format!("sync task panicked: {}", e)))?
            }
            signal = tokio::signal::ctrl_c() => {
                if let Err(e) = signal {
                    error!("Failed to listen for Ctrl-C: {}", e);
                }
                info!("Shutting down");
                let _ = shutdown_tx.send(true);
                sync_task
                    .await
                    .map_err(|e| MonitorError::Task(format!("sync task panicked: {}", e)))?
            }
        };

        input_task.abort();
        self.transport.close().await;

        info!(
            "Stopped with {} watchers known, {}",
            table.len(),
            render::format_stats(&table.snapshot().stats())
        );
        Ok(())
    }
}

async fn read_commands(
    commands: CommandSender,
    ack: watch_sync::AckPolicy,
    catalog: ResourceCatalog,
    current: watch::Receiver<Option<FeedSubscription<TableSnapshot>>>,
) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => {
                info!("stdin closed, no more commands will be read");
                return;
            }
            Err(e) => {
                error!("Failed to read stdin: {}", MonitorError::from(e));
                return;
            }
        };

        match input::parse_line(&line) {
            Ok(Some(intent)) => {
                if !catalog.is_empty() && !catalog.contains(&intent.key.resource) {
                    warn!(
                        "{} is not in the resource catalog, sending anyway",
                        intent.key.resource
                    );
                }
                let snapshots = current.borrow().clone();
                if let Err(e) = execute(&commands, &intent, ack, snapshots).await {
                    error!("Command {} {} failed: {}", intent.action, intent.key, e);
                }
            }
            Ok(None) => {}
            Err(e) => warn!("{}", e),
        }
    }
}

/// Send one operator command, waiting for its effect when configured to.
pub async fn execute(
    commands: &CommandSender,
    intent: &Intent,
    ack: watch_sync::AckPolicy,
    snapshots: Option<FeedSubscription<TableSnapshot>>,
) -> Result<CommandOutcome, MonitorError> {
    let outcome = match snapshots {
        Some(mut snapshots) => match intent.action {
            ControlAction::Start => {
                commands
                    .start_acknowledged(&intent.key, &mut snapshots, ack)
                    .await?
            }
            ControlAction::Stop => {
                commands
                    .stop_acknowledged(&intent.key, &mut snapshots, ack)
                    .await?
            }
        },
        // No session yet: nothing to watch, just send
        None => {
            match intent.action {
                ControlAction::Start => commands.start(&intent.key).await?,
                ControlAction::Stop => commands.stop(&intent.key).await?,
            }
            CommandOutcome::Sent
        }
    };

    info!("{} {}: {:?}", intent.action, intent.key, outcome);
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use dashboard_client::{MockDashboardClient, Resource, ResourceScope};
    use std::time::Duration;
    use watch_sync::{AckPolicy, ReconnectPolicy, SyncError, WatcherKey};

    fn config() -> MonitorConfig {
        MonitorConfig {
            ws_url: "ws://127.0.0.1:9/ws".to_string(),
            api_url: "http://mock".to_string(),
            reconnect: ReconnectPolicy::disabled(),
            ack: AckPolicy::FireAndForget,
            http_timeout: Duration::from_secs(1),
            connect_timeout: Duration::from_secs(1),
        }
    }

    #[tokio::test]
    async fn test_bootstrap_collects_catalog_and_stats() {
        let mock = MockDashboardClient::new("http://mock");
        mock.add_resource(
            ResourceScope::Namespaced,
            Resource {
                group: String::new(),
                kind: "Pod".to_string(),
                version: "v1".to_string(),
                namespaced: true,
                list: true,
                watch: true,
            },
        );
        let stats = Stats {
            total: 1,
            running: 1,
            stopped: 0,
        };
        mock.set_stats(stats);

        let monitor = Monitor::new(config(), Arc::new(mock));
        let bootstrap = monitor.bootstrap().await;
        assert_eq!(bootstrap.catalog.namespaced.len(), 1);
        assert_eq!(bootstrap.stats, Some(stats));
    }

    #[tokio::test]
    async fn test_bootstrap_tolerates_api_failures() {
        let mock = MockDashboardClient::new("http://mock");
        mock.fail_with("connection refused");

        let monitor = Monitor::new(config(), Arc::new(mock));
        let bootstrap = monitor.bootstrap().await;
        assert!(bootstrap.catalog.is_empty());
        assert_eq!(bootstrap.stats, None);
    }

    #[tokio::test]
    async fn test_execute_without_connection_reports_not_connected() {
        let monitor = Monitor::new(config(), Arc::new(MockDashboardClient::new("http://mock")));
        let intent = Intent {
            action: ControlAction::Start,
            key: WatcherKey::new("default", "v1.Pod"),
        };

        let result = execute(&monitor.commands, &intent, AckPolicy::FireAndForget, None).await;
        assert!(matches!(
            result,
            Err(MonitorError::Sync(SyncError::NotConnected))
        ));
    }
}
