//! Event channel transport
//!
//! Owns the single websocket connection to the event source. The socket
//! itself lives inside one link task; everything else talks to that task
//! through a command channel, so the physical connection is never shared
//! mutably.
//!
//! Lifecycle:
//! - `connect()` is idempotent and returns the live [`Link`] if there is one.
//!   The handshake is bounded by a connect timeout and never blocks the
//!   other operations: while it runs they behave as if disconnected.
//! - `send()` and `subscribe()` fail with [`SyncError::NotConnected`]
//!   without a live link.
//! - `close()` completes every inbound subscription (they yield `None`).
//! - An unexpected disconnect delivers one `Err(ConnectionLost)` to every
//!   subscription before it completes. The transport does not reconnect on
//!   its own; see [`crate::reconnect`] for a policy layered on top.

use crate::codec::{self, RawFrame};
use crate::error::SyncError;
use crate::model::ControlMessage;
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{Mutex, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, error, info, warn};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Item delivered to inbound subscribers. The only error is `ConnectionLost`.
pub type Inbound = Result<RawFrame, SyncError>;

enum LinkCommand {
    Subscribe(mpsc::UnboundedSender<Inbound>),
    Send {
        text: String,
        ack: oneshot::Sender<Result<(), SyncError>>,
    },
    Close,
}

enum LinkEnd {
    Closed,
    Lost(String),
}

/// Handle to one established connection.
#[derive(Debug, Clone)]
pub struct Link {
    id: u64,
    commands: mpsc::UnboundedSender<LinkCommand>,
}

impl Link {
    /// Connection generation, increasing with every successful `connect()`.
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn is_live(&self) -> bool {
        !self.commands.is_closed()
    }

    /// Register a new inbound subscriber on this connection.
    pub fn subscribe(&self) -> Result<FrameSubscription, SyncError> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.commands
            .send(LinkCommand::Subscribe(tx))
            .map_err(|_| SyncError::NotConnected)?;
        Ok(FrameSubscription { link_id: self.id, rx })
    }

    /// Write one text frame and wait for the write to complete.
    pub async fn send_text(&self, text: String) -> Result<(), SyncError> {
        let (ack, written) = oneshot::channel();
        self.commands
            .send(LinkCommand::Send { text, ack })
            .map_err(|_| SyncError::NotConnected)?;
        written.await.map_err(|_| SyncError::NotConnected)?
    }
}

/// Inbound frames for one subscriber, in the order the link received them.
#[derive(Debug)]
pub struct FrameSubscription {
    link_id: u64,
    rx: mpsc::UnboundedReceiver<Inbound>,
}

impl FrameSubscription {
    pub fn link_id(&self) -> u64 {
        self.link_id
    }

    /// Next inbound item; `None` once the link is gone.
    pub async fn next(&mut self) -> Option<Inbound> {
        self.rx.recv().await
    }
}

struct LinkSlot {
    link: Link,
    task: JoinHandle<()>,
}

/// Default bound on the websocket handshake.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Websocket transport to the watcher event source.
pub struct Transport {
    url: String,
    connect_timeout: Duration,
    /// Serializes handshakes; never taken by the other operations.
    connecting: Mutex<()>,
    slot: Mutex<Option<LinkSlot>>,
    next_link_id: AtomicU64,
    /// Bumped by every `close()`, so a handshake that straddles one is discarded.
    close_generation: AtomicU64,
}

impl std::fmt::Debug for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transport")
            .field("url", &self.url)
            .field("connect_timeout", &self.connect_timeout)
            .finish_non_exhaustive()
    }
}

impl Transport {
    /// Create a transport for the given `ws://` or `wss://` URL. Nothing is
    /// connected until `connect()` is called.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            connecting: Mutex::new(()),
            slot: Mutex::new(None),
            next_link_id: AtomicU64::new(0),
            close_generation: AtomicU64::new(0),
        }
    }

    /// Bound the websocket handshake to `timeout`.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Return the live link, establishing a new connection if needed.
    pub async fn connect(&self) -> Result<Link, SyncError> {
        let _connecting = self.connecting.lock().await;

        let stale = {
            let mut slot = self.slot.lock().await;
            match slot.as_ref() {
                Some(current) if current.link.is_live() => {
                    debug!(link = current.link.id, "Reusing live event channel");
                    return Ok(current.link.clone());
                }
                _ => slot.take(),
            }
        };
        if let Some(stale) = stale {
            debug!(link = stale.link.id, "Reaping dead event channel");
            if let Err(e) = stale.task.await {
                warn!("Event channel task {} ended abnormally: {}", stale.link.id, e);
            }
        }

        let generation = self.close_generation.load(Ordering::Acquire);
        info!("Connecting to event channel {}", self.url);
        let handshake = tokio::time::timeout(self.connect_timeout, connect_async(self.url.as_str()));
        let (socket, response) = match handshake.await {
            Ok(Ok(connected)) => connected,
            Ok(Err(e)) => {
                return Err(SyncError::Connect {
                    url: self.url.clone(),
                    source: Box::new(e),
                });
            }
            Err(_) => {
                return Err(SyncError::ConnectTimeout {
                    url: self.url.clone(),
                    timeout: self.connect_timeout,
                });
            }
        };
        debug!("Handshake completed with status {}", response.status());

        let mut slot = self.slot.lock().await;
        if self.close_generation.load(Ordering::Acquire) != generation {
            info!("Transport closed during handshake, dropping new connection");
            return Err(SyncError::NotConnected);
        }

        let id = self.next_link_id.fetch_add(1, Ordering::Relaxed) + 1;
        let (commands, command_rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run_link(id, socket, command_rx));
        let link = Link { id, commands };
        *slot = Some(LinkSlot {
            link: link.clone(),
            task,
        });

        info!(link = id, "Connected to event channel");
        Ok(link)
    }

    /// The live link, or `NotConnected`.
    pub async fn link(&self) -> Result<Link, SyncError> {
        let slot = self.slot.lock().await;
        match slot.as_ref() {
            Some(current) if current.link.is_live() => Ok(current.link.clone()),
            _ => Err(SyncError::NotConnected),
        }
    }

    pub async fn is_connected(&self) -> bool {
        self.link().await.is_ok()
    }

    /// Subscribe to inbound frames on the live link.
    pub async fn subscribe(&self) -> Result<FrameSubscription, SyncError> {
        self.link().await?.subscribe()
    }

    /// Encode and send one control message.
    pub async fn send(&self, message: &ControlMessage) -> Result<(), SyncError> {
        let text = codec::encode(message)?;
        let link = self.link().await?;
        debug!(link = link.id, action = %message.action, key = %message.key, "Sending control message");
        link.send_text(text).await
    }

    /// Gracefully close the connection and wait for the link task to finish.
    ///
    /// Closing an unconnected transport is a no-op.
    pub async fn close(&self) {
        let current = {
            let mut slot = self.slot.lock().await;
            self.close_generation.fetch_add(1, Ordering::AcqRel);
            slot.take()
        };
        let Some(current) = current else {
            return;
        };
        // The task may already be gone after a lost connection.
        let _ = current.link.commands.send(LinkCommand::Close);
        if let Err(e) = current.task.await {
            warn!("Event channel task {} ended abnormally: {}", current.link.id, e);
        }
        info!(link = current.link.id, "Event channel closed");
    }
}

async fn run_link(id: u64, socket: Socket, mut commands: mpsc::UnboundedReceiver<LinkCommand>) {
    let (mut sink, mut stream) = socket.split();
    let mut subscribers: Vec<mpsc::UnboundedSender<Inbound>> = Vec::new();

    let end = loop {
        tokio::select! {
            // Commands first, so a subscriber registered before a frame
            // arrives is guaranteed to see it.
            biased;

            command = commands.recv() => match command {
                Some(LinkCommand::Subscribe(tx)) => {
                    subscribers.push(tx);
                    debug!(link = id, subscribers = subscribers.len(), "Inbound subscriber added");
                }
                Some(LinkCommand::Send { text, ack }) => {
                    let result = sink
                        .send(Message::Text(text.into()))
                        .await
                        .map_err(|e| SyncError::Send(e.to_string()));
                    let failure = result.as_ref().err().map(ToString::to_string);
                    let _ = ack.send(result);
                    if let Some(reason) = failure {
                        break LinkEnd::Lost(reason);
                    }
                }
                Some(LinkCommand::Close) | None => {
                    if let Err(e) = sink.close().await {
                        debug!(link = id, "Close handshake failed: {}", e);
                    }
                    break LinkEnd::Closed;
                }
            },

            message = stream.next() => match message {
                Some(Ok(Message::Text(text))) => {
                    fan_out(&mut subscribers, RawFrame::text(text.as_str()));
                }
                Some(Ok(Message::Binary(bytes))) => {
                    fan_out(&mut subscribers, RawFrame::Binary(Arc::from(&bytes[..])));
                }
                Some(Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_))) => {}
                Some(Ok(Message::Close(frame))) => {
                    let reason = match frame {
                        Some(frame) => format!(
                            "closed by peer: {} {}",
                            u16::from(frame.code),
                            frame.reason.as_str()
                        ),
                        None => "closed by peer".to_string(),
                    };
                    break LinkEnd::Lost(reason);
                }
                Some(Err(e)) => break LinkEnd::Lost(e.to_string()),
                None => break LinkEnd::Lost("stream ended".to_string()),
            },
        }
    };

    // Refuse new commands, then settle whatever was queued behind the end.
    commands.close();
    while let Ok(command) = commands.try_recv() {
        match command {
            LinkCommand::Subscribe(tx) => subscribers.push(tx),
            LinkCommand::Send { ack, .. } => {
                let _ = ack.send(Err(SyncError::NotConnected));
            }
            LinkCommand::Close => {}
        }
    }

    match end {
        LinkEnd::Closed => {
            debug!(link = id, subscribers = subscribers.len(), "Completing inbound subscribers");
        }
        LinkEnd::Lost(reason) => {
            error!(link = id, "Event channel lost: {}", reason);
            for tx in &subscribers {
                let _ = tx.send(Err(SyncError::ConnectionLost(reason.clone())));
            }
        }
    }
}

fn fan_out(subscribers: &mut Vec<mpsc::UnboundedSender<Inbound>>, frame: RawFrame) {
    subscribers.retain(|tx| tx.send(Ok(frame.clone())).is_ok());
}
