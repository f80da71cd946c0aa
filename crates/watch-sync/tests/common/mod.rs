//! Local websocket producer used by the integration tests
//!
//! Accepts any number of connections on 127.0.0.1. Frames queued through the
//! handle go to the most recently accepted connection; text frames sent by
//! the client are collected for inspection.

#![allow(dead_code)]

use futures::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;

const WAIT: Duration = Duration::from_secs(5);

enum Action {
    Text(String),
    Binary(Vec<u8>),
    /// Drop the TCP connection without a close handshake
    Drop,
}

type CurrentConnection = Arc<Mutex<Option<mpsc::UnboundedSender<Action>>>>;

pub struct FakeProducer {
    addr: SocketAddr,
    current: CurrentConnection,
    accepted: mpsc::UnboundedReceiver<usize>,
    received: mpsc::UnboundedReceiver<String>,
}

impl FakeProducer {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let current: CurrentConnection = Arc::new(Mutex::new(None));
        let (accepted_tx, accepted) = mpsc::unbounded_channel();
        let (received_tx, received) = mpsc::unbounded_channel();

        let slot = current.clone();
        tokio::spawn(async move {
            let mut count = 0;
            while let Ok((stream, _)) = listener.accept().await {
                count += 1;
                let (actions_tx, actions) = mpsc::unbounded_channel();
                *slot.lock().unwrap() = Some(actions_tx);
                let _ = accepted_tx.send(count);
                tokio::spawn(serve(stream, actions, received_tx.clone()));
            }
        });

        Self {
            addr,
            current,
            accepted,
            received,
        }
    }

    pub fn url(&self) -> String {
        format!("ws://{}/ws", self.addr)
    }

    /// Wait for the next accepted connection and return how many there were so far.
    pub async fn wait_for_connection(&mut self) -> usize {
        tokio::time::timeout(WAIT, self.accepted.recv())
            .await
            .expect("no connection accepted in time")
            .expect("accept loop stopped")
    }

    pub fn send_text(&self, text: impl Into<String>) {
        self.act(Action::Text(text.into()));
    }

    pub fn send_binary(&self, bytes: impl Into<Vec<u8>>) {
        self.act(Action::Binary(bytes.into()));
    }

    pub fn drop_connection(&self) {
        self.act(Action::Drop);
    }

    /// Next text frame the client sent, parsed as JSON.
    pub async fn next_message(&mut self) -> serde_json::Value {
        let text = tokio::time::timeout(WAIT, self.received.recv())
            .await
            .expect("no client message in time")
            .expect("producer stopped");
        serde_json::from_str(&text).unwrap()
    }

    fn act(&self, action: Action) {
        let current = self.current.lock().unwrap();
        let connection = current.as_ref().expect("no client connected");
        if connection.send(action).is_err() {
            panic!("connection already gone");
        }
    }
}

async fn serve(
    stream: TcpStream,
    mut actions: mpsc::UnboundedReceiver<Action>,
    received: mpsc::UnboundedSender<String>,
) {
    let Ok(socket) = accept_async(stream).await else {
        return;
    };
    let (mut sink, mut source) = socket.split();

    loop {
        tokio::select! {
            action = actions.recv() => match action {
                Some(Action::Text(text)) => {
                    if sink.send(Message::Text(text.into())).await.is_err() {
                        return;
                    }
                }
                Some(Action::Binary(bytes)) => {
                    if sink.send(Message::Binary(bytes.into())).await.is_err() {
                        return;
                    }
                }
                Some(Action::Drop) | None => return,
            },
            message = source.next() => match message {
                Some(Ok(Message::Text(text))) => {
                    let _ = received.send(text.to_string());
                }
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => return,
                Some(Ok(_)) => {}
            },
        }
    }
}

pub fn snapshot_frame(namespace: &str, resource: &str, running: bool, handled: u64, unhandled: u64) -> String {
    serde_json::json!({
        "type": "snapshot",
        "key": { "namespace": namespace, "resource": resource },
        "state": {
            "isRunning": running,
            "queue": unhandled > 0,
            "handledEventCount": handled,
            "unhandledEventCount": unhandled,
            "events": handled + unhandled,
        }
    })
    .to_string()
}

pub fn delta_frame(namespace: &str, resource: &str, fields: serde_json::Value) -> String {
    serde_json::json!({
        "type": "delta",
        "key": { "namespace": namespace, "resource": resource },
        "fields": fields,
    })
    .to_string()
}

pub fn removed_frame(namespace: &str, resource: &str) -> String {
    serde_json::json!({
        "type": "removed",
        "key": { "namespace": namespace, "resource": resource },
    })
    .to_string()
}

/// Accepts TCP connections and never answers the websocket handshake.
pub struct SilentListener {
    addr: SocketAddr,
    accepted: mpsc::UnboundedReceiver<()>,
}

impl SilentListener {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (accepted_tx, accepted) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((stream, _)) = listener.accept().await {
                held.push(stream);
                let _ = accepted_tx.send(());
            }
        });

        Self { addr, accepted }
    }

    pub fn url(&self) -> String {
        format!("ws://{}/ws", self.addr)
    }

    pub async fn wait_for_connection(&mut self) {
        tokio::time::timeout(WAIT, self.accepted.recv())
            .await
            .expect("no connection accepted in time")
            .expect("accept loop stopped");
    }
}
