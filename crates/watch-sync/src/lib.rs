//! Watcher Event Stream Sync
//!
//! Client-side engine that keeps a live table of Kubernetes watcher states
//! in sync with a producer's event stream, and sends start/stop commands
//! back over the same channel.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use watch_sync::{CommandSender, SyncSession, Transport, WatcherKey, WatcherTable};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let transport = Arc::new(Transport::new("ws://127.0.0.1:1234/ws"));
//! transport.connect().await?;
//!
//! // Apply incoming events to a fresh table and follow the stats
//! let session = SyncSession::start(&transport, WatcherTable::new(), None).await?;
//! let mut stats = session.stats();
//!
//! // Ask the producer to start a watcher
//! let commands = CommandSender::new(transport.clone());
//! commands.start(&WatcherKey::new("default", "v1.Pod")).await?;
//!
//! while let Some(current) = stats.next().await {
//!     println!("{} watchers, {} running", current.total, current.running);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Features
//!
//! - **Decoding**: Tagged JSON frames validated into typed events
//! - **Watcher Table**: Ordered, revisioned, monotonic counters between resets
//! - **Feeds**: Coalescing snapshot and stats subscriptions
//! - **Commands**: Fire-and-forget or effect-awaiting start/stop
//! - **Reconnect**: Optional Fibonacci backoff policy that keeps the table

pub mod backoff;
pub mod codec;
pub mod command;
pub mod error;
pub mod feed;
pub mod model;
pub mod reconnect;
pub mod session;
pub mod stats;
pub mod table;
pub mod transport;

pub use backoff::{FibonacciBackoff, ReconnectPolicy};
pub use codec::{RawFrame, decode, decode_frame, encode};
pub use command::{AckPolicy, CommandOutcome, CommandSender};
pub use error::{DecodeError, SyncError, TableWarning};
pub use feed::{FeedSubscription, TableFeed};
pub use model::*;
pub use reconnect::Reconnector;
pub use session::{SessionEnd, SessionReport, SyncSession};
pub use stats::Stats;
pub use table::{Applied, TableSnapshot, WatcherTable};
pub use transport::{DEFAULT_CONNECT_TIMEOUT, FrameSubscription, Link, Transport};
