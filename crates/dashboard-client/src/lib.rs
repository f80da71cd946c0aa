//! Dashboard REST API Client
//!
//! A small client for the producer's REST endpoints: the resource catalog
//! (which kinds exist and whether they can be listed and watched) and the
//! producer's own watcher stats.
//!
//! # Example
//!
//! ```no_run
//! use dashboard_client::{DashboardClient, ResourceScope, DEFAULT_TIMEOUT};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = DashboardClient::new("http://127.0.0.1:1234", DEFAULT_TIMEOUT)?;
//!
//! let namespaced = client.get_resources(ResourceScope::Namespaced).await?;
//! let stats = client.get_stats().await?;
//! println!("{} namespaced kinds, {} watchers running", namespaced.len(), stats.running);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod error;
pub mod models;
#[path = "trait.rs"]
pub mod dashboard_trait;
#[cfg(feature = "test-util")]
pub mod mock;

pub use client::{DEFAULT_TIMEOUT, DashboardClient};
pub use dashboard_trait::DashboardClientTrait;
pub use error::ApiError;
pub use models::*;
#[cfg(feature = "test-util")]
pub use mock::MockDashboardClient;
