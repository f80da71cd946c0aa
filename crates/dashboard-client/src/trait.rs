//! DashboardClient trait for mocking
//!
//! The concrete `DashboardClient` implements this trait; controller code
//! depends on the trait so tests can swap in `MockDashboardClient`.

use crate::error::ApiError;
use crate::models::*;

/// Trait for dashboard REST API operations
///
/// All async methods must be `Send` to work with Tokio's work-stealing runtime.
#[async_trait::async_trait]
pub trait DashboardClientTrait: Send + Sync {
    /// Get the base URL
    fn base_url(&self) -> &str;

    async fn get_resources(&self, scope: ResourceScope) -> Result<Vec<Resource>, ApiError>;
    async fn get_catalog(&self) -> Result<ResourceCatalog, ApiError>;
    async fn get_stats(&self) -> Result<Stats, ApiError>;
}
