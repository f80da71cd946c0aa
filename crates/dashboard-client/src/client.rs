//! Dashboard API client
//!
//! Implements the REST side of the operations dashboard producer:
//! `/resources?scope=...` for the resource catalog and `/stats` for the
//! producer's own watcher counts.

use crate::dashboard_trait::DashboardClientTrait;
use crate::error::ApiError;
use crate::models::*;
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;

/// Default request timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Dashboard REST API client
#[derive(Debug, Clone)]
pub struct DashboardClient {
    client: Client,
    base_url: String,
}

impl DashboardClient {
    /// Create a new dashboard client
    ///
    /// # Arguments
    /// * `base_url` - Producer base URL (e.g., "http://127.0.0.1:1234")
    /// * `timeout` - Per-request timeout
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ApiError> {
        let base_url = base_url.into();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(ApiError::InvalidRequest(format!(
                "base URL must start with http:// or https://, got {}",
                base_url
            )));
        }

        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// List the resource kinds of one scope
    ///
    /// # Returns
    /// * `Ok(Vec<Resource>)` - Kinds with the producer's list/watch access
    /// * `Err(ApiError)` - If the request fails or the body does not decode
    pub async fn get_resources(&self, scope: ResourceScope) -> Result<Vec<Resource>, ApiError> {
        let url = format!("{}/resources", self.base_url);
        debug!("Fetching {} resources from {}", scope, url);

        let response = self
            .client
            .get(&url)
            .query(&[("scope", scope.as_query())])
            .header("Accept", "application/json")
            .send()
            .await?;

        let mut resources: Vec<Resource> =
            decode(response, &format!("{} resources", scope)).await?;
        for resource in &mut resources {
            resource.namespaced = scope == ResourceScope::Namespaced;
        }
        debug!("Fetched {} {} resources", resources.len(), scope);
        Ok(resources)
    }

    /// Fetch both halves of the resource catalog
    pub async fn get_catalog(&self) -> Result<ResourceCatalog, ApiError> {
        let (cluster, namespaced) = tokio::try_join!(
            self.get_resources(ResourceScope::Cluster),
            self.get_resources(ResourceScope::Namespaced)
        )?;
        Ok(ResourceCatalog {
            cluster,
            namespaced,
        })
    }

    /// Get the producer's watcher counts
    pub async fn get_stats(&self) -> Result<Stats, ApiError> {
        let url = format!("{}/stats", self.base_url);
        debug!("Fetching watcher stats from {}", url);

        let response = self
            .client
            .get(&url)
            .header("Accept", "application/json")
            .send()
            .await?;

        decode(response, "stats").await
    }
}

/// Check the status and decode a JSON body.
async fn decode<T: DeserializeOwned>(response: Response, what: &str) -> Result<T, ApiError> {
    let status = response.status();

    if status == StatusCode::NOT_FOUND {
        return Err(ApiError::NotFound(format!(
            "{} endpoint {} not found",
            what,
            response.url()
        )));
    }

    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ApiError::Api(format!(
            "Failed to get {}: {} - {}",
            what, status, body
        )));
    }

    // Keep the body around for better error messages
    let response_text = response.text().await?;
    serde_json::from_str(&response_text).map_err(|e| {
        ApiError::Api(format!(
            "error decoding response body: {} - Response (first 500 chars): {}",
            e,
            response_text.chars().take(500).collect::<String>()
        ))
    })
}

#[async_trait::async_trait]
impl DashboardClientTrait for DashboardClient {
    fn base_url(&self) -> &str {
        self.base_url()
    }

    async fn get_resources(&self, scope: ResourceScope) -> Result<Vec<Resource>, ApiError> {
        self.get_resources(scope).await
    }

    async fn get_catalog(&self) -> Result<ResourceCatalog, ApiError> {
        self.get_catalog().await
    }

    async fn get_stats(&self) -> Result<Stats, ApiError> {
        self.get_stats().await
    }
}
