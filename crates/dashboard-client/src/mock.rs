//! Mock DashboardClient for unit testing
//!
//! Serves a configurable catalog and stats from memory, and can be told to
//! fail so callers can exercise their degraded paths.

use crate::dashboard_trait::DashboardClientTrait;
use crate::error::ApiError;
use crate::models::*;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Mock DashboardClient for testing
#[derive(Debug, Clone, Default)]
pub struct MockDashboardClient {
    base_url: String,
    resources: Arc<Mutex<HashMap<ResourceScope, Vec<Resource>>>>,
    stats: Arc<Mutex<Option<Stats>>>,
    // When set, every call fails with `ApiError::Api(message)`
    failure: Arc<Mutex<Option<String>>>,
}

impl MockDashboardClient {
    /// Create a new mock client with an empty catalog and no stats
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    /// Add a resource kind to one scope of the catalog
    pub fn add_resource(&self, scope: ResourceScope, mut resource: Resource) {
        resource.namespaced = scope == ResourceScope::Namespaced;
        self.resources
            .lock()
            .unwrap()
            .entry(scope)
            .or_default()
            .push(resource);
    }

    /// Set the stats returned by `get_stats`
    pub fn set_stats(&self, stats: Stats) {
        *self.stats.lock().unwrap() = Some(stats);
    }

    /// Make every subsequent call fail
    pub fn fail_with(&self, message: impl Into<String>) {
        *self.failure.lock().unwrap() = Some(message.into());
    }

    fn check_failure(&self) -> Result<(), ApiError> {
        match self.failure.lock().unwrap().as_ref() {
            Some(message) => Err(ApiError::Api(message.clone())),
            None => Ok(()),
        }
    }
}

#[async_trait::async_trait]
impl DashboardClientTrait for MockDashboardClient {
    fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn get_resources(&self, scope: ResourceScope) -> Result<Vec<Resource>, ApiError> {
        self.check_failure()?;
        Ok(self
            .resources
            .lock()
            .unwrap()
            .get(&scope)
            .cloned()
            .unwrap_or_default())
    }

    async fn get_catalog(&self) -> Result<ResourceCatalog, ApiError> {
        Ok(ResourceCatalog {
            cluster: self.get_resources(ResourceScope::Cluster).await?,
            namespaced: self.get_resources(ResourceScope::Namespaced).await?,
        })
    }

    async fn get_stats(&self) -> Result<Stats, ApiError> {
        self.check_failure()?;
        self.stats
            .lock()
            .unwrap()
            .ok_or_else(|| ApiError::NotFound("stats not configured".to_string()))
    }
}
