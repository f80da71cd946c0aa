//! Dashboard REST API models
//!
//! Shapes returned by `/resources` and `/stats`. Stats share the engine's
//! [`Stats`] type so a REST answer can seed the stats feed directly.

use serde::{Deserialize, Serialize};
use std::fmt;
use watch_sync::WatcherKey;

pub use watch_sync::Stats;

/// Which half of the resource catalog to list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceScope {
    /// Cluster-scoped kinds (nodes, namespaces, CRDs, ...)
    Cluster,
    /// Namespaced kinds (pods, services, ...)
    Namespaced,
}

impl ResourceScope {
    /// Value of the `scope` query parameter; the cluster half is the empty value
    pub fn as_query(self) -> &'static str {
        match self {
            ResourceScope::Cluster => "",
            ResourceScope::Namespaced => "namespace",
        }
    }
}

impl fmt::Display for ResourceScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceScope::Cluster => write!(f, "cluster"),
            ResourceScope::Namespaced => write!(f, "namespaced"),
        }
    }
}

/// One watchable resource kind and the access the producer has to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    #[serde(default)]
    pub group: String,
    pub kind: String,
    pub version: String,
    /// Filled in from the requested scope when the producer omits it
    #[serde(default)]
    pub namespaced: bool,
    #[serde(default)]
    pub list: bool,
    #[serde(default)]
    pub watch: bool,
}

impl Resource {
    /// `group/version`, or just `version` for the core group.
    pub fn api_version(&self) -> String {
        if self.group.is_empty() {
            self.version.clone()
        } else {
            format!("{}/{}", self.group, self.version)
        }
    }

    /// Resource name as used in watcher keys: `v1.Pod`, `apps.v1.Deployment`.
    pub fn watcher_resource(&self) -> String {
        if self.group.is_empty() {
            format!("{}.{}", self.version, self.kind)
        } else {
            format!("{}.{}.{}", self.group, self.version, self.kind)
        }
    }

    /// Watcher key for this kind in `namespace` (empty for cluster scope).
    pub fn watcher_key(&self, namespace: impl Into<String>) -> WatcherKey {
        WatcherKey::new(namespace, self.watcher_resource())
    }

    /// The producer can only run a watcher it may both list and watch.
    pub fn is_watchable(&self) -> bool {
        self.list && self.watch
    }
}

/// Both halves of the resource catalog.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceCatalog {
    pub cluster: Vec<Resource>,
    pub namespaced: Vec<Resource>,
}

impl ResourceCatalog {
    pub fn len(&self) -> usize {
        self.cluster.len() + self.namespaced.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether a kind with this watcher resource name (`v1.Pod`) is listed.
    pub fn contains(&self, watcher_resource: &str) -> bool {
        self.cluster
            .iter()
            .chain(self.namespaced.iter())
            .any(|resource| resource.watcher_resource() == watcher_resource)
    }

    /// Kinds the producer lacks list or watch access to.
    pub fn unwatchable(&self) -> impl Iterator<Item = &Resource> {
        self.cluster
            .iter()
            .chain(self.namespaced.iter())
            .filter(|resource| !resource.is_watchable())
    }
}
