//! Cluster Router (spec §4.9): the multi-cluster front door. Holds one
//! [`fanout_kubehub::Manager`] per cluster and dispatches `Subscribe`/`Resume`
//! calls to the right one.

use std::collections::HashMap;
use std::sync::Arc;

use fanout_core::{Domain, FanoutError, FanoutResult, Update};
use fanout_kubehub::Manager;
use fanout_registry::Subscription;

/// `map[clusterId → Manager]`. Built once at process start from cluster
/// discovery/config and handed to every session.
pub struct ClusterRouter {
    clusters: HashMap<String, Arc<Manager>>,
}

impl ClusterRouter {
    pub fn new(clusters: HashMap<String, Arc<Manager>>) -> Self {
        Self { clusters }
    }

    pub fn cluster_ids(&self) -> impl Iterator<Item = &str> {
        self.clusters.keys().map(String::as_str)
    }

    pub fn manager(&self, cluster_id: &str) -> Option<&Arc<Manager>> {
        self.clusters.get(cluster_id)
    }

    /// Dispatches to the named cluster's registry. Calls without a cluster id
    /// fail with `cluster-id-required` (spec §4.9).
    pub fn subscribe(&self, cluster_id: Option<&str>, domain: Domain, scope: &str) -> FanoutResult<Subscription> {
        let cluster_id = cluster_id.ok_or_else(|| FanoutError::Validation("cluster-id-required".into()))?;
        let manager = self.clusters.get(cluster_id).ok_or_else(|| FanoutError::Validation(format!("unknown cluster id: {cluster_id}")))?;
        manager.registry().subscribe(domain, scope)
    }

    /// Resume on an unknown cluster returns `(empty, false)` rather than an
    /// error, matching `Registry::resume`'s own miss semantics.
    pub fn resume(&self, cluster_id: Option<&str>, domain: Domain, scope: &str, since: u64) -> (Vec<Update>, bool) {
        let Some(cluster_id) = cluster_id else {
            return (Vec::new(), false);
        };
        let Some(manager) = self.clusters.get(cluster_id) else {
            return (Vec::new(), false);
        };
        manager.registry().resume(domain, scope, since)
    }
}
