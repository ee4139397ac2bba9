//! External-collaborator trait objects (spec §1). Nothing in this crate
//! implements these for real Kubernetes data beyond discovery/watch wiring;
//! production row-shaping, permission decisions, and metrics scraping are
//! supplied by the embedding binary.

use kube::core::DynamicObject;

use fanout_core::Domain;

/// Transforms a raw object into a per-domain row summary (spec §1(b)).
/// Pure function from the core's point of view; the embedding binary is
/// free to cache, memoize, or call out to another service behind it.
pub trait RowBuilder: Send + Sync {
    fn build_row(&self, domain: Domain, obj: &DynamicObject) -> anyhow::Result<Option<serde_json::Value>>;
}

/// Answers `CanListWatch(group, resource)` for the Permission Gate (spec
/// §4.2). Absent entirely implies test mode: every kind is registered.
pub trait PermissionChecker: Send + Sync {
    fn can_list_watch(&self, group: &str, resource: &str) -> bool;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PodUsage {
    pub cpu_millis: u64,
    pub memory_bytes: u64,
}

/// Exposes `LatestPodUsage()` (spec §1(c)), keyed by `<namespace>/<name>`.
pub trait PodMetricsProvider: Send + Sync {
    fn latest_pod_usage(&self) -> std::collections::HashMap<String, PodUsage>;
}

/// Read-only access to the informer's current listing for one kind, used by
/// the pod cascade (spec §4.3 step 6) to refresh the owning Workload or Node
/// row without re-deriving it from the bare event payload.
pub trait ResourceLister: Send + Sync {
    fn get(&self, namespace: Option<&str>, name: &str) -> Option<DynamicObject>;
}

/// Walks one hop further up an owner chain: given an immediate controller
/// owner (e.g. a Pod's owning ReplicaSet, or a Job's owning CronJob), returns
/// the root workload `(kind, name)` if one exists. `None` means the given
/// owner already is the root (e.g. a Pod owned directly by a StatefulSet).
pub trait WorkloadOwnerResolver: Send + Sync {
    fn resolve_root_owner(&self, namespace: &str, owner_kind: &str, owner_name: &str) -> Option<(String, String)>;
}

/// Invalidates any externally cached YAML/details view keyed by
/// `(kind, namespace, name)` (spec §4.3/§4.7: every Add/Update/Delete must
/// "invalidate any external YAML/details cache" before the broadcast reaches
/// subscribers). `namespace` is empty for cluster-scoped kinds. Absent
/// entirely implies no such cache exists downstream.
pub trait CacheInvalidator: Send + Sync {
    fn invalidate(&self, kind: &str, namespace: &str, name: &str);
}
