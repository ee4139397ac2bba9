//! Minimal collaborator implementations good enough to run the engine
//! standalone. Row shaping, permission decisions, and owner-chain lookups
//! are external collaborators per spec; a real deployment supplies its own.

use kube::core::DynamicObject;

use fanout_core::Domain;
use fanout_kubehub::{PodMetricsProvider, PodUsage, ResourceLister, RowBuilder, WorkloadOwnerResolver};

/// Serializes the object as-is (minus `managedFields`) as the row. No
/// per-domain projection; every domain gets the same shape.
pub struct PassthroughRowBuilder;

impl RowBuilder for PassthroughRowBuilder {
    fn build_row(&self, _domain: Domain, obj: &DynamicObject) -> anyhow::Result<Option<serde_json::Value>> {
        let mut v = serde_json::to_value(obj)?;
        strip_managed_fields(&mut v);
        Ok(Some(v))
    }
}

fn strip_managed_fields(v: &mut serde_json::Value) {
    if let Some(obj) = v.get_mut("metadata").and_then(|m| m.as_object_mut()) {
        obj.remove("managedFields");
    }
}

/// Treats every owner as already being the root; the pod cascade still
/// refreshes the Pod's immediate owner, it just never walks further (e.g.
/// ReplicaSet → Deployment escalation is skipped).
pub struct NoopOwnerResolver;

impl WorkloadOwnerResolver for NoopOwnerResolver {
    fn resolve_root_owner(&self, _namespace: &str, _owner_kind: &str, _owner_name: &str) -> Option<(String, String)> {
        None
    }
}

/// No indexer backing this binary yet; the pod cascade falls back to
/// emitting the pod's own row whenever it would otherwise look up the
/// owning Workload or Node row.
pub struct EmptyLister;

impl ResourceLister for EmptyLister {
    fn get(&self, _namespace: Option<&str>, _name: &str) -> Option<DynamicObject> {
        None
    }
}

/// No metrics-server integration wired up yet.
pub struct NoPodMetrics;

impl PodMetricsProvider for NoPodMetrics {
    fn latest_pod_usage(&self) -> std::collections::HashMap<String, PodUsage> {
        std::collections::HashMap::new()
    }
}
