//! Scope derivation for incoming objects (spec §4.3 step 4). Builds on the
//! pure grammar in `fanout_core::scope`; this module only knows how to read
//! the fields of a `DynamicObject` that feed that grammar.

use kube::core::DynamicObject;

use fanout_core::{namespace_scope, node_scope, workload_scope, Domain, NAMESPACE_ALL};

use crate::collaborators::WorkloadOwnerResolver;

/// `{namespace:<ns>, namespace:all}` for a namespaced row, `{""}` for a
/// cluster-scoped one (spec §4.3 step 4, namespaced/cluster-scoped cases).
pub fn default_scopes(domain: Domain, obj: &DynamicObject) -> Vec<String> {
    if domain.is_cluster_scoped() {
        return vec![String::new()];
    }
    let ns = obj.metadata.namespace.as_deref().unwrap_or("");
    vec![namespace_scope(ns), NAMESPACE_ALL.to_string()]
}

/// Pod → `{namespace:<ns>, namespace:all}` ∪ optional `node:<name>` ∪
/// optional `workload:<ns>:<kind>:<name>` from the owner chain (spec §4.3
/// step 4, first bullet).
pub fn pod_scopes(obj: &DynamicObject, owners: &dyn WorkloadOwnerResolver) -> Vec<String> {
    let mut scopes = default_scopes(Domain::Pods, obj);

    if let Some(node_name) = obj.data.get("spec").and_then(|s| s.get("nodeName")).and_then(|v| v.as_str()) {
        scopes.push(node_scope(node_name));
    }

    if let Some((kind, name)) = controlling_workload(obj, owners) {
        let ns = obj.metadata.namespace.as_deref().unwrap_or("");
        scopes.push(workload_scope(ns, &kind, &name));
    }

    scopes
}

/// Resolves the root controlling workload for a Pod: the immediate
/// controller owner, escalated one hop through `owners` when that owner is
/// itself an intermediate kind (ReplicaSet → Deployment, Job → CronJob).
pub fn controlling_workload(obj: &DynamicObject, owners: &dyn WorkloadOwnerResolver) -> Option<(String, String)> {
    let owner_refs = obj.metadata.owner_references.as_ref()?;
    let controller = owner_refs.iter().find(|o| o.controller.unwrap_or(false))?;
    let ns = obj.metadata.namespace.as_deref().unwrap_or("");

    match controller.kind.as_str() {
        "ReplicaSet" | "Job" => {
            owners.resolve_root_owner(ns, &controller.kind, &controller.name).or_else(|| Some((controller.kind.clone(), controller.name.clone())))
        }
        _ => Some((controller.kind.clone(), controller.name.clone())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kube::core::ObjectMeta;
    use serde_json::json;

    struct NoOwners;
    impl WorkloadOwnerResolver for NoOwners {
        fn resolve_root_owner(&self, _ns: &str, _kind: &str, _name: &str) -> Option<(String, String)> {
            None
        }
    }

    struct ToDeployment;
    impl WorkloadOwnerResolver for ToDeployment {
        fn resolve_root_owner(&self, _ns: &str, kind: &str, _name: &str) -> Option<(String, String)> {
            (kind == "ReplicaSet").then(|| ("Deployment".to_string(), "web".to_string()))
        }
    }

    fn pod_with_owner(kind: &str, name: &str, node: Option<&str>) -> DynamicObject {
        let mut meta = ObjectMeta {
            namespace: Some("default".into()),
            name: Some("pod-1".into()),
            ..Default::default()
        };
        meta.owner_references = Some(vec![k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference {
            api_version: "v1".into(),
            kind: kind.into(),
            name: name.into(),
            uid: "owner-uid".into(),
            controller: Some(true),
            block_owner_deletion: Some(true),
        }]);
        let data = if let Some(n) = node { json!({"spec": {"nodeName": n}}) } else { json!({"spec": {}}) };
        DynamicObject { types: None, metadata: meta, data }
    }

    #[test]
    fn standalone_pod_has_no_workload_scope() {
        let mut pod = pod_with_owner("StatefulSet", "cache", Some("node-1"));
        pod.metadata.owner_references = None;
        let scopes = pod_scopes(&pod, &NoOwners);
        assert!(scopes.contains(&"namespace:default".to_string()));
        assert!(scopes.contains(&"namespace:all".to_string()));
        assert!(scopes.contains(&"node:node-1".to_string()));
        assert!(!scopes.iter().any(|s| s.starts_with("workload:")));
    }

    #[test]
    fn statefulset_owned_pod_uses_direct_owner() {
        let pod = pod_with_owner("StatefulSet", "cache", None);
        let scopes = pod_scopes(&pod, &NoOwners);
        assert!(scopes.contains(&"workload:default:StatefulSet:cache".to_string()));
    }

    #[test]
    fn replicaset_owned_pod_escalates_to_deployment() {
        let pod = pod_with_owner("ReplicaSet", "web-12345", None);
        let scopes = pod_scopes(&pod, &ToDeployment);
        assert!(scopes.contains(&"workload:default:Deployment:web".to_string()));
    }
}
