//! Declarative per-kind descriptor table (spec §4.3, §9 "dynamic dispatch
//! over resource kinds"). One entry per watched built-in kind; a single
//! generic `dispatch` function is instantiated once per entry rather than
//! the template being duplicated per kind.

use fanout_core::Domain;

#[derive(Debug, Clone, Copy)]
pub struct KindDescriptor {
    pub kind: &'static str,
    pub group: &'static str,
    pub version: &'static str,
    pub domain: Domain,
    /// Plural resource name, as it appears in `crate::permission::domain_permissions`.
    pub resource: &'static str,
}

impl KindDescriptor {
    /// `group/version/kind`, or `version/kind` for the core group — the same
    /// shape `crate::discovery::parse_gvk_key` accepts.
    pub fn gvk_key(&self) -> String {
        if self.group.is_empty() {
            format!("{}/{}", self.version, self.kind)
        } else {
            format!("{}/{}/{}", self.group, self.version, self.kind)
        }
    }
}

/// One row per built-in kind this engine watches (spec §4.3, next-to-last
/// paragraph). `CustomResourceDefinition` is handled separately by the
/// Custom-Resource Controller (`crate::crd`), not through this table.
pub const BUILTIN_KINDS: &[KindDescriptor] = &[
    KindDescriptor { kind: "Pod", group: "", version: "v1", domain: Domain::Pods, resource: "pods" },
    KindDescriptor { kind: "Node", group: "", version: "v1", domain: Domain::Nodes, resource: "nodes" },
    KindDescriptor { kind: "Namespace", group: "", version: "v1", domain: Domain::ClusterConfig, resource: "namespaces" },
    KindDescriptor { kind: "Deployment", group: "apps", version: "v1", domain: Domain::NamespaceWorkloads, resource: "deployments" },
    KindDescriptor { kind: "ReplicaSet", group: "apps", version: "v1", domain: Domain::NamespaceWorkloads, resource: "replicasets" },
    KindDescriptor { kind: "StatefulSet", group: "apps", version: "v1", domain: Domain::NamespaceWorkloads, resource: "statefulsets" },
    KindDescriptor { kind: "DaemonSet", group: "apps", version: "v1", domain: Domain::NamespaceWorkloads, resource: "daemonsets" },
    KindDescriptor { kind: "Job", group: "batch", version: "v1", domain: Domain::NamespaceWorkloads, resource: "jobs" },
    KindDescriptor { kind: "CronJob", group: "batch", version: "v1", domain: Domain::NamespaceWorkloads, resource: "cronjobs" },
    KindDescriptor { kind: "ConfigMap", group: "", version: "v1", domain: Domain::NamespaceConfig, resource: "configmaps" },
    KindDescriptor { kind: "Secret", group: "", version: "v1", domain: Domain::NamespaceConfig, resource: "secrets" },
    KindDescriptor { kind: "Service", group: "", version: "v1", domain: Domain::NamespaceNetwork, resource: "services" },
    KindDescriptor { kind: "Ingress", group: "networking.k8s.io", version: "v1", domain: Domain::NamespaceNetwork, resource: "ingresses" },
    KindDescriptor { kind: "NetworkPolicy", group: "networking.k8s.io", version: "v1", domain: Domain::NamespaceNetwork, resource: "networkpolicies" },
    KindDescriptor { kind: "ResourceQuota", group: "", version: "v1", domain: Domain::NamespaceQuotas, resource: "resourcequotas" },
    KindDescriptor { kind: "LimitRange", group: "", version: "v1", domain: Domain::NamespaceQuotas, resource: "limitranges" },
    KindDescriptor { kind: "PersistentVolumeClaim", group: "", version: "v1", domain: Domain::NamespaceStorage, resource: "persistentvolumeclaims" },
    KindDescriptor { kind: "StorageClass", group: "storage.k8s.io", version: "v1", domain: Domain::ClusterStorage, resource: "storageclasses" },
    KindDescriptor { kind: "Role", group: "rbac.authorization.k8s.io", version: "v1", domain: Domain::NamespaceRbac, resource: "roles" },
    KindDescriptor { kind: "RoleBinding", group: "rbac.authorization.k8s.io", version: "v1", domain: Domain::NamespaceRbac, resource: "rolebindings" },
    KindDescriptor { kind: "ClusterRole", group: "rbac.authorization.k8s.io", version: "v1", domain: Domain::ClusterRbac, resource: "clusterroles" },
    KindDescriptor { kind: "ClusterRoleBinding", group: "rbac.authorization.k8s.io", version: "v1", domain: Domain::ClusterRbac, resource: "clusterrolebindings" },
    KindDescriptor { kind: "HorizontalPodAutoscaler", group: "autoscaling", version: "v2", domain: Domain::NamespaceAutoscaling, resource: "horizontalpodautoscalers" },
];

/// Helm releases are stored as `Secret`s of type `helm.sh/release.v1`, named
/// `sh.helm.release.v1.<release>.v<revision>` (spec §4.3, Helm special case;
/// scenario S5). Returns the release name when `obj` matches that shape.
pub fn helm_release_name(secret_type: &str, secret_name: &str) -> Option<String> {
    if secret_type != "helm.sh/release.v1" {
        return None;
    }
    let rest = secret_name.strip_prefix("sh.helm.release.v1.")?;
    let (release, _revision) = rest.rsplit_once(".v")?;
    Some(release.to_string())
}
