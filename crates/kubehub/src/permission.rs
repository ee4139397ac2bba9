//! Permission Gate (spec §4.2): the `(group, resource)` tuples each domain's
//! watched kinds need. Consulted once at handler-registration time, not per
//! subscribe (spec §9 open question 2 keeps this intentionally coarse).

use fanout_core::Domain;

/// `domainPermissions(domain) -> [(group, resource)]`.
pub fn domain_permissions(domain: Domain) -> &'static [(&'static str, &'static str)] {
    match domain {
        Domain::Pods => &[("", "pods")],
        Domain::NamespaceWorkloads => &[
            ("apps", "deployments"),
            ("apps", "replicasets"),
            ("apps", "statefulsets"),
            ("apps", "daemonsets"),
            ("batch", "jobs"),
            ("batch", "cronjobs"),
            ("", "pods"),
        ],
        Domain::NamespaceConfig => &[("", "configmaps"), ("", "secrets")],
        Domain::NamespaceRbac => &[("rbac.authorization.k8s.io", "roles"), ("rbac.authorization.k8s.io", "rolebindings")],
        Domain::NamespaceNetwork => &[("", "services"), ("networking.k8s.io", "ingresses"), ("networking.k8s.io", "networkpolicies")],
        Domain::NamespaceQuotas => &[("", "resourcequotas"), ("", "limitranges")],
        Domain::NamespaceStorage => &[("", "persistentvolumeclaims")],
        Domain::NamespaceHelm => &[("", "secrets")],
        Domain::NamespaceAutoscaling => &[("autoscaling", "horizontalpodautoscalers")],
        Domain::NamespaceCustom => &[],
        Domain::Nodes => &[("", "nodes")],
        Domain::ClusterRbac => &[("rbac.authorization.k8s.io", "clusterroles"), ("rbac.authorization.k8s.io", "clusterrolebindings")],
        Domain::ClusterStorage => &[("storage.k8s.io", "storageclasses")],
        Domain::ClusterConfig => &[("", "namespaces")],
        Domain::ClusterCrds => &[("apiextensions.k8s.io", "customresourcedefinitions")],
        Domain::ClusterCustom => &[],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_domain_has_an_entry() {
        for d in Domain::ALL {
            let _ = domain_permissions(*d);
        }
    }

    #[test]
    fn pods_requires_core_pods() {
        assert_eq!(domain_permissions(Domain::Pods), &[("", "pods")]);
    }
}
