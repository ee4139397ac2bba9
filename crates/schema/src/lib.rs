//! CRD served/storage version and GVR resolution for the custom-resource
//! controller (spec §4.7): given a `CustomResourceDefinition` object, compute
//! the version to watch and the plural/kind/scope needed to build a
//! `GroupVersionKind` for a dynamic informer.

#![forbid(unsafe_code)]

use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use kube::core::GroupVersionKind;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CrdScope {
    Namespaced,
    Cluster,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrdInfo {
    pub name: String,
    pub group: String,
    pub version: String,
    pub kind: String,
    pub plural: String,
    pub scope: CrdScope,
}

impl CrdInfo {
    pub fn gvk(&self) -> GroupVersionKind {
        GroupVersionKind { group: self.group.clone(), version: self.version.clone(), kind: self.kind.clone() }
    }
}

/// Resolves the version to watch and the plural/scope needed to construct a
/// dynamic informer for `crd`. Picks the version marked `storage: true`;
/// falls back to the first version marked `served: true`; falls back again
/// to the first version listed at all. Returns `None` if the chosen version
/// is not currently served (spec §4.7: "stopped on CRD delete or on spec
/// changes that alter GVR, kind, or scope" implies an unserved CRD has no
/// informer to begin with).
pub fn resolve(crd: &CustomResourceDefinition) -> Option<CrdInfo> {
    let spec = &crd.spec;
    let versions = &spec.versions;
    if versions.is_empty() {
        return None;
    }

    let chosen = versions
        .iter()
        .find(|v| v.storage)
        .or_else(|| versions.iter().find(|v| v.served))
        .unwrap_or(&versions[0]);

    if !chosen.served {
        return None;
    }

    let scope = match spec.scope.as_str() {
        "Namespaced" => CrdScope::Namespaced,
        "Cluster" => CrdScope::Cluster,
        _ => return None,
    };

    Some(CrdInfo {
        name: crd.metadata.name.clone().unwrap_or_default(),
        group: spec.group.clone(),
        version: chosen.name.clone(),
        kind: spec.names.kind.clone(),
        plural: spec.names.plural.clone(),
        scope,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::{
        CustomResourceDefinitionNames, CustomResourceDefinitionSpec, CustomResourceDefinitionVersion,
    };
    use kube::core::ObjectMeta;

    fn crd(versions: Vec<CustomResourceDefinitionVersion>, scope: &str) -> CustomResourceDefinition {
        CustomResourceDefinition {
            metadata: ObjectMeta { name: Some("widgets.example.com".into()), ..Default::default() },
            spec: CustomResourceDefinitionSpec {
                group: "example.com".into(),
                names: CustomResourceDefinitionNames { kind: "Widget".into(), plural: "widgets".into(), ..Default::default() },
                scope: scope.into(),
                versions,
                ..Default::default()
            },
            status: None,
        }
    }

    fn version(name: &str, served: bool, storage: bool) -> CustomResourceDefinitionVersion {
        CustomResourceDefinitionVersion { name: name.into(), served, storage, ..Default::default() }
    }

    #[test]
    fn prefers_storage_version() {
        let c = crd(vec![version("v1alpha1", true, false), version("v1", true, true)], "Namespaced");
        let info = resolve(&c).unwrap();
        assert_eq!(info.version, "v1");
        assert_eq!(info.scope, CrdScope::Namespaced);
        assert_eq!(info.plural, "widgets");
    }

    #[test]
    fn falls_back_to_served_when_no_storage_flag() {
        let c = crd(vec![version("v1beta1", false, false), version("v1", true, false)], "Cluster");
        let info = resolve(&c).unwrap();
        assert_eq!(info.version, "v1");
        assert_eq!(info.scope, CrdScope::Cluster);
    }

    #[test]
    fn falls_back_to_first_version_with_no_served_flag_at_all() {
        let c = crd(vec![version("v1", false, false)], "Namespaced");
        let info = resolve(&c);
        assert!(info.is_none(), "unserved chosen version yields no informer");
    }

    #[test]
    fn unknown_scope_is_rejected() {
        let c = crd(vec![version("v1", true, true)], "Weird");
        assert!(resolve(&c).is_none());
    }
}
