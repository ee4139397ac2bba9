use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A logical stream identifier selecting which resource kinds contribute rows.
///
/// The wire form is the kebab-case name used in the table in the spec (e.g.
/// `namespace-workloads`, `cluster-crds`). `Display`/`FromStr` are the single
/// source of truth for that mapping; serde derives go through them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Domain {
    Pods,
    NamespaceWorkloads,
    NamespaceConfig,
    NamespaceRbac,
    NamespaceNetwork,
    NamespaceQuotas,
    NamespaceStorage,
    NamespaceHelm,
    NamespaceAutoscaling,
    NamespaceCustom,
    Nodes,
    ClusterRbac,
    ClusterStorage,
    ClusterConfig,
    ClusterCrds,
    ClusterCustom,
}

impl Domain {
    pub const ALL: &'static [Domain] = &[
        Domain::Pods,
        Domain::NamespaceWorkloads,
        Domain::NamespaceConfig,
        Domain::NamespaceRbac,
        Domain::NamespaceNetwork,
        Domain::NamespaceQuotas,
        Domain::NamespaceStorage,
        Domain::NamespaceHelm,
        Domain::NamespaceAutoscaling,
        Domain::NamespaceCustom,
        Domain::Nodes,
        Domain::ClusterRbac,
        Domain::ClusterStorage,
        Domain::ClusterConfig,
        Domain::ClusterCrds,
        Domain::ClusterCustom,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Domain::Pods => "pods",
            Domain::NamespaceWorkloads => "namespace-workloads",
            Domain::NamespaceConfig => "namespace-config",
            Domain::NamespaceRbac => "namespace-rbac",
            Domain::NamespaceNetwork => "namespace-network",
            Domain::NamespaceQuotas => "namespace-quotas",
            Domain::NamespaceStorage => "namespace-storage",
            Domain::NamespaceHelm => "namespace-helm",
            Domain::NamespaceAutoscaling => "namespace-autoscaling",
            Domain::NamespaceCustom => "namespace-custom",
            Domain::Nodes => "nodes",
            Domain::ClusterRbac => "cluster-rbac",
            Domain::ClusterStorage => "cluster-storage",
            Domain::ClusterConfig => "cluster-config",
            Domain::ClusterCrds => "cluster-crds",
            Domain::ClusterCustom => "cluster-custom",
        }
    }

    /// True for domains whose canonical scope is the empty, cluster-wide string.
    pub fn is_cluster_scoped(self) -> bool {
        matches!(
            self,
            Domain::Nodes
                | Domain::ClusterRbac
                | Domain::ClusterStorage
                | Domain::ClusterConfig
                | Domain::ClusterCrds
                | Domain::ClusterCustom
        )
    }

    /// True for the `pods` domain, which additionally accepts `node:` and
    /// `workload:` scope forms on top of the usual `namespace:` one.
    pub fn is_pods(self) -> bool {
        matches!(self, Domain::Pods)
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("unknown domain: {0}")]
pub struct UnknownDomain(pub String);

impl FromStr for Domain {
    type Err = UnknownDomain;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Domain::ALL
            .iter()
            .copied()
            .find(|d| d.as_str() == s)
            .ok_or_else(|| UnknownDomain(s.to_string()))
    }
}

impl Serialize for Domain {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Domain {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Domain::from_str(&s).map_err(serde::de::Error::custom)
    }
}
