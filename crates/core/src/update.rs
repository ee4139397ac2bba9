use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::Domain;

/// Server → client frame discriminant (spec §3, §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateType {
    Added,
    Modified,
    Deleted,
    Reset,
    Complete,
    Error,
    Heartbeat,
}

impl UpdateType {
    pub fn as_str(self) -> &'static str {
        match self {
            UpdateType::Added => "ADDED",
            UpdateType::Modified => "MODIFIED",
            UpdateType::Deleted => "DELETED",
            UpdateType::Reset => "RESET",
            UpdateType::Complete => "COMPLETE",
            UpdateType::Error => "ERROR",
            UpdateType::Heartbeat => "HEARTBEAT",
        }
    }

    /// Row-bearing event types carry a snapshot-builder row; the rest never do.
    pub fn carries_row(self) -> bool {
        matches!(self, UpdateType::Added | UpdateType::Modified)
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("unknown update type: {0}")]
pub struct UnknownUpdateType(pub String);

impl FromStr for UpdateType {
    type Err = UnknownUpdateType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "ADDED" => UpdateType::Added,
            "MODIFIED" => UpdateType::Modified,
            "DELETED" => UpdateType::Deleted,
            "RESET" => UpdateType::Reset,
            "COMPLETE" => UpdateType::Complete,
            "ERROR" => UpdateType::Error,
            "HEARTBEAT" => UpdateType::Heartbeat,
            other => return Err(UnknownUpdateType(other.to_string())),
        })
    }
}

impl Serialize for UpdateType {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for UpdateType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        UpdateType::from_str(&s).map_err(serde::de::Error::custom)
    }
}

/// The broadcast unit (spec §3). Carries its own wire-serialization: field
/// names and casing match the server→client table in spec §6 exactly.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Update {
    #[serde(rename = "type")]
    pub update_type: UpdateType,
    pub domain: Domain,
    pub scope: String,
    pub cluster_id: String,
    pub cluster_name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub resource_version: String,
    /// Decimal encoding of the broadcaster's per-scope sequence counter.
    /// Present only on updates that passed through the resume ring.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sequence: Option<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub uid: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub namespace: String,
    #[serde(rename = "kind", default, skip_serializing_if = "String::is_empty")]
    pub object_kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub row: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Update {
    /// A minimal Update for a given (domain, scope); callers fill in the rest.
    pub fn new(
        update_type: UpdateType,
        domain: Domain,
        scope: impl Into<String>,
        cluster_id: impl Into<String>,
        cluster_name: impl Into<String>,
    ) -> Self {
        Self {
            update_type,
            domain,
            scope: scope.into(),
            cluster_id: cluster_id.into(),
            cluster_name: cluster_name.into(),
            resource_version: String::new(),
            sequence: None,
            uid: String::new(),
            name: String::new(),
            namespace: String::new(),
            object_kind: String::new(),
            row: None,
            error: None,
        }
    }

    pub fn heartbeat(cluster_id: impl Into<String>, cluster_name: impl Into<String>) -> Self {
        Self::new(UpdateType::Heartbeat, Domain::ClusterCrds, "", cluster_id, cluster_name)
    }

    pub fn reset(domain: Domain, scope: impl Into<String>, cluster_id: impl Into<String>, cluster_name: impl Into<String>) -> Self {
        Self::new(UpdateType::Reset, domain, scope, cluster_id, cluster_name)
    }

    pub fn complete(
        domain: Domain,
        scope: impl Into<String>,
        cluster_id: impl Into<String>,
        cluster_name: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        let mut u = Self::new(UpdateType::Complete, domain, scope, cluster_id, cluster_name);
        u.error = Some(reason.into());
        u
    }

    pub fn error_frame(
        domain: Domain,
        scope: impl Into<String>,
        cluster_id: impl Into<String>,
        cluster_name: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        let mut u = Self::new(UpdateType::Error, domain, scope, cluster_id, cluster_name);
        u.error = Some(reason.into());
        u
    }

    pub fn with_sequence(mut self, sequence: u64) -> Self {
        self.sequence = Some(sequence.to_string());
        self
    }
}

/// Why a subscription was torn down by the broadcaster or the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// Explicit CANCEL, session shutdown, or registry eviction.
    Closed,
    /// The delivery queue was saturated twice in a row with no drainer.
    Backpressure,
}

impl DropReason {
    pub fn as_str(self) -> &'static str {
        match self {
            DropReason::Closed => "closed",
            DropReason::Backpressure => "backpressure",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_field_names_match_spec() {
        let u = Update::new(UpdateType::Added, Domain::Pods, "namespace:default", "c1", "dev").with_sequence(1);
        let v = serde_json::to_value(&u).unwrap();
        assert_eq!(v["type"], "ADDED");
        assert_eq!(v["domain"], "pods");
        assert_eq!(v["scope"], "namespace:default");
        assert_eq!(v["clusterId"], "c1");
        assert_eq!(v["sequence"], "1");
    }

    #[test]
    fn heartbeat_has_no_scope_payload() {
        let u = Update::heartbeat("c1", "dev");
        assert_eq!(u.update_type, UpdateType::Heartbeat);
        assert!(u.row.is_none());
        assert_eq!(u.scope, "");
    }
}
