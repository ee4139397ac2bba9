//! Kubernetes API discovery helpers, shared by the built-in watchers
//! (`crate::lib`) and the Custom-Resource Controller's dynamic informers
//! (`crate::crd`).

use anyhow::{anyhow, Result};
use kube::core::GroupVersionKind;
use kube::discovery::{Discovery, Scope};
use kube::Client;

/// Every currently-served resource this client's discovery cache knows
/// about, used by the embedding binary to decide what to watch.
pub async fn discover(client: Client) -> Result<Vec<GroupVersionKind>> {
    let discovery = Discovery::new(client).run().await?;
    let mut out = Vec::new();
    for group in discovery.groups() {
        for (ar, _caps) in group.recommended_resources() {
            out.push(GroupVersionKind { group: ar.group.clone(), version: ar.version.clone(), kind: ar.kind.clone() });
        }
    }
    out.sort_by(|a, b| a.group.cmp(&b.group).then(a.version.cmp(&b.version)).then(a.kind.cmp(&b.kind)));
    Ok(out)
}

pub fn parse_gvk_key(key: &str) -> Result<GroupVersionKind> {
    let parts: Vec<_> = key.split('/').collect();
    match parts.as_slice() {
        [version, kind] => Ok(GroupVersionKind { group: String::new(), version: (*version).to_string(), kind: (*kind).to_string() }),
        [group, version, kind] => {
            Ok(GroupVersionKind { group: (*group).to_string(), version: (*version).to_string(), kind: (*kind).to_string() })
        }
        _ => Err(anyhow!("invalid gvk key: {key} (expect v1/Kind or group/v1/Kind)")),
    }
}

/// Resolves a `GroupVersionKind` to its `ApiResource` plus whether it is
/// namespace-scoped, by scanning the client's discovery cache.
pub async fn find_api_resource(client: Client, gvk: &GroupVersionKind) -> Result<(kube::core::ApiResource, bool)> {
    let discovery = Discovery::new(client).run().await?;
    for group in discovery.groups() {
        for (ar, caps) in group.recommended_resources() {
            if ar.group == gvk.group && ar.version == gvk.version && ar.kind == gvk.kind {
                return Ok((ar.clone(), matches!(caps.scope, Scope::Namespaced)));
            }
        }
    }
    Err(anyhow!("GVK not found: {}/{}/{}", gvk.group, gvk.version, gvk.kind))
}
