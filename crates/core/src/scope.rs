//! Pure per-domain scope grammar. This is the single source of truth used by
//! both the session multiplexer (validating client requests) and the event
//! handlers (computing fan-out targets) — see spec §4.1.

use crate::domain::Domain;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ScopeError {
    #[error("scope must be empty for cluster-wide domain {domain}, got {raw:?}")]
    NotEmpty { domain: Domain, raw: String },
    #[error("missing namespace in scope {raw:?}")]
    MissingNamespace { raw: String },
    #[error("missing node name in scope {raw:?}")]
    MissingNodeName { raw: String },
    #[error("workload scope must be workload:<ns>:<kind>:<name>, got {raw:?}")]
    InvalidWorkload { raw: String },
    #[error("unrecognized scope prefix {prefix:?} for domain {domain}")]
    UnknownPrefix { domain: Domain, prefix: String },
}

/// Normalize a raw client-supplied scope string into its canonical form for
/// `domain`. Pure function: no I/O, no locking.
pub fn normalize(domain: Domain, raw: &str) -> Result<String, ScopeError> {
    let trimmed = raw.trim();

    if domain.is_cluster_scoped() {
        return if trimmed.is_empty() {
            Ok(String::new())
        } else {
            Err(ScopeError::NotEmpty { domain, raw: raw.to_string() })
        };
    }

    // Split on ':' and drop a stray leading empty segment, which covers the
    // "drops an optional leading ':' after the prefix" rule for inputs like
    // "namespace::default".
    let mut parts: Vec<&str> = trimmed.split(':').map(|s| s.trim()).collect();
    if parts.len() > 1 && parts[1].is_empty() {
        parts.remove(1);
    }

    let prefix = parts.first().copied().unwrap_or("").to_ascii_lowercase();
    match prefix.as_str() {
        "namespace" => {
            let ns = parts.get(1).copied().unwrap_or("");
            if ns.is_empty() {
                return Err(ScopeError::MissingNamespace { raw: raw.to_string() });
            }
            if ns.eq_ignore_ascii_case("all") || ns == "*" {
                Ok("namespace:all".to_string())
            } else {
                Ok(format!("namespace:{ns}"))
            }
        }
        "node" if domain.is_pods() => {
            let name = parts.get(1).copied().unwrap_or("");
            if name.is_empty() {
                return Err(ScopeError::MissingNodeName { raw: raw.to_string() });
            }
            Ok(format!("node:{name}"))
        }
        "workload" if domain.is_pods() => {
            if parts.len() != 4 || parts[1..4].iter().any(|p| p.is_empty()) {
                return Err(ScopeError::InvalidWorkload { raw: raw.to_string() });
            }
            Ok(format!("workload:{}:{}:{}", parts[1], parts[2], parts[3]))
        }
        other => Err(ScopeError::UnknownPrefix { domain, prefix: other.to_string() }),
    }
}

/// Build the authoritative `workload:<ns>:<kind>:<name>` scope string.
///
/// Per spec §9 open question 1, this `:`-separated triple is used end-to-end
/// (internally and on the wire); there is no separate `/`-separated owner-key
/// form anywhere in this implementation.
pub fn workload_scope(namespace: &str, kind: &str, name: &str) -> String {
    format!("workload:{namespace}:{kind}:{name}")
}

pub fn namespace_scope(namespace: &str) -> String {
    format!("namespace:{namespace}")
}

pub const NAMESPACE_ALL: &str = "namespace:all";

pub fn node_scope(node: &str) -> String {
    format!("node:{node}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn namespace_forms() {
        assert_eq!(normalize(Domain::NamespaceConfig, "namespace:default").unwrap(), "namespace:default");
        assert_eq!(normalize(Domain::NamespaceConfig, "namespace:*").unwrap(), "namespace:all");
        assert_eq!(normalize(Domain::NamespaceConfig, "namespace:ALL").unwrap(), "namespace:all");
        assert_eq!(normalize(Domain::NamespaceConfig, "  namespace:default  ").unwrap(), "namespace:default");
        assert!(normalize(Domain::NamespaceConfig, "namespace:").is_err());
        assert!(normalize(Domain::NamespaceConfig, "bogus:default").is_err());
    }

    #[test]
    fn cluster_wide_requires_empty() {
        assert_eq!(normalize(Domain::Nodes, "").unwrap(), "");
        assert_eq!(normalize(Domain::Nodes, "   ").unwrap(), "");
        assert!(normalize(Domain::Nodes, "namespace:default").is_err());
    }

    #[test]
    fn pods_extra_forms() {
        assert_eq!(normalize(Domain::Pods, "node:ip-1-2-3-4").unwrap(), "node:ip-1-2-3-4");
        assert_eq!(
            normalize(Domain::Pods, "workload:default:Deployment:web").unwrap(),
            "workload:default:Deployment:web"
        );
        assert!(normalize(Domain::Pods, "workload:default:Deployment").is_err());
        assert!(normalize(Domain::NamespaceConfig, "node:foo").is_err());
    }

    #[test]
    fn idempotent_on_canonical_forms() {
        for (domain, raw) in [
            (Domain::Pods, "namespace:all"),
            (Domain::Pods, "node:n1"),
            (Domain::Pods, "workload:ns:Deployment:web"),
            (Domain::NamespaceHelm, "namespace:default"),
            (Domain::Nodes, ""),
        ] {
            let once = normalize(domain, raw).unwrap();
            let twice = normalize(domain, &once).unwrap();
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn double_colon_tolerated() {
        assert_eq!(normalize(Domain::NamespaceConfig, "namespace::default").unwrap(), "namespace:default");
    }

    proptest::proptest! {
        #[test]
        fn namespace_normalize_is_idempotent(ns in "[a-z][a-z0-9-]{0,20}") {
            let once = normalize(Domain::NamespaceConfig, &format!("namespace:{ns}")).unwrap();
            let twice = normalize(Domain::NamespaceConfig, &once).unwrap();
            prop_assert_eq!(once, twice);
        }

        #[test]
        fn all_equality_class_collapses(raw in proptest::sample::select(vec!["*", "all", "ALL", "All", "namespace:all", "namespace:*"])) {
            let scope = if raw.starts_with("namespace") { raw.to_string() } else { format!("namespace:{raw}") };
            prop_assert_eq!(normalize(Domain::Pods, &scope).unwrap(), "namespace:all");
        }
    }
}
