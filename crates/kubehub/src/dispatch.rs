//! Generic dispatch function used by every watched kind (spec §4.3, §9).
//! Reduces the five-step per-kind template to one implementation
//! parameterized by a `KindDescriptor` plus the pod → workload/node cascade.

use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::FxHashSet;

use kube::core::DynamicObject;

use fanout_core::{Domain, Update, UpdateType};
use fanout_registry::Registry;

use crate::collaborators::{CacheInvalidator, ResourceLister, RowBuilder, WorkloadOwnerResolver};
use crate::handlers::helm_release_name;
use crate::scopes::{controlling_workload, default_scopes, pod_scopes};

/// An informer surfacing a raw object is trusted as-is in this workspace's
/// `kube::runtime::watcher`/`reflector` stack, which always hands handlers a
/// fully-populated object on delete (unlike client-go's `DeletedFinalStateUnknown`
/// tombstone); this is a deliberate no-op kept as a named seam so a future
/// informer source that *does* surface stale-deletion sentinels has one
/// place to unwrap them.
fn unwrap_tombstone(obj: DynamicObject) -> DynamicObject {
    obj
}

pub struct Dispatcher {
    registry: Arc<Registry>,
    row_builder: Arc<dyn RowBuilder>,
    owners: Arc<dyn WorkloadOwnerResolver>,
    workloads: Arc<dyn ResourceLister>,
    nodes: Arc<dyn ResourceLister>,
    cache: Option<Arc<dyn CacheInvalidator>>,
    cluster_id: String,
    cluster_name: String,
    seen_uids: Mutex<FxHashSet<String>>,
}

impl Dispatcher {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        registry: Arc<Registry>,
        row_builder: Arc<dyn RowBuilder>,
        owners: Arc<dyn WorkloadOwnerResolver>,
        workloads: Arc<dyn ResourceLister>,
        nodes: Arc<dyn ResourceLister>,
        cluster_id: impl Into<String>,
        cluster_name: impl Into<String>,
    ) -> Self {
        Self::with_cache(registry, row_builder, owners, workloads, nodes, None, cluster_id, cluster_name)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn with_cache(
        registry: Arc<Registry>,
        row_builder: Arc<dyn RowBuilder>,
        owners: Arc<dyn WorkloadOwnerResolver>,
        workloads: Arc<dyn ResourceLister>,
        nodes: Arc<dyn ResourceLister>,
        cache: Option<Arc<dyn CacheInvalidator>>,
        cluster_id: impl Into<String>,
        cluster_name: impl Into<String>,
    ) -> Self {
        Self {
            registry,
            row_builder,
            owners,
            workloads,
            nodes,
            cache,
            cluster_id: cluster_id.into(),
            cluster_name: cluster_name.into(),
            seen_uids: Mutex::new(FxHashSet::default()),
        }
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Handles one informer event for a watched kind (spec §4.3 steps 1-5),
    /// then runs the pod cascade and Helm special case when relevant (step
    /// 6). Shared by the built-in kind watchers and the dynamic informers the
    /// Custom-Resource Controller stands up per served CRD.
    pub fn handle(&self, domain: Domain, kind: &str, deleted: bool, obj: DynamicObject) {
        let obj = unwrap_tombstone(obj);
        let uid = obj.metadata.uid.clone().unwrap_or_default();

        let update_type = if deleted {
            self.seen_uids.lock().remove(&uid);
            UpdateType::Deleted
        } else if self.seen_uids.lock().insert(uid.clone()) {
            UpdateType::Added
        } else {
            UpdateType::Modified
        };

        if let Some(cache) = &self.cache {
            let namespace = obj.metadata.namespace.as_deref().unwrap_or("");
            let name = obj.metadata.name.as_deref().unwrap_or("");
            cache.invalidate(kind, namespace, name);
        }

        self.emit(domain, kind, update_type, &obj);

        if kind == "Pod" {
            self.cascade_pod(update_type, &obj);
        }
        if kind == "Secret" {
            self.maybe_helm_refresh(&obj);
        }
    }

    fn emit(&self, domain: Domain, kind: &str, update_type: UpdateType, obj: &DynamicObject) {
        let row = if update_type.carries_row() {
            match self.row_builder.build_row(domain, obj) {
                Ok(row) => row,
                Err(err) => {
                    tracing::warn!(domain = %domain, kind, error = %err, "row builder failed, dropping event");
                    metrics::counter!("fanout_builder_errors_total", 1u64, "domain" => domain.to_string());
                    return;
                }
            }
        } else {
            None
        };

        let mut update = Update::new(update_type, domain, "", self.cluster_id.clone(), self.cluster_name.clone());
        update.uid = obj.metadata.uid.clone().unwrap_or_default();
        update.name = obj.metadata.name.clone().unwrap_or_default();
        update.namespace = obj.metadata.namespace.clone().unwrap_or_default();
        update.resource_version = obj.metadata.resource_version.clone().unwrap_or_default();
        update.object_kind = kind.to_string();
        update.row = row;

        let scopes = if domain.is_pods() { pod_scopes(obj, self.owners.as_ref()) } else { default_scopes(domain, obj) };
        fanout_registry::broadcast(&self.registry, domain, &scopes, update);
    }

    /// Step 6: refresh the owning Workload and Node rows so readiness /
    /// restart counts / pod counts stay current; standalone pods (no
    /// controller owner) emit their own row into the Workloads domain
    /// instead (spec §4.3).
    fn cascade_pod(&self, update_type: UpdateType, pod: &DynamicObject) {
        let ns = pod.metadata.namespace.as_deref().unwrap_or("");

        match controlling_workload(pod, self.owners.as_ref()) {
            Some((kind, name)) => {
                if let Some(workload_obj) = self.workloads.get(Some(ns), &name) {
                    self.emit(Domain::NamespaceWorkloads, &kind, UpdateType::Modified, &workload_obj);
                } else {
                    tracing::debug!(namespace = ns, kind, name, "owning workload not found in lister, skipping cascade");
                }
            }
            None => {
                self.emit(Domain::NamespaceWorkloads, "Pod", update_type, pod);
            }
        }

        if let Some(node_name) = pod.data.get("spec").and_then(|s| s.get("nodeName")).and_then(|v| v.as_str()) {
            if let Some(node_obj) = self.nodes.get(None, node_name) {
                self.emit(Domain::Nodes, "Node", UpdateType::Modified, &node_obj);
            }
        }
    }

    /// Spec §4.3 Helm special case / scenario S5: a modified `Secret` of
    /// type `helm.sh/release.v1` signals clients to refresh, rather than
    /// carrying a row of its own.
    fn maybe_helm_refresh(&self, secret: &DynamicObject) {
        let secret_type = secret.data.get("type").and_then(|v| v.as_str()).unwrap_or("");
        let name = secret.metadata.name.as_deref().unwrap_or("");
        let Some(release) = helm_release_name(secret_type, name) else { return };

        let ns = secret.metadata.namespace.as_deref().unwrap_or("");
        let mut update = Update::complete(Domain::NamespaceHelm, "", self.cluster_id.clone(), self.cluster_name.clone(), "helm release updated");
        update.name = release;
        update.namespace = ns.to_string();
        let scopes = vec![fanout_core::namespace_scope(ns), fanout_core::NAMESPACE_ALL.to_string()];
        fanout_registry::broadcast(&self.registry, Domain::NamespaceHelm, &scopes, update);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fanout_core::Limits;
    use kube::core::ObjectMeta;
    use serde_json::json;

    struct EchoRowBuilder;
    impl RowBuilder for EchoRowBuilder {
        fn build_row(&self, _domain: Domain, obj: &DynamicObject) -> anyhow::Result<Option<serde_json::Value>> {
            Ok(Some(json!({"name": obj.metadata.name})))
        }
    }

    struct FailingRowBuilder;
    impl RowBuilder for FailingRowBuilder {
        fn build_row(&self, _domain: Domain, _obj: &DynamicObject) -> anyhow::Result<Option<serde_json::Value>> {
            anyhow::bail!("boom")
        }
    }

    struct NoOwners;
    impl WorkloadOwnerResolver for NoOwners {
        fn resolve_root_owner(&self, _ns: &str, _kind: &str, _name: &str) -> Option<(String, String)> {
            None
        }
    }

    struct EmptyLister;
    impl ResourceLister for EmptyLister {
        fn get(&self, _namespace: Option<&str>, _name: &str) -> Option<DynamicObject> {
            None
        }
    }

    fn pod(name: &str, node: Option<&str>) -> DynamicObject {
        let meta = ObjectMeta { namespace: Some("default".into()), name: Some(name.into()), uid: Some("uid-1".into()), ..Default::default() };
        let data = if let Some(n) = node { json!({"spec": {"nodeName": n}}) } else { json!({"spec": {}}) };
        DynamicObject { types: None, metadata: meta, data }
    }

    fn dispatcher(row_builder: Arc<dyn RowBuilder>) -> (Arc<Registry>, Dispatcher) {
        let registry = Registry::new(Limits::default());
        let dispatcher = Dispatcher::new(
            Arc::clone(&registry),
            row_builder,
            Arc::new(NoOwners),
            Arc::new(EmptyLister),
            Arc::new(EmptyLister),
            "c1",
            "dev",
        );
        (registry, dispatcher)
    }

    #[tokio::test]
    async fn first_sighting_is_added_then_modified() {
        let (registry, dispatcher) = dispatcher(Arc::new(EchoRowBuilder));
        let sub = registry.subscribe(Domain::Pods, "namespace:default").unwrap();

        dispatcher.handle(Domain::Pods, "Pod", false, pod("web-1", None));
        dispatcher.handle(Domain::Pods, "Pod", false, pod("web-1", None));

        let first = sub.recv().await;
        assert_eq!(first.update_type, UpdateType::Added);
        let second = sub.recv().await;
        assert_eq!(second.update_type, UpdateType::Modified);
    }

    #[tokio::test]
    async fn row_builder_failure_drops_the_event() {
        let (registry, dispatcher) = dispatcher(Arc::new(FailingRowBuilder));
        let _sub = registry.subscribe(Domain::Pods, "namespace:default").unwrap();

        dispatcher.handle(Domain::Pods, "Pod", false, pod("web-1", None));

        let (updates, ok) = registry.resume(Domain::Pods, "namespace:default", 0);
        assert!(ok);
        assert!(updates.is_empty(), "builder error must not reach the broadcaster");
    }

    #[tokio::test]
    async fn standalone_pod_cascades_its_own_row_into_workloads() {
        let (registry, dispatcher) = dispatcher(Arc::new(EchoRowBuilder));
        let workloads_sub = registry.subscribe(Domain::NamespaceWorkloads, "namespace:default").unwrap();

        dispatcher.handle(Domain::Pods, "Pod", false, pod("standalone", Some("node-1")));

        let cascaded = workloads_sub.recv().await;
        assert_eq!(cascaded.object_kind, "Pod");
        assert_eq!(cascaded.name, "standalone");
    }

    #[tokio::test]
    async fn helm_release_secret_emits_complete_frame() {
        let (registry, dispatcher) = dispatcher(Arc::new(EchoRowBuilder));
        let helm_sub = registry.subscribe(Domain::NamespaceHelm, "namespace:default").unwrap();

        let meta = ObjectMeta { namespace: Some("default".into()), name: Some("sh.helm.release.v1.demo.v1".into()), ..Default::default() };
        let secret = DynamicObject { types: None, metadata: meta, data: json!({"type": "helm.sh/release.v1"}) };
        dispatcher.handle(Domain::NamespaceConfig, "Secret", false, secret);

        let refresh = helm_sub.recv().await;
        assert_eq!(refresh.update_type, UpdateType::Complete);
        assert_eq!(refresh.name, "demo");
        assert_eq!(refresh.error.as_deref(), Some("helm release updated"));
    }
}
