//! Kubernetes-facing half of the fan-out engine: discovery, the Permission
//! Gate, the built-in kind watchers, the Custom-Resource Controller, and the
//! [`Manager`] that wires them all to a [`fanout_registry::Registry`].

#![forbid(unsafe_code)]

pub mod collaborators;
pub mod crd;
pub mod discovery;
pub mod dispatch;
pub mod handlers;
pub mod permission;
pub mod scopes;

use std::sync::Arc;

use anyhow::Result;
use futures::TryStreamExt;
use parking_lot::Mutex;
use tokio::task::JoinHandle;

use kube::api::Api;
use kube::core::DynamicObject;
use kube::runtime::watcher::{self, Event};
use kube::Client;

use fanout_core::Limits;
use fanout_registry::Registry;

pub use collaborators::{CacheInvalidator, PermissionChecker, PodMetricsProvider, PodUsage, ResourceLister, RowBuilder, WorkloadOwnerResolver};
pub use crd::CrdController;
pub use dispatch::Dispatcher;
pub use handlers::{helm_release_name, KindDescriptor, BUILTIN_KINDS};

fn permitted(checker: Option<&dyn PermissionChecker>, descriptor: &KindDescriptor) -> bool {
    permitted_tuple(checker, descriptor.group, descriptor.resource)
}

fn permitted_tuple(checker: Option<&dyn PermissionChecker>, group: &str, resource: &str) -> bool {
    checker.map(|c| c.can_list_watch(group, resource)).unwrap_or(true)
}

/// Owns the registry, the dispatcher, and every background watcher task for
/// one Kubernetes cluster. Dropping the last `Arc` does not stop the spawned
/// tasks; call [`Manager::stop`] explicitly (spec §4.7 "stopping the Manager
/// stops all dynamically managed informers").
pub struct Manager {
    registry: Arc<Registry>,
    dispatcher: Arc<Dispatcher>,
    crd_controller: Arc<CrdController>,
    client: Client,
    permission_checker: Option<Arc<dyn PermissionChecker>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl Manager {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        client: Client,
        limits: Limits,
        row_builder: Arc<dyn RowBuilder>,
        owners: Arc<dyn WorkloadOwnerResolver>,
        workloads: Arc<dyn ResourceLister>,
        nodes: Arc<dyn ResourceLister>,
        permission_checker: Option<Arc<dyn PermissionChecker>>,
        cluster_id: impl Into<String>,
        cluster_name: impl Into<String>,
    ) -> Arc<Self> {
        Self::with_cache(client, limits, row_builder, owners, workloads, nodes, None, permission_checker, cluster_id, cluster_name)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn with_cache(
        client: Client,
        limits: Limits,
        row_builder: Arc<dyn RowBuilder>,
        owners: Arc<dyn WorkloadOwnerResolver>,
        workloads: Arc<dyn ResourceLister>,
        nodes: Arc<dyn ResourceLister>,
        cache: Option<Arc<dyn CacheInvalidator>>,
        permission_checker: Option<Arc<dyn PermissionChecker>>,
        cluster_id: impl Into<String>,
        cluster_name: impl Into<String>,
    ) -> Arc<Self> {
        let cluster_id = cluster_id.into();
        let cluster_name = cluster_name.into();
        let registry = Registry::new(limits);
        let dispatcher = Arc::new(Dispatcher::with_cache(
            Arc::clone(&registry),
            row_builder,
            owners,
            workloads,
            nodes,
            cache,
            cluster_id.clone(),
            cluster_name.clone(),
        ));
        let crd_controller = CrdController::new(client.clone(), Arc::clone(&dispatcher), cluster_id, cluster_name);

        Arc::new(Self { registry, dispatcher, crd_controller, client, permission_checker, tasks: Mutex::new(Vec::new()) })
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    /// Starts one watcher task per built-in kind whose Permission Gate check
    /// passes, plus the Custom-Resource Controller (spec §4.2, §4.7).
    pub fn start(&self) {
        let mut tasks = self.tasks.lock();

        for descriptor in BUILTIN_KINDS {
            if !permitted(self.permission_checker.as_deref(), descriptor) {
                tracing::info!(kind = descriptor.kind, "permission gate suppressed watcher");
                continue;
            }
            let client = self.client.clone();
            let dispatcher = Arc::clone(&self.dispatcher);
            let descriptor = *descriptor;
            tasks.push(tokio::spawn(async move {
                if let Err(err) = watch_builtin_kind(client, descriptor, dispatcher).await {
                    tracing::warn!(kind = descriptor.kind, error = %err, "builtin watcher exited");
                }
            }));
        }

        if permission::domain_permissions(fanout_core::Domain::ClusterCrds)
            .iter()
            .all(|(group, resource)| permitted_tuple(self.permission_checker.as_deref(), group, resource))
        {
            let crd_controller = Arc::clone(&self.crd_controller);
            tasks.push(tokio::spawn(async move {
                if let Err(err) = crd_controller.run().await {
                    tracing::warn!(error = %err, "custom-resource controller exited");
                }
            }));
        } else {
            tracing::info!("permission gate suppressed custom-resource controller");
        }
    }

    /// Aborts every watcher task, including the custom-resource controller
    /// itself and every informer it dynamically spawned (spec §4.7:
    /// "stopping the Manager stops all dynamically managed informers").
    pub fn stop(&self) {
        for task in self.tasks.lock().drain(..) {
            task.abort();
        }
        self.crd_controller.stop_all();
    }
}

async fn watch_builtin_kind(client: Client, descriptor: KindDescriptor, dispatcher: Arc<Dispatcher>) -> Result<()> {
    let gvk = discovery::parse_gvk_key(&descriptor.gvk_key())?;
    let (ar, _namespaced) = discovery::find_api_resource(client.clone(), &gvk).await?;
    let api: Api<DynamicObject> = Api::all_with(client, &ar);
    let stream = watcher::watcher(api, watcher::Config::default());
    futures::pin_mut!(stream);

    tracing::info!(kind = descriptor.kind, "watcher started");
    while let Some(event) = stream.try_next().await? {
        match event {
            Event::Applied(obj) => dispatcher.handle(descriptor.domain, descriptor.kind, false, obj),
            Event::Deleted(obj) => dispatcher.handle(descriptor.domain, descriptor.kind, true, obj),
            Event::Restarted(list) => {
                tracing::debug!(kind = descriptor.kind, count = list.len(), "watch restart");
                for obj in list {
                    dispatcher.handle(descriptor.domain, descriptor.kind, false, obj);
                }
            }
        }
    }
    tracing::warn!(kind = descriptor.kind, "watcher stream ended");
    Ok(())
}
