//! Kubernetes resource watchers.
//!
//! Each watched kind runs its own `kube_runtime::Controller` through the
//! generic `watch_resource()` helper, which turns reconciler results into
//! requeue actions and applies per-resource error backoff.

use crate::error::ControllerError;
use crate::reconcile_helpers::object_key;
use crate::reconciler::Reconciler;
use crate::requeue::Requeue;
use crate::store::ObjectKey;
use crds::{Cluster, MetalStackCluster, MetalStackFirewall};
use futures::StreamExt;
use kube::Api;
use kube_runtime::controller::{Action, Config as ControllerConfig};
use kube_runtime::reflector::ObjectRef;
use kube_runtime::{watcher, Controller};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Events for the same object arriving within this window are coalesced
const DEBOUNCE: Duration = Duration::from_secs(1);

type ReconcileFuture = Pin<Box<dyn Future<Output = Result<Requeue, ControllerError>> + Send>>;

/// Drive `controller` until its watch streams end.
///
/// Successful reconciliations reset the resource's error backoff and requeue
/// according to the returned [`Requeue`]; failures requeue after the next
/// Fibonacci backoff step for that resource.
async fn watch_resource<K, F>(
    controller: Controller<K>,
    reconciler: Arc<Reconciler>,
    reconcile_fn: F,
    resource_name: &'static str,
) -> Result<(), ControllerError>
where
    K: kube::Resource + Clone + Send + Sync + 'static + std::fmt::Debug + serde::de::DeserializeOwned,
    K::DynamicType: Default + std::cmp::Eq + std::hash::Hash + Clone + std::fmt::Debug + Unpin,
    F: Fn(Arc<Reconciler>, ObjectKey) -> ReconcileFuture + Send + Sync + Clone + 'static,
{
    info!("Starting {} watcher", resource_name);

    let error_policy = move |obj: Arc<K>, error: &ControllerError, ctx: Arc<Reconciler>| {
        let resource_key = format!("{}/{}", resource_name, object_key(&*obj));
        ctx.increment_error(&resource_key);
        let (backoff, error_count) = ctx.get_backoff_for_resource(&resource_key);
        warn!(
            "Reconciliation of {} failed ({} consecutive errors), retrying in {:?}: {}",
            resource_key, error_count, backoff, error
        );
        Action::requeue(backoff)
    };

    let reconcile = move |obj: Arc<K>, ctx: Arc<Reconciler>| {
        let reconcile_fn = reconcile_fn.clone();
        async move {
            let key = object_key(&*obj);
            let resource_key = format!("{}/{}", resource_name, key);
            debug!("Reconciling {}", resource_key);

            let requeue = reconcile_fn(ctx.clone(), key).await?;
            ctx.reset_error(&resource_key);
            Ok::<Action, ControllerError>(ctx.delays.action(requeue))
        }
    };

    controller
        .run(reconcile, error_policy, reconciler)
        .for_each(|res| async move {
            match res {
                Ok((obj, _)) => debug!("Reconciled {} {}", resource_name, obj.name),
                Err(e) => error!("Controller error for {}: {}", resource_name, e),
            }
        })
        .await;

    Ok(())
}

/// MetalStackCluster referenced by a Cluster API cluster's `infrastructureRef`
fn infrastructure_ref(cluster: Cluster) -> Option<ObjectRef<MetalStackCluster>> {
    let reference = cluster.spec.infrastructure_ref?;
    if reference.kind.as_deref() != Some("MetalStackCluster") {
        return None;
    }
    let name = reference.name?;
    let namespace = reference.namespace.or(cluster.metadata.namespace)?;
    Some(ObjectRef::new(&name).within(&namespace))
}

/// Watches the MetalStack infrastructure resources.
pub struct Watcher {
    reconciler: Arc<Reconciler>,
    metal_cluster_api: Api<MetalStackCluster>,
    metal_firewall_api: Api<MetalStackFirewall>,
    cluster_api: Api<Cluster>,
    concurrency: u16,
}

impl Watcher {
    /// Creates a new watcher instance.
    pub fn new(
        reconciler: Arc<Reconciler>,
        metal_cluster_api: Api<MetalStackCluster>,
        metal_firewall_api: Api<MetalStackFirewall>,
        cluster_api: Api<Cluster>,
        concurrency: u16,
    ) -> Self {
        Self {
            reconciler,
            metal_cluster_api,
            metal_firewall_api,
            cluster_api,
            concurrency,
        }
    }

    fn controller_config(&self) -> ControllerConfig {
        ControllerConfig::default()
            .debounce(DEBOUNCE)
            .concurrency(self.concurrency)
    }

    /// Starts watching MetalStackCluster resources.
    ///
    /// Changes to the owning Cluster API cluster (pausing, unpausing) also
    /// trigger a reconciliation of its infrastructure object.
    pub async fn watch_metal_clusters(&self) -> Result<(), ControllerError> {
        let controller = Controller::new(self.metal_cluster_api.clone(), watcher::Config::default())
            .with_config(self.controller_config())
            .watches(self.cluster_api.clone(), watcher::Config::default(), infrastructure_ref);

        watch_resource(
            controller,
            self.reconciler.clone(),
            |reconciler, key| Box::pin(async move { reconciler.reconcile_metal_cluster(&key).await }),
            "MetalStackCluster",
        )
        .await
    }

    /// Starts watching MetalStackFirewall resources.
    pub async fn watch_metal_firewalls(&self) -> Result<(), ControllerError> {
        let controller = Controller::new(self.metal_firewall_api.clone(), watcher::Config::default())
            .with_config(self.controller_config());

        watch_resource(
            controller,
            self.reconciler.clone(),
            |reconciler, key| Box::pin(async move { reconciler.reconcile_metal_firewall(&key).await }),
            "MetalStackFirewall",
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crds::ClusterSpec;
    use k8s_openapi::api::core::v1::ObjectReference;

    fn cluster_with_ref(kind: &str, namespace: Option<&str>) -> Cluster {
        let mut cluster = Cluster::new(
            "c1",
            ClusterSpec {
                paused: false,
                infrastructure_ref: Some(ObjectReference {
                    api_version: Some("infrastructure.cluster.x-k8s.io/v1alpha3".to_string()),
                    kind: Some(kind.to_string()),
                    name: Some("c1-infra".to_string()),
                    namespace: namespace.map(str::to_string),
                    ..Default::default()
                }),
            },
        );
        cluster.metadata.namespace = Some("team-a".to_string());
        cluster
    }

    #[test]
    fn test_infrastructure_ref_maps_to_metal_cluster() {
        let reference = infrastructure_ref(cluster_with_ref("MetalStackCluster", None)).unwrap();
        assert_eq!(reference.name, "c1-infra");
        assert_eq!(reference.namespace.as_deref(), Some("team-a"));

        let reference = infrastructure_ref(cluster_with_ref("MetalStackCluster", Some("infra"))).unwrap();
        assert_eq!(reference.namespace.as_deref(), Some("infra"));
    }

    #[test]
    fn test_infrastructure_ref_ignores_other_providers() {
        assert!(infrastructure_ref(cluster_with_ref("AWSCluster", None)).is_none());
        assert!(infrastructure_ref(Cluster::new("c1", ClusterSpec::default())).is_none());
    }
}
