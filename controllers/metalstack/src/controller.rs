//! Main controller implementation.
//!
//! This module contains the `Controller` struct that wires the metal-api
//! client, the Kubernetes-backed state store and the watchers together for
//! the MetalStack infrastructure controller.

use crate::bootstrap::KubeconfigBootstrap;
use crate::config::Config;
use crate::error::ControllerError;
use crate::reconciler::Reconciler;
use crate::store::KubeStore;
use crate::watcher::Watcher;
use crds::{Cluster, MetalStackCluster, MetalStackFirewall};
use kube::{Api, Client, Resource};
use metal_client::MetalClient;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Main controller for MetalStack infrastructure resources.
pub struct Controller {
    metal_cluster_watcher: JoinHandle<Result<(), ControllerError>>,
    metal_firewall_watcher: JoinHandle<Result<(), ControllerError>>,
}

/// Api scoped to `namespace`, or cluster-wide when unset
fn scoped_api<K>(client: Client, namespace: Option<&str>) -> Api<K>
where
    K: Resource<Scope = kube::core::NamespaceResourceScope> + Clone + DeserializeOwned + std::fmt::Debug,
    K::DynamicType: Default,
{
    match namespace {
        Some(ns) => Api::namespaced(client, ns),
        None => Api::all(client),
    }
}

impl Controller {
    /// Creates a new controller instance and starts its watchers.
    pub async fn new(config: Config) -> Result<Self, ControllerError> {
        info!("Initializing MetalStack Controller");

        let kube_client = Client::try_default().await?;

        let metal_client = MetalClient::new(config.metal_api_url.clone(), config.metal_api_token.clone())?;

        // Validate token and connectivity before proceeding
        info!("Validating metal-api token and connectivity...");
        metal_client.validate_token().await.map_err(|e| {
            error!("Failed to validate metal-api token: {}", e);
            error!("Please ensure:");
            error!("  1. METAL_API_TOKEN environment variable is set correctly");
            error!("  2. metal-api is reachable at {}", config.metal_api_url);
            ControllerError::Metal(e)
        })?;
        info!("metal-api token validated and connectivity established");

        let ns = config.namespace.as_deref();
        let metal_cluster_api: Api<MetalStackCluster> = scoped_api(kube_client.clone(), ns);
        let metal_firewall_api: Api<MetalStackFirewall> = scoped_api(kube_client.clone(), ns);
        let cluster_api: Api<Cluster> = scoped_api(kube_client.clone(), ns);

        let reconciler = Reconciler::new(
            metal_client,
            KubeStore::new(kube_client.clone()),
            KubeconfigBootstrap::new(kube_client),
            config.public_network_id.clone(),
        )
        .with_delays(config.delays)
        .with_error_backoff(config.error_backoff_min_seconds, config.error_backoff_max_seconds);

        let watcher_instance = Arc::new(Watcher::new(
            Arc::new(reconciler),
            metal_cluster_api,
            metal_firewall_api,
            cluster_api,
            config.concurrency,
        ));

        let metal_cluster_watcher = {
            let watcher = watcher_instance.clone();
            tokio::spawn(async move { watcher.watch_metal_clusters().await })
        };

        let metal_firewall_watcher = {
            let watcher = watcher_instance;
            tokio::spawn(async move { watcher.watch_metal_firewalls().await })
        };

        Ok(Self {
            metal_cluster_watcher,
            metal_firewall_watcher,
        })
    }

    /// Runs the controller until shutdown.
    pub async fn run(mut self) -> Result<(), ControllerError> {
        info!("MetalStack Controller running");

        // Wait for either watcher to exit (they should run forever)
        tokio::select! {
            result = &mut self.metal_cluster_watcher => {
                result.map_err(|e| ControllerError::Watch(format!("MetalStackCluster watcher panicked: {}", e)))??;
            }
            result = &mut self.metal_firewall_watcher => {
                result.map_err(|e| ControllerError::Watch(format!("MetalStackFirewall watcher panicked: {}", e)))??;
            }
        }

        Ok(())
    }
}
