//! Desired-state store.
//!
//! The reconcilers read and patch Kubernetes objects only through
//! [`StateStore`]; [`KubeStore`] is the production implementation.

use crate::error::ControllerError;
use crate::patch::MergePatch;
use crds::{Cluster, Machine, MetalStackCluster, MetalStackFirewall, CLUSTER_NAME_LABEL};
use kube::api::{DeleteParams, ListParams, Patch, PatchParams};
use kube::{Api, Client};
use serde::de::DeserializeOwned;
use std::fmt;
use tracing::debug;

/// Namespace and name of an object
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectKey {
    pub namespace: String,
    pub name: String,
}

impl ObjectKey {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Read and patch access to the objects the reconcilers work on
#[async_trait::async_trait]
pub trait StateStore: Send + Sync {
    async fn get_metal_cluster(&self, key: &ObjectKey) -> Result<Option<MetalStackCluster>, ControllerError>;
    async fn get_metal_firewall(&self, key: &ObjectKey) -> Result<Option<MetalStackFirewall>, ControllerError>;
    async fn get_cluster(&self, key: &ObjectKey) -> Result<Option<Cluster>, ControllerError>;

    async fn patch_metal_cluster(&self, key: &ObjectKey, patch: &MergePatch) -> Result<(), ControllerError>;
    async fn patch_metal_firewall(&self, key: &ObjectKey, patch: &MergePatch) -> Result<(), ControllerError>;

    /// Number of Cluster API machines labelled with `cluster`
    async fn count_machines(&self, namespace: &str, cluster: &str) -> Result<usize, ControllerError>;
    /// Delete every Cluster API machine labelled with `cluster`
    async fn delete_machines(&self, namespace: &str, cluster: &str) -> Result<(), ControllerError>;
}

/// `StateStore` backed by the Kubernetes API
#[derive(Clone)]
pub struct KubeStore {
    client: Client,
}

impl KubeStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn api<K>(&self, namespace: &str) -> Api<K>
    where
        K: kube::Resource<Scope = kube::core::NamespaceResourceScope>,
        K::DynamicType: Default,
    {
        Api::namespaced(self.client.clone(), namespace)
    }

    async fn get<K>(&self, key: &ObjectKey) -> Result<Option<K>, ControllerError>
    where
        K: kube::Resource<Scope = kube::core::NamespaceResourceScope> + Clone + DeserializeOwned + fmt::Debug,
        K::DynamicType: Default,
    {
        Ok(self.api::<K>(&key.namespace).get_opt(&key.name).await?)
    }

    async fn patch<K>(&self, key: &ObjectKey, patch: &MergePatch) -> Result<(), ControllerError>
    where
        K: kube::Resource<Scope = kube::core::NamespaceResourceScope> + Clone + DeserializeOwned + fmt::Debug,
        K::DynamicType: Default,
    {
        let api = self.api::<K>(&key.namespace);
        let params = PatchParams::default();

        // Status goes first: the body patch may drop the last finalizer
        if let Some(status) = &patch.status {
            debug!("Patching status of {}", key);
            api.patch_status(&key.name, &params, &Patch::Merge(serde_json::json!({ "status": status })))
                .await?;
        }
        if let Some(body) = &patch.body {
            debug!("Patching {}", key);
            api.patch(&key.name, &params, &Patch::Merge(body)).await?;
        }
        Ok(())
    }

    fn machine_selector(cluster: &str) -> ListParams {
        ListParams::default().labels(&format!("{}={}", CLUSTER_NAME_LABEL, cluster))
    }
}

#[async_trait::async_trait]
impl StateStore for KubeStore {
    async fn get_metal_cluster(&self, key: &ObjectKey) -> Result<Option<MetalStackCluster>, ControllerError> {
        self.get(key).await
    }

    async fn get_metal_firewall(&self, key: &ObjectKey) -> Result<Option<MetalStackFirewall>, ControllerError> {
        self.get(key).await
    }

    async fn get_cluster(&self, key: &ObjectKey) -> Result<Option<Cluster>, ControllerError> {
        self.get(key).await
    }

    async fn patch_metal_cluster(&self, key: &ObjectKey, patch: &MergePatch) -> Result<(), ControllerError> {
        self.patch::<MetalStackCluster>(key, patch).await
    }

    async fn patch_metal_firewall(&self, key: &ObjectKey, patch: &MergePatch) -> Result<(), ControllerError> {
        self.patch::<MetalStackFirewall>(key, patch).await
    }

    async fn count_machines(&self, namespace: &str, cluster: &str) -> Result<usize, ControllerError> {
        let machines = self
            .api::<Machine>(namespace)
            .list(&Self::machine_selector(cluster))
            .await?;
        Ok(machines.items.len())
    }

    async fn delete_machines(&self, namespace: &str, cluster: &str) -> Result<(), ControllerError> {
        self.api::<Machine>(namespace)
            .delete_collection(&DeleteParams::default(), &Self::machine_selector(cluster))
            .await?;
        Ok(())
    }
}
