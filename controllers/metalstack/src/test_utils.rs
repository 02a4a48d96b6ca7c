//! Test utilities for unit testing reconcilers
//!
//! `InMemoryStore` stands in for the Kubernetes API: it applies merge-patches
//! to stored objects the way the API server would and records them, so tests
//! can assert on exactly what a reconciliation wrote.

use crate::bootstrap::BootstrapSource;
use crate::error::ControllerError;
use crate::patch::{apply_merge_patch, MergePatch};
use crate::reconciler::Reconciler;
use crate::store::{ObjectKey, StateStore};
use crds::*;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference, Time};
use metal_client::{Machine, MachineAllocation, MockMetalClient};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

pub const NAMESPACE: &str = "default";
pub const PROJECT: &str = "proj1";
pub const PARTITION: &str = "fra-equ01";
pub const PUBLIC_NETWORK: &str = "internet";

#[derive(Default)]
struct StoreState {
    metal_clusters: HashMap<ObjectKey, MetalStackCluster>,
    metal_firewalls: HashMap<ObjectKey, MetalStackFirewall>,
    clusters: HashMap<ObjectKey, Cluster>,
    machines: HashMap<(String, String), usize>,
    patches: Vec<(ObjectKey, MergePatch)>,
    delete_machines_calls: usize,
    fail_cluster_lookup: bool,
    fail_patches: bool,
}

/// In-memory `StateStore`; clones share state
#[derive(Clone, Default)]
pub struct InMemoryStore {
    state: Arc<Mutex<StoreState>>,
}

impl InMemoryStore {
    pub fn insert_metal_cluster(&self, cluster: MetalStackCluster) {
        let key = key_of(&cluster.metadata);
        self.state.lock().unwrap().metal_clusters.insert(key, cluster);
    }

    pub fn insert_metal_firewall(&self, firewall: MetalStackFirewall) {
        let key = key_of(&firewall.metadata);
        self.state.lock().unwrap().metal_firewalls.insert(key, firewall);
    }

    pub fn insert_cluster(&self, cluster: Cluster) {
        let key = key_of(&cluster.metadata);
        self.state.lock().unwrap().clusters.insert(key, cluster);
    }

    pub fn set_machines(&self, cluster: &str, count: usize) {
        self.state
            .lock()
            .unwrap()
            .machines
            .insert((NAMESPACE.to_string(), cluster.to_string()), count);
    }

    pub fn machines(&self, cluster: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .machines
            .get(&(NAMESPACE.to_string(), cluster.to_string()))
            .copied()
            .unwrap_or_default()
    }

    pub fn metal_cluster(&self, name: &str) -> Option<MetalStackCluster> {
        self.state.lock().unwrap().metal_clusters.get(&key(name)).cloned()
    }

    pub fn metal_firewall(&self, name: &str) -> Option<MetalStackFirewall> {
        self.state.lock().unwrap().metal_firewalls.get(&key(name)).cloned()
    }

    pub fn patches(&self) -> Vec<(ObjectKey, MergePatch)> {
        self.state.lock().unwrap().patches.clone()
    }

    pub fn delete_machines_calls(&self) -> usize {
        self.state.lock().unwrap().delete_machines_calls
    }

    pub fn fail_cluster_lookup(&self) {
        self.state.lock().unwrap().fail_cluster_lookup = true;
    }

    pub fn fail_patches(&self) {
        self.state.lock().unwrap().fail_patches = true;
    }
}

fn key_of(meta: &ObjectMeta) -> ObjectKey {
    ObjectKey::new(
        meta.namespace.clone().unwrap_or_else(|| NAMESPACE.to_string()),
        meta.name.clone().unwrap_or_default(),
    )
}

pub fn key(name: &str) -> ObjectKey {
    ObjectKey::new(NAMESPACE, name)
}

/// Apply `patch` to `obj` the way the API server would
fn patched<K: Serialize + DeserializeOwned>(obj: &K, patch: &MergePatch) -> K {
    let mut value = serde_json::to_value(obj).unwrap();
    if let Some(status) = &patch.status {
        apply_merge_patch(&mut value, &serde_json::json!({ "status": status }));
    }
    if let Some(body) = &patch.body {
        apply_merge_patch(&mut value, body);
    }
    serde_json::from_value(value).unwrap()
}

/// Deleting objects without finalizers disappear
fn is_released(meta: &ObjectMeta) -> bool {
    meta.deletion_timestamp.is_some() && meta.finalizers.as_ref().is_none_or(Vec::is_empty)
}

fn store_error(what: &str) -> ControllerError {
    ControllerError::Store(format!("injected failure: {}", what))
}

#[async_trait::async_trait]
impl StateStore for InMemoryStore {
    async fn get_metal_cluster(&self, key: &ObjectKey) -> Result<Option<MetalStackCluster>, ControllerError> {
        Ok(self.state.lock().unwrap().metal_clusters.get(key).cloned())
    }

    async fn get_metal_firewall(&self, key: &ObjectKey) -> Result<Option<MetalStackFirewall>, ControllerError> {
        Ok(self.state.lock().unwrap().metal_firewalls.get(key).cloned())
    }

    async fn get_cluster(&self, key: &ObjectKey) -> Result<Option<Cluster>, ControllerError> {
        let state = self.state.lock().unwrap();
        if state.fail_cluster_lookup {
            return Err(store_error("get Cluster"));
        }
        Ok(state.clusters.get(key).cloned())
    }

    async fn patch_metal_cluster(&self, key: &ObjectKey, patch: &MergePatch) -> Result<(), ControllerError> {
        let mut state = self.state.lock().unwrap();
        if state.fail_patches {
            return Err(store_error("patch MetalStackCluster"));
        }
        state.patches.push((key.clone(), patch.clone()));
        let Some(current) = state.metal_clusters.get(key) else {
            return Err(store_error("MetalStackCluster not found"));
        };
        let updated = patched(current, patch);
        if is_released(&updated.metadata) {
            state.metal_clusters.remove(key);
        } else {
            state.metal_clusters.insert(key.clone(), updated);
        }
        Ok(())
    }

    async fn patch_metal_firewall(&self, key: &ObjectKey, patch: &MergePatch) -> Result<(), ControllerError> {
        let mut state = self.state.lock().unwrap();
        if state.fail_patches {
            return Err(store_error("patch MetalStackFirewall"));
        }
        state.patches.push((key.clone(), patch.clone()));
        let Some(current) = state.metal_firewalls.get(key) else {
            return Err(store_error("MetalStackFirewall not found"));
        };
        let updated = patched(current, patch);
        if is_released(&updated.metadata) {
            state.metal_firewalls.remove(key);
        } else {
            state.metal_firewalls.insert(key.clone(), updated);
        }
        Ok(())
    }

    async fn count_machines(&self, namespace: &str, cluster: &str) -> Result<usize, ControllerError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .machines
            .get(&(namespace.to_string(), cluster.to_string()))
            .copied()
            .unwrap_or_default())
    }

    async fn delete_machines(&self, namespace: &str, cluster: &str) -> Result<(), ControllerError> {
        let mut state = self.state.lock().unwrap();
        state.delete_machines_calls += 1;
        state.machines.remove(&(namespace.to_string(), cluster.to_string()));
        Ok(())
    }
}

/// Bootstrap source returning fixed user data
pub struct StaticBootstrap(pub Option<String>);

#[async_trait::async_trait]
impl BootstrapSource for StaticBootstrap {
    async fn firewall_user_data(&self, _cluster: &MetalStackCluster) -> Result<Option<String>, ControllerError> {
        Ok(self.0.clone())
    }
}

/// Reconciler over `client` and `store` with bootstrap data available
pub fn test_reconciler(client: MockMetalClient, store: InMemoryStore) -> (Reconciler, InMemoryStore) {
    test_reconciler_with_bootstrap(client, store, Some("{\"ignition\":{}}"))
}

pub fn test_reconciler_with_bootstrap(
    client: MockMetalClient,
    store: InMemoryStore,
    user_data: Option<&str>,
) -> (Reconciler, InMemoryStore) {
    let reconciler = Reconciler::new(
        client,
        store.clone(),
        StaticBootstrap(user_data.map(str::to_string)),
        PUBLIC_NETWORK,
    );
    (reconciler, store)
}

/// Cluster API `Cluster` named `name`
pub fn capi_cluster(name: &str) -> Cluster {
    let mut cluster = Cluster::new(name, ClusterSpec::default());
    cluster.metadata.namespace = Some(NAMESPACE.to_string());
    cluster
}

/// MetalStackCluster owned by the Cluster API cluster of the same name, fully configured
pub fn metal_cluster(name: &str) -> MetalStackCluster {
    let mut cluster = MetalStackCluster::new(
        name,
        MetalStackClusterSpec {
            partition: Some(PARTITION.to_string()),
            project_id: PROJECT.to_string(),
            firewall: FirewallSpec {
                default_network_id: Some(PUBLIC_NETWORK.to_string()),
                image: Some("firewall-ubuntu-2.0".to_string()),
                size: Some("c1-xlarge-x86".to_string()),
                ssh_keys: vec!["ssh-ed25519 AAAA test".to_string()],
                provider_id: None,
            },
            ..Default::default()
        },
    );
    cluster.metadata.namespace = Some(NAMESPACE.to_string());
    cluster.metadata.owner_references = Some(vec![OwnerReference {
        api_version: "cluster.x-k8s.io/v1beta1".to_string(),
        kind: "Cluster".to_string(),
        name: name.to_string(),
        uid: format!("uid-{}", name),
        ..Default::default()
    }]);
    cluster
}

/// MetalStackCluster that already went through every forward step
pub fn provisioned_metal_cluster(name: &str, firewall_id: &str) -> MetalStackCluster {
    let mut cluster = metal_cluster(name);
    cluster.metadata.finalizers = Some(vec![METAL_STACK_CLUSTER_FINALIZER.to_string()]);
    cluster.spec.private_network_id = Some(format!("{}-net", name));
    cluster.spec.control_plane_endpoint = ApiEndpoint {
        host: "203.0.113.10".to_string(),
        port: DEFAULT_API_SERVER_PORT,
    };
    cluster.spec.firewall.provider_id = Some(format!("{}{}", PROVIDER_ID_PREFIX, firewall_id));
    *cluster.status_mut() = MetalStackClusterStatus {
        ready: true,
        firewall_ready: true,
        control_plane_ip_allocated: true,
        ..Default::default()
    };
    cluster
}

/// MetalStackFirewall labelled with `cluster`
pub fn metal_firewall(name: &str, cluster: &str) -> MetalStackFirewall {
    let mut firewall = MetalStackFirewall::new(
        name,
        MetalStackFirewallSpec {
            provider_id: None,
            machine_type: "c1-xlarge-x86".to_string(),
            image: "firewall-ubuntu-2.0".to_string(),
            ssh_keys: Vec::new(),
        },
    );
    firewall.metadata.namespace = Some(NAMESPACE.to_string());
    firewall.metadata.labels = Some(BTreeMap::from([(
        CLUSTER_NAME_LABEL.to_string(),
        cluster.to_string(),
    )]));
    firewall
}

/// Mark an object as being deleted
pub fn mark_deleted(meta: &mut ObjectMeta) {
    let timestamp: Time = serde_json::from_value(serde_json::json!("2024-01-01T00:00:00Z")).unwrap();
    meta.deletion_timestamp = Some(timestamp);
}

/// Register a firewall machine in the mock metal-api
pub fn add_firewall_machine(client: &MockMetalClient, id: &str, project: &str, tag: &str, allocated: bool) {
    client.add_machine(Machine {
        id: id.to_string(),
        allocation: allocated.then(|| MachineAllocation {
            name: format!("{}-firewall", id),
            hostname: format!("{}-firewall", id),
            project: project.to_string(),
            role: Some("firewall".to_string()),
            ..Default::default()
        }),
        tags: vec![tag.to_string()],
    });
}
