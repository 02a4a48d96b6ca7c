//! MetalStackCluster reconciliation.
//!
//! Forward steps, each re-entered until its latch is set:
//! 1. attach the finalizer
//! 2. allocate the private network
//! 3. allocate the control-plane IP
//! 4. create the firewall
//! 5. mark the cluster ready
//!
//! Teardown runs strictly in order: workload machines, firewall, IPs left in
//! the private network, the network itself, then the finalizer.

use crate::error::{ControllerError, FirewallConfigError};
use crate::patch::{combine, PatchHelper};
use crate::reconcile_helpers::{ensure_finalizer, find_cluster_firewalls, is_being_deleted, remove_finalizer};
use crate::reconciler::Reconciler;
use crate::requeue::Requeue;
use crate::store::ObjectKey;
use crds::{
    is_paused, owner_cluster_name, Cluster, MetalStackCluster, CLUSTER_ID_TAG, DEFAULT_API_SERVER_PORT,
    METAL_STACK_CLUSTER_FINALIZER,
};
use metal_client::{
    FirewallCreateRequest, IpAllocateRequest, IpFindRequest, IpType, MachineAllocationNetwork,
    NetworkAllocateRequest,
};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// `failureReason` recorded for configuration problems
pub const INVALID_CONFIGURATION: &str = "InvalidConfiguration";

/// Why the firewall step did not complete
enum FirewallStepError {
    Config(FirewallConfigError),
    Call(ControllerError),
}

impl Reconciler {
    /// Reconcile the MetalStackCluster identified by `key`
    pub async fn reconcile_metal_cluster(&self, key: &ObjectKey) -> Result<Requeue, ControllerError> {
        let Some(mut cluster) = self.store.get_metal_cluster(key).await? else {
            debug!("MetalStackCluster {} is gone", key);
            return Ok(Requeue::Never);
        };

        let helper = PatchHelper::new(&cluster)?;
        let result = self.reconcile_metal_cluster_steps(key, &mut cluster).await;
        let flushed = match helper.diff(&cluster) {
            Ok(Some(patch)) => self.store.patch_metal_cluster(key, &patch).await,
            Ok(None) => Ok(()),
            Err(e) => Err(e),
        };
        combine(&format!("MetalStackCluster {}", key), result, flushed)
    }

    async fn reconcile_metal_cluster_steps(
        &self,
        key: &ObjectKey,
        cluster: &mut MetalStackCluster,
    ) -> Result<Requeue, ControllerError> {
        let owner = match self.owner_cluster(key, cluster).await {
            Ok(owner) => owner,
            Err(e) => {
                let status = cluster.status_mut();
                status.failure_reason = Some(INVALID_CONFIGURATION.to_string());
                status.failure_message = Some("Unable to get OwnerCluster".to_string());
                return Err(e);
            }
        };
        let Some(owner) = owner else {
            info!("MetalStackCluster {} has no owner Cluster yet", key);
            return Ok(Requeue::WithDelay);
        };
        if is_paused(&owner, &cluster.metadata) {
            info!("Reconciliation of MetalStackCluster {} is paused", key);
            return Ok(Requeue::WithDelay);
        }

        if is_being_deleted(&cluster.metadata) {
            self.delete_metal_cluster(key, cluster, &owner).await
        } else {
            self.apply_metal_cluster(key, cluster).await
        }
    }

    async fn owner_cluster(
        &self,
        key: &ObjectKey,
        cluster: &MetalStackCluster,
    ) -> Result<Option<Cluster>, ControllerError> {
        let Some(name) = owner_cluster_name(&cluster.metadata) else {
            return Ok(None);
        };
        self.store
            .get_cluster(&ObjectKey::new(key.namespace.clone(), name))
            .await
    }

    async fn apply_metal_cluster(
        &self,
        key: &ObjectKey,
        cluster: &mut MetalStackCluster,
    ) -> Result<Requeue, ControllerError> {
        ensure_finalizer(&mut cluster.metadata, METAL_STACK_CLUSTER_FINALIZER);

        if cluster.spec.private_network_id.is_none() {
            match self.allocate_private_network(key, cluster).await {
                Ok(id) => {
                    info!("Allocated private network {} for MetalStackCluster {}", id, key);
                    cluster.spec.private_network_id = Some(id);
                }
                Err(e) => warn!("Failed to allocate private network for MetalStackCluster {}: {}", key, e),
            }
            return Ok(Requeue::WithDelay);
        }

        if !cluster.control_plane_ip_allocated() {
            match self.allocate_control_plane_ip(cluster).await {
                Ok(address) => {
                    info!("Allocated control-plane IP {} for MetalStackCluster {}", address, key);
                    let endpoint = &mut cluster.spec.control_plane_endpoint;
                    if endpoint.is_unset() {
                        endpoint.host = address;
                    }
                    if endpoint.port == 0 {
                        endpoint.port = DEFAULT_API_SERVER_PORT;
                    }
                    cluster.status_mut().control_plane_ip_allocated = true;
                }
                Err(e) => warn!("Failed to allocate control-plane IP for MetalStackCluster {}: {}", key, e),
            }
            return Ok(Requeue::Instantly);
        }

        if !cluster.firewall_ready() {
            match self.create_cluster_firewall(cluster).await {
                Ok(machine_id) => {
                    info!("Created firewall {} for MetalStackCluster {}", machine_id, key);
                    let status = cluster.status_mut();
                    status.firewall_ready = true;
                    status.failure_reason = None;
                    status.failure_message = None;
                }
                Err(FirewallStepError::Config(e)) => {
                    warn!("MetalStackCluster {} firewall is misconfigured: {}", key, e);
                    let status = cluster.status_mut();
                    status.failure_reason = Some(INVALID_CONFIGURATION.to_string());
                    status.failure_message = Some(e.to_string());
                    return Ok(Requeue::WithDelay);
                }
                Err(FirewallStepError::Call(e)) => {
                    warn!("Failed to create firewall for MetalStackCluster {}: {}", key, e);
                    return Ok(Requeue::WithDelay);
                }
            }
        }

        if !cluster.ready() {
            info!("MetalStackCluster {} is ready", key);
            cluster.status_mut().ready = true;
        }
        Ok(Requeue::Never)
    }

    async fn allocate_private_network(
        &self,
        key: &ObjectKey,
        cluster: &MetalStackCluster,
    ) -> Result<String, ControllerError> {
        let name = key.name.clone();
        let request = NetworkAllocateRequest {
            name: Some(name.clone()),
            description: Some(name.clone()),
            projectid: cluster.spec.project_id.clone(),
            partitionid: cluster.spec.partition.clone(),
            labels: BTreeMap::from([(CLUSTER_ID_TAG.to_string(), name)]),
        };
        let network = self.metal_client.allocate_network(request).await?;
        Ok(network.id)
    }

    /// Network used for the control-plane IP and firewall uplinks of `cluster`
    pub(crate) fn public_network_for(&self, cluster: &MetalStackCluster) -> String {
        cluster
            .spec
            .public_network_id
            .clone()
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| self.public_network_id.clone())
    }

    async fn allocate_control_plane_ip(&self, cluster: &MetalStackCluster) -> Result<String, ControllerError> {
        let name = cluster.metadata.name.clone().unwrap_or_default();
        let endpoint = &cluster.spec.control_plane_endpoint;
        let request = IpAllocateRequest {
            name: Some(format!("{}-api-server-ip", name)),
            description: Some(format!("control plane endpoint of cluster {}", name)),
            networkid: self.public_network_for(cluster),
            projectid: cluster.spec.project_id.clone(),
            ipaddress: (!endpoint.is_unset()).then(|| endpoint.host.clone()),
            ip_type: IpType::Static,
            tags: vec![cluster.cluster_id_tag()],
        };
        let ip = self.metal_client.allocate_ip(request).await?;
        Ok(ip.ipaddress)
    }

    /// Create the firewall and bind its identity. Returns the machine ID.
    async fn create_cluster_firewall(&self, cluster: &mut MetalStackCluster) -> Result<String, FirewallStepError> {
        let request = firewall_request(cluster).map_err(FirewallStepError::Config)?;
        let firewall = self
            .metal_client
            .create_firewall(request)
            .await
            .map_err(|e| FirewallStepError::Call(e.into()))?;

        let spec = &mut cluster.spec.firewall;
        if matches!(spec.parsed_provider_id(), Ok(None)) {
            spec.provider_id = Some(crds::ProviderId::new(firewall.id.clone()).to_string());
        }
        Ok(firewall.id)
    }

    async fn delete_metal_cluster(
        &self,
        key: &ObjectKey,
        cluster: &mut MetalStackCluster,
        owner: &Cluster,
    ) -> Result<Requeue, ControllerError> {
        // Workload machines carry the Cluster API cluster name, not ours
        let owner_name = owner.metadata.name.as_deref().unwrap_or(&key.name);
        let machines = self.store.count_machines(&key.namespace, owner_name).await?;
        if machines > 0 {
            info!("Deleting {} machines of Cluster {} for MetalStackCluster {}", machines, owner_name, key);
            self.store.delete_machines(&key.namespace, owner_name).await?;
            return Ok(Requeue::WithSmallDelay);
        }

        if let Some(provider_id) = cluster.spec.firewall.parsed_provider_id()? {
            let firewalls = find_cluster_firewalls(
                self.metal_client.as_ref(),
                provider_id.machine_id(),
                &cluster.spec.project_id,
                &cluster.cluster_id_tag(),
            )
            .await?;
            if !firewalls.is_empty() {
                info!("Deleting firewall {} of MetalStackCluster {}", provider_id, key);
                self.metal_client.delete_machine(provider_id.machine_id()).await?;
                return Ok(Requeue::WithSmallDelay);
            }
        }

        if let Some(network_id) = cluster.spec.private_network_id.clone() {
            let ips = self
                .metal_client
                .list_ips(IpFindRequest {
                    projectid: Some(cluster.spec.project_id.clone()),
                    networkid: Some(network_id.clone()),
                    tags: Vec::new(),
                })
                .await?;
            if !ips.is_empty() {
                debug!("Private network {} still holds {} IPs", network_id, ips.len());
                return Ok(Requeue::WithSmallDelay);
            }

            match self.metal_client.free_network(&network_id).await {
                Ok(()) => info!("Freed private network {} of MetalStackCluster {}", network_id, key),
                Err(e) if e.is_not_found() => debug!("Private network {} is already gone", network_id),
                Err(e) => return Err(e.into()),
            }
        }

        remove_finalizer(&mut cluster.metadata, METAL_STACK_CLUSTER_FINALIZER);
        Ok(Requeue::Never)
    }
}

/// Firewall allocation request for `cluster`
fn firewall_request(cluster: &MetalStackCluster) -> Result<FirewallCreateRequest, FirewallConfigError> {
    let firewall = &cluster.spec.firewall;
    let default_network = firewall
        .default_network_id
        .clone()
        .ok_or(FirewallConfigError::MissingDefaultNetwork)?;
    let image = firewall.image.clone().ok_or(FirewallConfigError::MissingImage)?;
    let size = firewall.size.clone().ok_or(FirewallConfigError::MissingSize)?;
    let provider_id = firewall
        .parsed_provider_id()
        .map_err(FirewallConfigError::InvalidProviderId)?;
    let private_network = cluster
        .spec
        .private_network_id
        .clone()
        .ok_or(FirewallConfigError::MissingPrivateNetwork)?;

    let hostname = format!("{}-firewall", cluster.metadata.name.as_deref().unwrap_or_default());
    Ok(FirewallCreateRequest {
        uuid: provider_id.map(|id| id.machine_id().to_string()),
        name: hostname.clone(),
        description: String::new(),
        hostname,
        sizeid: size,
        projectid: cluster.spec.project_id.clone(),
        partitionid: cluster.spec.partition.clone(),
        imageid: image,
        ssh_pub_keys: firewall.ssh_keys.clone(),
        networks: vec![
            MachineAllocationNetwork::auto(default_network),
            MachineAllocationNetwork::auto(private_network),
        ],
        user_data: String::new(),
        tags: vec![cluster.cluster_id_tag()],
    })
}
