//! MetalStackFirewall reconciliation.
//!
//! The firewall resource names its cluster through the
//! `cluster.x-k8s.io/cluster-name` label. Once a create request has been
//! accepted (`status.machineCreated`) the reconciler only polls the
//! allocation; it never allocates a second machine for the same firewall.

use crate::error::ControllerError;
use crate::patch::{combine, PatchHelper};
use crate::reconcile_helpers::{ensure_finalizer, find_cluster_firewalls, is_being_deleted, remove_finalizer};
use crate::reconciler::Reconciler;
use crate::requeue::Requeue;
use crate::store::ObjectKey;
use crds::{MetalStackCluster, MetalStackFirewall, ProviderId, METAL_STACK_FIREWALL_FINALIZER};
use metal_client::{FirewallCreateRequest, MachineAllocationNetwork};
use tracing::{debug, info, warn};

impl Reconciler {
    /// Reconcile the MetalStackFirewall identified by `key`
    pub async fn reconcile_metal_firewall(&self, key: &ObjectKey) -> Result<Requeue, ControllerError> {
        let Some(mut firewall) = self.store.get_metal_firewall(key).await? else {
            debug!("MetalStackFirewall {} is gone", key);
            return Ok(Requeue::Never);
        };
        let Some(cluster) = self.resolve_owning_cluster(key, &firewall).await? else {
            info!("MetalStackFirewall {} has no MetalStackCluster yet", key);
            return Ok(Requeue::Instantly);
        };

        let helper = PatchHelper::new(&firewall)?;
        let result = if is_being_deleted(&firewall.metadata) {
            self.delete_metal_firewall(key, &mut firewall, &cluster).await
        } else {
            self.apply_metal_firewall(key, &mut firewall, &cluster).await
        };
        let flushed = match helper.diff(&firewall) {
            Ok(Some(patch)) => self.store.patch_metal_firewall(key, &patch).await,
            Ok(None) => Ok(()),
            Err(e) => Err(e),
        };
        combine(&format!("MetalStackFirewall {}", key), result, flushed)
    }

    /// MetalStackCluster named by the firewall's cluster label, in the same namespace
    pub async fn resolve_owning_cluster(
        &self,
        key: &ObjectKey,
        firewall: &MetalStackFirewall,
    ) -> Result<Option<MetalStackCluster>, ControllerError> {
        let Some(name) = firewall.cluster_name() else {
            return Ok(None);
        };
        self.store
            .get_metal_cluster(&ObjectKey::new(key.namespace.clone(), name))
            .await
    }

    async fn apply_metal_firewall(
        &self,
        key: &ObjectKey,
        firewall: &mut MetalStackFirewall,
        cluster: &MetalStackCluster,
    ) -> Result<Requeue, ControllerError> {
        ensure_finalizer(&mut firewall.metadata, METAL_STACK_FIREWALL_FINALIZER);

        let provider_id = firewall.spec.parsed_provider_id()?;
        if let Some(id) = &provider_id {
            let machine = self.metal_client.find_machine(id.machine_id()).await?;
            if machine.is_some_and(|m| m.allocation.is_some()) {
                let allocation = self.metal_client.find_firewall_allocation(id.machine_id()).await?;
                let succeeded = allocation.is_some_and(|a| a.succeeded);
                let status = firewall.status_mut();
                status.ready = status.ready || succeeded;
                if succeeded {
                    return Ok(Requeue::Never);
                }
                debug!("Firewall {} of MetalStackFirewall {} is still provisioning", id, key);
                return Ok(Requeue::WithSmallDelay);
            }
            if firewall.machine_created() {
                debug!("Waiting for the allocation of firewall {} of MetalStackFirewall {}", id, key);
                return Ok(Requeue::WithSmallDelay);
            }
        }

        let Some(user_data) = self.bootstrap.firewall_user_data(cluster).await? else {
            info!("No bootstrap data for MetalStackFirewall {} yet", key);
            return Ok(Requeue::WithDelay);
        };
        let Some(private_network) = cluster.spec.private_network_id.clone() else {
            info!("MetalStackCluster of MetalStackFirewall {} has no private network yet", key);
            return Ok(Requeue::WithDelay);
        };

        let name = key.name.clone();
        let hostname = format!("{}-firewall", name);
        let request = FirewallCreateRequest {
            uuid: provider_id.as_ref().map(|id| id.machine_id().to_string()),
            name,
            description: String::new(),
            hostname,
            sizeid: firewall.spec.machine_type.clone(),
            projectid: cluster.spec.project_id.clone(),
            partitionid: cluster.spec.partition.clone(),
            imageid: firewall.spec.image.clone(),
            ssh_pub_keys: firewall.spec.ssh_keys.clone(),
            networks: vec![
                MachineAllocationNetwork::auto(self.public_network_for(cluster)),
                MachineAllocationNetwork::auto(private_network),
            ],
            user_data,
            tags: vec![cluster.cluster_id_tag()],
        };
        let created = self.metal_client.create_firewall(request).await?;
        info!("Created firewall machine {} for MetalStackFirewall {}", created.id, key);

        if firewall.spec.provider_id.is_none() {
            firewall.spec.provider_id = Some(ProviderId::new(created.id).to_string());
        }
        firewall.status_mut().machine_created = true;
        Ok(Requeue::WithSmallDelay)
    }

    async fn delete_metal_firewall(
        &self,
        key: &ObjectKey,
        firewall: &mut MetalStackFirewall,
        cluster: &MetalStackCluster,
    ) -> Result<Requeue, ControllerError> {
        if let Some(id) = firewall.spec.parsed_provider_id()? {
            let found = find_cluster_firewalls(
                self.metal_client.as_ref(),
                id.machine_id(),
                &cluster.spec.project_id,
                &cluster.cluster_id_tag(),
            )
            .await?;
            match found.len() {
                0 => debug!("Firewall {} of MetalStackFirewall {} is already gone", id, key),
                1 => {
                    info!("Deleting firewall machine {} of MetalStackFirewall {}", id, key);
                    self.metal_client.delete_machine(id.machine_id()).await?;
                }
                n => warn!("{} firewalls match {}, not deleting any", n, id),
            }
        }

        remove_finalizer(&mut firewall.metadata, METAL_STACK_FIREWALL_FINALIZER);
        Ok(Requeue::Never)
    }
}
