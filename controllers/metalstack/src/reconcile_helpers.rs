//! Helpers shared by the MetalStackCluster and MetalStackFirewall reconcilers.

use crate::store::ObjectKey;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::Resource;
use metal_client::{Firewall, FirewallFindRequest, MetalClientTrait, MetalError};

/// Key of a namespaced object
pub fn object_key<K: Resource>(obj: &K) -> ObjectKey {
    let meta = obj.meta();
    ObjectKey::new(
        meta.namespace.clone().unwrap_or_else(|| "default".to_string()),
        meta.name.clone().unwrap_or_default(),
    )
}

/// The object has a deletion timestamp
pub fn is_being_deleted(meta: &ObjectMeta) -> bool {
    meta.deletion_timestamp.is_some()
}

pub fn has_finalizer(meta: &ObjectMeta, finalizer: &str) -> bool {
    meta.finalizers
        .as_ref()
        .is_some_and(|f| f.iter().any(|existing| existing == finalizer))
}

/// Add `finalizer` unless present. Returns whether the object changed.
pub fn ensure_finalizer(meta: &mut ObjectMeta, finalizer: &str) -> bool {
    if has_finalizer(meta, finalizer) {
        return false;
    }
    meta.finalizers
        .get_or_insert_with(Vec::new)
        .push(finalizer.to_string());
    true
}

/// Remove `finalizer` if present. Returns whether the object changed.
pub fn remove_finalizer(meta: &mut ObjectMeta, finalizer: &str) -> bool {
    let Some(finalizers) = meta.finalizers.as_mut() else {
        return false;
    };
    let before = finalizers.len();
    finalizers.retain(|existing| existing != finalizer);
    before != finalizers.len()
}

/// Firewalls with machine ID `id` in `project` carrying the cluster tag
pub async fn find_cluster_firewalls(
    client: &dyn MetalClientTrait,
    id: &str,
    project: &str,
    cluster_tag: &str,
) -> Result<Vec<Firewall>, MetalError> {
    client
        .find_firewalls(FirewallFindRequest {
            id: Some(id.to_string()),
            allocation_project: Some(project.to_string()),
            tags: vec![cluster_tag.to_string()],
        })
        .await
}

#[cfg(test)]
#[path = "reconcile_helpers_test.rs"]
mod reconcile_helpers_test;
