//! Cluster API types consumed by the MetalStack controllers.
//!
//! Only the fields the controllers read are modelled. The CRDs themselves are
//! owned by Cluster API, so schema generation is disabled.

use k8s_openapi::api::core::v1::ObjectReference;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::CustomResource;
use serde::{Deserialize, Serialize};

/// Label carrying the Cluster API cluster name on member objects
pub const CLUSTER_NAME_LABEL: &str = "cluster.x-k8s.io/cluster-name";

/// Annotation pausing reconciliation of a cluster and its infrastructure
pub const PAUSED_ANNOTATION: &str = "cluster.x-k8s.io/paused";

/// API group of the Cluster API core types
pub const CAPI_GROUP: &str = "cluster.x-k8s.io";

#[derive(CustomResource, Debug, Clone, Default, Serialize, Deserialize)]
#[kube(
    group = "cluster.x-k8s.io",
    version = "v1beta1",
    kind = "Cluster",
    namespaced,
    schema = "disabled"
)]
#[serde(rename_all = "camelCase")]
pub struct ClusterSpec {
    #[serde(default)]
    pub paused: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub infrastructure_ref: Option<ObjectReference>,
}

#[derive(CustomResource, Debug, Clone, Default, Serialize, Deserialize)]
#[kube(
    group = "cluster.x-k8s.io",
    version = "v1beta1",
    kind = "Machine",
    namespaced,
    schema = "disabled"
)]
#[serde(rename_all = "camelCase")]
pub struct MachineSpec {
    pub cluster_name: String,

    #[serde(rename = "providerID", default, skip_serializing_if = "Option::is_none")]
    pub provider_id: Option<String>,
}

/// Name of the owning Cluster API `Cluster`, from the owner references.
pub fn owner_cluster_name(meta: &ObjectMeta) -> Option<&str> {
    meta.owner_references.as_ref()?.iter().find_map(|owner| {
        let group = owner.api_version.split('/').next().unwrap_or_default();
        (owner.kind == "Cluster" && group == CAPI_GROUP).then_some(owner.name.as_str())
    })
}

/// Whether reconciliation is paused for `cluster` or for `object` itself.
pub fn is_paused(cluster: &Cluster, object: &ObjectMeta) -> bool {
    fn has_paused_annotation(meta: &ObjectMeta) -> bool {
        meta.annotations
            .as_ref()
            .is_some_and(|a| a.contains_key(PAUSED_ANNOTATION))
    }

    cluster.spec.paused || has_paused_annotation(&cluster.metadata) || has_paused_annotation(object)
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
    use std::collections::BTreeMap;

    fn owner(api_version: &str, kind: &str, name: &str) -> OwnerReference {
        OwnerReference {
            api_version: api_version.to_string(),
            kind: kind.to_string(),
            name: name.to_string(),
            uid: "uid".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_owner_cluster_name_matches_capi_group_any_version() {
        let meta = ObjectMeta {
            owner_references: Some(vec![
                owner("v1", "ConfigMap", "other"),
                owner("cluster.x-k8s.io/v1alpha3", "Cluster", "c1"),
            ]),
            ..Default::default()
        };
        assert_eq!(owner_cluster_name(&meta), Some("c1"));
    }

    #[test]
    fn test_owner_cluster_name_ignores_foreign_cluster_kinds() {
        let meta = ObjectMeta {
            owner_references: Some(vec![owner("example.com/v1", "Cluster", "c1")]),
            ..Default::default()
        };
        assert_eq!(owner_cluster_name(&meta), None);
        assert_eq!(owner_cluster_name(&ObjectMeta::default()), None);
    }

    #[test]
    fn test_is_paused() {
        let mut cluster = Cluster::new("c1", ClusterSpec::default());
        let mut infra = ObjectMeta::default();
        assert!(!is_paused(&cluster, &infra));

        infra.annotations = Some(BTreeMap::from([(PAUSED_ANNOTATION.to_string(), String::new())]));
        assert!(is_paused(&cluster, &infra));

        infra.annotations = None;
        cluster.spec.paused = true;
        assert!(is_paused(&cluster, &infra));
    }
}
