//! MetalStackCluster CRD
//!
//! Infrastructure claim of one workload cluster: a private network, a
//! control-plane IP and a firewall appliance allocated through metal-api.

use crate::provider_id::{self, ProviderId, ProviderIdError};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Finalizer guarding MetalStackCluster teardown
pub const METAL_STACK_CLUSTER_FINALIZER: &str = "metalstackcluster.infrastructure.cluster.x-k8s.io";

/// metal-stack tag key carrying the owning cluster's name
pub const CLUSTER_ID_TAG: &str = "cluster.metal-stack.io/id";

/// Default API server port when the endpoint does not specify one
pub const DEFAULT_API_SERVER_PORT: i32 = 6443;

#[derive(CustomResource, Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "infrastructure.cluster.x-k8s.io",
    version = "v1alpha3",
    kind = "MetalStackCluster",
    namespaced,
    status = "MetalStackClusterStatus",
    shortname = "msc"
)]
#[serde(rename_all = "camelCase")]
pub struct MetalStackClusterSpec {
    /// Endpoint used to communicate with the control plane
    #[serde(default)]
    pub control_plane_endpoint: ApiEndpoint,

    /// Physical location where the cluster will be created
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partition: Option<String>,

    /// metal-stack project owning every resource of this cluster
    #[serde(rename = "projectID")]
    pub project_id: String,

    /// ID of the network connecting the cluster's machines.
    /// Set by the controller once allocated.
    #[serde(rename = "privateNetworkID", default, skip_serializing_if = "Option::is_none")]
    pub private_network_id: Option<String>,

    /// External network for the control-plane IP and the firewall uplink.
    /// Falls back to the controller's configured default.
    #[serde(rename = "publicNetworkID", default, skip_serializing_if = "Option::is_none")]
    pub public_network_id: Option<String>,

    /// Firewall appliance configuration
    #[serde(default)]
    pub firewall: FirewallSpec,
}

/// Host/port the workload cluster's API server is reachable on
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct ApiEndpoint {
    #[serde(default)]
    pub host: String,

    #[serde(default)]
    pub port: i32,
}

impl ApiEndpoint {
    pub fn is_unset(&self) -> bool {
        self.host.is_empty()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct FirewallSpec {
    /// Uplink network attached to the firewall
    #[serde(rename = "defaultNetworkID", default, skip_serializing_if = "Option::is_none")]
    pub default_network_id: Option<String>,

    /// Firewall image ID
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,

    /// Machine size ID
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ssh_keys: Vec<String>,

    /// Pre-bound machine (`metalstack://<id>`), or the one bound after creation
    #[serde(rename = "providerID", default, skip_serializing_if = "Option::is_none")]
    pub provider_id: Option<String>,
}

impl FirewallSpec {
    /// Parses the provider ID, `Ok(None)` when none is bound.
    pub fn parsed_provider_id(&self) -> Result<Option<ProviderId>, ProviderIdError> {
        provider_id::parse_optional(self.provider_id.as_deref())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MetalStackClusterStatus {
    /// Network, control-plane IP and firewall are all in place
    #[serde(default)]
    pub ready: bool,

    #[serde(default)]
    pub firewall_ready: bool,

    #[serde(rename = "controlPlaneIPAllocated", default)]
    pub control_plane_ip_allocated: bool,

    /// Machine-readable reason of the last terminal problem
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,

    /// Human-readable description of the last terminal problem
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_message: Option<String>,
}

impl MetalStackCluster {
    /// Tag attached to every metal-api object belonging to this cluster.
    pub fn cluster_id_tag(&self) -> String {
        format!("{}={}", CLUSTER_ID_TAG, self.metadata.name.as_deref().unwrap_or_default())
    }

    /// Mutable status, created on first access.
    pub fn status_mut(&mut self) -> &mut MetalStackClusterStatus {
        self.status.get_or_insert_with(Default::default)
    }

    pub fn firewall_ready(&self) -> bool {
        self.status.as_ref().is_some_and(|s| s.firewall_ready)
    }

    pub fn control_plane_ip_allocated(&self) -> bool {
        self.status.as_ref().is_some_and(|s| s.control_plane_ip_allocated)
    }

    pub fn ready(&self) -> bool {
        self.status.as_ref().is_some_and(|s| s.ready)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spec_uses_upstream_field_names() {
        let spec = MetalStackClusterSpec {
            project_id: "proj1".to_string(),
            private_network_id: Some("net-1".to_string()),
            firewall: FirewallSpec {
                default_network_id: Some("internet".to_string()),
                provider_id: Some("metalstack://m1".to_string()),
                ..Default::default()
            },
            ..Default::default()
        };

        let value = serde_json::to_value(&spec).unwrap();
        assert_eq!(value["projectID"], "proj1");
        assert_eq!(value["privateNetworkID"], "net-1");
        assert_eq!(value["firewall"]["defaultNetworkID"], "internet");
        assert_eq!(value["firewall"]["providerID"], "metalstack://m1");
        assert!(value.get("partition").is_none());
    }

    #[test]
    fn test_status_defaults_when_fields_missing() {
        let status: MetalStackClusterStatus = serde_json::from_str(r#"{"ready": true}"#).unwrap();
        assert!(status.ready);
        assert!(!status.firewall_ready);
        assert!(!status.control_plane_ip_allocated);
    }

    #[test]
    fn test_cluster_id_tag() {
        let cluster = MetalStackCluster::new("c1", MetalStackClusterSpec::default());
        assert_eq!(cluster.cluster_id_tag(), "cluster.metal-stack.io/id=c1");
    }
}
