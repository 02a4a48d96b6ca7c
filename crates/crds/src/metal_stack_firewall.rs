//! MetalStackFirewall CRD
//!
//! The firewall appliance belonging to exactly one MetalStackCluster. The
//! relationship is a label lookup (`cluster.x-k8s.io/cluster-name`), not an
//! owner reference.

use crate::capi::CLUSTER_NAME_LABEL;
use crate::provider_id::{self, ProviderId, ProviderIdError};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Finalizer guarding MetalStackFirewall teardown
pub const METAL_STACK_FIREWALL_FINALIZER: &str = "metalstackfirewall.infrastructure.cluster.x-k8s.io";

#[derive(CustomResource, Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "infrastructure.cluster.x-k8s.io",
    version = "v1alpha3",
    kind = "MetalStackFirewall",
    namespaced,
    status = "MetalStackFirewallStatus",
    shortname = "msfw"
)]
#[serde(rename_all = "camelCase")]
pub struct MetalStackFirewallSpec {
    /// Machine to deploy on (`metalstack://<id>`), or the one bound after creation
    #[serde(rename = "providerID", default, skip_serializing_if = "Option::is_none")]
    pub provider_id: Option<String>,

    /// Machine size ID
    pub machine_type: String,

    /// Firewall image ID
    pub image: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ssh_keys: Vec<String>,
}

impl MetalStackFirewallSpec {
    /// Parses the provider ID, `Ok(None)` when none is bound.
    pub fn parsed_provider_id(&self) -> Result<Option<ProviderId>, ProviderIdError> {
        provider_id::parse_optional(self.provider_id.as_deref())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MetalStackFirewallStatus {
    /// The metal-api allocation of the firewall succeeded
    #[serde(default)]
    pub ready: bool,

    /// A create request for the bound provider ID was accepted by metal-api
    #[serde(default)]
    pub machine_created: bool,
}

impl MetalStackFirewall {
    /// Name of the cluster this firewall belongs to, from its label.
    pub fn cluster_name(&self) -> Option<&str> {
        self.metadata
            .labels
            .as_ref()
            .and_then(|labels| labels.get(CLUSTER_NAME_LABEL))
            .map(String::as_str)
            .filter(|name| !name.is_empty())
    }

    pub fn ready(&self) -> bool {
        self.status.as_ref().is_some_and(|s| s.ready)
    }

    pub fn machine_created(&self) -> bool {
        self.status.as_ref().is_some_and(|s| s.machine_created)
    }

    /// Mutable status, created on first access.
    pub fn status_mut(&mut self) -> &mut MetalStackFirewallStatus {
        self.status.get_or_insert_with(Default::default)
    }
}
