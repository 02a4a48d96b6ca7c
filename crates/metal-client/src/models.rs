//! metal-api models
//!
//! Request and response bodies of the metal-api v1 endpoints used by the
//! controllers. Field names follow the metal-api swagger definitions
//! (`v1.NetworkAllocateRequest`, `v1.IPAllocateRequest`, ...).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Request body for `POST /v1/network/allocate`
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct NetworkAllocateRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub projectid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partitionid: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
}

/// Network model matching `v1.NetworkResponse`
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Network {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub projectid: Option<String>,
    #[serde(default)]
    pub partitionid: Option<String>,
    #[serde(default)]
    pub prefixes: Vec<String>,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

/// IP allocation type
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum IpType {
    /// Survives the machine it is attached to
    #[default]
    Static,
    /// Released together with the machine
    Ephemeral,
}

/// Request body for `POST /v1/ip/allocate[/{ip}]`
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct IpAllocateRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub networkid: String,
    pub projectid: String,
    /// Specific address to allocate; sent as a path segment, not in the body
    #[serde(skip)]
    pub ipaddress: Option<String>,
    #[serde(rename = "type")]
    pub ip_type: IpType,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

/// IP model matching `v1.IPResponse`
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Ip {
    pub ipaddress: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    pub networkid: String,
    pub projectid: String,
    #[serde(rename = "type", default)]
    pub ip_type: IpType,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Request body for `POST /v1/ip/find`
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct IpFindRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub projectid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub networkid: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

/// Network attachment of a machine allocation
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct MachineAllocationNetwork {
    pub networkid: String,
    pub autoacquire: bool,
}

impl MachineAllocationNetwork {
    /// Attachment that acquires an address automatically
    pub fn auto(networkid: impl Into<String>) -> Self {
        Self {
            networkid: networkid.into(),
            autoacquire: true,
        }
    }
}

/// Request body for `POST /v1/firewall/allocate`
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct FirewallCreateRequest {
    /// Deploy onto this specific machine instead of letting metal-api pick one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub hostname: String,
    pub sizeid: String,
    pub projectid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partitionid: Option<String>,
    pub imageid: String,
    #[serde(default)]
    pub ssh_pub_keys: Vec<String>,
    pub networks: Vec<MachineAllocationNetwork>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub user_data: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Request body for `POST /v1/firewall/find`
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct FirewallFindRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allocation_project: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

/// Allocation of a machine to a project, matching `v1.MachineAllocation`
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct MachineAllocation {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub hostname: String,
    #[serde(default)]
    pub project: String,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    /// The machine reported back that provisioning finished
    #[serde(default)]
    pub succeeded: bool,
    #[serde(default)]
    pub created: Option<DateTime<Utc>>,
}

/// Machine model matching `v1.MachineResponse`
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Machine {
    pub id: String,
    #[serde(default)]
    pub allocation: Option<MachineAllocation>,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Firewall model matching `v1.FirewallResponse`
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Firewall {
    pub id: String,
    #[serde(default)]
    pub allocation: Option<MachineAllocation>,
    #[serde(default)]
    pub tags: Vec<String>,
}
