//! MetalStack CRD Definitions
//!
//! Kubernetes Custom Resource Definitions for the MetalStack infrastructure
//! controllers, plus the Cluster API types they read.

pub mod capi;
pub mod metal_stack_cluster;
pub mod metal_stack_firewall;
pub mod provider_id;

pub use capi::*;
pub use metal_stack_cluster::*;
pub use metal_stack_firewall::*;
pub use provider_id::{ProviderId, ProviderIdError, PROVIDER_ID_PREFIX};
