//! MetalClient trait for mocking
//!
//! The reconcilers only talk to metal-api through this trait. The concrete
//! `MetalClient` implements it over HTTP and tests use `MockMetalClient`.

use crate::error::MetalError;
use crate::models::*;

/// Trait for metal-api operations
///
/// All async methods must be `Send` to work with Tokio's work-stealing runtime.
#[async_trait::async_trait]
pub trait MetalClientTrait: Send + Sync {
    /// Get the base URL
    fn base_url(&self) -> &str;

    /// Validate the API token
    async fn validate_token(&self) -> Result<(), MetalError>;

    // Networks
    async fn allocate_network(&self, request: NetworkAllocateRequest) -> Result<Network, MetalError>;
    async fn free_network(&self, id: &str) -> Result<(), MetalError>;

    // IPs
    async fn allocate_ip(&self, request: IpAllocateRequest) -> Result<Ip, MetalError>;
    async fn list_ips(&self, request: IpFindRequest) -> Result<Vec<Ip>, MetalError>;

    // Firewalls and machines
    async fn create_firewall(&self, request: FirewallCreateRequest) -> Result<Firewall, MetalError>;
    async fn find_firewalls(&self, request: FirewallFindRequest) -> Result<Vec<Firewall>, MetalError>;
    async fn delete_machine(&self, id: &str) -> Result<(), MetalError>;

    /// Look up a machine; `None` when metal-api does not know the ID
    async fn find_machine(&self, id: &str) -> Result<Option<Machine>, MetalError>;

    /// Allocation of a firewall machine, `None` when it is not (yet) allocated
    async fn find_firewall_allocation(&self, id: &str) -> Result<Option<MachineAllocation>, MetalError>;
}
