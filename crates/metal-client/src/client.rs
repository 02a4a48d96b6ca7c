//! metal-api client
//!
//! Implements the subset of the metal-api v1 REST API the infrastructure
//! controllers need: network and IP allocation, firewall lifecycle and
//! machine lookups.

use crate::common::{segment, HttpClient};
use crate::error::MetalError;
use crate::metal_trait::MetalClientTrait;
use crate::models::*;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

/// metal-api client
#[derive(Debug, Clone)]
pub struct MetalClient {
    http: HttpClient,
}

impl MetalClient {
    /// Create a new metal-api client
    ///
    /// # Arguments
    /// * `base_url` - metal-api base URL (e.g., "http://metal-api:8080")
    /// * `token` - bearer token for authentication
    pub fn new(base_url: String, token: String) -> Result<Self, MetalError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            http: HttpClient::new(client, base_url, token),
        })
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        self.http.base_url()
    }

    /// Validate the API token by making a lightweight authenticated request.
    pub async fn validate_token(&self) -> Result<(), MetalError> {
        debug!("Validating metal-api token and connectivity");
        let _: serde_json::Value = self.http.get("/v1/health").await?;
        Ok(())
    }

    /// Allocate a private network for a project
    pub async fn allocate_network(&self, request: NetworkAllocateRequest) -> Result<Network, MetalError> {
        if request.projectid.is_empty() {
            return Err(MetalError::InvalidRequest("projectid must not be empty".to_string()));
        }
        self.http.post("/v1/network/allocate", &request).await
    }

    /// Release a private network
    pub async fn free_network(&self, id: &str) -> Result<(), MetalError> {
        self.http.delete(&format!("/v1/network/free/{}", segment(id))).await
    }

    /// Allocate an IP, optionally a specific address
    pub async fn allocate_ip(&self, request: IpAllocateRequest) -> Result<Ip, MetalError> {
        let path = match request.ipaddress.as_deref() {
            Some(address) if !address.is_empty() => format!("/v1/ip/allocate/{}", segment(address)),
            _ => "/v1/ip/allocate".to_string(),
        };
        self.http.post(&path, &request).await
    }

    /// Find IPs matching the given filters
    pub async fn list_ips(&self, request: IpFindRequest) -> Result<Vec<Ip>, MetalError> {
        self.http.post("/v1/ip/find", &request).await
    }

    /// Allocate a firewall machine
    pub async fn create_firewall(&self, request: FirewallCreateRequest) -> Result<Firewall, MetalError> {
        self.http.post("/v1/firewall/allocate", &request).await
    }

    /// Find firewalls by ID, project and tags
    pub async fn find_firewalls(&self, request: FirewallFindRequest) -> Result<Vec<Firewall>, MetalError> {
        self.http.post("/v1/firewall/find", &request).await
    }

    /// Free a machine (firewalls are machines too)
    pub async fn delete_machine(&self, id: &str) -> Result<(), MetalError> {
        self.http.delete(&format!("/v1/machine/{}", segment(id))).await
    }

    /// Get a machine by ID, `None` on 404
    pub async fn find_machine(&self, id: &str) -> Result<Option<Machine>, MetalError> {
        match self.http.get(&format!("/v1/machine/{}", segment(id))).await {
            Ok(machine) => Ok(Some(machine)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Get the allocation of a firewall machine
    pub async fn find_firewall_allocation(&self, id: &str) -> Result<Option<MachineAllocation>, MetalError> {
        let firewall: Firewall = self.http.get(&format!("/v1/firewall/{}", segment(id))).await?;
        Ok(firewall.allocation)
    }
}

#[async_trait::async_trait]
impl MetalClientTrait for MetalClient {
    fn base_url(&self) -> &str {
        self.base_url()
    }

    async fn validate_token(&self) -> Result<(), MetalError> {
        self.validate_token().await
    }

    async fn allocate_network(&self, request: NetworkAllocateRequest) -> Result<Network, MetalError> {
        self.allocate_network(request).await
    }

    async fn free_network(&self, id: &str) -> Result<(), MetalError> {
        self.free_network(id).await
    }

    async fn allocate_ip(&self, request: IpAllocateRequest) -> Result<Ip, MetalError> {
        self.allocate_ip(request).await
    }

    async fn list_ips(&self, request: IpFindRequest) -> Result<Vec<Ip>, MetalError> {
        self.list_ips(request).await
    }

    async fn create_firewall(&self, request: FirewallCreateRequest) -> Result<Firewall, MetalError> {
        self.create_firewall(request).await
    }

    async fn find_firewalls(&self, request: FirewallFindRequest) -> Result<Vec<Firewall>, MetalError> {
        self.find_firewalls(request).await
    }

    async fn delete_machine(&self, id: &str) -> Result<(), MetalError> {
        self.delete_machine(id).await
    }

    async fn find_machine(&self, id: &str) -> Result<Option<Machine>, MetalError> {
        self.find_machine(id).await
    }

    async fn find_firewall_allocation(&self, id: &str) -> Result<Option<MachineAllocation>, MetalError> {
        self.find_firewall_allocation(id).await
    }
}
