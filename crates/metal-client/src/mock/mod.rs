//! Mock MetalClient for unit testing
//!
//! In-memory implementation of `MetalClientTrait` so reconcilers can be
//! exercised without a running metal-api.
//!
//! The mock is organized into domain-specific modules:
//! - `network.rs` - private networks and IP allocations
//! - `machine.rs` - firewalls and machines
//!
//! Every call is recorded as an [`Operation`] so tests can assert on the
//! exact sequence of provisioning side effects. Failures can be injected per
//! operation with [`MockMetalClient::fail`].

mod machine;
mod network;

use crate::error::MetalError;
use crate::metal_trait::MetalClientTrait;
use crate::models::*;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

/// Operations recorded by the mock
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    ValidateToken,
    AllocateNetwork,
    FreeNetwork,
    AllocateIp,
    ListIps,
    CreateFirewall,
    FindFirewalls,
    DeleteMachine,
    FindMachine,
    FindFirewallAllocation,
}

impl Operation {
    /// Whether the operation changes state in metal-api
    pub fn is_side_effect(&self) -> bool {
        matches!(
            self,
            Operation::AllocateNetwork
                | Operation::FreeNetwork
                | Operation::AllocateIp
                | Operation::CreateFirewall
                | Operation::DeleteMachine
        )
    }
}

/// Mock MetalClient for testing
///
/// Cloning shares the underlying state, so a test can keep a handle while
/// the reconciler owns a boxed copy.
#[derive(Clone)]
pub struct MockMetalClient {
    pub(crate) base_url: String,
    pub(crate) networks: Arc<Mutex<HashMap<String, Network>>>,
    // Keyed by address
    pub(crate) ips: Arc<Mutex<HashMap<String, Ip>>>,
    // Firewalls are machines with the "firewall" allocation role
    pub(crate) machines: Arc<Mutex<HashMap<String, Machine>>>,
    pub(crate) calls: Arc<Mutex<Vec<Operation>>>,
    pub(crate) failures: Arc<Mutex<HashSet<Operation>>>,
    pub(crate) next_id: Arc<Mutex<u64>>,
}

impl std::fmt::Debug for MockMetalClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockMetalClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl Default for MockMetalClient {
    fn default() -> Self {
        Self::new("http://metal-api.mock")
    }
}

impl MockMetalClient {
    /// Create a new mock client
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            networks: Arc::new(Mutex::new(HashMap::new())),
            ips: Arc::new(Mutex::new(HashMap::new())),
            machines: Arc::new(Mutex::new(HashMap::new())),
            calls: Arc::new(Mutex::new(Vec::new())),
            failures: Arc::new(Mutex::new(HashSet::new())),
            next_id: Arc::new(Mutex::new(1)),
        }
    }

    /// Add a network to the mock store (for test setup)
    pub fn add_network(&self, network: Network) {
        self.networks.lock().unwrap().insert(network.id.clone(), network);
    }

    /// Add an IP to the mock store (for test setup)
    pub fn add_ip(&self, ip: Ip) {
        self.ips.lock().unwrap().insert(ip.ipaddress.clone(), ip);
    }

    /// Add a machine to the mock store (for test setup)
    pub fn add_machine(&self, machine: Machine) {
        self.machines.lock().unwrap().insert(machine.id.clone(), machine);
    }

    /// Mark the allocation of a machine as finished (simulates the firewall phoning home)
    pub fn set_allocation_succeeded(&self, id: &str, succeeded: bool) {
        if let Some(allocation) = self
            .machines
            .lock()
            .unwrap()
            .get_mut(id)
            .and_then(|m| m.allocation.as_mut())
        {
            allocation.succeeded = succeeded;
        }
    }

    /// Snapshot of a network
    pub fn network(&self, id: &str) -> Option<Network> {
        self.networks.lock().unwrap().get(id).cloned()
    }

    /// Snapshot of a machine
    pub fn machine(&self, id: &str) -> Option<Machine> {
        self.machines.lock().unwrap().get(id).cloned()
    }

    /// Number of machines currently known
    pub fn machine_count(&self) -> usize {
        self.machines.lock().unwrap().len()
    }

    /// Number of networks currently known
    pub fn network_count(&self) -> usize {
        self.networks.lock().unwrap().len()
    }

    /// Remove an IP (for test setup)
    pub fn remove_ip(&self, address: &str) {
        self.ips.lock().unwrap().remove(address);
    }

    /// Make every subsequent call of `op` fail with an API error
    pub fn fail(&self, op: Operation) {
        self.failures.lock().unwrap().insert(op);
    }

    /// Stop failing calls of `op`
    pub fn clear_failure(&self, op: Operation) {
        self.failures.lock().unwrap().remove(&op);
    }

    /// All recorded calls, in order
    pub fn calls(&self) -> Vec<Operation> {
        self.calls.lock().unwrap().clone()
    }

    /// Number of recorded calls of `op`
    pub fn call_count(&self, op: Operation) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| **c == op).count()
    }

    /// Number of recorded state-changing calls
    pub fn side_effect_count(&self) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| c.is_side_effect()).count()
    }

    /// Forget recorded calls
    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    /// Record a call and return the injected failure, if any
    pub(crate) fn record(&self, op: Operation) -> Result<(), MetalError> {
        self.calls.lock().unwrap().push(op);
        if self.failures.lock().unwrap().contains(&op) {
            return Err(MetalError::Api(format!("injected failure for {:?}", op)));
        }
        Ok(())
    }

    /// Generate next ID
    pub(crate) fn next_id(&self) -> u64 {
        let mut id = self.next_id.lock().unwrap();
        let current = *id;
        *id += 1;
        current
    }
}

#[async_trait::async_trait]
impl MetalClientTrait for MockMetalClient {
    fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn validate_token(&self) -> Result<(), MetalError> {
        self.record(Operation::ValidateToken)
    }

    // Networks and IPs - delegated to network module
    async fn allocate_network(&self, request: NetworkAllocateRequest) -> Result<Network, MetalError> {
        network::allocate_network(self, request).await
    }

    async fn free_network(&self, id: &str) -> Result<(), MetalError> {
        network::free_network(self, id).await
    }

    async fn allocate_ip(&self, request: IpAllocateRequest) -> Result<Ip, MetalError> {
        network::allocate_ip(self, request).await
    }

    async fn list_ips(&self, request: IpFindRequest) -> Result<Vec<Ip>, MetalError> {
        network::list_ips(self, request).await
    }

    // Firewalls and machines - delegated to machine module
    async fn create_firewall(&self, request: FirewallCreateRequest) -> Result<Firewall, MetalError> {
        machine::create_firewall(self, request).await
    }

    async fn find_firewalls(&self, request: FirewallFindRequest) -> Result<Vec<Firewall>, MetalError> {
        machine::find_firewalls(self, request).await
    }

    async fn delete_machine(&self, id: &str) -> Result<(), MetalError> {
        machine::delete_machine(self, id).await
    }

    async fn find_machine(&self, id: &str) -> Result<Option<Machine>, MetalError> {
        machine::find_machine(self, id).await
    }

    async fn find_firewall_allocation(&self, id: &str) -> Result<Option<MachineAllocation>, MetalError> {
        machine::find_firewall_allocation(self, id).await
    }
}
