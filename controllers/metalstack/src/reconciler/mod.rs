//! Reconciliation logic for the MetalStack infrastructure CRDs.
//!
//! - `cluster`: MetalStackCluster (network, control-plane IP, firewall, teardown)
//! - `firewall`: MetalStackFirewall (firewall machine provisioning and teardown)
//!
//! Every reconcile entry point loads the object, snapshots it, runs the
//! step logic against an owned copy and flushes the resulting merge-patch
//! before returning, whatever the outcome.

pub mod cluster;
pub mod firewall;

use crate::backoff::FibonacciBackoff;
use crate::bootstrap::BootstrapSource;
use crate::requeue::RequeueDelays;
use crate::store::StateStore;
use metal_client::MetalClientTrait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::warn;

/// Backoff state for a resource
#[derive(Debug, Clone)]
struct BackoffState {
    backoff: FibonacciBackoff,
    error_count: u32,
}

impl BackoffState {
    fn new(min_seconds: u64, max_seconds: u64) -> Self {
        Self {
            backoff: FibonacciBackoff::new(min_seconds, max_seconds),
            error_count: 0,
        }
    }

    fn increment_error(&mut self) {
        self.error_count += 1;
    }

    fn reset(&mut self) {
        self.error_count = 0;
        self.backoff.reset();
    }
}

/// Reconciles MetalStackCluster and MetalStackFirewall resources.
pub struct Reconciler {
    pub(crate) metal_client: Box<dyn MetalClientTrait + Send + Sync>,
    pub(crate) store: Box<dyn StateStore>,
    pub(crate) bootstrap: Box<dyn BootstrapSource>,
    /// Fallback network for control-plane IPs and firewall uplinks
    pub(crate) public_network_id: String,
    pub(crate) delays: RequeueDelays,
    error_backoff: (u64, u64),
    /// Error count tracking per resource (kind/namespace/name -> BackoffState)
    backoff_states: Arc<Mutex<HashMap<String, BackoffState>>>,
}

impl Reconciler {
    pub fn new(
        metal_client: impl MetalClientTrait + 'static,
        store: impl StateStore + 'static,
        bootstrap: impl BootstrapSource + 'static,
        public_network_id: impl Into<String>,
    ) -> Self {
        Self {
            metal_client: Box::new(metal_client),
            store: Box::new(store),
            bootstrap: Box::new(bootstrap),
            public_network_id: public_network_id.into(),
            delays: RequeueDelays::default(),
            error_backoff: (5, 300),
            backoff_states: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    #[must_use]
    pub fn with_delays(mut self, delays: RequeueDelays) -> Self {
        self.delays = delays;
        self
    }

    #[must_use]
    pub fn with_error_backoff(mut self, min_seconds: u64, max_seconds: u64) -> Self {
        self.error_backoff = (min_seconds, max_seconds);
        self
    }

    /// Get the next backoff duration for a resource and its error count
    pub fn get_backoff_for_resource(&self, resource_key: &str) -> (Duration, u32) {
        let (min, max) = self.error_backoff;
        match self.backoff_states.lock() {
            Ok(mut states) => {
                let state = states
                    .entry(resource_key.to_string())
                    .or_insert_with(|| BackoffState::new(min, max));
                (state.backoff.next_backoff(), state.error_count)
            }
            Err(e) => {
                warn!("Failed to lock backoff_states: {}, using default backoff", e);
                (Duration::from_secs(min), 0)
            }
        }
    }

    /// Increment error count for a resource
    pub fn increment_error(&self, resource_key: &str) {
        let (min, max) = self.error_backoff;
        if let Ok(mut states) = self.backoff_states.lock() {
            states
                .entry(resource_key.to_string())
                .or_insert_with(|| BackoffState::new(min, max))
                .increment_error();
        }
    }

    /// Reset error count for a resource (on successful reconciliation)
    pub fn reset_error(&self, resource_key: &str) {
        if let Ok(mut states) = self.backoff_states.lock() {
            if let Some(state) = states.get_mut(resource_key) {
                state.reset();
            }
        }
    }
}
