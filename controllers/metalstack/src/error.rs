//! Controller-specific error types.
//!
//! This module defines error types specific to the MetalStack controller
//! that are not covered by upstream library errors.

use crds::ProviderIdError;
use kube::Error as KubeError;
use metal_client::MetalError;
use thiserror::Error;

/// Errors that can occur in the MetalStack controller.
#[derive(Debug, Error)]
pub enum ControllerError {
    /// Kubernetes API error
    #[error("Kubernetes error: {0}")]
    Kube(#[from] KubeError),

    /// metal-api error
    #[error("metal-api error: {0}")]
    Metal(#[from] MetalError),

    /// Invalid controller configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The firewall section of a MetalStackCluster is incomplete
    #[error("Invalid firewall configuration: {0}")]
    FirewallConfig(#[from] FirewallConfigError),

    /// A recorded provider ID could not be parsed
    #[error("Invalid provider ID: {0}")]
    ProviderId(#[from] ProviderIdError),

    /// JSON (de)serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Firewall user data could not be built
    #[error("Bootstrap error: {0}")]
    Bootstrap(String),

    /// State store failure outside of the Kubernetes client
    #[error("Store error: {0}")]
    Store(String),

    /// Flushing pending changes failed; carries the reconcile error of the
    /// same invocation, if there was one
    #[error("Failed to patch {resource}: {source}{}", describe_prior(.prior))]
    Patch {
        resource: String,
        source: Box<ControllerError>,
        prior: Option<Box<ControllerError>>,
    },

    /// Resource watch failed
    #[error("Resource watch failed: {0}")]
    Watch(String),
}

fn describe_prior(prior: &Option<Box<ControllerError>>) -> String {
    prior
        .as_ref()
        .map(|p| format!(" (after: {p})"))
        .unwrap_or_default()
}

/// Missing fields in `MetalStackCluster.spec.firewall` (or its prerequisites)
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FirewallConfigError {
    #[error("firewall.defaultNetworkID is not set")]
    MissingDefaultNetwork,
    #[error("firewall.image is not set")]
    MissingImage,
    #[error("firewall.size is not set")]
    MissingSize,
    #[error("privateNetworkID is not set yet")]
    MissingPrivateNetwork,
    #[error("firewall.providerID is invalid: {0}")]
    InvalidProviderId(ProviderIdError),
}
