//! MetalStack Controller
//!
//! Cluster API infrastructure provider for metal-stack:
//! - MetalStackCluster: private network, control-plane IP and firewall of a cluster
//! - MetalStackFirewall: standalone firewall machines bound to a cluster
//!
//! Both kinds are torn down in dependency order before their finalizers are
//! released.

mod backoff;
mod bootstrap;
mod config;
mod controller;
mod error;
mod patch;
mod reconcile_helpers;
mod reconciler;
mod requeue;
mod store;
#[cfg(test)]
mod test_utils;
mod watcher;

use crate::config::Config;
use crate::error::ControllerError;
use controller::Controller;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), ControllerError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    if rustls::crypto::ring::default_provider().install_default().is_err() {
        warn!("A rustls crypto provider was already installed");
    }

    info!("Starting MetalStack Controller");

    let config = Config::from_env()?;

    info!("Configuration:");
    info!("  metal-api URL: {}", config.metal_api_url);
    info!("  Namespace: {}", config.namespace.as_deref().unwrap_or("all namespaces"));
    info!("  Public network: {}", config.public_network_id);
    info!("  Requeue delays: {:?} / {:?}", config.delays.short, config.delays.standard);

    let controller = Controller::new(config).await?;
    controller.run().await?;

    Ok(())
}
