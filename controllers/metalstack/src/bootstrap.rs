//! Firewall bootstrap data.
//!
//! A freshly allocated firewall needs a kubeconfig for the workload cluster
//! so its firewall-controller can register itself. The kubeconfig is taken
//! from the `<cluster>-kubeconfig` secret written by the control-plane
//! provider and shipped as an Ignition document.

use crate::error::ControllerError;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use crds::MetalStackCluster;
use k8s_openapi::api::core::v1::Secret;
use kube::{Api, Client};
use serde_json::json;
use tracing::debug;

/// Path the firewall-controller reads its kubeconfig from
pub const FIREWALL_KUBECONFIG_PATH: &str = "/etc/firewall-controller/.kubeconfig";

/// Key of the kubeconfig inside the secret
pub const KUBECONFIG_SECRET_KEY: &str = "value";

/// Source of firewall user data
#[async_trait::async_trait]
pub trait BootstrapSource: Send + Sync {
    /// User data for the firewall of `cluster`, `None` while it cannot be built yet
    async fn firewall_user_data(&self, cluster: &MetalStackCluster) -> Result<Option<String>, ControllerError>;
}

/// Builds firewall user data from the workload cluster kubeconfig secret
#[derive(Clone)]
pub struct KubeconfigBootstrap {
    client: Client,
}

impl KubeconfigBootstrap {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait::async_trait]
impl BootstrapSource for KubeconfigBootstrap {
    async fn firewall_user_data(&self, cluster: &MetalStackCluster) -> Result<Option<String>, ControllerError> {
        let namespace = cluster.metadata.namespace.as_deref().unwrap_or("default");
        let name = cluster.metadata.name.as_deref().unwrap_or_default();
        let secret_name = format!("{}-kubeconfig", name);

        let secrets: Api<Secret> = Api::namespaced(self.client.clone(), namespace);
        let Some(secret) = secrets.get_opt(&secret_name).await? else {
            debug!("Secret {}/{} not found yet", namespace, secret_name);
            return Ok(None);
        };

        let Some(kubeconfig) = secret
            .data
            .as_ref()
            .and_then(|data| data.get(KUBECONFIG_SECRET_KEY))
        else {
            return Err(ControllerError::Bootstrap(format!(
                "secret {}/{} has no {:?} key",
                namespace, secret_name, KUBECONFIG_SECRET_KEY
            )));
        };

        Ok(Some(firewall_ignition(&kubeconfig.0)?))
    }
}

/// Ignition document writing `kubeconfig` to [`FIREWALL_KUBECONFIG_PATH`]
pub fn firewall_ignition(kubeconfig: &[u8]) -> Result<String, ControllerError> {
    let source = format!("data:text/plain;charset=utf-8;base64,{}", STANDARD.encode(kubeconfig));
    let document = json!({
        "ignition": { "version": "2.3.0" },
        "storage": {
            "files": [{
                "filesystem": "root",
                "path": FIREWALL_KUBECONFIG_PATH,
                "mode": 0o600,
                "contents": { "source": source },
            }],
        },
    });
    Ok(serde_json::to_string(&document)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    #[test]
    fn test_firewall_ignition_embeds_kubeconfig() {
        let user_data = firewall_ignition(b"apiVersion: v1\nkind: Config\n").unwrap();
        let doc: Value = serde_json::from_str(&user_data).unwrap();

        let file = &doc["storage"]["files"][0];
        assert_eq!(file["path"], FIREWALL_KUBECONFIG_PATH);
        assert_eq!(file["mode"], 384);

        let source = file["contents"]["source"].as_str().unwrap();
        let encoded = source.strip_prefix("data:text/plain;charset=utf-8;base64,").unwrap();
        assert_eq!(STANDARD.decode(encoded).unwrap(), b"apiVersion: v1\nkind: Config\n");
    }
}
