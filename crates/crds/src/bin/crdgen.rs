//! Prints the MetalStack CRDs as a multi-document YAML stream.
//!
//! Usage: `cargo run -p crds --bin crdgen | kubectl apply -f -`

use crds::{MetalStackCluster, MetalStackFirewall};
use kube::CustomResourceExt;

fn main() -> anyhow::Result<()> {
    let documents = [
        serde_yaml::to_string(&MetalStackCluster::crd())?,
        serde_yaml::to_string(&MetalStackFirewall::crd())?,
    ];
    print!("{}", documents.join("---\n"));
    Ok(())
}
