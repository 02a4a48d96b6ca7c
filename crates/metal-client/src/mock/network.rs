//! Network and IP operations for MockMetalClient

use super::{MockMetalClient, Operation};
use crate::error::MetalError;
use crate::models::*;

pub async fn allocate_network(client: &MockMetalClient, request: NetworkAllocateRequest) -> Result<Network, MetalError> {
    client.record(Operation::AllocateNetwork)?;

    let id = format!("network-{}", client.next_id());
    let network = Network {
        id: id.clone(),
        name: request.name,
        description: request.description,
        projectid: Some(request.projectid),
        partitionid: request.partitionid,
        prefixes: vec![format!("10.{}.0.0/22", client.network_count() + 1)],
        labels: request.labels,
    };
    client.networks.lock().unwrap().insert(id, network.clone());
    Ok(network)
}

pub async fn free_network(client: &MockMetalClient, id: &str) -> Result<(), MetalError> {
    client.record(Operation::FreeNetwork)?;

    // metal-api refuses to free networks that still hold IPs
    let in_use = client.ips.lock().unwrap().values().any(|ip| ip.networkid == id);
    if in_use {
        return Err(MetalError::Api(format!("network {} has IPs allocated", id)));
    }

    client
        .networks
        .lock()
        .unwrap()
        .remove(id)
        .map(|_| ())
        .ok_or_else(|| MetalError::NotFound(format!("network {} not found", id)))
}

pub async fn allocate_ip(client: &MockMetalClient, request: IpAllocateRequest) -> Result<Ip, MetalError> {
    client.record(Operation::AllocateIp)?;

    let address = match request.ipaddress.clone().filter(|a| !a.is_empty()) {
        Some(address) => {
            if client.ips.lock().unwrap().contains_key(&address) {
                return Err(MetalError::Api(format!("ip {} is already allocated", address)));
            }
            address
        }
        None => format!("203.0.113.{}", client.next_id()),
    };

    let ip = Ip {
        ipaddress: address.clone(),
        name: request.name,
        description: request.description,
        networkid: request.networkid,
        projectid: request.projectid,
        ip_type: request.ip_type,
        tags: request.tags,
    };
    client.ips.lock().unwrap().insert(address, ip.clone());
    Ok(ip)
}

pub async fn list_ips(client: &MockMetalClient, request: IpFindRequest) -> Result<Vec<Ip>, MetalError> {
    client.record(Operation::ListIps)?;

    let mut ips: Vec<Ip> = client
        .ips
        .lock()
        .unwrap()
        .values()
        .filter(|ip| request.projectid.as_ref().is_none_or(|p| &ip.projectid == p))
        .filter(|ip| request.networkid.as_ref().is_none_or(|n| &ip.networkid == n))
        .filter(|ip| request.tags.iter().all(|t| ip.tags.contains(t)))
        .cloned()
        .collect();
    ips.sort_by(|a, b| a.ipaddress.cmp(&b.ipaddress));
    Ok(ips)
}
