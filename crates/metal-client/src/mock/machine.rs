//! Firewall and machine operations for MockMetalClient

use super::{MockMetalClient, Operation};
use crate::error::MetalError;
use crate::models::*;
use chrono::Utc;

const FIREWALL_ROLE: &str = "firewall";

fn is_firewall(machine: &Machine) -> bool {
    machine
        .allocation
        .as_ref()
        .is_some_and(|a| a.role.as_deref() == Some(FIREWALL_ROLE))
}

fn as_firewall(machine: &Machine) -> Firewall {
    Firewall {
        id: machine.id.clone(),
        allocation: machine.allocation.clone(),
        tags: machine.tags.clone(),
    }
}

pub async fn create_firewall(client: &MockMetalClient, request: FirewallCreateRequest) -> Result<Firewall, MetalError> {
    client.record(Operation::CreateFirewall)?;

    let mut machines = client.machines.lock().unwrap();
    let id = match request.uuid.clone().filter(|u| !u.is_empty()) {
        Some(id) => {
            if machines.get(&id).is_some_and(|m| m.allocation.is_some()) {
                return Err(MetalError::Api(format!("machine {} is already allocated", id)));
            }
            id
        }
        None => uuid::Uuid::new_v4().to_string(),
    };

    let machine = Machine {
        id: id.clone(),
        allocation: Some(MachineAllocation {
            name: request.name,
            hostname: request.hostname,
            project: request.projectid,
            image: Some(request.imageid),
            role: Some(FIREWALL_ROLE.to_string()),
            succeeded: false,
            created: Some(Utc::now()),
        }),
        tags: request.tags,
    };
    let firewall = as_firewall(&machine);
    machines.insert(id, machine);
    Ok(firewall)
}

pub async fn find_firewalls(client: &MockMetalClient, request: FirewallFindRequest) -> Result<Vec<Firewall>, MetalError> {
    client.record(Operation::FindFirewalls)?;

    let mut firewalls: Vec<Firewall> = client
        .machines
        .lock()
        .unwrap()
        .values()
        .filter(|m| is_firewall(m))
        .filter(|m| request.id.as_ref().is_none_or(|id| &m.id == id))
        .filter(|m| {
            request.allocation_project.as_ref().is_none_or(|p| {
                m.allocation.as_ref().is_some_and(|a| &a.project == p)
            })
        })
        .filter(|m| request.tags.iter().all(|t| m.tags.contains(t)))
        .map(as_firewall)
        .collect();
    firewalls.sort_by(|a, b| a.id.cmp(&b.id));
    Ok(firewalls)
}

pub async fn delete_machine(client: &MockMetalClient, id: &str) -> Result<(), MetalError> {
    client.record(Operation::DeleteMachine)?;

    client
        .machines
        .lock()
        .unwrap()
        .remove(id)
        .map(|_| ())
        .ok_or_else(|| MetalError::NotFound(format!("machine {} not found", id)))
}

pub async fn find_machine(client: &MockMetalClient, id: &str) -> Result<Option<Machine>, MetalError> {
    client.record(Operation::FindMachine)?;
    Ok(client.machines.lock().unwrap().get(id).cloned())
}

pub async fn find_firewall_allocation(
    client: &MockMetalClient,
    id: &str,
) -> Result<Option<MachineAllocation>, MetalError> {
    client.record(Operation::FindFirewallAllocation)?;

    client
        .machines
        .lock()
        .unwrap()
        .get(id)
        .map(|m| m.allocation.clone())
        .ok_or_else(|| MetalError::NotFound(format!("firewall {} not found", id)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metal_trait::MetalClientTrait;

    fn request(uuid: Option<&str>) -> FirewallCreateRequest {
        FirewallCreateRequest {
            uuid: uuid.map(str::to_string),
            name: "c1-firewall".to_string(),
            hostname: "c1-firewall".to_string(),
            sizeid: "c1-xlarge-x86".to_string(),
            projectid: "proj1".to_string(),
            imageid: "firewall-ubuntu-2.0".to_string(),
            tags: vec!["cluster.metal-stack.io/id=c1".to_string()],
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_create_firewall_honours_requested_uuid() {
        let client = MockMetalClient::default();
        let fw = client.create_firewall(request(Some("m-1"))).await.unwrap();
        assert_eq!(fw.id, "m-1");
        assert!(client.create_firewall(request(Some("m-1"))).await.is_err());
        assert_eq!(client.call_count(Operation::CreateFirewall), 2);
    }

    #[tokio::test]
    async fn test_find_firewalls_filters_by_tags_and_project() {
        let client = MockMetalClient::default();
        let fw = client.create_firewall(request(None)).await.unwrap();

        let found = client
            .find_firewalls(FirewallFindRequest {
                id: Some(fw.id.clone()),
                allocation_project: Some("proj1".to_string()),
                tags: vec!["cluster.metal-stack.io/id=c1".to_string()],
            })
            .await
            .unwrap();
        assert_eq!(found.len(), 1);

        let other_project = client
            .find_firewalls(FirewallFindRequest {
                allocation_project: Some("proj2".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert!(other_project.is_empty());
    }

    #[tokio::test]
    async fn test_injected_failure_is_still_recorded() {
        let client = MockMetalClient::default();
        client.fail(Operation::DeleteMachine);
        assert!(client.delete_machine("m-1").await.is_err());
        assert_eq!(client.side_effect_count(), 1);

        client.clear_failure(Operation::DeleteMachine);
        let err = client.delete_machine("m-1").await.unwrap_err();
        assert!(err.is_not_found());
    }
}
