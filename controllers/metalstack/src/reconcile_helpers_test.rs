//! Unit tests for reconcile_helpers module

#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::test_utils::*;
    use metal_client::{MockMetalClient, Operation};

    #[test]
    fn test_ensure_finalizer_is_idempotent() {
        let mut meta = ObjectMeta::default();
        assert!(ensure_finalizer(&mut meta, "a"));
        assert!(!ensure_finalizer(&mut meta, "a"));
        assert_eq!(meta.finalizers, Some(vec!["a".to_string()]));
    }

    #[test]
    fn test_remove_finalizer_keeps_others() {
        let mut meta = ObjectMeta {
            finalizers: Some(vec!["a".to_string(), "b".to_string()]),
            ..Default::default()
        };
        assert!(remove_finalizer(&mut meta, "a"));
        assert!(!remove_finalizer(&mut meta, "a"));
        assert_eq!(meta.finalizers, Some(vec!["b".to_string()]));
        assert!(!remove_finalizer(&mut ObjectMeta::default(), "a"));
    }

    #[test]
    fn test_object_key_from_metadata() {
        let cluster = metal_cluster("c1");
        assert_eq!(object_key(&cluster), ObjectKey::new(NAMESPACE, "c1"));
        assert!(!is_being_deleted(&cluster.metadata));
    }

    #[tokio::test]
    async fn test_find_cluster_firewalls_scopes_by_project_and_tag() {
        let client = MockMetalClient::default();
        add_firewall_machine(&client, "fw-1", "proj1", "cluster.metal-stack.io/id=c1", true);
        add_firewall_machine(&client, "fw-2", "proj1", "cluster.metal-stack.io/id=c2", true);

        let found = find_cluster_firewalls(&client, "fw-1", "proj1", "cluster.metal-stack.io/id=c1")
            .await
            .unwrap();
        assert_eq!(found.len(), 1);

        let wrong_tag = find_cluster_firewalls(&client, "fw-2", "proj1", "cluster.metal-stack.io/id=c1")
            .await
            .unwrap();
        assert!(wrong_tag.is_empty());
        assert_eq!(client.call_count(Operation::FindFirewalls), 2);
    }
}
