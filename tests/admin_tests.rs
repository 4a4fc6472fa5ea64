use std::sync::Arc;
use std::time::Duration;

use kconduit::cluster::acl::{AclEntry, AclOperation, AclPermission, PatternType, ResourceType};
use kconduit::cluster::types::StartOffset;
use kconduit::cluster::{ClusterAdmin, ClusterDriver, MemoryCluster, PartitionCursor};
use kconduit::error::KconduitError;
mod helpers;
use helpers::{create_topic, setup_cluster, setup_engine, unique};

fn topic_acl(principal: &str, topic: &str, operation: AclOperation) -> AclEntry {
    AclEntry {
        principal: principal.to_string(),
        host: "*".to_string(),
        operation,
        permission: AclPermission::Allow,
        resource_type: ResourceType::Topic,
        resource_name: topic.to_string(),
        pattern_type: PatternType::Literal,
    }
}

async fn topic_names(admin: &ClusterAdmin) -> Vec<String> {
    admin.topic_details().await.unwrap().into_iter().map(|t| t.name).collect()
}

mod features {
    use super::*;

    #[tokio::test]
    async fn test_topic_list_is_cached_until_a_mutation() {
        let cluster = setup_cluster();
        let engine = setup_engine(&cluster);
        let first = create_topic(&cluster, 1).await;

        assert_eq!(topic_names(&engine.admin).await, vec![first.clone()]);

        // Created behind the admin's back: not visible while the cache is fresh
        let second = create_topic(&cluster, 1).await;
        assert_eq!(topic_names(&engine.admin).await, vec![first.clone()]);

        engine.admin.delete_topic(&first).await.unwrap();
        assert_eq!(topic_names(&engine.admin).await, vec![second]);
    }

    #[tokio::test]
    async fn test_topic_list_refreshes_after_ttl() {
        let cluster = setup_cluster();
        let admin = ClusterAdmin::new(cluster.clone(), Duration::ZERO);
        let first = create_topic(&cluster, 1).await;
        assert_eq!(topic_names(&admin).await.len(), 1);

        let second = create_topic(&cluster, 1).await;
        let mut expected = vec![first, second];
        expected.sort();
        assert_eq!(topic_names(&admin).await, expected);
    }

    #[tokio::test]
    async fn test_delete_unknown_topic_fails() {
        let cluster = setup_cluster();
        let engine = setup_engine(&cluster);

        let err = engine.admin.delete_topic(&unique("ghost")).await.unwrap_err();
        assert!(err.to_string().contains("failed to delete topic"));
    }

    #[tokio::test]
    async fn test_create_topic_clamps_and_validates() {
        let cluster = setup_cluster();
        let engine = setup_engine(&cluster);
        let name = unique("clamped");

        engine.admin.create_topic(&name, 0, 0).await.unwrap();
        let details = engine.admin.topic_config(&name).await.unwrap();
        assert_eq!(details.partitions, 1);
        assert_eq!(details.replication_factor, 1);
        assert_eq!(details.configs.get("cleanup.policy").map(String::as_str), Some("delete"));

        let err = engine.admin.create_topic("", 1, 1).await.unwrap_err();
        assert!(matches!(err, KconduitError::Validation(_)));
    }

    #[tokio::test]
    async fn test_empty_key_produces_keyless_records() {
        let cluster = setup_cluster();
        let engine = setup_engine(&cluster);
        let topic = create_topic(&cluster, 2).await;

        let (p1, _) = engine.admin.produce_message(&topic, "", "a").await.unwrap();
        let (p2, _) = engine.admin.produce_message(&topic, "", "b").await.unwrap();
        assert_ne!(p1, p2, "Keyless records go round-robin");

        let (k1, _) = engine.admin.produce_message(&topic, "user-1", "c").await.unwrap();
        let (k2, _) = engine.admin.produce_message(&topic, "user-1", "d").await.unwrap();
        assert_eq!(k1, k2, "Same key lands on the same partition");

        let mut cursor = cluster.open_partition_cursor(&topic, p1, StartOffset::Oldest).await.unwrap();
        let first = cursor.next().await.unwrap().unwrap();
        cursor.close().await.unwrap();
        assert!(first.key.is_empty());
        assert_eq!(first.value_preview(), "a");
    }

    #[tokio::test]
    async fn test_produce_to_unknown_topic_fails() {
        let cluster = setup_cluster();
        let engine = setup_engine(&cluster);

        let err = engine.admin.produce_message("nowhere", "k", "v").await.unwrap_err();
        assert!(err.to_string().starts_with("failed to send message"));
    }

    #[tokio::test]
    async fn test_acl_create_list_delete() {
        let cluster = setup_cluster();
        let engine = setup_engine(&cluster);
        let read = topic_acl("User:alice", "orders", AclOperation::Read);
        let write = topic_acl("User:alice", "orders", AclOperation::Write);

        engine.admin.create_acl(&read).await.unwrap();
        engine.admin.create_acl(&write).await.unwrap();
        engine.admin.create_acl(&read).await.unwrap();
        assert_eq!(engine.admin.list_acls().await.unwrap(), vec![read.clone(), write.clone()]);

        let deleted = engine.admin.delete_acl(&read).await.unwrap();
        assert_eq!(deleted, 1);
        assert_eq!(engine.admin.list_acls().await.unwrap(), vec![write]);

        // All + Any act as wildcards in a delete filter
        let mut wildcard = topic_acl("User:alice", "orders", AclOperation::All);
        wildcard.pattern_type = PatternType::Any;
        assert_eq!(engine.admin.delete_acl(&wildcard).await.unwrap(), 1);
        assert!(engine.admin.list_acls().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_acl_without_match() {
        let cluster = setup_cluster();
        let engine = setup_engine(&cluster);
        engine.admin.create_acl(&topic_acl("User:bob", "payments", AclOperation::Read)).await.unwrap();

        let err = engine
            .admin
            .delete_acl(&topic_acl("User:alice", "payments", AclOperation::Read))
            .await
            .unwrap_err();

        assert_eq!(err, KconduitError::Validation("no matching ACLs found to delete".to_string()));
        assert_eq!(engine.admin.list_acls().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_brokers_sorted_with_controller() {
        let cluster = Arc::new(MemoryCluster::with_brokers(&["kafka-1:9093", "kafka-2", "kafka-3:bad"]));
        let admin = ClusterAdmin::new(cluster.clone(), Duration::from_secs(60));

        let brokers = admin.brokers().await.unwrap();

        let ids: Vec<i32> = brokers.iter().map(|b| b.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert!(brokers[0].is_controller);
        assert!(!brokers[1].is_controller);
        assert_eq!((brokers[0].host.as_str(), brokers[0].port), ("kafka-1", 9093));
        assert_eq!(brokers[1].port, 9092);
        assert_eq!(brokers[2].port, 9092);
    }

    #[tokio::test]
    async fn test_admin_reports_outage() {
        let cluster = setup_cluster();
        let engine = setup_engine(&cluster);
        cluster.set_unavailable(true);

        assert!(matches!(engine.admin.topic_details().await, Err(KconduitError::ClusterUnavailable(_))));
        assert!(matches!(engine.admin.brokers().await, Err(KconduitError::ClusterUnavailable(_))));
    }
}
