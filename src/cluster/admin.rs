//! Operator-level admin service over a shared `ClusterDriver`.
//!
//! Adds argument checks, logging and a short-lived topic list cache on top of
//! the raw RPCs. Every mutation made through here drops the cache.

use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use crate::cluster::acl::AclEntry;
use crate::cluster::driver::ClusterDriver;
use crate::cluster::duration::parse_time_to_millis;
use crate::cluster::types::{BrokerInfo, ProduceRecord, TopicDetails, TopicInfo};
use crate::error::{KconduitError, Result};
use crate::groups::{ConsumerGroupSnapshot, GroupInspector};

struct CachedTopics {
    fetched_at: Instant,
    topics: Vec<TopicInfo>,
}

pub struct ClusterAdmin {
    driver: Arc<dyn ClusterDriver>,
    groups: GroupInspector,
    topic_cache: Mutex<Option<CachedTopics>>,
    cache_ttl: Duration,
}

impl ClusterAdmin {
    pub fn new(driver: Arc<dyn ClusterDriver>, cache_ttl: Duration) -> Self {
        Self {
            groups: GroupInspector::new(driver.clone()),
            driver,
            topic_cache: Mutex::new(None),
            cache_ttl,
        }
    }

    pub fn driver(&self) -> &Arc<dyn ClusterDriver> {
        &self.driver
    }

    pub fn groups(&self) -> &GroupInspector {
        &self.groups
    }

    // ========================================
    // TOPICS
    // ========================================

    /// Topic names, partitions and replication, sorted by name. Cached.
    pub async fn topic_details(&self) -> Result<Vec<TopicInfo>> {
        if let Some(cached) = self.topic_cache.lock().as_ref() {
            if cached.fetched_at.elapsed() < self.cache_ttl && !cached.topics.is_empty() {
                return Ok(cached.topics.clone());
            }
        }

        let mut topics = self
            .driver
            .list_topics()
            .await
            .map_err(|e| KconduitError::ClusterUnavailable(format!("failed to list topics: {}", e)))?;
        topics.sort_by(|a, b| a.name.cmp(&b.name));

        *self.topic_cache.lock() = Some(CachedTopics { fetched_at: Instant::now(), topics: topics.clone() });
        Ok(topics)
    }

    /// Metadata, configs and partition layout of one topic.
    /// Config and partition lookups are best effort.
    pub async fn topic_config(&self, name: &str) -> Result<TopicDetails> {
        let topics = self
            .driver
            .list_topics()
            .await
            .map_err(|e| KconduitError::ClusterUnavailable(format!("failed to list topics: {}", e)))?;
        let topic = topics
            .into_iter()
            .find(|t| t.name == name)
            .ok_or_else(|| KconduitError::TopicNotFound(name.to_string()))?;

        let configs = self.driver.describe_config(name).await.unwrap_or_else(|e| {
            debug!(topic = %name, error = %e, "Failed to describe topic config");
            Default::default()
        });
        let partition_details = self.driver.topic_metadata(name).await.unwrap_or_else(|e| {
            debug!(topic = %name, error = %e, "Failed to fetch partition metadata");
            Vec::new()
        });

        Ok(TopicDetails {
            name: topic.name,
            partitions: topic.partitions,
            replication_factor: topic.replication_factor,
            configs,
            partition_details,
        })
    }

    pub async fn create_topic(&self, name: &str, partitions: i32, replication_factor: i16) -> Result<()> {
        if name.is_empty() {
            return Err(KconduitError::Validation("topic name cannot be empty".to_string()));
        }
        let partitions = partitions.max(1);
        let replication_factor = replication_factor.max(1);

        self.invalidate_topics();
        self.driver
            .create_topic(name, partitions, replication_factor)
            .await
            .map_err(|e| KconduitError::Rpc(format!("failed to create topic: {}", e)))?;

        info!(topic = %name, partitions, replication_factor, "Created topic");
        Ok(())
    }

    pub async fn delete_topic(&self, name: &str) -> Result<()> {
        if name.is_empty() {
            return Err(KconduitError::Validation("topic name cannot be empty".to_string()));
        }

        info!(topic = %name, "Deleting topic");
        self.invalidate_topics();
        self.driver.delete_topic(name).await.map_err(|e| {
            error!(topic = %name, error = %e, "Failed to delete topic");
            KconduitError::Rpc(format!("failed to delete topic: {}", e))
        })
    }

    /// `*.ms` values may be given as `7d`, `1h30m`...
    pub async fn update_topic_config(&self, topic: &str, key: &str, value: &str) -> Result<()> {
        if topic.is_empty() || key.is_empty() {
            return Err(KconduitError::Validation("topic name and config key cannot be empty".to_string()));
        }

        let value = if key.ends_with(".ms") { parse_time_to_millis(value) } else { value.to_string() };
        debug!(topic = %topic, key = %key, value = %value, "Updating topic configuration");

        self.invalidate_topics();
        self.driver.alter_config(topic, key, &value).await.map_err(|e| {
            error!(topic = %topic, key = %key, value = %value, error = %e, "Failed to update topic configuration");
            KconduitError::Rpc(format!("failed to update topic config: {}", e))
        })?;

        info!(topic = %topic, key = %key, value = %value, "Updated topic configuration");
        Ok(())
    }

    /// Partitions only grow.
    pub async fn modify_topic_partitions(&self, topic: &str, partitions: i32) -> Result<()> {
        if topic.is_empty() {
            return Err(KconduitError::Validation("topic name cannot be empty".to_string()));
        }
        if partitions < 1 {
            return Err(KconduitError::Validation("number of partitions must be at least 1".to_string()));
        }

        let topics = self
            .driver
            .list_topics()
            .await
            .map_err(|e| KconduitError::ClusterUnavailable(format!("failed to list topics: {}", e)))?;
        let current = topics
            .iter()
            .find(|t| t.name == topic)
            .map(|t| t.partitions)
            .ok_or_else(|| KconduitError::TopicNotFound(topic.to_string()))?;

        if partitions <= current {
            return Err(KconduitError::Validation(format!(
                "new partition count ({}) must be greater than current count ({})",
                partitions, current
            )));
        }

        self.invalidate_topics();
        self.driver.create_partitions(topic, partitions).await.map_err(|e| {
            error!(topic = %topic, partitions, error = %e, "Failed to modify topic partitions");
            KconduitError::Rpc(format!("failed to modify partitions: {}", e))
        })?;

        info!(topic = %topic, old_partitions = current, new_partitions = partitions, "Modified topic partitions");
        Ok(())
    }

    pub fn invalidate_topics(&self) {
        *self.topic_cache.lock() = None;
    }

    // ========================================
    // MESSAGES
    // ========================================

    /// An empty key produces a keyless record.
    pub async fn produce_message(&self, topic: &str, key: &str, value: &str) -> Result<(i32, i64)> {
        let record = ProduceRecord {
            key: if key.is_empty() { None } else { Some(Bytes::copy_from_slice(key.as_bytes())) },
            value: Bytes::copy_from_slice(value.as_bytes()),
            headers: Vec::new(),
        };
        self.driver
            .produce(topic, record)
            .await
            .map_err(|e| KconduitError::Rpc(format!("failed to send message: {}", e)))
    }

    // ========================================
    // GROUPS, BROKERS, ACLS
    // ========================================

    pub async fn consumer_groups(&self) -> Result<Vec<ConsumerGroupSnapshot>> {
        self.groups.snapshot_all().await
    }

    pub async fn brokers(&self) -> Result<Vec<BrokerInfo>> {
        let mut brokers = self
            .driver
            .controller_metadata()
            .await
            .map_err(|e| KconduitError::ClusterUnavailable(e.to_string()))?;
        brokers.sort_by_key(|b| b.id);
        Ok(brokers)
    }

    pub async fn list_acls(&self) -> Result<Vec<AclEntry>> {
        let acls = self.driver.list_acls().await.map_err(|e| {
            error!(error = %e, "Failed to describe ACLs");
            KconduitError::Rpc(format!("failed to describe ACLs: {}", e))
        })?;
        debug!(count = acls.len(), "Listed ACLs");
        Ok(acls)
    }

    pub async fn create_acl(&self, acl: &AclEntry) -> Result<()> {
        info!(
            principal = %acl.principal,
            resource = %acl.resource_name,
            resource_type = %acl.resource_type,
            operation = %acl.operation,
            "Creating ACL"
        );
        self.driver
            .create_acl(acl)
            .await
            .map_err(|e| KconduitError::Rpc(format!("failed to create ACL: {}", e)))
    }

    pub async fn delete_acl(&self, filter: &AclEntry) -> Result<usize> {
        let deleted = self
            .driver
            .delete_acl(filter)
            .await
            .map_err(|e| KconduitError::Rpc(format!("failed to delete ACL: {}", e)))?;

        if deleted == 0 {
            warn!(principal = %filter.principal, resource = %filter.resource_name, "No ACL matched delete filter");
            return Err(KconduitError::Validation("no matching ACLs found to delete".to_string()));
        }

        info!(deleted, "Deleted ACL(s)");
        Ok(deleted)
    }
}
