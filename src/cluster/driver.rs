//! The cluster driver: everything this crate needs from a Kafka connection.
//!
//! Implementations own the wire protocol, retries and RPC atomicity. The
//! handle is shared (`Arc<dyn ClusterDriver>`) by every component without
//! client-side locking.

use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::cluster::acl::AclEntry;
use crate::cluster::types::{
    BrokerInfo, ConsumedMessage, GroupDescription, GroupOffsets, PartitionInfo, ProduceRecord,
    StartOffset, TopicInfo,
};
use crate::error::Result;

#[async_trait]
pub trait ClusterDriver: Send + Sync {
    // --- Metadata ---

    /// All topics, sorted by name.
    async fn list_topics(&self) -> Result<Vec<TopicInfo>>;

    async fn topic_metadata(&self, topic: &str) -> Result<Vec<PartitionInfo>>;

    async fn describe_config(&self, topic: &str) -> Result<BTreeMap<String, String>>;

    /// Brokers with the active controller flagged.
    async fn controller_metadata(&self) -> Result<Vec<BrokerInfo>>;

    // --- Consumer groups ---

    async fn list_consumer_groups(&self) -> Result<Vec<String>>;

    async fn describe_consumer_groups(&self, ids: &[String]) -> Result<Vec<GroupDescription>>;

    async fn list_consumer_group_offsets(&self, group_id: &str) -> Result<GroupOffsets>;

    // --- Messages ---

    async fn open_partition_cursor(
        &self,
        topic: &str,
        partition: i32,
        start: StartOffset,
    ) -> Result<Box<dyn PartitionCursor>>;

    /// Returns `(partition, offset)` of the stored record.
    async fn produce(&self, topic: &str, record: ProduceRecord) -> Result<(i32, i64)>;

    // --- Mutations ---

    async fn create_topic(&self, name: &str, partitions: i32, replication_factor: i16) -> Result<()>;

    async fn delete_topic(&self, name: &str) -> Result<()>;

    async fn alter_config(&self, topic: &str, key: &str, value: &str) -> Result<()>;

    async fn create_partitions(&self, topic: &str, count: i32) -> Result<()>;

    // --- ACLs ---

    async fn list_acls(&self) -> Result<Vec<AclEntry>>;

    async fn create_acl(&self, acl: &AclEntry) -> Result<()>;

    /// Returns how many entries matched the filter and were removed.
    async fn delete_acl(&self, filter: &AclEntry) -> Result<usize>;
}

/// Partition-level read primitive. One cursor per (topic, partition).
#[async_trait]
pub trait PartitionCursor: Send {
    fn topic(&self) -> &str;

    fn partition(&self) -> i32;

    /// Offset the next produced record will get.
    fn high_water_mark(&self) -> i64;

    /// Waits for the next record. `None` once the partition is gone.
    async fn next(&mut self) -> Option<Result<ConsumedMessage>>;

    async fn close(self: Box<Self>) -> Result<()>;
}
