//! In-memory cluster driver.
//!
//! Backs the sandbox binary and the test suite. Each partition is an
//! append-only log with a `Notify` that wakes blocked cursors. Cursor
//! opens/closes are counted and most operations accept injected faults.

use std::collections::hash_map::DefaultHasher;
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use dashmap::DashMap;
use hashlink::LinkedHashMap;
use parking_lot::{Mutex, RwLock};
use tokio::sync::Notify;
use uuid::Uuid;

use crate::cluster::acl::AclEntry;
use crate::cluster::driver::{ClusterDriver, PartitionCursor};
use crate::cluster::types::{
    BrokerInfo, ConsumedMessage, GroupDescription, GroupOffsets, GroupState, PartitionInfo,
    ProduceRecord, StartOffset, TopicInfo,
};
use crate::error::{KconduitError, Result};

// ========================================
// PARTITION LOG
// ========================================

struct MemoryPartition {
    id: i32,
    log: Mutex<Vec<ConsumedMessage>>,
    new_data_notifier: Notify,
    deleted: AtomicBool,
}

impl MemoryPartition {
    fn new(id: i32) -> Self {
        Self {
            id,
            log: Mutex::new(Vec::new()),
            new_data_notifier: Notify::new(),
            deleted: AtomicBool::new(false),
        }
    }

    fn append(&self, topic: &str, record: ProduceRecord) -> i64 {
        let mut log = self.log.lock();
        let offset = log.len() as i64;

        let mut headers = LinkedHashMap::new();
        for (k, v) in record.headers {
            headers.insert(k, v);
        }

        log.push(ConsumedMessage {
            topic: topic.to_string(),
            partition: self.id,
            offset,
            key: record.key.unwrap_or_default(),
            value: record.value,
            timestamp: Utc::now(),
            headers,
        });
        drop(log);

        self.new_data_notifier.notify_waiters();
        offset
    }

    fn read(&self, offset: i64) -> Option<ConsumedMessage> {
        if offset < 0 {
            return None;
        }
        self.log.lock().get(offset as usize).cloned()
    }

    fn high_water_mark(&self) -> i64 {
        self.log.lock().len() as i64
    }

    fn mark_deleted(&self) {
        self.deleted.store(true, Ordering::SeqCst);
        self.new_data_notifier.notify_waiters();
    }

    fn is_deleted(&self) -> bool {
        self.deleted.load(Ordering::SeqCst)
    }
}

struct MemoryTopic {
    replication_factor: i16,
    configs: BTreeMap<String, String>,
    partitions: Vec<Arc<MemoryPartition>>,
}

struct MemoryGroup {
    state: GroupState,
    members: Vec<String>,
    offsets: GroupOffsets,
}

impl MemoryGroup {
    fn empty() -> Self {
        Self { state: GroupState::Empty, members: Vec::new(), offsets: GroupOffsets::new() }
    }
}

// ========================================
// FAULTS & STATS
// ========================================

#[derive(Default)]
struct Faults {
    unavailable: bool,
    failing_cursors: HashSet<(String, i32)>,
    failing_metadata: HashSet<String>,
    rejected_configs: HashSet<String>,
    frozen_partition_counts: HashSet<String>,
    pending_errors: HashMap<(String, i32), VecDeque<String>>,
}

#[derive(Default)]
pub struct CursorStats {
    opened: AtomicUsize,
    closed: AtomicUsize,
}

impl CursorStats {
    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn open_now(&self) -> usize {
        self.opened().saturating_sub(self.closed())
    }
}

fn default_topic_configs() -> BTreeMap<String, String> {
    BTreeMap::from([
        ("cleanup.policy".to_string(), "delete".to_string()),
        ("compression.type".to_string(), "producer".to_string()),
        ("retention.ms".to_string(), "604800000".to_string()),
    ])
}

// ========================================
// MEMORY CLUSTER
// ========================================

pub struct MemoryCluster {
    topics: RwLock<BTreeMap<String, MemoryTopic>>,
    groups: DashMap<String, MemoryGroup>,
    acls: Mutex<Vec<AclEntry>>,
    brokers: Vec<BrokerInfo>,
    faults: Arc<Mutex<Faults>>,
    stats: Arc<CursorStats>,
    round_robin: AtomicUsize,
}

impl Default for MemoryCluster {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryCluster {
    /// Single broker on localhost, which is also the controller.
    pub fn new() -> Self {
        Self::with_brokers(&["localhost:9092"])
    }

    pub fn with_brokers(addresses: &[&str]) -> Self {
        let brokers = addresses
            .iter()
            .enumerate()
            .map(|(idx, addr)| {
                let mut broker = BrokerInfo::from_address(idx as i32 + 1, addr);
                broker.is_controller = idx == 0;
                broker.api_version = "3.5+".to_string();
                broker
            })
            .collect();

        Self {
            topics: RwLock::new(BTreeMap::new()),
            groups: DashMap::new(),
            acls: Mutex::new(Vec::new()),
            brokers,
            faults: Arc::new(Mutex::new(Faults::default())),
            stats: Arc::new(CursorStats::default()),
            round_robin: AtomicUsize::new(0),
        }
    }

    // --- Seeding ---

    /// Records a committed offset; creates the group if needed.
    pub fn commit_offset(&self, group_id: &str, topic: &str, partition: i32, offset: i64) {
        let mut group = self.groups.entry(group_id.to_string()).or_insert_with(MemoryGroup::empty);
        group.offsets.entry(topic.to_string()).or_default().insert(partition, offset);
    }

    /// Adds a member and moves the group to `Stable`. Returns the member id.
    pub fn join_group(&self, group_id: &str, client_id: &str) -> String {
        let member_id = format!("{}-{}", client_id, Uuid::new_v4());
        let mut group = self.groups.entry(group_id.to_string()).or_insert_with(MemoryGroup::empty);
        group.members.push(member_id.clone());
        group.state = GroupState::Stable;
        member_id
    }

    pub fn set_group_state(&self, group_id: &str, state: GroupState) {
        let mut group = self.groups.entry(group_id.to_string()).or_insert_with(MemoryGroup::empty);
        group.state = state;
    }

    // --- Fault injection ---

    pub fn set_unavailable(&self, unavailable: bool) {
        self.faults.lock().unavailable = unavailable;
    }

    pub fn fail_cursor_open(&self, topic: &str, partition: i32) {
        self.faults.lock().failing_cursors.insert((topic.to_string(), partition));
    }

    /// `topic_metadata` for this topic times out.
    pub fn fail_topic_metadata(&self, topic: &str) {
        self.faults.lock().failing_metadata.insert(topic.to_string());
    }

    pub fn reject_config_key(&self, key: &str) {
        self.faults.lock().rejected_configs.insert(key.to_string());
    }

    /// `create_partitions` on this topic fails.
    pub fn fail_partition_growth(&self, topic: &str) {
        self.faults.lock().frozen_partition_counts.insert(topic.to_string());
    }

    /// Next `next()` on any cursor of this partition yields this error.
    pub fn inject_partition_error(&self, topic: &str, partition: i32, error: &str) {
        self.faults
            .lock()
            .pending_errors
            .entry((topic.to_string(), partition))
            .or_default()
            .push_back(error.to_string());
        if let Some(p) = self.partition(topic, partition) {
            p.new_data_notifier.notify_waiters();
        }
    }

    pub fn cursor_stats(&self) -> Arc<CursorStats> {
        self.stats.clone()
    }

    // --- Internal ---

    fn ensure_available(&self) -> Result<()> {
        if self.faults.lock().unavailable {
            return Err(KconduitError::ClusterUnavailable("no brokers reachable".to_string()));
        }
        Ok(())
    }

    fn partition(&self, topic: &str, partition: i32) -> Option<Arc<MemoryPartition>> {
        let topics = self.topics.read();
        topics
            .get(topic)
            .and_then(|t| t.partitions.iter().find(|p| p.id == partition).cloned())
    }

    fn pick_partition(&self, key: Option<&Bytes>, count: usize) -> usize {
        match key {
            Some(key) if !key.is_empty() => {
                let mut hasher = DefaultHasher::new();
                key.hash(&mut hasher);
                (hasher.finish() % count as u64) as usize
            }
            _ => self.round_robin.fetch_add(1, Ordering::Relaxed) % count,
        }
    }

    fn leader_for(&self, partition: i32) -> i32 {
        if self.brokers.is_empty() {
            return -1;
        }
        self.brokers[partition as usize % self.brokers.len()].id
    }
}

#[async_trait]
impl ClusterDriver for MemoryCluster {
    async fn list_topics(&self) -> Result<Vec<TopicInfo>> {
        self.ensure_available()?;
        let topics = self.topics.read();
        Ok(topics
            .iter()
            .map(|(name, t)| TopicInfo {
                name: name.clone(),
                partitions: t.partitions.len() as i32,
                replication_factor: t.replication_factor,
            })
            .collect())
    }

    async fn topic_metadata(&self, topic: &str) -> Result<Vec<PartitionInfo>> {
        self.ensure_available()?;
        if self.faults.lock().failing_metadata.contains(topic) {
            return Err(KconduitError::Rpc("request timed out".to_string()));
        }
        let topics = self.topics.read();
        let t = topics.get(topic).ok_or_else(|| KconduitError::TopicNotFound(topic.to_string()))?;
        Ok(t.partitions
            .iter()
            .map(|p| {
                let leader = self.leader_for(p.id);
                PartitionInfo { id: p.id, leader, replicas: vec![leader], isr: vec![leader] }
            })
            .collect())
    }

    async fn describe_config(&self, topic: &str) -> Result<BTreeMap<String, String>> {
        self.ensure_available()?;
        let topics = self.topics.read();
        topics
            .get(topic)
            .map(|t| t.configs.clone())
            .ok_or_else(|| KconduitError::TopicNotFound(topic.to_string()))
    }

    async fn controller_metadata(&self) -> Result<Vec<BrokerInfo>> {
        self.ensure_available()?;
        Ok(self.brokers.clone())
    }

    async fn list_consumer_groups(&self) -> Result<Vec<String>> {
        self.ensure_available()?;
        let mut ids: Vec<String> = self.groups.iter().map(|g| g.key().clone()).collect();
        ids.sort();
        Ok(ids)
    }

    async fn describe_consumer_groups(&self, ids: &[String]) -> Result<Vec<GroupDescription>> {
        self.ensure_available()?;
        Ok(ids
            .iter()
            .map(|id| match self.groups.get(id) {
                Some(group) => GroupDescription {
                    group_id: id.clone(),
                    state: group.state,
                    members: group.members.clone(),
                },
                None => GroupDescription { group_id: id.clone(), state: GroupState::Dead, members: vec![] },
            })
            .collect())
    }

    async fn list_consumer_group_offsets(&self, group_id: &str) -> Result<GroupOffsets> {
        self.ensure_available()?;
        Ok(self.groups.get(group_id).map(|g| g.offsets.clone()).unwrap_or_default())
    }

    async fn open_partition_cursor(
        &self,
        topic: &str,
        partition: i32,
        start: StartOffset,
    ) -> Result<Box<dyn PartitionCursor>> {
        self.ensure_available()?;
        if self.faults.lock().failing_cursors.contains(&(topic.to_string(), partition)) {
            return Err(KconduitError::Rpc(format!(
                "broker not available for partition {}", partition
            )));
        }

        let p = self.partition(topic, partition).ok_or_else(|| KconduitError::TopicNotFound(topic.to_string()))?;
        let hwm = p.high_water_mark();
        let next_offset = match start {
            StartOffset::Oldest => 0,
            StartOffset::Newest => hwm,
            StartOffset::Specific(offset) if (0..=hwm).contains(&offset) => offset,
            StartOffset::Specific(offset) => {
                return Err(KconduitError::Rpc(format!(
                    "offset {} out of range for partition {} (high water mark {})", offset, partition, hwm
                )));
            }
        };

        self.stats.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MemoryCursor {
            topic: topic.to_string(),
            partition: p,
            next_offset,
            faults: self.faults.clone(),
            stats: self.stats.clone(),
        }))
    }

    async fn produce(&self, topic: &str, record: ProduceRecord) -> Result<(i32, i64)> {
        self.ensure_available()?;
        let target = {
            let topics = self.topics.read();
            let t = topics.get(topic).ok_or_else(|| KconduitError::TopicNotFound(topic.to_string()))?;
            let idx = self.pick_partition(record.key.as_ref(), t.partitions.len());
            t.partitions[idx].clone()
        };
        let offset = target.append(topic, record);
        Ok((target.id, offset))
    }

    async fn create_topic(&self, name: &str, partitions: i32, replication_factor: i16) -> Result<()> {
        self.ensure_available()?;
        if partitions < 1 {
            return Err(KconduitError::Rpc("Number of partitions must be larger than 0.".to_string()));
        }
        if replication_factor as usize > self.brokers.len() {
            return Err(KconduitError::Rpc(format!(
                "Replication factor: {} larger than available brokers: {}.",
                replication_factor,
                self.brokers.len()
            )));
        }

        let mut topics = self.topics.write();
        if topics.contains_key(name) {
            return Err(KconduitError::Rpc(format!("Topic '{}' already exists.", name)));
        }
        topics.insert(name.to_string(), MemoryTopic {
            replication_factor,
            configs: default_topic_configs(),
            partitions: (0..partitions).map(|id| Arc::new(MemoryPartition::new(id))).collect(),
        });
        Ok(())
    }

    async fn delete_topic(&self, name: &str) -> Result<()> {
        self.ensure_available()?;
        let removed = self.topics.write().remove(name);
        match removed {
            Some(topic) => {
                for p in &topic.partitions {
                    p.mark_deleted();
                }
                Ok(())
            }
            None => Err(KconduitError::TopicNotFound(name.to_string())),
        }
    }

    async fn alter_config(&self, topic: &str, key: &str, value: &str) -> Result<()> {
        self.ensure_available()?;
        if self.faults.lock().rejected_configs.contains(key) {
            return Err(KconduitError::Rpc(format!("Invalid config value for resource: {}", key)));
        }
        let mut topics = self.topics.write();
        let t = topics.get_mut(topic).ok_or_else(|| KconduitError::TopicNotFound(topic.to_string()))?;
        t.configs.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn create_partitions(&self, topic: &str, count: i32) -> Result<()> {
        self.ensure_available()?;
        if self.faults.lock().frozen_partition_counts.contains(topic) {
            return Err(KconduitError::Rpc("Policy violation: partition count is frozen".to_string()));
        }
        let mut topics = self.topics.write();
        let t = topics.get_mut(topic).ok_or_else(|| KconduitError::TopicNotFound(topic.to_string()))?;
        let current = t.partitions.len() as i32;
        if count <= current {
            return Err(KconduitError::Rpc(format!(
                "Topic currently has {} partitions, which is higher than the requested {}.", current, count
            )));
        }
        for id in current..count {
            t.partitions.push(Arc::new(MemoryPartition::new(id)));
        }
        Ok(())
    }

    async fn list_acls(&self) -> Result<Vec<AclEntry>> {
        self.ensure_available()?;
        Ok(self.acls.lock().clone())
    }

    async fn create_acl(&self, acl: &AclEntry) -> Result<()> {
        self.ensure_available()?;
        let mut acls = self.acls.lock();
        if !acls.contains(acl) {
            acls.push(acl.clone());
        }
        Ok(())
    }

    async fn delete_acl(&self, filter: &AclEntry) -> Result<usize> {
        self.ensure_available()?;
        let mut acls = self.acls.lock();
        let before = acls.len();
        acls.retain(|acl| !acl.matches_filter(filter));
        Ok(before - acls.len())
    }
}

// ========================================
// CURSOR
// ========================================

struct MemoryCursor {
    topic: String,
    partition: Arc<MemoryPartition>,
    next_offset: i64,
    faults: Arc<Mutex<Faults>>,
    stats: Arc<CursorStats>,
}

impl MemoryCursor {
    fn take_injected_error(&self) -> Option<String> {
        let mut faults = self.faults.lock();
        let key = (self.topic.clone(), self.partition.id);
        faults.pending_errors.get_mut(&key).and_then(|q| q.pop_front())
    }
}

#[async_trait]
impl PartitionCursor for MemoryCursor {
    fn topic(&self) -> &str {
        &self.topic
    }

    fn partition(&self) -> i32 {
        self.partition.id
    }

    fn high_water_mark(&self) -> i64 {
        self.partition.high_water_mark()
    }

    async fn next(&mut self) -> Option<Result<ConsumedMessage>> {
        let partition = self.partition.clone();
        loop {
            // Register before checking so an append between check and await is not lost
            let notified = partition.new_data_notifier.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(error) = self.take_injected_error() {
                return Some(Err(KconduitError::Rpc(error)));
            }
            if partition.is_deleted() {
                return None;
            }
            if let Some(msg) = partition.read(self.next_offset) {
                self.next_offset = msg.offset + 1;
                return Some(Ok(msg));
            }

            notified.await;
        }
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.stats.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
