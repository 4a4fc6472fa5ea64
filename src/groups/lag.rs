//! Consumer lag: committed offsets against partition high-water marks.
//!
//! Every call goes to the cluster. One transient cursor per committed
//! partition is opened at `Newest` to read its high-water mark and closed
//! right away.

use std::collections::HashSet;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, warn};

use crate::cluster::driver::ClusterDriver;
use crate::cluster::types::{GroupOffsets, StartOffset};
use crate::error::{KconduitError, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PartitionOffsetPair {
    pub topic: String,
    pub partition: i32,
    /// -1 means the group never committed on this partition.
    pub committed_offset: i64,
    pub high_water_mark: i64,
}

impl PartitionOffsetPair {
    pub fn lag(&self) -> i64 {
        if self.committed_offset < 0 || self.high_water_mark < 0 {
            return 0;
        }
        (self.high_water_mark - self.committed_offset).max(0)
    }
}

#[derive(Clone)]
pub struct LagCalculator {
    driver: Arc<dyn ClusterDriver>,
}

impl LagCalculator {
    pub fn new(driver: Arc<dyn ClusterDriver>) -> Self {
        Self { driver }
    }

    pub async fn compute_group_lag(&self, group_id: &str) -> Result<i64> {
        let offsets = self.fetch_offsets(group_id).await?;
        self.lag_from_offsets(group_id, &offsets).await
    }

    /// Total lag for offsets the caller already fetched.
    pub async fn lag_from_offsets(&self, group_id: &str, offsets: &GroupOffsets) -> Result<i64> {
        let pairs = self.offset_pairs(group_id, offsets).await?;
        Ok(pairs.iter().map(PartitionOffsetPair::lag).sum())
    }

    /// Per-partition view behind the total.
    pub async fn partition_offsets(&self, group_id: &str) -> Result<Vec<PartitionOffsetPair>> {
        let offsets = self.fetch_offsets(group_id).await?;
        self.offset_pairs(group_id, &offsets).await
    }

    pub(crate) async fn fetch_offsets(&self, group_id: &str) -> Result<GroupOffsets> {
        self.driver
            .list_consumer_group_offsets(group_id)
            .await
            .map_err(|e| KconduitError::ClusterUnavailable(e.to_string()))
    }

    /// Pairs for partitions that still exist and whose high-water mark could
    /// be read. Deleted or unreadable topics and unreadable watermarks are
    /// left out.
    async fn offset_pairs(&self, group_id: &str, offsets: &GroupOffsets) -> Result<Vec<PartitionOffsetPair>> {
        let mut pairs = Vec::new();

        for (topic, committed) in offsets {
            let live: HashSet<i32> = match self.driver.topic_metadata(topic).await {
                Ok(partitions) => partitions.into_iter().map(|p| p.id).collect(),
                Err(KconduitError::TopicNotFound(_)) => {
                    debug!(group = %group_id, topic = %topic, "Skipping offsets of deleted topic");
                    continue;
                }
                Err(e) => {
                    warn!(group = %group_id, topic = %topic, error = %e, "Failed to get partitions, skipping topic");
                    continue;
                }
            };

            for (&partition, &committed_offset) in committed {
                if !live.contains(&partition) {
                    continue;
                }

                match self.high_water_mark(topic, partition).await {
                    Ok(high_water_mark) => pairs.push(PartitionOffsetPair {
                        topic: topic.clone(),
                        partition,
                        committed_offset,
                        high_water_mark,
                    }),
                    Err(e) => {
                        warn!(group = %group_id, topic = %topic, partition, error = %e, "Failed to read high water mark, counting no lag");
                    }
                }
            }
        }

        Ok(pairs)
    }

    async fn high_water_mark(&self, topic: &str, partition: i32) -> Result<i64> {
        let cursor = self.driver.open_partition_cursor(topic, partition, StartOffset::Newest).await?;
        let hwm = cursor.high_water_mark();
        if let Err(e) = cursor.close().await {
            debug!(topic = %topic, partition, error = %e, "Failed to close watermark cursor");
        }
        Ok(hwm)
    }
}
