use std::collections::BTreeSet;
use std::sync::Arc;

use futures_util::future::join_all;
use serde::Serialize;
use tracing::{debug, warn};

use crate::cluster::driver::ClusterDriver;
use crate::cluster::types::GroupState;
use crate::error::{KconduitError, Result};
use crate::groups::lag::LagCalculator;

/// Computed on each query, never stored.
#[derive(Debug, Clone, Serialize)]
pub struct ConsumerGroupSnapshot {
    pub group_id: String,
    pub state: GroupState,
    pub members: Vec<String>,
    /// Topics the group has committed offsets on, not its live subscription.
    pub subscribed_topics: BTreeSet<String>,
    pub total_lag: i64,
}

impl ConsumerGroupSnapshot {
    pub fn topics_count(&self) -> usize {
        self.subscribed_topics.len()
    }
}

pub struct GroupInspector {
    driver: Arc<dyn ClusterDriver>,
    lag: LagCalculator,
}

impl GroupInspector {
    pub fn new(driver: Arc<dyn ClusterDriver>) -> Self {
        Self { lag: LagCalculator::new(driver.clone()), driver }
    }

    pub fn lag_calculator(&self) -> &LagCalculator {
        &self.lag
    }

    /// Every group sorted by id. Groups that cannot be described are left out.
    pub async fn snapshot_all(&self) -> Result<Vec<ConsumerGroupSnapshot>> {
        let ids = self
            .driver
            .list_consumer_groups()
            .await
            .map_err(|e| KconduitError::ClusterUnavailable(e.to_string()))?;

        let results = join_all(ids.iter().map(|id| self.snapshot(id))).await;

        let mut snapshots: Vec<ConsumerGroupSnapshot> = ids
            .iter()
            .zip(results)
            .filter_map(|(id, result)| match result {
                Ok(snapshot) => snapshot,
                Err(e) => {
                    warn!(group = %id, error = %e, "Failed to describe consumer group");
                    None
                }
            })
            .collect();

        snapshots.sort_by(|a, b| a.group_id.cmp(&b.group_id));
        Ok(snapshots)
    }

    pub async fn snapshot(&self, group_id: &str) -> Result<Option<ConsumerGroupSnapshot>> {
        let descriptions = self.driver.describe_consumer_groups(&[group_id.to_string()]).await?;
        let Some(description) = descriptions.into_iter().next() else {
            return Ok(None);
        };

        // A group without readable offsets still shows up, with no topics and no lag
        let (subscribed_topics, total_lag) = match self.lag.fetch_offsets(group_id).await {
            Ok(offsets) => {
                let lag = self.lag.lag_from_offsets(group_id, &offsets).await.unwrap_or_else(|e| {
                    debug!(group = %group_id, error = %e, "Lag unavailable");
                    0
                });
                (offsets.into_keys().collect(), lag)
            }
            Err(e) => {
                debug!(group = %group_id, error = %e, "Failed to fetch committed offsets");
                (BTreeSet::new(), 0)
            }
        };

        Ok(Some(ConsumerGroupSnapshot {
            group_id: description.group_id,
            state: description.state,
            members: description.members,
            subscribed_topics,
            total_lag,
        }))
    }
}
