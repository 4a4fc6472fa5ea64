//! Action Executor
//!
//! Runs action records against the cluster, one at a time, in order.
//! A step always yields an outcome; no step's failure stops the next one,
//! and nothing is rolled back.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{info, warn};

use crate::assistant::action::{ActionRecord, GroupFilter, TopicFilter};
use crate::assistant::report::{self, TopicMatch};
use crate::cluster::admin::ClusterAdmin;
use crate::error::Result;
use crate::groups::ConsumerGroupSnapshot;

// ========================================
// OUTCOMES
// ========================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    Success(String),
    Failure(String),
}

impl StepOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, StepOutcome::Success(_))
    }

    pub fn message(&self) -> &str {
        match self {
            StepOutcome::Success(m) | StepOutcome::Failure(m) => m,
        }
    }
}

#[derive(Debug, Clone)]
pub struct BatchStep {
    /// 0-based position in parse order.
    pub step_index: usize,
    pub record: ActionRecord,
    pub outcome: StepOutcome,
}

/// One step per record, in record order.
#[derive(Debug, Clone, Default)]
pub struct BatchResult {
    steps: Vec<BatchStep>,
}

impl BatchResult {
    pub fn steps(&self) -> &[BatchStep] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn failures(&self) -> impl Iterator<Item = &BatchStep> {
        self.steps.iter().filter(|s| !s.outcome.is_success())
    }
}

/// Per-key results of applying a config map to one topic.
#[derive(Default)]
struct ConfigResults {
    applied: Vec<String>,
    failed: Vec<String>,
}

impl ConfigResults {
    fn all_failed(&self) -> bool {
        self.applied.is_empty() && !self.failed.is_empty()
    }
}

// ========================================
// EXECUTOR
// ========================================

#[derive(Clone)]
pub struct ActionExecutor {
    admin: Arc<ClusterAdmin>,
}

impl ActionExecutor {
    pub fn new(admin: Arc<ClusterAdmin>) -> Self {
        Self { admin }
    }

    pub async fn execute_batch(&self, records: Vec<ActionRecord>) -> BatchResult {
        let mut steps = Vec::with_capacity(records.len());

        for (step_index, record) in records.into_iter().enumerate() {
            info!(step = step_index + 1, action = %record.kind(), "Executing batch step");
            let outcome = self.execute(&record).await;
            if !outcome.is_success() {
                warn!(step = step_index + 1, action = %record.kind(), reason = %outcome.message(), "Batch step failed, continuing");
            }
            steps.push(BatchStep { step_index, record, outcome });
        }

        BatchResult { steps }
    }

    pub async fn execute(&self, record: &ActionRecord) -> StepOutcome {
        match record {
            ActionRecord::CreateTopic { name, partitions, replication_factor, configs } => {
                self.create_topic(name, *partitions, *replication_factor, configs).await
            }
            ActionRecord::ModifyPartitions { topic, partitions } => self.modify_partitions(topic, *partitions).await,
            ActionRecord::ModifyAllPartitions { partitions } => self.modify_all_partitions(*partitions).await,
            ActionRecord::ModifyConfig { topic, configs } => self.modify_config(topic, configs).await,
            ActionRecord::ModifyAllConfigs { configs } => self.modify_all_configs(configs).await,
            ActionRecord::QueryTopics { filter } => match self.query_topics(filter).await {
                Ok(matches) => StepOutcome::Success(report::render_topics(&matches)),
                Err(e) => StepOutcome::Failure(format!("Failed to fetch topics: {}", e)),
            },
            ActionRecord::QueryConsumerGroups { filter } => match self.query_consumer_groups(filter).await {
                Ok(groups) => StepOutcome::Success(report::render_groups(&groups)),
                Err(e) => StepOutcome::Failure(format!("Failed to fetch consumer groups: {}", e)),
            },
        }
    }

    // --- Mutations ---

    async fn create_topic(
        &self,
        name: &str,
        partitions: Option<i32>,
        replication_factor: Option<i16>,
        configs: &BTreeMap<String, String>,
    ) -> StepOutcome {
        if name.trim().is_empty() {
            return StepOutcome::Failure("topic name cannot be empty".to_string());
        }
        if matches!(partitions, Some(p) if p < 1) {
            return StepOutcome::Failure("number of partitions must be at least 1".to_string());
        }
        if matches!(replication_factor, Some(rf) if rf < 1) {
            return StepOutcome::Failure("replication factor must be at least 1".to_string());
        }
        let partitions = partitions.unwrap_or(1);
        let replication_factor = replication_factor.unwrap_or(1);

        if let Err(e) = self.admin.create_topic(name, partitions, replication_factor).await {
            return StepOutcome::Failure(format!("Failed to create topic {}: {}", name, e));
        }

        let mut message = format!(
            "Created topic '{}' with {} partitions and replication factor {}",
            name, partitions, replication_factor
        );
        if !configs.is_empty() {
            // The topic exists at this point; config failures do not undo that
            let results = self.apply_configs(name, configs).await;
            if !results.applied.is_empty() {
                message.push_str(&format!("; applied {}", results.applied.join(", ")));
            }
            if !results.failed.is_empty() {
                message.push_str(&format!("; failed {}", results.failed.join(", ")));
            }
        }
        StepOutcome::Success(message)
    }

    async fn modify_partitions(&self, topic: &str, partitions: i32) -> StepOutcome {
        if topic.trim().is_empty() {
            return StepOutcome::Failure("topic name cannot be empty".to_string());
        }
        if partitions < 1 {
            return StepOutcome::Failure("number of partitions must be at least 1".to_string());
        }

        match self.admin.modify_topic_partitions(topic, partitions).await {
            Ok(()) => StepOutcome::Success(format!("Increased partitions for topic '{}' to {}", topic, partitions)),
            Err(e) => StepOutcome::Failure(format!("Failed to modify partitions for {}: {}", topic, e)),
        }
    }

    /// Grows every topic below `partitions`; topics already at or above it
    /// are skipped. The topic list is read once, before the first change.
    async fn modify_all_partitions(&self, partitions: i32) -> StepOutcome {
        if partitions < 1 {
            return StepOutcome::Failure("number of partitions must be at least 1".to_string());
        }
        let topics = match self.admin.topic_details().await {
            Ok(topics) => topics,
            Err(e) => return StepOutcome::Failure(format!("Failed to fetch topics: {}", e)),
        };

        let mut updated = Vec::new();
        let mut failed = Vec::new();
        for topic in topics.iter().filter(|t| t.partitions < partitions) {
            match self.admin.modify_topic_partitions(&topic.name, partitions).await {
                Ok(()) => updated.push(format!("{} ({}->{})", topic.name, topic.partitions, partitions)),
                Err(e) => {
                    warn!(topic = %topic.name, error = %e, "Failed to modify partitions");
                    failed.push(format!("{}: {}", topic.name, e));
                }
            }
        }

        if updated.is_empty() && failed.is_empty() {
            return StepOutcome::Success(format!("All topics already have {} or more partitions", partitions));
        }

        let mut parts = Vec::new();
        if !updated.is_empty() {
            parts.push(format!("Updated {} topic(s): {}", updated.len(), updated.join(", ")));
        }
        if !failed.is_empty() {
            parts.push(format!("Failed to update {} topic(s): {}", failed.len(), failed.join(", ")));
        }
        let message = parts.join("; ");

        if updated.is_empty() { StepOutcome::Failure(message) } else { StepOutcome::Success(message) }
    }

    async fn modify_config(&self, topic: &str, configs: &BTreeMap<String, String>) -> StepOutcome {
        if topic.trim().is_empty() {
            return StepOutcome::Failure("topic name cannot be empty".to_string());
        }
        if configs.is_empty() {
            return StepOutcome::Failure("no configuration entries given".to_string());
        }

        let results = self.apply_configs(topic, configs).await;
        if results.all_failed() {
            StepOutcome::Failure(format!(
                "Failed to update configuration for topic '{}': {}",
                topic,
                results.failed.join(", ")
            ))
        } else if !results.failed.is_empty() {
            StepOutcome::Success(format!(
                "Partially updated topic '{}'. Succeeded: {}; failed: {}",
                topic,
                results.applied.join(", "),
                results.failed.join(", ")
            ))
        } else {
            StepOutcome::Success(format!(
                "Updated configuration for topic '{}': {}",
                topic,
                results.applied.join(", ")
            ))
        }
    }

    async fn modify_all_configs(&self, configs: &BTreeMap<String, String>) -> StepOutcome {
        if configs.is_empty() {
            return StepOutcome::Failure("no configuration entries given".to_string());
        }
        let topics = match self.admin.topic_details().await {
            Ok(topics) => topics,
            Err(e) => return StepOutcome::Failure(format!("Failed to fetch topics: {}", e)),
        };
        if topics.is_empty() {
            return StepOutcome::Success("No topics to update".to_string());
        }

        let mut updated = Vec::new();
        let mut failed = Vec::new();
        for topic in &topics {
            let results = self.apply_configs(&topic.name, configs).await;
            if !results.applied.is_empty() {
                updated.push(format!("{}: {}", topic.name, results.applied.join(", ")));
            }
            if !results.failed.is_empty() {
                failed.push(format!("{}: {}", topic.name, results.failed.join(", ")));
            }
        }

        let mut parts = Vec::new();
        if !updated.is_empty() {
            parts.push(format!("Updated configuration for {} topic(s): {}", updated.len(), updated.join("; ")));
        }
        if !failed.is_empty() {
            parts.push(format!("Failed for {} topic(s): {}", failed.len(), failed.join("; ")));
        }
        let message = parts.join("; ");

        if updated.is_empty() { StepOutcome::Failure(message) } else { StepOutcome::Success(message) }
    }

    async fn apply_configs(&self, topic: &str, configs: &BTreeMap<String, String>) -> ConfigResults {
        let mut results = ConfigResults::default();
        for (key, value) in configs {
            match self.admin.update_topic_config(topic, key, value).await {
                Ok(()) => results.applied.push(format!("{}={}", key, value)),
                Err(e) => {
                    warn!(topic = %topic, key = %key, error = %e, "Failed to apply config");
                    results.failed.push(format!("{}: {}", key, e));
                }
            }
        }
        results
    }

    // --- Queries ---

    pub async fn query_topics(&self, filter: &TopicFilter) -> Result<Vec<TopicMatch>> {
        let topics = self.admin.topic_details().await?;
        let mut matches = Vec::new();

        for topic in topics {
            if let Some(needle) = &filter.name_contains {
                if !topic.name.contains(needle.as_str()) {
                    continue;
                }
            }
            if let Some(min) = filter.partitions_greater_than {
                if topic.partitions <= min {
                    continue;
                }
            }
            if let Some(rf) = filter.replication_factor {
                if topic.replication_factor != rf {
                    continue;
                }
            }

            let mut compression = None;
            if let Some(wanted) = &filter.compression {
                // A topic whose config cannot be read is kept
                if let Ok(details) = self.admin.topic_config(&topic.name).await {
                    let actual = details.configs.get("compression.type").cloned().unwrap_or_default();
                    if !compression_matches(wanted, &actual) {
                        continue;
                    }
                    compression = Some(actual);
                }
            }

            matches.push(TopicMatch { topic, compression });
        }

        Ok(matches)
    }

    pub async fn query_consumer_groups(&self, filter: &GroupFilter) -> Result<Vec<ConsumerGroupSnapshot>> {
        let groups = self.admin.consumer_groups().await?;

        Ok(groups
            .into_iter()
            .filter(|g| filter.lag_greater_than.map_or(true, |min| g.total_lag > min))
            .filter(|g| {
                filter
                    .group_id_contains
                    .as_deref()
                    .map_or(true, |needle| g.group_id.contains(needle))
            })
            .filter(|g| {
                filter
                    .state
                    .as_deref()
                    .map_or(true, |state| g.state.as_str().eq_ignore_ascii_case(state))
            })
            .collect())
    }
}

/// `none` stands for "no codec set on the topic".
fn compression_matches(wanted: &str, actual: &str) -> bool {
    if wanted == "none" {
        matches!(actual, "" | "producer" | "none")
    } else {
        wanted == actual
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn none_compression_matches_broker_defaults() {
        assert!(compression_matches("none", ""));
        assert!(compression_matches("none", "producer"));
        assert!(!compression_matches("none", "gzip"));
        assert!(compression_matches("gzip", "gzip"));
        assert!(!compression_matches("gzip", "snappy"));
    }
}
