//! The action grammar. One variant per action, decoded in a single tagged
//! step: an unknown `action` or an ill-typed field rejects the whole object.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ActionRecord {
    CreateTopic {
        name: String,
        #[serde(default)]
        partitions: Option<i32>,
        #[serde(default)]
        replication_factor: Option<i16>,
        #[serde(default, deserialize_with = "config_map")]
        configs: BTreeMap<String, String>,
    },
    ModifyPartitions {
        topic: String,
        partitions: i32,
    },
    ModifyAllPartitions {
        partitions: i32,
    },
    ModifyConfig {
        topic: String,
        #[serde(deserialize_with = "config_map")]
        configs: BTreeMap<String, String>,
    },
    ModifyAllConfigs {
        #[serde(deserialize_with = "config_map")]
        configs: BTreeMap<String, String>,
    },
    QueryTopics {
        filter: TopicFilter,
    },
    QueryConsumerGroups {
        filter: GroupFilter,
    },
}

impl ActionRecord {
    pub fn kind(&self) -> ActionKind {
        match self {
            ActionRecord::CreateTopic { .. } => ActionKind::CreateTopic,
            ActionRecord::ModifyPartitions { .. } => ActionKind::ModifyPartitions,
            ActionRecord::ModifyAllPartitions { .. } => ActionKind::ModifyAllPartitions,
            ActionRecord::ModifyConfig { .. } => ActionKind::ModifyConfig,
            ActionRecord::ModifyAllConfigs { .. } => ActionKind::ModifyAllConfigs,
            ActionRecord::QueryTopics { .. } => ActionKind::QueryTopics,
            ActionRecord::QueryConsumerGroups { .. } => ActionKind::QueryConsumerGroups,
        }
    }

    /// Topic the action is aimed at, `None` for cluster-wide actions.
    pub fn target(&self) -> Option<&str> {
        match self {
            ActionRecord::CreateTopic { name, .. } => Some(name),
            ActionRecord::ModifyPartitions { topic, .. } | ActionRecord::ModifyConfig { topic, .. } => Some(topic),
            _ => None,
        }
    }

    pub fn is_read_only(&self) -> bool {
        matches!(self, ActionRecord::QueryTopics { .. } | ActionRecord::QueryConsumerGroups { .. })
    }
}

/// Discriminators the interpreter recognises. Nothing here deletes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    CreateTopic,
    ModifyPartitions,
    ModifyAllPartitions,
    ModifyConfig,
    ModifyAllConfigs,
    QueryTopics,
    QueryConsumerGroups,
}

impl ActionKind {
    pub const ALL: &'static [ActionKind] = &[
        ActionKind::CreateTopic,
        ActionKind::ModifyPartitions,
        ActionKind::ModifyAllPartitions,
        ActionKind::ModifyConfig,
        ActionKind::ModifyAllConfigs,
        ActionKind::QueryTopics,
        ActionKind::QueryConsumerGroups,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::CreateTopic => "create_topic",
            ActionKind::ModifyPartitions => "modify_partitions",
            ActionKind::ModifyAllPartitions => "modify_all_partitions",
            ActionKind::ModifyConfig => "modify_config",
            ActionKind::ModifyAllConfigs => "modify_all_configs",
            ActionKind::QueryTopics => "query_topics",
            ActionKind::QueryConsumerGroups => "query_consumer_groups",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ========================================
// FILTERS
// ========================================

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct TopicFilter {
    pub name_contains: Option<String>,
    pub partitions_greater_than: Option<i32>,
    pub replication_factor: Option<i16>,
    /// `none` matches topics without an explicit codec.
    pub compression: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct GroupFilter {
    pub lag_greater_than: Option<i64>,
    pub group_id_contains: Option<String>,
    /// Case-insensitive.
    pub state: Option<String>,
}

// ========================================
// CONFIG VALUES
// ========================================

/// Models write `"86400000"`, `86400000` or `true` interchangeably.
#[derive(Deserialize)]
#[serde(untagged)]
enum ConfigValue {
    Text(String),
    Integer(i64),
    Float(f64),
    Flag(bool),
}

impl ConfigValue {
    fn into_string(self) -> String {
        match self {
            ConfigValue::Text(s) => s,
            ConfigValue::Integer(n) => n.to_string(),
            ConfigValue::Float(n) => n.to_string(),
            ConfigValue::Flag(b) => b.to_string(),
        }
    }
}

fn config_map<'de, D>(deserializer: D) -> std::result::Result<BTreeMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = BTreeMap::<String, ConfigValue>::deserialize(deserializer)?;
    Ok(raw.into_iter().map(|(k, v)| (k, v.into_string())).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_topic_decodes_with_optional_fields() {
        let record: ActionRecord = serde_json::from_str(
            r#"{"action": "create_topic", "name": "events", "partitions": 10, "configs": {"compression.type": "gzip", "retention.ms": 86400000}}"#,
        )
        .unwrap();

        assert_eq!(
            record,
            ActionRecord::CreateTopic {
                name: "events".to_string(),
                partitions: Some(10),
                replication_factor: None,
                configs: BTreeMap::from([
                    ("compression.type".to_string(), "gzip".to_string()),
                    ("retention.ms".to_string(), "86400000".to_string()),
                ]),
            }
        );
        assert_eq!(record.target(), Some("events"));
    }

    #[test]
    fn ill_typed_fields_fail_closed() {
        let bad = [
            r#"{"action": "modify_partitions", "topic": "t", "partitions": "ten"}"#,
            r#"{"action": "modify_partitions", "topic": "t"}"#,
            r#"{"action": "modify_config", "topic": "t", "configs": ["a"]}"#,
            r#"{"action": "query_topics"}"#,
            r#"{"action": "delete_topic", "name": "t"}"#,
            r#"{"name": "t"}"#,
        ];
        for raw in bad {
            assert!(serde_json::from_str::<ActionRecord>(raw).is_err(), "{} should not decode", raw);
        }
    }

    #[test]
    fn no_recognised_kind_deletes() {
        for kind in ActionKind::ALL {
            assert!(!kind.as_str().contains("delete"));
        }
    }
}
