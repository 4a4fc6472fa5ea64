use std::collections::BTreeMap;
use std::fmt;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use hashlink::LinkedHashMap;
use serde::Serialize;

// ========================================
// TOPICS
// ========================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TopicInfo {
    pub name: String,
    pub partitions: i32,
    pub replication_factor: i16,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PartitionInfo {
    pub id: i32,
    pub leader: i32,
    pub replicas: Vec<i32>,
    pub isr: Vec<i32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TopicDetails {
    pub name: String,
    pub partitions: i32,
    pub replication_factor: i16,
    pub configs: BTreeMap<String, String>,
    pub partition_details: Vec<PartitionInfo>,
}

impl TopicDetails {
    /// `compression.type` with the broker's "producer" default folded into `None`.
    pub fn compression(&self) -> Option<&str> {
        match self.configs.get("compression.type").map(String::as_str) {
            None | Some("") | Some("producer") => None,
            Some(other) => Some(other),
        }
    }
}

// ========================================
// BROKERS
// ========================================

pub const DEFAULT_KAFKA_PORT: i32 = 9092;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum BrokerStatus {
    Online,
    Offline,
    Unknown,
}

#[derive(Debug, Clone, Serialize)]
pub struct BrokerInfo {
    pub id: i32,
    pub host: String,
    pub port: i32,
    pub rack: Option<String>,
    pub is_controller: bool,
    pub api_version: String,
    pub status: BrokerStatus,
}

impl BrokerInfo {
    pub fn from_address(id: i32, address: &str) -> Self {
        let (host, port) = split_host_port(address);
        Self {
            id,
            host,
            port,
            rack: None,
            is_controller: false,
            api_version: "Unknown".to_string(),
            status: BrokerStatus::Online,
        }
    }
}

/// `host:port`; the port defaults to 9092 when missing or not a number.
pub fn split_host_port(address: &str) -> (String, i32) {
    if let Some(idx) = address.rfind(':') {
        if let Ok(port) = address[idx + 1..].parse::<i32>() {
            return (address[..idx].to_string(), port);
        }
    }
    (address.to_string(), DEFAULT_KAFKA_PORT)
}

/// Infers the broker release from the highest API keys it advertises.
pub fn kafka_version_from_api_keys(api_keys: &[i16]) -> &'static str {
    if api_keys.is_empty() {
        return "Unknown";
    }
    let max_key = api_keys.iter().copied().max().unwrap_or(0);
    let has = |key: i16| api_keys.contains(&key);

    if has(67) {
        return if max_key >= 68 { "3.5+" } else { "3.0+" };
    }
    if has(60) {
        return "2.8+";
    }
    if has(48) {
        return "2.6+";
    }
    if has(43) {
        return "2.4+";
    }
    if has(36) || max_key >= 35 {
        return "2.0+";
    }
    if max_key >= 20 {
        return "1.0+";
    }
    "0.11+"
}

// ========================================
// CONSUMER GROUPS
// ========================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum GroupState {
    Stable,
    PreparingRebalance,
    CompletingRebalance,
    Empty,
    Dead,
}

impl GroupState {
    pub fn as_str(&self) -> &'static str {
        match self {
            GroupState::Stable => "Stable",
            GroupState::PreparingRebalance => "PreparingRebalance",
            GroupState::CompletingRebalance => "CompletingRebalance",
            GroupState::Empty => "Empty",
            GroupState::Dead => "Dead",
        }
    }
}

impl fmt::Display for GroupState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct GroupDescription {
    pub group_id: String,
    pub state: GroupState,
    pub members: Vec<String>,
}

/// topic -> partition -> committed offset (-1 means no commit)
pub type GroupOffsets = BTreeMap<String, BTreeMap<i32, i64>>;

// ========================================
// MESSAGES
// ========================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOffset {
    Oldest,
    Newest,
    /// Same literal offset on every partition.
    Specific(i64),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConsumedMessage {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    pub key: Bytes,
    pub value: Bytes,
    pub timestamp: DateTime<Utc>,
    #[serde(skip)]
    pub headers: LinkedHashMap<String, String>,
}

impl ConsumedMessage {
    pub fn size(&self) -> u64 {
        (self.key.len() + self.value.len()) as u64
    }

    pub fn key_preview(&self) -> String {
        preview(&self.key)
    }

    pub fn value_preview(&self) -> String {
        preview(&self.value)
    }
}

/// UTF-8 text as is, anything else as `0x<hex>`.
pub fn preview(data: &[u8]) -> String {
    match std::str::from_utf8(data) {
        Ok(text) => text.to_string(),
        Err(_) => format!("0x{}", hex::encode(data)),
    }
}

/// One record as written by a producer.
#[derive(Debug, Clone, Default)]
pub struct ProduceRecord {
    pub key: Option<Bytes>,
    pub value: Bytes,
    pub headers: Vec<(String, String)>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_port_defaults_to_kafka_port() {
        assert_eq!(split_host_port("broker-1:29092"), ("broker-1".to_string(), 29092));
        assert_eq!(split_host_port("broker-1"), ("broker-1".to_string(), 9092));
        assert_eq!(split_host_port("broker-1:abc"), ("broker-1:abc".to_string(), 9092));
    }

    #[test]
    fn version_inference_follows_api_keys() {
        assert_eq!(kafka_version_from_api_keys(&[]), "Unknown");
        assert_eq!(kafka_version_from_api_keys(&[0, 1, 67, 68]), "3.5+");
        assert_eq!(kafka_version_from_api_keys(&[0, 67]), "3.0+");
        assert_eq!(kafka_version_from_api_keys(&[0, 60]), "2.8+");
        assert_eq!(kafka_version_from_api_keys(&[0, 22]), "1.0+");
        assert_eq!(kafka_version_from_api_keys(&[0, 3]), "0.11+");
    }

    #[test]
    fn binary_values_preview_as_hex() {
        assert_eq!(preview(b"hello"), "hello");
        assert_eq!(preview(&[0xff, 0x00]), "0xff00");
    }
}
