#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use uuid::Uuid;

use kconduit::assistant::{CompletionProvider, Interpreter};
use kconduit::cluster::types::ProduceRecord;
use kconduit::cluster::{ClusterDriver, MemoryCluster};
use kconduit::config::{AssistantConfig, ClusterConfig, Config, ConsumerConfig, LogConfig};
use kconduit::error::{KconduitError, Result};
use kconduit::KconduitEngine;

// ========================================
// CLUSTER FIXTURES
// ========================================

pub fn unique(prefix: &str) -> String {
    format!("{}-{}", prefix, Uuid::new_v4().simple())
}

pub fn test_config() -> Config {
    Config {
        cluster: ClusterConfig {
            brokers: vec!["localhost:9092".to_string()],
            sasl: None,
            topic_cache_ttl: Duration::from_secs(60),
        },
        log: LogConfig { level: "info".to_string(), file: None },
        consumer: ConsumerConfig::default(),
        assistant: AssistantConfig::default(),
    }
}

pub fn setup_cluster() -> Arc<MemoryCluster> {
    Arc::new(MemoryCluster::new())
}

pub fn setup_engine(cluster: &Arc<MemoryCluster>) -> KconduitEngine {
    KconduitEngine::new(cluster.clone(), &test_config())
}

pub async fn create_topic(cluster: &MemoryCluster, partitions: i32) -> String {
    let name = unique("topic");
    cluster.create_topic(&name, partitions, 1).await.unwrap();
    name
}

/// Keyless records go round-robin, so `count` multiples of the partition
/// count spread evenly.
pub async fn produce_n(cluster: &MemoryCluster, topic: &str, count: usize) {
    for i in 0..count {
        let record = ProduceRecord {
            key: None,
            value: Bytes::from(format!("message-{}", i)),
            headers: vec![],
        };
        cluster.produce(topic, record).await.unwrap();
    }
}

pub async fn produce_keyed(cluster: &MemoryCluster, topic: &str, key: &str, value: &str) -> (i32, i64) {
    let record = ProduceRecord {
        key: Some(Bytes::copy_from_slice(key.as_bytes())),
        value: Bytes::copy_from_slice(value.as_bytes()),
        headers: vec![("trace".to_string(), "t-1".to_string())],
    };
    cluster.produce(topic, record).await.unwrap()
}

// ========================================
// COMPLETION STUB
// ========================================

/// Replies with queued responses in order and remembers what it was asked.
pub struct ScriptedProvider {
    responses: Mutex<VecDeque<Result<String>>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedProvider {
    pub fn new(responses: Vec<Result<String>>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into()),
            prompts: Mutex::new(Vec::new()),
        })
    }

    pub fn replying(text: &str) -> Arc<Self> {
        Self::new(vec![Ok(text.to_string())])
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().clone()
    }
}

#[async_trait]
impl CompletionProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    fn model(&self) -> &str {
        "stub"
    }

    async fn complete(&self, _system_prompt: &str, user_text: &str) -> Result<String> {
        self.prompts.lock().push(user_text.to_string());
        self.responses
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(KconduitError::ProviderUnavailable("no scripted response left".to_string())))
    }
}

pub fn setup_interpreter(engine: &KconduitEngine, provider: Arc<ScriptedProvider>) -> Interpreter {
    Interpreter::new(provider, engine.executor.clone())
}
