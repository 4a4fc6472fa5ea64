use std::env;
use std::time::Duration;

use crate::error::{KconduitError, Result};

// --- CONFIG AGGREGATOR ---

#[derive(Debug, Clone)]
pub struct Config {
    pub cluster: ClusterConfig,
    pub log: LogConfig,
    pub consumer: ConsumerConfig,
    pub assistant: AssistantConfig,
}

impl Config {
    /// Reads `.env` (if any) and the process environment.
    /// The result is passed explicitly to every component that needs it.
    pub fn load() -> Result<Self> {
        dotenv::dotenv().ok();
        Ok(Self {
            cluster: ClusterConfig::load()?,
            log: LogConfig::load()?,
            consumer: ConsumerConfig::load()?,
            assistant: AssistantConfig::load()?,
        })
    }
}

// --- MODULES ---

// CLUSTER
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaslMechanism {
    Plain,
    ScramSha256,
    ScramSha512,
}

impl SaslMechanism {
    pub fn parse(raw: &str) -> Result<Self> {
        match raw.trim().to_uppercase().as_str() {
            "PLAIN" => Ok(Self::Plain),
            "SCRAM-SHA-256" => Ok(Self::ScramSha256),
            "SCRAM-SHA-512" => Ok(Self::ScramSha512),
            other => Err(KconduitError::Config(format!("unsupported SASL mechanism: {}", other))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SaslConfig {
    pub mechanism: SaslMechanism,
    pub username: String,
    pub password: String,
    pub tls: bool,
}

#[derive(Debug, Clone)]
pub struct ClusterConfig {
    pub brokers: Vec<String>,
    pub sasl: Option<SaslConfig>,
    pub topic_cache_ttl: Duration,
}

impl ClusterConfig {
    fn load() -> Result<Self> {
        let brokers: String = get_env("KCONDUIT_BROKERS", "localhost:9092")?;
        let sasl_enabled: bool = get_env("KCONDUIT_SASL_ENABLED", "false")?;

        let sasl = if sasl_enabled {
            let mechanism: String = get_env("KCONDUIT_SASL_MECHANISM", "PLAIN")?;
            let protocol: String = get_env("KCONDUIT_SASL_PROTOCOL", "SASL_PLAINTEXT")?;
            Some(SaslConfig {
                mechanism: SaslMechanism::parse(&mechanism)?,
                username:  get_env("KCONDUIT_SASL_USERNAME", "")?,
                password:  get_env("KCONDUIT_SASL_PASSWORD", "")?,
                tls:       protocol.eq_ignore_ascii_case("SASL_SSL"),
            })
        } else {
            None
        };

        let cache_secs: u64 = get_env("KCONDUIT_TOPIC_CACHE_SECS", "60")?;

        Ok(Self {
            brokers: parse_broker_list(&brokers),
            sasl,
            topic_cache_ttl: Duration::from_secs(cache_secs),
        })
    }
}

// LOGGING
#[derive(Debug, Clone)]
pub struct LogConfig {
    pub level: String,
    pub file: Option<String>,
}

impl LogConfig {
    fn load() -> Result<Self> {
        let file: String = get_env("KCONDUIT_LOG_FILE", "")?;
        Ok(Self {
            level: get_env("KCONDUIT_LOG_LEVEL", "info")?,
            file:  if file.is_empty() { None } else { Some(file) },
        })
    }
}

// CONSUMER
#[derive(Debug, Clone)]
pub struct ConsumerConfig {
    pub channel_capacity: usize,
}

impl ConsumerConfig {
    fn load() -> Result<Self> {
        Ok(Self {
            channel_capacity: get_env("KCONDUIT_CONSUMER_CHAN_CAP", "100")?,
        })
    }
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self { channel_capacity: 100 }
    }
}

// ASSISTANT
#[derive(Debug, Clone, Default)]
pub struct AssistantConfig {
    pub engine: Option<String>,
    pub model_override: Option<String>,
    pub openai_key: String,
    pub openai_model: String,
    pub gemini_key: String,
    pub gemini_model: String,
    pub anthropic_key: String,
    pub anthropic_model: String,
    pub ollama_url: String,
    pub ollama_model: String,
    pub timeout: Duration,
}

impl AssistantConfig {
    fn load() -> Result<Self> {
        let engine: String = get_env("KCONDUIT_AI_ENGINE", "")?;
        let model: String = get_env("KCONDUIT_AI_MODEL", "")?;
        let timeout_secs: u64 = get_env("KCONDUIT_AI_TIMEOUT_SECS", "30")?;

        Ok(Self {
            engine:          non_empty(engine),
            model_override:  non_empty(model),
            openai_key:      get_env("OPENAI_API_KEY", "")?,
            openai_model:    get_env("OPENAI_MODEL", "gpt-3.5-turbo")?,
            gemini_key:      get_env("GEMINI_API_KEY", "")?,
            gemini_model:    get_env("GEMINI_MODEL", "gemini-1.5-pro-latest")?,
            anthropic_key:   get_env("ANTHROPIC_API_KEY", "")?,
            anthropic_model: get_env("ANTHROPIC_MODEL", "claude-3-haiku-20240307")?,
            ollama_url:      get_env("OLLAMA_URL", "http://localhost:11434")?,
            ollama_model:    get_env("OLLAMA_MODEL", "llama2")?,
            timeout:         Duration::from_secs(timeout_secs),
        })
    }
}

// --- HELPERS ---

pub fn parse_broker_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|b| b.trim().to_string())
        .filter(|b| !b.is_empty())
        .collect()
}

fn non_empty(value: String) -> Option<String> {
    if value.trim().is_empty() { None } else { Some(value) }
}

fn get_env<T: std::str::FromStr>(key: &str, default: &str) -> Result<T> {
    env::var(key)
        .unwrap_or_else(|_| default.to_string())
        .parse()
        .map_err(|_| KconduitError::Config(format!("{} must be valid", key)))
}
