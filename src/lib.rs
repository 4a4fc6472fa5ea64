pub mod assistant;
pub mod cluster;
pub mod config;
pub mod consumer;
pub mod error;
pub mod groups;
pub mod logging;

use std::sync::Arc;

use crate::assistant::{build_provider, ActionExecutor, Interpreter, ProviderKind};
use crate::cluster::{ClusterAdmin, ClusterDriver};
use crate::config::Config;
use crate::consumer::MultiPartitionConsumer;
use crate::error::Result;
use crate::groups::LagCalculator;

pub use crate::error::KconduitError;

// ========================================
// ENGINE
// ========================================

/// Every component, wired to one shared driver handle.
/// Cheap to clone (all fields are Arcs).
#[derive(Clone)]
pub struct KconduitEngine {
    pub driver: Arc<dyn ClusterDriver>,
    pub admin: Arc<ClusterAdmin>,
    pub consumer: MultiPartitionConsumer,
    pub lag: LagCalculator,
    pub executor: ActionExecutor,
}

impl KconduitEngine {
    pub fn new(driver: Arc<dyn ClusterDriver>, config: &Config) -> Self {
        let admin = Arc::new(ClusterAdmin::new(driver.clone(), config.cluster.topic_cache_ttl));
        Self {
            consumer: MultiPartitionConsumer::new(driver.clone()),
            lag: LagCalculator::new(driver.clone()),
            executor: ActionExecutor::new(admin.clone()),
            admin,
            driver,
        }
    }

    /// Interpreter backed by the provider `config` selects.
    pub fn interpreter(&self, config: &Config) -> Result<(ProviderKind, Interpreter)> {
        let kind = ProviderKind::select(&config.assistant);
        let provider = build_provider(kind, &config.assistant)?;
        Ok((kind, Interpreter::new(provider, self.executor.clone())))
    }
}
