use thiserror::Error;

pub type Result<T> = std::result::Result<T, KconduitError>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum KconduitError {
    /// Metadata query failed as a whole (broker unreachable, RPC timeout).
    #[error("cluster unavailable: {0}")]
    ClusterUnavailable(String),

    #[error("topic {0} not found")]
    TopicNotFound(String),

    #[error("failed to get partitions for topic {topic}: {reason}")]
    PartitionEnumeration { topic: String, reason: String },

    /// A single cluster RPC failed. Never retried here.
    #[error("{0}")]
    Rpc(String),

    /// Local to one request or one batch step.
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    ProviderUnavailable(String),

    #[error("{provider} API key not configured. Set {env_var} environment variable")]
    AuthenticationMissing {
        provider: &'static str,
        env_var: &'static str,
    },

    #[error("no actions found in assistant response")]
    NoActionsFound,

    #[error("config error: {0}")]
    Config(String),
}

impl KconduitError {
    /// `NoActionsFound` is surfaced as "nothing to do", not as a failure.
    pub fn is_nothing_to_do(&self) -> bool {
        matches!(self, KconduitError::NoActionsFound)
    }
}
