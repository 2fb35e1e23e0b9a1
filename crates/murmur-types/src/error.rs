use thiserror::Error;

/// Errors surfaced by the external social network collaborator.
#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("transient network error: {0}")]
    Transient(String),

    #[error("rate limited")]
    RateLimited,

    #[error("item not found")]
    NotFound,

    #[error("duplicate content rejected by network")]
    DuplicateContent,

    #[error("publish rejected: {0}")]
    Rejected(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),
}

impl NetworkError {
    /// Rate-limit-class errors force a longer cooldown floor.
    pub fn is_rate_limit(&self) -> bool {
        matches!(self, NetworkError::RateLimited)
    }
}

/// Errors from the external content generator.
#[derive(Debug, Error)]
pub enum GenerateError {
    #[error("generation failed: {0}")]
    Provider(String),

    #[error("generator returned empty content")]
    Empty,
}

/// Errors from persistent storage implementations.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage connection error")]
    Connection,

    #[error("query error: {0}")]
    Query(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Errors loading or validating runtime configuration.
///
/// These are the only errors allowed to abort startup; a single bad agent
/// section skips that agent, an empty resulting set is fatal.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(String),

    #[error("failed to parse config: {0}")]
    Parse(String),

    #[error("invalid agent '{id}': {reason}")]
    InvalidAgent { id: String, reason: String },

    #[error("no valid agents configured")]
    NoAgents,
}

/// Errors crossing the reaction pipeline boundary.
///
/// Caught and logged at the pipeline/watcher boundary; never allowed to
/// crash the process.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Network(#[from] NetworkError),

    #[error(transparent)]
    Generate(#[from] GenerateError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("unknown agent: {0}")]
    UnknownAgent(String),
}
