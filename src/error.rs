use thiserror::Error;

pub type Result<T> = std::result::Result<T, RustMqError>;

#[derive(Error, Debug)]
pub enum RustMqError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid subscription name: {0}")]
    InvalidSubscriptionName(String),

    #[error("Offset commit error: {0}")]
    Commit(String),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    #[error("Background task failed: {0}")]
    TaskJoin(#[from] tokio::task::JoinError),

    #[error("Offset committer tick panicked: {0}")]
    TickPanicked(String),
}
