use thiserror::Error;

/// Main error type for the fork monitor
#[derive(Error, Debug)]
pub enum ForkwatchError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Invalid configuration: {}", .0.join("; "))]
    InvalidConfig(Vec<String>),

    // Network errors
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("RPC error: {0}")]
    Rpc(String),

    // Serialization errors
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    // Node and chain data errors
    #[error("Invalid node: {0}")]
    InvalidNode(String),

    #[error("Invalid block hash: {0}")]
    InvalidHash(String),

    #[error("No connected peers")]
    NoConnectedPeers,

    // Notification errors
    #[error("Notification failed: {0}")]
    Notification(String),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for ForkwatchError
pub type Result<T> = std::result::Result<T, ForkwatchError>;
