//! Error types for Dailypost

use thiserror::Error;

pub type Result<T> = std::result::Result<T, DailypostError>;

#[derive(Error, Debug)]
pub enum DailypostError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Publish error: {0}")]
    Publish(#[from] PublishError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl DailypostError {
    /// Returns the appropriate exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            DailypostError::InvalidInput(_) => 3,
            DailypostError::Config(_) => 2,
            DailypostError::Store(_) => 1,
            DailypostError::Publish(_) => 1,
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database operation failed: {0}")]
    SqlxError(#[from] sqlx::Error),

    #[error("Migration failed: {0}")]
    MigrationError(#[from] sqlx::migrate::MigrateError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Malformed document: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Post not found: {0}")]
    PostNotFound(String),

    #[error("Corrupt record: {0}")]
    Corrupt(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

#[derive(Error, Debug, Clone)]
pub enum PublishError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("Rejected by publisher: {0}")]
    Rejected(String),
}
