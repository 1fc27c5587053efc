use thiserror::Error;

/// Errors from the generic cache and data stores.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The backing store rejected or failed an operation
    #[error("Storage error: {0}")]
    Storage(String),

    /// Error serializing or deserializing stored values
    #[error("Serde error: {0}")]
    Serde(#[from] serde_json::Error),

    /// Error from Redis cache operations
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),
}
