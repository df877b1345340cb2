//! Common error types for Emotrack

use thiserror::Error;

/// Common result type for Emotrack operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across Emotrack services
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[cfg(feature = "sqlx")]
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON encoding/decoding of stored documents
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Requested resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Label outside the fixed emotion set
    #[error("Unknown emotion label: {0}")]
    UnknownEmotion(String),
}
