//! Error types for emotrack-ingest
//!
//! Per-frame errors (malformed frame, inference) are recovered inside the
//! frame loop and reported to the client as events. Admission errors and
//! transport failures end the session. Persistence and report errors are
//! logged at the collaborator boundary and never crash the process.

use thiserror::Error;

/// Main error type for emotrack-ingest
#[derive(Error, Debug)]
pub enum Error {
    /// Credential missing, unknown, or inactive
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Frame size outside bounds or undecodable payload
    #[error("Malformed frame: {0}")]
    MalformedFrame(String),

    /// Face detector or emotion classifier failure
    #[error("Inference error: {0}")]
    Inference(String),

    /// Sample batch write or sample query failure
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Trend summary could not be stored
    #[error("Trend persistence error: {0}")]
    TrendPersistence(String),

    /// Report generation or delivery failure
    #[error("Report generation error: {0}")]
    Report(String),

    /// WebSocket send/receive failure
    #[error("Transport error: {0}")]
    Transport(String),

    /// Invalid configuration value
    #[error("Configuration error: {0}")]
    Config(String),

    /// Errors bubbled up from emotrack-common
    #[error(transparent)]
    Common(#[from] emotrack_common::Error),

    /// Database connection or query errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding of stored documents
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Convenience Result type using emotrack-ingest Error
pub type Result<T> = std::result::Result<T, Error>;
