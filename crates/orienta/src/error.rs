//! Error types for Orienta

use thiserror::Error;

/// Main error type for Orienta operations
#[derive(Error, Debug)]
pub enum OrientaError {
    /// Configuration errors (missing backend endpoint, bad bounds, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Knowledge index errors (search sidecar unreachable, bad payload)
    #[error("Retrieval error: {0}")]
    Retrieval(String),

    /// Generation backend errors (model unreachable, timeout, bad payload)
    #[error("Generation error: {0}")]
    Generation(String),

    /// Session errors (invalid session identifier)
    #[error("Session error: {0}")]
    Session(String),

    /// HTTP server errors
    #[error("Server error: {0}")]
    Server(String),

    /// Evaluation harness errors
    #[error("Evaluation error: {0}")]
    Evaluation(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// General errors
    #[error("{0}")]
    General(String),
}

/// Result type alias for Orienta operations
pub type Result<T> = std::result::Result<T, OrientaError>;
