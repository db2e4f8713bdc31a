//! Error types for Riposte.

use thiserror::Error;

/// Top-level error type for Riposte operations.
#[derive(Debug, Error)]
pub enum RiposteError {
    /// Tuning or configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Wire protocol errors
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Arena/roster errors
    #[error("Arena error: {0}")]
    Arena(String),
}

/// Result type alias for Riposte operations.
pub type RiposteResult<T> = Result<T, RiposteError>;
