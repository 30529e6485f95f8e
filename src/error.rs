//! Error types for the attest engine

use thiserror::Error;

/// Result type alias for attest operations
pub type Result<T> = std::result::Result<T, AttestError>;

/// Main error type for attest operations
#[derive(Error, Debug)]
pub enum AttestError {
    #[error("Script error: {0}")]
    Script(String),

    #[error("Keyword error: {0}")]
    Keyword(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Property file error: {0}")]
    Properties(String),
}
