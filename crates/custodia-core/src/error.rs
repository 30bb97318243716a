//! Error types for Custodia Core.

use thiserror::Error;

/// Errors raised while constructing or encoding core values.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CoreError {
    #[error("case id must not be empty")]
    EmptyCaseId,

    #[error("actor id must not be empty")]
    EmptyActorId,

    #[error("action identifier must not be empty")]
    EmptyActionType,

    #[error("thumbprint must not be empty")]
    EmptyThumbprint,

    #[error("unknown role: {0}")]
    UnknownRole(String),

    #[error("invalid digest: {0}")]
    InvalidDigest(String),

    #[error("encoding error: {0}")]
    EncodingError(String),

    #[error("malformed entry details: {0}")]
    MalformedDetails(String),
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
