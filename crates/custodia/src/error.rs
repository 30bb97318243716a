//! Error types for the compliance facade.

use custodia_core::CoreError;
use custodia_perms::{AuthorizationError, GateError, PermsError};
use custodia_signing::OrchestratorError;
use custodia_store::{IntegrityError, StoreError};
use thiserror::Error;

/// Errors that can occur during compliance operations.
#[derive(Debug, Error)]
pub enum ComplianceError {
    /// Invalid or unreadable configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// Permission table error.
    #[error("permission error: {0}")]
    Perms(#[from] PermsError),

    /// Caller fault at the authorization gate.
    #[error("authorization gate error: {0}")]
    Gate(#[from] GateError),

    /// The action was denied.
    #[error("unauthorized: {0}")]
    Unauthorized(#[from] AuthorizationError),

    /// Audit store error.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    /// The audit chain failed verification.
    #[error("integrity error: {0}")]
    Integrity(#[from] IntegrityError),

    /// Signing failed.
    #[error("signing error: {0}")]
    Signing(#[from] OrchestratorError),

    /// Core error.
    #[error("core error: {0}")]
    Core(#[from] CoreError),
}

/// Result type for compliance operations.
pub type Result<T> = std::result::Result<T, ComplianceError>;
