//! Error types for the signing module.

use custodia_core::Thumbprint;
use thiserror::Error;

use crate::orchestrator::SigningState;

/// Why a signing attempt failed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SigningError {
    /// Discovery found no certificates. Normal when no token is plugged in.
    #[error("no signing credentials available")]
    NoCredentialsAvailable,

    /// The certificate had expired when checked.
    #[error("certificate {thumbprint} expired at {valid_until}")]
    CertificateExpired {
        thumbprint: Thumbprint,
        valid_until: i64,
    },

    /// The credential source did not answer within the timeout.
    #[error("credential {thumbprint} did not respond within {timeout_ms} ms")]
    CredentialTimeout {
        thumbprint: Thumbprint,
        timeout_ms: u64,
    },

    /// Another signing operation is in flight on the same credential.
    #[error("credential {thumbprint} is busy")]
    CredentialBusy { thumbprint: Thumbprint },

    /// The credential source reported an error.
    #[error("credential source error: {0}")]
    CredentialSourceError(String),

    /// The selected thumbprint was not in the discovered listing.
    #[error("unknown certificate {thumbprint}")]
    UnknownCertificate { thumbprint: Thumbprint },

    /// The document could not be fetched from the object store.
    #[error("document unavailable: {0}")]
    DocumentUnavailable(String),

    /// A signature was produced but could not be recorded in the audit chain.
    #[error("audit chain unavailable: {0}")]
    AuditUnavailable(String),
}

impl SigningError {
    /// Whether a fresh attempt may succeed. An expired certificate stays
    /// expired.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, SigningError::CertificateExpired { .. })
    }
}

/// Errors returned while driving a signing attempt.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum OrchestratorError {
    /// The operation is not valid in the attempt's current state. The state
    /// is unchanged.
    #[error("cannot {operation} while {state}")]
    InvalidTransition {
        state: SigningState,
        operation: &'static str,
    },

    /// The attempt moved to FAILED.
    #[error(transparent)]
    Signing(#[from] SigningError),
}

impl OrchestratorError {
    /// The signing failure, if the attempt failed.
    pub fn signing_error(&self) -> Option<&SigningError> {
        match self {
            OrchestratorError::Signing(e) => Some(e),
            OrchestratorError::InvalidTransition { .. } => None,
        }
    }
}

/// Error reported by an external credential source or object store.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SourceError {
    /// The source could not be reached.
    #[error("unavailable: {0}")]
    Unavailable(String),

    /// The source refused the request.
    #[error("rejected: {0}")]
    Rejected(String),

    /// The requested item does not exist.
    #[error("not found: {0}")]
    NotFound(String),
}

/// Result type for orchestrator operations.
pub type Result<T> = std::result::Result<T, OrchestratorError>;
