//! # Custodia Signing
//!
//! Certificate-backed signing of judicial documents, bound into the case
//! audit chain.
//!
//! ## Overview
//!
//! - [`CertificateDirectory`] enumerates signing identities from a
//!   [`CredentialSource`] (smart-card middleware, token bridge, or the
//!   in-process [`SoftwareKeystore`]).
//! - [`SignatureOrchestrator`] drives each [`SigningAttempt`] through
//!   `IDLE → DISCOVERING → READY → SIGNING → {SIGNED, FAILED}` and appends a
//!   `DOCUMENT_SIGNED` entry to the case chain on success.
//!
//! ## Concurrency
//!
//! At most one signing operation is in flight per thumbprint. A signing
//! call that exceeds its timeout is abandoned, not cancelled: the
//! credential stays busy until the source actually answers.

pub mod directory;
pub mod error;
pub mod keystore;
pub mod orchestrator;
pub mod source;

#[cfg(test)]
mod test_support;

pub use directory::{CertificateDirectory, CertificateListing};
pub use error::{OrchestratorError, Result, SigningError, SourceError};
pub use keystore::{thumbprint_of, Identity, SoftwareKeystore};
pub use orchestrator::{
    DocumentInput, SignRequest, SignatureOrchestrator, SignedDocument, SigningAttempt,
    SigningConfig, SigningState, Transition, DEFAULT_DISCOVER_TIMEOUT, DEFAULT_SIGN_TIMEOUT,
};
pub use source::{CredentialSource, ObjectStore, SourceResult};
