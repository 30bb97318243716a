//! Seams to the outside world: credential sources and the object store.
//!
//! Both are untrusted for availability. A credential source is trusted for
//! the correctness of the signatures it returns.

use async_trait::async_trait;
use bytes::Bytes;
use custodia_core::{Certificate, DocumentDigest, SignatureValue, Thumbprint};

use crate::error::SourceError;

/// Result type for external source operations.
pub type SourceResult<T> = std::result::Result<T, SourceError>;

/// A provider of signing identities: a smart-card middleware, a USB token
/// bridge or an in-process keystore.
///
/// Implementations must be thread-safe. `sign` may be slow and may never
/// return; callers bound it with a timeout.
#[async_trait]
pub trait CredentialSource: Send + Sync + 'static {
    /// Enumerate the certificates currently reachable.
    async fn discover(&self) -> SourceResult<Vec<Certificate>>;

    /// Sign a document digest with the key behind `thumbprint`.
    ///
    /// Only the digest crosses this boundary, never the document.
    async fn sign(
        &self,
        thumbprint: &Thumbprint,
        digest: &DocumentDigest,
    ) -> SourceResult<SignatureValue>;
}

/// Read access to stored documents.
#[async_trait]
pub trait ObjectStore: Send + Sync + 'static {
    /// Fetch a document's bytes by storage key.
    async fn fetch_document(&self, key: &str) -> SourceResult<Bytes>;
}
