//! Signing identities and signature proofs.
//!
//! Certificates are read-only metadata sourced from an external credential
//! provider. A [`SignatureProof`] is created once per successful signing and
//! bound to the case chain by a `DOCUMENT_SIGNED` entry whose details are
//! produced by [`SignatureProof::audit_details`].

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::crypto::{Blake3Hash, DocumentDigest};
use crate::entry::AuditEntry;
use crate::error::CoreError;
use crate::types::actions;

/// Identifier of a signing certificate as reported by its credential source.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Thumbprint(String);

impl Thumbprint {
    /// Create a thumbprint, rejecting empty input.
    pub fn new(value: impl Into<String>) -> Result<Self, CoreError> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(CoreError::EmptyThumbprint);
        }
        Ok(Self(value))
    }

    /// Thumbprint spelled as the full hex of a digest.
    pub fn from_digest(digest: &Blake3Hash) -> Self {
        Self(digest.to_hex())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Thumbprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Thumbprint({})", self.0)
    }
}

impl fmt::Display for Thumbprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Thumbprint {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Thumbprint> for String {
    fn from(t: Thumbprint) -> Self {
        t.0
    }
}

/// Where a certificate's private key lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CertificateKind {
    /// Smart card or USB token.
    Hardware,
    /// Key held by a software keystore.
    Software,
}

/// Signing identity metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Certificate {
    pub thumbprint: Thumbprint,
    pub subject_name: String,
    pub issuer_name: String,
    /// Expiry instant (Unix milliseconds).
    pub valid_until: i64,
    /// Taxpayer id of the certificate holder.
    pub owner_tax_id: String,
    pub kind: CertificateKind,
}

impl Certificate {
    /// Whether the certificate has expired at `now` (Unix milliseconds).
    pub fn is_expired_at(&self, now: i64) -> bool {
        now >= self.valid_until
    }
}

/// Raw signature bytes returned by a credential source.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureValue(pub Bytes);

impl SignatureValue {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }

    /// Digest of the signature bytes, used to reference the signature in
    /// log fields without copying the signature material itself.
    pub fn digest(&self) -> Blake3Hash {
        Blake3Hash::hash(&self.0)
    }
}

impl fmt::Debug for SignatureValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SignatureValue({} bytes)", self.0.len())
    }
}

impl From<Vec<u8>> for SignatureValue {
    fn from(bytes: Vec<u8>) -> Self {
        Self(Bytes::from(bytes))
    }
}

/// Result of a successful signing operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureProof {
    pub thumbprint: Thumbprint,
    pub document_digest: DocumentDigest,
    pub signature_value: SignatureValue,
    /// When the credential source returned the signature (Unix milliseconds).
    pub produced_at: i64,
}

/// The `details` payload of a `DOCUMENT_SIGNED` entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SigningDetails {
    pub thumbprint: Thumbprint,
    /// Hex of the document digest.
    pub document_digest: String,
    /// Hex of the Blake3 digest of the signature value.
    pub signature_digest: String,
    pub produced_at: i64,
}

impl SigningDetails {
    /// Parse the details string of a signing entry.
    pub fn parse(details: &str) -> Result<Self, CoreError> {
        serde_json::from_str(details).map_err(|e| CoreError::MalformedDetails(e.to_string()))
    }
}

impl SignatureProof {
    /// Structured details linking this proof to an audit entry.
    pub fn signing_details(&self) -> SigningDetails {
        SigningDetails {
            thumbprint: self.thumbprint.clone(),
            document_digest: self.document_digest.to_hex(),
            signature_digest: self.signature_value.digest().to_hex(),
            produced_at: self.produced_at,
        }
    }

    /// Serialized details for the `DOCUMENT_SIGNED` entry.
    pub fn audit_details(&self) -> Result<String, CoreError> {
        serde_json::to_string(&self.signing_details())
            .map_err(|e| CoreError::EncodingError(e.to_string()))
    }

    /// Check that `entry` is an intact `DOCUMENT_SIGNED` record of this proof.
    pub fn is_bound_by(&self, entry: &AuditEntry) -> bool {
        if entry.action_type.as_str() != actions::DOCUMENT_SIGNED || !entry.is_intact() {
            return false;
        }
        match SigningDetails::parse(&entry.details) {
            Ok(details) => details == self.signing_details(),
            Err(_) => false,
        }
    }
}

/// Whether `entry` binds `proof`. See [`SignatureProof::is_bound_by`].
pub fn verify_binding(entry: &AuditEntry, proof: &SignatureProof) -> bool {
    proof.is_bound_by(entry)
}
