//! In-process software keystore.
//!
//! Holds Ed25519 signing keys and exposes them as `software` certificates.
//! A certificate's thumbprint is the hex Blake3 digest of its public key.

use std::collections::HashMap;
use std::fmt;
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};

use custodia_core::{
    Blake3Hash, Certificate, CertificateKind, DocumentDigest, SignatureValue, Thumbprint,
};

use crate::error::SourceError;
use crate::source::{CredentialSource, SourceResult};

/// Identity details recorded on a software certificate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub subject_name: String,
    pub issuer_name: String,
    pub owner_tax_id: String,
    /// Expiry instant (Unix milliseconds).
    pub valid_until: i64,
}

struct StoredKey {
    signing_key: SigningKey,
    certificate: Certificate,
}

/// Ed25519 keys held in memory.
#[derive(Default)]
pub struct SoftwareKeystore {
    keys: RwLock<HashMap<Thumbprint, StoredKey>>,
}

/// Thumbprint of an Ed25519 public key.
pub fn thumbprint_of(key: &VerifyingKey) -> Thumbprint {
    Thumbprint::from_digest(&Blake3Hash::hash(key.as_bytes()))
}

impl SoftwareKeystore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Generate a new random key for `identity`.
    pub fn generate(&self, identity: Identity) -> Certificate {
        let mut rng = rand::thread_rng();
        self.insert(SigningKey::generate(&mut rng), identity)
    }

    /// Import a key from a 32-byte seed.
    pub fn import_seed(&self, seed: &[u8; 32], identity: Identity) -> Certificate {
        self.insert(SigningKey::from_bytes(seed), identity)
    }

    fn insert(&self, signing_key: SigningKey, identity: Identity) -> Certificate {
        let thumbprint = thumbprint_of(&signing_key.verifying_key());
        let certificate = Certificate {
            thumbprint: thumbprint.clone(),
            subject_name: identity.subject_name,
            issuer_name: identity.issuer_name,
            valid_until: identity.valid_until,
            owner_tax_id: identity.owner_tax_id,
            kind: CertificateKind::Software,
        };

        let mut keys = self.keys.write().unwrap_or_else(PoisonError::into_inner);
        keys.insert(
            thumbprint,
            StoredKey {
                signing_key,
                certificate: certificate.clone(),
            },
        );
        certificate
    }

    /// Public key behind a thumbprint.
    pub fn verifying_key(&self, thumbprint: &Thumbprint) -> Option<VerifyingKey> {
        let keys = self.keys.read().unwrap_or_else(PoisonError::into_inner);
        keys.get(thumbprint).map(|k| k.signing_key.verifying_key())
    }

    /// Check a signature produced by this keystore.
    pub fn verify(
        &self,
        thumbprint: &Thumbprint,
        digest: &DocumentDigest,
        signature: &SignatureValue,
    ) -> bool {
        let Some(key) = self.verifying_key(thumbprint) else {
            return false;
        };
        let Ok(signature) = Signature::from_slice(signature.as_bytes()) else {
            return false;
        };
        key.verify(digest.as_bytes(), &signature).is_ok()
    }

    pub fn len(&self) -> usize {
        self.keys.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for SoftwareKeystore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SoftwareKeystore({} keys)", self.len())
    }
}

#[async_trait]
impl CredentialSource for SoftwareKeystore {
    async fn discover(&self) -> SourceResult<Vec<Certificate>> {
        let keys = self.keys.read().unwrap_or_else(PoisonError::into_inner);
        Ok(keys.values().map(|k| k.certificate.clone()).collect())
    }

    async fn sign(
        &self,
        thumbprint: &Thumbprint,
        digest: &DocumentDigest,
    ) -> SourceResult<SignatureValue> {
        let keys = self.keys.read().unwrap_or_else(PoisonError::into_inner);
        let stored = keys
            .get(thumbprint)
            .ok_or_else(|| SourceError::NotFound(thumbprint.to_string()))?;
        let signature = stored.signing_key.sign(digest.as_bytes());
        Ok(SignatureValue::from(signature.to_bytes().to_vec()))
    }
}
