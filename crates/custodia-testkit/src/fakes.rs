//! Fake external collaborators: a controllable credential source and an
//! in-memory object store.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use custodia_core::{Certificate, DocumentDigest, SignatureValue, Thumbprint};
use custodia_signing::{
    CredentialSource, Identity, ObjectStore, SoftwareKeystore, SourceError, SourceResult,
};

#[derive(Debug, Default)]
struct Behaviour {
    discover_delay: Option<Duration>,
    sign_delay: Option<Duration>,
    discover_error: Option<SourceError>,
    sign_error: Option<SourceError>,
}

/// A credential source whose latency and failures are set by the test.
///
/// Signing keys live in a [`SoftwareKeystore`], so produced signatures are
/// real Ed25519 signatures. Certificates added with
/// [`list_only`](Self::list_only) are discoverable but have no key behind
/// them, like a token whose middleware lists it but cannot reach it.
#[derive(Debug, Default)]
pub struct FakeCredentialSource {
    keystore: SoftwareKeystore,
    listed: Mutex<Vec<Certificate>>,
    behaviour: Mutex<Behaviour>,
    discover_calls: AtomicUsize,
    sign_calls: AtomicUsize,
}

impl FakeCredentialSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Generate a signing key for `identity`.
    pub fn add_identity(&self, identity: Identity) -> Certificate {
        self.keystore.generate(identity)
    }

    /// Import a signing key from a fixed seed.
    pub fn add_seeded(&self, seed: &[u8; 32], identity: Identity) -> Certificate {
        self.keystore.import_seed(seed, identity)
    }

    /// List a certificate without a usable key.
    pub fn list_only(&self, certificate: Certificate) {
        self.listed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(certificate);
    }

    pub fn set_discover_delay(&self, delay: Duration) {
        self.behaviour().discover_delay = Some(delay);
    }

    pub fn set_sign_delay(&self, delay: Duration) {
        self.behaviour().sign_delay = Some(delay);
    }

    pub fn fail_discovery(&self, error: SourceError) {
        self.behaviour().discover_error = Some(error);
    }

    pub fn fail_signing(&self, error: SourceError) {
        self.behaviour().sign_error = Some(error);
    }

    /// Restore instant, successful behaviour.
    pub fn reset(&self) {
        *self.behaviour() = Behaviour::default();
    }

    pub fn discover_calls(&self) -> usize {
        self.discover_calls.load(Ordering::SeqCst)
    }

    pub fn sign_calls(&self) -> usize {
        self.sign_calls.load(Ordering::SeqCst)
    }

    /// Check a signature against the key behind `thumbprint`.
    pub fn verify(
        &self,
        thumbprint: &Thumbprint,
        digest: &DocumentDigest,
        signature: &SignatureValue,
    ) -> bool {
        self.keystore.verify(thumbprint, digest, signature)
    }

    fn behaviour(&self) -> std::sync::MutexGuard<'_, Behaviour> {
        self.behaviour.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl CredentialSource for FakeCredentialSource {
    async fn discover(&self) -> SourceResult<Vec<Certificate>> {
        self.discover_calls.fetch_add(1, Ordering::SeqCst);
        let (delay, error) = {
            let b = self.behaviour();
            (b.discover_delay, b.discover_error.clone())
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(error) = error {
            return Err(error);
        }

        let mut certificates = self.keystore.discover().await?;
        certificates.extend(
            self.listed
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .iter()
                .cloned(),
        );
        Ok(certificates)
    }

    async fn sign(
        &self,
        thumbprint: &Thumbprint,
        digest: &DocumentDigest,
    ) -> SourceResult<SignatureValue> {
        self.sign_calls.fetch_add(1, Ordering::SeqCst);
        let (delay, error) = {
            let b = self.behaviour();
            (b.sign_delay, b.sign_error.clone())
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(error) = error {
            return Err(error);
        }
        self.keystore.sign(thumbprint, digest).await
    }
}

/// Object store backed by a map.
#[derive(Debug, Default)]
pub struct InMemoryObjectStore {
    objects: RwLock<HashMap<String, Bytes>>,
}

impl InMemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&self, key: impl Into<String>, bytes: impl Into<Bytes>) {
        self.objects
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.into(), bytes.into());
    }

    pub fn remove(&self, key: &str) -> Option<Bytes> {
        self.objects
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key)
    }
}

#[async_trait]
impl ObjectStore for InMemoryObjectStore {
    async fn fetch_document(&self, key: &str) -> SourceResult<Bytes> {
        self.objects
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
            .ok_or_else(|| SourceError::NotFound(key.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::identity;

    #[tokio::test]
    async fn test_fake_source_signs_with_real_keys() {
        let source = FakeCredentialSource::new();
        let cert = source.add_identity(identity("CN=Juiz", i64::MAX));
        let digest = DocumentDigest::of_document(b"sentenca");

        let sig = source.sign(&cert.thumbprint, &digest).await.unwrap();
        assert!(source.verify(&cert.thumbprint, &digest, &sig));
        assert_eq!(source.sign_calls(), 1);
    }

    #[tokio::test]
    async fn test_listed_only_certificate_cannot_sign() {
        let source = FakeCredentialSource::new();
        let keyed = source.add_identity(identity("CN=A", i64::MAX));
        let mut listed = keyed.clone();
        listed.thumbprint = Thumbprint::new("TOKEN-01").unwrap();
        source.list_only(listed.clone());

        assert_eq!(source.discover().await.unwrap().len(), 2);
        let err = source
            .sign(&listed.thumbprint, &DocumentDigest::of_document(b"x"))
            .await
            .unwrap_err();
        assert!(matches!(err, SourceError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_failures_and_reset() {
        let source = FakeCredentialSource::new();
        source.fail_discovery(SourceError::Unavailable("offline".into()));
        assert!(source.discover().await.is_err());
        source.reset();
        assert!(source.discover().await.unwrap().is_empty());
        assert_eq!(source.discover_calls(), 2);
    }

    #[tokio::test]
    async fn test_object_store() {
        let objects = InMemoryObjectStore::new();
        objects.put("laudo.pdf", Bytes::from_static(b"%PDF"));
        assert_eq!(
            objects.fetch_document("laudo.pdf").await.unwrap(),
            Bytes::from_static(b"%PDF")
        );
        assert!(objects.remove("laudo.pdf").is_some());
        assert!(matches!(
            objects.fetch_document("laudo.pdf").await,
            Err(SourceError::NotFound(_))
        ));
    }
}
