//! Scripted credential source and object store for unit tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use custodia_core::{
    Certificate, CertificateKind, DocumentDigest, SignatureValue, Thumbprint,
};

use crate::error::SourceError;
use crate::source::{CredentialSource, ObjectStore, SourceResult};

pub fn cert(thumbprint: &str, subject: &str, kind: CertificateKind, valid_until: i64) -> Certificate {
    Certificate {
        thumbprint: Thumbprint::new(thumbprint).unwrap(),
        subject_name: subject.to_string(),
        issuer_name: "CN=AC Teste".to_string(),
        valid_until,
        owner_tax_id: "123.456.789-00".to_string(),
        kind,
    }
}

#[derive(Debug, Default)]
pub struct ScriptedSource {
    certificates: Vec<Certificate>,
    discover_delay: Option<Duration>,
    sign_delay: Option<Duration>,
    fail_discovery: bool,
    fail_sign: bool,
    pub sign_calls: Arc<AtomicUsize>,
    pub completed_signs: Arc<AtomicUsize>,
}

impl ScriptedSource {
    pub fn new(certificates: Vec<Certificate>) -> Self {
        Self {
            certificates,
            ..Self::default()
        }
    }

    pub fn with_discover_delay(mut self, delay: Duration) -> Self {
        self.discover_delay = Some(delay);
        self
    }

    pub fn with_sign_delay(mut self, delay: Duration) -> Self {
        self.sign_delay = Some(delay);
        self
    }

    pub fn failing_discovery(mut self) -> Self {
        self.fail_discovery = true;
        self
    }

    pub fn failing_sign(mut self) -> Self {
        self.fail_sign = true;
        self
    }
}

#[async_trait]
impl CredentialSource for ScriptedSource {
    async fn discover(&self) -> SourceResult<Vec<Certificate>> {
        if let Some(delay) = self.discover_delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_discovery {
            return Err(SourceError::Unavailable("middleware offline".into()));
        }
        Ok(self.certificates.clone())
    }

    async fn sign(
        &self,
        thumbprint: &Thumbprint,
        digest: &DocumentDigest,
    ) -> SourceResult<SignatureValue> {
        self.sign_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.sign_delay {
            tokio::time::sleep(delay).await;
        }
        self.completed_signs.fetch_add(1, Ordering::SeqCst);
        if self.fail_sign {
            return Err(SourceError::Rejected("PIN blocked".into()));
        }
        let mut value = thumbprint.as_str().as_bytes().to_vec();
        value.extend_from_slice(digest.as_bytes());
        Ok(SignatureValue::from(value))
    }
}

/// Object store that takes `delay` to answer any fetch.
#[derive(Debug)]
pub struct StalledObjects {
    delay: Duration,
}

impl StalledObjects {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

#[async_trait]
impl ObjectStore for StalledObjects {
    async fn fetch_document(&self, _key: &str) -> SourceResult<Bytes> {
        tokio::time::sleep(self.delay).await;
        Ok(Bytes::from_static(b"late"))
    }
}
