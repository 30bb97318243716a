//! Certificate directory: discovery of signing identities.
//!
//! Discovery probes a credential source that may be slow or absent. A
//! probe that times out or errors is logged and yields an empty listing;
//! an empty listing is a normal outcome, not an error.

use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use custodia_core::{Certificate, CertificateKind, Clock, Thumbprint};

use crate::source::CredentialSource;

/// A discovered certificate with its expiry status at probe time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateListing {
    pub certificate: Certificate,
    /// Expired at the time of discovery. Expired certificates are listed
    /// so the user can see them, but cannot sign.
    pub expired: bool,
}

/// Sort key: hardware tokens first, then subject name, then thumbprint.
fn listing_order(a: &Certificate, b: &Certificate) -> Ordering {
    fn kind_rank(kind: CertificateKind) -> u8 {
        match kind {
            CertificateKind::Hardware => 0,
            CertificateKind::Software => 1,
        }
    }

    kind_rank(a.kind)
        .cmp(&kind_rank(b.kind))
        .then_with(|| a.subject_name.cmp(&b.subject_name))
        .then_with(|| a.thumbprint.cmp(&b.thumbprint))
}

/// Enumerates signing identities from a credential source.
#[derive(Clone)]
pub struct CertificateDirectory {
    source: Arc<dyn CredentialSource>,
    clock: Arc<dyn Clock>,
    timeout: Duration,
}

impl CertificateDirectory {
    pub fn new(source: Arc<dyn CredentialSource>, clock: Arc<dyn Clock>, timeout: Duration) -> Self {
        Self {
            source,
            clock,
            timeout,
        }
    }

    /// Probe the credential source.
    ///
    /// Never fails: an unreachable source yields an empty listing.
    pub async fn discover(&self) -> Vec<CertificateListing> {
        let certificates = match tokio::time::timeout(self.timeout, self.source.discover()).await {
            Ok(Ok(certificates)) => certificates,
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "certificate discovery failed");
                return Vec::new();
            }
            Err(_) => {
                tracing::warn!(
                    timeout_ms = self.timeout.as_millis() as u64,
                    "certificate discovery timed out"
                );
                return Vec::new();
            }
        };

        // A thumbprint reported twice keeps the first report.
        let now = self.clock.now_millis();
        let mut seen = HashSet::new();
        let mut listings: Vec<CertificateListing> = certificates
            .into_iter()
            .filter(|certificate| seen.insert(certificate.thumbprint.clone()))
            .map(|certificate| CertificateListing {
                expired: certificate.is_expired_at(now),
                certificate,
            })
            .collect();
        listings.sort_by(|a, b| listing_order(&a.certificate, &b.certificate));

        tracing::debug!(found = listings.len(), "certificate discovery complete");
        listings
    }

    /// Look up one certificate with a fresh probe.
    pub async fn find(&self, thumbprint: &Thumbprint) -> Option<CertificateListing> {
        self.discover()
            .await
            .into_iter()
            .find(|listing| &listing.certificate.thumbprint == thumbprint)
    }
}

impl std::fmt::Debug for CertificateDirectory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CertificateDirectory")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}
