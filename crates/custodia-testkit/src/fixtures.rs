//! Test fixtures: sessions, case ids and a wired-up signing environment.

use std::sync::Arc;

use custodia_core::{ActorId, CaseId, Certificate, ManualClock, Role, Session};
use custodia_signing::{Identity, SignatureOrchestrator, SigningConfig};
use custodia_store::{AuditChainStore, MemoryBackend};

use crate::fakes::{FakeCredentialSource, InMemoryObjectStore};

/// Case used throughout the scenario tests.
pub const CASE_ID: &str = "SIP-2024-8921";

/// 2025-01-14T16:00:00Z in Unix milliseconds.
pub const START_MILLIS: i64 = 1_736_870_400_000;

/// One day in milliseconds.
pub const DAY_MILLIS: i64 = 86_400_000;

pub fn case_id(id: &str) -> CaseId {
    CaseId::new(id).expect("valid case id")
}

/// A session for `role` with a stable actor id.
pub fn session(role: Role) -> Session {
    let token = role.as_str().to_lowercase();
    Session::new(
        ActorId::new(format!("u-{}", token)).expect("valid actor id"),
        format!("Usuario {}", token),
        role,
    )
}

/// One session per role.
pub fn sessions() -> Vec<Session> {
    Role::ALL.into_iter().map(session).collect()
}

/// Certificate identity with placeholder issuer and tax id.
pub fn identity(subject: &str, valid_until: i64) -> Identity {
    Identity {
        subject_name: subject.to_string(),
        issuer_name: "CN=AC Judiciario Teste".to_string(),
        owner_tax_id: "123.456.789-00".to_string(),
        valid_until,
    }
}

/// A memory-backed store, a fake credential source and a manual clock
/// sharing one timeline.
pub struct TestFixture {
    pub clock: Arc<ManualClock>,
    pub source: Arc<FakeCredentialSource>,
    pub objects: Arc<InMemoryObjectStore>,
    pub store: Arc<AuditChainStore<MemoryBackend>>,
}

impl TestFixture {
    pub fn new() -> Self {
        let clock = Arc::new(ManualClock::new(START_MILLIS));
        Self {
            store: Arc::new(AuditChainStore::with_clock(
                MemoryBackend::new(),
                clock.clone(),
            )),
            source: Arc::new(FakeCredentialSource::new()),
            objects: Arc::new(InMemoryObjectStore::new()),
            clock,
        }
    }

    /// Add a key valid for another year.
    pub fn valid_certificate(&self, subject: &str) -> Certificate {
        self.source
            .add_identity(identity(subject, START_MILLIS + 365 * DAY_MILLIS))
    }

    /// Add a key that expired yesterday.
    pub fn expired_certificate(&self, subject: &str) -> Certificate {
        self.source
            .add_identity(identity(subject, START_MILLIS - DAY_MILLIS))
    }

    /// An orchestrator over this fixture's source, store and clock.
    pub fn orchestrator(&self, config: SigningConfig) -> SignatureOrchestrator<MemoryBackend> {
        SignatureOrchestrator::with_clock(
            self.source.clone(),
            self.store.clone(),
            config,
            self.clock.clone(),
        )
        .with_object_store(self.objects.clone())
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sessions_cover_all_roles() {
        let all = sessions();
        assert_eq!(all.len(), Role::ALL.len());
        assert_eq!(session(Role::Analyst).id.as_str(), "u-analista");
    }

    #[test]
    fn test_certificate_expiry() {
        let fixture = TestFixture::new();
        assert!(!fixture.valid_certificate("CN=A").is_expired_at(START_MILLIS));
        assert!(fixture.expired_certificate("CN=B").is_expired_at(START_MILLIS));
    }
}
