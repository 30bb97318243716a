//! Signature orchestrator: the per-attempt signing state machine.
//!
//! ```text
//! IDLE ──discover──▶ DISCOVERING ──select──▶ READY ──sign_document──▶ SIGNING ──▶ SIGNED
//!                        │                     │                         │
//!                        └──────────▶ FAILED ◀─┴─────────────────────────┘
//! ```
//!
//! An attempt is a fresh [`SigningAttempt`]; SIGNED and FAILED are terminal.
//! Only `(thumbprint, document digest)` is handed to the credential source.
//! A signature becomes a SIGNED outcome only once its `DOCUMENT_SIGNED`
//! entry is committed to the case chain.

use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use bytes::Bytes;
use custodia_core::{
    actions, ActionType, AuditEntry, CaseId, Certificate, Clock, DocumentDigest, EntryDraft,
    Session, SignatureProof, SystemClock, Thumbprint,
};
use custodia_store::{AuditChainStore, ChainBackend};

use crate::directory::{CertificateDirectory, CertificateListing};
use crate::error::{OrchestratorError, Result, SigningError};
use crate::source::{CredentialSource, ObjectStore};

/// Default bound on a single signing call.
pub const DEFAULT_SIGN_TIMEOUT: Duration = Duration::from_secs(30);

/// Default bound on certificate discovery.
pub const DEFAULT_DISCOVER_TIMEOUT: Duration = Duration::from_secs(10);

/// Signing timeouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SigningConfig {
    pub sign_timeout: Duration,
    pub discover_timeout: Duration,
}

impl Default for SigningConfig {
    fn default() -> Self {
        Self {
            sign_timeout: DEFAULT_SIGN_TIMEOUT,
            discover_timeout: DEFAULT_DISCOVER_TIMEOUT,
        }
    }
}

/// State of one signing attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SigningState {
    Idle,
    Discovering,
    Ready,
    Signing,
    Signed,
    Failed,
}

impl SigningState {
    pub const fn as_str(self) -> &'static str {
        match self {
            SigningState::Idle => "IDLE",
            SigningState::Discovering => "DISCOVERING",
            SigningState::Ready => "READY",
            SigningState::Signing => "SIGNING",
            SigningState::Signed => "SIGNED",
            SigningState::Failed => "FAILED",
        }
    }

    pub const fn is_terminal(self) -> bool {
        matches!(self, SigningState::Signed | SigningState::Failed)
    }
}

impl fmt::Display for SigningState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One recorded state change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: SigningState,
    pub to: SigningState,
    /// Unix milliseconds.
    pub at: i64,
}

/// What to sign.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentInput {
    /// The exact document bytes.
    Bytes(Bytes),
    /// A digest computed by the caller.
    Digest(DocumentDigest),
    /// A key in the object store.
    ObjectKey(String),
}

/// Everything needed to drive a whole attempt in one call.
#[derive(Debug, Clone)]
pub struct SignRequest {
    pub session: Session,
    pub case_id: CaseId,
    pub thumbprint: Thumbprint,
    pub document: DocumentInput,
}

/// A successful signing: the proof and the chain entry binding it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedDocument {
    pub proof: SignatureProof,
    pub entry: AuditEntry,
}

type InFlight = Arc<Mutex<HashSet<Thumbprint>>>;

/// Exclusive claim on a thumbprint, released on drop.
struct InFlightClaim {
    in_flight: InFlight,
    thumbprint: Thumbprint,
}

impl InFlightClaim {
    fn try_claim(in_flight: &InFlight, thumbprint: &Thumbprint) -> Option<Self> {
        let mut set = in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        if !set.insert(thumbprint.clone()) {
            return None;
        }
        Some(Self {
            in_flight: in_flight.clone(),
            thumbprint: thumbprint.clone(),
        })
    }
}

impl Drop for InFlightClaim {
    fn drop(&mut self) {
        let mut set = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        set.remove(&self.thumbprint);
    }
}

/// Drives signing attempts against one credential source and one audit
/// chain store.
pub struct SignatureOrchestrator<B> {
    directory: CertificateDirectory,
    source: Arc<dyn CredentialSource>,
    objects: Option<Arc<dyn ObjectStore>>,
    store: Arc<AuditChainStore<B>>,
    clock: Arc<dyn Clock>,
    in_flight: InFlight,
    config: SigningConfig,
}

impl<B: ChainBackend> SignatureOrchestrator<B> {
    pub fn new(
        source: Arc<dyn CredentialSource>,
        store: Arc<AuditChainStore<B>>,
        config: SigningConfig,
    ) -> Self {
        Self::with_clock(source, store, config, Arc::new(SystemClock))
    }

    pub fn with_clock(
        source: Arc<dyn CredentialSource>,
        store: Arc<AuditChainStore<B>>,
        config: SigningConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            directory: CertificateDirectory::new(
                source.clone(),
                clock.clone(),
                config.discover_timeout,
            ),
            source,
            objects: None,
            store,
            clock,
            in_flight: Arc::new(Mutex::new(HashSet::new())),
            config,
        }
    }

    /// Attach an object store so documents can be signed by key.
    pub fn with_object_store(mut self, objects: Arc<dyn ObjectStore>) -> Self {
        self.objects = Some(objects);
        self
    }

    pub fn directory(&self) -> &CertificateDirectory {
        &self.directory
    }

    pub fn config(&self) -> &SigningConfig {
        &self.config
    }

    /// Whether a signing operation is outstanding on `thumbprint`.
    pub fn is_busy(&self, thumbprint: &Thumbprint) -> bool {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(thumbprint)
    }

    /// Start a new attempt in IDLE.
    pub fn begin(&self, session: Session, case_id: CaseId) -> SigningAttempt<'_, B> {
        SigningAttempt {
            orchestrator: self,
            session,
            case_id,
            state: SigningState::Idle,
            listing: Vec::new(),
            selected: None,
            failure: None,
            signed: None,
            history: Vec::new(),
        }
    }

    /// Drive a whole attempt: discover, select, sign.
    pub async fn sign(&self, request: SignRequest) -> Result<SignedDocument> {
        let mut attempt = self.begin(request.session, request.case_id);
        attempt.discover().await?;
        attempt.select(&request.thumbprint)?;
        attempt.sign_document(request.document).await
    }
}

impl<B> fmt::Debug for SignatureOrchestrator<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignatureOrchestrator")
            .field("directory", &self.directory)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// One pass through the signing state machine.
pub struct SigningAttempt<'a, B> {
    orchestrator: &'a SignatureOrchestrator<B>,
    session: Session,
    case_id: CaseId,
    state: SigningState,
    listing: Vec<CertificateListing>,
    selected: Option<Certificate>,
    failure: Option<SigningError>,
    signed: Option<SignedDocument>,
    history: Vec<Transition>,
}

impl<'a, B: ChainBackend> SigningAttempt<'a, B> {
    pub fn state(&self) -> SigningState {
        self.state
    }

    /// Why the attempt failed, once FAILED.
    pub fn failure(&self) -> Option<&SigningError> {
        self.failure.as_ref()
    }

    /// The result, once SIGNED.
    pub fn signed(&self) -> Option<&SignedDocument> {
        self.signed.as_ref()
    }

    /// Certificates found by `discover`.
    pub fn certificates(&self) -> &[CertificateListing] {
        &self.listing
    }

    /// The certificate chosen by `select`.
    pub fn selected(&self) -> Option<&Certificate> {
        self.selected.as_ref()
    }

    /// Every state change so far, oldest first.
    pub fn history(&self) -> &[Transition] {
        &self.history
    }

    fn transition(&mut self, to: SigningState) {
        let from = self.state;
        self.state = to;
        self.history.push(Transition {
            from,
            to,
            at: self.orchestrator.clock.now_millis(),
        });
        tracing::debug!(
            case_id = %self.case_id,
            from = from.as_str(),
            to = to.as_str(),
            "signing state transition"
        );
    }

    fn fail(&mut self, error: SigningError) -> OrchestratorError {
        self.transition(SigningState::Failed);
        tracing::warn!(
            case_id = %self.case_id,
            error = %error,
            retryable = error.is_retryable(),
            "signing attempt failed"
        );
        self.failure = Some(error.clone());
        OrchestratorError::Signing(error)
    }

    fn expect_state(&self, expected: SigningState, operation: &'static str) -> Result<()> {
        if self.state != expected {
            return Err(OrchestratorError::InvalidTransition {
                state: self.state,
                operation,
            });
        }
        Ok(())
    }

    /// IDLE → DISCOVERING. Fails with `NoCredentialsAvailable` when the
    /// probe finds nothing.
    pub async fn discover(&mut self) -> Result<&[CertificateListing]> {
        self.expect_state(SigningState::Idle, "discover")?;
        self.transition(SigningState::Discovering);

        let listing = self.orchestrator.directory.discover().await;
        if listing.is_empty() {
            return Err(self.fail(SigningError::NoCredentialsAvailable));
        }

        self.listing = listing;
        Ok(&self.listing)
    }

    /// DISCOVERING → READY with a discovered, unexpired certificate.
    pub fn select(&mut self, thumbprint: &Thumbprint) -> Result<&Certificate> {
        self.expect_state(SigningState::Discovering, "select")?;

        let found = self
            .listing
            .iter()
            .find(|l| &l.certificate.thumbprint == thumbprint)
            .cloned();
        let Some(listing) = found else {
            return Err(self.fail(SigningError::UnknownCertificate {
                thumbprint: thumbprint.clone(),
            }));
        };

        let certificate = listing.certificate;
        if certificate.is_expired_at(self.orchestrator.clock.now_millis()) {
            return Err(self.fail(SigningError::CertificateExpired {
                thumbprint: certificate.thumbprint,
                valid_until: certificate.valid_until,
            }));
        }

        self.transition(SigningState::Ready);
        Ok(self.selected.insert(certificate))
    }

    async fn resolve_digest(&self, document: DocumentInput) -> std::result::Result<DocumentDigest, SigningError> {
        match document {
            DocumentInput::Bytes(bytes) => Ok(DocumentDigest::of_document(&bytes)),
            DocumentInput::Digest(digest) => Ok(digest),
            DocumentInput::ObjectKey(key) => {
                let objects = self.orchestrator.objects.as_ref().ok_or_else(|| {
                    SigningError::DocumentUnavailable(format!("no object store for {}", key))
                })?;
                let timeout = self.orchestrator.config.sign_timeout;
                let bytes = match tokio::time::timeout(timeout, objects.fetch_document(&key)).await {
                    Ok(Ok(bytes)) => bytes,
                    Ok(Err(e)) => {
                        return Err(SigningError::DocumentUnavailable(format!("{}: {}", key, e)))
                    }
                    Err(_) => {
                        return Err(SigningError::DocumentUnavailable(format!(
                            "{}: fetch timed out after {}ms",
                            key,
                            timeout.as_millis()
                        )))
                    }
                };
                Ok(DocumentDigest::of_document(&bytes))
            }
        }
    }

    /// READY → SIGNING → SIGNED or FAILED.
    ///
    /// Re-checks expiry immediately before dispatch. The call to the
    /// credential source runs on a detached task that keeps the
    /// thumbprint claimed until the source answers, even if this attempt
    /// has already given up on it.
    pub async fn sign_document(&mut self, document: DocumentInput) -> Result<SignedDocument> {
        self.expect_state(SigningState::Ready, "sign_document")?;
        let Some(certificate) = self.selected.clone() else {
            return Err(OrchestratorError::InvalidTransition {
                state: self.state,
                operation: "sign_document",
            });
        };
        let thumbprint = certificate.thumbprint.clone();

        self.transition(SigningState::Signing);

        let digest = match self.resolve_digest(document).await {
            Ok(digest) => digest,
            Err(e) => return Err(self.fail(e)),
        };

        if certificate.is_expired_at(self.orchestrator.clock.now_millis()) {
            return Err(self.fail(SigningError::CertificateExpired {
                thumbprint,
                valid_until: certificate.valid_until,
            }));
        }

        let Some(claim) = InFlightClaim::try_claim(&self.orchestrator.in_flight, &thumbprint)
        else {
            return Err(self.fail(SigningError::CredentialBusy { thumbprint }));
        };

        let source = self.orchestrator.source.clone();
        let task_thumbprint = thumbprint.clone();
        let dispatch = tokio::spawn(async move {
            let _claim = claim;
            source.sign(&task_thumbprint, &digest).await
        });

        let timeout = self.orchestrator.config.sign_timeout;
        let signature_value = match tokio::time::timeout(timeout, dispatch).await {
            Ok(Ok(Ok(value))) => value,
            Ok(Ok(Err(e))) => return Err(self.fail(SigningError::CredentialSourceError(e.to_string()))),
            Ok(Err(join)) => {
                return Err(self.fail(SigningError::CredentialSourceError(format!(
                    "signing task failed: {}",
                    join
                ))))
            }
            Err(_) => {
                return Err(self.fail(SigningError::CredentialTimeout {
                    thumbprint,
                    timeout_ms: timeout.as_millis() as u64,
                }))
            }
        };

        let proof = SignatureProof {
            thumbprint,
            document_digest: digest,
            signature_value,
            produced_at: self.orchestrator.clock.now_millis(),
        };

        let details = match proof.audit_details() {
            Ok(details) => details,
            Err(e) => return Err(self.fail(SigningError::AuditUnavailable(e.to_string()))),
        };
        let draft = EntryDraft::from_session(
            self.case_id.clone(),
            &self.session,
            ActionType::from_static(actions::DOCUMENT_SIGNED),
            details,
        );
        let entry = match self.orchestrator.store.append(draft).await {
            Ok(entry) => entry,
            Err(e) => return Err(self.fail(SigningError::AuditUnavailable(e.to_string()))),
        };

        tracing::info!(
            case_id = %self.case_id,
            seq = entry.seq,
            thumbprint = %proof.thumbprint,
            document = %proof.document_digest,
            "document signed"
        );

        self.transition(SigningState::Signed);
        let signed = SignedDocument { proof, entry };
        self.signed = Some(signed.clone());
        Ok(signed)
    }
}

impl<B> fmt::Debug for SigningAttempt<'_, B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningAttempt")
            .field("case_id", &self.case_id)
            .field("state", &self.state)
            .field("failure", &self.failure)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keystore::{Identity, SoftwareKeystore};
    use crate::test_support::{cert, ScriptedSource, StalledObjects};
    use custodia_core::{ActorId, CertificateKind, ManualClock, Role, SigningDetails};
    use custodia_store::MemoryBackend;
    use std::sync::atomic::Ordering;

    const NOW: i64 = 1_736_870_400_000;

    struct Harness {
        clock: Arc<ManualClock>,
        store: Arc<AuditChainStore<MemoryBackend>>,
        orchestrator: SignatureOrchestrator<MemoryBackend>,
    }

    fn harness(source: Arc<dyn CredentialSource>, sign_timeout: Duration) -> Harness {
        let clock = Arc::new(ManualClock::new(NOW));
        let store = Arc::new(AuditChainStore::with_clock(
            MemoryBackend::new(),
            clock.clone(),
        ));
        let config = SigningConfig {
            sign_timeout,
            discover_timeout: Duration::from_secs(1),
        };
        let orchestrator =
            SignatureOrchestrator::with_clock(source, store.clone(), config, clock.clone());
        Harness {
            clock,
            store,
            orchestrator,
        }
    }

    fn judge() -> Session {
        Session::new(ActorId::new("judge-7").unwrap(), "Dr. Paulo", Role::Judge)
    }

    fn case() -> CaseId {
        CaseId::new("SIP-2024-8921").unwrap()
    }

    fn thumb(s: &str) -> Thumbprint {
        Thumbprint::new(s).unwrap()
    }

    fn valid_source() -> ScriptedSource {
        ScriptedSource::new(vec![
            cert("H1", "CN=Paulo", CertificateKind::Hardware, NOW + 60_000),
            cert("OLD", "CN=Paulo", CertificateKind::Hardware, NOW - 1),
        ])
    }

    #[tokio::test]
    async fn test_full_attempt_signs_and_binds() {
        let h = harness(Arc::new(valid_source()), Duration::from_secs(1));
        let mut attempt = h.orchestrator.begin(judge(), case());

        assert_eq!(attempt.discover().await.unwrap().len(), 2);
        assert_eq!(attempt.state(), SigningState::Discovering);
        attempt.select(&thumb("H1")).unwrap();
        assert_eq!(attempt.state(), SigningState::Ready);

        let signed = attempt
            .sign_document(DocumentInput::Bytes(Bytes::from_static(b"sentenca")))
            .await
            .unwrap();
        assert_eq!(attempt.state(), SigningState::Signed);
        assert_eq!(
            signed.proof.document_digest,
            DocumentDigest::of_document(b"sentenca")
        );
        assert!(signed.proof.is_bound_by(&signed.entry));
        assert_eq!(signed.entry.action_type.as_str(), actions::DOCUMENT_SIGNED);
        assert_eq!(signed.entry.actor_role, Role::Judge);

        let details = SigningDetails::parse(&signed.entry.details).unwrap();
        assert_eq!(details.thumbprint, thumb("H1"));
        assert!(!signed
            .entry
            .details
            .contains(&signed.proof.signature_value.to_hex()));

        let states: Vec<SigningState> = attempt.history().iter().map(|t| t.to).collect();
        assert_eq!(
            states,
            vec![
                SigningState::Discovering,
                SigningState::Ready,
                SigningState::Signing,
                SigningState::Signed
            ]
        );
        assert!(h.store.verify(&case()).await.unwrap().is_valid());
        assert!(!h.orchestrator.is_busy(&thumb("H1")));
    }

    #[tokio::test]
    async fn test_no_credentials() {
        let h = harness(Arc::new(ScriptedSource::new(vec![])), Duration::from_secs(1));
        let mut attempt = h.orchestrator.begin(judge(), case());

        let err = attempt.discover().await.unwrap_err();
        assert_eq!(err, OrchestratorError::Signing(SigningError::NoCredentialsAvailable));
        assert_eq!(attempt.state(), SigningState::Failed);
        assert!(h.store.read(&case()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_expired_at_selection() {
        let h = harness(Arc::new(valid_source()), Duration::from_secs(1));
        let mut attempt = h.orchestrator.begin(judge(), case());
        attempt.discover().await.unwrap();
        assert!(attempt.certificates().iter().any(|l| l.expired));

        let err = attempt.select(&thumb("OLD")).unwrap_err();
        let signing = err.signing_error().unwrap();
        assert!(matches!(signing, SigningError::CertificateExpired { .. }));
        assert!(!signing.is_retryable());
        assert_eq!(attempt.state(), SigningState::Failed);
        assert!(h.store.read(&case()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_expiry_rechecked_before_dispatch() {
        let source = Arc::new(ScriptedSource::new(vec![cert(
            "H1",
            "CN=Paulo",
            CertificateKind::Hardware,
            NOW + 1_000,
        )]));
        let h = harness(source.clone(), Duration::from_secs(1));
        let mut attempt = h.orchestrator.begin(judge(), case());
        attempt.discover().await.unwrap();
        attempt.select(&thumb("H1")).unwrap();

        // The certificate lapses between selection and dispatch.
        h.clock.advance(5_000);

        let err = attempt
            .sign_document(DocumentInput::Bytes(Bytes::from_static(b"doc")))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            OrchestratorError::Signing(SigningError::CertificateExpired { .. })
        ));
        assert_eq!(source.sign_calls.load(Ordering::SeqCst), 0);
        assert!(h.store.read(&case()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_thumbprint() {
        let h = harness(Arc::new(valid_source()), Duration::from_secs(1));
        let mut attempt = h.orchestrator.begin(judge(), case());
        attempt.discover().await.unwrap();

        let err = attempt.select(&thumb("ZZ")).unwrap_err();
        assert!(matches!(
            err,
            OrchestratorError::Signing(SigningError::UnknownCertificate { .. })
        ));
        assert!(err.signing_error().unwrap().is_retryable());
    }

    #[tokio::test]
    async fn test_invalid_transitions_leave_state_unchanged() {
        let h = harness(Arc::new(valid_source()), Duration::from_secs(1));
        let mut attempt = h.orchestrator.begin(judge(), case());

        let err = attempt.select(&thumb("H1")).unwrap_err();
        assert_eq!(
            err,
            OrchestratorError::InvalidTransition {
                state: SigningState::Idle,
                operation: "select"
            }
        );
        assert_eq!(attempt.state(), SigningState::Idle);

        let err = attempt
            .sign_document(DocumentInput::Digest(DocumentDigest::of_document(b"x")))
            .await
            .unwrap_err();
        assert!(matches!(err, OrchestratorError::InvalidTransition { .. }));
        assert!(attempt.history().is_empty());

        attempt.discover().await.unwrap();
        let err = attempt.discover().await.unwrap_err();
        assert!(matches!(
            err,
            OrchestratorError::InvalidTransition {
                state: SigningState::Discovering,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_failed_is_terminal() {
        let h = harness(Arc::new(ScriptedSource::new(vec![])), Duration::from_secs(1));
        let mut attempt = h.orchestrator.begin(judge(), case());
        attempt.discover().await.unwrap_err();

        assert!(attempt.state().is_terminal());
        assert!(matches!(
            attempt.discover().await.unwrap_err(),
            OrchestratorError::InvalidTransition {
                state: SigningState::Failed,
                ..
            }
        ));
        assert_eq!(attempt.failure(), Some(&SigningError::NoCredentialsAvailable));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_abandons_and_keeps_claim() {
        let source = Arc::new(valid_source().with_sign_delay(Duration::from_secs(60)));
        let h = harness(source.clone(), Duration::from_secs(2));

        let mut attempt = h.orchestrator.begin(judge(), case());
        attempt.discover().await.unwrap();
        attempt.select(&thumb("H1")).unwrap();
        let err = attempt
            .sign_document(DocumentInput::Bytes(Bytes::from_static(b"doc")))
            .await
            .unwrap_err();

        let signing = err.signing_error().unwrap();
        assert!(matches!(signing, SigningError::CredentialTimeout { timeout_ms: 2000, .. }));
        assert!(signing.is_retryable());
        assert!(h.store.read(&case()).await.unwrap().is_empty());

        // The abandoned operation still holds the credential.
        assert!(h.orchestrator.is_busy(&thumb("H1")));
        let mut second = h.orchestrator.begin(judge(), case());
        second.discover().await.unwrap();
        second.select(&thumb("H1")).unwrap();
        let err = second
            .sign_document(DocumentInput::Bytes(Bytes::from_static(b"doc")))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            OrchestratorError::Signing(SigningError::CredentialBusy { .. })
        ));

        // Once the source finally answers, the claim is released.
        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(source.completed_signs.load(Ordering::SeqCst), 1);
        assert!(!h.orchestrator.is_busy(&thumb("H1")));
        assert!(h.store.read(&case()).await.unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_requests_on_same_thumbprint() {
        let source = Arc::new(valid_source().with_sign_delay(Duration::from_millis(500)));
        let h = harness(source.clone(), Duration::from_secs(5));

        let request = |doc: &'static [u8]| SignRequest {
            session: judge(),
            case_id: case(),
            thumbprint: thumb("H1"),
            document: DocumentInput::Bytes(Bytes::from_static(doc)),
        };

        let (a, b) = tokio::join!(
            h.orchestrator.sign(request(b"one")),
            h.orchestrator.sign(request(b"two"))
        );

        let outcomes = [a, b];
        let signed = outcomes.iter().filter(|r| r.is_ok()).count();
        let busy = outcomes
            .iter()
            .filter(|r| {
                matches!(
                    r,
                    Err(OrchestratorError::Signing(SigningError::CredentialBusy { .. }))
                )
            })
            .count();
        assert_eq!((signed, busy), (1, 1));
        assert_eq!(source.sign_calls.load(Ordering::SeqCst), 1);
        assert_eq!(h.store.len(&case()).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_source_error() {
        let h = harness(Arc::new(valid_source().failing_sign()), Duration::from_secs(1));
        let err = h
            .orchestrator
            .sign(SignRequest {
                session: judge(),
                case_id: case(),
                thumbprint: thumb("H1"),
                document: DocumentInput::Bytes(Bytes::from_static(b"doc")),
            })
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            OrchestratorError::Signing(SigningError::CredentialSourceError(_))
        ));
        assert!(!h.orchestrator.is_busy(&thumb("H1")));
    }

    #[tokio::test]
    async fn test_object_key_without_store() {
        let h = harness(Arc::new(valid_source()), Duration::from_secs(1));
        let err = h
            .orchestrator
            .sign(SignRequest {
                session: judge(),
                case_id: case(),
                thumbprint: thumb("H1"),
                document: DocumentInput::ObjectKey("docs/1.pdf".into()),
            })
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            OrchestratorError::Signing(SigningError::DocumentUnavailable(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_object_store_fails_attempt() {
        let source = Arc::new(valid_source());
        let h = harness(source.clone(), Duration::from_secs(2));
        let orchestrator = h
            .orchestrator
            .with_object_store(Arc::new(StalledObjects::new(Duration::from_secs(3600))));

        let mut attempt = orchestrator.begin(judge(), case());
        attempt.discover().await.unwrap();
        attempt.select(&thumb("H1")).unwrap();
        let err = attempt
            .sign_document(DocumentInput::ObjectKey("docs/1.pdf".into()))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            OrchestratorError::Signing(SigningError::DocumentUnavailable(_))
        ));
        assert_eq!(attempt.state(), SigningState::Failed);
        assert_eq!(source.sign_calls.load(Ordering::SeqCst), 0);
        assert!(!orchestrator.is_busy(&thumb("H1")));
        assert!(h.store.read(&case()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_software_keystore_signature_verifies() {
        let keystore = Arc::new(SoftwareKeystore::new());
        let cert = keystore.import_seed(
            &[7; 32],
            Identity {
                subject_name: "CN=Paulo".into(),
                issuer_name: "CN=AC".into(),
                owner_tax_id: "1".into(),
                valid_until: NOW + 60_000,
            },
        );
        let h = harness(keystore.clone(), Duration::from_secs(1));

        let signed = h
            .orchestrator
            .sign(SignRequest {
                session: judge(),
                case_id: case(),
                thumbprint: cert.thumbprint.clone(),
                document: DocumentInput::Bytes(Bytes::from_static(b"decisao")),
            })
            .await
            .unwrap();

        assert!(keystore.verify(
            &cert.thumbprint,
            &signed.proof.document_digest,
            &signed.proof.signature_value
        ));
    }
}
