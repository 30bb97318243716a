//! The compliance facade: authorization, auditing and signing in one place.
//!
//! Every sensitive action goes through [`Compliance::perform`]: the gate
//! decides, and the outcome is written to the case chain. Allowed actions
//! are recorded under their own action type; denials with a known actor
//! are recorded as `ACCESS_DENIED`. A denial without a session has no actor
//! to attribute, so it is only traced.

use std::sync::Arc;

use custodia_core::{
    actions, ActionType, AuditEntry, CaseId, Clock, EntryDraft, Session, SignatureProof,
    SigningDetails, SystemClock, Thumbprint,
};
use custodia_perms::{
    AuthorizationError, AuthorizationGate, Decision, DenyReason, PermissionModel, PermissionTable,
};
use custodia_signing::{
    CertificateListing, CredentialSource, DocumentInput, ObjectStore, SignRequest,
    SignatureOrchestrator, SignedDocument, SigningConfig,
};
use custodia_store::{
    verify_chain, AuditChainStore, ChainBackend, MemoryBackend, SqliteBackend, VerifyOutcome,
};
use serde::Serialize;

use crate::config::{BackendKind, ComplianceConfig};
use crate::error::{ComplianceError, Result};

/// Result of [`Compliance::perform`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The action was allowed and recorded.
    Allowed(AuditEntry),
    /// The action was denied. `entry` is the `ACCESS_DENIED` record, absent
    /// when there was no session.
    Denied {
        reason: DenyReason,
        entry: Option<AuditEntry>,
    },
}

impl Outcome {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Outcome::Allowed(_))
    }

    /// The entry written for this outcome, if any.
    pub fn entry(&self) -> Option<&AuditEntry> {
        match self {
            Outcome::Allowed(entry) => Some(entry),
            Outcome::Denied { entry, .. } => entry.as_ref(),
        }
    }
}

/// Details recorded on an `ACCESS_DENIED` entry.
#[derive(Debug, Serialize)]
struct DenialDetails<'a> {
    requested_action: &'a str,
    reason: &'static str,
    details: &'a str,
}

fn denial_error(session: Option<&Session>, action: &str) -> AuthorizationError {
    match session {
        Some(session) => AuthorizationError::RoleNotPermitted {
            role: session.role,
            action: action.to_string(),
        },
        None => AuthorizationError::NoSession,
    }
}

/// Integrity report for one case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaseReview {
    pub case_id: CaseId,
    /// Every stored entry, in sequence order.
    pub entries: Vec<AuditEntry>,
    pub outcome: VerifyOutcome,
    /// Signing records found in the chain.
    pub signatures: Vec<SigningDetails>,
}

impl CaseReview {
    pub fn is_valid(&self) -> bool {
        self.outcome.is_valid()
    }

    /// Number of recorded denials.
    pub fn denials(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| e.action_type.as_str() == actions::ACCESS_DENIED)
            .count()
    }
}

/// Authorization gate, audit chain store and signature orchestrator sharing
/// one backend and one clock.
pub struct Compliance<B> {
    gate: AuthorizationGate,
    store: Arc<AuditChainStore<B>>,
    orchestrator: SignatureOrchestrator<B>,
}

impl<B: ChainBackend> Compliance<B> {
    /// Create a facade using the system clock.
    pub fn new(
        model: Arc<PermissionModel>,
        backend: B,
        source: Arc<dyn CredentialSource>,
        signing: SigningConfig,
    ) -> Self {
        Self::with_clock(model, backend, source, signing, Arc::new(SystemClock))
    }

    pub fn with_clock(
        model: Arc<PermissionModel>,
        backend: B,
        source: Arc<dyn CredentialSource>,
        signing: SigningConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let store = Arc::new(AuditChainStore::with_clock(backend, clock.clone()));
        let orchestrator = SignatureOrchestrator::with_clock(source, store.clone(), signing, clock);
        Self {
            gate: AuthorizationGate::new(model),
            store,
            orchestrator,
        }
    }

    /// Attach an object store so documents can be signed by key.
    pub fn with_object_store(mut self, objects: Arc<dyn ObjectStore>) -> Self {
        self.orchestrator = self.orchestrator.with_object_store(objects);
        self
    }

    pub fn gate(&self) -> &AuthorizationGate {
        &self.gate
    }

    pub fn store(&self) -> &Arc<AuditChainStore<B>> {
        &self.store
    }

    pub fn orchestrator(&self) -> &SignatureOrchestrator<B> {
        &self.orchestrator
    }

    /// Replace the permission table for all subsequent decisions.
    pub fn reload_permissions(&self, table: PermissionTable) {
        self.gate.model().reload(table);
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Actions
    // ─────────────────────────────────────────────────────────────────────────

    /// Authorize `action` on `case_id` and record the outcome.
    pub async fn perform(
        &self,
        session: Option<&Session>,
        case_id: &CaseId,
        action: &str,
        details: &str,
    ) -> Result<Outcome> {
        let decision = self.gate.authorize(session, action)?;
        let Some(session) = session else {
            tracing::warn!(case_id = %case_id, action, "action requested without a session");
            return Ok(Outcome::Denied {
                reason: DenyReason::NoSession,
                entry: None,
            });
        };

        match decision {
            Decision::Allow => {
                let draft = EntryDraft::from_session(
                    case_id.clone(),
                    session,
                    ActionType::new(action)?,
                    details,
                );
                Ok(Outcome::Allowed(self.store.append(draft).await?))
            }
            Decision::Deny(reason) => {
                let entry = self
                    .record_denial(session, case_id, action, reason, details)
                    .await?;
                Ok(Outcome::Denied {
                    reason,
                    entry: Some(entry),
                })
            }
        }
    }

    /// Like [`perform`](Self::perform), but a denial is an error.
    pub async fn require(
        &self,
        session: Option<&Session>,
        case_id: &CaseId,
        action: &str,
        details: &str,
    ) -> Result<AuditEntry> {
        match self.perform(session, case_id, action, details).await? {
            Outcome::Allowed(entry) => Ok(entry),
            Outcome::Denied { .. } => Err(denial_error(session, action).into()),
        }
    }

    async fn record_denial(
        &self,
        session: &Session,
        case_id: &CaseId,
        action: &str,
        reason: DenyReason,
        details: &str,
    ) -> Result<AuditEntry> {
        let payload = serde_json::to_string(&DenialDetails {
            requested_action: action,
            reason: reason.as_str(),
            details,
        })
        .map_err(|e| custodia_core::CoreError::EncodingError(e.to_string()))?;

        let draft = EntryDraft::from_session(
            case_id.clone(),
            session,
            ActionType::from_static(actions::ACCESS_DENIED),
            payload,
        );
        let entry = self.store.append(draft).await?;

        tracing::info!(
            case_id = %case_id,
            seq = entry.seq,
            actor = %session.id,
            role = %session.role,
            action,
            "access denied"
        );
        Ok(entry)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Signing
    // ─────────────────────────────────────────────────────────────────────────

    /// Signing identities currently reachable.
    pub async fn certificates(&self) -> Vec<CertificateListing> {
        self.orchestrator.directory().discover().await
    }

    /// Authorize `SIGN_DOCUMENT`, then sign and bind the signature into the
    /// case chain.
    ///
    /// An allowed request is not recorded separately: the `DOCUMENT_SIGNED`
    /// entry is the record, and a failed attempt leaves the chain untouched.
    /// A denial is recorded and returned as [`ComplianceError::Unauthorized`].
    pub async fn sign_document(
        &self,
        session: Option<&Session>,
        case_id: &CaseId,
        thumbprint: &Thumbprint,
        document: DocumentInput,
    ) -> Result<SignedDocument> {
        let decision = self.gate.authorize(session, actions::SIGN_DOCUMENT)?;
        let session = match (decision, session) {
            (Decision::Allow, Some(session)) => session,
            (Decision::Deny(reason), Some(session)) => {
                self.record_denial(session, case_id, actions::SIGN_DOCUMENT, reason, "")
                    .await?;
                return Err(denial_error(Some(session), actions::SIGN_DOCUMENT).into());
            }
            (_, None) => {
                tracing::warn!(case_id = %case_id, "signing requested without a session");
                return Err(AuthorizationError::NoSession.into());
            }
        };

        let signed = self
            .orchestrator
            .sign(SignRequest {
                session: session.clone(),
                case_id: case_id.clone(),
                thumbprint: thumbprint.clone(),
                document,
            })
            .await?;
        Ok(signed)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Review
    // ─────────────────────────────────────────────────────────────────────────

    /// Read and verify one case from a single snapshot.
    pub async fn review(&self, case_id: &CaseId) -> Result<CaseReview> {
        let entries = self.store.read(case_id).await?;
        let outcome = verify_chain(case_id, &entries);

        if let VerifyOutcome::Corrupted { at_index, kind } = &outcome {
            tracing::warn!(case_id = %case_id, at_index, %kind, "case review found corruption");
        }

        let signatures = entries
            .iter()
            .filter(|e| e.action_type.as_str() == actions::DOCUMENT_SIGNED)
            .filter_map(|e| match SigningDetails::parse(&e.details) {
                Ok(details) => Some(details),
                Err(err) => {
                    tracing::warn!(case_id = %case_id, seq = e.seq, error = %err, "unreadable signing record");
                    None
                }
            })
            .collect();

        Ok(CaseReview {
            case_id: case_id.clone(),
            entries,
            outcome,
            signatures,
        })
    }

    /// Authorize `VERIFY_AUDIT_TRAIL`, record the access and review the case.
    pub async fn review_as(&self, session: Option<&Session>, case_id: &CaseId) -> Result<CaseReview> {
        self.require(session, case_id, actions::VERIFY_AUDIT_TRAIL, "")
            .await?;
        self.review(case_id).await
    }

    /// Review every case with at least one entry.
    pub async fn review_all(&self) -> Result<Vec<CaseReview>> {
        let mut reviews = Vec::new();
        for case_id in self.store.list_cases().await? {
            reviews.push(self.review(&case_id).await?);
        }
        Ok(reviews)
    }

    /// Whether the case chain verifies and contains an entry binding `proof`.
    pub async fn verify_signature(&self, case_id: &CaseId, proof: &SignatureProof) -> Result<bool> {
        let review = self.review(case_id).await?;
        if !review.is_valid() {
            return Ok(false);
        }
        Ok(review.entries.iter().any(|entry| proof.is_bound_by(entry)))
    }

    /// Verify a case, turning corruption into an error.
    pub async fn verify(&self, case_id: &CaseId) -> Result<u64> {
        Ok(self.store.verify(case_id).await?.into_result()?)
    }
}

impl Compliance<Box<dyn ChainBackend>> {
    /// Build a facade from configuration.
    pub fn from_config(config: &ComplianceConfig, source: Arc<dyn CredentialSource>) -> Result<Self> {
        config.validate()?;
        let model = Arc::new(PermissionModel::new(config.permission_table()?));

        let backend: Box<dyn ChainBackend> = match (config.store.backend, &config.store.path) {
            (BackendKind::Memory, _) => Box::new(MemoryBackend::new()),
            (BackendKind::Sqlite, Some(path)) => Box::new(SqliteBackend::open(path)?),
            (BackendKind::Sqlite, None) => {
                return Err(ComplianceError::Config("sqlite backend requires a path".into()))
            }
        };

        tracing::debug!(backend = ?config.store.backend, "compliance subsystem initialized");
        Ok(Self::new(model, backend, source, config.signing_config()))
    }
}

impl<B> std::fmt::Debug for Compliance<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Compliance")
            .field("gate", &self.gate)
            .field("orchestrator", &self.orchestrator)
            .finish_non_exhaustive()
    }
}
