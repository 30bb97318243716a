//! Audit entry: the atomic unit of the compliance trail.
//!
//! An entry is immutable once sealed. Its digest covers the previous
//! entry's digest and the entry's own content, so editing any committed
//! entry breaks the chain from that point forward.

use serde::{Deserialize, Serialize};

use crate::canonical::{canonical_entry_bytes, EntryFields};
use crate::crypto::{Blake3Hash, EntryDigest};
use crate::role::Role;
use crate::types::{ActionType, ActorId, CaseId, Session};

/// Domain prefix for entry digests.
pub const ENTRY_DIGEST_DOMAIN: &[u8] = b"custodia-audit-entry-v0:";

/// What a caller asks to record. Sequence, timestamp and digests are
/// assigned by the chain store, never by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryDraft {
    pub case_id: CaseId,
    pub actor_id: ActorId,
    pub actor_role: Role,
    pub action_type: ActionType,
    pub details: String,
}

impl EntryDraft {
    /// Create a draft from explicit actor fields.
    pub fn new(
        case_id: CaseId,
        actor_id: ActorId,
        actor_role: Role,
        action_type: ActionType,
        details: impl Into<String>,
    ) -> Self {
        Self {
            case_id,
            actor_id,
            actor_role,
            action_type,
            details: details.into(),
        }
    }

    /// Create a draft attributed to the session's actor.
    pub fn from_session(
        case_id: CaseId,
        session: &Session,
        action_type: ActionType,
        details: impl Into<String>,
    ) -> Self {
        Self::new(
            case_id,
            session.id.clone(),
            session.role,
            action_type,
            details,
        )
    }
}

/// A committed audit record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// The case this entry belongs to.
    pub case_id: CaseId,
    /// Position in the case chain (0-indexed, contiguous).
    pub seq: u64,
    /// When the entry was sealed (Unix milliseconds).
    pub timestamp: i64,
    /// Who performed the action.
    pub actor_id: ActorId,
    /// The actor's role at the time of the action.
    pub actor_role: Role,
    /// What was done.
    pub action_type: ActionType,
    /// Free-form or structured (JSON) context.
    pub details: String,
    /// Digest of the previous entry, or [`EntryDigest::GENESIS`] at seq 0.
    pub prev_digest: EntryDigest,
    /// Digest over `prev_digest` and this entry's content.
    pub digest: EntryDigest,
}

impl AuditEntry {
    /// Seal a draft at a chain position, computing its digest.
    pub fn seal(draft: EntryDraft, seq: u64, timestamp: i64, prev_digest: EntryDigest) -> Self {
        let mut entry = Self {
            case_id: draft.case_id,
            seq,
            timestamp,
            actor_id: draft.actor_id,
            actor_role: draft.actor_role,
            action_type: draft.action_type,
            details: draft.details,
            prev_digest,
            digest: EntryDigest::GENESIS,
        };
        entry.digest = entry.compute_digest();
        entry
    }

    /// The fields covered by the digest.
    pub fn fields(&self) -> EntryFields<'_> {
        EntryFields {
            case_id: &self.case_id,
            seq: self.seq,
            timestamp: self.timestamp,
            actor_id: &self.actor_id,
            actor_role: self.actor_role,
            action_type: &self.action_type,
            details: &self.details,
            prev_digest: &self.prev_digest,
        }
    }

    /// Recompute the digest from `prev_digest` and the stored content.
    pub fn compute_digest(&self) -> EntryDigest {
        let bytes = canonical_entry_bytes(&self.fields());
        EntryDigest(Blake3Hash::hash_with_domain(ENTRY_DIGEST_DOMAIN, &bytes).0)
    }

    /// Whether the stored digest matches the content.
    pub fn is_intact(&self) -> bool {
        self.compute_digest() == self.digest
    }

    /// Check if this entry directly follows `previous` in the same chain.
    pub fn follows(&self, previous: &AuditEntry) -> bool {
        self.case_id == previous.case_id
            && self.seq == previous.seq + 1
            && self.prev_digest == previous.digest
    }

    /// Check if this is the first entry of its chain.
    pub fn is_genesis(&self) -> bool {
        self.seq == 0 && self.prev_digest.is_genesis()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::actions;
    use proptest::prelude::*;

    fn draft(details: &str) -> EntryDraft {
        EntryDraft::new(
            CaseId::new("SIP-2024-8921").unwrap(),
            ActorId::new("u-42").unwrap(),
            Role::Analyst,
            ActionType::from_static(actions::VIEW_PROFILE),
            details,
        )
    }

    #[test]
    fn test_seal_is_deterministic() {
        let a = AuditEntry::seal(draft("x"), 0, 1000, EntryDigest::GENESIS);
        let b = AuditEntry::seal(draft("x"), 0, 1000, EntryDigest::GENESIS);
        assert_eq!(a.digest, b.digest);
        assert!(a.is_intact());
        assert!(a.is_genesis());
    }

    #[test]
    fn test_every_field_is_covered() {
        let base = AuditEntry::seal(draft("x"), 0, 1000, EntryDigest::GENESIS);

        let mut e = base.clone();
        e.details = "y".into();
        assert!(!e.is_intact());

        let mut e = base.clone();
        e.timestamp += 1;
        assert!(!e.is_intact());

        let mut e = base.clone();
        e.actor_role = Role::Administrator;
        assert!(!e.is_intact());

        let mut e = base.clone();
        e.seq = 1;
        assert!(!e.is_intact());

        let mut e = base.clone();
        e.prev_digest = EntryDigest::from_bytes([1; 32]);
        assert!(!e.is_intact());

        let mut e = base.clone();
        e.case_id = CaseId::new("SIP-OTHER").unwrap();
        assert!(!e.is_intact());

        let mut e = base;
        e.action_type = ActionType::from_static(actions::DOC_UPLOAD);
        assert!(!e.is_intact());
    }

    #[test]
    fn test_follows() {
        let first = AuditEntry::seal(draft("a"), 0, 1000, EntryDigest::GENESIS);
        let second = AuditEntry::seal(draft("b"), 1, 1001, first.digest);
        assert!(second.follows(&first));
        assert!(!first.follows(&second));

        let stale = AuditEntry::seal(draft("c"), 1, 1002, EntryDigest::GENESIS);
        assert!(!stale.follows(&first));
    }

    #[test]
    fn test_draft_from_session() {
        let session = Session::new(ActorId::new("u-9").unwrap(), "Dra. Ana", Role::Judge);
        let d = EntryDraft::from_session(
            CaseId::new("SIP-1").unwrap(),
            &session,
            ActionType::from_static(actions::ISSUE_DECISION),
            "",
        );
        assert_eq!(d.actor_role, Role::Judge);
        assert_eq!(d.actor_id.as_str(), "u-9");
    }

    fn any_role() -> impl Strategy<Value = Role> {
        prop::sample::select(Role::ALL.to_vec())
    }

    prop_compose! {
        fn any_draft()(
            case in "SIP-[0-9]{1,6}",
            actor in "u-[a-z0-9]{1,8}",
            role in any_role(),
            action in "[A-Z_]{1,24}",
            details in ".{0,64}",
        ) -> EntryDraft {
            EntryDraft::new(
                CaseId::new(case).unwrap(),
                ActorId::new(actor).unwrap(),
                role,
                ActionType::new(action).unwrap(),
                details,
            )
        }
    }

    proptest! {
        #[test]
        fn prop_sealed_entry_is_intact(
            draft in any_draft(),
            seq in 0u64..1_000_000,
            timestamp in any::<i64>(),
            prev in any::<[u8; 32]>(),
        ) {
            let prev = EntryDigest::from_bytes(prev);
            let a = AuditEntry::seal(draft.clone(), seq, timestamp, prev);
            let b = AuditEntry::seal(draft, seq, timestamp, prev);
            prop_assert!(a.is_intact());
            prop_assert_eq!(a.digest, b.digest);
        }

        #[test]
        fn prop_details_change_breaks_digest(
            draft in any_draft(),
            other in ".{0,64}",
            seq in 0u64..1000,
        ) {
            prop_assume!(other != draft.details);
            let mut entry = AuditEntry::seal(draft, seq, 1000, EntryDigest::GENESIS);
            entry.details = other;
            prop_assert!(!entry.is_intact());
        }

        #[test]
        fn prop_successor_follows(draft in any_draft(), next in any_draft()) {
            let first = AuditEntry::seal(draft, 0, 1000, EntryDigest::GENESIS);
            let second = AuditEntry::seal(next, 1, 1001, first.digest);
            prop_assert!(second.follows(&first));
            prop_assert!(!first.follows(&second));
        }
    }
}
