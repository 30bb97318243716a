//! Golden test vectors for deterministic entry digests.
//!
//! An entry digest must be identical on every platform, every backend and
//! every release that keeps the `v0` encoding. These vectors pin it.

use custodia_core::{
    ActionType, ActorId, AuditEntry, CaseId, DocumentDigest, EntryDigest, EntryDraft, Role,
};

/// A golden entry vector.
#[derive(Debug, Clone)]
pub struct GoldenVector {
    /// Human-readable name for the vector.
    pub name: &'static str,
    pub case_id: &'static str,
    pub seq: u64,
    pub timestamp: i64,
    pub actor_id: &'static str,
    pub actor_role: Role,
    pub action_type: &'static str,
    pub details: &'static str,
    /// Previous digest (hex).
    pub prev_digest: &'static str,
    /// Expected entry digest (hex).
    pub expected_digest: &'static str,
}

const GENESIS_HEX: &str = "0000000000000000000000000000000000000000000000000000000000000000";

/// Get all golden entry vectors.
///
/// The second vector chains onto the first.
pub fn all_vectors() -> Vec<GoldenVector> {
    vec![
        GoldenVector {
            name: "genesis profile view",
            case_id: "SIP-2024-8921",
            seq: 0,
            timestamp: 1736870400000,
            actor_id: "u-17",
            actor_role: Role::Analyst,
            action_type: "VIEW_PROFILE",
            details: "",
            prev_digest: GENESIS_HEX,
            expected_digest: "4c7633f7547d635e514e549e29d4585a622e2201e65e63b45aaf48f2efe9aa23",
        },
        GoldenVector {
            name: "upload chained onto genesis",
            case_id: "SIP-2024-8921",
            seq: 1,
            timestamp: 1736870401000,
            actor_id: "u-17",
            actor_role: Role::Analyst,
            action_type: "DOC_UPLOAD",
            details: "laudo.pdf",
            prev_digest: "4c7633f7547d635e514e549e29d4585a622e2201e65e63b45aaf48f2efe9aa23",
            expected_digest: "36f1ffc1379e2a2172cca3f3a8dfa16d0edfea6ce6b2434914abcdc0f8a2b446",
        },
        GoldenVector {
            name: "signing entry at epoch",
            case_id: "SIP-2024-0001",
            seq: 0,
            timestamp: 0,
            actor_id: "judge-7",
            actor_role: Role::Judge,
            action_type: "DOCUMENT_SIGNED",
            details: "",
            prev_digest: GENESIS_HEX,
            expected_digest: "73a24ed72d261b37116cb5baf8a8e7079204c07ec991a55be1340262faeb3b7c",
        },
    ]
}

/// Document bytes and their expected [`DocumentDigest`] (hex).
pub const DOCUMENT_VECTOR: (&[u8], &str) = (
    b"sentenca",
    "d7bcec4fc258379d43c6700cee8efaba29a9bb831d6b014493f4ba51730a2f59",
);

/// Seal the entry described by a vector.
pub fn entry_from_vector(vector: &GoldenVector) -> AuditEntry {
    let draft = EntryDraft::new(
        CaseId::new(vector.case_id).expect("vector case id"),
        ActorId::new(vector.actor_id).expect("vector actor id"),
        vector.actor_role,
        ActionType::new(vector.action_type).expect("vector action"),
        vector.details,
    );
    let prev = EntryDigest::from_hex(vector.prev_digest).expect("vector prev digest");
    AuditEntry::seal(draft, vector.seq, vector.timestamp, prev)
}

/// Check every vector, returning `(name, matched)` pairs.
pub fn verify_all_vectors() -> Vec<(&'static str, bool)> {
    all_vectors()
        .iter()
        .map(|v| (v.name, entry_from_vector(v).digest.to_hex() == v.expected_digest))
        .collect()
}

/// Check the document digest vector.
pub fn verify_document_vector() -> bool {
    let (bytes, expected) = DOCUMENT_VECTOR;
    DocumentDigest::of_document(bytes).to_hex() == expected
}
