//! Chain verification.
//!
//! Walks a chain in order, recomputing each digest from the previous
//! digest and the stored content. The first failure is reported and the
//! walk stops there: entries after a failure are never reported valid.

use std::fmt;

use custodia_core::{AuditEntry, CaseId, EntryDigest};

use crate::error::IntegrityError;

/// How a chain failed verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CorruptionKind {
    /// The stored digest does not match the stored content.
    DigestMismatch,
    /// The entry does not point at the previous stored digest, or belongs
    /// to another case.
    BrokenLink,
    /// Sequence numbers are not contiguous from zero.
    SequenceGap,
}

impl fmt::Display for CorruptionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CorruptionKind::DigestMismatch => "digest mismatch",
            CorruptionKind::BrokenLink => "broken link",
            CorruptionKind::SequenceGap => "sequence gap",
        })
    }
}

/// Result of verifying one case chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyOutcome {
    /// Every entry checked out. An empty chain is valid.
    Valid { entries: u64 },
    /// The first failing index.
    Corrupted { at_index: u64, kind: CorruptionKind },
}

impl VerifyOutcome {
    pub fn is_valid(&self) -> bool {
        matches!(self, VerifyOutcome::Valid { .. })
    }

    pub fn into_result(self) -> Result<u64, IntegrityError> {
        match self {
            VerifyOutcome::Valid { entries } => Ok(entries),
            VerifyOutcome::Corrupted { at_index, kind } => {
                Err(IntegrityError::Corrupted { at_index, kind })
            }
        }
    }
}

/// Verify `entries` as the complete chain of `case_id`.
pub fn verify_chain(case_id: &CaseId, entries: &[AuditEntry]) -> VerifyOutcome {
    let mut expected_prev = EntryDigest::GENESIS;

    for (index, entry) in entries.iter().enumerate() {
        let index = index as u64;

        if entry.seq != index {
            return VerifyOutcome::Corrupted {
                at_index: index,
                kind: CorruptionKind::SequenceGap,
            };
        }
        if &entry.case_id != case_id || entry.prev_digest != expected_prev {
            return VerifyOutcome::Corrupted {
                at_index: index,
                kind: CorruptionKind::BrokenLink,
            };
        }
        if !entry.is_intact() {
            return VerifyOutcome::Corrupted {
                at_index: index,
                kind: CorruptionKind::DigestMismatch,
            };
        }

        expected_prev = entry.digest;
    }

    VerifyOutcome::Valid {
        entries: entries.len() as u64,
    }
}
