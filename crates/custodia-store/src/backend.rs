//! Backend trait: raw storage of committed audit entries.
//!
//! A backend never computes digests. It stores sealed
//! entries and refuses any entry that does not extend the stored tail of
//! its case. Chain logic lives in [`crate::AuditChainStore`].

use std::sync::Arc;

use async_trait::async_trait;
use custodia_core::{AuditEntry, CaseId, EntryDigest};

use crate::error::Result;

/// Position and digest of the last committed entry of a case.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainTail {
    pub seq: u64,
    pub digest: EntryDigest,
}

impl ChainTail {
    /// Sequence number the next entry must carry.
    pub fn next_seq(&self) -> u64 {
        self.seq + 1
    }
}

/// Result of committing an entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitResult {
    /// The entry now ends its chain.
    Committed,
    /// The entry does not extend the stored tail. Nothing was written.
    Conflict {
        /// The sequence number the backend expected.
        expected_seq: u64,
        /// The previous digest the backend expected.
        expected_prev: EntryDigest,
    },
}

/// Expected `(seq, prev_digest)` of the next entry after `tail`.
pub fn next_position(tail: Option<&ChainTail>) -> (u64, EntryDigest) {
    match tail {
        Some(tail) => (tail.next_seq(), tail.digest),
        None => (0, EntryDigest::GENESIS),
    }
}

/// The ChainBackend trait: async interface for audit entry persistence.
///
/// # Design Notes
///
/// - **Append-only**: there is no update or delete operation.
/// - **Tail check**: `commit` writes only if the entry's `seq` and
///   `prev_digest` extend the stored tail, atomically with the write.
/// - **Committed reads**: readers never observe a partially written entry.
#[async_trait]
pub trait ChainBackend: Send + Sync {
    // ─────────────────────────────────────────────────────────────────────────
    // Writes
    // ─────────────────────────────────────────────────────────────────────────

    /// Commit a sealed entry at the end of its case chain.
    async fn commit(&self, entry: &AuditEntry) -> Result<CommitResult>;

    // ─────────────────────────────────────────────────────────────────────────
    // Reads
    // ─────────────────────────────────────────────────────────────────────────

    /// Last committed entry position of a case, or `None` for an unknown case.
    async fn tail(&self, case_id: &CaseId) -> Result<Option<ChainTail>>;

    /// Entries with `from <= seq < to` (`to = None` reads to the end), in
    /// sequence order.
    async fn entries(&self, case_id: &CaseId, from: u64, to: Option<u64>)
        -> Result<Vec<AuditEntry>>;

    /// Number of committed entries in a case.
    async fn count(&self, case_id: &CaseId) -> Result<u64>;

    /// Every case with at least one entry, sorted.
    async fn list_cases(&self) -> Result<Vec<CaseId>>;
}

#[async_trait]
impl<B: ChainBackend + ?Sized> ChainBackend for Arc<B> {
    async fn commit(&self, entry: &AuditEntry) -> Result<CommitResult> {
        (**self).commit(entry).await
    }

    async fn tail(&self, case_id: &CaseId) -> Result<Option<ChainTail>> {
        (**self).tail(case_id).await
    }

    async fn entries(
        &self,
        case_id: &CaseId,
        from: u64,
        to: Option<u64>,
    ) -> Result<Vec<AuditEntry>> {
        (**self).entries(case_id, from, to).await
    }

    async fn count(&self, case_id: &CaseId) -> Result<u64> {
        (**self).count(case_id).await
    }

    async fn list_cases(&self) -> Result<Vec<CaseId>> {
        (**self).list_cases().await
    }
}

#[async_trait]
impl<B: ChainBackend + ?Sized> ChainBackend for Box<B> {
    async fn commit(&self, entry: &AuditEntry) -> Result<CommitResult> {
        (**self).commit(entry).await
    }

    async fn tail(&self, case_id: &CaseId) -> Result<Option<ChainTail>> {
        (**self).tail(case_id).await
    }

    async fn entries(
        &self,
        case_id: &CaseId,
        from: u64,
        to: Option<u64>,
    ) -> Result<Vec<AuditEntry>> {
        (**self).entries(case_id, from, to).await
    }

    async fn count(&self, case_id: &CaseId) -> Result<u64> {
        (**self).count(case_id).await
    }

    async fn list_cases(&self) -> Result<Vec<CaseId>> {
        (**self).list_cases().await
    }
}
