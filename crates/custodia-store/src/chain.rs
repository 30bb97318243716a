//! The audit chain store: per-case linearized appends over a backend.
//!
//! `append` is the only mutation. For each case the store keeps a cursor
//! (the cached chain tail) behind its own async mutex; holding that mutex
//! is what makes a case's appends linear. Cursors live in an arena keyed by
//! case id, so appends to different cases never contend.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use custodia_core::{AuditEntry, CaseId, Clock, EntryDraft, SystemClock};

use crate::backend::{next_position, ChainBackend, ChainTail, CommitResult};
use crate::error::{Result, StoreError};
use crate::verify::{verify_chain, VerifyOutcome};

/// Cached tail of one case. `None` until first loaded from the backend.
#[derive(Debug, Default)]
struct Cursor {
    tail: Option<Option<ChainTail>>,
}

type CursorSlot = Arc<tokio::sync::Mutex<Cursor>>;

/// Tamper-evident, append-only audit chains, one per case.
pub struct AuditChainStore<B> {
    backend: B,
    clock: Arc<dyn Clock>,
    cursors: Mutex<HashMap<CaseId, CursorSlot>>,
}

impl<B: ChainBackend> AuditChainStore<B> {
    /// Create a store over `backend` using wall-clock time.
    pub fn new(backend: B) -> Self {
        Self::with_clock(backend, Arc::new(SystemClock))
    }

    /// Create a store with an explicit time source.
    pub fn with_clock(backend: B, clock: Arc<dyn Clock>) -> Self {
        Self {
            backend,
            clock,
            cursors: Mutex::new(HashMap::new()),
        }
    }

    /// Access the underlying backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    fn cursor(&self, case_id: &CaseId) -> CursorSlot {
        // The map only ever gains complete slots, so a poisoned guard is
        // still usable.
        let mut cursors = self.cursors.lock().unwrap_or_else(PoisonError::into_inner);
        cursors.entry(case_id.clone()).or_default().clone()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Append
    // ─────────────────────────────────────────────────────────────────────────

    /// Append an entry to the draft's case chain.
    ///
    /// Sequence number, timestamp and digests are assigned here. A case is
    /// created by its first append.
    pub async fn append(&self, draft: EntryDraft) -> Result<AuditEntry> {
        let slot = self.cursor(&draft.case_id);
        let mut cursor = slot.lock().await;

        let tail = match cursor.tail {
            Some(tail) => tail,
            None => {
                let tail = self.backend.tail(&draft.case_id).await?;
                cursor.tail = Some(tail);
                tail
            }
        };

        let (seq, prev_digest) = next_position(tail.as_ref());
        let entry = AuditEntry::seal(draft, seq, self.clock.now_millis(), prev_digest);

        match self.backend.commit(&entry).await? {
            CommitResult::Committed => {
                cursor.tail = Some(Some(ChainTail {
                    seq: entry.seq,
                    digest: entry.digest,
                }));
                tracing::debug!(
                    case_id = %entry.case_id,
                    seq = entry.seq,
                    action = %entry.action_type,
                    digest = %entry.digest,
                    "audit entry appended"
                );
                Ok(entry)
            }
            CommitResult::Conflict { expected_seq, .. } => {
                // Someone else moved the stored tail. Forget the cache and
                // abort; never renumber.
                cursor.tail = None;
                tracing::error!(
                    case_id = %entry.case_id,
                    seq = entry.seq,
                    expected_seq,
                    "audit chain invariant violated"
                );
                Err(StoreError::InvariantViolation {
                    case_id: entry.case_id,
                    seq: entry.seq,
                    expected_seq,
                })
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Reads
    // ─────────────────────────────────────────────────────────────────────────

    /// Every committed entry of a case, in order. Unknown cases are empty.
    pub async fn read(&self, case_id: &CaseId) -> Result<Vec<AuditEntry>> {
        self.backend.entries(case_id, 0, None).await
    }

    /// Entries with `from <= seq < to`.
    pub async fn read_range(&self, case_id: &CaseId, from: u64, to: u64) -> Result<Vec<AuditEntry>> {
        if from >= to {
            return Ok(Vec::new());
        }
        self.backend.entries(case_id, from, Some(to)).await
    }

    /// The last committed entry of a case.
    pub async fn head(&self, case_id: &CaseId) -> Result<Option<AuditEntry>> {
        let Some(tail) = self.backend.tail(case_id).await? else {
            return Ok(None);
        };
        let mut entries = self
            .backend
            .entries(case_id, tail.seq, Some(tail.next_seq()))
            .await?;
        Ok(entries.pop())
    }

    /// Number of committed entries in a case.
    pub async fn len(&self, case_id: &CaseId) -> Result<u64> {
        self.backend.count(case_id).await
    }

    /// Every case with at least one entry.
    pub async fn list_cases(&self) -> Result<Vec<CaseId>> {
        self.backend.list_cases().await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Verification
    // ─────────────────────────────────────────────────────────────────────────

    /// Recompute every digest of a case chain in order.
    ///
    /// Verification is read-only and never repairs anything.
    pub async fn verify(&self, case_id: &CaseId) -> Result<VerifyOutcome> {
        let entries = self.read(case_id).await?;
        let outcome = verify_chain(case_id, &entries);

        if let VerifyOutcome::Corrupted { at_index, kind } = outcome {
            tracing::warn!(case_id = %case_id, at_index, %kind, "audit chain corrupted");
        }

        Ok(outcome)
    }
}

impl<B> std::fmt::Debug for AuditChainStore<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditChainStore")
            .field("clock", &self.clock)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryBackend;
    use crate::sqlite::SqliteBackend;
    use crate::verify::CorruptionKind;
    use custodia_core::{actions, ActionType, ActorId, EntryDigest, ManualClock, Role};
    use rusqlite::Connection;
    use tempfile::TempDir;

    fn draft(case: &str, action: &'static str, details: &str) -> EntryDraft {
        EntryDraft::new(
            CaseId::new(case).unwrap(),
            ActorId::new("u-42").unwrap(),
            Role::Analyst,
            ActionType::from_static(action),
            details,
        )
    }

    fn store() -> AuditChainStore<MemoryBackend> {
        AuditChainStore::with_clock(MemoryBackend::new(), Arc::new(ManualClock::new(1_000)))
    }

    #[tokio::test]
    async fn test_append_assigns_contiguous_positions() {
        let store = store();
        let case_id = CaseId::new("SIP-2024-8921").unwrap();

        let first = store
            .append(draft("SIP-2024-8921", actions::VIEW_PROFILE, ""))
            .await
            .unwrap();
        let second = store
            .append(draft("SIP-2024-8921", actions::DOC_UPLOAD, "laudo.pdf"))
            .await
            .unwrap();

        assert_eq!(first.seq, 0);
        assert_eq!(first.prev_digest, EntryDigest::GENESIS);
        assert_eq!(second.seq, 1);
        assert_eq!(second.prev_digest, first.digest);
        assert!(second.follows(&first));
        assert_eq!(store.read(&case_id).await.unwrap(), vec![first, second.clone()]);
        assert_eq!(store.head(&case_id).await.unwrap(), Some(second));
    }

    #[tokio::test]
    async fn test_verify_after_every_append() {
        let store = store();
        let case_id = CaseId::new("SIP-1").unwrap();
        assert_eq!(
            store.verify(&case_id).await.unwrap(),
            VerifyOutcome::Valid { entries: 0 }
        );

        for i in 0..10u64 {
            store
                .append(draft("SIP-1", actions::VIEW_DASHBOARD, &i.to_string()))
                .await
                .unwrap();
            assert_eq!(
                store.verify(&case_id).await.unwrap(),
                VerifyOutcome::Valid { entries: i + 1 }
            );
        }
    }

    #[tokio::test]
    async fn test_read_is_idempotent() {
        let store = store();
        let case_id = CaseId::new("SIP-1").unwrap();
        store.append(draft("SIP-1", actions::VIEW_PROFILE, "")).await.unwrap();

        let a = store.read(&case_id).await.unwrap();
        let b = store.read(&case_id).await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn test_read_range_and_unknown_case() {
        let store = store();
        let case_id = CaseId::new("SIP-1").unwrap();
        for _ in 0..5 {
            store.append(draft("SIP-1", actions::VIEW_PROFILE, "")).await.unwrap();
        }

        let range = store.read_range(&case_id, 1, 3).await.unwrap();
        assert_eq!(range.iter().map(|e| e.seq).collect::<Vec<_>>(), vec![1, 2]);
        assert!(store.read_range(&case_id, 3, 3).await.unwrap().is_empty());

        let unknown = CaseId::new("SIP-NONE").unwrap();
        assert!(store.read(&unknown).await.unwrap().is_empty());
        assert_eq!(store.head(&unknown).await.unwrap(), None);
        assert_eq!(store.len(&unknown).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_cases_are_independent() {
        let store = store();
        store.append(draft("SIP-A", actions::VIEW_PROFILE, "")).await.unwrap();
        store.append(draft("SIP-B", actions::VIEW_PROFILE, "")).await.unwrap();
        let a1 = store.append(draft("SIP-A", actions::DOC_UPLOAD, "")).await.unwrap();

        assert_eq!(a1.seq, 1);
        let b = CaseId::new("SIP-B").unwrap();
        assert_eq!(store.len(&b).await.unwrap(), 1);
        assert_eq!(store.list_cases().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_timestamps_come_from_clock() {
        let clock = Arc::new(ManualClock::new(5_000));
        let store = AuditChainStore::with_clock(MemoryBackend::new(), clock.clone());

        let a = store.append(draft("SIP-1", actions::VIEW_PROFILE, "")).await.unwrap();
        clock.advance(250);
        let b = store.append(draft("SIP-1", actions::VIEW_PROFILE, "")).await.unwrap();

        assert_eq!(a.timestamp, 5_000);
        assert_eq!(b.timestamp, 5_250);
    }

    #[tokio::test]
    async fn test_overwritten_details_detected() {
        let store = store();
        let case_id = CaseId::new("SIP-2024-8921").unwrap();
        store.append(draft("SIP-2024-8921", actions::VIEW_PROFILE, "")).await.unwrap();
        store.append(draft("SIP-2024-8921", actions::DOC_UPLOAD, "")).await.unwrap();
        assert!(store.verify(&case_id).await.unwrap().is_valid());
        store.append(draft("SIP-2024-8921", actions::DOC_DOWNLOAD, "")).await.unwrap();

        store
            .backend()
            .overwrite(&case_id, 0, |e| e.details = "forged".into());

        assert_eq!(
            store.verify(&case_id).await.unwrap(),
            VerifyOutcome::Corrupted {
                at_index: 0,
                kind: CorruptionKind::DigestMismatch
            }
        );
    }

    #[tokio::test]
    async fn test_resealed_overwrite_detected_at_next_entry() {
        let store = store();
        let case_id = CaseId::new("SIP-2024-8921").unwrap();
        for _ in 0..3 {
            store.append(draft("SIP-2024-8921", actions::VIEW_PROFILE, "")).await.unwrap();
        }

        store.backend().overwrite(&case_id, 0, |e| {
            e.details = "forged".into();
            e.digest = e.compute_digest();
        });

        assert_eq!(
            store.verify(&case_id).await.unwrap(),
            VerifyOutcome::Corrupted {
                at_index: 1,
                kind: CorruptionKind::BrokenLink
            }
        );
    }

    #[tokio::test]
    async fn test_foreign_writer_is_an_invariant_violation() {
        let backend = Arc::new(MemoryBackend::new());
        let store = AuditChainStore::new(backend.clone());
        let first = store.append(draft("SIP-1", actions::VIEW_PROFILE, "")).await.unwrap();

        // A second writer extends the chain behind the store's back.
        let sneaky = AuditEntry::seal(draft("SIP-1", actions::DOC_UPLOAD, ""), 1, 0, first.digest);
        backend.commit(&sneaky).await.unwrap();

        let err = store
            .append(draft("SIP-1", actions::DOC_DOWNLOAD, ""))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::InvariantViolation {
                seq: 1,
                expected_seq: 2,
                ..
            }
        ));

        // The cursor was reset, so the next append extends the real tail.
        let next = store.append(draft("SIP-1", actions::DOC_DOWNLOAD, "")).await.unwrap();
        assert_eq!(next.seq, 2);
        assert!(store.verify(&first.case_id).await.unwrap().is_valid());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_appends_same_case() {
        let store = Arc::new(store());
        let mut handles = Vec::new();
        for i in 0..50 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store
                    .append(draft("SIP-HOT", actions::VIEW_PROFILE, &i.to_string()))
                    .await
                    .unwrap()
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let case_id = CaseId::new("SIP-HOT").unwrap();
        let entries = store.read(&case_id).await.unwrap();
        let seqs: Vec<u64> = entries.iter().map(|e| e.seq).collect();
        assert_eq!(seqs, (0..50).collect::<Vec<_>>());
        assert_eq!(
            store.verify(&case_id).await.unwrap(),
            VerifyOutcome::Valid { entries: 50 }
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_appends_across_cases() {
        let store = Arc::new(store());
        let mut handles = Vec::new();
        for i in 0..40 {
            let store = store.clone();
            let case = format!("SIP-{}", i % 4);
            handles.push(tokio::spawn(async move {
                store
                    .append(draft(&case, actions::DOC_UPLOAD, ""))
                    .await
                    .unwrap()
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let cases = store.list_cases().await.unwrap();
        assert_eq!(cases.len(), 4);
        for case_id in cases {
            assert_eq!(
                store.verify(&case_id).await.unwrap(),
                VerifyOutcome::Valid { entries: 10 }
            );
        }
    }

    #[tokio::test]
    async fn test_sqlite_tampering_detected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("audit.db");
        let store = AuditChainStore::new(SqliteBackend::open(&path).unwrap());
        let case_id = CaseId::new("SIP-2024-8921").unwrap();

        store.append(draft("SIP-2024-8921", actions::VIEW_PROFILE, "")).await.unwrap();
        store.append(draft("SIP-2024-8921", actions::DOC_UPLOAD, "")).await.unwrap();
        store.append(draft("SIP-2024-8921", actions::DOC_DOWNLOAD, "")).await.unwrap();
        assert!(store.verify(&case_id).await.unwrap().is_valid());

        let raw = Connection::open(&path).unwrap();
        raw.execute(
            "UPDATE audit_entries SET details = 'forged' WHERE case_id = ?1 AND seq = 0",
            [case_id.as_str()],
        )
        .unwrap();

        let outcome = store.verify(&case_id).await.unwrap();
        assert_eq!(
            outcome,
            VerifyOutcome::Corrupted {
                at_index: 0,
                kind: CorruptionKind::DigestMismatch
            }
        );
        // Verification does not repair.
        assert_eq!(store.read(&case_id).await.unwrap()[0].details, "forged");
    }
}
