//! In-memory implementation of the ChainBackend trait.
//!
//! Same semantics as SQLite but nothing is persisted. Each case chain sits
//! behind its own lock, so reading one case never waits on another.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use custodia_core::{AuditEntry, CaseId};

use crate::backend::{next_position, ChainBackend, ChainTail, CommitResult};
use crate::error::{Result, StoreError};

type CaseChain = Arc<RwLock<Vec<AuditEntry>>>;

/// In-memory backend.
///
/// All data is lost when the backend is dropped.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    /// Arena of case chains keyed by case id.
    cases: RwLock<HashMap<CaseId, CaseChain>>,
}

fn poisoned<E: std::fmt::Display>(e: E) -> StoreError {
    StoreError::Poisoned(e.to_string())
}

impl MemoryBackend {
    /// Create a new empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    fn chain(&self, case_id: &CaseId) -> Result<Option<CaseChain>> {
        let cases = self.cases.read().map_err(poisoned)?;
        Ok(cases.get(case_id).cloned())
    }

    fn chain_or_create(&self, case_id: &CaseId) -> Result<CaseChain> {
        if let Some(chain) = self.chain(case_id)? {
            return Ok(chain);
        }
        let mut cases = self.cases.write().map_err(poisoned)?;
        Ok(cases.entry(case_id.clone()).or_default().clone())
    }

    /// Rewrite a stored entry in place, bypassing every check.
    #[cfg(test)]
    pub(crate) fn overwrite(&self, case_id: &CaseId, seq: u64, f: impl FnOnce(&mut AuditEntry)) {
        let chain = self.chain(case_id).unwrap().unwrap();
        let mut entries = chain.write().unwrap();
        f(&mut entries[seq as usize]);
    }
}

#[async_trait]
impl ChainBackend for MemoryBackend {
    async fn commit(&self, entry: &AuditEntry) -> Result<CommitResult> {
        let chain = self.chain_or_create(&entry.case_id)?;
        let mut entries = chain.write().map_err(poisoned)?;

        let tail = entries.last().map(|last| ChainTail {
            seq: last.seq,
            digest: last.digest,
        });
        let (expected_seq, expected_prev) = next_position(tail.as_ref());
        if entry.seq != expected_seq || entry.prev_digest != expected_prev {
            return Ok(CommitResult::Conflict {
                expected_seq,
                expected_prev,
            });
        }

        entries.push(entry.clone());
        Ok(CommitResult::Committed)
    }

    async fn tail(&self, case_id: &CaseId) -> Result<Option<ChainTail>> {
        let Some(chain) = self.chain(case_id)? else {
            return Ok(None);
        };
        let entries = chain.read().map_err(poisoned)?;
        Ok(entries.last().map(|last| ChainTail {
            seq: last.seq,
            digest: last.digest,
        }))
    }

    async fn entries(
        &self,
        case_id: &CaseId,
        from: u64,
        to: Option<u64>,
    ) -> Result<Vec<AuditEntry>> {
        let Some(chain) = self.chain(case_id)? else {
            return Ok(Vec::new());
        };
        let entries = chain.read().map_err(poisoned)?;
        Ok(entries
            .iter()
            .filter(|e| e.seq >= from && to.map_or(true, |to| e.seq < to))
            .cloned()
            .collect())
    }

    async fn count(&self, case_id: &CaseId) -> Result<u64> {
        let Some(chain) = self.chain(case_id)? else {
            return Ok(0);
        };
        let entries = chain.read().map_err(poisoned)?;
        Ok(entries.len() as u64)
    }

    async fn list_cases(&self) -> Result<Vec<CaseId>> {
        let cases = self.cases.read().map_err(poisoned)?;
        let mut ids = Vec::with_capacity(cases.len());
        for (id, chain) in cases.iter() {
            if !chain.read().map_err(poisoned)?.is_empty() {
                ids.push(id.clone());
            }
        }
        ids.sort();
        Ok(ids)
    }
}
