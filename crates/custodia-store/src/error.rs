//! Error types for the store module.

use custodia_core::CaseId;
use thiserror::Error;

use crate::verify::CorruptionKind;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database error from SQLite.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// An append did not extend the stored tail. The append is aborted and
    /// nothing is renumbered.
    #[error("chain invariant violated for case {case_id}: expected seq {expected_seq}, got {seq}")]
    InvariantViolation {
        case_id: CaseId,
        seq: u64,
        expected_seq: u64,
    },

    /// Invalid data in storage.
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// A lock guarding in-memory state was poisoned by a panicking writer.
    #[error("lock poisoned: {0}")]
    Poisoned(String),

    /// Migration error.
    #[error("migration error: {0}")]
    Migration(String),

    /// Background task failed.
    #[error("background task failed: {0}")]
    Task(String),

    /// Core error.
    #[error("core error: {0}")]
    Core(#[from] custodia_core::CoreError),
}

/// A chain failed verification.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum IntegrityError {
    #[error("chain corrupted at index {at_index} ({kind})")]
    Corrupted { at_index: u64, kind: CorruptionKind },
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
