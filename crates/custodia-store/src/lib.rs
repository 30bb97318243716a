//! # Custodia Store
//!
//! Tamper-evident, append-only audit chains, one per case.
//!
//! ## Overview
//!
//! [`AuditChainStore`] owns hashing, ordering and verification. It sits on
//! top of a [`ChainBackend`], which only stores sealed entries and refuses
//! anything that does not extend a case's stored tail. [`SqliteBackend`] is
//! the persistent backend; [`MemoryBackend`] keeps everything in memory.
//!
//! ## Key Types
//!
//! - [`AuditChainStore`] - `append` / `read` / `verify` per case
//! - [`ChainBackend`] - The async trait for entry persistence
//! - [`VerifyOutcome`] - `Valid` or the first corrupted index
//!
//! ## Usage
//!
//! ```rust,no_run
//! use custodia_core::{actions, ActionType, ActorId, CaseId, EntryDraft, Role};
//! use custodia_store::{AuditChainStore, SqliteBackend};
//!
//! async fn example() {
//!     let store = AuditChainStore::new(SqliteBackend::open("audit.db").unwrap());
//!     let case_id = CaseId::new("SIP-2024-8921").unwrap();
//!
//!     let draft = EntryDraft::new(
//!         case_id.clone(),
//!         ActorId::new("u-17").unwrap(),
//!         Role::Analyst,
//!         ActionType::from_static(actions::VIEW_PROFILE),
//!         "",
//!     );
//!     let entry = store.append(draft).await.unwrap();
//!     assert_eq!(entry.seq, 0);
//!     assert!(store.verify(&case_id).await.unwrap().is_valid());
//! }
//! ```
//!
//! ## Design Notes
//!
//! - **Single writer per case**: appends to one case are linearized by a
//!   per-case cursor; appends to different cases run concurrently.
//! - **No renumbering**: a sequence or link mismatch at commit aborts the
//!   append with [`StoreError::InvariantViolation`].
//! - **No repair**: verification reports the first bad index and stops.

pub mod backend;
pub mod chain;
pub mod error;
pub mod memory;
pub mod migration;
pub mod sqlite;
pub mod verify;

pub use backend::{ChainBackend, ChainTail, CommitResult};
pub use chain::AuditChainStore;
pub use error::{IntegrityError, Result, StoreError};
pub use memory::MemoryBackend;
pub use sqlite::SqliteBackend;
pub use verify::{verify_chain, CorruptionKind, VerifyOutcome};
