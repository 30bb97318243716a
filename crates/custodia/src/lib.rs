//! # Custodia
//!
//! Compliance and audit trust for judicial case handling.
//!
//! ## Overview
//!
//! - **Authorization**: a role/action permission table decides whether an
//!   authenticated actor may perform a sensitive action.
//! - **Audit chains**: every case has an append-only, hash-linked chain of
//!   entries. Any later edit to a stored entry is detected on verification.
//! - **Signing**: documents are signed with a certificate from an external
//!   credential source, and every signature is bound into the case chain.
//!
//! ## Key Concepts
//!
//! - **Entry digest**: Blake3 over a domain prefix and the canonical CBOR
//!   encoding of the entry, including the previous entry's digest.
//! - **Genesis**: the first entry of a case links to the all-zero digest.
//! - **Denial**: a refused action with a known actor is itself recorded as
//!   an `ACCESS_DENIED` entry.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use custodia::{Compliance, ComplianceConfig};
//! use custodia::core::{actions, ActorId, CaseId, Role, Session};
//! use custodia::signing::SoftwareKeystore;
//!
//! async fn example() -> custodia::Result<()> {
//!     let config = ComplianceConfig::from_toml_str("[store]\nbackend = \"memory\"\n")?;
//!     let compliance = Compliance::from_config(&config, Arc::new(SoftwareKeystore::new()))?;
//!
//!     let case = CaseId::new("SIP-2024-8921")?;
//!     let analyst = Session::new(ActorId::new("u-17")?, "Ana", Role::Analyst);
//!
//!     compliance
//!         .perform(Some(&analyst), &case, actions::VIEW_PROFILE, "")
//!         .await?;
//!
//!     let review = compliance.review(&case).await?;
//!     assert!(review.is_valid());
//!     Ok(())
//! }
//! ```
//!
//! ## Re-exports
//!
//! - `custodia::core` - primitives (roles, sessions, entries, digests)
//! - `custodia::perms` - permission model and authorization gate
//! - `custodia::store` - audit chain store and backends
//! - `custodia::signing` - certificate directory and signature orchestrator

pub mod compliance;
pub mod config;
pub mod error;

// Re-export component crates
pub use custodia_core as core;
pub use custodia_perms as perms;
pub use custodia_signing as signing;
pub use custodia_store as store;

// Re-export main types for convenience
pub use compliance::{CaseReview, Compliance, Outcome};
pub use config::{BackendKind, ComplianceConfig, SigningSettings, StoreSettings};
pub use error::{ComplianceError, Result};

pub use custodia_core::{
    actions, AuditEntry, CaseId, Role, Session, SignatureProof, SigningDetails, Thumbprint,
};
pub use custodia_perms::{Decision, DenyReason, PermissionModel, PermissionTable};
pub use custodia_signing::{DocumentInput, SignedDocument, SigningConfig, SigningError};
pub use custodia_store::{AuditChainStore, VerifyOutcome};
