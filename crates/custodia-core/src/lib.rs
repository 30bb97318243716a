//! # Custodia Core
//!
//! Pure primitives for the Custodia compliance subsystem: roles, sessions,
//! audit entries, digests and canonicalization.
//!
//! This crate contains no I/O, no storage, no locking. It is pure computation
//! over the data the rest of the workspace stores and signs.
//!
//! ## Key Types
//!
//! - [`Role`] - Closed set of actor identity classes
//! - [`Session`] - The authenticated actor supplied by the caller
//! - [`AuditEntry`] - A sealed, chain-linked audit record
//! - [`EntryDigest`] - Blake3 chain digest of an entry
//! - [`Certificate`] / [`SignatureProof`] - Signing metadata and results
//!
//! ## Canonicalization
//!
//! Entry digests are computed over deterministic CBOR. See [`canonical`].

pub mod canonical;
pub mod certificate;
pub mod clock;
pub mod crypto;
pub mod entry;
pub mod error;
pub mod role;
pub mod types;

pub use canonical::{canonical_entry_bytes, EntryFields};
pub use certificate::{
    verify_binding, Certificate, CertificateKind, SignatureProof, SignatureValue, SigningDetails,
    Thumbprint,
};
pub use clock::{Clock, ManualClock, SystemClock};
pub use crypto::{Blake3Hash, DocumentDigest, EntryDigest};
pub use entry::{AuditEntry, EntryDraft, ENTRY_DIGEST_DOMAIN};
pub use error::{CoreError, Result};
pub use role::Role;
pub use types::{actions, ActionType, ActorId, CaseId, Session};
