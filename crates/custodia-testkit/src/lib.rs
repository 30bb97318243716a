//! # Custodia Testkit
//!
//! Testing utilities for the compliance subsystem.
//!
//! ## Golden Vectors
//!
//! [`vectors`] pins entry and document digests so any change to the
//! canonical encoding is caught.
//!
//! ## Fakes
//!
//! [`FakeCredentialSource`] stands in for smart-card middleware with
//! configurable latency and failures. [`InMemoryObjectStore`] serves
//! documents by key.
//!
//! ## Property Testing
//!
//! [`generators`] provides proptest strategies for roles, case ids,
//! action tokens and entry drafts.
//!
//! ## Test Fixtures
//!
//! [`TestFixture`] wires a memory store, a fake source and a manual clock
//! together.

pub mod fakes;
pub mod fixtures;
pub mod generators;
pub mod vectors;

pub use fakes::{FakeCredentialSource, InMemoryObjectStore};
pub use fixtures::{case_id, identity, session, sessions, TestFixture, CASE_ID, DAY_MILLIS, START_MILLIS};
pub use vectors::{all_vectors, GoldenVector};
