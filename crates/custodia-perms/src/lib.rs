//! # Custodia Permissions
//!
//! Role-based authorization for sensitive portal actions.
//!
//! ## Overview
//!
//! - [`PermissionTable`]: immutable mapping from action identifier to the
//!   roles authorized for it. The administrator is implicitly authorized for
//!   everything; unknown actions are denied.
//! - [`PermissionModel`]: the process-wide table, swapped atomically on reload.
//! - [`AuthorizationGate`]: turns `(session, action)` into a [`Decision`].
//!
//! ## Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use custodia_core::{actions, ActorId, Role, Session};
//! use custodia_perms::{AuthorizationGate, Decision, DenyReason, PermissionModel};
//!
//! let gate = AuthorizationGate::new(Arc::new(PermissionModel::default()));
//! let analyst = Session::new(ActorId::new("u-7").unwrap(), "Ana", Role::Analyst);
//!
//! let decision = gate.authorize(Some(&analyst), actions::CONTROL_ROOM_ACCESS).unwrap();
//! assert_eq!(decision, Decision::Deny(DenyReason::RoleNotPermitted));
//! ```

pub mod error;
pub mod gate;
pub mod model;

pub use error::{AuthorizationError, GateError, PermsError, Result};
pub use gate::{AuthorizationGate, Decision, DenyReason};
pub use model::{PermissionModel, PermissionRules, PermissionTable};
