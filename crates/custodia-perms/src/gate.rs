//! Authorization gate.
//!
//! Evaluates a requested action against the current session and the
//! permission model. The gate never writes to the audit chain: callers
//! record both allowed actions and denials.

use std::fmt;
use std::sync::Arc;

use custodia_core::Session;

use crate::error::{AuthorizationError, GateError};
use crate::model::PermissionModel;

/// Why a request was denied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DenyReason {
    NoSession,
    RoleNotPermitted,
}

impl DenyReason {
    /// Wire token of the reason.
    pub const fn as_str(self) -> &'static str {
        match self {
            DenyReason::NoSession => "NO_SESSION",
            DenyReason::RoleNotPermitted => "ROLE_NOT_PERMITTED",
        }
    }
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of an authorization check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(DenyReason),
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow)
    }

    /// Convert into a `Result`, attaching the session role and action to a
    /// role denial.
    pub fn into_result(
        self,
        session: Option<&Session>,
        action: &str,
    ) -> Result<(), AuthorizationError> {
        match (self, session) {
            (Decision::Allow, _) => Ok(()),
            (Decision::Deny(DenyReason::RoleNotPermitted), Some(session)) => {
                Err(AuthorizationError::RoleNotPermitted {
                    role: session.role,
                    action: action.to_string(),
                })
            }
            (Decision::Deny(_), _) => Err(AuthorizationError::NoSession),
        }
    }
}

/// Stateless front of the permission model.
#[derive(Debug, Clone)]
pub struct AuthorizationGate {
    model: Arc<PermissionModel>,
}

impl AuthorizationGate {
    pub fn new(model: Arc<PermissionModel>) -> Self {
        Self { model }
    }

    /// The model this gate consults.
    pub fn model(&self) -> &Arc<PermissionModel> {
        &self.model
    }

    /// Decide whether the session may perform `action`.
    ///
    /// A deny is a normal outcome. Only a blank action identifier is an
    /// error, since it can only come from a caller bug.
    pub fn authorize(&self, session: Option<&Session>, action: &str) -> Result<Decision, GateError> {
        if action.trim().is_empty() {
            return Err(GateError::MissingAction);
        }

        let decision = match session {
            None => Decision::Deny(DenyReason::NoSession),
            Some(session) if self.model.is_role_authorized(session.role, action) => Decision::Allow,
            Some(_) => Decision::Deny(DenyReason::RoleNotPermitted),
        };

        tracing::debug!(
            action,
            actor = session.map(|s| s.id.as_str()),
            role = session.map(|s| s.role.as_str()),
            allowed = decision.is_allowed(),
            "authorization decision"
        );

        Ok(decision)
    }
}
