//! Strong type definitions for Custodia.
//!
//! Identifiers are newtypes so a case id can never be passed where an actor
//! id is expected. Constructors reject empty identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::CoreError;
use crate::role::Role;

/// Well-known action identifiers used by the portal.
///
/// Action identifiers are open strings; these are the ones the built-in
/// permission table and the facade refer to.
pub mod actions {
    pub const VIEW_DASHBOARD: &str = "VIEW_DASHBOARD";
    pub const VIEW_PROFILE: &str = "VIEW_PROFILE";
    pub const DOC_UPLOAD: &str = "DOC_UPLOAD";
    pub const DOC_DOWNLOAD: &str = "DOC_DOWNLOAD";
    pub const ISSUE_DECISION: &str = "ISSUE_DECISION";
    pub const SIGN_DOCUMENT: &str = "SIGN_DOCUMENT";
    pub const CONTROL_ROOM_ACCESS: &str = "CONTROL_ROOM_ACCESS";
    pub const VIEW_CONTROL_ROOM: &str = "VIEW_CONTROL_ROOM";
    pub const VIEW_INTELLIGENCE: &str = "VIEW_INTELLIGENCE";
    pub const VIEW_AUDIT_TRAIL: &str = "VIEW_AUDIT_TRAIL";
    pub const VERIFY_AUDIT_TRAIL: &str = "VERIFY_AUDIT_TRAIL";
    pub const MANAGE_USERS: &str = "MANAGE_USERS";

    /// Recorded by the signature orchestrator once a proof is bound.
    pub const DOCUMENT_SIGNED: &str = "DOCUMENT_SIGNED";
    /// Recorded by callers when the authorization gate denies a request.
    pub const ACCESS_DENIED: &str = "ACCESS_DENIED";
}

/// Identifier of a judicial case (e.g. `SIP-2024-8921`).
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CaseId(String);

impl CaseId {
    /// Create a case id, rejecting empty or whitespace-only input.
    pub fn new(id: impl Into<String>) -> Result<Self, CoreError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(CoreError::EmptyCaseId);
        }
        Ok(Self(id))
    }

    /// Get the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for CaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CaseId({})", self.0)
    }
}

impl fmt::Display for CaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for CaseId {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<&str> for CaseId {
    type Error = CoreError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<CaseId> for String {
    fn from(id: CaseId) -> Self {
        id.0
    }
}

/// Identifier of an authenticated actor.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ActorId(String);

impl ActorId {
    /// Create an actor id, rejecting empty input.
    pub fn new(id: impl Into<String>) -> Result<Self, CoreError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(CoreError::EmptyActorId);
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ActorId({})", self.0)
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for ActorId {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ActorId> for String {
    fn from(id: ActorId) -> Self {
        id.0
    }
}

/// An action identifier token, e.g. `"VIEW_CONTROL_ROOM"`.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ActionType(String);

impl ActionType {
    /// Create an action identifier, rejecting empty input.
    pub fn new(token: impl Into<String>) -> Result<Self, CoreError> {
        let token = token.into();
        if token.trim().is_empty() {
            return Err(CoreError::EmptyActionType);
        }
        Ok(Self(token))
    }

    /// Build one of the compile-time [`actions`] constants.
    pub fn from_static(token: &'static str) -> Self {
        debug_assert!(!token.trim().is_empty());
        Self(token.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ActionType({})", self.0)
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for ActionType {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ActionType> for String {
    fn from(action: ActionType) -> Self {
        action.0
    }
}

/// The authenticated actor, supplied by the caller's request context.
///
/// The compliance subsystem only ever reads a session; it never
/// authenticates on its own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Stable actor identifier.
    pub id: ActorId,
    /// Name shown in the portal.
    pub display_name: String,
    /// Role assigned at session start.
    pub role: Role,
}

impl Session {
    /// Create a new session.
    pub fn new(id: ActorId, display_name: impl Into<String>, role: Role) -> Self {
        Self {
            id,
            display_name: display_name.into(),
            role,
        }
    }
}
