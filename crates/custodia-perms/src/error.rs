//! Error types for the permissions module.

use custodia_core::Role;
use thiserror::Error;

/// Errors that can occur while loading a permission table.
#[derive(Debug, Error)]
pub enum PermsError {
    /// A rule names a role token that is not part of the closed role set.
    #[error("rule {action}: unknown role {token}")]
    UnknownRole { action: String, token: String },

    /// A rule has an empty action identifier.
    #[error("rule with empty action identifier")]
    EmptyAction,

    /// The rules document could not be parsed.
    #[error("invalid permission rules: {0}")]
    Parse(String),

    /// Core error.
    #[error("core error: {0}")]
    CoreError(#[from] custodia_core::CoreError),
}

/// Caller faults detected by the authorization gate.
///
/// A normal deny is never an error; see [`crate::Decision`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GateError {
    /// The action identifier was missing or blank.
    #[error("authorization requested without an action identifier")]
    MissingAction,
}

/// A denied authorization, for callers that prefer `?` over matching.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthorizationError {
    /// No authenticated session was supplied.
    #[error("no session")]
    NoSession,

    /// The session's role is not authorized for the action.
    #[error("role {role} is not permitted to perform {action}")]
    RoleNotPermitted { role: Role, action: String },
}

/// Result type for permission operations.
pub type Result<T> = std::result::Result<T, PermsError>;
