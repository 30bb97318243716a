//! Roles: the closed set of identity classes an actor can hold.
//!
//! A role is assigned at session start and never changes for the lifetime
//! of the session. Adding a role is a compile-time checked change: every
//! `match` over [`Role`] is exhaustive.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;

/// An actor's identity class within the portal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Role {
    /// Sentencing judge.
    #[serde(rename = "JUIZ")]
    Judge,
    /// Public prosecutor.
    #[serde(rename = "PROMOTOR")]
    Prosecutor,
    /// Public defender.
    #[serde(rename = "DEFENSOR")]
    Defender,
    /// Case analyst.
    #[serde(rename = "ANALISTA")]
    Analyst,
    /// Facility director.
    #[serde(rename = "DIRETOR")]
    Director,
    /// Penitentiary officer.
    #[serde(rename = "AGENTE")]
    Officer,
    /// Intelligence unit.
    #[serde(rename = "INTELIGENCIA")]
    Intelligence,
    /// Inspector-general's office.
    #[serde(rename = "CORREGEDORIA")]
    InspectorGeneral,
    /// System administrator. Implicitly authorized for every action.
    #[serde(rename = "ADMIN")]
    Administrator,
    /// Police liaison.
    #[serde(rename = "POLICIA")]
    Police,
}

impl Role {
    /// Every role, in declaration order.
    pub const ALL: [Role; 10] = [
        Role::Judge,
        Role::Prosecutor,
        Role::Defender,
        Role::Analyst,
        Role::Director,
        Role::Officer,
        Role::Intelligence,
        Role::InspectorGeneral,
        Role::Administrator,
        Role::Police,
    ];

    /// The wire token for this role.
    ///
    /// This is the string bound into audit entry digests, so it must never
    /// change for an existing role.
    pub const fn as_str(self) -> &'static str {
        match self {
            Role::Judge => "JUIZ",
            Role::Prosecutor => "PROMOTOR",
            Role::Defender => "DEFENSOR",
            Role::Analyst => "ANALISTA",
            Role::Director => "DIRETOR",
            Role::Officer => "AGENTE",
            Role::Intelligence => "INTELIGENCIA",
            Role::InspectorGeneral => "CORREGEDORIA",
            Role::Administrator => "ADMIN",
            Role::Police => "POLICIA",
        }
    }

    /// Whether this role is the administrator wildcard.
    pub const fn is_administrator(self) -> bool {
        matches!(self, Role::Administrator)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let token = s.trim();
        Role::ALL
            .into_iter()
            .find(|role| role.as_str().eq_ignore_ascii_case(token))
            .ok_or_else(|| CoreError::UnknownRole(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_token_roundtrip() {
        for role in Role::ALL {
            assert_eq!(role.as_str().parse::<Role>().unwrap(), role);
        }
    }

    #[test]
    fn test_role_parse_is_case_insensitive() {
        assert_eq!("analista".parse::<Role>().unwrap(), Role::Analyst);
        assert_eq!(" Corregedoria ".parse::<Role>().unwrap(), Role::InspectorGeneral);
    }

    #[test]
    fn test_unknown_role_rejected() {
        assert_eq!(
            "JANITOR".parse::<Role>(),
            Err(CoreError::UnknownRole("JANITOR".into()))
        );
    }

    #[test]
    fn test_role_serde_uses_wire_token() {
        let json = serde_json::to_string(&Role::InspectorGeneral).unwrap();
        assert_eq!(json, "\"CORREGEDORIA\"");
        let back: Role = serde_json::from_str("\"POLICIA\"").unwrap();
        assert_eq!(back, Role::Police);
    }

    #[test]
    fn test_only_admin_is_wildcard() {
        let admins: Vec<Role> = Role::ALL.into_iter().filter(|r| r.is_administrator()).collect();
        assert_eq!(admins, vec![Role::Administrator]);
    }
}
