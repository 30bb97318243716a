//! Permission model: which roles may perform which actions.
//!
//! A [`PermissionTable`] is an immutable map from action identifier to the
//! set of roles authorized for it. The administrator role is implicitly
//! authorized for every action and unknown actions are denied.
//!
//! [`PermissionModel`] holds the current table in an [`ArcSwap`]. Readers
//! load a snapshot without taking a lock; a reload builds a complete new
//! table and swaps the pointer, so a reader sees either the old table or
//! the new one, never a mix.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use arc_swap::ArcSwap;

use custodia_core::{actions, Role};
use serde::{Deserialize, Serialize};

use crate::error::{PermsError, Result};

/// Serialized form of a rule set, keyed by action identifier.
///
/// ```toml
/// [rules]
/// CONTROL_ROOM_ACCESS = ["DIRETOR", "CORREGEDORIA"]
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionRules {
    #[serde(default)]
    pub rules: BTreeMap<String, Vec<String>>,
}

/// Immutable role/action table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PermissionTable {
    rules: HashMap<String, BTreeSet<Role>>,
}

impl PermissionTable {
    /// An empty table. Only the administrator is authorized for anything.
    pub fn empty() -> Self {
        Self::default()
    }

    /// The portal's default rule set.
    pub fn builtin() -> Self {
        use Role::*;

        let everyone = Role::ALL.to_vec();
        let rules: [(&str, Vec<Role>); 12] = [
            (actions::VIEW_DASHBOARD, everyone),
            (
                actions::VIEW_PROFILE,
                vec![
                    Judge,
                    Prosecutor,
                    Defender,
                    Analyst,
                    Director,
                    Officer,
                    Intelligence,
                    InspectorGeneral,
                    Police,
                ],
            ),
            (
                actions::DOC_UPLOAD,
                vec![Judge, Prosecutor, Defender, Analyst, Director],
            ),
            (
                actions::DOC_DOWNLOAD,
                vec![Judge, Prosecutor, Defender, Analyst, Director, InspectorGeneral],
            ),
            (actions::ISSUE_DECISION, vec![Judge]),
            (
                actions::SIGN_DOCUMENT,
                vec![Judge, Prosecutor, Defender, Director],
            ),
            (actions::CONTROL_ROOM_ACCESS, vec![Director, InspectorGeneral]),
            (
                actions::VIEW_CONTROL_ROOM,
                vec![Director, InspectorGeneral, Officer],
            ),
            (
                actions::VIEW_INTELLIGENCE,
                vec![Intelligence, Director, InspectorGeneral],
            ),
            (
                actions::VIEW_AUDIT_TRAIL,
                vec![InspectorGeneral, Judge, Director],
            ),
            (actions::VERIFY_AUDIT_TRAIL, vec![InspectorGeneral]),
            (actions::MANAGE_USERS, vec![]),
        ];

        Self {
            rules: rules
                .into_iter()
                .map(|(action, roles)| (action.to_string(), roles.into_iter().collect()))
                .collect(),
        }
    }

    /// Build a table from typed rules.
    pub fn from_rules<I, A, R>(rules: I) -> Result<Self>
    where
        I: IntoIterator<Item = (A, R)>,
        A: Into<String>,
        R: IntoIterator<Item = Role>,
    {
        let mut table = Self::empty();
        for (action, roles) in rules {
            let action = action.into();
            if action.trim().is_empty() {
                return Err(PermsError::EmptyAction);
            }
            table.rules.entry(action).or_default().extend(roles);
        }
        Ok(table)
    }

    /// Build a table from role tokens. Unknown tokens are a load error.
    pub fn from_serialized(rules: &PermissionRules) -> Result<Self> {
        let mut typed = Vec::with_capacity(rules.rules.len());
        for (action, tokens) in &rules.rules {
            let mut roles = Vec::with_capacity(tokens.len());
            for token in tokens {
                let role = token.parse::<Role>().map_err(|_| PermsError::UnknownRole {
                    action: action.clone(),
                    token: token.clone(),
                })?;
                roles.push(role);
            }
            typed.push((action.clone(), roles));
        }
        Self::from_rules(typed)
    }

    /// Parse a TOML rules document.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let rules: PermissionRules =
            toml::from_str(s).map_err(|e| PermsError::Parse(e.to_string()))?;
        Self::from_serialized(&rules)
    }

    /// Export the table as role tokens, sorted for stable output.
    pub fn to_serialized(&self) -> PermissionRules {
        PermissionRules {
            rules: self
                .rules
                .iter()
                .map(|(action, roles)| {
                    (
                        action.clone(),
                        roles.iter().map(|r| r.as_str().to_string()).collect(),
                    )
                })
                .collect(),
        }
    }

    /// Whether `role` may perform `action`.
    pub fn is_role_authorized(&self, role: Role, action: &str) -> bool {
        if role.is_administrator() {
            return true;
        }
        self.rules
            .get(action)
            .map_or(false, |roles| roles.contains(&role))
    }

    /// Roles explicitly listed for `action`. The administrator is implicit
    /// and only appears if a rule names it.
    pub fn roles_for(&self, action: &str) -> Vec<Role> {
        self.rules
            .get(action)
            .map(|roles| roles.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Every action `role` may perform, sorted.
    pub fn actions_for(&self, role: Role) -> Vec<&str> {
        let mut actions: Vec<&str> = self
            .rules
            .iter()
            .filter(|(_, roles)| role.is_administrator() || roles.contains(&role))
            .map(|(action, _)| action.as_str())
            .collect();
        actions.sort_unstable();
        actions
    }

    /// Number of action rules.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Process-wide permission model with atomic reload.
#[derive(Debug)]
pub struct PermissionModel {
    current: ArcSwap<PermissionTable>,
}

impl PermissionModel {
    pub fn new(table: PermissionTable) -> Self {
        Self {
            current: ArcSwap::from_pointee(table),
        }
    }

    /// The table in force right now.
    pub fn snapshot(&self) -> Arc<PermissionTable> {
        self.current.load_full()
    }

    /// Replace the whole table.
    pub fn reload(&self, table: PermissionTable) {
        let rules = table.len();
        self.current.store(Arc::new(table));
        tracing::info!(rules, "permission table reloaded");
    }

    pub fn is_role_authorized(&self, role: Role, action: &str) -> bool {
        self.snapshot().is_role_authorized(role, action)
    }
}

impl Default for PermissionModel {
    fn default() -> Self {
        Self::new(PermissionTable::builtin())
    }
}
