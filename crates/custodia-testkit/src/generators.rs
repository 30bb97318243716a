//! Proptest strategies for property-based testing.

use custodia_core::{actions, ActionType, ActorId, CaseId, EntryDraft, Role, Session};
use proptest::prelude::*;

/// Any role, administrator included.
pub fn role() -> impl Strategy<Value = Role> {
    prop::sample::select(Role::ALL.to_vec())
}

/// Any role except the administrator.
pub fn non_admin_role() -> impl Strategy<Value = Role> {
    role().prop_filter("administrator is implicitly allowed", |r| !r.is_administrator())
}

pub fn case_id() -> impl Strategy<Value = CaseId> {
    (2020u32..2030, 0u32..10_000)
        .prop_map(|(year, n)| CaseId::new(format!("SIP-{}-{:04}", year, n)).unwrap())
}

pub fn actor_id() -> impl Strategy<Value = ActorId> {
    "u-[a-z0-9]{1,12}".prop_map(|s| ActorId::new(s).unwrap())
}

/// A well-known action identifier.
pub fn known_action() -> impl Strategy<Value = &'static str> {
    prop::sample::select(vec![
        actions::VIEW_DASHBOARD,
        actions::VIEW_PROFILE,
        actions::DOC_UPLOAD,
        actions::DOC_DOWNLOAD,
        actions::ISSUE_DECISION,
        actions::SIGN_DOCUMENT,
        actions::CONTROL_ROOM_ACCESS,
        actions::VIEW_CONTROL_ROOM,
        actions::VIEW_INTELLIGENCE,
        actions::VIEW_AUDIT_TRAIL,
        actions::VERIFY_AUDIT_TRAIL,
        actions::MANAGE_USERS,
    ])
}

/// An arbitrary action token.
pub fn action_token() -> impl Strategy<Value = String> {
    "[A-Z][A-Z_]{0,23}"
}

/// Free-text details, including non-ASCII.
pub fn details() -> impl Strategy<Value = String> {
    prop_oneof![Just(String::new()), "[a-zA-Z0-9 .,:é-]{1,64}", any::<String>()]
}

pub fn session() -> impl Strategy<Value = Session> {
    (actor_id(), role()).prop_map(|(id, role)| Session::new(id, "Teste", role))
}

/// A draft for a fixed case.
pub fn draft_for(case: CaseId) -> impl Strategy<Value = EntryDraft> {
    (actor_id(), role(), action_token(), details()).prop_map(move |(actor, role, action, details)| {
        EntryDraft::new(
            case.clone(),
            actor,
            role,
            ActionType::new(action).unwrap(),
            details,
        )
    })
}

/// A sequence of drafts for one case.
pub fn drafts_for(
    case: CaseId,
    len: std::ops::Range<usize>,
) -> impl Strategy<Value = Vec<EntryDraft>> {
    prop::collection::vec(draft_for(case), len)
}
