//! Standard invariant checks.
//!
//! These invariants capture behavioral properties that must always hold.
//! They verify WHAT must be true, not specific test scenarios.

use std::collections::HashSet;

use super::{ClientSnapshot, Invariant, InvariantResult, Violation};

fn first_duplicate(items: &[String]) -> Option<&str> {
    let mut seen = HashSet::new();
    items.iter().find(|item| !seen.insert(item.as_str())).map(String::as_str)
}

/// The current user never appears as a remote typist.
///
/// Self-typing is filtered at ingestion; an entry for the current user would
/// show "You are typing" driven by the server's echo.
pub struct TypingExcludesSelf;

impl Invariant for TypingExcludesSelf {
    fn name(&self) -> &'static str {
        "typing_excludes_self"
    }

    fn check(&self, state: &ClientSnapshot) -> InvariantResult {
        match &state.user_id {
            Some(me) if state.typing_user_ids.contains(me) => Err(Violation {
                invariant: self.name(),
                message: format!("current user {me} in typing set {:?}", state.typing_user_ids),
            }),
            _ => Ok(()),
        }
    }
}

/// At most one typing entry per user id.
pub struct TypingUniqueUsers;

impl Invariant for TypingUniqueUsers {
    fn name(&self) -> &'static str {
        "typing_unique_users"
    }

    fn check(&self, state: &ClientSnapshot) -> InvariantResult {
        match first_duplicate(&state.typing_user_ids) {
            Some(user) => Err(Violation {
                invariant: self.name(),
                message: format!("user {user} typing twice"),
            }),
            None => Ok(()),
        }
    }
}

/// Message ids in the log are unique.
///
/// Duplicates mean an echo or a history replay was appended instead of
/// reconciled.
pub struct MessageIdsUnique;

impl Invariant for MessageIdsUnique {
    fn name(&self) -> &'static str {
        "message_ids_unique"
    }

    fn check(&self, state: &ClientSnapshot) -> InvariantResult {
        match first_duplicate(&state.message_ids) {
            Some(id) => Err(Violation {
                invariant: self.name(),
                message: format!("message {id} appears twice"),
            }),
            None => Ok(()),
        }
    }
}

/// Reconnect attempts never exceed the policy cap.
pub struct AttemptWithinCap;

impl Invariant for AttemptWithinCap {
    fn name(&self) -> &'static str {
        "attempt_within_cap"
    }

    fn check(&self, state: &ClientSnapshot) -> InvariantResult {
        if state.attempt > state.max_attempts {
            return Err(Violation {
                invariant: self.name(),
                message: format!("attempt {} over cap {}", state.attempt, state.max_attempts),
            });
        }
        Ok(())
    }
}

/// The router is bound exactly while connected, and only to the live session.
///
/// A binding that outlives its session is how handlers pile up across
/// reconnects.
pub struct RouterBoundToActiveSession;

impl Invariant for RouterBoundToActiveSession {
    fn name(&self) -> &'static str {
        "router_bound_to_active_session"
    }

    fn check(&self, state: &ClientSnapshot) -> InvariantResult {
        let expected = if state.connected { state.active_session } else { None };
        if state.bound_session != expected {
            return Err(Violation {
                invariant: self.name(),
                message: format!(
                    "router bound to {:?}, expected {:?} (state {})",
                    state.bound_session, expected, state.state
                ),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_typists_are_caught() {
        let state = ClientSnapshot {
            typing_user_ids: vec!["bob".into(), "bob".into()],
            ..Default::default()
        };
        assert!(TypingUniqueUsers.check(&state).is_err());
    }

    #[test]
    fn self_typing_is_caught() {
        let state = ClientSnapshot {
            user_id: Some("alice".into()),
            typing_user_ids: vec!["alice".into()],
            ..Default::default()
        };
        assert!(TypingExcludesSelf.check(&state).is_err());
    }

    #[test]
    fn stale_binding_is_caught() {
        let state = ClientSnapshot {
            state: "Reconnecting { attempt: 1 }".into(),
            bound_session: Some(1),
            ..Default::default()
        };
        assert!(RouterBoundToActiveSession.check(&state).is_err());
    }
}
