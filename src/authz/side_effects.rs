use serde::Serialize;

use super::action::UserTarget;
use crate::models::user::UserChanges;

/// Follow-up work an allowed user update obliges the caller to perform in
/// the same transaction as the update itself.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct UpdateSideEffects {
    pub revoke_tokens: bool,
    pub clear_verification: bool,
}

impl UpdateSideEffects {
    pub fn is_none(&self) -> bool {
        !self.revoke_tokens && !self.clear_verification
    }
}

/// Moving a user out of `active` cuts their sessions and forces them to
/// re-verify.
pub fn derive_update_side_effects(_target: &UserTarget, changes: &UserChanges) -> UpdateSideEffects {
    let deactivated = changes.status.is_some_and(|status| !status.is_active());
    UpdateSideEffects {
        revoke_tokens: deactivated,
        clear_verification: deactivated,
    }
}
