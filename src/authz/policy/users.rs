use crate::authz::action::{Action, Target, UserTarget};
use crate::authz::evaluator::{Decision, Denial};
use crate::authz::permissions::Permission;
use crate::authz::principal::Principal;
use crate::authz::roles::RoleTier;
use crate::lifecycle::TrashFilter;
use crate::models::user::UserChanges;

/// Creation grants, widest first, with the highest tier each may assign.
const CREATE_GRANTS: [(Permission, RoleTier); 3] = [
    (Permission::CreateUser, RoleTier::Admin),
    (Permission::CreateClientAndStaffUsers, RoleTier::Staff),
    (Permission::CreateClientUsers, RoleTier::Client),
];

/// Edit grants, widest first, with the highest target tier each covers.
const EDIT_GRANTS: [(Permission, RoleTier); 3] = [
    (Permission::EditAdminStaffClientUsers, RoleTier::Admin),
    (Permission::EditClientOrStaffUsers, RoleTier::Staff),
    (Permission::EditClientUsers, RoleTier::Client),
];

const DELETE_GRANTS: [(Permission, RoleTier); 2] = [
    (Permission::DeleteClientAndStaffUsers, RoleTier::Staff),
    (Permission::DeleteClientUsers, RoleTier::Client),
];

fn ceiling(actor: &Principal, grants: &[(Permission, RoleTier)]) -> Option<RoleTier> {
    grants
        .iter()
        .find(|(permission, _)| actor.has_permission(*permission))
        .map(|(_, tier)| *tier)
}

/// A tier grant covers targets whose highest fixed tier is at or below the
/// ceiling. Targets without a fixed tier are never covered.
fn covers(ceiling: Option<RoleTier>, target: &UserTarget) -> bool {
    matches!((ceiling, target.tier()), (Some(limit), Some(tier)) if tier <= limit)
}

pub fn check(actor: &Principal, action: Action, target: Target<'_>) -> Decision {
    match (action, target) {
        (Action::Browse, Target::Users) => Decision::allow_if(actor.has_permission(Permission::BrowseAllUsers)),
        (Action::View, Target::User(user)) => Decision::allow_if(
            actor.has_permission(Permission::ReadAnyUser)
                || (user.id == actor.user_id && actor.has_permission(Permission::ReadOwnProfile)),
        ),
        (Action::Create, Target::NewUser(role)) => {
            Decision::allow_if(matches!(ceiling(actor, &CREATE_GRANTS), Some(limit) if role <= limit))
        }
        (Action::Update, Target::User(user)) => can_update(actor, user, &UserChanges::default()),
        (Action::Update, Target::UserEdit(user, changes)) => can_update(actor, user, changes),
        (Action::Delete, Target::User(user)) => can_delete(actor, user),
        (Action::BrowseTrash, Target::Users) => Decision::allow_if(
            actor.has_any_permission(&[Permission::BrowseTrashedUsers, Permission::BrowseTrashedClientUsers]),
        ),
        (Action::Restore, Target::Users) => Decision::allow_if(
            actor.has_any_permission(&[Permission::RestoreTrashedUsers, Permission::RestoreTrashedClientUsers]),
        ),
        (Action::Purge, Target::Users) => Decision::allow_if(
            actor.has_any_permission(&[Permission::RemoveTrashedUsers, Permission::RemoveTrashedClientUsers]),
        ),
        (Action::Restore, Target::User(user)) => trashed_user(
            actor,
            user,
            Permission::RestoreTrashedUsers,
            Permission::RestoreTrashedClientUsers,
        ),
        (Action::Purge, Target::User(user)) => trashed_user(
            actor,
            user,
            Permission::RemoveTrashedUsers,
            Permission::RemoveTrashedClientUsers,
        ),
        _ => Decision::Deny(Denial::Forbidden),
    }
}

fn can_update(actor: &Principal, user: &UserTarget, changes: &UserChanges) -> Decision {
    let limit = ceiling(actor, &EDIT_GRANTS);
    if covers(limit, user) {
        return Decision::allow_if(match (changes.role, limit) {
            (Some(role), Some(limit)) => role <= limit,
            _ => true,
        });
    }

    if user.id == actor.user_id && actor.has_permission(Permission::EditOwnProfile) {
        return Decision::allow_if(!changes.touches_privileged_fields());
    }

    Decision::Deny(Denial::Forbidden)
}

fn can_delete(actor: &Principal, user: &UserTarget) -> Decision {
    if user.id == actor.user_id {
        if actor.has_tier(RoleTier::Staff) || actor.has_tier(RoleTier::Admin) {
            return Decision::Deny(Denial::Forbidden);
        }
        return Decision::allow_if(actor.has_permission(Permission::DeleteOwnProfile));
    }
    Decision::allow_if(covers(ceiling(actor, &DELETE_GRANTS), user))
}

fn trashed_user(actor: &Principal, user: &UserTarget, broad: Permission, narrow: Permission) -> Decision {
    Decision::allow_if(actor.has_permission(broad) || (actor.has_permission(narrow) && user.is_client_only()))
}

/// Filter confining a user-trash action to what the actor's grants reach.
/// Only meaningful after the action itself was authorized.
pub fn trash_filter(actor: &Principal, action: Action) -> TrashFilter {
    let broad = match action {
        Action::Restore => Permission::RestoreTrashedUsers,
        Action::Purge => Permission::RemoveTrashedUsers,
        _ => Permission::BrowseTrashedUsers,
    };
    if actor.has_permission(broad) {
        TrashFilter::All
    } else {
        TrashFilter::ClientUsersOnly
    }
}
