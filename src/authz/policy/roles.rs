use crate::authz::action::{Action, Target};
use crate::authz::evaluator::{Decision, Denial};
use crate::authz::permissions::Permission;
use crate::authz::principal::Principal;

/// Roles and the permission catalog. Deleting a role is reserved for the
/// override role, so it never reaches this policy as an allow.
pub fn check(actor: &Principal, action: Action, target: Target<'_>) -> Decision {
    match (action, target) {
        (Action::Browse, Target::Roles) => {
            Decision::allow_if(actor.has_any_permission(&[Permission::BrowseAllRoles, Permission::SearchAnyRole]))
        }
        (Action::View, Target::Role(_)) => Decision::allow_if(actor.has_permission(Permission::ReadAnyRole)),
        (Action::Create, Target::Roles) => Decision::allow_if(actor.has_permission(Permission::CreateRole)),
        (Action::Update, Target::Role(_)) => Decision::allow_if(actor.has_permission(Permission::EditAnyRole)),
        (Action::Browse, Target::Permissions) => {
            Decision::allow_if(actor.has_permission(Permission::BrowseAllPermissions))
        }
        (Action::View, Target::Permissions) => {
            Decision::allow_if(actor.has_permission(Permission::ReadAnyPermission))
        }
        _ => Decision::Deny(Denial::Forbidden),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authz::policy::fixtures::principal;
    use crate::authz::roles::{Role, RoleTier};

    #[test]
    fn admins_manage_roles_but_never_delete_them() {
        let admin = principal(&[RoleTier::Admin]);
        let role = Role::new("moderator", 300);

        assert!(check(&admin, Action::Browse, Target::Roles).is_allowed());
        assert!(check(&admin, Action::Create, Target::Roles).is_allowed());
        assert!(check(&admin, Action::Update, Target::Role(&role)).is_allowed());
        assert!(!check(&admin, Action::Delete, Target::Role(&role)).is_allowed());
        assert!(check(&admin, Action::View, Target::Permissions).is_allowed());
    }

    #[test]
    fn staff_see_no_roles() {
        let staff = principal(&[RoleTier::Staff]);
        assert!(!check(&staff, Action::Browse, Target::Roles).is_allowed());
        assert!(!check(&staff, Action::Browse, Target::Permissions).is_allowed());
    }
}
