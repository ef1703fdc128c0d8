//! One policy per resource kind. Each is a pure function of
//! `(actor, action, target)` and is only reached for actors without the
//! override role.

pub mod categories;
pub mod jokes;
pub mod roles;
pub mod users;

#[cfg(test)]
pub(crate) mod fixtures {
    use uuid::Uuid;

    use crate::authz::principal::Principal;
    use crate::authz::registry::PermissionRegistry;
    use crate::authz::roles::{RoleBook, RoleTier};

    pub fn principal(tiers: &[RoleTier]) -> Principal {
        principal_with_id(Uuid::new_v4(), tiers)
    }

    pub fn principal_with_id(id: Uuid, tiers: &[RoleTier]) -> Principal {
        let book = RoleBook::with_defaults(&PermissionRegistry::full()).unwrap();
        Principal::new(id).with_roles(tiers.iter().map(|t| book.tier(*t).unwrap().clone()))
    }
}
