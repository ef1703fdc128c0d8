use crate::authz::action::{Action, Target};
use crate::authz::evaluator::{Decision, Denial};
use crate::authz::permissions::Permission;
use crate::authz::principal::Principal;

pub fn check(actor: &Principal, action: Action, target: Target<'_>) -> Decision {
    let required: &[Permission] = match (action, target) {
        (Action::Browse, Target::Categories) => {
            &[Permission::BrowseAllCategories, Permission::SearchAnyCategory]
        }
        (Action::View, Target::Category(_)) => &[Permission::ReadAnyCategory],
        (Action::Create, Target::Categories) => &[Permission::CreateCategory],
        (Action::Update, Target::Category(_)) => &[Permission::EditAnyCategory],
        (Action::Delete, Target::Category(_)) => &[Permission::DeleteAnyCategory],
        (Action::BrowseTrash, Target::Categories) => &[Permission::BrowseTrashedCategories],
        (Action::Restore, Target::Categories | Target::Category(_)) => &[Permission::RestoreTrashedCategories],
        (Action::Purge, Target::Categories | Target::Category(_)) => &[Permission::RemoveTrashedCategories],
        _ => return Decision::Deny(Denial::Forbidden),
    };
    Decision::allow_if(actor.has_all_permissions(required))
}
